//! RETURN/WITH-equivalent projection clauses.
//!
//! Items compile against the wrapped previous scope. A RETURN resolves
//! everything it touches — a bare deferred vertex gets its scan here, so
//! final output rows carry real payloads. A WITH keeps bare vertex
//! variables deferred across the boundary (their placeholder column is
//! re-exported) and requires every other item to be nameable. DISTINCT,
//! ordering and paging fold into the scope's projection node.

use crate::ast::{self, ProjectionClause, ProjectionKind};
use crate::catalog::Catalog;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::{resolve_future_refs, FutureVertexArena, ResolveFlags};
use crate::compiler::plan_ctx::{CompiledScope, OutputColumn, PlanCtx};
use crate::expr::{
    BindingResolver, CompiledBinding, ExprCompiler, LogicalExpr, ValueKind,
};
use crate::plan::SortItem;

pub fn compile_projection(
    clause: &ProjectionClause,
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
) -> Result<CompiledScope, CompileError> {
    let mut ctx = match prev {
        Some(scope) => PlanCtx::from_scope(scope, arena),
        None => PlanCtx::new(),
    };
    let is_with = clause.kind == ProjectionKind::With;

    let mut outputs: Vec<OutputColumn> = vec![];
    for (index, item) in clause.items.iter().enumerate() {
        // bare variable: re-export directly, preserving deferral across a
        // WITH boundary
        if let ast::Expression::Variable(variable) = &item.expression {
            if let Some(col_index) = ctx.find_output(variable) {
                let name = item.alias.clone().unwrap_or_else(|| variable.clone());
                let col = ctx.output(col_index);
                let alive = col.future.filter(|h| arena.is_unresolved(*h));
                match alive {
                    Some(handle) if !is_with => {
                        // final output wants the actual row
                        let resolved = arena.resolve(handle, &mut ctx, catalog, false)?;
                        outputs.push(OutputColumn {
                            name,
                            expr: resolved,
                            kind: ValueKind::Vertex,
                            future: None,
                        });
                    }
                    _ => {
                        let col = ctx.output(col_index);
                        outputs.push(OutputColumn {
                            name,
                            expr: col.expr.clone(),
                            kind: col.kind,
                            future: alive,
                        });
                    }
                }
                continue;
            }
        }

        let name = match &item.alias {
            Some(alias) => alias.clone(),
            None => match &item.expression {
                ast::Expression::Variable(variable) => variable.clone(),
                _ if is_with => return Err(CompileError::UnaliasedWithItem),
                _ => format!("col{}", index + 1),
            },
        };

        let compiled = {
            let compiler = ExprCompiler::new(&ctx);
            compiler.compile(&item.expression)?
        };
        let resolved = resolve_future_refs(
            &compiled.expr,
            &mut ctx,
            arena,
            catalog,
            ResolveFlags::default(),
        )?;
        outputs.push(OutputColumn {
            name,
            expr: resolved,
            kind: compiled.kind,
            future: None,
        });
    }

    for (i, a) in outputs.iter().enumerate() {
        if outputs[i + 1..].iter().any(|b| b.name == a.name) {
            return Err(CompileError::DuplicateVariable {
                name: a.name.clone(),
            });
        }
    }

    if let Some(where_clause) = &clause.where_clause {
        let compiled = {
            let bindings = ProjectionBindings {
                items: &outputs,
                fallback: &ctx,
            };
            let compiler = ExprCompiler::new(&bindings);
            compiler.compile(where_clause)?.expr
        };
        let resolved =
            resolve_future_refs(&compiled, &mut ctx, arena, catalog, ResolveFlags::default())?;
        ctx.add_qual(resolved);
    }

    let mut order_by = vec![];
    for item in &clause.order_by {
        let compiled = {
            let bindings = ProjectionBindings {
                items: &outputs,
                fallback: &ctx,
            };
            let compiler = ExprCompiler::new(&bindings);
            compiler.compile(&item.expression)?.expr
        };
        let resolved =
            resolve_future_refs(&compiled, &mut ctx, arena, catalog, ResolveFlags::default())?;
        order_by.push(SortItem {
            expr: resolved,
            ascending: item.ascending,
        });
    }

    ctx.set_outputs(outputs);
    Ok(ctx.fold_with(arena, clause.distinct, order_by, clause.skip, clause.limit))
}

/// WHERE and ORDER BY after the item list see the projected names first,
/// then the pre-projection bindings.
struct ProjectionBindings<'a> {
    items: &'a [OutputColumn],
    fallback: &'a PlanCtx,
}

impl BindingResolver for ProjectionBindings<'_> {
    fn resolve_variable(&self, name: &str) -> Option<CompiledBinding> {
        if let Some(col) = self.items.iter().find(|c| c.name == name) {
            let expr = match col.future {
                Some(handle) => LogicalExpr::FutureRef(handle),
                None => col.expr.clone(),
            };
            return Some(CompiledBinding {
                expr,
                kind: col.kind,
            });
        }
        self.fallback.resolve_variable(name)
    }
}

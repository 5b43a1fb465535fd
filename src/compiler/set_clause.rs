//! SET clause compilation: property assignments on bound graph elements.

use std::sync::Arc;

use crate::ast::{self, SetClause};
use crate::catalog::Catalog;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::{resolve_future_refs, FutureVertexArena, ResolveFlags};
use crate::compiler::plan_ctx::{CompiledScope, PlanCtx};
use crate::expr::errors::ExprError;
use crate::expr::{BindingResolver, ExprCompiler, ValueKind};
use crate::plan::{GraphWrite, GraphWriteOp, LogicalPlan, SetPropItem, SetPropsOp};

pub fn compile_set(
    clause: &SetClause,
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
) -> Result<CompiledScope, CompileError> {
    let prev = prev.ok_or(CompileError::RequiresPreviousClause { clause: "SET" })?;
    let mut ctx = PlanCtx::from_scope(prev, arena);

    let mut items = vec![];
    for item in &clause.items {
        let (variable, path) = split_set_target(&item.target)?;

        let binding = ctx
            .resolve_variable(&variable)
            .ok_or(ExprError::UnknownVariable {
                name: variable.clone(),
            })?;
        if !matches!(binding.kind, ValueKind::Vertex | ValueKind::Edge) {
            return Err(CompileError::TypeMismatch {
                expected: "node or relationship".to_string(),
                found: binding.kind.to_string(),
            });
        }
        // writing needs the concrete row, deferred or not
        let target = resolve_future_refs(
            &binding.expr,
            &mut ctx,
            arena,
            catalog,
            ResolveFlags::default(),
        )?;

        let value = {
            let compiler = ExprCompiler::new(&ctx);
            compiler.compile(&item.value)?
        };
        if value.kind != ValueKind::Scalar {
            return Err(ExprError::PayloadCoercion {
                found: value.kind.to_string(),
            }
            .into());
        }
        let value = resolve_future_refs(
            &value.expr,
            &mut ctx,
            arena,
            catalog,
            ResolveFlags::default(),
        )?;

        items.push(SetPropItem {
            variable: Some(variable),
            target,
            path,
            value,
        });
    }

    let scope = ctx.fold(arena);
    let plan = Arc::new(LogicalPlan::GraphWrite(GraphWrite {
        input: scope.plan,
        op: GraphWriteOp::SetProps(SetPropsOp { items }),
    }));
    Ok(CompiledScope {
        plan,
        columns: scope.columns,
        elem_quals: scope.elem_quals,
    })
}

/// A SET target is a variable or a property-access chain rooted at one.
fn split_set_target(target: &ast::Expression) -> Result<(String, Vec<String>), CompileError> {
    let mut path = vec![];
    let mut current = target;
    loop {
        match current {
            ast::Expression::Variable(variable) => {
                path.reverse();
                return Ok((variable.clone(), path));
            }
            ast::Expression::PropertyAccess { base, key } => {
                path.push(key.clone());
                current = base;
            }
            _ => return Err(CompileError::InvalidSetTarget),
        }
    }
}

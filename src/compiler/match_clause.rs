//! Match clause compilation.
//!
//! A match clause compiles in up to two phases. The pattern phase wraps the
//! previous scope, preprocesses the pattern, and runs the chain compiler
//! per component. When the clause carries a WHERE predicate or any property
//! constraint, a qual phase wraps the pattern scope once more and applies
//! the compiled predicate plus the materialized containment obligations as
//! a filter — positions are frozen by then, and deferred vertices
//! referenced by the predicate resolve into this scope.
//!
//! An optional match joins the previous scope (left) with the pattern
//! compiled as a lateral scope (right) through a left outer join; deferred
//! vertices created on the right are nullable.

use crate::ast::MatchClause;
use crate::catalog::Catalog;
use crate::compiler::chain;
use crate::compiler::constraints::materialize_elem_quals;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::{resolve_future_refs, FutureVertexArena, ResolveFlags};
use crate::compiler::plan_ctx::{
    CompiledScope, OutputColumn, PlanCtx, ScopeColumn, OPTIONAL_SCOPE_ALIAS, SCOPE_ALIAS,
};
use crate::compiler::preprocess::{collect_node_info, has_prop_constraints, make_components};
use crate::expr::{ExprCompiler, LogicalExpr, ValueKind};
use crate::plan::{JoinType, LogicalPlan};

pub fn compile_match(
    clause: &MatchClause,
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
) -> Result<CompiledScope, CompileError> {
    if clause.optional {
        if let Some(left) = prev {
            return compile_optional_match(clause, left, arena, catalog);
        }
        // an optional match with nothing before it matches like a plain one
    }
    compile_match_inner(clause, prev, arena, catalog, false, vec![])
}

fn compile_match_inner(
    clause: &MatchClause,
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    optional_mode: bool,
    lateral: Vec<ScopeColumn>,
) -> Result<CompiledScope, CompileError> {
    let has_quals = clause.where_clause.is_some() || has_prop_constraints(&clause.pattern);

    let mut ctx = match prev {
        Some(scope) => PlanCtx::from_scope(scope, arena),
        None => PlanCtx::new(),
    };
    ctx.set_optional_mode(optional_mode);
    ctx.set_lateral_bindings(lateral.clone());

    let node_info = collect_node_info(&clause.pattern)?;
    let components = make_components(&clause.pattern);
    chain::compile_pattern(
        &mut ctx,
        arena,
        catalog,
        &clause.pattern,
        &node_info,
        &components,
    )?;
    let pattern_scope = ctx.fold(arena);

    if !has_quals {
        return Ok(pattern_scope);
    }

    let mut ctx = PlanCtx::from_scope(pattern_scope, arena);
    ctx.set_optional_mode(optional_mode);
    ctx.set_lateral_bindings(lateral);

    let pending = ctx.take_elem_quals();
    let mut parts: Vec<LogicalExpr> = vec![];
    {
        let compiler = ExprCompiler::new(&ctx);
        if let Some(where_clause) = &clause.where_clause {
            parts.push(compiler.compile(where_clause)?.expr);
        }
        if let Some(containment) = materialize_elem_quals(&pending, &compiler)? {
            parts.push(containment);
        }
    }

    let flags = ResolveFlags {
        dont_resolve: false,
        ignore_nullable: optional_mode,
    };
    for part in parts {
        let resolved = resolve_future_refs(&part, &mut ctx, arena, catalog, flags)?;
        ctx.add_qual(resolved);
    }

    Ok(ctx.fold(arena))
}

fn compile_optional_match(
    clause: &MatchClause,
    left: CompiledScope,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
) -> Result<CompiledScope, CompileError> {
    // rebind the left side first so the right side can reference its
    // deferred vertices laterally
    arena.rebind_for_wrap(&[(SCOPE_ALIAS, left.columns.as_slice())]);
    let left_columns = left.columns.clone();

    let inner = MatchClause {
        pattern: clause.pattern.clone(),
        where_clause: clause.where_clause.clone(),
        optional: false,
    };
    let right = compile_match_inner(&inner, None, arena, catalog, true, left_columns.clone())?;

    // merge column lists: same-named graph values keep the left one
    let mut right_only: Vec<ScopeColumn> = vec![];
    for rcol in &right.columns {
        match left_columns.iter().find(|lcol| lcol.name == rcol.name) {
            Some(lcol) => {
                if lcol.kind != rcol.kind {
                    return Err(CompileError::TypeMismatch {
                        expected: lcol.kind.to_string(),
                        found: rcol.kind.to_string(),
                    });
                }
                if !matches!(lcol.kind, ValueKind::Vertex | ValueKind::Edge) {
                    return Err(CompileError::TypeMismatch {
                        expected: "node or relationship".to_string(),
                        found: lcol.kind.to_string(),
                    });
                }
            }
            None => right_only.push(rcol.clone()),
        }
    }
    arena.rebind_for_wrap(&[(OPTIONAL_SCOPE_ALIAS, right_only.as_slice())]);

    let mut ctx = PlanCtx::new();
    ctx.add_from(LogicalPlan::subquery(SCOPE_ALIAS, left.plan));
    ctx.join_last(
        LogicalPlan::lateral_subquery(OPTIONAL_SCOPE_ALIAS, right.plan),
        JoinType::Left,
        None,
    );
    for col in &left_columns {
        ctx.add_output(OutputColumn {
            name: col.name.clone(),
            expr: LogicalExpr::column(SCOPE_ALIAS, &col.name),
            kind: col.kind,
            future: col.future.filter(|h| arena.is_unresolved(*h)),
        });
    }
    for col in &right_only {
        ctx.add_output(OutputColumn {
            name: col.name.clone(),
            expr: LogicalExpr::column(OPTIONAL_SCOPE_ALIAS, &col.name),
            kind: col.kind,
            future: col.future.filter(|h| arena.is_unresolved(*h)),
        });
    }
    ctx.carry_elem_quals(left.elem_quals);
    ctx.carry_elem_quals(right.elem_quals);

    Ok(ctx.fold(arena))
}

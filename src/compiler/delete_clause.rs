//! DELETE clause compilation.
//!
//! Targets must compile to vertex, edge, or path values. Deferred vertices
//! are not resolved here — deletion only needs identifiers, which the
//! placeholder value already carries.

use std::sync::Arc;

use crate::ast::DeleteClause;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::FutureVertexArena;
use crate::compiler::plan_ctx::{CompiledScope, PlanCtx};
use crate::expr::{ExprCompiler, ValueKind};
use crate::plan::{DeleteOp, DeleteTarget, GraphWrite, GraphWriteOp, LogicalPlan};

pub fn compile_delete(
    clause: &DeleteClause,
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
) -> Result<CompiledScope, CompileError> {
    let prev = prev.ok_or(CompileError::RequiresPreviousClause { clause: "DELETE" })?;
    let ctx = PlanCtx::from_scope(prev, arena);

    let mut targets = vec![];
    for item in &clause.items {
        let compiled = {
            let compiler = ExprCompiler::new(&ctx);
            compiler.compile(item)?
        };
        if !matches!(
            compiled.kind,
            ValueKind::Vertex | ValueKind::Edge | ValueKind::Path
        ) {
            return Err(CompileError::TypeMismatch {
                expected: "node, relationship, or path".to_string(),
                found: compiled.kind.to_string(),
            });
        }
        targets.push(DeleteTarget {
            expr: arena.materialize_expr(&compiled.expr),
            kind: compiled.kind,
        });
    }

    let scope = ctx.fold(arena);
    let plan = Arc::new(LogicalPlan::GraphWrite(GraphWrite {
        input: scope.plan,
        op: GraphWriteOp::Delete(DeleteOp {
            detach: clause.detach,
            targets,
        }),
    }));
    Ok(CompiledScope {
        plan,
        columns: scope.columns,
        elem_quals: scope.elem_quals,
    })
}

//! The pattern-to-relational compiler.
//!
//! [`compile`] sequences a statement's clauses as nested subquery scopes:
//! each clause compiles against the previous clause's scope, exports its
//! bindings as named output columns, and carries unresolved deferred
//! vertices and pending obligations forward across the wrap. The result is
//! one plan tree plus the final scope's column list.

pub mod chain;
pub mod constraints;
pub mod errors;
pub mod future_vertex;
pub mod plan_ctx;
pub mod preprocess;
pub mod variable_length;

mod create_clause;
mod delete_clause;
mod match_clause;
mod projection;
mod set_clause;

use std::sync::Arc;

use crate::ast::{Clause, PatternQuery};
use crate::catalog::Catalog;
use crate::plan::LogicalPlan;

pub use errors::CompileError;
pub use future_vertex::{FutureVertexArena, ResolveFlags};
pub use plan_ctx::{CompiledScope, ScopeColumn};

/// A compiled statement: the plan tree and the named output columns of its
/// final scope.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub plan: Arc<LogicalPlan>,
    pub columns: Vec<ScopeColumn>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QueryKind {
    Read,
    Create,
    Update,
    Delete,
}

/// Classify a statement by its strongest write clause.
pub fn query_kind(query: &PatternQuery) -> QueryKind {
    let mut kind = QueryKind::Read;
    for clause in &query.clauses {
        kind = match clause {
            Clause::Delete(_) => return QueryKind::Delete,
            Clause::Set(_) => QueryKind::Update,
            Clause::Create(_) if kind == QueryKind::Read => QueryKind::Create,
            _ => kind,
        };
    }
    kind
}

pub fn compile(query: &PatternQuery, catalog: &Catalog) -> Result<CompiledQuery, CompileError> {
    if query.clauses.is_empty() {
        return Err(CompileError::MalformedPattern {
            message: "statement has no clauses".to_string(),
        });
    }

    let mut arena = FutureVertexArena::new();
    let mut scope: Option<CompiledScope> = None;

    let mut index = 0;
    while index < query.clauses.len() {
        let clause = &query.clauses[index];
        scope = Some(match clause {
            Clause::Match(m) => match_clause::compile_match(m, scope.take(), &mut arena, catalog)?,

            Clause::Create(_) => {
                // adjacent CREATE clauses merge into one descriptor
                let mut run = vec![];
                while let Some(Clause::Create(c)) = query.clauses.get(index) {
                    run.push(c);
                    index += 1;
                }
                index -= 1;
                create_clause::compile_create(&run, scope.take(), &mut arena, catalog)?
            }

            Clause::Set(s) => set_clause::compile_set(s, scope.take(), &mut arena, catalog)?,

            Clause::Delete(d) => delete_clause::compile_delete(d, scope.take(), &mut arena)?,

            Clause::Projection(p) => {
                projection::compile_projection(p, scope.take(), &mut arena, catalog)?
            }
        });
        index += 1;
    }

    // the loop always produces a scope for a non-empty clause list
    let scope = match scope {
        Some(scope) => scope,
        None => {
            return Err(CompileError::MalformedPattern {
                message: "statement has no clauses".to_string(),
            })
        }
    };
    log::debug!("compiled statement:\n{}", scope.plan);
    Ok(CompiledQuery {
        plan: scope.plan,
        columns: scope.columns,
    })
}

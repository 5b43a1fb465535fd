//! Constraint registration and materialization.
//!
//! Two obligation kinds accumulate while a pattern is compiled and become
//! predicates only once positions are frozen:
//!
//! - property containment ([`ElemQual`]): a node/edge property constraint
//!   registered against an output column, materialized as an opaque
//!   containment test over the column's payload once the owning scope is
//!   wrapped;
//! - relationship uniqueness ([`UniqueEdgeSet`]): per component, every
//!   fixed-length edge identifier and variable-length path array must be
//!   pairwise distinct / non-overlapping within one match.
//!
//! Predicates are conjoined, so materialization order never affects
//! correctness.

use crate::ast;
use crate::compiler::errors::CompileError;
use crate::compiler::plan_ctx::SCOPE_ALIAS;
use crate::expr::{conjoin, ExprCompiler, GraphField, LogicalExpr, Operator};

/// A pending containment obligation: the output column carrying the
/// element and its not-yet-compiled property constraint.
#[derive(Debug, Clone)]
pub struct ElemQual {
    pub column: String,
    pub constraint: ast::Expression,
}

/// Compile pending containment obligations against the wrapped scope:
/// `payload(column) @> constraint` for each, conjoined.
pub fn materialize_elem_quals(
    quals: &[ElemQual],
    compiler: &ExprCompiler<'_>,
) -> Result<Option<LogicalExpr>, CompileError> {
    let mut combined = None;
    for qual in quals {
        let payload = LogicalExpr::field(
            LogicalExpr::column(SCOPE_ALIAS, &qual.column),
            GraphField::Properties,
        );
        let constraint = compiler.compile_property_map(&qual.constraint)?;
        combined = conjoin(
            combined,
            LogicalExpr::binary(Operator::Contains, payload, constraint),
        );
    }
    Ok(combined)
}

/// Per-component uniqueness obligations.
#[derive(Debug, Default)]
pub struct UniqueEdgeSet {
    edge_ids: Vec<LogicalExpr>,
    path_arrays: Vec<LogicalExpr>,
}

impl UniqueEdgeSet {
    pub fn add_edge_id(&mut self, id: LogicalExpr) {
        if !self.edge_ids.contains(&id) {
            self.edge_ids.push(id);
        }
    }

    pub fn add_path_array(&mut self, array: LogicalExpr) {
        if !self.path_arrays.contains(&array) {
            self.path_arrays.push(array);
        }
    }

    /// Pairwise predicates: `id_a <> id_b` for fixed-length pairs,
    /// `array_position(array, id) IS NULL` for fixed-against-traversal,
    /// `NOT arrays_overlap(a, b)` for traversal pairs.
    pub fn into_predicates(self) -> Vec<LogicalExpr> {
        let mut predicates = vec![];

        for (i, id_a) in self.edge_ids.iter().enumerate() {
            for id_b in &self.edge_ids[i + 1..] {
                predicates.push(LogicalExpr::ne(id_a.clone(), id_b.clone()));
            }
            for array in &self.path_arrays {
                predicates.push(LogicalExpr::is_null(LogicalExpr::scalar_fn(
                    "array_position",
                    vec![array.clone(), id_a.clone()],
                )));
            }
        }

        for (i, array_a) in self.path_arrays.iter().enumerate() {
            for array_b in &self.path_arrays[i + 1..] {
                predicates.push(LogicalExpr::not(LogicalExpr::scalar_fn(
                    "arrays_overlap",
                    vec![array_a.clone(), array_b.clone()],
                )));
            }
        }

        predicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(alias: &str) -> LogicalExpr {
        LogicalExpr::column(alias, "id")
    }

    #[test]
    fn pairwise_inequalities_are_n_choose_2() {
        let mut set = UniqueEdgeSet::default();
        for alias in ["e1", "e2", "e3", "e4"] {
            set.add_edge_id(id(alias));
        }
        let predicates = set.into_predicates();
        assert_eq!(predicates.len(), 6);
        assert!(predicates
            .iter()
            .all(|p| matches!(p, LogicalExpr::Operator(app) if app.operator == Operator::NotEqual)));
    }

    #[test]
    fn duplicate_registrations_collapse() {
        let mut set = UniqueEdgeSet::default();
        set.add_edge_id(id("e1"));
        set.add_edge_id(id("e1"));
        set.add_edge_id(id("e2"));
        assert_eq!(set.into_predicates().len(), 1);
    }

    #[test]
    fn fixed_against_array_and_array_pairs() {
        let mut set = UniqueEdgeSet::default();
        set.add_edge_id(id("e1"));
        set.add_path_array(LogicalExpr::column("vlr1", "path"));
        set.add_path_array(LogicalExpr::column("vlr2", "path"));
        let predicates = set.into_predicates();
        // e1 vs each array, plus the array pair
        assert_eq!(predicates.len(), 3);
    }
}

//! Registry of scalar and aggregate functions known to the expression
//! compiler.
//!
//! The registry only carries what compilation needs: arity bounds, whether
//! the call aggregates, and the result kind. Execution semantics belong to
//! the engine consuming the plan.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::expr::ValueKind;

#[derive(Debug, Clone, Copy)]
pub struct FnSignature {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub result: ValueKind,
    pub aggregate: bool,
}

const fn scalar(name: &'static str, min_args: usize, max_args: Option<usize>) -> FnSignature {
    FnSignature {
        name,
        min_args,
        max_args,
        result: ValueKind::Scalar,
        aggregate: false,
    }
}

const fn aggregate(name: &'static str, min_args: usize, max_args: Option<usize>) -> FnSignature {
    FnSignature {
        name,
        min_args,
        max_args,
        result: ValueKind::Scalar,
        aggregate: true,
    }
}

lazy_static! {
    static ref FUNCTIONS: HashMap<&'static str, FnSignature> = {
        let sigs = [
            // graph value accessors
            scalar("id", 1, Some(1)),
            scalar("labels", 1, Some(1)),
            scalar("type", 1, Some(1)),
            scalar("properties", 1, Some(1)),
            scalar("start_id", 1, Some(1)),
            scalar("end_id", 1, Some(1)),
            // path / array helpers used by emitted predicates
            scalar("length", 1, Some(1)),
            scalar("size", 1, Some(1)),
            scalar("nodes", 1, Some(1)),
            scalar("relationships", 1, Some(1)),
            scalar("array_position", 2, Some(2)),
            scalar("array_append", 2, Some(2)),
            scalar("arrays_overlap", 2, Some(2)),
            scalar("coalesce", 1, None),
            // aggregates
            aggregate("count", 0, Some(1)),
            aggregate("collect", 1, Some(1)),
            aggregate("sum", 1, Some(1)),
            aggregate("avg", 1, Some(1)),
            aggregate("min", 1, Some(1)),
            aggregate("max", 1, Some(1)),
        ];
        sigs.into_iter().map(|s| (s.name, s)).collect()
    };
}

pub fn lookup(name: &str) -> Option<&'static FnSignature> {
    FUNCTIONS.get(name)
}

pub fn arity_matches(sig: &FnSignature, found: usize) -> bool {
    found >= sig.min_args && sig.max_args.map_or(true, |max| found <= max)
}

/// Human-readable arity for error messages ("2", "1..", "0..1").
pub fn arity_display(sig: &FnSignature) -> String {
    match (sig.min_args, sig.max_args) {
        (min, Some(max)) if min == max => format!("{}", min),
        (min, Some(max)) => format!("{}..{}", min, max),
        (min, None) => format!("{}..", min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_are_flagged() {
        assert!(lookup("count").unwrap().aggregate);
        assert!(lookup("collect").unwrap().aggregate);
        assert!(!lookup("id").unwrap().aggregate);
    }

    #[test]
    fn arity_bounds() {
        let coalesce = lookup("coalesce").unwrap();
        assert!(arity_matches(coalesce, 1));
        assert!(arity_matches(coalesce, 5));
        assert!(!arity_matches(coalesce, 0));
        assert_eq!(arity_display(coalesce), "1..");

        let id = lookup("id").unwrap();
        assert!(!arity_matches(id, 2));
        assert_eq!(arity_display(id), "1");
    }

    #[test]
    fn unknown_function_is_none() {
        assert!(lookup("frobnicate").is_none());
    }
}

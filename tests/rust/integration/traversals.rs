//! Variable-length relationship expansion.

use relgraph::ast::{Direction, HopRange, PathElement, RelPattern};
use relgraph::compiler::CompileError;
use test_case::test_case;

use crate::common::*;

fn vlr_with_direction(
    variable: &str,
    min: u32,
    max: Option<u32>,
    direction: Direction,
) -> PathElement {
    PathElement::Rel(RelPattern {
        variable: Some(variable.to_string()),
        types: vec![],
        direction,
        properties: None,
        hops: Some(HopRange { min, max }),
    })
}

#[test]
fn bounded_traversal_builds_a_recursive_union() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 1, Some(3)),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);

    let display = display_text(&query);
    assert!(display.contains("RecursiveUnion: vlr1 [start, end, level, path]"));
    // neither endpoint ever needs a row
    assert_eq!(count(&display, "g.vertices"), 0);

    let debug = debug_text(&query);
    // no relationship is traversed twice within one row
    assert!(debug.contains("array_position"));
    assert!(debug.contains("array_append"));
    // the recursion stops before the depth could exceed the bound
    assert!(debug.contains("LessThan"));
    assert!(debug.contains("Integer(3)"));
}

#[test]
fn unbounded_traversal_has_no_depth_cap() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), vlr_edge("r", 1, None), node("b")])]),
        return_vars(&["r"]),
    ]);
    let debug = debug_text(&query);
    assert!(!debug.contains("LessThan"));
    assert!(debug.contains("array_position"));
}

#[test]
fn minimum_depth_filters_the_union() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 2, Some(4)),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);
    let debug = debug_text(&query);
    assert!(debug.contains("GreaterThanEqual"));
    assert!(debug.contains("Integer(2)"));
    assert!(debug.contains("Integer(4)"));
}

#[test]
fn zero_length_leg_needs_no_relationship_scan() {
    // (a)-[r*0..0]->(a): start equals end, empty relationship array
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 0, Some(0)),
            node("a"),
        ])]),
        return_vars(&["a"]),
    ]);

    let display = display_text(&query);
    assert_eq!(count(&display, "g.edges"), 0);
    // the zero-length anchor forced the vertex into existence
    assert_eq!(count(&display, "g.vertices"), 1);

    let debug = debug_text(&query);
    assert!(debug.contains("Integer(0)"));
    assert!(debug.contains("List([])"));
}

#[test]
fn zero_min_traversal_seeds_identity_and_recurses() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 0, Some(2)),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);
    let debug = debug_text(&query);
    // identity base row plus recursion
    assert!(debug.contains("List([])"));
    assert!(display_text(&query).contains("RecursiveUnion"));
    assert!(debug.contains("Integer(2)"));
}

#[test]
fn scanned_start_seeds_the_base_branch() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            labeled_node("a", "Person"),
            vlr_edge("r", 1, Some(2)),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);
    let display = display_text(&query);
    assert_eq!(count(&display, "g.person"), 1);
    // the base branch filters on the known start identifier
    let debug = debug_text(&query);
    assert!(debug.contains("Filter"));
    assert!(debug.contains("\"start_id\""));
}

#[test]
fn far_endpoint_anchors_a_start_less_traversal() {
    // only the right endpoint has a label, so expansion walks from there
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 1, Some(2)),
            labeled_node("b", "Person"),
        ])]),
        return_vars(&["r"]),
    ]);
    let display = display_text(&query);
    assert_eq!(count(&display, "g.person"), 1);
    // anchored on the end side: the base filter references end_id
    let debug = debug_text(&query);
    assert!(debug.contains("\"end_id\""));
}

#[test]
fn undirected_traversal_hops_through_a_union() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_with_direction("r", 1, Some(2), Direction::Either),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);
    let display = display_text(&query);
    assert!(display.contains("Union ALL"));
    assert!(debug_text(&query).contains("_start"));
}

#[test]
fn traversal_arrays_join_component_uniqueness() {
    // a fixed edge and a traversal in one component: the fixed identifier
    // must not appear in the traversal's array
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            edge("e"),
            node("b"),
            vlr_edge("r", 1, Some(2)),
            node("c"),
        ])]),
        return_vars(&["e", "r"]),
    ]);
    let debug = debug_text(&query);
    assert!(debug.contains("IsNull"));
    assert!(debug.contains("array_position"));
}

#[test_case(1, Some(3) ; "bounded range")]
#[test_case(2, Some(2) ; "fixed length")]
#[test_case(1, None ; "unbounded")]
fn recursion_always_excludes_revisited_relationships(min: u32, max: Option<u32>) {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), vlr_edge("r", min, max), node("b")])]),
        return_vars(&["r"]),
    ]);
    let debug = debug_text(&query);
    assert!(debug.contains("array_position"));
    assert!(debug.contains("array_append"));
}

#[test]
fn inverted_hop_range_is_rejected() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![
            node("a"),
            vlr_edge("r", 3, Some(1)),
            node("b"),
        ])]),
        return_vars(&["r"]),
    ]);
    assert!(matches!(err, CompileError::MalformedPattern { .. }));
}

//! Pattern compilation: scans, joins, deferral, unification, uniqueness.

use relgraph::ast::{Direction, Expression, Literal, NodePattern, Operator, PathElement};
use relgraph::compiler::CompileError;
use relgraph::expr::ValueKind;

use crate::common::*;

#[test]
fn single_hop_round_trip_exports_vertex_and_edge_values() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), edge("e"), node("b")])]),
        return_vars(&["a", "e", "b"]),
    ]);

    let names: Vec<&str> = query.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "e", "b"]);
    let kinds: Vec<ValueKind> = query.columns.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ValueKind::Vertex, ValueKind::Edge, ValueKind::Vertex]
    );

    let display = display_text(&query);
    // returning a and b forces both rows into existence
    assert_eq!(count(&display, "g.vertices"), 2);
    assert_eq!(count(&display, "g.edges"), 1);

    // the deferred endpoints were derived from the edge's endpoint columns
    let debug = debug_text(&query);
    assert!(debug.contains("start_id"));
    assert!(debug.contains("end_id"));
}

#[test]
fn endpoint_only_vertices_never_scan() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), edge("e"), node("b")])]),
        return_vars(&["e"]),
    ]);
    assert_eq!(count(&display_text(&query), "g.vertices"), 0);
}

#[test]
fn repeated_variable_unifies_label_into_one_scan() {
    let query = compile_ok(vec![
        match_paths(vec![
            path(vec![labeled_node("a", "Person"), edge("e"), node("b")]),
            path(vec![node("a"), edge("e2"), node("c")]),
        ]),
        return_vars(&["e", "e2"]),
    ]);
    let display = display_text(&query);
    assert_eq!(count(&display, "g.person"), 1);
}

#[test]
fn conflicting_labels_abort_compilation() {
    let err = compile_err(vec![
        match_paths(vec![
            path(vec![labeled_node("a", "Person")]),
            path(vec![labeled_node("a", "City")]),
        ]),
        return_vars(&["a"]),
    ]);
    assert_eq!(
        err,
        CompileError::LabelConflict {
            variable: "a".to_string(),
            existing: "Person".to_string(),
            conflicting: "City".to_string(),
        }
    );
}

#[test]
fn unknown_label_aborts_compilation() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![labeled_node("a", "Robot")])]),
        return_vars(&["a"]),
    ]);
    assert!(matches!(err, CompileError::Catalog(_)));
}

#[test]
fn fixed_edges_get_pairwise_inequality_per_component() {
    // one path, four fixed-length edges: C(4,2) = 6 inequalities
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            edge("e1"),
            node("b"),
            edge("e2"),
            node("c"),
            edge("e3"),
            node("d"),
            edge("e4"),
            node("f"),
        ])]),
        return_vars(&["e1"]),
    ]);
    assert_eq!(count(&debug_text(&query), "NotEqual"), 6);
}

#[test]
fn disjoint_components_share_no_uniqueness_predicates() {
    let query = compile_ok(vec![
        match_paths(vec![
            path(vec![node("a"), edge("e1"), node("b")]),
            path(vec![node("c"), edge("e2"), node("d")]),
        ]),
        return_vars(&["e1", "e2"]),
    ]);
    assert_eq!(count(&debug_text(&query), "NotEqual"), 0);
}

#[test]
fn connected_paths_do_share_uniqueness_predicates() {
    let query = compile_ok(vec![
        match_paths(vec![
            path(vec![node("a"), edge("e1"), node("b")]),
            path(vec![node("b"), edge("e2"), node("c")]),
        ]),
        return_vars(&["e1", "e2"]),
    ]);
    assert_eq!(count(&debug_text(&query), "NotEqual"), 1);
}

#[test]
fn two_references_resolve_into_one_scan() {
    let where_clause = Expression::binary(
        Operator::And,
        Expression::binary(
            Operator::Equal,
            Expression::property(Expression::var("b"), "x"),
            Expression::Literal(Literal::Integer(1)),
        ),
        Expression::binary(
            Operator::Equal,
            Expression::property(Expression::var("b"), "y"),
            Expression::Literal(Literal::Integer(2)),
        ),
    );
    let query = compile_ok(vec![
        match_where(
            vec![path(vec![
                labeled_node("a", "Person"),
                edge("e"),
                node("b"),
            ])],
            where_clause,
        ),
        return_vars(&["e"]),
    ]);
    let display = display_text(&query);
    // b resolves once no matter how many predicates touch it
    assert_eq!(count(&display, "g.vertices"), 1);
    assert_eq!(count(&display, "g.person"), 1);
}

#[test]
fn undirected_edges_scan_a_bidirectional_union() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            edge_with_direction("e", Direction::Either),
            node("b"),
        ])]),
        return_vars(&["e"]),
    ]);
    let display = display_text(&query);
    assert!(display.contains("Union ALL"));
    // both orientations read the same relation
    assert_eq!(count(&display, "g.edges"), 2);
    assert!(debug_text(&query).contains("_start"));
}

#[test]
fn property_constraints_materialize_as_containment() {
    let constrained = PathElement::Node(NodePattern {
        variable: Some("a".to_string()),
        label: Some("Person".to_string()),
        properties: Some(Expression::Map(vec![(
            "name".to_string(),
            Expression::Literal(Literal::String("Alice".to_string())),
        )])),
    });
    let query = compile_ok(vec![
        match_paths(vec![path(vec![constrained, edge("e"), node("b")])]),
        return_vars(&["e"]),
    ]);
    let debug = debug_text(&query);
    assert!(debug.contains("Contains"));
    assert!(debug.contains("Alice"));
}

#[test]
fn consecutive_edges_join_across_placeholder_vertices() {
    // the anonymous middle node is purely structural: no scan, no output,
    // but the two edges still join endpoint to endpoint
    let query = compile_ok(vec![
        match_paths(vec![path(vec![
            node("a"),
            edge("e1"),
            PathElement::Node(NodePattern::default()),
            edge("e2"),
            node("b"),
        ])]),
        return_vars(&["e1", "e2"]),
    ]);
    let debug = debug_text(&query);
    assert_eq!(count(&debug, "operator: Equal,"), 1);
    assert_eq!(count(&display_text(&query), "g.vertices"), 0);
}

#[test]
fn relationship_variables_are_never_reusable() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![
            node("a"),
            edge("e"),
            node("b"),
            edge("e"),
            node("c"),
        ])]),
        return_vars(&["e"]),
    ]);
    assert_eq!(
        err,
        CompileError::DuplicateVariable {
            name: "e".to_string()
        }
    );
}

#[test]
fn vertex_variable_cannot_rebind_as_relationship() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![
            node("x"),
            edge("y"),
            node("b"),
            edge("z"),
            node("y"),
        ])]),
        return_vars(&["y"]),
    ]);
    assert_eq!(
        err,
        CompileError::DuplicateVariable {
            name: "y".to_string()
        }
    );
}

#[test]
fn multiple_relationship_types_are_rejected() {
    let rel = PathElement::Rel(relgraph::ast::RelPattern {
        variable: Some("e".to_string()),
        types: vec!["KNOWS".to_string(), "LIVES_IN".to_string()],
        direction: Direction::Right,
        properties: None,
        hops: None,
    });
    let err = compile_err(vec![
        match_paths(vec![path(vec![node("a"), rel, node("b")])]),
        return_vars(&["e"]),
    ]);
    assert_eq!(err, CompileError::MultipleRelTypes);
}

#[test]
fn named_paths_export_a_path_value() {
    let query = compile_ok(vec![
        match_paths(vec![named_path(
            "p",
            vec![node("a"), typed_edge(Some("e"), "KNOWS", Direction::Right), node("b")],
        )]),
        return_vars(&["p"]),
    ]);
    let p = query.columns.iter().find(|c| c.name == "p").expect("p");
    assert_eq!(p.kind, ValueKind::Path);
    assert!(debug_text(&query).contains("MakePath"));
    // a named path forces its vertices into existence
    assert_eq!(count(&display_text(&query), "g.vertices"), 2);
}

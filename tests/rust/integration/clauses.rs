//! Clause composition: WITH/RETURN, OPTIONAL MATCH, write clauses, and
//! plan serialization.

use relgraph::ast::{
    Clause, CreateClause, DeleteClause, Direction, Expression, Literal, PathPattern, PatternGraph,
    ProjectionClause, ProjectionItem, ProjectionKind, SetClause, SetItem,
};
use relgraph::compiler::CompileError;
use relgraph::expr::ValueKind;
use relgraph::plan::{CreateElement, GraphWriteOp, LogicalPlan};

use crate::common::*;

fn create_clause(paths: Vec<PathPattern>) -> Clause {
    Clause::Create(CreateClause {
        pattern: PatternGraph { paths },
    })
}

#[test]
fn with_defers_bare_vertices_across_the_boundary() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), edge("e"), node("b")])]),
        with_vars(&["b"]),
        return_vars(&["b"]),
    ]);
    // b only gets its scan at the final RETURN
    assert_eq!(count(&display_text(&query), "g.vertices"), 1);
}

#[test]
fn with_requires_nameable_items() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        Clause::Projection(ProjectionClause::new(
            ProjectionKind::With,
            vec![ProjectionItem {
                expression: Expression::property(Expression::var("a"), "name"),
                alias: None,
            }],
        )),
    ]);
    assert_eq!(err, CompileError::UnaliasedWithItem);
}

#[test]
fn with_where_filters_the_intermediate_rows() {
    let mut with = ProjectionClause::new(
        ProjectionKind::With,
        vec![ProjectionItem {
            expression: Expression::var("a"),
            alias: None,
        }],
    );
    with.where_clause = Some(Expression::binary(
        relgraph::ast::Operator::GreaterThan,
        Expression::property(Expression::var("a"), "age"),
        Expression::Literal(Literal::Integer(30)),
    ));
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        Clause::Projection(with),
        return_vars(&["a"]),
    ]);
    assert!(debug_text(&query).contains("GreaterThan"));
}

#[test]
fn optional_match_joins_left() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        optional_match(vec![path(vec![node("a"), edge("e"), node("b")])]),
        return_vars(&["e"]),
    ]);
    let display = display_text(&query);
    assert_eq!(count(&display, "Join: Left"), 1);
    assert!(display.contains("(lateral)"));
}

#[test]
fn nullable_deferred_vertices_resolve_through_left_joins() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        optional_match(vec![path(vec![node("a"), edge("e"), node("b")])]),
        return_vars(&["b"]),
    ]);
    // one left join for the optional pattern, one for resolving b
    assert_eq!(count(&display_text(&query), "Join: Left"), 2);
}

#[test]
fn create_references_bound_vertices_and_creates_new_ones() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        create_clause(vec![path(vec![
            node("a"),
            typed_edge(None, "KNOWS", Direction::Right),
            node("b"),
        ])]),
    ]);

    let op = match query.plan.as_ref() {
        LogicalPlan::GraphWrite(write) => match &write.op {
            GraphWriteOp::Create(op) => op.clone(),
            other => panic!("expected a create descriptor, got {:?}", other),
        },
        other => panic!("expected a graph write, got {:?}", other),
    };
    assert_eq!(op.paths.len(), 1);
    let elements = &op.paths[0].elements;
    assert_eq!(elements.len(), 3);
    match (&elements[0], &elements[1], &elements[2]) {
        (
            CreateElement::Vertex(a),
            CreateElement::Edge(knows),
            CreateElement::Vertex(b),
        ) => {
            assert!(!a.create);
            assert_eq!(knows.type_name, "KNOWS");
            assert!(b.create);
        }
        other => panic!("unexpected element shapes: {:?}", other),
    }

    // the created vertex becomes a binding for later clauses
    let b = query.columns.iter().find(|c| c.name == "b").expect("b");
    assert_eq!(b.kind, ValueKind::Vertex);
}

#[test]
fn adjacent_create_clauses_merge_into_one_descriptor() {
    let query = compile_ok(vec![
        create_clause(vec![path(vec![
            node("a"),
            typed_edge(None, "KNOWS", Direction::Right),
            node("b"),
        ])]),
        create_clause(vec![path(vec![
            node("c"),
            typed_edge(None, "KNOWS", Direction::Right),
            node("d"),
        ])]),
    ]);
    match query.plan.as_ref() {
        LogicalPlan::GraphWrite(write) => match &write.op {
            GraphWriteOp::Create(op) => assert_eq!(op.paths.len(), 2),
            other => panic!("expected a create descriptor, got {:?}", other),
        },
        other => panic!("expected a graph write, got {:?}", other),
    }
}

#[test]
fn create_rejects_undirected_relationships() {
    let err = compile_err(vec![create_clause(vec![path(vec![
        node("a"),
        typed_edge(None, "KNOWS", Direction::Either),
        node("b"),
    ])])]);
    assert!(matches!(err, CompileError::UnsupportedInCreate { .. }));
}

#[test]
fn create_rejects_variable_length_relationships() {
    let err = compile_err(vec![create_clause(vec![path(vec![
        node("a"),
        vlr_edge("r", 1, Some(2)),
        node("b"),
    ])])]);
    assert!(matches!(err, CompileError::UnsupportedInCreate { .. }));
}

#[test]
fn create_rejects_typeless_relationships() {
    let err = compile_err(vec![create_clause(vec![path(vec![
        node("a"),
        edge("e"),
        node("b"),
    ])])]);
    assert!(matches!(err, CompileError::UnsupportedInCreate { .. }));
}

#[test]
fn create_of_a_lone_referenced_node_is_rejected() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        create_clause(vec![path(vec![node("a")])]),
    ]);
    assert_eq!(err, CompileError::MissingRelationship);
}

#[test]
fn set_records_target_path_and_value() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        Clause::Set(SetClause {
            items: vec![SetItem {
                target: Expression::property(Expression::var("a"), "age"),
                value: Expression::Literal(Literal::Integer(30)),
            }],
        }),
    ]);
    match query.plan.as_ref() {
        LogicalPlan::GraphWrite(write) => match &write.op {
            GraphWriteOp::SetProps(op) => {
                assert_eq!(op.items.len(), 1);
                assert_eq!(op.items[0].variable.as_deref(), Some("a"));
                assert_eq!(op.items[0].path, vec!["age".to_string()]);
            }
            other => panic!("expected a set descriptor, got {:?}", other),
        },
        other => panic!("expected a graph write, got {:?}", other),
    }
}

#[test]
fn set_cannot_open_a_statement() {
    let err = compile_err(vec![Clause::Set(SetClause { items: vec![] })]);
    assert_eq!(err, CompileError::RequiresPreviousClause { clause: "SET" });
}

#[test]
fn delete_cannot_open_a_statement() {
    let err = compile_err(vec![Clause::Delete(DeleteClause {
        detach: false,
        items: vec![],
    })]);
    assert_eq!(err, CompileError::RequiresPreviousClause { clause: "DELETE" });
}

#[test]
fn delete_targets_must_be_graph_values() {
    let err = compile_err(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person")])]),
        Clause::Delete(DeleteClause {
            detach: false,
            items: vec![Expression::Literal(Literal::Integer(1))],
        }),
    ]);
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn detach_delete_carries_its_targets() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![labeled_node("a", "Person"), edge("e"), node("b")])]),
        Clause::Delete(DeleteClause {
            detach: true,
            items: vec![Expression::var("a")],
        }),
    ]);
    match query.plan.as_ref() {
        LogicalPlan::GraphWrite(write) => match &write.op {
            GraphWriteOp::Delete(op) => {
                assert!(op.detach);
                assert_eq!(op.targets.len(), 1);
                assert_eq!(op.targets[0].kind, ValueKind::Vertex);
            }
            other => panic!("expected a delete descriptor, got {:?}", other),
        },
        other => panic!("expected a graph write, got {:?}", other),
    }
}

#[test]
fn compiled_plans_serialize_round_trip() {
    let query = compile_ok(vec![
        match_paths(vec![path(vec![node("a"), edge("e"), node("b")])]),
        return_vars(&["a", "e", "b"]),
    ]);
    let json = serde_json::to_string(query.plan.as_ref()).expect("serialize");
    let back: LogicalPlan = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(&back, query.plan.as_ref());
}

#[test]
fn query_kind_classifies_by_strongest_write() {
    use relgraph::ast::PatternQuery;
    use relgraph::compiler::{query_kind, QueryKind};

    let read = PatternQuery {
        clauses: vec![
            match_paths(vec![path(vec![node("a")])]),
            return_vars(&["a"]),
        ],
    };
    assert_eq!(query_kind(&read), QueryKind::Read);

    let write = PatternQuery {
        clauses: vec![
            match_paths(vec![path(vec![node("a")])]),
            Clause::Delete(DeleteClause {
                detach: false,
                items: vec![Expression::var("a")],
            }),
        ],
    };
    assert_eq!(query_kind(&write), QueryKind::Delete);
}

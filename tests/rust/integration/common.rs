//! Shared helpers: a fixed test catalog, AST shorthands, and plan text
//! inspection.

use relgraph::ast::{
    Clause, Direction, Expression, HopRange, MatchClause, NodePattern, PathElement, PathPattern,
    PatternGraph, PatternQuery, ProjectionClause, ProjectionItem, ProjectionKind, RelPattern,
};
use relgraph::catalog::Catalog;
use relgraph::compiler::{compile, CompileError, CompiledQuery};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> Catalog {
    Catalog::builder("g")
        .vertex_label("Person", "person")
        .vertex_label("City", "city")
        .edge_type("KNOWS", "knows")
        .edge_type("LIVES_IN", "lives_in")
        .build()
}

pub fn node(variable: &str) -> PathElement {
    PathElement::Node(NodePattern::named(variable))
}

pub fn labeled_node(variable: &str, label: &str) -> PathElement {
    PathElement::Node(NodePattern::with_label(variable, label))
}

pub fn edge(variable: &str) -> PathElement {
    PathElement::Rel(RelPattern {
        variable: Some(variable.to_string()),
        types: vec![],
        direction: Direction::Right,
        properties: None,
        hops: None,
    })
}

pub fn edge_with_direction(variable: &str, direction: Direction) -> PathElement {
    PathElement::Rel(RelPattern {
        variable: Some(variable.to_string()),
        types: vec![],
        direction,
        properties: None,
        hops: None,
    })
}

pub fn typed_edge(variable: Option<&str>, type_name: &str, direction: Direction) -> PathElement {
    PathElement::Rel(RelPattern::typed(variable, type_name, direction))
}

pub fn vlr_edge(variable: &str, min: u32, max: Option<u32>) -> PathElement {
    PathElement::Rel(RelPattern {
        variable: Some(variable.to_string()),
        types: vec![],
        direction: Direction::Right,
        properties: None,
        hops: Some(HopRange { min, max }),
    })
}

pub fn path(elements: Vec<PathElement>) -> PathPattern {
    PathPattern {
        name: None,
        elements,
    }
}

pub fn named_path(name: &str, elements: Vec<PathElement>) -> PathPattern {
    PathPattern {
        name: Some(name.to_string()),
        elements,
    }
}

pub fn match_paths(paths: Vec<PathPattern>) -> Clause {
    Clause::Match(MatchClause {
        pattern: PatternGraph { paths },
        where_clause: None,
        optional: false,
    })
}

pub fn match_where(paths: Vec<PathPattern>, where_clause: Expression) -> Clause {
    Clause::Match(MatchClause {
        pattern: PatternGraph { paths },
        where_clause: Some(where_clause),
        optional: false,
    })
}

pub fn optional_match(paths: Vec<PathPattern>) -> Clause {
    Clause::Match(MatchClause {
        pattern: PatternGraph { paths },
        where_clause: None,
        optional: true,
    })
}

pub fn return_vars(variables: &[&str]) -> Clause {
    Clause::Projection(ProjectionClause::new(
        ProjectionKind::Return,
        variables
            .iter()
            .map(|v| ProjectionItem {
                expression: Expression::var(*v),
                alias: None,
            })
            .collect(),
    ))
}

pub fn with_vars(variables: &[&str]) -> Clause {
    Clause::Projection(ProjectionClause::new(
        ProjectionKind::With,
        variables
            .iter()
            .map(|v| ProjectionItem {
                expression: Expression::var(*v),
                alias: None,
            })
            .collect(),
    ))
}

pub fn compile_ok(clauses: Vec<Clause>) -> CompiledQuery {
    init_logging();
    compile(&PatternQuery { clauses }, &catalog()).expect("statement should compile")
}

pub fn compile_err(clauses: Vec<Clause>) -> CompileError {
    init_logging();
    match compile(&PatternQuery { clauses }, &catalog()) {
        Ok(_) => panic!("statement should not compile"),
        Err(err) => err,
    }
}

/// The plan's operator tree rendering.
pub fn display_text(query: &CompiledQuery) -> String {
    format!("{}", query.plan)
}

/// The plan's full structural rendering, expressions included.
pub fn debug_text(query: &CompiledQuery) -> String {
    format!("{:?}", query.plan)
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

//! Pattern-language AST consumed by the compiler.
//!
//! These types are the input contract with the external pattern parser: one
//! [`PatternQuery`] per statement, holding a sequence of clauses whose
//! patterns are chains of alternating node and relationship descriptors.
//! Expressions arrive parsed but not type-checked; the compiler lowers them
//! to [`crate::expr::LogicalExpr`] during clause compilation.

use serde_json::Value as JsonValue;

/// A complete multi-clause statement.
#[derive(Debug, PartialEq, Clone)]
pub struct PatternQuery {
    pub clauses: Vec<Clause>,
}

/// One stage of a statement, operating on the result of the previous stage.
#[derive(Debug, PartialEq, Clone)]
pub enum Clause {
    Match(MatchClause),
    Create(CreateClause),
    Set(SetClause),
    Delete(DeleteClause),
    Projection(ProjectionClause),
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause {
    pub pattern: PatternGraph,
    pub where_clause: Option<Expression>,
    /// OPTIONAL MATCH; compiles as a left outer join against the previous
    /// scope and marks deferred vertices created inside it as nullable.
    pub optional: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CreateClause {
    pub pattern: PatternGraph,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

/// `target = value` where target is a variable or a property access chain.
#[derive(Debug, PartialEq, Clone)]
pub struct SetItem {
    pub target: Expression,
    pub value: Expression,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DeleteClause {
    pub detach: bool,
    pub items: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ProjectionKind {
    /// RETURN-equivalent: final output, resolves everything.
    Return,
    /// WITH-equivalent: scope boundary, defers bare vertex variables.
    With,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionClause {
    pub kind: ProjectionKind,
    pub items: Vec<ProjectionItem>,
    pub distinct: bool,
    pub order_by: Vec<OrderByItem>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// WHERE after a WITH-style projection, filtering the intermediate rows.
    pub where_clause: Option<Expression>,
}

impl ProjectionClause {
    pub fn new(kind: ProjectionKind, items: Vec<ProjectionItem>) -> Self {
        ProjectionClause {
            kind,
            items,
            distinct: false,
            order_by: vec![],
            skip: None,
            limit: None,
            where_clause: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionItem {
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByItem {
    pub expression: Expression,
    pub ascending: bool,
}

/// All paths of one clause's pattern. Invariant: non-empty.
#[derive(Debug, PartialEq, Clone)]
pub struct PatternGraph {
    pub paths: Vec<PathPattern>,
}

impl PatternGraph {
    pub fn single(path: PathPattern) -> Self {
        PatternGraph { paths: vec![path] }
    }
}

/// A named or anonymous chain of alternating node and relationship
/// descriptors. A lone node is a length-1 chain.
#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern {
    pub name: Option<String>,
    pub elements: Vec<PathElement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PathElement {
    Node(NodePattern),
    Rel(RelPattern),
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub label: Option<String>,
    /// Property constraint, unevaluated (usually a map literal).
    pub properties: Option<Expression>,
}

impl NodePattern {
    pub fn named(variable: impl Into<String>) -> Self {
        NodePattern {
            variable: Some(variable.into()),
            ..Default::default()
        }
    }

    pub fn with_label(variable: impl Into<String>, label: impl Into<String>) -> Self {
        NodePattern {
            variable: Some(variable.into()),
            label: Some(label.into()),
            properties: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelPattern {
    pub variable: Option<String>,
    /// Relationship types; more than one is rejected at compile time.
    pub types: Vec<String>,
    pub direction: Direction,
    pub properties: Option<Expression>,
    /// Hop-count range; `None` means an ordinary single-hop relationship.
    pub hops: Option<HopRange>,
}

impl RelPattern {
    pub fn typed(variable: Option<&str>, type_name: &str, direction: Direction) -> Self {
        RelPattern {
            variable: variable.map(|v| v.to_string()),
            types: vec![type_name.to_string()],
            direction,
            properties: None,
            hops: None,
        }
    }

    pub fn is_variable_length(&self) -> bool {
        self.hops.is_some()
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    /// `<-[..]-`
    Left,
    /// `-[..]->`
    Right,
    /// `-[..]-`
    Either,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Either => Direction::Either,
        }
    }
}

/// Hop-count range of a quantified relationship: `[min, max]`, `min` may be
/// 0 (zero-length leg), `max` may be unbounded.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct HopRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl HopRange {
    /// `*n` — exactly n hops.
    pub fn fixed(hops: u32) -> Self {
        HopRange {
            min: hops,
            max: Some(hops),
        }
    }

    /// `*min..max`.
    pub fn range(min: u32, max: u32) -> Self {
        HopRange {
            min,
            max: Some(max),
        }
    }

    /// `*` — one or more hops, unbounded.
    pub fn unbounded() -> Self {
        HopRange { min: 1, max: None }
    }

    /// A range whose lower bound is zero needs its start vertex
    /// materialized before expansion (the identity row is seeded from it).
    pub fn is_zero_min(&self) -> bool {
        self.min == 0
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(Literal),
    /// A variable bound by the pattern or an enclosing scope.
    Variable(String),
    /// `base.key` property access.
    PropertyAccess {
        base: Box<Expression>,
        key: String,
    },
    Operator(OperatorApplication),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// `{key: value, ...}` map literal; the usual shape of a property
    /// constraint.
    Map(Vec<(String, Expression)>),
    List(Vec<Expression>),
    Parameter(String),
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn binary(op: Operator, left: Expression, right: Expression) -> Self {
        Expression::Operator(OperatorApplication {
            operator: op,
            operands: vec![left, right],
        })
    }

    pub fn property(base: Expression, key: impl Into<String>) -> Self {
        Expression::PropertyAccess {
            base: Box::new(base),
            key: key.into(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    And,
    Or,
    Not,
    In,
    IsNull,
    IsNotNull,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
    /// A pre-parsed payload document (e.g. from a driver-side parameter).
    Json(JsonValue),
}

//! Logical expression language of emitted plans.
//!
//! [`LogicalExpr`] is the typed expression tree the compiler produces for
//! predicates, projections, and graph-value construction. Relations are
//! addressed by string alias, columns by name; graph values (vertex, edge,
//! path) are built with explicit row constructors so the executor can take
//! them apart again with [`LogicalExpr::FieldAccess`].
//!
//! A [`FutureRef`](LogicalExpr::FutureRef) is a handle into the deferred
//! vertex arena: a vertex known only by a derivable identifier expression.
//! Handles never survive into a finished scope; they are substituted when
//! the vertex is resolved or materialized into a placeholder row when the
//! scope is folded.

pub mod compile;
pub mod functions;
pub mod rewrite;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub use compile::{BindingResolver, CompiledBinding, ExprCompiler, TypedExpr};
pub use rewrite::{transform_expr, transform_plan, RewriteCtx};

use crate::expr::errors::ExprError;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Clone, Error, PartialEq)]
    pub enum ExprError {
        #[error("variable `{name}` not defined")]
        UnknownVariable { name: String },

        #[error("unknown function `{name}`")]
        UnknownFunction { name: String },

        #[error("function `{name}` expects {expected} argument(s), got {found}")]
        FunctionArity {
            name: String,
            expected: String,
            found: usize,
        },

        #[error("expected a {expected} expression, found {found}")]
        KindMismatch { expected: String, found: String },

        #[error("expression cannot be coerced to the property payload type: {found}")]
        PayloadCoercion { found: String },
    }
}

/// What kind of value an expression produces. Graph kinds gate operations
/// like property access and DELETE targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ValueKind {
    Vertex,
    Edge,
    Path,
    Scalar,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Vertex => f.write_str("vertex"),
            ValueKind::Edge => f.write_str("edge"),
            ValueKind::Path => f.write_str("path"),
            ValueKind::Scalar => f.write_str("scalar"),
        }
    }
}

/// Stable handle of a deferred vertex resolution cell.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct FutureId(pub usize);

/// Fields of constructed graph values.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum GraphField {
    Id,
    StartId,
    EndId,
    Properties,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum LogicalExpr {
    Literal(Literal),

    /// A column of a relation in scope, addressed by alias and name.
    Column(ColumnRef),

    Parameter(String),

    /// Field of a graph value (`id(v)`, endpoint ids, the payload).
    FieldAccess(FieldAccess),

    /// Key lookup inside a property payload.
    PropertyGet(PropertyGet),

    Operator(OperatorApplication),

    ScalarFnCall(ScalarFnCall),

    AggregateFnCall(AggregateFnCall),

    List(Vec<LogicalExpr>),

    MapLiteral(Vec<(String, LogicalExpr)>),

    /// A constant payload document (compiled property constraint).
    Payload(JsonValue),

    /// Vertex value constructor: `(id, properties)`.
    MakeVertex(MakeVertex),

    /// Edge value constructor: `(id, start, end, properties)`.
    MakeEdge(MakeEdge),

    /// Path value constructor: vertex values interleaved with edge values
    /// (a variable-length leg contributes its relationship-identifier
    /// array).
    MakePath(MakePath),

    /// Reference to a deferred vertex; replaced on resolution.
    FutureRef(FutureId),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FieldAccess {
    pub base: Box<LogicalExpr>,
    pub field: GraphField,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PropertyGet {
    pub payload: Box<LogicalExpr>,
    pub key: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScalarFnCall {
    pub name: String,
    pub args: Vec<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AggregateFnCall {
    pub name: String,
    pub args: Vec<LogicalExpr>,
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MakeVertex {
    pub id: Box<LogicalExpr>,
    pub properties: Box<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MakeEdge {
    pub id: Box<LogicalExpr>,
    pub start: Box<LogicalExpr>,
    pub end: Box<LogicalExpr>,
    pub properties: Box<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MakePath {
    pub elements: Vec<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
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
    /// Opaque payload containment: does the left payload contain the right
    /// constraint payload.
    Contains,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::ModuloDivision => "%",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Contains => "@>",
        };
        f.write_str(s)
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl LogicalExpr {
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        LogicalExpr::Column(ColumnRef {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn integer(value: i64) -> Self {
        LogicalExpr::Literal(Literal::Integer(value))
    }

    pub fn null() -> Self {
        LogicalExpr::Literal(Literal::Null)
    }

    pub fn binary(op: Operator, left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::Operator(OperatorApplication {
            operator: op,
            operands: vec![left, right],
        })
    }

    pub fn unary(op: Operator, operand: LogicalExpr) -> Self {
        LogicalExpr::Operator(OperatorApplication {
            operator: op,
            operands: vec![operand],
        })
    }

    pub fn eq(left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::binary(Operator::Equal, left, right)
    }

    pub fn ne(left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::binary(Operator::NotEqual, left, right)
    }

    pub fn is_null(operand: LogicalExpr) -> Self {
        LogicalExpr::unary(Operator::IsNull, operand)
    }

    pub fn not(operand: LogicalExpr) -> Self {
        LogicalExpr::unary(Operator::Not, operand)
    }

    pub fn scalar_fn(name: impl Into<String>, args: Vec<LogicalExpr>) -> Self {
        LogicalExpr::ScalarFnCall(ScalarFnCall {
            name: name.into(),
            args,
        })
    }

    pub fn make_vertex(id: LogicalExpr, properties: LogicalExpr) -> Self {
        LogicalExpr::MakeVertex(MakeVertex {
            id: Box::new(id),
            properties: Box::new(properties),
        })
    }

    pub fn make_edge(
        id: LogicalExpr,
        start: LogicalExpr,
        end: LogicalExpr,
        properties: LogicalExpr,
    ) -> Self {
        LogicalExpr::MakeEdge(MakeEdge {
            id: Box::new(id),
            start: Box::new(start),
            end: Box::new(end),
            properties: Box::new(properties),
        })
    }

    /// Field of a graph value, collapsing row constructors in place.
    pub fn field(base: LogicalExpr, field: GraphField) -> Self {
        match (&base, field) {
            (LogicalExpr::MakeVertex(v), GraphField::Id) => (*v.id).clone(),
            (LogicalExpr::MakeVertex(v), GraphField::Properties) => (*v.properties).clone(),
            (LogicalExpr::MakeEdge(e), GraphField::Id) => (*e.id).clone(),
            (LogicalExpr::MakeEdge(e), GraphField::StartId) => (*e.start).clone(),
            (LogicalExpr::MakeEdge(e), GraphField::EndId) => (*e.end).clone(),
            (LogicalExpr::MakeEdge(e), GraphField::Properties) => (*e.properties).clone(),
            _ => LogicalExpr::FieldAccess(FieldAccess {
                base: Box::new(base),
                field,
            }),
        }
    }
}

/// Conjoin a predicate onto an optional accumulated qualifier.
pub fn conjoin(qual: Option<LogicalExpr>, expr: LogicalExpr) -> Option<LogicalExpr> {
    match qual {
        None => Some(expr),
        Some(q) => Some(LogicalExpr::binary(Operator::And, q, expr)),
    }
}

/// Coercion seam of the external type checker: check that `expr` has the
/// expected kind, or fail with a kind mismatch.
pub fn expect_kind(expr: TypedExpr, expected: ValueKind) -> Result<TypedExpr, ExprError> {
    if expr.kind == expected {
        Ok(expr)
    } else {
        Err(ExprError::KindMismatch {
            expected: expected.to_string(),
            found: expr.kind.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_access_collapses_row_constructors() {
        let vertex = LogicalExpr::make_vertex(
            LogicalExpr::column("a", "id"),
            LogicalExpr::column("a", "properties"),
        );
        assert_eq!(
            LogicalExpr::field(vertex, GraphField::Id),
            LogicalExpr::column("a", "id")
        );
    }

    #[test]
    fn field_access_on_column_stays_symbolic() {
        let bound = LogicalExpr::column("_", "a");
        let id = LogicalExpr::field(bound.clone(), GraphField::Id);
        assert_eq!(
            id,
            LogicalExpr::FieldAccess(FieldAccess {
                base: Box::new(bound),
                field: GraphField::Id
            })
        );
    }

    #[test]
    fn conjoin_builds_and_chains() {
        let a = LogicalExpr::integer(1);
        let b = LogicalExpr::integer(2);
        let q = conjoin(None, a.clone());
        let q = conjoin(q, b.clone());
        assert_eq!(q, Some(LogicalExpr::binary(Operator::And, a, b)));
    }
}

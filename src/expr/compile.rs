//! Expression compilation: lowers parsed [`ast::Expression`] trees into
//! typed [`LogicalExpr`]s against the bindings of the current scope.
//!
//! This is the seam the rest of the compiler uses as its type checker:
//! variables resolve through a [`BindingResolver`], graph-value kinds are
//! tracked, and property maps are coerced to the payload type (a string
//! literal in property-map position is parsed as a JSON document).

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::ast;
use crate::expr::errors::ExprError;
use crate::expr::functions;
use crate::expr::{
    AggregateFnCall, GraphField, Literal, LogicalExpr, Operator, OperatorApplication, PropertyGet,
    ValueKind,
};

/// A variable binding visible to expressions: the value expression and its
/// kind. For a deferred vertex the expression is a
/// [`LogicalExpr::FutureRef`].
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    pub expr: LogicalExpr,
    pub kind: ValueKind,
}

/// Scope lookup implemented by the clause compilation context.
pub trait BindingResolver {
    fn resolve_variable(&self, name: &str) -> Option<CompiledBinding>;
}

#[derive(Debug, PartialEq, Clone)]
pub struct TypedExpr {
    pub expr: LogicalExpr,
    pub kind: ValueKind,
}

impl TypedExpr {
    fn scalar(expr: LogicalExpr) -> Self {
        TypedExpr {
            expr,
            kind: ValueKind::Scalar,
        }
    }
}

pub struct ExprCompiler<'a> {
    bindings: &'a dyn BindingResolver,
}

impl<'a> ExprCompiler<'a> {
    pub fn new(bindings: &'a dyn BindingResolver) -> Self {
        ExprCompiler { bindings }
    }

    pub fn compile(&self, expr: &ast::Expression) -> Result<TypedExpr, ExprError> {
        match expr {
            ast::Expression::Literal(lit) => Ok(TypedExpr::scalar(compile_literal(lit))),

            ast::Expression::Variable(name) => self
                .bindings
                .resolve_variable(name)
                .map(|b| TypedExpr {
                    expr: b.expr,
                    kind: b.kind,
                })
                .ok_or_else(|| ExprError::UnknownVariable { name: name.clone() }),

            ast::Expression::PropertyAccess { base, key } => {
                let base = self.compile(base)?;
                let payload = match base.kind {
                    ValueKind::Vertex | ValueKind::Edge => {
                        LogicalExpr::field(base.expr, GraphField::Properties)
                    }
                    // nested payload member access
                    ValueKind::Scalar => base.expr,
                    ValueKind::Path => {
                        return Err(ExprError::KindMismatch {
                            expected: "vertex or edge".to_string(),
                            found: base.kind.to_string(),
                        })
                    }
                };
                Ok(TypedExpr::scalar(LogicalExpr::PropertyGet(PropertyGet {
                    payload: Box::new(payload),
                    key: key.clone(),
                })))
            }

            ast::Expression::Operator(app) => {
                let operands = app
                    .operands
                    .iter()
                    .map(|o| self.compile(o).map(|t| t.expr))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypedExpr::scalar(LogicalExpr::Operator(
                    OperatorApplication {
                        operator: compile_operator(app.operator),
                        operands,
                    },
                )))
            }

            ast::Expression::FunctionCall {
                name,
                args,
                distinct,
            } => self.compile_function(name, args, *distinct),

            ast::Expression::Map(entries) => {
                let compiled = entries
                    .iter()
                    .map(|(k, v)| self.compile(v).map(|t| (k.clone(), t.expr)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypedExpr::scalar(LogicalExpr::MapLiteral(compiled)))
            }

            ast::Expression::List(items) => {
                let compiled = items
                    .iter()
                    .map(|i| self.compile(i).map(|t| t.expr))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypedExpr::scalar(LogicalExpr::List(compiled)))
            }

            ast::Expression::Parameter(name) => {
                Ok(TypedExpr::scalar(LogicalExpr::Parameter(name.clone())))
            }
        }
    }

    pub fn compile_expecting(
        &self,
        expr: &ast::Expression,
        expected: ValueKind,
    ) -> Result<TypedExpr, ExprError> {
        crate::expr::expect_kind(self.compile(expr)?, expected)
    }

    /// Compile a property-map expression and coerce it to the payload type.
    ///
    /// Map literals fold to a constant payload document when every value is
    /// constant; string literals are parsed as JSON documents; anything that
    /// cannot carry a payload is a coercion failure.
    pub fn compile_property_map(&self, expr: &ast::Expression) -> Result<LogicalExpr, ExprError> {
        match expr {
            ast::Expression::Map(entries) => {
                let compiled = entries
                    .iter()
                    .map(|(k, v)| self.compile(v).map(|t| (k.clone(), t.expr)))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(doc) = fold_constant_map(&compiled) {
                    Ok(LogicalExpr::Payload(doc))
                } else {
                    Ok(LogicalExpr::MapLiteral(compiled))
                }
            }
            ast::Expression::Literal(ast::Literal::String(text)) => serde_json::from_str(text)
                .map(LogicalExpr::Payload)
                .map_err(|_| ExprError::PayloadCoercion {
                    found: format!("unparsable document `{}`", text),
                }),
            ast::Expression::Literal(ast::Literal::Json(doc)) => {
                Ok(LogicalExpr::Payload(doc.clone()))
            }
            ast::Expression::Parameter(name) => Ok(LogicalExpr::Parameter(name.clone())),
            ast::Expression::PropertyAccess { .. } => Ok(self.compile(expr)?.expr),
            other => Err(ExprError::PayloadCoercion {
                found: format!("{:?}", expression_shape(other)),
            }),
        }
    }

    fn compile_function(
        &self,
        name: &str,
        args: &[ast::Expression],
        distinct: bool,
    ) -> Result<TypedExpr, ExprError> {
        let sig = functions::lookup(name).ok_or_else(|| ExprError::UnknownFunction {
            name: name.to_string(),
        })?;
        if !functions::arity_matches(sig, args.len()) {
            return Err(ExprError::FunctionArity {
                name: name.to_string(),
                expected: functions::arity_display(sig),
                found: args.len(),
            });
        }

        let compiled: Vec<TypedExpr> = args
            .iter()
            .map(|a| self.compile(a))
            .collect::<Result<_, _>>()?;

        // graph-value accessors collapse to field access
        if let Some(field) = graph_accessor_field(name) {
            let arg = &compiled[0];
            match (arg.kind, field) {
                (ValueKind::Vertex, GraphField::Id)
                | (ValueKind::Vertex, GraphField::Properties)
                | (ValueKind::Edge, _) => {
                    return Ok(TypedExpr::scalar(LogicalExpr::field(
                        arg.expr.clone(),
                        field,
                    )));
                }
                _ => {}
            }
        }

        let args = compiled.into_iter().map(|t| t.expr).collect();
        let expr = if sig.aggregate {
            LogicalExpr::AggregateFnCall(AggregateFnCall {
                name: name.to_string(),
                args,
                distinct,
            })
        } else {
            LogicalExpr::ScalarFnCall(crate::expr::ScalarFnCall {
                name: name.to_string(),
                args,
            })
        };
        Ok(TypedExpr {
            expr,
            kind: sig.result,
        })
    }
}

fn graph_accessor_field(name: &str) -> Option<GraphField> {
    match name {
        "id" => Some(GraphField::Id),
        "start_id" => Some(GraphField::StartId),
        "end_id" => Some(GraphField::EndId),
        "properties" => Some(GraphField::Properties),
        _ => None,
    }
}

fn compile_literal(lit: &ast::Literal) -> LogicalExpr {
    match lit {
        ast::Literal::Integer(v) => LogicalExpr::Literal(Literal::Integer(*v)),
        ast::Literal::Float(v) => LogicalExpr::Literal(Literal::Float(*v)),
        ast::Literal::Boolean(v) => LogicalExpr::Literal(Literal::Boolean(*v)),
        ast::Literal::String(v) => LogicalExpr::Literal(Literal::String(v.clone())),
        ast::Literal::Null => LogicalExpr::Literal(Literal::Null),
        ast::Literal::Json(v) => LogicalExpr::Payload(v.clone()),
    }
}

fn compile_operator(op: ast::Operator) -> Operator {
    match op {
        ast::Operator::Addition => Operator::Addition,
        ast::Operator::Subtraction => Operator::Subtraction,
        ast::Operator::Multiplication => Operator::Multiplication,
        ast::Operator::Division => Operator::Division,
        ast::Operator::ModuloDivision => Operator::ModuloDivision,
        ast::Operator::Equal => Operator::Equal,
        ast::Operator::NotEqual => Operator::NotEqual,
        ast::Operator::LessThan => Operator::LessThan,
        ast::Operator::GreaterThan => Operator::GreaterThan,
        ast::Operator::LessThanEqual => Operator::LessThanEqual,
        ast::Operator::GreaterThanEqual => Operator::GreaterThanEqual,
        ast::Operator::And => Operator::And,
        ast::Operator::Or => Operator::Or,
        ast::Operator::Not => Operator::Not,
        ast::Operator::In => Operator::In,
        ast::Operator::IsNull => Operator::IsNull,
        ast::Operator::IsNotNull => Operator::IsNotNull,
    }
}

fn fold_constant_map(entries: &[(String, LogicalExpr)]) -> Option<JsonValue> {
    let mut doc = JsonMap::new();
    for (key, value) in entries {
        let json = match value {
            LogicalExpr::Literal(Literal::Integer(v)) => JsonValue::from(*v),
            LogicalExpr::Literal(Literal::Float(v)) => JsonValue::from(*v),
            LogicalExpr::Literal(Literal::Boolean(v)) => JsonValue::from(*v),
            LogicalExpr::Literal(Literal::String(v)) => JsonValue::from(v.clone()),
            LogicalExpr::Literal(Literal::Null) => JsonValue::Null,
            LogicalExpr::Payload(v) => v.clone(),
            _ => return None,
        };
        doc.insert(key.clone(), json);
    }
    Some(JsonValue::Object(doc))
}

fn expression_shape(expr: &ast::Expression) -> &'static str {
    match expr {
        ast::Expression::Literal(_) => "literal",
        ast::Expression::Variable(_) => "variable",
        ast::Expression::PropertyAccess { .. } => "property access",
        ast::Expression::Operator(_) => "operator application",
        ast::Expression::FunctionCall { .. } => "function call",
        ast::Expression::Map(_) => "map",
        ast::Expression::List(_) => "list",
        ast::Expression::Parameter(_) => "parameter",
    }
}

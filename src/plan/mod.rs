//! Relational plan operators emitted by the compiler.
//!
//! The operator set is deliberately small: scans, subquery scopes, inner and
//! left joins, filters, projections with named output columns, unions, and
//! the recursive union used for variable-length traversal. A write clause
//! attaches a [`GraphWriteOp`] mutation descriptor atop its scope via
//! [`LogicalPlan::GraphWrite`]; everything else about the plan is a plain
//! read.
//!
//! A [`Subquery`] introduces a scope: column references inside it resolve
//! against its own relations, and its output columns (named by the top
//! [`Projection`]) are what the enclosing scope sees under the subquery
//! alias.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::expr::{LogicalExpr, ValueKind};
use crate::utils::{serde_arc, serde_arc_vec};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum LogicalPlan {
    /// Zero-relation scope: a single row with no columns. Used as the input
    /// of seed projections (e.g. the zero-length traversal branch).
    Empty,

    Scan(Scan),

    Subquery(Subquery),

    Join(Join),

    Filter(Filter),

    Projection(Projection),

    Union(Union),

    /// Named recursive source: base branch unioned (all rows) with a
    /// recursive branch that may scan the source by name.
    RecursiveUnion(RecursiveUnion),

    /// A graph mutation (create/set/delete) applied on top of the rows
    /// produced by `input`.
    GraphWrite(GraphWrite),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// Fully qualified relation name from the catalog, or the name of a
    /// recursive source in scope.
    pub table: String,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Subquery {
    pub alias: String,
    #[serde(with = "serde_arc")]
    pub input: Arc<LogicalPlan>,
    /// Lateral scopes may reference columns of relations to their left in
    /// the enclosing scope.
    pub lateral: bool,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Join {
    #[serde(with = "serde_arc")]
    pub left: Arc<LogicalPlan>,
    #[serde(with = "serde_arc")]
    pub right: Arc<LogicalPlan>,
    pub join_type: JoinType,
    /// `None` is an unconditional join (cross for inner, `ON true` for
    /// outer).
    pub condition: Option<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Filter {
    #[serde(with = "serde_arc")]
    pub input: Arc<LogicalPlan>,
    pub predicate: LogicalExpr,
}

/// Projection with the scope's named output columns. DISTINCT, ordering and
/// paging are part of the projection node rather than separate operators.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Projection {
    #[serde(with = "serde_arc")]
    pub input: Arc<LogicalPlan>,
    pub items: Vec<ProjectionItem>,
    pub distinct: bool,
    pub order_by: Vec<SortItem>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Projection {
    pub fn new(input: Arc<LogicalPlan>, items: Vec<ProjectionItem>) -> Self {
        Projection {
            input,
            items,
            distinct: false,
            order_by: vec![],
            skip: None,
            limit: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ProjectionItem {
    pub name: String,
    pub expr: LogicalExpr,
    pub kind: ValueKind,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SortItem {
    pub expr: LogicalExpr,
    pub ascending: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Union {
    #[serde(with = "serde_arc_vec")]
    pub inputs: Vec<Arc<LogicalPlan>>,
    /// `true` keeps duplicates (UNION ALL).
    pub all: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RecursiveUnion {
    /// Name under which the recursive branch scans the accumulated rows.
    pub name: String,
    pub columns: Vec<String>,
    #[serde(with = "serde_arc")]
    pub base: Arc<LogicalPlan>,
    #[serde(with = "serde_arc")]
    pub recursive: Arc<LogicalPlan>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GraphWrite {
    #[serde(with = "serde_arc")]
    pub input: Arc<LogicalPlan>,
    pub op: GraphWriteOp,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum GraphWriteOp {
    Create(CreateOp),
    SetProps(SetPropsOp),
    Delete(DeleteOp),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateOp {
    pub paths: Vec<CreatePath>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreatePath {
    pub name: Option<String>,
    pub elements: Vec<CreateElement>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum CreateElement {
    Vertex(CreateVertex),
    Edge(CreateEdge),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateVertex {
    pub variable: Option<String>,
    pub label: Option<String>,
    pub properties: Option<LogicalExpr>,
    /// `false` when the element references a vertex bound by an earlier
    /// clause instead of creating a new row.
    pub create: bool,
}

/// Create clauses only accept directed relationships.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum WriteDirection {
    Left,
    Right,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateEdge {
    pub variable: Option<String>,
    pub type_name: String,
    pub direction: WriteDirection,
    pub properties: Option<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SetPropsOp {
    pub items: Vec<SetPropItem>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SetPropItem {
    /// Variable name of the written binding, when the target is a plain
    /// variable or a property of one; lets the executor address the
    /// binding directly.
    pub variable: Option<String>,
    pub target: LogicalExpr,
    /// Property path inside the payload; empty replaces the whole payload.
    pub path: Vec<String>,
    pub value: LogicalExpr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DeleteOp {
    pub detach: bool,
    pub targets: Vec<DeleteTarget>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DeleteTarget {
    pub expr: LogicalExpr,
    pub kind: ValueKind,
}

impl LogicalPlan {
    pub fn scan(table: impl Into<String>, alias: impl Into<String>) -> Arc<LogicalPlan> {
        Arc::new(LogicalPlan::Scan(Scan {
            table: table.into(),
            alias: alias.into(),
        }))
    }

    pub fn subquery(alias: impl Into<String>, input: Arc<LogicalPlan>) -> Arc<LogicalPlan> {
        Arc::new(LogicalPlan::Subquery(Subquery {
            alias: alias.into(),
            input,
            lateral: false,
        }))
    }

    pub fn lateral_subquery(alias: impl Into<String>, input: Arc<LogicalPlan>) -> Arc<LogicalPlan> {
        Arc::new(LogicalPlan::Subquery(Subquery {
            alias: alias.into(),
            input,
            lateral: true,
        }))
    }

    /// Wrap `input` in a filter when a predicate is present.
    pub fn filtered(input: Arc<LogicalPlan>, predicate: Option<LogicalExpr>) -> Arc<LogicalPlan> {
        match predicate {
            None => input,
            Some(predicate) => Arc::new(LogicalPlan::Filter(Filter { input, predicate })),
        }
    }

    /// The output columns of this plan, when it ends in a projection.
    pub fn output_items(&self) -> Option<&[ProjectionItem]> {
        match self {
            LogicalPlan::Projection(p) => Some(&p.items),
            LogicalPlan::GraphWrite(w) => w.input.output_items(),
            LogicalPlan::Filter(f) => f.input.output_items(),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_indent(f, 0)
    }
}

impl LogicalPlan {
    fn fmt_with_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            LogicalPlan::Empty => writeln!(f, "{}Empty", pad),
            LogicalPlan::Scan(s) => writeln!(f, "{}Scan: {} as {}", pad, s.table, s.alias),
            LogicalPlan::Subquery(s) => {
                writeln!(
                    f,
                    "{}Subquery: {}{}",
                    pad,
                    s.alias,
                    if s.lateral { " (lateral)" } else { "" }
                )?;
                s.input.fmt_with_indent(f, indent + 1)
            }
            LogicalPlan::Join(j) => {
                writeln!(f, "{}Join: {:?} on {:?}", pad, j.join_type, j.condition)?;
                j.left.fmt_with_indent(f, indent + 1)?;
                j.right.fmt_with_indent(f, indent + 1)
            }
            LogicalPlan::Filter(x) => {
                writeln!(f, "{}Filter: {:?}", pad, x.predicate)?;
                x.input.fmt_with_indent(f, indent + 1)
            }
            LogicalPlan::Projection(p) => {
                let names: Vec<&str> = p.items.iter().map(|i| i.name.as_str()).collect();
                writeln!(f, "{}Projection: [{}]", pad, names.join(", "))?;
                p.input.fmt_with_indent(f, indent + 1)
            }
            LogicalPlan::Union(u) => {
                writeln!(f, "{}Union{}", pad, if u.all { " ALL" } else { "" })?;
                for input in &u.inputs {
                    input.fmt_with_indent(f, indent + 1)?;
                }
                Ok(())
            }
            LogicalPlan::RecursiveUnion(r) => {
                writeln!(
                    f,
                    "{}RecursiveUnion: {} [{}]",
                    pad,
                    r.name,
                    r.columns.join(", ")
                )?;
                r.base.fmt_with_indent(f, indent + 1)?;
                r.recursive.fmt_with_indent(f, indent + 1)
            }
            LogicalPlan::GraphWrite(w) => {
                let op = match &w.op {
                    GraphWriteOp::Create(_) => "create",
                    GraphWriteOp::SetProps(_) => "set",
                    GraphWriteOp::Delete(_) => "delete",
                };
                writeln!(f, "{}GraphWrite: {}", pad, op)?;
                w.input.fmt_with_indent(f, indent + 1)
            }
        }
    }
}

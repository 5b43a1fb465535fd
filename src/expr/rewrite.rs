//! Structure-preserving rewriting of expression and plan trees.
//!
//! One visitor serves every tree-wide substitution the compiler performs,
//! most importantly replacing deferred-vertex references once a vertex is
//! resolved. The visitor carries the current scope depth: descending into a
//! subquery or a recursive branch increments it, so a callback can match
//! occurrences relative to the scope that owns them.
//!
//! The callback is applied pre-order: returning `Some(replacement)` stops
//! recursion below that node, returning `None` recurses structurally.

use std::sync::Arc;

use crate::expr::{
    AggregateFnCall, FieldAccess, LogicalExpr, MakeEdge, MakePath, MakeVertex, OperatorApplication,
    PropertyGet, ScalarFnCall,
};
use crate::plan::{
    CreateElement, CreateOp, CreatePath, CreateVertex, DeleteOp, DeleteTarget, Filter, GraphWrite,
    GraphWriteOp, Join, LogicalPlan, Projection, ProjectionItem, RecursiveUnion, SetPropItem,
    SetPropsOp, SortItem, Subquery, Union,
};

#[derive(Debug, Default)]
pub struct RewriteCtx {
    pub depth: usize,
}

pub fn transform_expr<F>(expr: &LogicalExpr, ctx: &mut RewriteCtx, f: &mut F) -> LogicalExpr
where
    F: FnMut(&LogicalExpr, &mut RewriteCtx) -> Option<LogicalExpr>,
{
    if let Some(replacement) = f(expr, ctx) {
        return replacement;
    }

    match expr {
        LogicalExpr::Literal(_)
        | LogicalExpr::Column(_)
        | LogicalExpr::Parameter(_)
        | LogicalExpr::Payload(_)
        | LogicalExpr::FutureRef(_) => expr.clone(),

        LogicalExpr::FieldAccess(fa) => LogicalExpr::FieldAccess(FieldAccess {
            base: Box::new(transform_expr(&fa.base, ctx, f)),
            field: fa.field,
        }),

        LogicalExpr::PropertyGet(pg) => LogicalExpr::PropertyGet(PropertyGet {
            payload: Box::new(transform_expr(&pg.payload, ctx, f)),
            key: pg.key.clone(),
        }),

        LogicalExpr::Operator(app) => LogicalExpr::Operator(OperatorApplication {
            operator: app.operator,
            operands: app
                .operands
                .iter()
                .map(|o| transform_expr(o, ctx, f))
                .collect(),
        }),

        LogicalExpr::ScalarFnCall(call) => LogicalExpr::ScalarFnCall(ScalarFnCall {
            name: call.name.clone(),
            args: call.args.iter().map(|a| transform_expr(a, ctx, f)).collect(),
        }),

        LogicalExpr::AggregateFnCall(call) => LogicalExpr::AggregateFnCall(AggregateFnCall {
            name: call.name.clone(),
            args: call.args.iter().map(|a| transform_expr(a, ctx, f)).collect(),
            distinct: call.distinct,
        }),

        LogicalExpr::List(items) => {
            LogicalExpr::List(items.iter().map(|i| transform_expr(i, ctx, f)).collect())
        }

        LogicalExpr::MapLiteral(entries) => LogicalExpr::MapLiteral(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), transform_expr(v, ctx, f)))
                .collect(),
        ),

        LogicalExpr::MakeVertex(v) => LogicalExpr::MakeVertex(MakeVertex {
            id: Box::new(transform_expr(&v.id, ctx, f)),
            properties: Box::new(transform_expr(&v.properties, ctx, f)),
        }),

        LogicalExpr::MakeEdge(e) => LogicalExpr::MakeEdge(MakeEdge {
            id: Box::new(transform_expr(&e.id, ctx, f)),
            start: Box::new(transform_expr(&e.start, ctx, f)),
            end: Box::new(transform_expr(&e.end, ctx, f)),
            properties: Box::new(transform_expr(&e.properties, ctx, f)),
        }),

        LogicalExpr::MakePath(p) => LogicalExpr::MakePath(MakePath {
            elements: p.elements.iter().map(|e| transform_expr(e, ctx, f)).collect(),
        }),
    }
}

pub fn transform_plan<F>(plan: &Arc<LogicalPlan>, ctx: &mut RewriteCtx, f: &mut F) -> Arc<LogicalPlan>
where
    F: FnMut(&LogicalExpr, &mut RewriteCtx) -> Option<LogicalExpr>,
{
    let rebuilt = match plan.as_ref() {
        LogicalPlan::Empty => LogicalPlan::Empty,

        LogicalPlan::Scan(s) => LogicalPlan::Scan(s.clone()),

        LogicalPlan::Subquery(s) => {
            ctx.depth += 1;
            let input = transform_plan(&s.input, ctx, f);
            ctx.depth -= 1;
            LogicalPlan::Subquery(Subquery {
                alias: s.alias.clone(),
                input,
                lateral: s.lateral,
            })
        }

        LogicalPlan::Join(j) => LogicalPlan::Join(Join {
            left: transform_plan(&j.left, ctx, f),
            right: transform_plan(&j.right, ctx, f),
            join_type: j.join_type,
            condition: j.condition.as_ref().map(|c| transform_expr(c, ctx, f)),
        }),

        LogicalPlan::Filter(x) => LogicalPlan::Filter(Filter {
            input: transform_plan(&x.input, ctx, f),
            predicate: transform_expr(&x.predicate, ctx, f),
        }),

        LogicalPlan::Projection(p) => LogicalPlan::Projection(Projection {
            input: transform_plan(&p.input, ctx, f),
            items: p
                .items
                .iter()
                .map(|item| ProjectionItem {
                    name: item.name.clone(),
                    expr: transform_expr(&item.expr, ctx, f),
                    kind: item.kind,
                })
                .collect(),
            distinct: p.distinct,
            order_by: p
                .order_by
                .iter()
                .map(|s| SortItem {
                    expr: transform_expr(&s.expr, ctx, f),
                    ascending: s.ascending,
                })
                .collect(),
            skip: p.skip,
            limit: p.limit,
        }),

        LogicalPlan::Union(u) => LogicalPlan::Union(Union {
            inputs: u.inputs.iter().map(|i| transform_plan(i, ctx, f)).collect(),
            all: u.all,
        }),

        LogicalPlan::RecursiveUnion(r) => {
            ctx.depth += 1;
            let base = transform_plan(&r.base, ctx, f);
            let recursive = transform_plan(&r.recursive, ctx, f);
            ctx.depth -= 1;
            LogicalPlan::RecursiveUnion(RecursiveUnion {
                name: r.name.clone(),
                columns: r.columns.clone(),
                base,
                recursive,
            })
        }

        LogicalPlan::GraphWrite(w) => LogicalPlan::GraphWrite(GraphWrite {
            input: transform_plan(&w.input, ctx, f),
            op: transform_write_op(&w.op, ctx, f),
        }),
    };
    Arc::new(rebuilt)
}

fn transform_write_op<F>(op: &GraphWriteOp, ctx: &mut RewriteCtx, f: &mut F) -> GraphWriteOp
where
    F: FnMut(&LogicalExpr, &mut RewriteCtx) -> Option<LogicalExpr>,
{
    match op {
        GraphWriteOp::Create(create) => GraphWriteOp::Create(CreateOp {
            paths: create
                .paths
                .iter()
                .map(|path| CreatePath {
                    name: path.name.clone(),
                    elements: path
                        .elements
                        .iter()
                        .map(|elem| match elem {
                            CreateElement::Vertex(v) => CreateElement::Vertex(CreateVertex {
                                variable: v.variable.clone(),
                                label: v.label.clone(),
                                properties: v
                                    .properties
                                    .as_ref()
                                    .map(|p| transform_expr(p, ctx, f)),
                                create: v.create,
                            }),
                            CreateElement::Edge(e) => {
                                let mut edge = e.clone();
                                edge.properties =
                                    e.properties.as_ref().map(|p| transform_expr(p, ctx, f));
                                CreateElement::Edge(edge)
                            }
                        })
                        .collect(),
                })
                .collect(),
        }),

        GraphWriteOp::SetProps(set) => GraphWriteOp::SetProps(SetPropsOp {
            items: set
                .items
                .iter()
                .map(|item| SetPropItem {
                    variable: item.variable.clone(),
                    target: transform_expr(&item.target, ctx, f),
                    path: item.path.clone(),
                    value: transform_expr(&item.value, ctx, f),
                })
                .collect(),
        }),

        GraphWriteOp::Delete(delete) => GraphWriteOp::Delete(DeleteOp {
            detach: delete.detach,
            targets: delete
                .targets
                .iter()
                .map(|t| DeleteTarget {
                    expr: transform_expr(&t.expr, ctx, f),
                    kind: t.kind,
                })
                .collect(),
        }),
    }
}

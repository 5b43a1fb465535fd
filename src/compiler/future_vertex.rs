//! Deferred ("future") vertex tracking and resolution.
//!
//! A vertex that is only ever needed for its identifier never gets a scan:
//! it lives as a cell in [`FutureVertexArena`], addressed by a stable
//! [`FutureId`], carrying the expression that derives its identifier (an
//! adjacent edge's endpoint column, or the `id` field of a wrapped
//! placeholder column). Expressions reference the cell through
//! [`LogicalExpr::FutureRef`].
//!
//! Cell life cycle: Unbound (no identifier) → Deferred (identifier known)
//! → Resolved (scan created, row value memoized). Resolution happens at
//! most once per cell no matter how many references trigger it; every
//! reference then observes the same memoized value. When a clause scope is
//! wrapped, cells whose placeholder column is still exported are rebound
//! to the wrapped column (scope depth incremented); unexported cells
//! become unreachable, since bindings only hand out handles of exported
//! columns.

use std::sync::Arc;

use crate::catalog::{columns, Catalog};
use crate::compiler::errors::CompileError;
use crate::compiler::plan_ctx::{PlanCtx, ScopeColumn};
use crate::expr::{
    transform_expr, FutureId, GraphField, LogicalExpr, RewriteCtx, ValueKind,
};
use crate::plan::{JoinType, LogicalPlan, Projection, ProjectionItem};

#[derive(Debug, Clone)]
pub struct FutureVertexCell {
    pub variable: String,
    /// `None` is the wildcard vertex label.
    pub label: Option<String>,
    /// Created under an optional pattern; resolution uses an outer join.
    pub nullable: bool,
    /// How many scope wraps this cell has been carried through.
    pub scope_depth: usize,
    /// Identifier expression, once derivable.
    pub id_expr: Option<LogicalExpr>,
    /// Memoized row value after resolution.
    pub resolved: Option<LogicalExpr>,
}

/// Outcome of recording an identifier for a cell.
pub enum IdentifierOutcome {
    /// First identifier, stored.
    Recorded,
    /// The cell already had one; the caller must equate them.
    AlreadyKnown(LogicalExpr),
}

#[derive(Debug, Default)]
pub struct FutureVertexArena {
    cells: Vec<FutureVertexCell>,
}

/// Resolution behavior of [`resolve_future_refs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveFlags {
    /// Substitute only already-resolved cells; leave deferred ones alone.
    pub dont_resolve: bool,
    /// Attach the vertex scan to the from-list with a plain predicate
    /// instead of building the (outer) join; used while compiling the qual
    /// of an optional pattern.
    pub ignore_nullable: bool,
}

impl FutureVertexArena {
    pub fn new() -> Self {
        FutureVertexArena::default()
    }

    pub fn add(&mut self, variable: &str, label: Option<String>, nullable: bool) -> FutureId {
        let handle = FutureId(self.cells.len());
        log::debug!(
            "deferring vertex `{}` (label {:?}, nullable {})",
            variable,
            label,
            nullable
        );
        self.cells.push(FutureVertexCell {
            variable: variable.to_string(),
            label,
            nullable,
            scope_depth: 0,
            id_expr: None,
            resolved: None,
        });
        handle
    }

    pub fn cell(&self, handle: FutureId) -> &FutureVertexCell {
        &self.cells[handle.0]
    }

    pub fn is_unresolved(&self, handle: FutureId) -> bool {
        self.cells[handle.0].resolved.is_none()
    }

    /// Record the identifier expression derived for a deferred vertex. A
    /// second derivation (the vertex reappearing next to another edge) is
    /// returned so the caller can equate both identifiers instead of
    /// losing the first.
    pub fn record_identifier(
        &mut self,
        handle: FutureId,
        id_expr: LogicalExpr,
    ) -> IdentifierOutcome {
        let cell = &mut self.cells[handle.0];
        match &cell.id_expr {
            None => {
                cell.id_expr = Some(id_expr);
                IdentifierOutcome::Recorded
            }
            Some(existing) => IdentifierOutcome::AlreadyKnown(existing.clone()),
        }
    }

    /// Rebind deferred vertices when a scope is wrapped: each group maps
    /// the wrapped scope's alias to the columns it exports. An unresolved
    /// cell whose placeholder column is exported gets its identifier
    /// re-derived from the wrapped column and its depth incremented.
    ///
    /// Cells not exported by any group are left alone: nothing can reach
    /// them any more (bindings only hand out handles of exported columns),
    /// and a variable resolved or dropped in one scope must not disturb
    /// cells owned by an enclosing scope.
    pub fn rebind_for_wrap(&mut self, groups: &[(&str, &[ScopeColumn])]) {
        for (alias, cols) in groups {
            for col in cols.iter() {
                let handle = match col.future {
                    Some(handle) => handle,
                    None => continue,
                };
                let cell = &mut self.cells[handle.0];
                if cell.resolved.is_some() {
                    continue;
                }
                cell.id_expr = Some(LogicalExpr::field(
                    LogicalExpr::column(*alias, &col.name),
                    GraphField::Id,
                ));
                cell.scope_depth += 1;
            }
        }
    }

    /// Resolve a deferred vertex: build the label scan wrapped as a
    /// one-column subquery, join it to the current scope on the derived
    /// identifier (outer join when nullable), memoize the row value. At
    /// most one scan is ever created per cell.
    pub fn resolve(
        &mut self,
        handle: FutureId,
        ctx: &mut PlanCtx,
        catalog: &Catalog,
        ignore_nullable: bool,
    ) -> Result<LogicalExpr, CompileError> {
        if let Some(resolved) = &self.cells[handle.0].resolved {
            return Ok(resolved.clone());
        }

        let (variable, label, nullable, id_expr) = {
            let cell = &self.cells[handle.0];
            (
                cell.variable.clone(),
                cell.label.clone(),
                cell.nullable,
                cell.id_expr.clone(),
            )
        };
        let id_expr = id_expr.ok_or(CompileError::UnresolvableVertex {
            variable: variable.clone(),
        })?;

        let relation = catalog.resolve_vertex_label(label.as_deref())?;
        let alias = variable.clone();
        log::debug!(
            "resolving deferred vertex `{}` against {} ({})",
            variable,
            relation.table,
            if nullable { "left join" } else { "inner join" }
        );

        let scan = LogicalPlan::scan(&relation.table, &alias);
        let value = LogicalExpr::make_vertex(
            LogicalExpr::column(&alias, columns::ID),
            LogicalExpr::column(&alias, columns::PROPERTIES),
        );
        let inner = Arc::new(LogicalPlan::Projection(Projection::new(
            scan,
            vec![ProjectionItem {
                name: alias.clone(),
                expr: value,
                kind: ValueKind::Vertex,
            }],
        )));
        let subquery = LogicalPlan::subquery(&alias, inner);

        let row = LogicalExpr::column(&alias, &alias);
        let condition = LogicalExpr::eq(
            id_expr,
            LogicalExpr::field(row.clone(), GraphField::Id),
        );

        if ignore_nullable {
            ctx.add_from(subquery);
            ctx.add_resolved_qual(condition);
        } else {
            let join_type = if nullable {
                JoinType::Left
            } else {
                JoinType::Inner
            };
            ctx.join_last(subquery, join_type, Some(condition));
        }

        self.cells[handle.0].resolved = Some(row.clone());
        Ok(row)
    }

    /// Replace every deferred reference left in a finished expression:
    /// resolved cells substitute their memoized row, unresolved cells a
    /// placeholder vertex carrying only the derived identifier. Nested
    /// scopes are traversed depth-aware by the shared rewriter.
    pub fn materialize_expr(&self, expr: &LogicalExpr) -> LogicalExpr {
        transform_expr(expr, &mut RewriteCtx::default(), &mut |e, _| match e {
            LogicalExpr::FutureRef(handle) => Some(self.placeholder_value(*handle)),
            _ => None,
        })
    }

    /// The value a not-yet-resolved vertex exports: its identifier paired
    /// with an empty payload.
    pub fn placeholder_value(&self, handle: FutureId) -> LogicalExpr {
        let cell = &self.cells[handle.0];
        match &cell.resolved {
            Some(resolved) => resolved.clone(),
            None => LogicalExpr::make_vertex(
                cell.id_expr.clone().unwrap_or_else(LogicalExpr::null),
                LogicalExpr::null(),
            ),
        }
    }
}

/// Resolve deferred references inside one expression, honoring `flags`.
///
/// Direct arguments of an aggregate that are bare deferred references stay
/// deferred: aggregate semantics require resolution past the aggregation
/// boundary, so only composite arguments are descended into.
pub fn resolve_future_refs(
    expr: &LogicalExpr,
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    flags: ResolveFlags,
) -> Result<LogicalExpr, CompileError> {
    match expr {
        LogicalExpr::FutureRef(handle) => {
            if flags.dont_resolve && arena.is_unresolved(*handle) {
                return Ok(expr.clone());
            }
            arena.resolve(*handle, ctx, catalog, flags.ignore_nullable)
        }

        LogicalExpr::AggregateFnCall(call) => {
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                match arg {
                    LogicalExpr::FutureRef(_) => args.push(arg.clone()),
                    other => args.push(resolve_future_refs(other, ctx, arena, catalog, flags)?),
                }
            }
            Ok(LogicalExpr::AggregateFnCall(crate::expr::AggregateFnCall {
                name: call.name.clone(),
                args,
                distinct: call.distinct,
            }))
        }

        // structural recursion via the shared walker is not possible here
        // because resolution is fallible and mutates the scope, so each
        // composite variant recurses explicitly
        LogicalExpr::FieldAccess(fa) => Ok(LogicalExpr::FieldAccess(crate::expr::FieldAccess {
            base: Box::new(resolve_future_refs(&fa.base, ctx, arena, catalog, flags)?),
            field: fa.field,
        })),

        LogicalExpr::PropertyGet(pg) => Ok(LogicalExpr::PropertyGet(crate::expr::PropertyGet {
            payload: Box::new(resolve_future_refs(&pg.payload, ctx, arena, catalog, flags)?),
            key: pg.key.clone(),
        })),

        LogicalExpr::Operator(app) => {
            let operands = app
                .operands
                .iter()
                .map(|o| resolve_future_refs(o, ctx, arena, catalog, flags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpr::Operator(crate::expr::OperatorApplication {
                operator: app.operator,
                operands,
            }))
        }

        LogicalExpr::ScalarFnCall(call) => {
            let args = call
                .args
                .iter()
                .map(|a| resolve_future_refs(a, ctx, arena, catalog, flags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpr::scalar_fn(call.name.clone(), args))
        }

        LogicalExpr::List(items) => {
            let items = items
                .iter()
                .map(|i| resolve_future_refs(i, ctx, arena, catalog, flags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpr::List(items))
        }

        LogicalExpr::MapLiteral(entries) => {
            let entries = entries
                .iter()
                .map(|(k, v)| {
                    resolve_future_refs(v, ctx, arena, catalog, flags).map(|v| (k.clone(), v))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpr::MapLiteral(entries))
        }

        LogicalExpr::MakeVertex(v) => Ok(LogicalExpr::make_vertex(
            resolve_future_refs(&v.id, ctx, arena, catalog, flags)?,
            resolve_future_refs(&v.properties, ctx, arena, catalog, flags)?,
        )),

        LogicalExpr::MakeEdge(e) => Ok(LogicalExpr::make_edge(
            resolve_future_refs(&e.id, ctx, arena, catalog, flags)?,
            resolve_future_refs(&e.start, ctx, arena, catalog, flags)?,
            resolve_future_refs(&e.end, ctx, arena, catalog, flags)?,
            resolve_future_refs(&e.properties, ctx, arena, catalog, flags)?,
        )),

        LogicalExpr::MakePath(p) => {
            let elements = p
                .elements
                .iter()
                .map(|e| resolve_future_refs(e, ctx, arena, catalog, flags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpr::MakePath(crate::expr::MakePath { elements }))
        }

        LogicalExpr::Literal(_)
        | LogicalExpr::Column(_)
        | LogicalExpr::Parameter(_)
        | LogicalExpr::Payload(_) => Ok(expr.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        Catalog::builder("g").vertex_label("Person", "person").build()
    }

    fn deferred_cell(arena: &mut FutureVertexArena) -> FutureId {
        let handle = arena.add("b", Some("Person".to_string()), false);
        arena.record_identifier(handle, LogicalExpr::column("e", "end_id"));
        handle
    }

    #[test]
    fn resolving_twice_creates_one_scan_and_shares_the_row() {
        let catalog = catalog();
        let mut arena = FutureVertexArena::new();
        let mut ctx = PlanCtx::new();
        ctx.add_from(LogicalPlan::scan("g.edges", "e"));
        let handle = deferred_cell(&mut arena);

        let first = arena.resolve(handle, &mut ctx, &catalog, false).unwrap();
        let second = arena.resolve(handle, &mut ctx, &catalog, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, LogicalExpr::column("b", "b"));

        // exactly one join got attached to the from-list
        let scope = ctx.fold(&arena);
        let rendered = format!("{}", scope.plan);
        assert_eq!(rendered.matches("g.person").count(), 1);
    }

    #[test]
    fn nullable_cells_resolve_through_a_left_join() {
        let catalog = catalog();
        let mut arena = FutureVertexArena::new();
        let mut ctx = PlanCtx::new();
        ctx.add_from(LogicalPlan::scan("g.edges", "e"));
        let handle = arena.add("b", None, true);
        arena.record_identifier(handle, LogicalExpr::column("e", "end_id"));

        arena.resolve(handle, &mut ctx, &catalog, false).unwrap();
        let scope = ctx.fold(&arena);
        assert!(format!("{}", scope.plan).contains("Left"));
    }

    #[test]
    fn ignore_nullable_skips_the_outer_join() {
        let catalog = catalog();
        let mut arena = FutureVertexArena::new();
        let mut ctx = PlanCtx::new();
        ctx.add_from(LogicalPlan::scan("g.edges", "e"));
        let handle = arena.add("b", None, true);
        arena.record_identifier(handle, LogicalExpr::column("e", "end_id"));

        arena.resolve(handle, &mut ctx, &catalog, true).unwrap();
        let scope = ctx.fold(&arena);
        let rendered = format!("{}", scope.plan);
        assert!(!rendered.contains("Left"));
        // the equality landed in the filter instead
        assert!(rendered.contains("Filter"));
    }

    #[test]
    fn second_identifier_is_reported_not_overwritten() {
        let mut arena = FutureVertexArena::new();
        let handle = deferred_cell(&mut arena);
        match arena.record_identifier(handle, LogicalExpr::column("e2", "start_id")) {
            IdentifierOutcome::AlreadyKnown(existing) => {
                assert_eq!(existing, LogicalExpr::column("e", "end_id"));
            }
            IdentifierOutcome::Recorded => panic!("identifier was silently replaced"),
        }
    }

    #[test]
    fn unresolved_placeholder_carries_the_identifier() {
        let mut arena = FutureVertexArena::new();
        let handle = deferred_cell(&mut arena);
        let value = arena.placeholder_value(handle);
        assert_eq!(
            value,
            LogicalExpr::make_vertex(LogicalExpr::column("e", "end_id"), LogicalExpr::null())
        );
    }

    #[test]
    fn dont_resolve_substitutes_only_resolved_cells() {
        let catalog = catalog();
        let mut arena = FutureVertexArena::new();
        let mut ctx = PlanCtx::new();
        ctx.add_from(LogicalPlan::scan("g.edges", "e"));
        let resolved_cell = deferred_cell(&mut arena);
        arena.resolve(resolved_cell, &mut ctx, &catalog, false).unwrap();
        let deferred = arena.add("c", None, false);

        let expr = LogicalExpr::List(vec![
            LogicalExpr::FutureRef(resolved_cell),
            LogicalExpr::FutureRef(deferred),
        ]);
        let flags = ResolveFlags {
            dont_resolve: true,
            ignore_nullable: false,
        };
        let out = resolve_future_refs(&expr, &mut ctx, &mut arena, &catalog, flags).unwrap();
        assert_eq!(
            out,
            LogicalExpr::List(vec![
                LogicalExpr::column("b", "b"),
                LogicalExpr::FutureRef(deferred),
            ])
        );
        assert!(arena.is_unresolved(deferred));
    }

    #[test]
    fn aggregate_direct_arguments_stay_deferred() {
        let catalog = catalog();
        let mut arena = FutureVertexArena::new();
        let mut ctx = PlanCtx::new();
        ctx.add_from(LogicalPlan::scan("g.edges", "e"));
        let handle = deferred_cell(&mut arena);

        let agg = LogicalExpr::AggregateFnCall(crate::expr::AggregateFnCall {
            name: "count".to_string(),
            args: vec![LogicalExpr::FutureRef(handle)],
            distinct: false,
        });
        let out = resolve_future_refs(&agg, &mut ctx, &mut arena, &catalog, ResolveFlags::default())
            .unwrap();
        assert_eq!(out, agg);
        assert!(arena.is_unresolved(handle));
    }
}

//! Per-clause compilation context.
//!
//! A [`PlanCtx`] accumulates what one clause scope is made of: the from-list
//! of relations joined so far, the named output columns, the pending
//! predicate, and the bookkeeping the pattern walk needs (in-clause scan
//! aliases, the traversal seed, optional-match mode). Folding the context
//! produces the scope's plan — from-list folded into joins, predicate
//! applied as a filter, outputs projected under their names — plus the
//! column metadata the next clause rebinds against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::constraints::ElemQual;
use crate::compiler::future_vertex::FutureVertexArena;
use crate::compiler::variable_length::VlrSeed;
use crate::expr::{
    conjoin, BindingResolver, CompiledBinding, FutureId, LogicalExpr, ValueKind,
};
use crate::plan::{
    Filter, Join, JoinType, LogicalPlan, Projection, ProjectionItem, SortItem,
};

/// Alias under which a previous clause's scope is wrapped.
pub const SCOPE_ALIAS: &str = "_";
/// Alias of the optional-match side of a left join.
pub const OPTIONAL_SCOPE_ALIAS: &str = "_o";

/// One named output column of the scope being compiled.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub name: String,
    pub expr: LogicalExpr,
    pub kind: ValueKind,
    /// Deferred-vertex handle when this column carries an unresolved
    /// vertex.
    pub future: Option<FutureId>,
}

/// Column metadata exported by a folded scope.
#[derive(Debug, Clone)]
pub struct ScopeColumn {
    pub name: String,
    pub kind: ValueKind,
    pub future: Option<FutureId>,
}

/// A fully compiled clause scope: its plan, its exported columns, and any
/// containment obligations not yet materialized into predicates.
#[derive(Debug, Clone)]
pub struct CompiledScope {
    pub plan: Arc<LogicalPlan>,
    pub columns: Vec<ScopeColumn>,
    pub elem_quals: Vec<ElemQual>,
}

#[derive(Debug)]
pub struct PlanCtx {
    from_items: Vec<Arc<LogicalPlan>>,
    qual: Option<LogicalExpr>,
    /// Predicates produced by resolving deferred vertices in
    /// ignore-nullable mode; conjoined with `qual` at fold time.
    resolved_qual: Option<LogicalExpr>,
    outputs: Vec<OutputColumn>,
    /// Variables scanned in this clause, for direct column access on
    /// repeated occurrences.
    scan_aliases: HashMap<String, String>,
    /// Columns of the enclosing left side visible laterally (optional
    /// match); referenced as columns of [`SCOPE_ALIAS`].
    lateral_bindings: Vec<ScopeColumn>,
    elem_quals: Vec<ElemQual>,
    optional_mode: bool,
    alias_counter: u32,
    traversal_counter: u32,
    /// Start-identifier seed for the next variable-length expansion.
    pub vlr_seed: Option<VlrSeed>,
}

impl PlanCtx {
    pub fn new() -> Self {
        PlanCtx {
            from_items: vec![],
            qual: None,
            resolved_qual: None,
            outputs: vec![],
            scan_aliases: HashMap::new(),
            lateral_bindings: vec![],
            elem_quals: vec![],
            optional_mode: false,
            alias_counter: 0,
            traversal_counter: 0,
            vlr_seed: None,
        }
    }

    /// Start a new clause scope on top of a previous one: the previous plan
    /// becomes a subquery under [`SCOPE_ALIAS`], its columns are re-exported
    /// by name, and surviving deferred vertices are rebound to the wrapped
    /// columns (their scope depth incremented).
    pub fn from_scope(scope: CompiledScope, arena: &mut FutureVertexArena) -> Self {
        let mut ctx = PlanCtx::new();
        arena.rebind_for_wrap(&[(SCOPE_ALIAS, scope.columns.as_slice())]);
        ctx.outputs = scope
            .columns
            .iter()
            .map(|c| OutputColumn {
                name: c.name.clone(),
                expr: LogicalExpr::column(SCOPE_ALIAS, &c.name),
                kind: c.kind,
                future: c.future.filter(|h| arena.is_unresolved(*h)),
            })
            .collect();
        ctx.elem_quals = scope.elem_quals;
        ctx.from_items
            .push(LogicalPlan::subquery(SCOPE_ALIAS, scope.plan));
        ctx
    }

    pub fn set_optional_mode(&mut self, enabled: bool) {
        self.optional_mode = enabled;
    }

    pub fn is_optional_mode(&self) -> bool {
        self.optional_mode
    }

    pub fn set_lateral_bindings(&mut self, columns: Vec<ScopeColumn>) {
        self.lateral_bindings = columns;
    }

    pub fn find_lateral(&self, name: &str) -> Option<&ScopeColumn> {
        self.lateral_bindings.iter().find(|c| c.name == name)
    }

    /// Alias for a new relation: the variable name when there is one, a
    /// generated `t<n>` otherwise.
    pub fn next_alias(&mut self, hint: Option<&str>) -> String {
        match hint {
            Some(name) => name.to_string(),
            None => {
                self.alias_counter += 1;
                format!("t{}", self.alias_counter)
            }
        }
    }

    pub fn next_traversal_name(&mut self) -> String {
        self.traversal_counter += 1;
        format!("vlr{}", self.traversal_counter)
    }

    pub fn add_from(&mut self, item: Arc<LogicalPlan>) {
        self.from_items.push(item);
    }

    /// Join `right` onto the last from-list entry, the way deferred-vertex
    /// resolution attaches its vertex scan.
    pub fn join_last(
        &mut self,
        right: Arc<LogicalPlan>,
        join_type: JoinType,
        condition: Option<LogicalExpr>,
    ) {
        match self.from_items.pop() {
            Some(left) => self.from_items.push(Arc::new(LogicalPlan::Join(Join {
                left,
                right,
                join_type,
                condition,
            }))),
            None => {
                self.from_items.push(right);
                if let Some(cond) = condition {
                    self.add_qual(cond);
                }
            }
        }
    }

    pub fn add_qual(&mut self, expr: LogicalExpr) {
        self.qual = conjoin(self.qual.take(), expr);
    }

    pub fn add_resolved_qual(&mut self, expr: LogicalExpr) {
        self.resolved_qual = conjoin(self.resolved_qual.take(), expr);
    }

    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|c| c.name == name)
    }

    pub fn output(&self, index: usize) -> &OutputColumn {
        &self.outputs[index]
    }

    pub fn outputs(&self) -> &[OutputColumn] {
        &self.outputs
    }

    pub fn add_output(&mut self, column: OutputColumn) -> usize {
        self.outputs.push(column);
        self.outputs.len() - 1
    }

    /// Replace the output list wholesale (projection clauses define their
    /// own items).
    pub fn set_outputs(&mut self, outputs: Vec<OutputColumn>) {
        self.outputs = outputs;
    }

    pub fn register_scan_alias(&mut self, variable: &str, alias: &str) {
        self.scan_aliases
            .insert(variable.to_string(), alias.to_string());
    }

    pub fn scan_alias_of(&self, variable: &str) -> Option<&String> {
        self.scan_aliases.get(variable)
    }

    pub fn register_elem_qual(&mut self, column: &str, constraint: crate::ast::Expression) {
        self.elem_quals.push(ElemQual {
            column: column.to_string(),
            constraint,
        });
    }

    pub fn take_elem_quals(&mut self) -> Vec<ElemQual> {
        std::mem::take(&mut self.elem_quals)
    }

    pub fn carry_elem_quals(&mut self, mut quals: Vec<ElemQual>) {
        self.elem_quals.append(&mut quals);
    }

    /// Fold the context into its scope plan. Remaining deferred references
    /// in output expressions are materialized: resolved cells substitute
    /// their memoized row, unresolved cells a placeholder carrying only the
    /// identifier.
    pub fn fold(self, arena: &FutureVertexArena) -> CompiledScope {
        self.fold_with(arena, false, vec![], None, None)
    }

    pub fn fold_with(
        self,
        arena: &FutureVertexArena,
        distinct: bool,
        order_by: Vec<SortItem>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> CompiledScope {
        let mut from = self.from_items.into_iter();
        let joined = match from.next() {
            None => Arc::new(LogicalPlan::Empty),
            Some(first) => from.fold(first, |left, right| {
                Arc::new(LogicalPlan::Join(Join {
                    left,
                    right,
                    join_type: JoinType::Inner,
                    condition: None,
                }))
            }),
        };

        let qual = match (self.qual, self.resolved_qual) {
            (q, None) => q,
            (None, r) => r,
            (Some(q), Some(r)) => conjoin(Some(q), r),
        };
        let filtered = match qual {
            None => joined,
            Some(predicate) => Arc::new(LogicalPlan::Filter(Filter {
                input: joined,
                predicate: arena.materialize_expr(&predicate),
            })),
        };

        let mut columns = Vec::with_capacity(self.outputs.len());
        let items = self
            .outputs
            .into_iter()
            .map(|col| {
                columns.push(ScopeColumn {
                    name: col.name.clone(),
                    kind: col.kind,
                    future: col.future.filter(|h| arena.is_unresolved(*h)),
                });
                ProjectionItem {
                    name: col.name,
                    expr: arena.materialize_expr(&col.expr),
                    kind: col.kind,
                }
            })
            .collect();

        let plan = Arc::new(LogicalPlan::Projection(Projection {
            input: filtered,
            items,
            distinct,
            order_by,
            skip,
            limit,
        }));

        CompiledScope {
            plan,
            columns,
            elem_quals: self.elem_quals,
        }
    }
}

impl Default for PlanCtx {
    fn default() -> Self {
        PlanCtx::new()
    }
}

impl BindingResolver for PlanCtx {
    fn resolve_variable(&self, name: &str) -> Option<CompiledBinding> {
        if let Some(idx) = self.find_output(name) {
            let col = &self.outputs[idx];
            let expr = match col.future {
                Some(handle) => LogicalExpr::FutureRef(handle),
                None => col.expr.clone(),
            };
            return Some(CompiledBinding {
                expr,
                kind: col.kind,
            });
        }
        if let Some(col) = self.find_lateral(name) {
            let expr = match col.future {
                Some(handle) => LogicalExpr::FutureRef(handle),
                None => LogicalExpr::column(SCOPE_ALIAS, &col.name),
            };
            return Some(CompiledBinding {
                expr,
                kind: col.kind,
            });
        }
        None
    }
}

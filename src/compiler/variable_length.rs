//! Variable-length relationship expansion.
//!
//! A quantified edge `[min, max]` compiles into a two-branch recursive
//! source: the base branch seeds the traversal (an identity row for
//! `min == 0`, otherwise one hop filtered to the known start identifier),
//! and the recursive branch extends the frontier one hop at a time,
//! excluding any relationship whose identifier already appears in the
//! accumulated path array and capping the depth when `max` is bounded.
//! Both branches union as all-rows; a wrapping projection keeps rows with
//! `level >= min` and re-exposes the endpoint columns under the same names
//! single-hop edges use, so the chain walk joins traversals and plain
//! edges identically.
//!
//! The internal `start`/`end` columns keep the relation's raw orientation;
//! the pattern direction only decides which side the traversal is anchored
//! on and which side each new hop extends. Seeding from the far endpoint
//! (when only the pattern-right side has a derivable identifier) therefore
//! just flips both decisions.

use std::sync::Arc;

use crate::ast::{Direction, HopRange, RelPattern};
use crate::catalog::{columns, Catalog};
use crate::compiler::errors::CompileError;
use crate::compiler::plan_ctx::PlanCtx;
use crate::expr::{conjoin, LogicalExpr, Operator};
use crate::plan::{Join, JoinType, LogicalPlan, Projection, ProjectionItem, RecursiveUnion, Union};

/// Internal column names of the recursive source.
pub const COL_START: &str = "start";
pub const COL_END: &str = "end";
pub const COL_LEVEL: &str = "level";
/// Ordered array of traversed relationship identifiers.
pub const COL_PATH: &str = "path";

const HOP_ALIAS: &str = "_e";

/// Start-identifier seed for an expansion, derived before the edge is
/// compiled.
#[derive(Debug, Clone)]
pub struct VlrSeed {
    pub vid: LogicalExpr,
    /// The identifier anchors the pattern-right endpoint; expansion walks
    /// backwards with directions swapped.
    pub far_end: bool,
}

/// Compile one quantified edge into a lateral subquery under `alias` and
/// attach it to the scope's from-list. The subquery exposes the endpoint
/// columns (named like a single-hop edge's), `level`, and `path`.
pub fn expand(
    ctx: &mut PlanCtx,
    catalog: &Catalog,
    rel: &RelPattern,
    hops: HopRange,
    alias: &str,
    prop_payload: Option<LogicalExpr>,
    seed: Option<VlrSeed>,
) -> Result<(), CompileError> {
    if let Some(max) = hops.max {
        if hops.min > max {
            return Err(CompileError::MalformedPattern {
                message: format!("invalid hop range [{}, {}]", hops.min, max),
            });
        }
    }

    let relation = catalog.resolve_edge_type(rel.types.first().map(String::as_str))?;
    let either = rel.direction == Direction::Either;
    let name = ctx.next_traversal_name();

    let walk_forward = !seed.as_ref().map_or(false, |s| s.far_end);
    // raw-orientation column the traversal is anchored on
    let anchor_col = match (rel.direction, walk_forward) {
        (Direction::Left, true) | (Direction::Right, false) | (Direction::Either, false) => {
            columns::END
        }
        _ => columns::START,
    };
    // which side each new hop extends
    let extend_on_end = match (rel.direction, walk_forward) {
        (Direction::Left, true) => false,
        (Direction::Left, false) => true,
        (_, forward) => forward,
    };

    let prop_filter = |target: &str| {
        prop_payload.as_ref().map(|payload| {
            LogicalExpr::binary(
                Operator::Contains,
                LogicalExpr::column(target, columns::PROPERTIES),
                payload.clone(),
            )
        })
    };

    let base_level: u32;
    let base = if hops.min == 0 {
        // identity row: start and end equal the seed, empty path array
        let s = seed.clone().ok_or_else(|| CompileError::UnanchoredTraversal {
            variable: alias.to_string(),
        })?;
        base_level = 0;
        Arc::new(LogicalPlan::Projection(Projection::new(
            Arc::new(LogicalPlan::Empty),
            vec![
                scalar_item(COL_START, s.vid.clone()),
                scalar_item(COL_END, s.vid),
                scalar_item(COL_LEVEL, LogicalExpr::integer(0)),
                scalar_item(COL_PATH, LogicalExpr::List(vec![])),
            ],
        )))
    } else {
        base_level = 1;
        let source = hop_source(&relation.table, either);
        let mut filter = None;
        if let Some(s) = &seed {
            filter = conjoin(
                filter,
                LogicalExpr::eq(LogicalExpr::column(HOP_ALIAS, anchor_col), s.vid.clone()),
            );
        }
        filter = match prop_filter(HOP_ALIAS) {
            Some(p) => conjoin(filter, p),
            None => filter,
        };
        Arc::new(LogicalPlan::Projection(Projection::new(
            LogicalPlan::filtered(source, filter),
            vec![
                scalar_item(COL_START, LogicalExpr::column(HOP_ALIAS, columns::START)),
                scalar_item(COL_END, LogicalExpr::column(HOP_ALIAS, columns::END)),
                scalar_item(COL_LEVEL, LogicalExpr::integer(1)),
                scalar_item(
                    COL_PATH,
                    LogicalExpr::List(vec![LogicalExpr::column(HOP_ALIAS, columns::ID)]),
                ),
            ],
        )))
    };

    let needs_recursion = hops.max.map_or(true, |max| max > base_level);
    let core = if needs_recursion {
        log::debug!(
            "expanding `{}` as recursive traversal {} over {} (min {}, max {:?})",
            alias,
            name,
            relation.table,
            hops.min,
            hops.max
        );
        let recursive = recursive_branch(
            &name,
            &relation.table,
            either,
            extend_on_end,
            hops.max,
            prop_filter(HOP_ALIAS),
        );
        Arc::new(LogicalPlan::RecursiveUnion(RecursiveUnion {
            name: name.clone(),
            columns: vec![
                COL_START.to_string(),
                COL_END.to_string(),
                COL_LEVEL.to_string(),
                COL_PATH.to_string(),
            ],
            base,
            recursive,
        }))
    } else {
        // bounded to the base case alone (e.g. a zero-length leg): no
        // recursive source, just the seed rows under the same name
        LogicalPlan::subquery(&name, base)
    };

    let min_filter = if hops.min > 1 {
        Some(LogicalExpr::binary(
            Operator::GreaterThanEqual,
            LogicalExpr::column(&name, COL_LEVEL),
            LogicalExpr::integer(i64::from(hops.min)),
        ))
    } else {
        None
    };

    let (exposed_start, exposed_end) = if either {
        (columns::UNION_START, columns::UNION_END)
    } else {
        (columns::START, columns::END)
    };
    let outer = Arc::new(LogicalPlan::Projection(Projection::new(
        LogicalPlan::filtered(core, min_filter),
        vec![
            scalar_item(exposed_start, LogicalExpr::column(&name, COL_START)),
            scalar_item(exposed_end, LogicalExpr::column(&name, COL_END)),
            scalar_item(COL_LEVEL, LogicalExpr::column(&name, COL_LEVEL)),
            scalar_item(COL_PATH, LogicalExpr::column(&name, COL_PATH)),
        ],
    )));

    // lateral: the seed may reference relations of the enclosing scope
    ctx.add_from(LogicalPlan::lateral_subquery(alias, outer));
    Ok(())
}

/// One more hop joined onto the frontier: connect on the extension side,
/// refuse relationships already traversed, cap the depth, append the
/// identifier.
fn recursive_branch(
    name: &str,
    table: &str,
    either: bool,
    extend_on_end: bool,
    max: Option<u32>,
    prop_filter: Option<LogicalExpr>,
) -> Arc<LogicalPlan> {
    let frontier = LogicalPlan::scan(name, name);
    let hops = hop_source(table, either);

    let join_cond = if extend_on_end {
        LogicalExpr::eq(
            LogicalExpr::column(name, COL_END),
            LogicalExpr::column(HOP_ALIAS, columns::START),
        )
    } else {
        LogicalExpr::eq(
            LogicalExpr::column(name, COL_START),
            LogicalExpr::column(HOP_ALIAS, columns::END),
        )
    };

    let mut filter = Some(join_cond);
    filter = conjoin(
        filter,
        LogicalExpr::is_null(LogicalExpr::scalar_fn(
            "array_position",
            vec![
                LogicalExpr::column(name, COL_PATH),
                LogicalExpr::column(HOP_ALIAS, columns::ID),
            ],
        )),
    );
    if let Some(max) = max {
        filter = conjoin(
            filter,
            LogicalExpr::binary(
                Operator::LessThan,
                LogicalExpr::column(name, COL_LEVEL),
                LogicalExpr::integer(i64::from(max)),
            ),
        );
    }
    if let Some(p) = prop_filter {
        filter = conjoin(filter, p);
    }

    let (start_expr, end_expr) = if extend_on_end {
        (
            LogicalExpr::column(name, COL_START),
            LogicalExpr::column(HOP_ALIAS, columns::END),
        )
    } else {
        (
            LogicalExpr::column(HOP_ALIAS, columns::START),
            LogicalExpr::column(name, COL_END),
        )
    };

    let joined = Arc::new(LogicalPlan::Join(Join {
        left: frontier,
        right: hops,
        join_type: JoinType::Inner,
        condition: None,
    }));

    Arc::new(LogicalPlan::Projection(Projection::new(
        LogicalPlan::filtered(joined, filter),
        vec![
            scalar_item(COL_START, start_expr),
            scalar_item(COL_END, end_expr),
            scalar_item(
                COL_LEVEL,
                LogicalExpr::binary(
                    Operator::Addition,
                    LogicalExpr::column(name, COL_LEVEL),
                    LogicalExpr::integer(1),
                ),
            ),
            scalar_item(
                COL_PATH,
                LogicalExpr::scalar_fn(
                    "array_append",
                    vec![
                        LogicalExpr::column(name, COL_PATH),
                        LogicalExpr::column(HOP_ALIAS, columns::ID),
                    ],
                ),
            ),
        ],
    )))
}

/// Hop source of one expansion step. `either` uses the relation read
/// forwards unioned with itself read backwards (endpoints swapped), so the
/// traversal follows edges in both orientations.
fn hop_source(table: &str, either: bool) -> Arc<LogicalPlan> {
    if !either {
        return LogicalPlan::scan(table, HOP_ALIAS);
    }

    let oriented = |swap: bool| {
        let (start, end) = if swap {
            (columns::END, columns::START)
        } else {
            (columns::START, columns::END)
        };
        Arc::new(LogicalPlan::Projection(Projection::new(
            LogicalPlan::scan(table, HOP_ALIAS),
            vec![
                scalar_item(columns::ID, LogicalExpr::column(HOP_ALIAS, columns::ID)),
                scalar_item(
                    columns::PROPERTIES,
                    LogicalExpr::column(HOP_ALIAS, columns::PROPERTIES),
                ),
                scalar_item(columns::START, LogicalExpr::column(HOP_ALIAS, start)),
                scalar_item(columns::END, LogicalExpr::column(HOP_ALIAS, end)),
            ],
        )))
    };

    LogicalPlan::subquery(
        HOP_ALIAS,
        Arc::new(LogicalPlan::Union(Union {
            inputs: vec![oriented(false), oriented(true)],
            all: true,
        })),
    )
}

fn scalar_item(name: &str, expr: LogicalExpr) -> ProjectionItem {
    ProjectionItem {
        name: name.to_string(),
        expr,
        kind: crate::expr::ValueKind::Scalar,
    }
}

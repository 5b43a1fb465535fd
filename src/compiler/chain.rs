//! Path chain compilation.
//!
//! Walks one path's chain of alternating node and relationship slots left
//! to right, producing scans and join predicates in the clause scope.
//! Nodes follow the materialization policy: a slot gets a physical scan
//! only when it has a label, a property constraint, anchors a zero-length
//! traversal, is isolated, or belongs to a named path — otherwise a named
//! slot becomes a deferred vertex and an anonymous one a pure placeholder.
//! Quantified relationships delegate to the variable-length expander;
//! every edge registers its identifier (or path array) for the
//! component's uniqueness predicates.

use crate::ast::{Direction, NodePattern, PathElement, PathPattern, PatternGraph, RelPattern};
use crate::catalog::{columns, Catalog};
use crate::compiler::constraints::UniqueEdgeSet;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::{FutureVertexArena, IdentifierOutcome};
use crate::compiler::plan_ctx::{OutputColumn, PlanCtx, SCOPE_ALIAS};
use crate::compiler::preprocess::NodeInfoMap;
use crate::compiler::variable_length::{self, VlrSeed, COL_PATH};
use crate::expr::{ExprCompiler, GraphField, LogicalExpr, MakePath, ValueKind};
use crate::plan::{LogicalPlan, Projection, ProjectionItem, Union};
use std::sync::Arc;

/// How a node slot ended up represented in the scope.
#[derive(Debug, Clone)]
pub enum VertexRepr {
    /// Anonymous, purely structural; nothing to join.
    Placeholder,
    /// Backed by a physical scan in this clause.
    ScanAlias(String),
    /// An output column: bound from an enclosing scope, or a deferred
    /// vertex placeholder.
    Output(usize),
}

#[derive(Debug, Clone)]
pub struct EdgeRepr {
    pub alias: String,
    pub varlen: bool,
}

/// Compile every path of every component, then emit the per-component
/// relationship-uniqueness predicates.
pub fn compile_pattern(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    pattern: &PatternGraph,
    node_info: &NodeInfoMap,
    components: &[Vec<usize>],
) -> Result<(), CompileError> {
    for component in components {
        let mut unique = UniqueEdgeSet::default();
        for &path_index in component {
            compile_path(
                ctx,
                arena,
                catalog,
                &pattern.paths[path_index],
                node_info,
                &mut unique,
            )?;
        }
        for predicate in unique.into_predicates() {
            ctx.add_qual(predicate);
        }
    }
    Ok(())
}

fn compile_path(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    path: &PathPattern,
    node_info: &NodeInfoMap,
    unique: &mut UniqueEdgeSet,
) -> Result<(), CompileError> {
    if let Some(name) = &path.name {
        if ctx.find_output(name).is_some() || ctx.find_lateral(name).is_some() {
            return Err(CompileError::DuplicateVariable { name: name.clone() });
        }
    }
    let out = path.name.is_some();

    let (nodes, rels) = split_chain(path)?;

    let mut path_vertices: Vec<LogicalExpr> = vec![];
    let mut path_edges: Vec<LogicalExpr> = vec![];

    let mut vertex = if rels.is_empty() {
        // vertex-only path
        transform_match_node(ctx, arena, catalog, node_info, nodes[0], true)?
    } else {
        let zero = rels[0].hops.map_or(false, |h| h.is_zero_min());
        transform_match_node(ctx, arena, catalog, node_info, nodes[0], zero || out)?
    };

    let mut prev_edge: Option<EdgeRepr> = None;
    let mut pending_vertex: Option<VertexRepr> = None;

    for (k, rel) in rels.iter().enumerate() {
        let prev_rel = if k > 0 { Some(rels[k - 1]) } else { None };
        set_initial_vid(ctx, arena, rel, &vertex, prev_rel, prev_edge.as_ref());
        if rel.is_variable_length() && ctx.vlr_seed.is_none() {
            anchor_far_end(
                ctx,
                arena,
                catalog,
                node_info,
                nodes[k + 1],
                out,
                &mut pending_vertex,
            )?;
        }

        let edge = transform_match_rel(ctx, catalog, rel)?;

        if k == 0 {
            add_qual_node_in(ctx, arena, &vertex, rel, &edge, false)?;
        } else if let (Some(prev_rel), Some(prev)) = (prev_rel, prev_edge.as_ref()) {
            // edges stay connected even across placeholder middle vertices
            add_qual_rel_path(ctx, prev_rel, prev, rel, &edge);
        }

        if rel.is_variable_length() {
            unique.add_path_array(LogicalExpr::column(&edge.alias, COL_PATH));
        } else {
            unique.add_edge_id(LogicalExpr::column(&edge.alias, columns::ID));
        }

        if out {
            path_vertices.push(vertex_value(ctx, arena, &vertex));
            path_edges.push(edge_value(&edge));
        }

        let next = match pending_vertex.take() {
            Some(repr) => repr,
            None => transform_match_node(ctx, arena, catalog, node_info, nodes[k + 1], out)?,
        };
        add_qual_node_in(ctx, arena, &next, rel, &edge, true)?;

        prev_edge = Some(edge);
        vertex = next;
    }

    if let Some(name) = &path.name {
        path_vertices.push(vertex_value(ctx, arena, &vertex));
        let mut elements = Vec::with_capacity(path_vertices.len() + path_edges.len());
        for (i, edge) in path_edges.into_iter().enumerate() {
            elements.push(path_vertices[i].clone());
            elements.push(edge);
        }
        if let Some(last) = path_vertices.last() {
            elements.push(last.clone());
        }
        ctx.add_output(OutputColumn {
            name: name.clone(),
            expr: LogicalExpr::MakePath(MakePath { elements }),
            kind: ValueKind::Path,
            future: None,
        });
    }

    Ok(())
}

/// Split a chain into its nodes and relationships, checking alternation.
pub(crate) fn split_chain<'p>(
    path: &'p PathPattern,
) -> Result<(Vec<&'p NodePattern>, Vec<&'p RelPattern>), CompileError> {
    let mut nodes = vec![];
    let mut rels = vec![];
    for (index, element) in path.elements.iter().enumerate() {
        match (index % 2 == 0, element) {
            (true, PathElement::Node(node)) => nodes.push(node),
            (false, PathElement::Rel(rel)) => rels.push(rel),
            _ => {
                return Err(CompileError::MalformedPattern {
                    message: "chain must alternate nodes and relationships".to_string(),
                })
            }
        }
    }
    if nodes.is_empty() || nodes.len() != rels.len() + 1 {
        return Err(CompileError::MalformedPattern {
            message: "chain must start and end with a node".to_string(),
        });
    }
    Ok((nodes, rels))
}

/// Compile one node slot, following the materialization policy. `force`
/// requires a physical row (named path, zero-length anchor, isolated
/// node).
fn transform_match_node(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    node_info: &NodeInfoMap,
    node: &NodePattern,
    force: bool,
) -> Result<VertexRepr, CompileError> {
    if let Some(variable) = &node.variable {
        // already processed in this clause, or re-exported from the
        // previous one
        if let Some(index) = ctx.find_output(variable) {
            if ctx.output(index).kind != ValueKind::Vertex {
                return Err(CompileError::DuplicateVariable {
                    name: variable.clone(),
                });
            }
            if let Some(props) = &node.properties {
                let column = ctx.output(index).name.clone();
                ctx.register_elem_qual(&column, props.clone());
            }
            if let Some(alias) = ctx.scan_alias_of(variable) {
                return Ok(VertexRepr::ScanAlias(alias.clone()));
            }
            return Ok(VertexRepr::Output(index));
        }

        // visible laterally from the left side of an optional pattern
        if let Some(lateral) = ctx.find_lateral(variable).cloned() {
            if node.label.is_some() || lateral.kind != ValueKind::Vertex {
                return Err(CompileError::DuplicateVariable {
                    name: variable.clone(),
                });
            }
            let future = lateral.future.filter(|h| arena.is_unresolved(*h));
            let index = ctx.add_output(OutputColumn {
                name: variable.clone(),
                expr: LogicalExpr::column(SCOPE_ALIAS, &lateral.name),
                kind: ValueKind::Vertex,
                future,
            });
            if let Some(props) = &node.properties {
                ctx.register_elem_qual(variable, props.clone());
            }
            return Ok(VertexRepr::Output(index));
        }
    }

    let (label, prop_constr) = match &node.variable {
        Some(variable) => match node_info.get(variable) {
            Some(info) => (info.label.clone(), info.prop_constraint),
            None => (node.label.clone(), node.properties.is_some()),
        },
        None => (node.label.clone(), node.properties.is_some()),
    };

    if label.is_some() || prop_constr || force {
        let relation = catalog.resolve_vertex_label(label.as_deref())?;
        let alias = ctx.next_alias(node.variable.as_deref());
        log::debug!("scanning {} as `{}`", relation.table, alias);
        ctx.add_from(LogicalPlan::scan(&relation.table, &alias));

        if node.variable.is_some() || prop_constr {
            ctx.add_output(OutputColumn {
                name: alias.clone(),
                expr: LogicalExpr::make_vertex(
                    LogicalExpr::column(&alias, columns::ID),
                    LogicalExpr::column(&alias, columns::PROPERTIES),
                ),
                kind: ValueKind::Vertex,
                future: None,
            });
            if let Some(props) = &node.properties {
                ctx.register_elem_qual(&alias, props.clone());
            }
        }
        if let Some(variable) = &node.variable {
            ctx.register_scan_alias(variable, &alias);
        }
        return Ok(VertexRepr::ScanAlias(alias));
    }

    let variable = match &node.variable {
        // purely structural: relationships join through it, nothing else
        None => return Ok(VertexRepr::Placeholder),
        Some(variable) => variable,
    };

    // named but nothing demands a row yet: defer
    let handle = arena.add(variable, None, ctx.is_optional_mode());
    let index = ctx.add_output(OutputColumn {
        name: variable.clone(),
        expr: LogicalExpr::FutureRef(handle),
        kind: ValueKind::Vertex,
        future: Some(handle),
    });
    Ok(VertexRepr::Output(index))
}

/// Compile one relationship slot into a scan (or undirected union), or
/// delegate a quantified one to the expander.
fn transform_match_rel(
    ctx: &mut PlanCtx,
    catalog: &Catalog,
    rel: &RelPattern,
) -> Result<EdgeRepr, CompileError> {
    if let Some(variable) = &rel.variable {
        // relationship variables are never reusable
        if ctx.find_output(variable).is_some() || ctx.find_lateral(variable).is_some() {
            return Err(CompileError::DuplicateVariable {
                name: variable.clone(),
            });
        }
    }
    if rel.types.len() > 1 {
        return Err(CompileError::MultipleRelTypes);
    }

    if let Some(hops) = rel.hops {
        let alias = ctx.next_alias(rel.variable.as_deref());
        let payload = match &rel.properties {
            Some(props) => {
                let compiler = ExprCompiler::new(ctx);
                Some(compiler.compile_property_map(props)?)
            }
            None => None,
        };
        let seed = ctx.vlr_seed.take();
        variable_length::expand(ctx, catalog, rel, hops, &alias, payload, seed)?;
        if let Some(variable) = &rel.variable {
            ctx.add_output(OutputColumn {
                name: variable.clone(),
                expr: LogicalExpr::column(&alias, COL_PATH),
                kind: ValueKind::Scalar,
                future: None,
            });
        }
        return Ok(EdgeRepr {
            alias,
            varlen: true,
        });
    }

    let relation = catalog.resolve_edge_type(rel.types.first().map(String::as_str))?;
    let alias = ctx.next_alias(rel.variable.as_deref());
    let source = if rel.direction == Direction::Either {
        edge_union(&relation.table, &alias)
    } else {
        LogicalPlan::scan(&relation.table, &alias)
    };
    ctx.add_from(source);

    if rel.variable.is_some() || rel.properties.is_some() {
        ctx.add_output(OutputColumn {
            name: alias.clone(),
            expr: LogicalExpr::make_edge(
                LogicalExpr::column(&alias, columns::ID),
                LogicalExpr::column(&alias, columns::START),
                LogicalExpr::column(&alias, columns::END),
                LogicalExpr::column(&alias, columns::PROPERTIES),
            ),
            kind: ValueKind::Edge,
            future: None,
        });
        if let Some(props) = &rel.properties {
            ctx.register_elem_qual(&alias, props.clone());
        }
    }

    Ok(EdgeRepr {
        alias,
        varlen: false,
    })
}

/// The relation read forwards unioned with itself read backwards, for
/// direction-agnostic single-hop edges. True endpoints stay available for
/// the edge value; `_start`/`_end` carry the traversal orientation.
fn edge_union(table: &str, alias: &str) -> Arc<LogicalPlan> {
    let oriented = |swap: bool| {
        let (u_start, u_end) = if swap {
            (columns::END, columns::START)
        } else {
            (columns::START, columns::END)
        };
        let item = |name: &str, column: &str| ProjectionItem {
            name: name.to_string(),
            expr: LogicalExpr::column(alias, column),
            kind: ValueKind::Scalar,
        };
        Arc::new(LogicalPlan::Projection(Projection::new(
            LogicalPlan::scan(table, alias),
            vec![
                item(columns::ID, columns::ID),
                item(columns::START, columns::START),
                item(columns::END, columns::END),
                item(columns::PROPERTIES, columns::PROPERTIES),
                item(columns::UNION_START, u_start),
                item(columns::UNION_END, u_end),
            ],
        )))
    };

    LogicalPlan::subquery(
        alias,
        Arc::new(LogicalPlan::Union(Union {
            inputs: vec![oriented(false), oriented(true)],
            all: true,
        })),
    )
}

/// Endpoint column of an edge relation (or expanded traversal) facing the
/// previous (`prev`) or next chain vertex, per the pattern direction.
fn edge_endpoint_col(rel: &RelPattern, prev: bool) -> &'static str {
    match (rel.direction, prev) {
        (Direction::Right, false) => columns::START,
        (Direction::Right, true) => columns::END,
        (Direction::Left, false) => columns::END,
        (Direction::Left, true) => columns::START,
        (Direction::Either, false) => columns::UNION_START,
        (Direction::Either, true) => columns::UNION_END,
    }
}

/// Derive the traversal seed for an upcoming quantified relationship from
/// the vertex before it, in priority order: the previous edge's endpoint
/// column, the scanned vertex's id column, the id field of a bound value.
fn set_initial_vid(
    ctx: &mut PlanCtx,
    arena: &FutureVertexArena,
    rel: &RelPattern,
    vertex: &VertexRepr,
    prev_rel: Option<&RelPattern>,
    prev_edge: Option<&EdgeRepr>,
) {
    ctx.vlr_seed = None;
    if !rel.is_variable_length() {
        return;
    }

    let deferred = match vertex {
        VertexRepr::Placeholder => true,
        VertexRepr::Output(index) => ctx
            .output(*index)
            .future
            .map_or(false, |h| arena.is_unresolved(h)),
        VertexRepr::ScanAlias(_) => false,
    };
    if deferred {
        if let (Some(prev_rel), Some(prev_edge)) = (prev_rel, prev_edge) {
            ctx.vlr_seed = Some(VlrSeed {
                vid: LogicalExpr::column(&prev_edge.alias, edge_endpoint_col(prev_rel, true)),
                far_end: false,
            });
        }
        return;
    }

    let vid = match vertex {
        VertexRepr::ScanAlias(alias) => LogicalExpr::column(alias, columns::ID),
        VertexRepr::Output(index) => {
            LogicalExpr::field(ctx.output(*index).expr.clone(), GraphField::Id)
        }
        VertexRepr::Placeholder => return,
    };
    ctx.vlr_seed = Some(VlrSeed {
        vid,
        far_end: false,
    });
}

/// When a traversal has no derivable start identifier, try its far
/// endpoint: if that node is bound or will be scanned anyway, compile it
/// early and anchor the expansion there with directions swapped.
fn anchor_far_end(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    node_info: &NodeInfoMap,
    next_node: &NodePattern,
    out: bool,
    pending: &mut Option<VertexRepr>,
) -> Result<(), CompileError> {
    let derivable = match &next_node.variable {
        Some(variable) => {
            ctx.find_output(variable).is_some()
                || ctx.find_lateral(variable).is_some()
                || node_info
                    .get(variable)
                    .map_or(false, |info| info.label.is_some() || info.prop_constraint)
        }
        None => next_node.label.is_some() || next_node.properties.is_some(),
    };
    if !derivable {
        return Ok(());
    }

    let repr = transform_match_node(ctx, arena, catalog, node_info, next_node, out)?;
    let vid = match &repr {
        VertexRepr::ScanAlias(alias) => Some(LogicalExpr::column(alias, columns::ID)),
        VertexRepr::Output(index) => {
            let col = ctx.output(*index);
            if col.future.map_or(false, |h| arena.is_unresolved(h)) {
                None
            } else {
                Some(LogicalExpr::field(col.expr.clone(), GraphField::Id))
            }
        }
        VertexRepr::Placeholder => None,
    };
    if let Some(vid) = vid {
        log::debug!("anchoring traversal at its far endpoint");
        ctx.vlr_seed = Some(VlrSeed {
            vid,
            far_end: true,
        });
    }
    *pending = Some(repr);
    Ok(())
}

/// Join a vertex to an adjacent edge's endpoint column, or record the
/// endpoint as a deferred vertex's identifier.
fn add_qual_node_in(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    vertex: &VertexRepr,
    rel: &RelPattern,
    edge: &EdgeRepr,
    prev: bool,
) -> Result<(), CompileError> {
    let endpoint = || LogicalExpr::column(&edge.alias, edge_endpoint_col(rel, prev));

    match vertex {
        VertexRepr::Placeholder => Ok(()),

        VertexRepr::Output(index)
            if ctx
                .output(*index)
                .future
                .map_or(false, |h| arena.is_unresolved(h)) =>
        {
            let handle = match ctx.output(*index).future {
                Some(handle) => handle,
                None => return Ok(()),
            };
            match arena.record_identifier(handle, endpoint()) {
                IdentifierOutcome::Recorded => {}
                // the vertex reappeared next to another edge: equate both
                // derivations instead of losing one
                IdentifierOutcome::AlreadyKnown(existing) => {
                    ctx.add_qual(LogicalExpr::eq(existing, endpoint()));
                }
            }
            Ok(())
        }

        // the seed filter already anchors a traversal's start side
        _ if edge.varlen && !prev => Ok(()),

        VertexRepr::ScanAlias(alias) => {
            ctx.add_qual(LogicalExpr::eq(
                LogicalExpr::column(alias, columns::ID),
                endpoint(),
            ));
            Ok(())
        }

        VertexRepr::Output(index) => {
            let id = LogicalExpr::field(ctx.output(*index).expr.clone(), GraphField::Id);
            ctx.add_qual(LogicalExpr::eq(id, endpoint()));
            Ok(())
        }
    }
}

/// Join two consecutive edges on their shared endpoint columns.
fn add_qual_rel_path(
    ctx: &mut PlanCtx,
    prev_rel: &RelPattern,
    prev_edge: &EdgeRepr,
    rel: &RelPattern,
    edge: &EdgeRepr,
) {
    ctx.add_qual(LogicalExpr::eq(
        LogicalExpr::column(&prev_edge.alias, edge_endpoint_col(prev_rel, true)),
        LogicalExpr::column(&edge.alias, edge_endpoint_col(rel, false)),
    ));
}

fn vertex_value(ctx: &PlanCtx, arena: &FutureVertexArena, vertex: &VertexRepr) -> LogicalExpr {
    match vertex {
        VertexRepr::ScanAlias(alias) => LogicalExpr::make_vertex(
            LogicalExpr::column(alias, columns::ID),
            LogicalExpr::column(alias, columns::PROPERTIES),
        ),
        VertexRepr::Output(index) => {
            let col = ctx.output(*index);
            match col.future.filter(|h| arena.is_unresolved(*h)) {
                Some(handle) => LogicalExpr::FutureRef(handle),
                None => col.expr.clone(),
            }
        }
        // named paths force materialization, a placeholder cannot appear
        VertexRepr::Placeholder => LogicalExpr::null(),
    }
}

fn edge_value(edge: &EdgeRepr) -> LogicalExpr {
    if edge.varlen {
        LogicalExpr::column(&edge.alias, COL_PATH)
    } else {
        LogicalExpr::make_edge(
            LogicalExpr::column(&edge.alias, columns::ID),
            LogicalExpr::column(&edge.alias, columns::START),
            LogicalExpr::column(&edge.alias, columns::END),
            LogicalExpr::column(&edge.alias, columns::PROPERTIES),
        )
    }
}

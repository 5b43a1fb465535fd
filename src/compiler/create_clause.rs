//! CREATE clause compilation.
//!
//! The pattern becomes a [`CreateOp`] mutation descriptor attached atop
//! the previous scope. A node slot whose variable is already bound — with
//! no label and no property map — references the existing vertex instead
//! of creating one; everything else creates. CREATE only accepts directed,
//! single-type, single-hop relationships, and a relationship variable can
//! never reuse an existing name.

use std::sync::Arc;

use crate::ast::{CreateClause, Direction, NodePattern, PatternGraph, RelPattern};
use crate::catalog::Catalog;
use crate::compiler::chain::split_chain;
use crate::compiler::errors::CompileError;
use crate::compiler::future_vertex::{resolve_future_refs, FutureVertexArena, ResolveFlags};
use crate::compiler::plan_ctx::{CompiledScope, OutputColumn, PlanCtx};
use crate::expr::{ExprCompiler, LogicalExpr, ValueKind};
use crate::plan::{
    CreateElement, CreateEdge, CreateOp, CreatePath, CreateVertex, GraphWrite, GraphWriteOp,
    LogicalPlan, WriteDirection,
};

/// Compile one or more merged CREATE clauses (adjacent CREATEs share one
/// descriptor, earlier patterns first).
pub fn compile_create(
    clauses: &[&CreateClause],
    prev: Option<CompiledScope>,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
) -> Result<CompiledScope, CompileError> {
    let mut ctx = match prev {
        Some(scope) => PlanCtx::from_scope(scope, arena),
        None => PlanCtx::new(),
    };

    let mut paths = vec![];
    for clause in clauses {
        compile_create_pattern(&mut ctx, arena, catalog, &clause.pattern, &mut paths)?;
    }

    let scope = ctx.fold(arena);
    let plan = Arc::new(LogicalPlan::GraphWrite(GraphWrite {
        input: scope.plan,
        op: GraphWriteOp::Create(CreateOp { paths }),
    }));
    Ok(CompiledScope {
        plan,
        columns: scope.columns,
        elem_quals: scope.elem_quals,
    })
}

fn compile_create_pattern(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    pattern: &PatternGraph,
    paths: &mut Vec<CreatePath>,
) -> Result<(), CompileError> {
    for path in &pattern.paths {
        if let Some(name) = &path.name {
            if ctx.find_output(name).is_some() || ctx.find_lateral(name).is_some() {
                return Err(CompileError::DuplicateVariable { name: name.clone() });
            }
        }

        let (nodes, rels) = split_chain(path)?;
        let chain_len = path.elements.len();

        let mut elements = Vec::with_capacity(chain_len);
        for (k, node) in nodes.iter().enumerate() {
            let vertex = transform_create_node(ctx, arena, catalog, node, chain_len)?;
            elements.push(CreateElement::Vertex(vertex));
            if let Some(rel) = rels.get(k) {
                let edge = transform_create_rel(ctx, arena, catalog, rel)?;
                elements.push(CreateElement::Edge(edge));
            }
        }

        if let Some(name) = &path.name {
            // room for the created path value, filled in by the executor
            ctx.add_output(OutputColumn {
                name: name.clone(),
                expr: LogicalExpr::null(),
                kind: ValueKind::Path,
                future: None,
            });
        }

        paths.push(CreatePath {
            name: path.name.clone(),
            elements,
        });
    }
    Ok(())
}

fn transform_create_node(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    node: &NodePattern,
    chain_len: usize,
) -> Result<CreateVertex, CompileError> {
    let mut create = true;
    if let Some(variable) = &node.variable {
        let bound = ctx
            .find_output(variable)
            .map(|i| ctx.output(i).kind)
            .or_else(|| ctx.find_lateral(variable).map(|c| c.kind));
        if let Some(kind) = bound {
            let is_reference = node.label.is_none() && node.properties.is_none();
            if kind != ValueKind::Vertex || !is_reference {
                return Err(CompileError::DuplicateVariable {
                    name: variable.clone(),
                });
            }
            create = false;
        }
    }

    if !create && chain_len <= 1 {
        // a lone referenced node creates nothing
        return Err(CompileError::MissingRelationship);
    }

    let properties = match (create, &node.properties) {
        (true, Some(props)) => {
            let compiled = {
                let compiler = ExprCompiler::new(ctx);
                compiler.compile_property_map(props)?
            };
            Some(resolve_future_refs(
                &compiled,
                ctx,
                arena,
                catalog,
                ResolveFlags::default(),
            )?)
        }
        _ => None,
    };

    if create {
        if let Some(variable) = &node.variable {
            // room for the created vertex, filled in by the executor
            ctx.add_output(OutputColumn {
                name: variable.clone(),
                expr: LogicalExpr::null(),
                kind: ValueKind::Vertex,
                future: None,
            });
        }
    }

    Ok(CreateVertex {
        variable: node.variable.clone(),
        label: node.label.clone(),
        properties,
        create,
    })
}

fn transform_create_rel(
    ctx: &mut PlanCtx,
    arena: &mut FutureVertexArena,
    catalog: &Catalog,
    rel: &RelPattern,
) -> Result<CreateEdge, CompileError> {
    let direction = match rel.direction {
        Direction::Left => WriteDirection::Left,
        Direction::Right => WriteDirection::Right,
        Direction::Either => {
            return Err(CompileError::UnsupportedInCreate {
                feature: "an undirected relationship".to_string(),
            })
        }
    };
    if rel.hops.is_some() {
        return Err(CompileError::UnsupportedInCreate {
            feature: "a variable-length relationship".to_string(),
        });
    }
    let type_name = match (rel.types.len(), rel.types.first()) {
        (1, Some(type_name)) => type_name.clone(),
        _ => {
            return Err(CompileError::UnsupportedInCreate {
                feature: "a relationship without exactly one type".to_string(),
            })
        }
    };

    if let Some(variable) = &rel.variable {
        // relationships from previous clauses cannot be referenced here
        if ctx.find_output(variable).is_some() || ctx.find_lateral(variable).is_some() {
            return Err(CompileError::DuplicateVariable {
                name: variable.clone(),
            });
        }
    }

    let properties = match &rel.properties {
        Some(props) => {
            let compiled = {
                let compiler = ExprCompiler::new(ctx);
                compiler.compile_property_map(props)?
            };
            Some(resolve_future_refs(
                &compiled,
                ctx,
                arena,
                catalog,
                ResolveFlags::default(),
            )?)
        }
        None => None,
    };

    if let Some(variable) = &rel.variable {
        ctx.add_output(OutputColumn {
            name: variable.clone(),
            expr: LogicalExpr::null(),
            kind: ValueKind::Edge,
            future: None,
        });
    }

    Ok(CreateEdge {
        variable: rel.variable.clone(),
        type_name,
        direction,
        properties,
    })
}

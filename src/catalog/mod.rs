//! Label catalog: maps vertex labels and relationship types to their
//! backing relations.
//!
//! Every vertex relation has the layout `(id, properties)` and every edge
//! relation `(id, start_id, end_id, properties)`; the compiler addresses
//! columns by the names in [`columns`]. Labels without an explicit entry
//! resolve to the graph-wide base relations (all vertices / all edges),
//! which is also where unlabeled pattern elements scan from.
//!
//! The catalog can be loaded from a YAML document:
//!
//! ```yaml
//! graph: social
//! vertices:
//!   - label: Person
//!     table: person
//! edges:
//!   - label: KNOWS
//!     table: knows
//! ```

pub mod errors;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use errors::CatalogError;

/// Column names of catalog relations, fixed by the storage layout.
pub mod columns {
    /// Element identifier, vertices and edges alike.
    pub const ID: &str = "id";
    /// Source vertex identifier of an edge relation.
    pub const START: &str = "start_id";
    /// Target vertex identifier of an edge relation.
    pub const END: &str = "end_id";
    /// Semi-structured property payload.
    pub const PROPERTIES: &str = "properties";
    /// Normalized traversal endpoints exposed by the undirected edge union:
    /// the forward row keeps orientation, the reversed row swaps it.
    pub const UNION_START: &str = "_start";
    pub const UNION_END: &str = "_end";
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum ElementKind {
    Vertex,
    Edge,
}

/// One label's backing relation.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LabelSchema {
    pub label: String,
    /// Fully qualified relation name (`graph.table`).
    pub table: String,
    pub kind: ElementKind,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    graph: String,
    vertices: HashMap<String, LabelSchema>,
    edges: HashMap<String, LabelSchema>,
    vertex_base: LabelSchema,
    edge_base: LabelSchema,
}

const DEFAULT_VERTEX_BASE: &str = "vertices";
const DEFAULT_EDGE_BASE: &str = "edges";

impl Catalog {
    pub fn builder(graph: impl Into<String>) -> CatalogBuilder {
        CatalogBuilder {
            graph: graph.into(),
            vertices: vec![],
            edges: vec![],
            vertex_base: DEFAULT_VERTEX_BASE.to_string(),
            edge_base: DEFAULT_EDGE_BASE.to_string(),
        }
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Resolve a vertex label to its relation; `None` is the wildcard and
    /// resolves to the graph-wide vertex base relation.
    pub fn resolve_vertex_label(&self, label: Option<&str>) -> Result<&LabelSchema, CatalogError> {
        match label {
            None => Ok(&self.vertex_base),
            Some(name) => {
                self.vertices
                    .get(name)
                    .ok_or_else(|| CatalogError::UnknownVertexLabel {
                        graph: self.graph.clone(),
                        label: name.to_string(),
                    })
            }
        }
    }

    /// Resolve a relationship type; `None` is the wildcard edge relation.
    pub fn resolve_edge_type(&self, type_name: Option<&str>) -> Result<&LabelSchema, CatalogError> {
        match type_name {
            None => Ok(&self.edge_base),
            Some(name) => self
                .edges
                .get(name)
                .ok_or_else(|| CatalogError::UnknownEdgeType {
                    graph: self.graph.clone(),
                    type_name: name.to_string(),
                }),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Catalog, CatalogError> {
        let config: CatalogConfig =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParse {
                error: e.to_string(),
            })?;
        config.into_catalog()
    }

    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Catalog, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|e| CatalogError::ConfigRead {
            error: e.to_string(),
        })?;
        Catalog::from_yaml(&text)
    }
}

pub struct CatalogBuilder {
    graph: String,
    vertices: Vec<(String, String)>,
    edges: Vec<(String, String)>,
    vertex_base: String,
    edge_base: String,
}

impl CatalogBuilder {
    pub fn vertex_label(mut self, label: impl Into<String>, table: impl Into<String>) -> Self {
        self.vertices.push((label.into(), table.into()));
        self
    }

    pub fn edge_type(mut self, type_name: impl Into<String>, table: impl Into<String>) -> Self {
        self.edges.push((type_name.into(), table.into()));
        self
    }

    pub fn build(self) -> Catalog {
        let graph = self.graph;
        let qualify = |table: &str| format!("{}.{}", graph, table);

        let vertices = self
            .vertices
            .iter()
            .map(|(label, table)| {
                (
                    label.clone(),
                    LabelSchema {
                        label: label.clone(),
                        table: qualify(table),
                        kind: ElementKind::Vertex,
                    },
                )
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|(label, table)| {
                (
                    label.clone(),
                    LabelSchema {
                        label: label.clone(),
                        table: qualify(table),
                        kind: ElementKind::Edge,
                    },
                )
            })
            .collect();

        let vertex_base = LabelSchema {
            label: String::new(),
            table: qualify(&self.vertex_base),
            kind: ElementKind::Vertex,
        };
        let edge_base = LabelSchema {
            label: String::new(),
            table: qualify(&self.edge_base),
            kind: ElementKind::Edge,
        };

        Catalog {
            graph,
            vertices,
            edges,
            vertex_base,
            edge_base,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogConfig {
    graph: String,
    #[serde(default)]
    vertices: Vec<LabelEntry>,
    #[serde(default)]
    edges: Vec<LabelEntry>,
    #[serde(default)]
    vertex_base: Option<String>,
    #[serde(default)]
    edge_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelEntry {
    label: String,
    table: String,
}

impl CatalogConfig {
    fn into_catalog(self) -> Result<Catalog, CatalogError> {
        if self.graph.is_empty() {
            return Err(CatalogError::InvalidConfig {
                message: "graph name must not be empty".to_string(),
            });
        }

        let mut builder = Catalog::builder(&self.graph);
        if let Some(base) = self.vertex_base {
            builder.vertex_base = base;
        }
        if let Some(base) = self.edge_base {
            builder.edge_base = base;
        }
        for entry in self.vertices {
            if entry.label.is_empty() {
                return Err(CatalogError::InvalidConfig {
                    message: "vertex entry with empty label".to_string(),
                });
            }
            builder = builder.vertex_label(entry.label, entry.table);
        }
        for entry in self.edges {
            if entry.label.is_empty() {
                return Err(CatalogError::InvalidConfig {
                    message: "edge entry with empty label".to_string(),
                });
            }
            builder = builder.edge_type(entry.label, entry.table);
        }
        Ok(builder.build())
    }
}

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("no vertex label `{label}` in graph `{graph}`")]
    UnknownVertexLabel { graph: String, label: String },

    #[error("no relationship type `{type_name}` in graph `{graph}`")]
    UnknownEdgeType { graph: String, type_name: String },

    #[error("failed to read catalog configuration: {error}")]
    ConfigRead { error: String },

    #[error("failed to parse catalog configuration: {error}")]
    ConfigParse { error: String },

    #[error("invalid catalog configuration: {message}")]
    InvalidConfig { message: String },
}

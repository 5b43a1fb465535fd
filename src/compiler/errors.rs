use thiserror::Error;

use crate::catalog::CatalogError;
use crate::expr::errors::ExprError;

/// Every violation detected during compilation is a hard failure: no
/// partial plan is returned and nothing is retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("duplicate variable `{name}`")]
    DuplicateVariable { name: String },

    #[error("label conflict on node `{variable}`: `{existing}` vs `{conflicting}`")]
    LabelConflict {
        variable: String,
        existing: String,
        conflicting: String,
    },

    #[error("{expected} is expected, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("multiple types for relationship not supported")]
    MultipleRelTypes,

    #[error("{feature} is not allowed in CREATE")]
    UnsupportedInCreate { feature: String },

    #[error("there must be at least one relationship")]
    MissingRelationship,

    #[error("{clause} cannot be the first clause")]
    RequiresPreviousClause { clause: &'static str },

    #[error("only a variable or a property is valid as a SET target")]
    InvalidSetTarget,

    #[error("expression in WITH must be aliased (use AS)")]
    UnaliasedWithItem,

    #[error("malformed pattern: {message}")]
    MalformedPattern { message: String },

    #[error("traversal of `{variable}` has no derivable start identifier")]
    UnanchoredTraversal { variable: String },

    #[error("vertex `{variable}` has no derivable identifier")]
    UnresolvableVertex { variable: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Expr(#[from] ExprError),
}

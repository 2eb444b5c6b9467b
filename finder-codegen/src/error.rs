//! Generation errors
//!
//! Every error here aborts generation. The proc-macro front end turns them into
//! `compile_error!` invocations; build scripts surface them as their own
//! failure.

use std::fmt;
use std::path::PathBuf;

use proc_macro2::{Span, TokenStream};
use thiserror::Error;

/// Emission stage of the finder generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStage {
    /// Resolving the module path the entity lives in
    Namespace,
    /// Resolving the runtime crate path and namespace imports
    Imports,
    /// Validating the entity and opening its scopes
    Open,
    /// Emitting field-entry and accessor methods
    Methods,
    /// Assembling and checking the finished artifact
    Close,
}

impl fmt::Display for EmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmitStage::Namespace => "namespace",
            EmitStage::Imports => "imports",
            EmitStage::Open => "open",
            EmitStage::Methods => "methods",
            EmitStage::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("finder for {qualified_name} is generated more than once")]
    DuplicateEntity { qualified_name: String },

    #[error("#[entity] can only be applied to structs, but {name} is {kind}")]
    NotAStruct { name: String, kind: &'static str },

    #[error("cannot resolve the type of field {entity}.{field}: {reason}")]
    UnresolvedType {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("failed to emit finder for {entity} ({stage} stage): {reason}")]
    Emit {
        entity: String,
        stage: EmitStage,
        reason: String,
    },

    #[error(transparent)]
    Attribute(#[from] syn::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerationError {
    pub(crate) fn emit(entity: &str, stage: EmitStage, reason: impl Into<String>) -> Self {
        GenerationError::Emit {
            entity: entity.to_string(),
            stage,
            reason: reason.into(),
        }
    }

    /// Render the error as a `compile_error!` invocation.
    ///
    /// Attribute errors keep their span so the compiler points at the offending
    /// attribute; all others point at the macro call site.
    pub fn to_compile_error(&self) -> TokenStream {
        match self {
            GenerationError::Attribute(error) => error.to_compile_error(),
            other => syn::Error::new(Span::call_site(), other.to_string()).to_compile_error(),
        }
    }
}

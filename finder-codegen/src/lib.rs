//! Entity metadata extraction and finder source generation
//!
//! - `metadata`: reads a struct declaration into [`EntityMetadata`]
//! - `generator`: emits the typed finder API for one entity
//! - `driver`: discovers `#[entity]` structs in source files and generates each
//!   once per build (for build scripts)
//!
//! The `finder-macros` crate wraps `metadata` and `generator` for
//! `#[derive(Finder)]`.

pub mod attrs;
pub mod driver;
pub mod error;
pub mod generator;
pub mod metadata;

pub use driver::{CompilationUnit, DriverState, GenerationDriver, Round};
pub use error::{EmitStage, GenerationError};
pub use generator::{Artifact, generate};
pub use metadata::{EntityMetadata, FieldKind, FieldMetadata, RelationLink, extract};

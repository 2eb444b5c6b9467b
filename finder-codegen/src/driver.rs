//! Generation driver
//!
//! Discovers `#[entity]`-marked structs in compilation units and generates one
//! finder per entity type. The driver remembers every type it has processed,
//! so running discovery again over the same sources emits nothing new.
//!
//! Typical build-script use:
//!
//! ```ignore
//! let mut driver = GenerationDriver::new();
//! driver.process_files(&[("crate::models", "src/models.rs")])?;
//! driver.write_artifacts(std::env::var("OUT_DIR")?)?;
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use syn::ext::IdentExt;
use syn::{DeriveInput, Item};

use crate::error::GenerationError;
use crate::generator::{self, Artifact};
use crate::metadata::{self, EntityMetadata};

/// Where the driver is within a round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Discovering,
    Extracting(String),
    Generating(String),
}

/// A parsed source file and the module path its items live in.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub namespace: String,
    pub file: syn::File,
}

impl CompilationUnit {
    pub fn new(namespace: impl Into<String>, file: syn::File) -> Self {
        Self {
            namespace: namespace.into(),
            file,
        }
    }

    /// Parse source text into a unit
    pub fn parse(namespace: impl Into<String>, source: &str) -> syn::Result<Self> {
        Ok(Self::new(namespace, syn::parse_file(source)?))
    }
}

/// Outcome of one discovery round.
#[derive(Debug, Default)]
pub struct Round {
    /// Artifacts generated in this round
    pub artifacts: Vec<Artifact>,
    /// Marked types skipped because they are not persistable
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
pub struct GenerationDriver {
    processed: HashSet<String>,
    state: DriverState,
    artifacts: Vec<Artifact>,
}

impl GenerationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Whether a qualified type name has been handled in this build
    pub fn is_processed(&self, qualified_name: &str) -> bool {
        self.processed.contains(qualified_name)
    }

    /// Every artifact generated so far, across rounds
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Run one discovery round over `units`.
    ///
    /// Types processed in an earlier round are skipped. The driver is back in
    /// [`DriverState::Idle`] afterwards, whether or not the round succeeded.
    pub fn process_round(&mut self, units: &[CompilationUnit]) -> Result<Round, GenerationError> {
        let result = self.run_round(units);
        self.state = DriverState::Idle;
        result
    }

    fn run_round(&mut self, units: &[CompilationUnit]) -> Result<Round, GenerationError> {
        self.state = DriverState::Discovering;

        let mut discovered = Vec::new();
        for unit in units {
            discover(&unit.namespace, &unit.file.items, &mut discovered)?;
        }

        // Reject duplicates before anything is emitted
        let mut seen = HashSet::new();
        for (namespace, input) in &discovered {
            let qualified_name = qualify(namespace, &input.ident.unraw().to_string());
            if !seen.insert(qualified_name.clone()) {
                return Err(GenerationError::DuplicateEntity { qualified_name });
            }
        }

        tracing::info!(units = units.len(), entities = discovered.len(), "Discovered entities");

        let mut round = Round::default();
        for (namespace, input) in &discovered {
            let qualified_name = qualify(namespace, &input.ident.unraw().to_string());
            if self.processed.contains(&qualified_name) {
                tracing::debug!(entity = %qualified_name, "Already processed, skipping");
                continue;
            }

            self.state = DriverState::Extracting(qualified_name.clone());
            let metadata = metadata::extract(input, namespace)?;

            if !metadata.is_persistable {
                tracing::debug!(entity = %qualified_name, "Not persistable, skipping");
                self.processed.insert(qualified_name.clone());
                round.skipped.push(qualified_name);
                continue;
            }

            let artifact = self.emit(&metadata)?;
            round.artifacts.push(artifact);
        }

        tracing::info!(
            generated = round.artifacts.len(),
            skipped = round.skipped.len(),
            "Generation round complete"
        );

        Ok(round)
    }

    /// Generate the finder for one entity outside of discovery.
    ///
    /// Fails with [`GenerationError::DuplicateEntity`] if the type was already
    /// processed in this build.
    pub fn generate_entity(&mut self, metadata: &EntityMetadata) -> Result<Artifact, GenerationError> {
        let result = if self.processed.contains(&metadata.qualified_name) {
            Err(GenerationError::DuplicateEntity {
                qualified_name: metadata.qualified_name.clone(),
            })
        } else {
            self.emit(metadata)
        };
        self.state = DriverState::Idle;
        result
    }

    fn emit(&mut self, metadata: &EntityMetadata) -> Result<Artifact, GenerationError> {
        self.state = DriverState::Generating(metadata.qualified_name.clone());

        let artifact = generator::generate(metadata)?;
        self.processed.insert(metadata.qualified_name.clone());
        self.artifacts.push(artifact.clone());

        tracing::info!(entity = %metadata.qualified_name, file = %artifact.file_name, "Generated finder");
        Ok(artifact)
    }

    /// Read and parse source files, then run one round over them.
    ///
    /// Each entry pairs the module path of a file's items with the file path.
    pub fn process_files<N, P>(&mut self, files: &[(N, P)]) -> Result<Round, GenerationError>
    where
        N: AsRef<str>,
        P: AsRef<Path>,
    {
        let mut units = Vec::with_capacity(files.len());
        for (namespace, path) in files {
            let path = path.as_ref();
            let source = fs::read_to_string(path).map_err(|source| GenerationError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let unit = CompilationUnit::parse(namespace.as_ref(), &source).map_err(|source| {
                GenerationError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            units.push(unit);
        }

        self.process_round(&units)
    }

    /// Write every generated artifact to `dir`, returning the written paths.
    pub fn write_artifacts(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, GenerationError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| GenerationError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let path = dir.join(&artifact.file_name);
            fs::write(&path, artifact.to_source()).map_err(|source| GenerationError::Write {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "Wrote finder source");
            written.push(path);
        }

        Ok(written)
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    let namespace = namespace.trim_matches(':');
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", namespace, name)
    }
}

/// Whether an attribute is the `#[entity]` generation marker
fn is_marker(attr: &syn::Attribute) -> bool {
    let path = attr.path();
    path.is_ident("entity")
        || (path.segments.len() == 2
            && path.segments[0].ident == "finder"
            && path.segments[1].ident == "entity")
}

fn discover(
    namespace: &str,
    items: &[Item],
    found: &mut Vec<(String, DeriveInput)>,
) -> Result<(), GenerationError> {
    for item in items {
        match item {
            Item::Struct(item) if item.attrs.iter().any(is_marker) => {
                found.push((namespace.to_string(), DeriveInput::from(item.clone())));
            }
            Item::Mod(module) => {
                if let Some((_, items)) = &module.content {
                    let nested = qualify(namespace, &module.ident.to_string());
                    discover(&nested, items, found)?;
                }
            }
            other => {
                if let Some((name, kind)) = marked_non_struct(other) {
                    return Err(GenerationError::NotAStruct {
                        name: qualify(namespace, &name),
                        kind,
                    });
                }
            }
        }
    }
    Ok(())
}

fn marked_non_struct(item: &Item) -> Option<(String, &'static str)> {
    let (attrs, name, kind) = match item {
        Item::Enum(item) => (&item.attrs, item.ident.to_string(), "an enum"),
        Item::Union(item) => (&item.attrs, item.ident.to_string(), "a union"),
        Item::Trait(item) => (&item.attrs, item.ident.to_string(), "a trait"),
        Item::Fn(item) => (&item.attrs, item.sig.ident.to_string(), "a function"),
        Item::Type(item) => (&item.attrs, item.ident.to_string(), "a type alias"),
        Item::Const(item) => (&item.attrs, item.ident.to_string(), "a constant"),
        Item::Static(item) => (&item.attrs, item.ident.to_string(), "a static"),
        _ => return None,
    };
    attrs.iter().any(is_marker).then_some((name, kind))
}

pub mod binding;
pub mod manifest;

use thiserror::Error;

use crate::{packages::LoadError, vcs::VcsError};

pub use binding::{Binding, BoundDependency, LoadedManifest};
pub use manifest::{Dependency, Manifest};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error reading manifest: {0}")]
    IO(#[from] std::io::Error),
    #[error("Malformed manifest: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Error loading package metadata: {0}")]
    Metadata(#[from] LoadError),
    #[error("Cannot find repository for {import_path}: {source}")]
    VcsResolution {
        import_path: String,
        source: VcsError,
    },
    #[error("Dependency {0} has no runtime binding")]
    Unbound(String),
}

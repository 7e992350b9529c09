mod go;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use go::GoListLoader;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{command} failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Could not decode package listing: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Metadata of a single package as reported by the toolchain.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Package {
    pub import_path: String,
    pub dir: PathBuf,
    /// Workspace root containing the package, empty when it lives outside of one.
    pub root: PathBuf,
    pub standard: bool,
    /// Transitive dependencies of the package.
    pub deps: Vec<String>,
    pub test_imports: Vec<String>,
    #[serde(rename = "XTestImports")]
    pub xtest_imports: Vec<String>,
    pub error: Option<PackageError>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageError {
    pub err: String,
}

impl Package {
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|error| error.err.as_str())
            .filter(|err| !err.is_empty())
    }

    /// Imports only needed to build the package's tests.
    pub fn test_dependencies(&self) -> impl Iterator<Item = &String> {
        self.test_imports.iter().chain(&self.xtest_imports)
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        Some(self.root.as_path()).filter(|root| !root.as_os_str().is_empty())
    }

    /// Directory repositories of this package's workspace are laid out in.
    pub fn src_root(&self) -> PathBuf {
        self.root.join("src")
    }
}

/// Resolves import paths to package metadata.
pub trait PackageLoader {
    /// Returns one record per import path or pattern match. Packages that cannot
    /// be loaded are returned with [`Package::error`] set; `Err` means the
    /// loader itself is unavailable.
    fn load_packages(&self, import_paths: &[String]) -> Result<Vec<Package>, LoadError>;

    fn toolchain_version(&self) -> Result<String, LoadError>;
}

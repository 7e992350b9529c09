use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    packages::{Package, PackageLoader},
    vcs::{RepoRoot, RepositoryDetector, VcsHandle},
};

use super::{Dependency, Manifest, ManifestError};

/// Runtime state of a dependency, derived again on every load.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Workspace root the dependency is installed into.
    pub workspace: PathBuf,
    pub repo_root: RepoRoot,
    /// Workspace root of an existing local copy, if the toolchain knows one.
    pub outer_root: Option<PathBuf>,
    pub vcs: VcsHandle,
}

/// A manifest read from disk together with the bindings of its dependencies.
#[derive(Debug)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    /// Workspace root the project itself was found in.
    pub outer_root: Option<PathBuf>,
    bindings: BTreeMap<String, Binding>,
}

impl LoadedManifest {
    pub fn load(
        path: &Path,
        loader: &dyn PackageLoader,
        detector: &dyn RepositoryDetector,
        workspace: &Path,
    ) -> Result<LoadedManifest, ManifestError> {
        let manifest = Manifest::from_file(path)?;
        LoadedManifest::bind(manifest, loader, detector, workspace)
    }

    /// Resolves package metadata for the project and every dependency, and the
    /// repository each dependency is fetched from.
    pub fn bind(
        manifest: Manifest,
        loader: &dyn PackageLoader,
        detector: &dyn RepositoryDetector,
        workspace: &Path,
    ) -> Result<LoadedManifest, ManifestError> {
        let import_paths = std::iter::once(&manifest.import_path)
            .chain(manifest.deps.iter().map(|dep| &dep.import_path))
            .cloned()
            .collect::<Vec<_>>();
        let packages = loader
            .load_packages(&import_paths)?
            .into_iter()
            .map(|package| (package.import_path.clone(), package))
            .collect::<HashMap<_, _>>();
        let outer_root_of = |import_path: &str| {
            packages
                .get(import_path)
                .and_then(Package::workspace_root)
                .map(Path::to_path_buf)
        };

        let mut bindings = BTreeMap::new();
        for dependency in &manifest.deps {
            let (vcs, repo_root) = detector
                .for_import_path(&dependency.import_path)
                .map_err(|source| ManifestError::VcsResolution {
                    import_path: dependency.import_path.clone(),
                    source,
                })?;
            trace!(
                "{} is in {} repository {}",
                dependency.import_path,
                repo_root.vcs,
                repo_root.repo
            );
            bindings.insert(
                dependency.import_path.clone(),
                Binding {
                    workspace: workspace.to_path_buf(),
                    repo_root,
                    outer_root: outer_root_of(&dependency.import_path),
                    vcs,
                },
            );
        }

        debug!("Bound {} dependencies", bindings.len());
        Ok(LoadedManifest {
            outer_root: outer_root_of(&manifest.import_path),
            manifest,
            bindings,
        })
    }

    pub fn binding(&self, import_path: &str) -> Option<&Binding> {
        self.bindings.get(import_path)
    }

    /// Dependencies joined with their bindings, in manifest order.
    pub fn dependencies(&self) -> Result<Vec<BoundDependency<'_>>, ManifestError> {
        self.manifest
            .deps
            .iter()
            .map(|dependency| {
                self.binding(&dependency.import_path)
                    .map(|binding| BoundDependency {
                        dependency,
                        binding,
                    })
                    .ok_or_else(|| ManifestError::Unbound(dependency.import_path.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundDependency<'a> {
    pub dependency: &'a Dependency,
    pub binding: &'a Binding,
}

impl BoundDependency<'_> {
    pub fn import_path(&self) -> &str {
        &self.dependency.import_path
    }

    pub fn revision(&self) -> &str {
        &self.dependency.rev
    }

    pub fn vcs(&self) -> &VcsHandle {
        &self.binding.vcs
    }

    /// Local copy of the dependency's repository.
    ///
    /// ```text
    /// ImportPath             RepoPath
    /// github.com/kr/s3       $workspace/src/github.com/kr/s3
    /// github.com/lib/pq/oid  $workspace/src/github.com/lib/pq
    /// ```
    pub fn repo_path(&self) -> PathBuf {
        self.binding
            .workspace
            .join("src")
            .join(&self.binding.repo_root.root)
    }

    /// The checked out tree lives in the repository directory itself.
    pub fn workdir_root(&self) -> PathBuf {
        self.repo_path()
    }

    pub fn remote_url(&self) -> &str {
        &self.binding.repo_root.repo
    }

    /// Path of an existing clone in another workspace, if there is one.
    pub fn fast_remote_path(&self) -> Option<PathBuf> {
        self.binding
            .outer_root
            .as_ref()
            .map(|root| root.join("src").join(&self.binding.repo_root.root))
    }
}

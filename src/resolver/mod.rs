use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::{
    model::{Dependency, Manifest},
    packages::{LoadError, Package, PackageLoader},
    vcs::{RepositoryDetector, VcsError, VcsHandle},
};

/// A problem that keeps one package from being pinned.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Error loading package {import_path}: {message}")]
    Package {
        import_path: String,
        message: String,
    },
    #[error("Cannot find repository of {import_path}: {source}")]
    VcsResolution {
        import_path: String,
        source: VcsError,
    },
    #[error("Cannot identify revision of {}: {source}", .dir.display())]
    Identify { dir: PathBuf, source: VcsError },
    #[error("Dirty working tree: {}", .dir.display())]
    DirtyWorkingTree { import_path: String, dir: PathBuf },
}

#[derive(Error, Debug)]
#[error("Error loading dependencies: {} could not be pinned", .0.len())]
pub struct UnpinnedDependencies(pub Vec<ResolveError>);

/// Where a pinned dependency was found.
#[derive(Debug, Clone)]
pub struct PinnedSource {
    pub workspace: PathBuf,
    pub repo_dir: PathBuf,
    pub vcs: VcsHandle,
}

/// Outcome of a resolution. `manifest` holds every dependency that could be
/// pinned, `errors` everything that could not.
#[derive(Debug)]
pub struct Resolution {
    pub manifest: Manifest,
    pub sources: BTreeMap<String, PinnedSource>,
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn check(self) -> Result<Manifest, UnpinnedDependencies> {
        if self.errors.is_empty() {
            Ok(self.manifest)
        } else {
            Err(UnpinnedDependencies(self.errors))
        }
    }
}

/// Import path prefixes whose packages are already accounted for.
#[derive(Debug, Default)]
struct Covered {
    prefixes: Vec<String>,
}

impl Covered {
    fn insert(&mut self, import_path: &str) {
        self.prefixes.push(format!("{import_path}/"));
    }

    fn covers(&self, import_path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            import_path.starts_with(prefix.as_str())
                || prefix.strip_suffix('/') == Some(import_path)
        })
    }
}

pub struct Resolver<'a> {
    loader: &'a dyn PackageLoader,
    detector: &'a dyn RepositoryDetector,
}

impl<'a> Resolver<'a> {
    pub fn new(loader: &'a dyn PackageLoader, detector: &'a dyn RepositoryDetector) -> Self {
        Resolver { loader, detector }
    }

    /// Pins every repository the `roots` depend on, directly or through their
    /// tests, into `manifest.deps`.
    ///
    /// Problems with individual packages are collected in
    /// [`Resolution::errors`] and do not stop the resolution. `Err` is only
    /// returned when the package loader itself fails.
    pub fn resolve(&self, mut manifest: Manifest, roots: &[Package]) -> Result<Resolution, LoadError> {
        manifest.deps.clear();
        let mut errors = Vec::new();
        let mut covered = Covered::default();
        let mut candidates = Vec::new();
        let mut test_imports = Vec::new();

        for root in roots {
            if root.standard {
                info!("Ignoring standard library package {}", root.import_path);
                continue;
            }
            if let Some(message) = root.error_message() {
                warn!("{}", message);
                errors.push(package_error(root, message));
                continue;
            }
            covered.insert(&root.import_path);
            candidates.extend(root.deps.iter().cloned());
            test_imports.extend(root.test_dependencies().cloned());
        }

        test_imports.sort();
        test_imports.dedup();
        for package in self.loader.load_packages(&test_imports)? {
            if package.standard {
                continue;
            }
            if let Some(message) = package.error_message() {
                warn!("{}", message);
                errors.push(package_error(&package, message));
                continue;
            }
            candidates.push(package.import_path);
            candidates.extend(package.deps);
        }

        candidates.sort();
        candidates.dedup();
        debug!("Resolving {} candidate packages", candidates.len());

        let mut packages = self.loader.load_packages(&candidates)?;
        packages.sort_by(|a, b| a.import_path.cmp(&b.import_path));

        let mut sources = BTreeMap::new();
        let mut visited_repositories = HashSet::new();
        for package in &packages {
            if covered.covers(&package.import_path) {
                trace!("{} is already covered", package.import_path);
                continue;
            }
            if package.standard {
                continue;
            }
            if let Some(message) = package.error_message() {
                warn!("{}", message);
                errors.push(package_error(package, message));
                continue;
            }

            let repository = match self.detector.from_dir(&package.dir, &package.src_root()) {
                Ok(repository) => repository,
                Err(source) => {
                    let error = ResolveError::VcsResolution {
                        import_path: package.import_path.clone(),
                        source,
                    };
                    warn!("{}", error);
                    errors.push(error);
                    continue;
                }
            };
            // One entry per repository, even when it failed to pin.
            if !visited_repositories.insert(repository.dir.clone()) {
                trace!(
                    "{} belongs to already visited repository {}",
                    package.import_path,
                    repository.root
                );
                continue;
            }

            match pin(package, &repository.vcs, &repository.dir) {
                Ok(dependency) => {
                    info!(
                        "Pinned {} at {} ({})",
                        dependency.import_path, dependency.rev, repository.vcs.kind()
                    );
                    covered.insert(&dependency.import_path);
                    sources.insert(
                        dependency.import_path.clone(),
                        PinnedSource {
                            workspace: package.root.clone(),
                            repo_dir: repository.dir,
                            vcs: repository.vcs,
                        },
                    );
                    manifest.deps.push(dependency);
                }
                Err(error) => {
                    warn!("{}", error);
                    errors.push(error);
                }
            }
        }

        Ok(Resolution {
            manifest,
            sources,
            errors,
        })
    }
}

/// Captures the revision currently checked out in the repository owning
/// `package`, refusing trees with uncommitted changes.
fn pin(package: &Package, vcs: &VcsHandle, repo_dir: &Path) -> Result<Dependency, ResolveError> {
    let rev = vcs
        .identify(repo_dir)
        .map_err(|source| ResolveError::Identify {
            dir: repo_dir.to_path_buf(),
            source,
        })?;
    if vcs.is_dirty(repo_dir, &rev) {
        return Err(ResolveError::DirtyWorkingTree {
            import_path: package.import_path.clone(),
            dir: repo_dir.to_path_buf(),
        });
    }
    let comment = vcs.describe(repo_dir, &rev);
    Ok(Dependency {
        import_path: package.import_path.clone(),
        comment,
        rev,
    })
}

fn package_error(package: &Package, message: &str) -> ResolveError {
    ResolveError::Package {
        import_path: package.import_path.clone(),
        message: message.to_owned(),
    }
}

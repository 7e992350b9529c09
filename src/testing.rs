//! In-memory stand-ins for the toolchain and version control systems.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    packages::{LoadError, Package, PackageError, PackageLoader},
    vcs::{
        DetectedRepository, RepoRoot, RepositoryDetector, Vcs, VcsError, VcsHandle, VcsKind,
    },
};

pub const WORKSPACE: &str = "/go";

pub fn package(import_path: &str, deps: &[&str]) -> Package {
    Package {
        import_path: import_path.to_owned(),
        dir: Path::new(WORKSPACE).join("src").join(import_path),
        root: PathBuf::from(WORKSPACE),
        deps: deps.iter().map(|dep| dep.to_string()).collect(),
        ..Default::default()
    }
}

pub fn standard(import_path: &str) -> Package {
    Package {
        import_path: import_path.to_owned(),
        dir: Path::new("/usr/lib/go/src").join(import_path),
        root: PathBuf::from("/usr/lib/go"),
        standard: true,
        ..Default::default()
    }
}

pub fn broken(import_path: &str, message: &str) -> Package {
    Package {
        import_path: import_path.to_owned(),
        error: Some(PackageError {
            err: message.to_owned(),
        }),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeLoader {
    pub packages: HashMap<String, Package>,
    pub requests: RefCell<Vec<Vec<String>>>,
    pub unavailable: bool,
}

impl FakeLoader {
    pub fn new(packages: impl IntoIterator<Item = Package>) -> Self {
        FakeLoader {
            packages: packages
                .into_iter()
                .map(|package| (package.import_path.clone(), package))
                .collect(),
            ..Default::default()
        }
    }
}

impl PackageLoader for FakeLoader {
    fn load_packages(&self, import_paths: &[String]) -> Result<Vec<Package>, LoadError> {
        if self.unavailable {
            return Err(LoadError::Spawn {
                program: "go".to_owned(),
                source: std::io::ErrorKind::NotFound.into(),
            });
        }
        self.requests.borrow_mut().push(import_paths.to_vec());
        Ok(import_paths
            .iter()
            .map(|path| {
                self.packages
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| broken(path, &format!("cannot find package {path:?}")))
            })
            .collect())
    }

    fn toolchain_version(&self) -> Result<String, LoadError> {
        Ok("go1.21.0".to_owned())
    }
}

/// Records every mutating call and serves revisions from in-memory sets.
#[derive(Debug, Default)]
pub struct FakeVcs {
    pub heads: HashMap<PathBuf, String>,
    pub dirty: HashSet<PathBuf>,
    pub tags: HashMap<String, String>,
    /// Revisions a checkout can reach without fetching.
    pub local: RefCell<HashSet<String>>,
    /// Revisions a fetch makes available.
    pub remote: HashSet<String>,
    pub fail_create: bool,
    pub fail_fetch: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeVcs {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

fn failure(message: String) -> VcsError {
    VcsError::Git(git2::Error::from_str(&message))
}

impl Vcs for FakeVcs {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn identify(&self, dir: &Path) -> Result<String, VcsError> {
        self.heads
            .get(dir)
            .cloned()
            .ok_or_else(|| VcsError::NoRepository(dir.to_path_buf()))
    }

    fn describe(&self, _dir: &Path, revision: &str) -> String {
        self.tags.get(revision).cloned().unwrap_or_default()
    }

    fn is_dirty(&self, dir: &Path, _revision: &str) -> bool {
        self.dirty.contains(dir)
    }

    fn create(&self, dir: &Path) -> Result<(), VcsError> {
        self.record(format!("create {}", dir.display()));
        if self.fail_create {
            return Err(failure(format!("cannot initialize {}", dir.display())));
        }
        Ok(())
    }

    fn link(&self, _dir: &Path, remote: &str, url: &str) -> Result<(), VcsError> {
        self.record(format!("link {remote} {url}"));
        Ok(())
    }

    fn fetch(&self, _dir: &Path, remote: &str) -> Result<(), VcsError> {
        self.record(format!("fetch {remote}"));
        if self.fail_fetch {
            return Err(failure(format!("remote {remote} is unreachable")));
        }
        self.local.borrow_mut().extend(self.remote.iter().cloned());
        Ok(())
    }

    fn checkout(&self, _workdir: &Path, revision: &str, _repo_dir: &Path) -> Result<(), VcsError> {
        self.record(format!("checkout {revision}"));
        if self.local.borrow().contains(revision) {
            Ok(())
        } else {
            Err(failure(format!("revision {revision} not found")))
        }
    }
}

/// Treats every listed directory under the workspace as a repository root.
pub struct FakeDetector {
    pub vcs: Arc<FakeVcs>,
    pub repositories: Vec<String>,
}

impl FakeDetector {
    pub fn new(vcs: Arc<FakeVcs>, repositories: &[&str]) -> Self {
        FakeDetector {
            vcs,
            repositories: repositories.iter().map(|repo| repo.to_string()).collect(),
        }
    }

    fn repository_of(&self, import_path: &str) -> Option<&String> {
        self.repositories.iter().find(|root| {
            import_path == root.as_str() || import_path.starts_with(&format!("{root}/"))
        })
    }
}

impl RepositoryDetector for FakeDetector {
    fn from_dir(&self, dir: &Path, src_root: &Path) -> Result<DetectedRepository, VcsError> {
        let import_path = dir
            .strip_prefix(src_root)
            .map_err(|_| VcsError::OutsideWorkspace {
                dir: dir.to_path_buf(),
                src_root: src_root.to_path_buf(),
            })?
            .to_string_lossy()
            .into_owned();
        let root = self
            .repository_of(&import_path)
            .ok_or_else(|| VcsError::NoRepository(dir.to_path_buf()))?;
        Ok(DetectedRepository {
            vcs: self.vcs.clone(),
            root: root.clone(),
            dir: src_root.join(root),
        })
    }

    fn for_import_path(&self, import_path: &str) -> Result<(VcsHandle, RepoRoot), VcsError> {
        let root = self
            .repository_of(import_path)
            .ok_or_else(|| VcsError::UnknownImportPath(import_path.to_owned()))?;
        let vcs: VcsHandle = self.vcs.clone();
        Ok((
            vcs,
            RepoRoot {
                vcs: VcsKind::Git,
                repo: format!("https://{root}"),
                root: root.clone(),
            },
        ))
    }
}

pub mod command;
pub mod git;
pub mod repo_root;

use std::{
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::Arc,
};

use log::trace;
use thiserror::Error;

pub use repo_root::RepoRoot;

use self::{
    command::{Bazaar, Mercurial, Subversion},
    git::GitVcs,
};

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Could not run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },
    #[error("{command} failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Directory {} is not inside {}", .dir.display(), .src_root.display())]
    OutsideWorkspace { dir: PathBuf, src_root: PathBuf },
    #[error("Directory {} is not under version control", .0.display())]
    NoRepository(PathBuf),
    #[error("Unrecognized import path {0}")]
    UnknownImportPath(String),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// The version control systems a dependency can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
    Bazaar,
}

impl VcsKind {
    pub const ALL: [VcsKind; 4] = [
        VcsKind::Git,
        VcsKind::Mercurial,
        VcsKind::Subversion,
        VcsKind::Bazaar,
    ];

    /// Directory that marks the root of a working tree.
    pub fn metadata_dir(self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Mercurial => ".hg",
            VcsKind::Subversion => ".svn",
            VcsKind::Bazaar => ".bzr",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "hg",
            VcsKind::Subversion => "svn",
            VcsKind::Bazaar => "bzr",
        }
    }

    pub fn from_command(command: &str) -> Option<VcsKind> {
        VcsKind::ALL
            .into_iter()
            .find(|kind| kind.command() == command)
    }
}

impl Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Operations gopin needs from a version control system.
///
/// `dir` arguments point at a working tree, or at any directory inside it for
/// the read-only operations.
pub trait Vcs: Debug {
    fn kind(&self) -> VcsKind;

    /// Revision currently checked out in `dir`.
    fn identify(&self, dir: &Path) -> Result<String, VcsError>;

    /// Human readable name of `revision`, typically the closest tag.
    /// Empty when nothing better than the revision itself is known.
    fn describe(&self, dir: &Path, revision: &str) -> String;

    /// Whether `dir` has uncommitted changes relative to `revision`.
    /// A tree whose status cannot be determined is reported dirty.
    fn is_dirty(&self, dir: &Path, revision: &str) -> bool;

    /// Initializes an empty repository in the existing directory `dir`.
    fn create(&self, dir: &Path) -> Result<(), VcsError>;

    fn link(&self, dir: &Path, remote: &str, url: &str) -> Result<(), VcsError>;

    fn fetch(&self, dir: &Path, remote: &str) -> Result<(), VcsError>;

    fn checkout(&self, workdir: &Path, revision: &str, repo_dir: &Path) -> Result<(), VcsError>;
}

pub type VcsHandle = Arc<dyn Vcs>;

/// A working tree found by walking up from a package directory.
#[derive(Debug, Clone)]
pub struct DetectedRepository {
    pub vcs: VcsHandle,
    /// Import path of the repository root.
    pub root: String,
    pub dir: PathBuf,
}

/// Maps packages to the repositories that own them.
pub trait RepositoryDetector {
    fn from_dir(&self, dir: &Path, src_root: &Path) -> Result<DetectedRepository, VcsError>;

    fn for_import_path(&self, import_path: &str) -> Result<(VcsHandle, RepoRoot), VcsError>;
}

/// Holds one backend per [`VcsKind`] so every dependency shares the same handle
/// for its kind.
pub struct VcsRegistry {
    git: VcsHandle,
    mercurial: VcsHandle,
    subversion: VcsHandle,
    bazaar: VcsHandle,
}

impl VcsRegistry {
    pub fn new(git_config: git2::Config) -> Self {
        VcsRegistry {
            git: Arc::new(GitVcs::new(git_config)),
            mercurial: Arc::new(Mercurial),
            subversion: Arc::new(Subversion),
            bazaar: Arc::new(Bazaar),
        }
    }

    pub fn handle(&self, kind: VcsKind) -> VcsHandle {
        match kind {
            VcsKind::Git => self.git.clone(),
            VcsKind::Mercurial => self.mercurial.clone(),
            VcsKind::Subversion => self.subversion.clone(),
            VcsKind::Bazaar => self.bazaar.clone(),
        }
    }
}

impl RepositoryDetector for VcsRegistry {
    fn from_dir(&self, dir: &Path, src_root: &Path) -> Result<DetectedRepository, VcsError> {
        let (kind, repo_dir) = find_repository_root(dir, src_root)?;
        Ok(DetectedRepository {
            vcs: self.handle(kind),
            root: import_path_of(&repo_dir, src_root),
            dir: repo_dir,
        })
    }

    fn for_import_path(&self, import_path: &str) -> Result<(VcsHandle, RepoRoot), VcsError> {
        let repo_root = repo_root::repo_root_for_import_path(import_path)?;
        Ok((self.handle(repo_root.vcs), repo_root))
    }
}

/// Walks from `dir` towards `src_root` and returns the first directory holding
/// VCS metadata. `src_root` itself is never considered.
pub fn find_repository_root(dir: &Path, src_root: &Path) -> Result<(VcsKind, PathBuf), VcsError> {
    if !dir.starts_with(src_root) {
        return Err(VcsError::OutsideWorkspace {
            dir: dir.to_path_buf(),
            src_root: src_root.to_path_buf(),
        });
    }

    let mut current = dir;
    while current != src_root {
        for kind in VcsKind::ALL {
            if current.join(kind.metadata_dir()).is_dir() {
                trace!("Found {} repository at {}", kind, current.display());
                return Ok((kind, current.to_path_buf()));
            }
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Err(VcsError::NoRepository(dir.to_path_buf()))
}

fn import_path_of(repo_dir: &Path, src_root: &Path) -> String {
    repo_dir
        .strip_prefix(src_root)
        .unwrap_or(repo_dir)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

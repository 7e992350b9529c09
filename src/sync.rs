use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::{model::BoundDependency, vcs::VcsError};

/// Remote every installed repository fetches from.
pub const MAIN_REMOTE: &str = "main";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Create repo {}: {source}", .path.display())]
    Create { path: PathBuf, source: VcsError },
    #[error("Link {import_path} to {url}: {source}")]
    Link {
        import_path: String,
        url: String,
        source: VcsError,
    },
    #[error("Fetch {import_path}: {source}")]
    Fetch {
        import_path: String,
        source: VcsError,
    },
    #[error("Checkout {import_path} at {revision}: {source}")]
    Checkout {
        import_path: String,
        revision: String,
        source: VcsError,
    },
}

/// Brings every dependency's working tree to its pinned revision, in order.
///
/// Stops at the first failure: dependencies after it are left untouched.
pub fn synchronize(dependencies: &[BoundDependency<'_>]) -> Result<(), SyncError> {
    info!("Installing {} dependencies...", dependencies.len());
    for dependency in dependencies {
        download(dependency)?;
    }
    Ok(())
}

/// Checks out the pinned revision, fetching only when it is not available
/// locally.
fn download(dependency: &BoundDependency<'_>) -> Result<(), SyncError> {
    if !dependency.repo_path().exists() {
        create_repo(dependency, MAIN_REMOTE)?;
        fetch_and_checkout(dependency, MAIN_REMOTE)?;
    }
    if let Err(error) = checkout(dependency) {
        debug!(
            "{} is not available locally ({}), fetching {}",
            dependency.revision(),
            error,
            dependency.import_path()
        );
        fetch_and_checkout(dependency, MAIN_REMOTE)?;
    }
    debug!(
        "{} is at {}",
        dependency.import_path(),
        dependency.revision()
    );
    Ok(())
}

/// Creates an empty repository at the dependency's repo path, linked to its
/// remote URL.
fn create_repo(dependency: &BoundDependency<'_>, remote: &str) -> Result<(), SyncError> {
    let path = dependency.repo_path();
    info!(
        "Creating {} repository for {} at {}",
        dependency.vcs().kind(),
        dependency.import_path(),
        path.display()
    );
    if let Some(local) = dependency.fast_remote_path() {
        debug!("A local copy also exists at {}", local.display());
    }
    let create = |source: VcsError| SyncError::Create {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(&path).map_err(|error| create(error.into()))?;
    dependency.vcs().create(&path).map_err(create)?;

    let url = dependency.remote_url();
    dependency
        .vcs()
        .link(&path, remote, url)
        .map_err(|source| SyncError::Link {
            import_path: dependency.import_path().to_owned(),
            url: url.to_owned(),
            source,
        })
}

fn fetch_and_checkout(dependency: &BoundDependency<'_>, remote: &str) -> Result<(), SyncError> {
    fetch(dependency, remote)?;
    checkout(dependency)
}

fn fetch(dependency: &BoundDependency<'_>, remote: &str) -> Result<(), SyncError> {
    info!("Fetching {} from {}", dependency.import_path(), dependency.remote_url());
    dependency
        .vcs()
        .fetch(&dependency.repo_path(), remote)
        .map_err(|source| SyncError::Fetch {
            import_path: dependency.import_path().to_owned(),
            source,
        })
}

fn checkout(dependency: &BoundDependency<'_>) -> Result<(), SyncError> {
    dependency
        .vcs()
        .checkout(
            &dependency.workdir_root(),
            dependency.revision(),
            &dependency.repo_path(),
        )
        .map_err(|source| SyncError::Checkout {
            import_path: dependency.import_path().to_owned(),
            revision: dependency.revision().to_owned(),
            source,
        })
}

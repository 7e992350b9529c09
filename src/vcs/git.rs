use std::path::{Path, PathBuf};

use git2::{
    build::CheckoutBuilder, cert::Cert, AutotagOption, CertificateCheckStatus, Config, Cred,
    CredentialType, DescribeOptions, FetchOptions, RemoteCallbacks, Repository, Status,
    StatusOptions,
};
use home::home_dir;
use log::{debug, trace, warn};
use ssh_key::{known_hosts::HostPatterns, KnownHosts};

use super::{Vcs, VcsError, VcsKind};

const GLOBAL_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";

/// Git backend running in-process on top of libgit2.
pub struct GitVcs {
    git_config: Config,
}

impl std::fmt::Debug for GitVcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitVcs").finish_non_exhaustive()
    }
}

impl GitVcs {
    pub fn new(git_config: Config) -> Self {
        GitVcs { git_config }
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                url,
                username,
                allowed_types
            );
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username("git");
            }
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::credential_helper(&self.git_config, url, username);
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });

        callbacks.certificate_check(|certificate, host| check_certificate(certificate, host));

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            // Tags are fetched so that `describe` has something to report.
            .download_tags(AutotagOption::All);
        fetch_options
    }
}

impl Vcs for GitVcs {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn identify(&self, dir: &Path) -> Result<String, VcsError> {
        let repo = Repository::discover(dir)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn describe(&self, dir: &Path, revision: &str) -> String {
        let describe = || -> Result<String, git2::Error> {
            let repo = Repository::discover(dir)?;
            let object = repo.revparse_single(revision)?;
            let mut options = DescribeOptions::new();
            options.describe_tags();
            let description = object.describe(&options)?.format(None);
            description
        };
        match describe() {
            Ok(description) => description,
            Err(error) => {
                trace!("No description for {} in {}: {}", revision, dir.display(), error);
                String::new()
            }
        }
    }

    fn is_dirty(&self, dir: &Path, revision: &str) -> bool {
        let statuses = || -> Result<bool, git2::Error> {
            let repo = Repository::discover(dir)?;
            let head = repo.head()?.peel_to_commit()?.id().to_string();
            if head != revision {
                return Ok(true);
            }
            let mut options = StatusOptions::new();
            options.include_untracked(false).include_ignored(false);
            let statuses = repo.statuses(Some(&mut options))?;
            Ok(statuses.iter().any(|entry| entry.status() != Status::CURRENT))
        };
        statuses().unwrap_or_else(|error| {
            warn!("Could not read status of {}: {}", dir.display(), error);
            true
        })
    }

    fn create(&self, dir: &Path) -> Result<(), VcsError> {
        debug!("Initializing git repository at {}", dir.display());
        Repository::init(dir)?;
        Ok(())
    }

    fn link(&self, dir: &Path, remote: &str, url: &str) -> Result<(), VcsError> {
        let repo = Repository::open(dir)?;
        repo.remote(remote, url)?;
        Ok(())
    }

    fn fetch(&self, dir: &Path, remote: &str) -> Result<(), VcsError> {
        let repo = Repository::open(dir)?;
        let mut remote = repo.find_remote(remote)?;
        debug!("Fetching {:?} into {}", remote.url(), dir.display());
        remote.fetch::<&str>(&[], Some(&mut self.fetch_options()), None)?;
        Ok(())
    }

    fn checkout(&self, workdir: &Path, revision: &str, repo_dir: &Path) -> Result<(), VcsError> {
        let repo = Repository::open(repo_dir)?;
        if repo.workdir() != Some(workdir) {
            repo.set_workdir(workdir, false)?;
        }
        let commit = repo.revparse_single(revision)?.peel_to_commit()?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        repo.set_head_detached(commit.id())?;
        Ok(())
    }
}

fn known_hosts_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(GLOBAL_KNOWN_HOSTS)];
    if let Some(home) = home_dir() {
        files.push(home.join(".ssh").join("known_hosts"));
    }
    files
}

fn check_certificate(
    certificate: &Cert<'_>,
    host: &str,
) -> Result<CertificateCheckStatus, git2::Error> {
    let Some(hostkey) = certificate.as_hostkey().and_then(|h| h.hostkey()) else {
        return Ok(CertificateCheckStatus::CertificatePassthrough);
    };
    for file in known_hosts_files() {
        let entries = match KnownHosts::read_file(&file) {
            Ok(entries) => entries,
            Err(error) => {
                trace!("Could not load {}: {}", file.display(), error);
                continue;
            }
        };
        let matched = entries.iter().any(|entry| {
            host_matches_patterns(host, entry.host_patterns())
                && entry.public_key().to_bytes().as_deref() == Ok(hostkey)
        });
        if matched {
            trace!("Host key of {} matches {}", host, file.display());
            return Ok(CertificateCheckStatus::CertificateOk);
        }
    }
    trace!("No known host entry matched the host key of {}", host);
    Ok(CertificateCheckStatus::CertificatePassthrough)
}

fn host_matches_patterns(host: &str, patterns: &HostPatterns) -> bool {
    match patterns {
        HostPatterns::Patterns(patterns) => {
            let mut matched = false;
            for pattern in patterns {
                let pattern = pattern.to_lowercase();
                // Wildcards are not supported.
                match pattern.strip_prefix('!') {
                    Some(negated) if negated == host => return false,
                    Some(_) => {}
                    None => matched |= pattern == host,
                }
            }
            matched
        }
        HostPatterns::HashedName { .. } => false,
    }
}

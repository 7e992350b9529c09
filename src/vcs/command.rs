//! Backends driving the `hg`, `svn` and `bzr` command line clients.

use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
    process::{Command, Stdio},
};

use log::{debug, warn};

use super::{Vcs, VcsError, VcsKind};

/// Runs `program args...` inside `dir` and returns its trimmed standard output.
fn run(program: &'static str, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
    debug!("Running {} {} in {}", program, args.join(" "), dir.display());
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| VcsError::Spawn { program, source })?;
    if !output.status.success() {
        return Err(VcsError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// Non-empty output means the tree has changes.
fn has_output(program: &'static str, dir: &Path, args: &[&str]) -> bool {
    match run(program, dir, args) {
        Ok(output) => !output.is_empty(),
        Err(error) => {
            warn!("Could not read status of {}: {}", dir.display(), error);
            true
        }
    }
}

fn describe_or_empty(program: &'static str, dir: &Path, args: &[&str]) -> String {
    run(program, dir, args).unwrap_or_else(|error| {
        debug!("No description for {}: {}", dir.display(), error);
        String::new()
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mercurial;

impl Vcs for Mercurial {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn identify(&self, dir: &Path) -> Result<String, VcsError> {
        let id = run("hg", dir, &["identify", "--id", "--debug"])?;
        // A trailing `+` flags local modifications, which `is_dirty` reports.
        Ok(id.trim_end_matches('+').to_owned())
    }

    fn describe(&self, dir: &Path, revision: &str) -> String {
        let tag = describe_or_empty(
            "hg",
            dir,
            &["log", "--rev", revision, "--template", "{latesttag}"],
        );
        if tag == "null" {
            String::new()
        } else {
            tag
        }
    }

    fn is_dirty(&self, dir: &Path, _revision: &str) -> bool {
        has_output(
            "hg",
            dir,
            &["status", "--modified", "--added", "--removed", "--deleted"],
        )
    }

    fn create(&self, dir: &Path) -> Result<(), VcsError> {
        run("hg", dir, &["init"]).map(drop)
    }

    fn link(&self, dir: &Path, remote: &str, url: &str) -> Result<(), VcsError> {
        let mut hgrc = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(".hg").join("hgrc"))?;
        writeln!(hgrc, "[paths]\n{remote} = {url}")?;
        Ok(())
    }

    fn fetch(&self, dir: &Path, remote: &str) -> Result<(), VcsError> {
        run("hg", dir, &["pull", remote]).map(drop)
    }

    fn checkout(&self, workdir: &Path, revision: &str, _repo_dir: &Path) -> Result<(), VcsError> {
        run("hg", workdir, &["update", "--clean", "--rev", revision]).map(drop)
    }
}

/// Subversion has no local history, so the "repository" is a working copy that
/// starts out empty and is filled by the checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subversion;

impl Vcs for Subversion {
    fn kind(&self) -> VcsKind {
        VcsKind::Subversion
    }

    fn identify(&self, dir: &Path) -> Result<String, VcsError> {
        run("svn", dir, &["info", "--show-item", "revision"])
    }

    fn describe(&self, _dir: &Path, _revision: &str) -> String {
        String::new()
    }

    fn is_dirty(&self, dir: &Path, _revision: &str) -> bool {
        has_output("svn", dir, &["status", "--quiet"])
    }

    fn create(&self, dir: &Path) -> Result<(), VcsError> {
        debug!("Working copy at {} is created when linked", dir.display());
        Ok(())
    }

    fn link(&self, dir: &Path, _remote: &str, url: &str) -> Result<(), VcsError> {
        run("svn", dir, &["checkout", "--depth", "empty", url, "."]).map(drop)
    }

    fn fetch(&self, dir: &Path, _remote: &str) -> Result<(), VcsError> {
        run("svn", dir, &["update", "--depth", "empty"]).map(drop)
    }

    fn checkout(&self, workdir: &Path, revision: &str, _repo_dir: &Path) -> Result<(), VcsError> {
        run(
            "svn",
            workdir,
            &["update", "--set-depth", "infinity", "--revision", revision],
        )
        .map(drop)
    }
}

/// Bazaar branches have a single parent location, so the remote name is only
/// used for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bazaar;

impl Vcs for Bazaar {
    fn kind(&self) -> VcsKind {
        VcsKind::Bazaar
    }

    fn identify(&self, dir: &Path) -> Result<String, VcsError> {
        run(
            "bzr",
            dir,
            &["version-info", "--custom", "--template={revision_id}"],
        )
    }

    fn describe(&self, dir: &Path, revision: &str) -> String {
        let revision = format!("revid:{revision}");
        describe_or_empty("bzr", dir, &["revno", "--revision", &revision])
    }

    fn is_dirty(&self, dir: &Path, _revision: &str) -> bool {
        has_output("bzr", dir, &["status", "--short", "--versioned"])
    }

    fn create(&self, dir: &Path) -> Result<(), VcsError> {
        run("bzr", dir, &["init"]).map(drop)
    }

    fn link(&self, dir: &Path, remote: &str, url: &str) -> Result<(), VcsError> {
        debug!("Using {} as bzr parent location for remote {}", url, remote);
        let location = format!("parent_location={url}");
        run("bzr", dir, &["config", &location]).map(drop)
    }

    fn fetch(&self, dir: &Path, _remote: &str) -> Result<(), VcsError> {
        run("bzr", dir, &["pull", "--overwrite"]).map(drop)
    }

    fn checkout(&self, workdir: &Path, revision: &str, _repo_dir: &Path) -> Result<(), VcsError> {
        let revision = format!("revid:{revision}");
        run("bzr", workdir, &["update", "--revision", &revision]).map(drop)
    }
}

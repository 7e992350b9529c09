use std::{env, path::PathBuf};

use anyhow::Context;
use home::home_dir;

use crate::{config::GopinConfig, packages::GoListLoader, vcs::VcsRegistry, Gopin};

#[derive(Default)]
pub struct GopinBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    manifest_name: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    go_command: Option<String>,
}

impl GopinBuilder {
    /// Project root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the manifest file.
    ///
    /// Defaults to `Godeps`.
    pub fn manifest_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_name = Some(path.into());
        self
    }

    /// Workspace dependencies are installed into, as `<root>/src/<repository>`.
    ///
    /// Defaults to the configured workspace root, then the first entry of
    /// `GOPATH`, then `$HOME/go`.
    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(path.into());
        self
    }

    /// Go toolchain binary used to load package metadata.
    ///
    /// Defaults to `go`.
    pub fn go_command(mut self, command: impl Into<String>) -> Self {
        self.go_command = Some(command.into());
        self
    }

    pub fn try_build(self) -> anyhow::Result<Gopin> {
        let Self {
            root,
            manifest_name,
            workspace_root,
            go_command,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let manifest_name = manifest_name.unwrap_or_else(|| PathBuf::from("Godeps"));

        let config = GopinConfig::load()?;

        let workspace_root = match workspace_root.or(config.workspace_root) {
            Some(workspace_root) => root.join(workspace_root),
            None => default_workspace_root()?,
        };

        let go_command = go_command
            .or(config.go_command)
            .unwrap_or_else(|| "go".to_owned());

        let git_config = git2::Config::open_default()?;

        Ok(Gopin {
            loader: GoListLoader::new(go_command, root.clone()),
            registry: VcsRegistry::new(git_config),
            root,
            manifest_name,
            workspace_root,
        })
    }
}

fn default_workspace_root() -> anyhow::Result<PathBuf> {
    if let Some(first) = env::var_os("GOPATH")
        .as_deref()
        .and_then(|paths| env::split_paths(paths).find(|path| !path.as_os_str().is_empty()))
    {
        return Ok(first);
    }
    let mut workspace_root = home_dir()
        .context("Could not find home dir. Please define $HOME or GOPATH env variable.")?;
    workspace_root.push("go");
    Ok(workspace_root)
}

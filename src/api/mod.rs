use std::path::PathBuf;

use crate::{
    cli::command_handlers::{do_install, do_save},
    packages::GoListLoader,
    vcs::VcsRegistry,
};

mod builder;

pub use builder::GopinBuilder;

pub struct Gopin {
    loader: GoListLoader,
    registry: VcsRegistry,
    root: PathBuf,
    manifest_name: PathBuf,
    workspace_root: PathBuf,
}

impl Gopin {
    pub fn builder() -> GopinBuilder {
        GopinBuilder::default()
    }

    /// Checks out every dependency listed in the manifest at its pinned
    /// revision, searching the project root and its parents for the manifest
    pub fn install(&self) -> anyhow::Result<()> {
        do_install(
            &self.loader,
            &self.registry,
            &self.root,
            &self.manifest_name,
            &self.workspace_root,
        )
    }

    /// Pins the current revision of every repository `packages` depend on and
    /// writes the manifest to the project root
    pub fn save(&self, packages: &[String]) -> anyhow::Result<()> {
        do_save(
            &self.loader,
            &self.registry,
            &self.root,
            &self.manifest_name,
            packages,
        )
    }
}

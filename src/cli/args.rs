use clap::Parser;

/// Pins Go dependencies to exact revisions and restores them into a workspace.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Name of the manifest file
    #[clap(long, global = true, default_value = "Godeps", env = "GOPIN_MANIFEST_NAME")]
    pub manifest_name: String,
    /// Workspace dependencies are installed into. Overrides the configured
    /// workspace root and GOPATH
    #[clap(long, global = true)]
    pub workspace_root: Option<String>,
    /// Go toolchain binary used to load package metadata
    #[clap(long, global = true)]
    pub go_command: Option<String>,
}

#[derive(Debug, Parser)]
pub enum Command {
    /// Checks out every dependency in the manifest at its pinned revision
    Install,
    /// Pins the current revision of every dependency of the given packages
    Save {
        #[clap(default_value = ".")]
        packages: Vec<String>,
    },
}

use std::{
    path::PathBuf,
    process::{Command, Output, Stdio},
};

use log::{debug, trace};
use serde_json::Deserializer;

use super::{LoadError, Package, PackageLoader};

/// Loads package metadata by running `go list`.
#[derive(Debug, Clone)]
pub struct GoListLoader {
    command: String,
    /// Relative patterns such as `./...` are resolved against this directory.
    dir: PathBuf,
}

impl GoListLoader {
    pub fn new(command: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        GoListLoader {
            command: command.into(),
            dir: dir.into(),
        }
    }

    fn go(&self, args: &[&str]) -> Result<Output, LoadError> {
        trace!("Running {} {}", self.command, args.join(" "));
        let output = Command::new(&self.command)
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| LoadError::Spawn {
                program: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(LoadError::CommandFailed {
                command: format!("{} {}", self.command, args.first().unwrap_or(&"")),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(output)
    }
}

impl PackageLoader for GoListLoader {
    fn load_packages(&self, import_paths: &[String]) -> Result<Vec<Package>, LoadError> {
        if import_paths.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Listing {} packages", import_paths.len());
        let mut args = vec!["list", "-e", "-json", "--"];
        args.extend(import_paths.iter().map(String::as_str));
        let output = self.go(&args)?;
        parse_package_stream(&output.stdout)
    }

    fn toolchain_version(&self) -> Result<String, LoadError> {
        let output = self.go(&["version"])?;
        Ok(parse_version(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// `go list -json` prints one JSON object per package, back to back.
fn parse_package_stream(stdout: &[u8]) -> Result<Vec<Package>, LoadError> {
    Deserializer::from_slice(stdout)
        .into_iter::<Package>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Extracts `go1.21.0` from `go version go1.21.0 linux/amd64`.
fn parse_version(output: &str) -> String {
    let version = output.trim();
    let version = version.strip_prefix("go version ").unwrap_or(version);
    match version.rsplit_once(' ') {
        Some((version, platform)) if platform.contains('/') => version.to_owned(),
        _ => version.to_owned(),
    }
}

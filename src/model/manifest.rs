use std::path::Path;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::PrettyFormatter;

use super::ManifestError;

/// Everything needed to rebuild a project with the exact same dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub import_path: String,
    #[serde(default)]
    pub go_version: String,
    /// Package patterns given to `save`, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deps: Vec<Dependency>,
}

/// A repository pinned at a specific revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dependency {
    pub import_path: String,
    /// Description of the revision, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// VCS-specific revision identifier.
    pub rev: String,
}

impl Manifest {
    pub fn new(import_path: String, go_version: String, packages: Vec<String>) -> Self {
        Manifest {
            import_path,
            go_version,
            packages,
            deps: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Manifest, ManifestError> {
        debug!("Reading manifest from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Manifest::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Manifest, ManifestError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Tab indented JSON terminated by a newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        buffer.push(b'\n');
        Ok(buffer)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

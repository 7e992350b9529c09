use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::{debug, error, info};

use crate::{
    model::{LoadedManifest, Manifest},
    packages::PackageLoader,
    resolver::Resolver,
    sync,
    vcs::RepositoryDetector,
};

const DEFAULT_PACKAGE: &str = ".";

/// Where a manifest was found.
#[derive(Debug, PartialEq, Eq)]
pub enum ManifestLocation {
    File(PathBuf),
    /// Older projects keep their manifest in a directory of the same name.
    Directory(PathBuf),
}

/// Handler to install command
/// Finds the manifest in the project root or one of its parents, binds every
/// dependency and synchronizes the workspace to the pinned revisions
pub fn do_install(
    loader: &dyn PackageLoader,
    detector: &dyn RepositoryDetector,
    root: &Path,
    manifest_name: &Path,
    workspace_root: &Path,
) -> anyhow::Result<()> {
    let path = match find_in_parents(root, manifest_name)? {
        Some(ManifestLocation::File(path)) => path,
        Some(ManifestLocation::Directory(path)) => {
            info!(
                "{} is a directory, nothing to install",
                path.display()
            );
            return Ok(());
        }
        None => bail!(
            "No {} found (or in any parent directory)",
            manifest_name.display()
        ),
    };
    debug!("Using manifest {}", path.display());

    let loaded = LoadedManifest::load(&path, loader, detector, workspace_root)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    sync::synchronize(&loaded.dependencies()?)?;

    info!(
        "Installed {} dependencies into {}",
        loaded.manifest.deps.len(),
        workspace_root.display()
    );
    Ok(())
}

/// Handler to save command
/// Pins every repository the given packages depend on and writes the manifest
/// to the project root. Nothing is written if any dependency cannot be pinned
pub fn do_save(
    loader: &dyn PackageLoader,
    detector: &dyn RepositoryDetector,
    root: &Path,
    manifest_name: &Path,
    packages: &[String],
) -> anyhow::Result<()> {
    let patterns = if packages.is_empty() {
        vec![DEFAULT_PACKAGE.to_owned()]
    } else {
        packages.to_vec()
    };

    let roots = loader.load_packages(&patterns)?;
    let Some(first) = roots.first() else {
        bail!("No packages matched {}", patterns.join(" "));
    };

    let recorded = if patterns == [DEFAULT_PACKAGE] {
        Vec::new()
    } else {
        patterns.clone()
    };
    let manifest = Manifest::new(
        first.import_path.clone(),
        loader.toolchain_version()?,
        recorded,
    );

    let resolution = Resolver::new(loader, detector).resolve(manifest, &roots)?;
    if resolution.is_complete() {
        for (import_path, source) in &resolution.sources {
            debug!(
                "{} pinned from {} repository {} in workspace {}",
                import_path,
                source.vcs.kind(),
                source.repo_dir.display(),
                source.workspace.display()
            );
        }
    } else {
        for problem in &resolution.errors {
            error!("{}", problem);
        }
    }
    let manifest = resolution.check()?;

    let manifest_path = root.join(manifest_name);
    manifest.write_to_file(&manifest_path)?;
    info!(
        "Pinned {} dependencies in {}",
        manifest.deps.len(),
        manifest_path.display()
    );
    Ok(())
}

/// Looks for `name` in `dir` and then in each of its parents.
///
/// Only a missing candidate moves the search upwards; any other error while
/// inspecting it is returned.
pub fn find_in_parents(dir: &Path, name: &Path) -> anyhow::Result<Option<ManifestLocation>> {
    for ancestor in dir.ancestors() {
        let candidate = ancestor.join(name);
        let exists = candidate
            .try_exists()
            .with_context(|| format!("Failed to inspect {}", candidate.display()))?;
        if !exists {
            continue;
        }
        return Ok(Some(if candidate.is_dir() {
            ManifestLocation::Directory(candidate)
        } else {
            ManifestLocation::File(candidate)
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        resolver::UnpinnedDependencies,
        testing::{package, standard, FakeDetector, FakeLoader, FakeVcs, WORKSPACE},
    };

    use pretty_assertions::assert_eq;

    const MANIFEST_NAME: &str = "Godeps";

    #[test]
    fn find_manifest_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "{}").unwrap();

        assert_eq!(
            find_in_parents(&nested, Path::new(MANIFEST_NAME)).unwrap(),
            Some(ManifestLocation::File(dir.path().join(MANIFEST_NAME)))
        );
    }

    #[test]
    fn nearest_manifest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(nested.join(MANIFEST_NAME)).unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "{}").unwrap();

        assert_eq!(
            find_in_parents(&nested, Path::new(MANIFEST_NAME)).unwrap(),
            Some(ManifestLocation::Directory(nested.join(MANIFEST_NAME)))
        );
    }

    #[test]
    fn uninspectable_candidate_stops_the_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "{}").unwrap();
        // `file/Godeps` cannot be inspected because `file` is not a directory.
        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();

        let error = find_in_parents(&file, Path::new(MANIFEST_NAME)).unwrap_err();

        assert_eq!(
            error.to_string(),
            format!("Failed to inspect {}", file.join(MANIFEST_NAME).display())
        );
    }

    #[test]
    fn install_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let detector = FakeDetector::new(Arc::new(FakeVcs::default()), &[]);

        let error = do_install(
            &FakeLoader::default(),
            &detector,
            dir.path(),
            Path::new("Gopin.missing.manifest"),
            dir.path(),
        )
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "No Gopin.missing.manifest found (or in any parent directory)"
        );
    }

    #[test]
    fn install_with_manifest_directory_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(MANIFEST_NAME)).unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let detector = FakeDetector::new(vcs.clone(), &[]);
        let loader = FakeLoader::default();

        do_install(
            &loader,
            &detector,
            dir.path(),
            Path::new(MANIFEST_NAME),
            dir.path(),
        )
        .unwrap();

        assert!(loader.requests.borrow().is_empty());
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn install_checks_out_pinned_revisions() {
        let project = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join(MANIFEST_NAME),
            r#"{
	"ImportPath": "example.com/app",
	"GoVersion": "go1.21.0",
	"Deps": [
		{
			"ImportPath": "example.com/lib",
			"Rev": "abc123"
		}
	]
}
"#,
        )
        .unwrap();
        let vcs = Arc::new(FakeVcs {
            remote: ["abc123".to_owned()].into(),
            ..Default::default()
        });
        let detector = FakeDetector::new(vcs.clone(), &["example.com/app", "example.com/lib"]);

        do_install(
            &FakeLoader::default(),
            &detector,
            project.path(),
            Path::new(MANIFEST_NAME),
            workspace.path(),
        )
        .unwrap();

        let repo_path = workspace.path().join("src/example.com/lib");
        assert!(repo_path.is_dir());
        assert_eq!(
            vcs.calls(),
            vec![
                format!("create {}", repo_path.display()),
                "link main https://example.com/lib".to_owned(),
                "fetch main".to_owned(),
                "checkout abc123".to_owned(),
                "checkout abc123".to_owned(),
            ]
        );
    }

    const LIB_REPOSITORY: &str = "src/example.com/lib";

    fn save_fixture(dirty: bool) -> (FakeLoader, FakeDetector) {
        let mut loader = FakeLoader::new([standard("fmt"), package("example.com/lib", &[])]);
        loader.packages.insert(
            DEFAULT_PACKAGE.to_owned(),
            package("example.com/app", &["example.com/lib", "fmt"]),
        );

        let lib_dir = Path::new(WORKSPACE).join(LIB_REPOSITORY);
        let mut vcs = FakeVcs {
            heads: [(lib_dir.clone(), "abc123".to_owned())].into(),
            tags: [("abc123".to_owned(), "v1.2.0".to_owned())].into(),
            ..Default::default()
        };
        if dirty {
            vcs.dirty.insert(lib_dir);
        }
        let detector = FakeDetector::new(Arc::new(vcs), &["example.com/app", "example.com/lib"]);
        (loader, detector)
    }

    #[test]
    fn save_writes_manifest() {
        let project = tempfile::tempdir().unwrap();
        let (loader, detector) = save_fixture(false);

        do_save(
            &loader,
            &detector,
            project.path(),
            Path::new(MANIFEST_NAME),
            &[".".to_owned()],
        )
        .unwrap();

        let written = std::fs::read_to_string(project.path().join(MANIFEST_NAME)).unwrap();
        assert_eq!(
            written,
            r#"{
	"ImportPath": "example.com/app",
	"GoVersion": "go1.21.0",
	"Deps": [
		{
			"ImportPath": "example.com/lib",
			"Comment": "v1.2.0",
			"Rev": "abc123"
		}
	]
}
"#
        );
    }

    #[test]
    fn save_with_dirty_dependency_writes_nothing() {
        let project = tempfile::tempdir().unwrap();
        let (loader, detector) = save_fixture(true);

        let error = do_save(
            &loader,
            &detector,
            project.path(),
            Path::new(MANIFEST_NAME),
            &[],
        )
        .unwrap_err();

        assert!(error.downcast_ref::<UnpinnedDependencies>().is_some());
        assert!(!project.path().join(MANIFEST_NAME).exists());
    }
}

//! Build-system detection and dependency resolution.
//!
//! Detection is file-presence only: Gradle build files win over `pom.xml`,
//! anything else is a plain source tree. Resolution is always best-effort;
//! a build tool that cannot be reached resolves to an empty classpath with
//! a warning, and the empty result is still cached upstream so a broken
//! tool cannot cause retry storms.

pub mod cache;
pub mod command;
mod gradle;
mod loader;
mod maven;

pub use cache::{CacheStatistics, DependencyCache};
pub use command::{CommandOutput, CommandRunner, DefaultCommandRunner};
pub use gradle::GradleResolver;
pub use loader::{ClassLoaderContext, ClassLoaderHandle, canonical_key};
pub use maven::MavenResolver;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Build descriptor file names, as watched by the update protocol.
pub const BUILD_DESCRIPTORS: [&str; 5] = [
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "pom.xml",
];

const GRADLE_MARKERS: [&str; 4] = [
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
];

/// Whether a changed path is a build descriptor (by file name).
pub fn is_build_descriptor(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| BUILD_DESCRIPTORS.contains(&name))
}

/// The build system governing a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSystem {
    Gradle,
    Maven,
    None,
}

/// First match wins: any Gradle build file, then `pom.xml`, then none.
pub fn detect_build_system(project_root: &Path) -> BuildSystem {
    if GRADLE_MARKERS
        .iter()
        .any(|m| project_root.join(m).exists())
    {
        BuildSystem::Gradle
    } else if project_root.join("pom.xml").exists() {
        BuildSystem::Maven
    } else {
        BuildSystem::None
    }
}

/// Resolves a project's dependency archives and conventional source roots.
#[derive(Debug)]
pub struct DependencyResolver {
    project_root: PathBuf,
    gradle: GradleResolver,
    maven: MavenResolver,
}

impl DependencyResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::with_runner(project_root, Arc::new(DefaultCommandRunner))
    }

    pub fn with_runner(project_root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            project_root: project_root.into(),
            gradle: GradleResolver::new(runner.clone()),
            maven: MavenResolver::new(runner),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve the dependency archive list for the detected build system.
    /// Never fails: resolution faults degrade to an empty list. Results are
    /// de-duplicated and filtered to paths that exist.
    pub fn resolve_dependencies(&self) -> Vec<PathBuf> {
        let resolved = match detect_build_system(&self.project_root) {
            BuildSystem::Gradle => self.gradle.resolve(&self.project_root),
            BuildSystem::Maven => self.maven.resolve(&self.project_root),
            BuildSystem::None => Ok(Vec::new()),
        };

        match resolved {
            Ok(paths) => {
                let existing: Vec<PathBuf> =
                    paths.into_iter().filter(|p| p.exists()).collect();
                info!(
                    "resolved {} dependencies for {}",
                    existing.len(),
                    self.project_root.display()
                );
                existing
            }
            Err(err) => {
                warn!(
                    "dependency resolution failed for {}: {err}",
                    self.project_root.display()
                );
                Vec::new()
            }
        }
    }

    /// The conventional source directories that exist under the project
    /// root. Custom source sets declared in build descriptors are not
    /// discovered.
    pub fn source_directories(&self) -> Vec<PathBuf> {
        let candidates: &[&str] = match detect_build_system(&self.project_root) {
            BuildSystem::Gradle | BuildSystem::Maven => &[
                "src/main/groovy",
                "src/main/java",
                "src/test/groovy",
                "src/test/java",
            ],
            BuildSystem::None => &["src", "groovy", "java"],
        };
        candidates
            .iter()
            .map(|c| self.project_root.join(c))
            .filter(|p| p.is_dir())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command::test_support::MockCommandRunner;
    use tempfile::TempDir;

    #[test]
    fn test_detection_order() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_build_system(dir.path()), BuildSystem::None);

        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        assert_eq!(detect_build_system(dir.path()), BuildSystem::Maven);

        std::fs::write(dir.path().join("settings.gradle"), "").unwrap();
        assert_eq!(detect_build_system(dir.path()), BuildSystem::Gradle);
    }

    #[test]
    fn test_build_descriptor_names() {
        assert!(is_build_descriptor(Path::new("/ws/build.gradle")));
        assert!(is_build_descriptor(Path::new("/ws/sub/pom.xml")));
        assert!(!is_build_descriptor(Path::new("/ws/Foo.groovy")));
    }

    #[test]
    fn test_resolution_failure_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        let resolver =
            DependencyResolver::with_runner(dir.path(), Arc::new(MockCommandRunner::failing()));
        assert!(resolver.resolve_dependencies().is_empty());
    }

    #[test]
    fn test_resolution_filters_missing_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        let real_jar = dir.path().join("real.jar");
        std::fs::write(&real_jar, b"zip").unwrap();

        let stdout = format!(
            "GROOVY_INDEX_CLASSPATH_BEGIN\n[\"{}\",\"/gone/away.jar\"]\nGROOVY_INDEX_CLASSPATH_END\n",
            real_jar.display()
        );
        let resolver =
            DependencyResolver::with_runner(dir.path(), Arc::new(MockCommandRunner::new(&stdout)));
        assert_eq!(resolver.resolve_dependencies(), vec![real_jar]);
    }

    #[test]
    fn test_source_directories_by_build_system() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/main/groovy")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();

        // Plain tree: the flat convention applies.
        let resolver = DependencyResolver::new(dir.path());
        assert_eq!(resolver.source_directories(), vec![dir.path().join("src")]);

        // Gradle: the Maven-style layout applies.
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        assert_eq!(
            resolver.source_directories(),
            vec![dir.path().join("src/main/groovy")]
        );
    }
}

//! Gradle classpath resolution.
//!
//! Connects to the project by invoking Gradle (wrapper preferred) with a
//! temporary init script that resolves each project's compile classpath and
//! prints the entries as a JSON array between sentinel markers. Everything
//! here is best-effort: a failing invocation resolves to an empty list.

use crate::deps::command::CommandRunner;
use crate::error::{ResolveError, ResolveResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CLASSPATH_BEGIN: &str = "GROOVY_INDEX_CLASSPATH_BEGIN";
const CLASSPATH_END: &str = "GROOVY_INDEX_CLASSPATH_END";

/// Init script registering a resolution hook on every project. The
/// configurations tried mirror what a compiler would see; the runtime
/// classpath is the fallback for projects without a compile configuration.
const INIT_SCRIPT: &str = r#"
import groovy.json.JsonOutput

gradle.projectsEvaluated { g ->
    def entries = new LinkedHashSet<String>()
    g.rootProject.allprojects { p ->
        ["compileClasspath", "runtimeClasspath"].each { name ->
            def cfg = p.configurations.findByName(name)
            if (cfg != null && cfg.canBeResolved) {
                try {
                    cfg.resolve().each { entries << it.absolutePath }
                } catch (Throwable ignored) {
                }
            }
        }
    }
    println "GROOVY_INDEX_CLASSPATH_BEGIN"
    println JsonOutput.toJson(entries as List)
    println "GROOVY_INDEX_CLASSPATH_END"
}
"#;

#[derive(Debug)]
pub struct GradleResolver {
    runner: Arc<dyn CommandRunner>,
}

impl GradleResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Resolve the project classpath. Returns every resolved archive or
    /// directory path, de-duplicated, in resolution order.
    pub fn resolve(&self, project_root: &Path) -> ResolveResult<Vec<PathBuf>> {
        let mut script = tempfile::Builder::new()
            .prefix("groovy-index-init-")
            .suffix(".gradle")
            .tempfile()
            .map_err(ResolveError::Io)?;
        script
            .write_all(INIT_SCRIPT.as_bytes())
            .map_err(ResolveError::Io)?;

        let program = gradle_program(project_root);
        let args = vec![
            "--init-script".to_string(),
            script.path().display().to_string(),
            "-q".to_string(),
            "help".to_string(),
        ];

        debug!("resolving gradle classpath for {}", project_root.display());
        let output = self.runner.run(project_root, &program, &args)?;
        if !output.status.success() {
            return Err(ResolveError::CommandFailed {
                tool: "gradle",
                code: output.status.code(),
                stderr: output.stderr,
            });
        }

        parse_classpath_output(&output.combined())
    }
}

/// Prefer the project's wrapper script when present.
fn gradle_program(project_root: &Path) -> PathBuf {
    let wrapper = if cfg!(windows) {
        project_root.join("gradlew.bat")
    } else {
        project_root.join("gradlew")
    };
    if wrapper.exists() {
        wrapper
    } else {
        PathBuf::from("gradle")
    }
}

/// Extract the JSON array between the sentinel markers.
pub fn parse_classpath_output(output: &str) -> ResolveResult<Vec<PathBuf>> {
    let begin = output
        .find(CLASSPATH_BEGIN)
        .ok_or_else(|| ResolveError::Parse {
            tool: "gradle",
            reason: "missing classpath sentinel".to_string(),
        })?;
    let after_begin = begin + CLASSPATH_BEGIN.len();
    let end = output[after_begin..]
        .find(CLASSPATH_END)
        .map(|i| after_begin + i)
        .ok_or_else(|| ResolveError::Parse {
            tool: "gradle",
            reason: "unterminated classpath sentinel".to_string(),
        })?;

    let json = output[after_begin..end].trim();
    let entries: Vec<String> = serde_json::from_str(json).map_err(|err| ResolveError::Parse {
        tool: "gradle",
        reason: err.to_string(),
    })?;

    let mut paths: Vec<PathBuf> = entries.into_iter().map(PathBuf::from).collect();
    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    Ok(paths)
}

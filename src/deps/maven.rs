//! Maven classpath resolution.
//!
//! Evaluates `project.compileClasspathElements` through `help:evaluate`
//! with `-DforceStdout`. The output is accepted in both shapes Maven
//! produces: a bracketed list (`[a.jar, b.jar]`) or plain lines, possibly
//! using the platform path separator.

use crate::deps::command::CommandRunner;
use crate::error::{ResolveError, ResolveResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct MavenResolver {
    runner: Arc<dyn CommandRunner>,
}

impl MavenResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn resolve(&self, project_root: &Path) -> ResolveResult<Vec<PathBuf>> {
        let program = maven_program(project_root);
        let args = vec![
            "-q".to_string(),
            "-DforceStdout".to_string(),
            "-Dexpression=project.compileClasspathElements".to_string(),
            "help:evaluate".to_string(),
        ];

        debug!("resolving maven classpath for {}", project_root.display());
        let output = self.runner.run(project_root, &program, &args)?;
        if !output.status.success() {
            return Err(ResolveError::CommandFailed {
                tool: "maven",
                code: output.status.code(),
                stderr: output.stderr,
            });
        }

        let entries = parse_classpath_output(&output.stdout);
        if entries.is_empty() {
            Ok(parse_classpath_output(&output.combined()))
        } else {
            Ok(entries)
        }
    }
}

/// Prefer the project's wrapper script when present.
fn maven_program(project_root: &Path) -> PathBuf {
    let wrapper = if cfg!(windows) {
        project_root.join("mvnw.cmd")
    } else {
        project_root.join("mvnw")
    };
    if wrapper.exists() {
        wrapper
    } else {
        PathBuf::from("mvn")
    }
}

fn is_noise_line(line: &str) -> bool {
    line.starts_with("[INFO]")
        || line.starts_with("[WARNING]")
        || line.starts_with("[ERROR]")
        || line.starts_with("Download")
        || line.starts_with("Progress")
}

fn is_null_value(line: &str) -> bool {
    line == "null object or invalid expression" || line == "null"
}

/// Parse `help:evaluate` output into classpath entries.
pub fn parse_classpath_output(output: &str) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        let line = line.trim_matches(|c| matches!(c, '"' | '\'')).trim();
        if line.is_empty() || is_noise_line(line) || is_null_value(line) {
            continue;
        }

        if let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            entries.extend(
                inner
                    .split(',')
                    .map(str::trim)
                    .map(|t| t.trim_matches(|c| matches!(c, '"' | '\'')))
                    .filter(|t| !t.is_empty())
                    .map(PathBuf::from),
            );
            continue;
        }

        // A single classpath line separated by the platform separator.
        let split: Vec<_> = std::env::split_paths(line).collect();
        if split.len() > 1 {
            entries.extend(split);
        } else {
            entries.push(PathBuf::from(line));
        }
    }

    let mut seen = std::collections::HashSet::new();
    entries.retain(|p| seen.insert(p.clone()));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::command::test_support::MockCommandRunner;

    #[test]
    fn test_parse_bracket_list() {
        let out = "[INFO] Scanning for projects...\n[/m2/a.jar, /m2/b.jar, /m2/a.jar]\n";
        assert_eq!(
            parse_classpath_output(out),
            vec![PathBuf::from("/m2/a.jar"), PathBuf::from("/m2/b.jar")]
        );
    }

    #[test]
    fn test_parse_plain_lines() {
        let out = "/m2/a.jar\n/m2/b.jar\n";
        assert_eq!(
            parse_classpath_output(out),
            vec![PathBuf::from("/m2/a.jar"), PathBuf::from("/m2/b.jar")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_path_separated_line() {
        let out = "/m2/a.jar:/m2/b.jar\n";
        assert_eq!(
            parse_classpath_output(out),
            vec![PathBuf::from("/m2/a.jar"), PathBuf::from("/m2/b.jar")]
        );
    }

    #[test]
    fn test_null_value_yields_empty() {
        assert!(parse_classpath_output("null object or invalid expression\n").is_empty());
    }

    #[test]
    fn test_resolve_invokes_help_evaluate() {
        let runner = Arc::new(MockCommandRunner::new("[/m2/x.jar]\n"));
        let resolver = MavenResolver::new(runner.clone());
        let dir = tempfile::tempdir().unwrap();
        let paths = resolver.resolve(dir.path()).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/m2/x.jar")]);

        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].1.contains(&"help:evaluate".to_string()));
    }
}

//! Process invocation for build tools.
//!
//! Resolution shells out to `gradle`/`mvn` (or their wrappers). The runner
//! is a trait so resolver tests can substitute canned output instead of a
//! real build-tool installation.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// Captured output from a command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// `stdout` + `stderr` concatenated with a newline separator when needed.
    pub fn combined(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.stdout);
        if !self.stderr.is_empty() {
            if !s.is_empty() && !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    fn run(&self, cwd: &Path, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs the command synchronously, capturing both streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCommandRunner;

impl CommandRunner for DefaultCommandRunner {
    fn run(&self, cwd: &Path, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!("failed to run `{}`: {err}", program.display()),
                )
            })?;

        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned stdout for every invocation, recording the calls.
    #[derive(Debug)]
    pub struct MockCommandRunner {
        pub stdout: String,
        pub succeed: bool,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockCommandRunner {
        pub fn new(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                succeed: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                stdout: String::new(),
                succeed: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for MockCommandRunner {
        fn run(
            &self,
            _cwd: &Path,
            program: &Path,
            args: &[String],
        ) -> io::Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.display().to_string(), args.to_vec()));
            if !self.succeed {
                return Err(io::Error::other("mock command failed"));
            }
            #[cfg(unix)]
            let status = {
                use std::os::unix::process::ExitStatusExt;
                ExitStatus::from_raw(0)
            };
            #[cfg(windows)]
            let status = {
                use std::os::windows::process::ExitStatusExt;
                ExitStatus::from_raw(0)
            };
            Ok(CommandOutput {
                status,
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }
}

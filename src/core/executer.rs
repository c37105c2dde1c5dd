//! The single funnel through which every shell command runs.

use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use crate::core::context::{ExecutionContext, Overrides, Policy};
use crate::core::error::{Error, Result};
use crate::core::task::TaskGroup;

/// Captured result of a shell command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Handle on a concurrently running task process.
pub trait RunningTask: Send {
    /// Returns the exit code once the process has finished, `None` while it
    /// is still running.
    fn poll(&mut self) -> std::io::Result<Option<i32>>;

    fn kill(&mut self) -> std::io::Result<()>;
}

/// The "run a shell command, get an exit code" primitive. Everything with a
/// shell-level side effect goes through an implementation of this trait.
pub trait CommandRunner: Send + Sync {
    /// Run synchronously with inherited stdio.
    fn run(&self, command: &str) -> i32;

    /// Run synchronously, capturing stdout. Stderr passes through.
    fn capture(&self, command: &str) -> CommandOutput;

    /// Spawn without waiting; task groups poll the returned handle.
    fn spawn(&self, command: &str) -> std::io::Result<Box<dyn RunningTask>>;
}

/// Default runner: commands go through the platform shell.
pub struct ShellRunner;

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    let cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> i32 {
        let status = shell_command(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status();

        match status {
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => -1,
        }
    }

    fn capture(&self, command: &str) -> CommandOutput {
        match shell_command(command).stderr(Stdio::inherit()).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                exit_code: out.status.code().unwrap_or(-1),
                success: out.status.success(),
            },
            Err(_) => CommandOutput {
                stdout: String::new(),
                exit_code: -1,
                success: false,
            },
        }
    }

    fn spawn(&self, command: &str) -> std::io::Result<Box<dyn RunningTask>> {
        let child = shell_command(command).spawn()?;
        Ok(Box::new(ShellTask { child }))
    }
}

struct ShellTask {
    child: Child,
}

impl RunningTask for ShellTask {
    fn poll(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(|s| s.code().unwrap_or(-1)))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill()?;
        // Reap the terminated child
        self.child.wait()?;
        Ok(())
    }
}

/// Runs commands under the context policy. Every shell-level side effect in
/// the orchestration path funnels through here so verbose, dry-run and
/// exit-on-error behave uniformly.
pub struct Executer {
    context: ExecutionContext,
    runner: Arc<dyn CommandRunner>,
}

impl Executer {
    pub fn new(context: ExecutionContext) -> Self {
        Self::with_runner(context, Arc::new(ShellRunner))
    }

    pub fn with_runner(context: ExecutionContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self { context, runner }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub(crate) fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn run(&self, command: &str) -> Result<i32> {
        self.run_with(command, &Overrides::none())
    }

    /// Run one command. The command text is echoed iff the effective policy
    /// is verbose or dry-run; a dry-run call does not execute and counts as
    /// exit code 0. A nonzero exit is fatal unless exit-on-error is
    /// suspended for this call, in which case the code is returned.
    pub fn run_with(&self, command: &str, overrides: &Overrides) -> Result<i32> {
        let policy = self.context.resolve(overrides);

        if policy.verbose || policy.dry_run {
            println!("{command}");
        }

        let exit_code = if policy.dry_run {
            0
        } else {
            self.runner.run(command)
        };

        self.check(command, exit_code, &policy)
    }

    /// Like [`run_with`](Self::run_with) but captures stdout. State probes
    /// (image ids) use this; a dry-run call yields empty, successful output.
    pub fn capture_with(&self, command: &str, overrides: &Overrides) -> Result<CommandOutput> {
        let policy = self.context.resolve(overrides);

        if policy.verbose || policy.dry_run {
            println!("{command}");
        }

        let output = if policy.dry_run {
            CommandOutput {
                stdout: String::new(),
                exit_code: 0,
                success: true,
            }
        } else {
            self.runner.capture(command)
        };

        self.check(command, output.exit_code, &policy)?;
        Ok(output)
    }

    fn check(&self, command: &str, exit_code: i32, policy: &Policy) -> Result<i32> {
        if policy.exit_on_error && exit_code != 0 {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                exit_code,
            });
        }
        Ok(exit_code)
    }

    /// A new task group bound to this executer's policy.
    pub fn task_group(&self) -> TaskGroup<'_> {
        TaskGroup::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        exit_code: i32,
    }

    impl RecordingRunner {
        fn new(exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                exit_code,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &str) -> i32 {
            self.calls.lock().unwrap().push(command.to_string());
            self.exit_code
        }

        fn capture(&self, command: &str) -> CommandOutput {
            self.calls.lock().unwrap().push(command.to_string());
            CommandOutput {
                stdout: "output\n".to_string(),
                exit_code: self.exit_code,
                success: self.exit_code == 0,
            }
        }

        fn spawn(&self, _command: &str) -> std::io::Result<Box<dyn RunningTask>> {
            unreachable!("synchronous tests never spawn");
        }
    }

    #[test]
    fn dry_run_skips_the_runner_and_reports_success() {
        let runner = RecordingRunner::new(7);
        let executer = Executer::with_runner(
            ExecutionContext {
                dry_run: true,
                ..ExecutionContext::default()
            },
            runner.clone(),
        );

        assert_eq!(executer.run("rm -rf /tmp/everything").unwrap(), 0);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn nonzero_exit_is_fatal_by_default() {
        let runner = RecordingRunner::new(3);
        let executer = Executer::with_runner(ExecutionContext::default(), runner);

        let err = executer.run("docker stop nothing").unwrap_err();
        match err {
            Error::CommandFailed { command, exit_code } => {
                assert_eq!(command, "docker stop nothing");
                assert_eq!(exit_code, 3);
                assert_eq!(
                    Error::CommandFailed { command, exit_code }.exit_code(),
                    3
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn best_effort_returns_the_exit_code() {
        let runner = RecordingRunner::new(3);
        let executer = Executer::with_runner(ExecutionContext::default(), runner);

        let code = executer
            .run_with("docker stop nothing", &Overrides::best_effort())
            .unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn capture_returns_stdout() {
        let runner = RecordingRunner::new(0);
        let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());

        let output = executer
            .capture_with("docker images", &Overrides::none())
            .unwrap();
        assert_eq!(output.stdout, "output\n");
        assert_eq!(runner.calls(), vec!["docker images".to_string()]);
    }

    #[test]
    fn capture_during_dry_run_is_empty_and_successful() {
        let runner = RecordingRunner::new(1);
        let executer = Executer::with_runner(
            ExecutionContext {
                dry_run: true,
                ..ExecutionContext::default()
            },
            runner.clone(),
        );

        let output = executer
            .capture_with("docker images", &Overrides::none())
            .unwrap();
        assert!(output.success);
        assert!(output.stdout.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn force_real_executes_during_a_dry_run_session() {
        let runner = RecordingRunner::new(0);
        let executer = Executer::with_runner(
            ExecutionContext {
                dry_run: true,
                ..ExecutionContext::default()
            },
            runner.clone(),
        );

        executer
            .run_with("docker exec toolchain sh", &Overrides::force_real())
            .unwrap();
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn shell_runner_executes_and_dry_run_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let command = format!("touch {}", marker.display());

        let dry = Executer::new(ExecutionContext {
            dry_run: true,
            ..ExecutionContext::default()
        });
        assert_eq!(dry.run(&command).unwrap(), 0);
        assert!(!marker.exists());

        let real = Executer::new(ExecutionContext::default());
        assert_eq!(real.run(&command).unwrap(), 0);
        assert!(marker.exists());
    }
}

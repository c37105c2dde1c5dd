//! Batches of commands run as independent concurrent processes with
//! group-wide cancellation.
//!
//! Each group owns its own cancellation token; a user interrupt is broadcast
//! through the token of every active group, so no group can shadow another's
//! handler. Cancellation is all-or-nothing: once a token is set, every still
//! running process in that group is terminated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::context::Overrides;
use crate::core::executer::{CommandRunner, Executer};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-group cancellation token. Setting it is one-way.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final state of one task in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed(i32),
    Terminated,
}

// Process-wide interrupt flag; active groups poll it alongside their own
// token. The handler only sets the flag, it never touches any task list.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL_HOOK: Once = Once::new();

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install_interrupt_hook() {
    INSTALL_HOOK.call_once(|| {
        #[cfg(unix)]
        unsafe {
            libc::signal(libc::SIGINT, on_interrupt as libc::sighandler_t);
        }
    });
}

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// An ordered batch of pending commands started concurrently, each bound to
/// the owning [`Executer`]'s policy. Nothing survives past `join_tasks`.
pub struct TaskGroup<'a> {
    executer: &'a Executer,
    pending: Vec<String>,
    running: Vec<JoinHandle<TaskStatus>>,
    cancel: CancelToken,
}

impl<'a> TaskGroup<'a> {
    pub(crate) fn new(executer: &'a Executer) -> Self {
        Self {
            executer,
            pending: Vec::new(),
            running: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn add_task(&mut self, command: impl Into<String>) -> &mut Self {
        self.pending.push(command.into());
        self
    }

    /// Token broadcasting cancellation to every task in this group.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Start every pending task concurrently, with no ordering guarantee
    /// between them. A SIGINT delivered while the group is active cancels
    /// the whole group through its token.
    pub fn run_tasks(&mut self) -> &mut Self {
        install_interrupt_hook();

        let policy = self.executer.context().resolve(&Overrides::none());
        for command in self.pending.drain(..) {
            let runner = self.executer.runner();
            let cancel = self.cancel.clone();
            let echo = policy.verbose || policy.dry_run;
            let dry_run = policy.dry_run;

            self.running
                .push(thread::spawn(move || run_task(runner, command, echo, dry_run, cancel)));
        }
        self
    }

    /// Block until every task has finished or been terminated. Statuses come
    /// back in insertion order.
    pub fn join_tasks(&mut self) -> Vec<TaskStatus> {
        self.running
            .drain(..)
            .map(|handle| handle.join().unwrap_or(TaskStatus::Terminated))
            .collect()
    }
}

fn run_task(
    runner: Arc<dyn CommandRunner>,
    command: String,
    echo: bool,
    dry_run: bool,
    cancel: CancelToken,
) -> TaskStatus {
    if echo {
        println!("{command}");
    }
    if dry_run {
        return TaskStatus::Completed(0);
    }

    let mut task = match runner.spawn(&command) {
        Ok(task) => task,
        Err(_) => return TaskStatus::Completed(-1),
    };

    loop {
        if cancel.is_cancelled() || interrupted() {
            let _ = task.kill();
            return TaskStatus::Terminated;
        }

        match task.poll() {
            Ok(Some(exit_code)) => return TaskStatus::Completed(exit_code),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => return TaskStatus::Completed(-1),
        }
    }
}

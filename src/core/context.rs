//! Execution policy shared by every shell-level side effect.
//!
//! The context holds persistent defaults only. Behavior changes for a single
//! call are expressed as an immutable [`Overrides`] value passed to that call,
//! so nothing has to be remembered or cleared afterwards.

/// Persistent execution policy for one top-level invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    pub verbose: bool,
    pub dry_run: bool,
    pub exit_on_error: bool,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            verbose: false,
            dry_run: false,
            exit_on_error: true,
        }
    }
}

impl ExecutionContext {
    pub fn new(verbose: bool, dry_run: bool) -> Self {
        Self {
            verbose,
            dry_run,
            exit_on_error: true,
        }
    }

    /// Resolve the effective policy for one call.
    pub fn resolve(&self, overrides: &Overrides) -> Policy {
        Policy {
            verbose: overrides.verbose.unwrap_or(self.verbose),
            dry_run: overrides.dry_run.unwrap_or(self.dry_run),
            exit_on_error: overrides.exit_on_error.unwrap_or(self.exit_on_error),
        }
    }
}

/// Effective policy for a single `Executer` call.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub verbose: bool,
    pub dry_run: bool,
    pub exit_on_error: bool,
}

/// Per-call policy overrides. `None` fields fall back to the context default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
    pub exit_on_error: Option<bool>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    /// Suppress the command echo for a call that would leak a secret.
    pub fn quiet() -> Self {
        Self {
            verbose: Some(false),
            ..Self::default()
        }
    }

    /// Treat a nonzero exit as a result for the caller instead of a fatal
    /// error. Used for existence probes and best-effort stops.
    pub fn best_effort() -> Self {
        Self {
            exit_on_error: Some(false),
            ..Self::default()
        }
    }

    /// Execute for real even during an otherwise dry-run session.
    pub fn force_real() -> Self {
        Self {
            dry_run: Some(false),
            ..Self::default()
        }
    }
}

/// [`ExecutionContext`] plus the deployer's image (re)build switch.
#[derive(Debug, Clone, Copy)]
pub struct DeployerExecutionContext {
    pub context: ExecutionContext,
    pub build: bool,
}

impl DeployerExecutionContext {
    pub fn new(verbose: bool, dry_run: bool, build: bool) -> Self {
        Self {
            context: ExecutionContext::new(verbose, dry_run),
            build,
        }
    }
}

impl Default for DeployerExecutionContext {
    fn default() -> Self {
        Self {
            context: ExecutionContext::default(),
            build: true,
        }
    }
}

//! Builders rendering the command executed inside the toolchain container.

use crate::core::context::ExecutionContext;
use crate::core::error::{Error, Result};

/// Tool invoked inside the toolchain container for playbook runs.
pub const PLAYBOOK_TOOL: &str = "ansible-playbook";

/// Inventory implicitly passed before the first named inventory.
pub const DEFAULT_INVENTORY: &str = "../hosts.yml";

const INVENTORY_DIR: &str = "../inventories";

/// Verbosity applied when following a verbose context.
const CONTEXT_VERBOSITY: u8 = 3;
const MAX_VERBOSITY: u8 = 4;

/// A closed set of command kinds: a literal shell command or a structured
/// playbook-runner invocation.
pub enum CommandBuilder {
    Shell(ShellCommand),
    Playbook(PlaybookCommand),
}

impl CommandBuilder {
    pub fn shell(command: impl Into<String>) -> Self {
        CommandBuilder::Shell(ShellCommand::new(command))
    }

    /// Render the command line.
    pub fn build(&self) -> Result<String> {
        match self {
            CommandBuilder::Shell(cmd) => Ok(cmd.command.clone()),
            CommandBuilder::Playbook(cmd) => Ok(cmd.render()),
        }
    }

    /// Adapt the rendered command to the session policy. Literal commands
    /// pass through unchanged.
    pub fn follow_context(&mut self, context: &ExecutionContext) {
        if let CommandBuilder::Playbook(cmd) = self {
            cmd.follow_context(context);
        }
    }

    /// Whether a registry login must happen before this command runs.
    pub fn login_required(&self) -> bool {
        match self {
            CommandBuilder::Shell(cmd) => cmd.login_required,
            CommandBuilder::Playbook(cmd) => cmd.login_required,
        }
    }

    pub fn set_login_required(&mut self, required: bool) -> &mut Self {
        match self {
            CommandBuilder::Shell(cmd) => cmd.login_required = required,
            CommandBuilder::Playbook(cmd) => cmd.login_required = required,
        }
        self
    }
}

impl From<ShellCommand> for CommandBuilder {
    fn from(command: ShellCommand) -> Self {
        CommandBuilder::Shell(command)
    }
}

impl From<PlaybookCommand> for CommandBuilder {
    fn from(command: PlaybookCommand) -> Self {
        CommandBuilder::Playbook(command)
    }
}

/// Literal passthrough command.
pub struct ShellCommand {
    command: String,
    login_required: bool,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            login_required: false,
        }
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new("sh")
    }
}

/// Structured playbook-runner invocation.
///
/// Flag order is normalized at render time (inventories, extra vars, tags,
/// check, verbosity, playbooks) regardless of the order setters ran.
#[derive(Default)]
pub struct PlaybookCommand {
    playbooks: Vec<String>,
    inventories: Vec<String>,
    tags: Vec<String>,
    extra_vars: Vec<(String, String)>,
    verbosity: u8,
    check: bool,
    login_required: bool,
}

impl PlaybookCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_playbook(&mut self, name: &str) -> &mut Self {
        self.playbooks.push(format!("{name}.yml"));
        self
    }

    /// The fixed default inventory always precedes the first named one.
    pub fn add_inventory(&mut self, name: &str) -> &mut Self {
        if self.inventories.is_empty() {
            self.inventories.push(DEFAULT_INVENTORY.to_string());
        }
        self.inventories.push(format!("{INVENTORY_DIR}/{name}.yml"));
        self
    }

    pub fn add_tag(&mut self, tag: &str) -> &mut Self {
        self.tags.push(tag.to_string());
        self
    }

    /// A later write to an existing key updates it in place, keeping the
    /// original insertion order.
    pub fn add_extra_var(&mut self, name: &str, value: &str) -> &mut Self {
        match self.extra_vars.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.extra_vars.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn set_verbosity(&mut self, verbosity: u8) -> Result<&mut Self> {
        if verbosity > MAX_VERBOSITY {
            return Err(Error::configuration(
                "Verbosity must be a level from 0 to 4",
            ));
        }
        self.verbosity = verbosity;
        Ok(self)
    }

    pub fn set_check(&mut self, check: bool) -> &mut Self {
        self.check = check;
        self
    }

    pub fn set_login_required(&mut self, required: bool) -> &mut Self {
        self.login_required = required;
        self
    }

    /// Verbose sessions run at a fixed high verbosity; dry-run sessions
    /// become check-mode runs.
    pub fn follow_context(&mut self, context: &ExecutionContext) {
        self.verbosity = if context.verbose { CONTEXT_VERBOSITY } else { 0 };
        self.check = context.dry_run;
    }

    fn render(&self) -> String {
        let mut args = String::new();

        for inventory in &self.inventories {
            args.push_str(&format!("-i {inventory} "));
        }

        for (name, value) in &self.extra_vars {
            args.push_str(&format!("-e {name}={value} "));
        }

        if !self.tags.is_empty() {
            args.push_str(&format!("--tags={} ", self.tags.join(",")));
        }

        if self.check {
            args.push_str("--check ");
        }

        if self.verbosity > 0 {
            args.push_str(&format!("-{} ", "v".repeat(self.verbosity as usize)));
        }

        for playbook in &self.playbooks {
            args.push_str(&format!("{playbook} "));
        }

        format!("{PLAYBOOK_TOOL} {args}")
    }
}

//! Container-engine invocations: structured `run`/`exec` builders and the
//! thin operation set routed through the [`Executer`] funnel.

use crate::core::context::Overrides;
use crate::core::error::{Error, Result};
use crate::core::executer::Executer;
use crate::tty;

/// `docker run` invocation assembled from structured fields.
///
/// Flags render in a fixed order: autoremove, daemon, interactive, tty,
/// name, env, volumes, ports, networks, then image and trailing command.
pub struct RunSpec {
    image: Option<String>,
    name: Option<String>,
    daemon: bool,
    interactive: bool,
    tty: bool,
    autoremove: bool,
    env: Vec<(String, String)>,
    volumes: Vec<(String, String)>,
    ports: Vec<(u16, u16)>,
    networks: Vec<String>,
    command: Option<String>,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            image: None,
            name: None,
            daemon: false,
            interactive: false,
            tty: false,
            autoremove: true,
            env: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            networks: Vec::new(),
            command: None,
        }
    }
}

impl RunSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&mut self, image: impl Into<String>) -> &mut Self {
        self.image = Some(image.into());
        self
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn daemon(&mut self) -> &mut Self {
        self.daemon = true;
        self
    }

    pub fn interactive(&mut self, interactive: bool) -> &mut Self {
        self.interactive = interactive;
        self
    }

    pub fn tty(&mut self, tty: bool) -> &mut Self {
        self.tty = tty;
        self
    }

    pub fn autoremove(&mut self, autoremove: bool) -> &mut Self {
        self.autoremove = autoremove;
        self
    }

    pub fn env(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// One target per source: binding a source again replaces its target.
    pub fn volume(&mut self, source: impl Into<String>, target: impl Into<String>) -> &mut Self {
        let source = source.into();
        let target = target.into();
        match self.volumes.iter_mut().find(|(s, _)| *s == source) {
            Some(entry) => entry.1 = target,
            None => self.volumes.push((source, target)),
        }
        self
    }

    pub fn bind_port(&mut self, port: u16) -> &mut Self {
        self.bind_port_to(port, port)
    }

    pub fn bind_port_to(&mut self, port: u16, target: u16) -> &mut Self {
        self.ports.push((target, port));
        self
    }

    pub fn network(&mut self, name: impl Into<String>) -> &mut Self {
        self.networks.push(name.into());
        self
    }

    pub fn command(&mut self, command: impl Into<String>) -> &mut Self {
        self.command = Some(command.into());
        self
    }

    pub fn build(&self) -> Result<String> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::configuration("Missing image to run"))?;

        let mut args: Vec<String> = vec!["docker".into(), "run".into()];

        if self.autoremove {
            args.push("--rm".into());
        }
        if self.daemon {
            args.push("-d".into());
        }
        if self.interactive {
            args.push("-i".into());
        }
        if self.tty {
            args.push("-t".into());
        }
        if let Some(name) = &self.name {
            args.push("--name".into());
            args.push(name.clone());
        }
        for (name, value) in &self.env {
            args.push("-e".into());
            args.push(format!("{name}={value}"));
        }
        for (source, target) in &self.volumes {
            args.push("-v".into());
            args.push(format!("{source}:{target}"));
        }
        for (target, port) in &self.ports {
            args.push("-p".into());
            args.push(format!("{target}:{port}"));
        }
        for network in &self.networks {
            args.push(format!("--network={network}"));
        }

        args.push(image.clone());
        if let Some(command) = &self.command {
            args.push(command.clone());
        }

        Ok(args.join(" "))
    }
}

/// `docker exec` invocation. Interactivity defaults to whether the invoking
/// session is interactive.
pub struct ExecSpec {
    container: Option<String>,
    command: Option<String>,
    interactive: bool,
    tty: bool,
}

impl Default for ExecSpec {
    fn default() -> Self {
        let interactive = tty::is_interactive();
        Self {
            container: None,
            command: None,
            interactive,
            tty: interactive,
        }
    }
}

impl ExecSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&mut self, container: impl Into<String>) -> &mut Self {
        self.container = Some(container.into());
        self
    }

    pub fn command(&mut self, command: impl Into<String>) -> &mut Self {
        self.command = Some(command.into());
        self
    }

    pub fn interactive(&mut self, interactive: bool) -> &mut Self {
        self.interactive = interactive;
        self
    }

    pub fn tty(&mut self, tty: bool) -> &mut Self {
        self.tty = tty;
        self
    }

    pub fn build(&self) -> Result<String> {
        let container = self
            .container
            .as_ref()
            .ok_or_else(|| Error::configuration("Missing container to execute in"))?;
        let command = self
            .command
            .as_ref()
            .ok_or_else(|| Error::configuration("Missing command to execute"))?;

        let mut args: Vec<String> = vec!["docker".into(), "exec".into()];
        if self.interactive {
            args.push("-i".into());
        }
        if self.tty {
            args.push("-t".into());
        }
        args.push(container.clone());
        args.push(command.clone());

        Ok(args.join(" "))
    }
}

/// Thin container-engine operations, every one routed through the Executer
/// so the active policy applies uniformly.
pub struct ContainerRuntime<'a> {
    executer: &'a Executer,
}

impl<'a> ContainerRuntime<'a> {
    pub fn new(executer: &'a Executer) -> Self {
        Self { executer }
    }

    pub fn build_image(&self, image: &str, directory: &str) -> Result<i32> {
        self.executer
            .run(&format!("docker build -t {image} {directory}"))
    }

    /// A nonzero inspect exit means "not running", never a fatal error, so
    /// exit-on-error is suspended for exactly this call.
    pub fn is_running(&self, container: &str) -> bool {
        let probe = format!("docker container inspect {container} >/dev/null 2>&1");
        matches!(
            self.executer.run_with(&probe, &Overrides::best_effort()),
            Ok(0)
        )
    }

    pub fn run(&self, spec: &RunSpec) -> Result<i32> {
        self.run_with(spec, &Overrides::none())
    }

    pub fn run_with(&self, spec: &RunSpec, overrides: &Overrides) -> Result<i32> {
        self.executer.run_with(&spec.build()?, overrides)
    }

    pub fn exec(&self, spec: &ExecSpec) -> Result<i32> {
        self.exec_with(spec, &Overrides::none())
    }

    pub fn exec_with(&self, spec: &ExecSpec, overrides: &Overrides) -> Result<i32> {
        self.executer.run_with(&spec.build()?, overrides)
    }

    pub fn push(&self, image: &str, tag: &str) -> Result<i32> {
        self.executer.run(&format!("docker push {image}:{tag}"))
    }

    pub fn start(&self, container: &str) -> Result<i32> {
        self.executer.run(&format!("docker start {container}"))
    }

    pub fn stop(&self, container: &str) -> Result<i32> {
        self.executer.run(&format!("docker stop {container}"))
    }

    /// Best-effort stop: a failure comes back as an exit code.
    pub fn stop_best_effort(&self, container: &str) -> Result<i32> {
        self.executer
            .run_with(&format!("docker stop {container}"), &Overrides::best_effort())
    }

    /// Identifier of the locally available image; empty when absent.
    pub fn image_id(&self, image: &str) -> Result<String> {
        let probe = format!("docker images --format \"{{{{.ID}}}}\" {image}");
        let output = self.executer.capture_with(&probe, &Overrides::none())?;
        Ok(output.stdout.lines().next().unwrap_or("").trim().to_string())
    }
}

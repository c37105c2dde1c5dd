//! Lifecycle orchestration for the toolchain container: build, converge the
//! container state, authenticate, then execute the requested command inside.

use std::env;

use crate::core::command::CommandBuilder;
use crate::core::context::{DeployerExecutionContext, Overrides};
use crate::core::docker::{ContainerRuntime, ExecSpec, RunSpec};
use crate::core::error::Result;
use crate::core::executer::Executer;
use crate::log_status;

pub const TOOLCHAIN_IMAGE: &str = "deckhand/toolchain";
pub const TOOLCHAIN_CONTAINER: &str = "deckhand-toolchain";
pub const CONTAINER_WORKSPACE: &str = "/usr/src/workspace";
pub const TOOLCHAIN_BUILD_DIR: &str = "./toolchain";
pub const TOOLCHAIN_CONFIG_MOUNT: &str = "/etc/ansible";
pub const ENGINE_SOCKET: &str = "/var/run/docker.sock";

pub const SIDECAR_CONTAINER: &str = "tcp-connect";
pub const SIDECAR_IMAGE: &str = "alpine/socat";
pub const SIDECAR_PORT: u16 = 2375;

pub const REGISTRY_USERNAME_VAR: &str = "DOCKER_USERNAME";
pub const REGISTRY_TOKEN_VAR: &str = "DOCKER_TOKEN";

/// Host platform the deployer adapts to. Detected once at startup; every
/// platform-specific behavior hangs off this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    MacOs,
    Windows,
}

impl HostPlatform {
    pub fn detect() -> Self {
        match env::consts::OS {
            "macos" => HostPlatform::MacOs,
            "windows" => HostPlatform::Windows,
            _ => HostPlatform::Linux,
        }
    }

    /// Identifier exported into the container so playbooks can branch on the
    /// host they are driven from.
    pub fn host_system(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::MacOs => "darwin",
            HostPlatform::Windows => "win32",
        }
    }

    /// Rewrite the host workspace path into the form the engine accepts as a
    /// bind source. Only Windows paths change: backslashes become slashes,
    /// the drive colon is dropped and the drive letter is lowered, so
    /// `C:\Users\Dev` becomes `/c/Users/Dev`.
    pub fn translate_workspace(&self, workspace: &str) -> String {
        match self {
            HostPlatform::Windows => {
                let mut path = workspace.replace('\\', "/").replace(':', "");
                if let Some(first) = path.get(..1) {
                    let lowered = first.to_ascii_lowercase();
                    path.replace_range(..1, &lowered);
                }
                format!("/{path}")
            }
            _ => workspace.to_string(),
        }
    }

    /// One-time platform preparation before any engine use. On macOS the
    /// engine socket is not reachable over TCP by default, so a socat sidecar
    /// forwards the socket; if the sidecar already exists but is stopped, it
    /// is started instead.
    pub fn prepare(&self, docker: &ContainerRuntime<'_>) -> Result<()> {
        if *self != HostPlatform::MacOs {
            return Ok(());
        }

        let mut sidecar = RunSpec::new();
        sidecar
            .daemon()
            .name(SIDECAR_CONTAINER)
            .bind_port(SIDECAR_PORT)
            .volume(ENGINE_SOCKET, ENGINE_SOCKET)
            .image(SIDECAR_IMAGE)
            .command(format!(
                "tcp-listen:{SIDECAR_PORT},fork,reuseaddr unix-connect:{ENGINE_SOCKET}"
            ));

        // A name collision means the sidecar exists already; fall back to
        // starting the stopped container.
        if docker.run_with(&sidecar, &Overrides::best_effort())? != 0 {
            docker.start(SIDECAR_CONTAINER)?;
        }

        Ok(())
    }
}

/// Drives the toolchain container through its lifecycle and runs commands
/// inside it.
pub struct Deployer<'a> {
    executer: &'a Executer,
    docker: ContainerRuntime<'a>,
    platform: HostPlatform,
    build: bool,
    host_workspace: String,
}

impl<'a> Deployer<'a> {
    /// Deployer adapted to the detected host platform, rooted at the current
    /// working directory.
    pub fn from_host(executer: &'a Executer, context: &DeployerExecutionContext) -> Self {
        Self::with_platform(executer, context, HostPlatform::detect(), host_workspace())
    }

    pub fn with_platform(
        executer: &'a Executer,
        context: &DeployerExecutionContext,
        platform: HostPlatform,
        host_workspace: String,
    ) -> Self {
        Self {
            executer,
            docker: ContainerRuntime::new(executer),
            platform,
            build: context.build,
            host_workspace: platform.translate_workspace(&host_workspace),
        }
    }

    pub fn is_running(&self) -> bool {
        self.docker.is_running(TOOLCHAIN_CONTAINER)
    }

    pub fn image_id(&self) -> Result<String> {
        self.docker.image_id(TOOLCHAIN_IMAGE)
    }

    /// Full lifecycle: prepare the platform, rebuild the image when enabled,
    /// converge the container onto the current image, authenticate when the
    /// command needs it, then execute the command inside the container.
    pub fn run(&self, builder: &mut CommandBuilder) -> Result<()> {
        self.platform.prepare(&self.docker)?;

        let known_id = self.image_id()?;
        if self.build {
            self.docker.build_image(TOOLCHAIN_IMAGE, TOOLCHAIN_BUILD_DIR)?;
        }
        let current_id = self.image_id()?;

        if current_id != known_id && self.is_running() {
            log_status!("deployer", "Toolchain image changed, replacing the running container");
            self.docker.stop_best_effort(TOOLCHAIN_CONTAINER)?;
        }

        if !self.is_running() {
            self.start()?;
        }

        if builder.login_required() {
            self.login_registry()?;
        }

        self.execute(builder)
    }

    /// Publish the toolchain image.
    pub fn push(&self) -> Result<i32> {
        self.docker.push(TOOLCHAIN_IMAGE, "latest")
    }

    fn start(&self) -> Result<i32> {
        let mut spec = RunSpec::new();
        spec.name(TOOLCHAIN_CONTAINER)
            .daemon()
            .env("HOST_SYSTEM", self.platform.host_system())
            .env("WORKSPACE_HOSTED", self.host_workspace.as_str())
            .env("WORKSPACE_LOCAL", CONTAINER_WORKSPACE)
            .volume(ENGINE_SOCKET, ENGINE_SOCKET)
            .volume(
                format!("{}/toolchain", self.host_workspace),
                TOOLCHAIN_CONFIG_MOUNT,
            )
            .volume(self.host_workspace.as_str(), CONTAINER_WORKSPACE)
            .network("host")
            .image(TOOLCHAIN_IMAGE)
            .command("sleep infinity");

        self.docker.run(&spec)
    }

    /// Registry login inside the toolchain container. When both credential
    /// variables are set the login is non-interactive and the echo is
    /// suppressed so the token never reaches the terminal; otherwise the
    /// engine prompts and the session must be interactive.
    fn login_registry(&self) -> Result<i32> {
        let username = env::var(REGISTRY_USERNAME_VAR).ok();
        let token = env::var(REGISTRY_TOKEN_VAR).ok();

        let mut command = String::from("docker login");
        if username.is_some() {
            command.push_str(&format!(" --username ${REGISTRY_USERNAME_VAR}"));
        }
        if token.is_some() {
            command.push_str(&format!(" --password ${REGISTRY_TOKEN_VAR}"));
        }

        let mut spec = ExecSpec::new();
        spec.container(TOOLCHAIN_CONTAINER).command(command);

        if username.is_some() && token.is_some() {
            self.docker.exec_with(&spec, &Overrides::quiet())
        } else {
            spec.interactive(true).tty(true);
            self.docker.exec(&spec)
        }
    }

    /// Execute the built command inside the container. The rendered command
    /// follows the session policy itself (check mode, verbosity), so the
    /// exec is always real even during a dry-run session.
    fn execute(&self, builder: &mut CommandBuilder) -> Result<()> {
        builder.follow_context(self.executer.context());

        let mut spec = ExecSpec::new();
        spec.container(TOOLCHAIN_CONTAINER).command(builder.build()?);

        self.docker.exec_with(&spec, &Overrides::force_real())?;
        Ok(())
    }
}

fn host_workspace() -> String {
    env::current_dir()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("."))
}

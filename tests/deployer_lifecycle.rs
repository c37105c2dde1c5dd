use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use deckhand::command::{CommandBuilder, PlaybookCommand};
use deckhand::context::{DeployerExecutionContext, ExecutionContext};
use deckhand::deployer::{Deployer, HostPlatform};
use deckhand::docker::ContainerRuntime;
use deckhand::executer::{CommandOutput, CommandRunner, Executer, RunningTask};

/// Records every command and answers with scripted exit codes (matched by
/// command prefix) and scripted capture outputs (consumed in order).
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    exits: Vec<(&'static str, i32)>,
    captures: Mutex<VecDeque<&'static str>>,
}

impl ScriptedRunner {
    fn new(exits: &[(&'static str, i32)], captures: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            exits: exits.to_vec(),
            captures: Mutex::new(captures.iter().copied().collect()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn exit_for(&self, command: &str) -> i32 {
        self.exits
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix))
            .map(|(_, code)| *code)
            .unwrap_or(0)
    }
}

struct DoneTask;

impl RunningTask for DoneTask {
    fn poll(&mut self) -> std::io::Result<Option<i32>> {
        Ok(Some(0))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> i32 {
        self.calls.lock().unwrap().push(command.to_string());
        self.exit_for(command)
    }

    fn capture(&self, command: &str) -> CommandOutput {
        self.calls.lock().unwrap().push(command.to_string());
        CommandOutput {
            stdout: self
                .captures
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or("")
                .to_string(),
            exit_code: 0,
            success: true,
        }
    }

    fn spawn(&self, command: &str) -> std::io::Result<Box<dyn RunningTask>> {
        self.calls.lock().unwrap().push(command.to_string());
        Ok(Box::new(DoneTask))
    }
}

fn deploy_builder() -> CommandBuilder {
    let mut playbook = PlaybookCommand::new();
    playbook.add_playbook("deploy");
    CommandBuilder::from(playbook)
}

fn linux_deployer<'a>(
    executer: &'a Executer,
    context: &DeployerExecutionContext,
) -> Deployer<'a> {
    Deployer::with_platform(
        executer,
        context,
        HostPlatform::Linux,
        "/home/dev/project".to_string(),
    )
}

#[test]
fn fresh_environment_builds_starts_and_executes() {
    // No container yet: inspect fails; image appears after the build.
    let runner = ScriptedRunner::new(&[("docker container inspect", 1)], &["", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    linux_deployer(&executer, &context)
        .run(&mut deploy_builder())
        .unwrap();

    let calls = runner.calls();
    assert_eq!(
        calls[1],
        "docker build -t deckhand/toolchain ./toolchain"
    );
    assert!(calls.contains(&String::from(
        "docker run --rm -d --name deckhand-toolchain \
         -e HOST_SYSTEM=linux \
         -e WORKSPACE_HOSTED=/home/dev/project \
         -e WORKSPACE_LOCAL=/usr/src/workspace \
         -v /var/run/docker.sock:/var/run/docker.sock \
         -v /home/dev/project/toolchain:/etc/ansible \
         -v /home/dev/project:/usr/src/workspace \
         --network=host deckhand/toolchain sleep infinity"
    )));

    let exec = calls.last().unwrap();
    assert!(exec.starts_with("docker exec"));
    assert!(exec.ends_with("deckhand-toolchain ansible-playbook deploy.yml "));
}

#[test]
fn unchanged_image_on_running_container_skips_stop_and_start() {
    let runner = ScriptedRunner::new(&[], &["abc123\n", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    linux_deployer(&executer, &context)
        .run(&mut deploy_builder())
        .unwrap();

    let calls = runner.calls();
    assert!(!calls.iter().any(|c| c.starts_with("docker stop")));
    assert!(!calls.iter().any(|c| c.starts_with("docker run --rm -d --name deckhand-toolchain")));
    assert!(calls.last().unwrap().starts_with("docker exec"));
}

#[test]
fn changed_image_on_running_container_stops_before_executing() {
    let runner = ScriptedRunner::new(&[], &["old111\n", "new222\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    linux_deployer(&executer, &context)
        .run(&mut deploy_builder())
        .unwrap();

    let calls = runner.calls();
    let stop = calls
        .iter()
        .position(|c| c == "docker stop deckhand-toolchain")
        .expect("stale container must be stopped");
    let exec = calls
        .iter()
        .position(|c| c.starts_with("docker exec"))
        .expect("command must still execute");
    assert!(stop < exec);
}

#[test]
fn skipping_the_build_leaves_the_image_alone() {
    let runner = ScriptedRunner::new(&[], &["abc123\n", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext {
        context: ExecutionContext::default(),
        build: false,
    };

    linux_deployer(&executer, &context)
        .run(&mut deploy_builder())
        .unwrap();

    assert!(!runner.calls().iter().any(|c| c.starts_with("docker build")));
}

#[test]
fn dry_run_session_still_executes_in_check_mode() {
    let runner = ScriptedRunner::new(&[], &[]);
    let executer = Executer::with_runner(
        ExecutionContext {
            dry_run: true,
            ..ExecutionContext::default()
        },
        runner.clone(),
    );
    let context = DeployerExecutionContext::default();

    linux_deployer(&executer, &context)
        .run(&mut deploy_builder())
        .unwrap();

    // Everything else was dry; the exec alone reached the runner, in check
    // mode instead of applying changes.
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("docker exec"));
    assert!(calls[0].ends_with("ansible-playbook --check deploy.yml "));
}

#[test]
fn registry_login_adapts_to_available_credentials() {
    // One test fn: the process environment is shared across test threads.
    std::env::set_var("DOCKER_USERNAME", "dev");
    std::env::set_var("DOCKER_TOKEN", "s3cret");

    let runner = ScriptedRunner::new(&[], &["abc123\n", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    let mut builder = deploy_builder();
    builder.set_login_required(true);
    linux_deployer(&executer, &context).run(&mut builder).unwrap();

    let login = runner
        .calls()
        .into_iter()
        .find(|c| c.contains("docker login"))
        .expect("login must run before the command");
    assert!(login.contains("--username $DOCKER_USERNAME"));
    assert!(login.contains("--password $DOCKER_TOKEN"));
    assert!(!login.starts_with("docker exec -i -t"));

    // Without the token the engine prompts, so the exec turns interactive.
    std::env::remove_var("DOCKER_TOKEN");

    let runner = ScriptedRunner::new(&[], &["abc123\n", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let mut builder = deploy_builder();
    builder.set_login_required(true);
    linux_deployer(&executer, &context).run(&mut builder).unwrap();

    let login = runner
        .calls()
        .into_iter()
        .find(|c| c.contains("docker login"))
        .expect("login must run before the command");
    assert!(login.starts_with("docker exec -i -t"));
    assert!(login.contains("--username $DOCKER_USERNAME"));
    assert!(!login.contains("--password"));

    std::env::remove_var("DOCKER_USERNAME");
}

#[test]
fn macos_sidecar_falls_back_to_starting_an_existing_container() {
    // The sidecar name is taken: the run fails, the start succeeds.
    let runner = ScriptedRunner::new(
        &[("docker run --rm -d --name tcp-connect", 125)],
        &["abc123\n", "abc123\n"],
    );
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    Deployer::with_platform(
        &executer,
        &context,
        HostPlatform::MacOs,
        "/Users/dev/project".to_string(),
    )
    .run(&mut deploy_builder())
    .unwrap();

    let calls = runner.calls();
    assert_eq!(
        calls[0],
        "docker run --rm -d --name tcp-connect -v /var/run/docker.sock:/var/run/docker.sock \
         -p 2375:2375 alpine/socat \
         tcp-listen:2375,fork,reuseaddr unix-connect:/var/run/docker.sock"
    );
    assert_eq!(calls[1], "docker start tcp-connect");
}

#[test]
fn windows_workspace_is_translated_in_the_container_mounts() {
    let runner = ScriptedRunner::new(&[("docker container inspect", 1)], &["", "abc123\n"]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner.clone());
    let context = DeployerExecutionContext::default();

    Deployer::with_platform(
        &executer,
        &context,
        HostPlatform::Windows,
        "C:\\Users\\Dev".to_string(),
    )
    .run(&mut deploy_builder())
    .unwrap();

    let run = runner
        .calls()
        .into_iter()
        .find(|c| c.starts_with("docker run --rm -d --name deckhand-toolchain"))
        .expect("container must start");
    assert!(run.contains("-e HOST_SYSTEM=win32"));
    assert!(run.contains("-e WORKSPACE_HOSTED=/c/Users/Dev"));
    assert!(run.contains("-v /c/Users/Dev:/usr/src/workspace"));
    assert!(run.contains("-v /c/Users/Dev/toolchain:/etc/ansible"));
}

#[test]
fn liveness_probe_failure_is_not_fatal() {
    let runner = ScriptedRunner::new(&[("docker container inspect", 1)], &[]);
    let executer = Executer::with_runner(ExecutionContext::default(), runner);
    let docker = ContainerRuntime::new(&executer);

    assert!(!docker.is_running("deckhand-toolchain"));
}

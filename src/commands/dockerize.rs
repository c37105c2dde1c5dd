use clap::{Args, ValueEnum};

use deckhand::command::{CommandBuilder, PlaybookCommand};
use deckhand::context::DeployerExecutionContext;
use deckhand::deployer::Deployer;
use deckhand::executer::Executer;
use deckhand::task::TaskStatus;
use deckhand::{Error, Result};

const API_CONTAINER: &str = "deckhand-api";
const APP_CONTAINER: &str = "deckhand-app";

#[derive(Args)]
pub struct DockerizeArgs {
    /// Target environment
    #[arg(value_enum)]
    pub environment: Environment,

    /// Services to run; all of them when omitted
    #[arg(short, long, value_enum, num_args = 1..)]
    pub services: Vec<Service>,

    /// Extra tags to pass through to the playbook run
    #[arg(short, long, num_args = 1..)]
    pub tags: Vec<String>,

    /// Additional playbook variables as key=value pairs
    #[arg(short = 'a', long = "vars", num_args = 1..)]
    pub extra_vars: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Test,
    Ci,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Service {
    Api,
    App,
}

impl Service {
    fn tag(&self) -> &'static str {
        match self {
            Service::Api => "api",
            Service::App => "app",
        }
    }
}

pub fn run(
    args: DockerizeArgs,
    executer: &Executer,
    context: &DeployerExecutionContext,
) -> Result<()> {
    let mut playbook = PlaybookCommand::new();
    playbook.add_playbook("build");
    playbook.add_playbook(match args.environment {
        Environment::Ci => "run-ci",
        _ => "run",
    });
    playbook.add_inventory(match args.environment {
        Environment::Dev => "dev",
        Environment::Test => "test",
        Environment::Ci => "ci",
    });

    for tag in &args.tags {
        playbook.add_tag(tag);
    }
    for service in &args.services {
        playbook.add_tag(service.tag());
    }

    for pair in &args.extra_vars {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::configuration(format!("Invalid variable '{pair}', expected key=value")))?;
        playbook.add_extra_var(name, value);
    }

    if args.environment == Environment::Dev {
        playbook
            .add_playbook("healthcheck")
            .add_extra_var("healthcheck_wait", "yes");
    }

    let mut builder = CommandBuilder::from(playbook);
    Deployer::from_host(executer, context).run(&mut builder)?;

    if args.environment != Environment::Ci {
        follow_service_logs(executer)?;
    }

    Ok(())
}

/// Follow both service containers' logs concurrently until interrupted, each
/// line prefixed with a colorized service label.
fn follow_service_logs(executer: &Executer) -> Result<()> {
    let mut group = executer.task_group();
    group
        .add_task(labeled_follow(API_CONTAINER, "backend", 33, "Yellow"))
        .add_task(labeled_follow(APP_CONTAINER, "frontend", 32, "DarkYellow"));

    let statuses = group.run_tasks().join_tasks();
    if statuses.contains(&TaskStatus::Terminated) {
        return Err(Error::Interrupted);
    }
    Ok(())
}

fn labeled_follow(container: &str, label: &str, color: u8, win_color: &str) -> String {
    let follow = format!("docker logs --follow --tail 0 {container}");

    if cfg!(windows) {
        format!(
            "powershell \"{follow} | % {{ Write-Host -NoNewline -ForegroundColor {win_color} '{label} | '; Write-Host $_ }}\""
        )
    } else {
        format!("{follow} | sed -e 's/^/\x1b[0;{color}m{label} | \x1b[0m/'")
    }
}

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use deckhand::context::{DeployerExecutionContext, ExecutionContext};
use deckhand::executer::Executer;

mod commands;

use commands::{deploy, dockerize, exec, package, status};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version = VERSION)]
#[command(about = "Build and drive a containerized deployment toolchain")]
struct Cli {
    /// Echo every command before running it.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output every action but don't run them.
    #[arg(short = 'd', long, global = true)]
    dry_run: bool,

    /// Skip rebuilding the toolchain image.
    #[arg(long, global = true)]
    no_build: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a production environment
    Deploy,
    /// Build and run a ready-to-use environment
    Dockerize(dockerize::DockerizeArgs),
    /// Run a custom command inside the toolchain container
    Exec(exec::ExecArgs),
    /// Package and publish production images
    Package,
    /// Report the toolchain container state
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let context = ExecutionContext::new(cli.verbose, cli.dry_run);
    let deployer_context = DeployerExecutionContext {
        context,
        build: !cli.no_build,
    };
    let executer = Executer::new(context);

    let result = match cli.command {
        Commands::Deploy => deploy::run(&executer, &deployer_context),
        Commands::Dockerize(args) => dockerize::run(args, &executer, &deployer_context),
        Commands::Exec(args) => exec::run(args, &executer, &deployer_context),
        Commands::Package => package::run(&executer, &deployer_context),
        Commands::Status => status::run(&executer),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("deckhand: {err}");
            ExitCode::from(exit_code_to_u8(err.exit_code()))
        }
    }
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}

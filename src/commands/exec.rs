use clap::Args;

use deckhand::command::CommandBuilder;
use deckhand::context::DeployerExecutionContext;
use deckhand::deployer::Deployer;
use deckhand::executer::Executer;
use deckhand::Result;

#[derive(Args)]
pub struct ExecArgs {
    /// Command to run inside the toolchain container (e.g. `sh` for a shell)
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
    pub command: Vec<String>,
}

pub fn run(args: ExecArgs, executer: &Executer, context: &DeployerExecutionContext) -> Result<()> {
    let mut builder = CommandBuilder::shell(args.command.join(" "));

    Deployer::from_host(executer, context).run(&mut builder)
}

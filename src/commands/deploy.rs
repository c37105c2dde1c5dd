use deckhand::command::{CommandBuilder, PlaybookCommand};
use deckhand::context::DeployerExecutionContext;
use deckhand::deployer::Deployer;
use deckhand::executer::Executer;
use deckhand::Result;

pub fn run(executer: &Executer, context: &DeployerExecutionContext) -> Result<()> {
    let mut playbook = PlaybookCommand::new();
    playbook.add_playbook("deploy");
    let mut builder = CommandBuilder::from(playbook);

    Deployer::from_host(executer, context).run(&mut builder)
}

use deckhand::command::{CommandBuilder, PlaybookCommand};
use deckhand::context::DeployerExecutionContext;
use deckhand::deployer::Deployer;
use deckhand::executer::Executer;
use deckhand::Result;

pub fn run(executer: &Executer, context: &DeployerExecutionContext) -> Result<()> {
    let mut playbook = PlaybookCommand::new();
    playbook
        .add_playbook("build")
        .add_playbook("run")
        .add_playbook("package")
        .add_inventory("prod")
        .set_login_required(true);
    let mut builder = CommandBuilder::from(playbook);

    let deployer = Deployer::from_host(executer, context);
    deployer.run(&mut builder)?;
    deployer.push()?;

    Ok(())
}

use serde::Serialize;

use deckhand::deployer::{HostPlatform, TOOLCHAIN_CONTAINER, TOOLCHAIN_IMAGE};
use deckhand::docker::ContainerRuntime;
use deckhand::executer::Executer;
use deckhand::Result;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    container: &'static str,
    running: bool,
    image: &'static str,
    image_id: Option<String>,
    platform: &'static str,
}

pub fn run(executer: &Executer) -> Result<()> {
    let docker = ContainerRuntime::new(executer);

    let image_id = docker.image_id(TOOLCHAIN_IMAGE)?;
    let report = StatusReport {
        container: TOOLCHAIN_CONTAINER,
        running: docker.is_running(TOOLCHAIN_CONTAINER),
        image: TOOLCHAIN_IMAGE,
        image_id: (!image_id.is_empty()).then_some(image_id),
        platform: HostPlatform::detect().host_system(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

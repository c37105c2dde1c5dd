pub mod command;
pub mod context;
pub mod deployer;
pub mod docker;
pub mod error;
pub mod executer;
pub mod task;

pub use error::{Error, Result};

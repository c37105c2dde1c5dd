pub mod deploy;
pub mod dockerize;
pub mod exec;
pub mod package;
pub mod status;

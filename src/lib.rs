pub mod config;
pub mod errors;
pub mod foundry_config;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod package;
pub mod signals;
pub mod stages;

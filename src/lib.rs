pub mod analysis;
pub mod cloud;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod local;
pub mod logging;
pub mod operations;
pub mod prompts;
pub mod provider;
pub mod recovery;
pub mod settings;
pub mod types;

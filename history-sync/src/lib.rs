pub mod cli;
pub mod load_config;
pub mod provider;
pub mod server;
pub mod store;

pub use cli::{run, Cli, Commands};

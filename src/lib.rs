pub mod cli;
pub mod load_config;
pub mod medium;
pub mod storage;

pub use cli::{run, Cli, Commands};

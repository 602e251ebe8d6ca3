pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod games;
pub mod governors;
pub mod logging;
pub mod logs;
pub mod models;
pub mod packages;
pub mod paths;
pub mod settings;
pub mod shell;
pub mod state;
pub mod system;

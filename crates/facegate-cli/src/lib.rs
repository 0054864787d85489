pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod identities;
pub mod input;
pub mod output;

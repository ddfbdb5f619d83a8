pub mod cli;
pub mod commands;
pub mod config;
pub mod launcher;
pub mod orchestrator;
pub mod platform;
pub mod templates;
pub mod ui;

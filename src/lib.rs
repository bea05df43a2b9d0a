pub mod commands;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod package;
pub mod resolver;
pub mod runtime;

//! Core of the devbot relay: the slash-command grammar, configuration,
//! service contracts and the task scripts that drive them.

pub mod command;
pub mod config;
pub mod error;
pub mod markup;
pub mod orchestrator;
pub mod prompts;
pub mod services;

pub use command::{Command, CommandKind, Request, Route};
pub use config::Config;
pub use error::{DevbotError, Result};
pub use orchestrator::{execute, Artifact, TaskOutcome};
pub use services::Services;

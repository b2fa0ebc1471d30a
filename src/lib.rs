pub mod args;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod options;
pub mod process;

pub use args::{ExtraArgs, build_args};
pub use client::{Client, Digest, RecipeDiff, lint_recipes, run_recipe};
pub use config::ClientConfig;
pub use error::{Result, SdkError};
pub use options::{DevicePolicy, LintOptions, RunFlags, RunOptions};
pub use process::{Capture, CommandResult};

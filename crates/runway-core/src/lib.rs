//! Core types and configuration for runway.
//!
//! This crate defines the `runway.toml` schema ([`RunwayConfig`]), the task
//! definition model ([`TaskDefinition`], [`RuntimeKind`], [`BuildRequest`]),
//! the synthesized [`BuildRecipe`], the [`FrameworkRegistry`], and shared
//! error types.

pub mod config;
pub mod error;
pub mod framework;
pub mod recipe;
pub mod task;

pub use config::{ApiConfig, BuildConfig, RunwayConfig};
pub use error::{Error, Result};
pub use framework::{Django, Framework, FrameworkAdapter, FrameworkRegistry};
pub use recipe::{Base, BuildRecipe, InjectedFiles, Instruction};
pub use task::{BuildRequest, ManualDefinition, Options, RuntimeKind, TaskDefinition};

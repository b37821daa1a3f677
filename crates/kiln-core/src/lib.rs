//! Core orchestration engine for Kiln package recipes.
//!
//! This crate ties together recipe parsing, the store, and tool runners into
//! the `Engine`, which drives the fixed lifecycle
//! `configure → acquire source → build → package → describe` for one package
//! and records the result. It also provides the artifact packager, the
//! consumer-metadata consistency check, store locking, and state-machine
//! lifecycle validation.

pub mod concurrency;
pub mod engine;
pub mod lifecycle;
pub mod packager;
pub mod pipeline;

pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use engine::{load_recipe, CreateOptions, CreateResult, Engine, ExportResult, PackagePlan};
pub use lifecycle::validate_transition;
pub use packager::{check_consumer_libs, package_artifacts, PackageReport, RuleOutcome};
pub use pipeline::Pipeline;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("recipe error: {0}")]
    Recipe(#[from] kiln_schema::RecipeError),
    #[error("settings error: {0}")]
    Settings(#[from] kiln_schema::SettingsError),
    #[error("lock error: {0}")]
    Lock(#[from] kiln_schema::LockError),
    #[error("store error: {0}")]
    Store(#[from] kiln_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] kiln_runtime::RuntimeError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("ambiguous package id prefix '{prefix}': matches {count} packages")]
    AmbiguousPackage { prefix: String, count: usize },
    #[error("artifact rule '{pattern}' (src '{src}') matched no files")]
    EmptyArtifactRule { pattern: String, src: String },
    #[error("consumer lib '{lib}' has no matching link artifact in the package")]
    ConsumerMismatch { lib: String },
    #[error("interrupted by signal")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

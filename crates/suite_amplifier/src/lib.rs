#![forbid(unsafe_code)]

pub mod checker;
pub mod cli;
pub mod config;
pub mod dialect;
pub mod emission;
pub mod error;
pub mod failer;
pub mod java_parser;
pub mod manifest;
pub mod pipeline;
pub mod relink;
pub mod runmeta;
pub mod scheduler;
pub mod source_model;
pub mod util;

pub use cli::run_from_env;
pub use dialect::Dialect;
pub use error::{AmplifierError, Result};
pub use failer::FailureInjector;
pub use pipeline::{DuplicationPipeline, TestProcessor, drive};

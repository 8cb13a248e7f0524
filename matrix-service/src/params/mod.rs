// Parameter Space Engine Module
// Composable parameter-generating nodes that enumerate the job matrix

pub mod basic;
pub mod factory;
pub mod meta;
pub mod registry;
pub mod source;

pub use basic::{
    ConstSource, CounterSource, LookupSource, RequirementSource, RngSource, ValuesSource,
};
pub use factory::{BasicParameterFactory, ModularParameterFactory};
pub use meta::{CrossSource, RepeatSource, ZipLongSource};
pub use registry::{SourceConstructor, SourceRegistry};
pub use source::{
    JobRow, ParameterMetadata, ParameterSource, ReqKind, Requirement, ResyncInterval,
    ResyncResult, ResyncState,
};

use crate::config::ConfigError;
use crate::expression::EvalError;
use thiserror::Error;

/// Errors raised while building or evaluating the parameter tree
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Expression(#[from] EvalError),

    #[error("unknown parameter source {name:?} (available: {available})")]
    UnknownSource { name: String, available: String },

    #[error("parameter source {name:?}: {message}")]
    CreateFailed { name: String, message: String },

    #[error("{kind} requires bounded children")]
    Unbounded { kind: &'static str },

    #[error("row {pnum} is out of range (size {size})")]
    OutOfRange { pnum: u64, size: u64 },
}

// Matrix Service Library
// Core engine for grid workload parameter-matrix enumeration and
// resource brokering

pub mod broker;
pub mod config;
pub mod expression;
pub mod params;

// Re-export configuration types
pub use config::{
    ChangePolicy, ConfigError, ConfigView, MemoryConfig, ParamConfig, ParamDict, ParamValue,
};

// Re-export expression types
pub use expression::{EvalError, Evaluator, ExprParser, Value};

// Re-export parameter engine types
pub use params::{
    BasicParameterFactory, ConstSource, CounterSource, CrossSource, JobRow, LookupSource,
    ModularParameterFactory, ParameterError, ParameterMetadata, ParameterSource, RepeatSource,
    ReqKind, Requirement, RequirementSource, ResyncInterval, ResyncResult, RngSource,
    SourceRegistry, ValuesSource, ZipLongSource,
};

// Re-export broker types
pub use broker::{
    discover, Broker, BrokerError, CoverageBroker, DiscoveryError, FilterBroker, RandomBroker,
    ResourcePool, ResourceProps, SimpleBroker, StorageBroker, UserBroker,
};

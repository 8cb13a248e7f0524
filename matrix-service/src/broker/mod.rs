// Resource Broker Module
// Admission and selection policies that narrow a discovered resource
// set down to the candidates usable for one job's requirements

pub mod basic;
pub mod filter;

pub use basic::{
    conflict_tolerant_cmp, CoverageBroker, FilterBroker, RandomBroker, SimpleBroker,
    StorageBroker, UserBroker,
};
pub use filter::filter_black_white;

use crate::params::source::{ReqKind, Requirement};

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Capacity properties of one discovered resource item.
pub type ResourceProps = BTreeMap<ReqKind, u64>;

/// Discovered resource set: item name to its properties. Brokers never
/// mutate the pool, only filter, reorder or replicate the name list.
pub type ResourcePool = BTreeMap<String, ResourceProps>;

/// Injected discovery callback; may perform network or subprocess
/// calls and therefore may be slow or fail.
pub type DiscoverFn = dyn Fn() -> Result<ResourcePool, DiscoveryError> + Send + Sync;

/// Recoverable discovery failure, distinct from configuration errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A single admission/selection policy.
///
/// `None` means "unconstrained, accept the default destination"; an
/// empty list means no admissible item exists right now.
pub trait Broker: std::fmt::Debug + Send + Sync {
    fn select(&self, requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>>;
}

/// Run a discovery callback. A failure is logged and yields the empty
/// pool; previously computed rows stay untouched and the caller simply
/// retries on the next cycle.
pub fn discover(label: &str, callback: &DiscoverFn) -> ResourcePool {
    match callback() {
        Ok(pool) => {
            debug!(label, items = pool.len(), "resource discovery finished");
            pool
        }
        Err(err) => {
            warn!(label, error = %err, "resource discovery failed, retrying next cycle");
            ResourcePool::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_failure_yields_empty_pool() {
        let pool = discover("queues", &|| {
            Err(DiscoveryError::Failed("timeout".to_string()))
        });
        assert!(pool.is_empty());
    }

    #[test]
    fn test_discovery_passthrough() {
        let pool = discover("queues", &|| {
            let mut pool = ResourcePool::new();
            pool.insert("long".to_string(), ResourceProps::new());
            Ok(pool)
        });
        assert_eq!(pool.len(), 1);
    }
}

// Broker Variants
// Random, user list, black/white filter, round-robin coverage,
// capacity admission/ordering and storage augmentation

use crate::broker::filter::filter_black_white;
use crate::broker::{Broker, BrokerError, ResourcePool, ResourceProps};
use crate::config::ConfigView;
use crate::params::source::{ReqKind, Requirement};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::debug;

/// Applies no policy: the full discovered set, unfiltered.
#[derive(Debug, Default)]
pub struct RandomBroker;

impl RandomBroker {
    pub fn new() -> Self {
        Self
    }
}

impl Broker for RandomBroker {
    fn select(&self, _requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>> {
        Some(pool.keys().cloned().collect())
    }
}

/// Ignores discovery; returns the fixed configured item list, or
/// `None` when nothing was configured.
#[derive(Debug)]
pub struct UserBroker {
    items: Option<Vec<String>>,
}

impl UserBroker {
    pub fn new(items: Option<Vec<String>>) -> Self {
        Self { items }
    }

    pub fn from_config(view: &dyn ConfigView, option: &str) -> Result<Self, BrokerError> {
        let items = view.get_list(option, Some(""))?;
        Ok(Self::new(Some(items).filter(|i| !i.is_empty())))
    }
}

impl Broker for UserBroker {
    fn select(&self, _requirements: &[Requirement], _pool: &ResourcePool) -> Option<Vec<String>> {
        self.items.clone()
    }
}

/// Narrows the discovered set with the configured black/white list.
///
/// With nothing discovered, the white patterns themselves become the
/// candidate list (there is nothing to filter, but the operator named
/// usable items); a black-only filter then admits nothing, and only a
/// missing filter is unconstrained.
#[derive(Debug)]
pub struct FilterBroker {
    patterns: Option<Vec<String>>,
}

impl FilterBroker {
    pub fn new(patterns: Option<Vec<String>>) -> Self {
        Self { patterns }
    }

    pub fn from_config(view: &dyn ConfigView, option: &str) -> Result<Self, BrokerError> {
        let patterns = view.get_list(option, Some(""))?;
        Ok(Self::new(Some(patterns).filter(|p| !p.is_empty())))
    }

    /// Apply the pattern list to an already-narrowed candidate list.
    pub fn apply(&self, items: &[String]) -> Vec<String> {
        match &self.patterns {
            Some(patterns) => filter_black_white(patterns, items),
            None => items.to_vec(),
        }
    }

    fn narrowed(&self, pool: &ResourcePool) -> Option<Vec<String>> {
        let names: Vec<String> = pool.keys().cloned().collect();
        if !names.is_empty() {
            return Some(self.apply(&names));
        }
        let patterns = self.patterns.as_ref()?;
        Some(
            patterns
                .iter()
                .filter(|p| !p.starts_with('-'))
                .cloned()
                .collect(),
        )
    }
}

impl Broker for FilterBroker {
    fn select(&self, _requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>> {
        self.narrowed(pool)
    }
}

/// Filter narrowing plus a round-robin single pick that persists
/// across calls, spreading submissions over the candidate list.
#[derive(Debug)]
pub struct CoverageBroker {
    filter: FilterBroker,
    cursor: Mutex<usize>,
}

impl CoverageBroker {
    pub fn new(patterns: Option<Vec<String>>) -> Self {
        Self {
            filter: FilterBroker::new(patterns),
            cursor: Mutex::new(0),
        }
    }
}

impl Broker for CoverageBroker {
    fn select(&self, requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>> {
        let candidates = self.filter.select(requirements, pool)?;
        if candidates.is_empty() {
            return Some(candidates);
        }
        let mut cursor = self.cursor.lock().unwrap();
        let picked = candidates[*cursor % candidates.len()].clone();
        *cursor += 1;
        Some(vec![picked])
    }
}

/// Capacity admission and ordering.
///
/// Admission keeps items whose every present property strictly exceeds
/// the requirement value; a missing property imposes no constraint.
/// Survivors are sorted ascending so the smallest adequate item comes
/// first, then narrowed by the configured filter. With nothing
/// discovered at all, falls back to the filter's candidate list.
#[derive(Debug)]
pub struct SimpleBroker {
    filter: FilterBroker,
}

impl SimpleBroker {
    pub fn new(patterns: Option<Vec<String>>) -> Self {
        Self {
            filter: FilterBroker::new(patterns),
        }
    }

    fn admits(props: &ResourceProps, requirements: &[Requirement]) -> bool {
        for requirement in requirements {
            let Some(needed) = requirement.amount() else {
                continue;
            };
            if let Some(&available) = props.get(&requirement.kind()) {
                if needed >= available {
                    return false;
                }
            }
        }
        true
    }
}

impl Broker for SimpleBroker {
    fn select(&self, requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>> {
        if pool.is_empty() {
            return self.filter.select(requirements, pool);
        }
        let admitted = pool
            .iter()
            .filter(|(_, props)| Self::admits(props, requirements));
        // Stable insertion ordering; the comparator is not a total
        // order, so std sorting cannot be trusted with it.
        let mut ordered: Vec<(&String, &ResourceProps)> = Vec::new();
        for entry in admitted {
            let pos = ordered
                .iter()
                .position(|(_, other)| conflict_tolerant_cmp(entry.1, other) == Ordering::Less)
                .unwrap_or(ordered.len());
            ordered.insert(pos, entry);
        }
        let names: Vec<String> = ordered.into_iter().map(|(name, _)| name.clone()).collect();
        debug!(admitted = names.len(), pool = pool.len(), "capacity admission");
        Some(self.filter.apply(&names))
    }
}

/// Multi-key property comparison that collapses to `Equal` when the
/// per-key comparisons disagree in sign.
///
/// An item that declares a property sorts before one that lacks it; a
/// known capacity beats an unknown one. Deliberately not a total order
/// (it is a heuristic tie-break); kept as a free function so a
/// stricter ordering can be substituted.
pub fn conflict_tolerant_cmp(a: &ResourceProps, b: &ResourceProps) -> Ordering {
    let keys: BTreeSet<ReqKind> = a.keys().chain(b.keys()).copied().collect();
    let mut acc = Ordering::Equal;
    for key in keys {
        let current = match (a.get(&key), b.get(&key)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if current == Ordering::Equal {
            continue;
        }
        if acc != Ordering::Equal && acc != current {
            return Ordering::Equal;
        }
        acc = current;
    }
    acc
}

/// Wraps another broker and pulls in items that can access the storage
/// elements a job requires, via a static storage-element to item table.
#[derive(Debug)]
pub struct StorageBroker {
    inner: Box<dyn Broker>,
    table: BTreeMap<String, Vec<String>>,
}

impl StorageBroker {
    pub fn new(inner: Box<dyn Broker>, table: BTreeMap<String, Vec<String>>) -> Self {
        Self { inner, table }
    }
}

impl Broker for StorageBroker {
    fn select(&self, requirements: &[Requirement], pool: &ResourcePool) -> Option<Vec<String>> {
        let base = self.inner.select(requirements, pool);
        let mut extra = Vec::new();
        for requirement in requirements {
            if let Requirement::Storage(elements) = requirement {
                for element in elements {
                    if let Some(items) = self.table.get(element) {
                        extra.extend(items.iter().cloned());
                    }
                }
            }
        }
        if extra.is_empty() {
            return base;
        }
        let mut result = base.unwrap_or_default();
        for item in extra {
            if !result.contains(&item) {
                result.push(item);
            }
        }
        Some(result)
    }
}

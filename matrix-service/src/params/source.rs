// Parameter Source Tree
// Node contract for the job matrix: per-row evaluation, bounds and
// staleness detection (resync)

use crate::params::ParameterError;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Key of a parameter variable; untracked keys are excluded from the
/// change-detection hash view of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub key: String,
    pub untracked: bool,
}

impl ParameterMetadata {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            untracked: false,
        }
    }

    pub fn untracked(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            untracked: true,
        }
    }
}

impl fmt::Display for ParameterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.untracked {
            write!(f, "!{}", self.key)
        } else {
            write!(f, "{}", self.key)
        }
    }
}

/// Requirement kinds understood by the broker chain
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ReqKind {
    WallTime,
    CpuTime,
    Memory,
    Cpus,
    Queues,
    Sites,
    Storage,
}

/// One resource requirement of a job row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    WallTime(u64),
    CpuTime(u64),
    Memory(u64),
    Cpus(u64),
    Queues(Vec<String>),
    Sites(Vec<String>),
    Storage(Vec<String>),
}

impl Requirement {
    pub fn kind(&self) -> ReqKind {
        match self {
            Requirement::WallTime(_) => ReqKind::WallTime,
            Requirement::CpuTime(_) => ReqKind::CpuTime,
            Requirement::Memory(_) => ReqKind::Memory,
            Requirement::Cpus(_) => ReqKind::Cpus,
            Requirement::Queues(_) => ReqKind::Queues,
            Requirement::Sites(_) => ReqKind::Sites,
            Requirement::Storage(_) => ReqKind::Storage,
        }
    }

    /// Numeric capacity value, for kinds that carry one.
    pub fn amount(&self) -> Option<u64> {
        match self {
            Requirement::WallTime(v)
            | Requirement::CpuTime(v)
            | Requirement::Memory(v)
            | Requirement::Cpus(v) => Some(*v),
            _ => None,
        }
    }
}

/// One materialized row of the job matrix.
///
/// Rows start active; sources may only clear the flag, so a composite
/// row is active exactly when every child left it active.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub active: bool,
    values: Vec<(ParameterMetadata, String)>,
    requirements: Vec<Requirement>,
}

impl JobRow {
    pub fn new() -> Self {
        Self {
            active: true,
            values: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Set a variable, replacing an earlier value for the same key
    /// while keeping first-insertion order.
    pub fn set(&mut self, meta: ParameterMetadata, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.values.iter_mut().find(|(m, _)| m.key == meta.key) {
            entry.1 = value;
            return;
        }
        self.values.push((meta, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(m, _)| m.key == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    pub fn values(&self) -> &[(ParameterMetadata, String)] {
        &self.values
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Hash-contributing key/value pairs: tracked variables only, in
    /// insertion order.
    pub fn hash_values(&self) -> Vec<(&str, &str)> {
        self.values
            .iter()
            .filter(|(m, _)| !m.untracked)
            .map(|(m, v)| (m.key.as_str(), v.as_str()))
            .collect()
    }
}

impl Default for JobRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Which rows must be redone or dropped after a data change, and
/// whether the matrix length itself moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncResult {
    pub added: BTreeSet<u64>,
    pub disabled: BTreeSet<u64>,
    pub size_changed: bool,
}

impl ResyncResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.disabled.is_empty() && !self.size_changed
    }
}

/// Resync polling behaviour of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncInterval {
    /// Every `resync()` call recomputes (the default).
    Always,
    /// Never recompute automatically.
    Never,
    /// Recompute when at least this much time passed.
    Every(Duration),
}

/// In-memory resync bookkeeping shared by all sources.
///
/// `enabled` never performs I/O; actual data re-scanning is up to the
/// concrete source.
#[derive(Debug)]
pub struct ResyncState {
    interval: ResyncInterval,
    last: Option<Instant>,
    forced: Option<ResyncResult>,
}

impl ResyncState {
    pub fn new() -> Self {
        Self {
            interval: ResyncInterval::Always,
            last: None,
            forced: None,
        }
    }

    pub fn setup(
        &mut self,
        interval: Option<ResyncInterval>,
        force: bool,
        info: Option<ResyncResult>,
    ) {
        self.forced = info;
        if let Some(interval) = interval {
            self.interval = interval;
            self.last = Some(Instant::now());
        }
        if force {
            // Forget the last timestamp so the next resync recomputes.
            self.last = None;
        }
    }

    pub fn enabled(&self) -> bool {
        match (self.last, self.interval) {
            (None, _) => true,
            (Some(_), ResyncInterval::Always) => true,
            (Some(_), ResyncInterval::Never) => false,
            (Some(last), ResyncInterval::Every(period)) => last.elapsed() > period,
        }
    }

    pub fn finished(&mut self) {
        self.last = Some(Instant::now());
    }

    pub fn forced_info(&self) -> Option<&ResyncResult> {
        self.forced.as_ref()
    }
}

impl Default for ResyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// A node of the parameter tree.
///
/// Children are exclusively owned (`Box`), the tree has no cycles.
/// Row evaluation is read-only and deterministic for a fixed
/// configuration; resync takes `&mut self` and must be serialized by
/// the caller.
pub trait ParameterSource: fmt::Debug + Send + Sync {
    /// Upper bound of the row index space; `None` imposes no bound.
    fn max_parameters(&self) -> Option<u64> {
        None
    }

    /// Append the variable keys this source contributes.
    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>);

    /// Materialize this source's contribution to row `pnum`.
    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError>;

    fn resync_state(&self) -> &ResyncState;

    fn resync_state_mut(&mut self) -> &mut ResyncState;

    fn resync_setup(
        &mut self,
        interval: Option<ResyncInterval>,
        force: bool,
        info: Option<ResyncResult>,
    ) {
        self.resync_state_mut().setup(interval, force, info);
    }

    /// Cheap in-memory check whether `resync()` would recompute.
    fn resync_enabled(&self) -> bool {
        self.resync_state().enabled()
    }

    /// Detect stale rows. Gated by the polling interval; a caller
    /// override installed via `resync_setup` wins over recomputation.
    fn resync(&mut self) -> Result<ResyncResult, ParameterError> {
        if !self.resync_enabled() {
            return Ok(ResyncResult::default());
        }
        let result = match self.resync_state().forced_info() {
            Some(info) => info.clone(),
            None => self.resync_create()?,
        };
        self.resync_state_mut().finished();
        Ok(result)
    }

    /// Recompute the resync result; leaves report no changes.
    fn resync_create(&mut self) -> Result<ResyncResult, ParameterError> {
        Ok(ResyncResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_overwrite_keeps_order() {
        let mut row = JobRow::new();
        row.set(ParameterMetadata::new("A"), "1");
        row.set(ParameterMetadata::new("B"), "2");
        row.set(ParameterMetadata::new("A"), "3");
        assert_eq!(
            row.hash_values(),
            vec![("A", "3"), ("B", "2")]
        );
    }

    #[test]
    fn test_untracked_excluded_from_hash() {
        let mut row = JobRow::new();
        row.set(ParameterMetadata::new("A"), "1");
        row.set(ParameterMetadata::untracked("SEED_0"), "99");
        assert_eq!(row.hash_values(), vec![("A", "1")]);
        assert_eq!(row.get("SEED_0"), Some("99"));
    }

    #[test]
    fn test_resync_gating() {
        let mut state = ResyncState::new();
        assert!(state.enabled());
        state.setup(Some(ResyncInterval::Every(Duration::from_secs(3600))), false, None);
        assert!(!state.enabled());
        state.setup(None, true, None);
        assert!(state.enabled());
        state.finished();
        assert!(!state.enabled());
    }

    #[test]
    fn test_resync_never() {
        let mut state = ResyncState::new();
        state.setup(Some(ResyncInterval::Never), false, None);
        assert!(!state.enabled());
        // Forcing overrides even a disabled interval.
        state.setup(None, true, None);
        assert!(state.enabled());
    }
}

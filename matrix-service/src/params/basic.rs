// Leaf Parameter Sources
// Constant, counter/seed, per-job RNG, value list, table lookup and
// requirement injection

use crate::config::ParamDict;
use crate::params::source::{
    JobRow, ParameterMetadata, ParameterSource, Requirement, ResyncState,
};
use crate::params::ParameterError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One key, one fixed value for every row; imposes no bound.
#[derive(Debug)]
pub struct ConstSource {
    key: ParameterMetadata,
    value: String,
    resync: ResyncState,
}

impl ConstSource {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: ParameterMetadata::new(key),
            value: value.into(),
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for ConstSource {
    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        keys.push(self.key.clone());
    }

    fn fill_parameter_info(&self, _pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        row.set(self.key.clone(), self.value.clone());
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

/// Seed counter: emits `base + pnum` under an untracked key.
///
/// The base is chosen once (configured or generated and persisted) so
/// restarted runs reproduce the identical per-job values.
#[derive(Debug)]
pub struct CounterSource {
    key: ParameterMetadata,
    base: i64,
    resync: ResyncState,
}

impl CounterSource {
    pub fn new(key: impl Into<String>, base: i64) -> Self {
        Self {
            key: ParameterMetadata::untracked(key),
            base,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for CounterSource {
    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        keys.push(self.key.clone());
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        row.set(self.key.clone(), (self.base + pnum as i64).to_string());
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

/// Stable per-job pseudo-random draw.
///
/// The value is a pure function of `pnum` and the process-local seed:
/// same row, same seed, same draw across runs.
#[derive(Debug)]
pub struct RngSource {
    key: ParameterMetadata,
    seed: u64,
    low: u64,
    high: u64,
    resync: ResyncState,
}

impl RngSource {
    pub fn new(key: impl Into<String>, seed: u64) -> Self {
        Self {
            key: ParameterMetadata::untracked(key),
            seed,
            low: 1_000_000,
            high: 10_000_000,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for RngSource {
    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        keys.push(self.key.clone());
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ pnum.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let draw: u64 = rng.gen_range(self.low..self.high);
        row.set(self.key.clone(), draw.to_string());
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

/// One key over a finite value list; the only intrinsically bounded leaf.
#[derive(Debug)]
pub struct ValuesSource {
    key: ParameterMetadata,
    values: Vec<String>,
    resync: ResyncState,
}

impl ValuesSource {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: ParameterMetadata::new(key),
            values,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for ValuesSource {
    fn max_parameters(&self) -> Option<u64> {
        Some(self.values.len() as u64)
    }

    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        keys.push(self.key.clone());
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        let value = self
            .values
            .get(pnum as usize)
            .ok_or(ParameterError::OutOfRange {
                pnum,
                size: self.values.len() as u64,
            })?;
        row.set(self.key.clone(), value.clone());
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

/// Value looked up from a table keyed by another variable already
/// filled into the row.
///
/// Falls back to the table default; a row with no match and no default
/// is deactivated instead of erroring, keeping the index space stable.
#[derive(Debug)]
pub struct LookupSource {
    key: ParameterMetadata,
    lookup_key: String,
    table: ParamDict,
    resync: ResyncState,
}

impl LookupSource {
    pub fn new(key: impl Into<String>, lookup_key: impl Into<String>, table: ParamDict) -> Self {
        Self {
            key: ParameterMetadata::new(key),
            lookup_key: lookup_key.into(),
            table,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for LookupSource {
    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        keys.push(self.key.clone());
    }

    fn fill_parameter_info(&self, _pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        let probe = row.get(&self.lookup_key).unwrap_or("");
        let values = match self.table.get(probe) {
            Some(values) => values,
            None => self.table.default.as_slice(),
        };
        if values.is_empty() {
            row.active = false;
            return Ok(());
        }
        row.set(self.key.clone(), values.join(" "));
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

/// Contributes no keys; appends task-resolved requirement tuples to
/// every row.
#[derive(Debug)]
pub struct RequirementSource {
    requirements: Vec<Requirement>,
    resync: ResyncState,
}

impl RequirementSource {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self {
            requirements,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for RequirementSource {
    fn fill_parameter_keys(&self, _keys: &mut Vec<ParameterMetadata>) {}

    fn fill_parameter_info(&self, _pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        for requirement in &self.requirements {
            row.require(requirement.clone());
        }
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_for(source: &dyn ParameterSource, pnum: u64) -> JobRow {
        let mut row = JobRow::new();
        source.fill_parameter_info(pnum, &mut row).unwrap();
        row
    }

    #[test]
    fn test_const_every_row() {
        let source = ConstSource::new("DATASET", "minbias");
        assert_eq!(source.max_parameters(), None);
        assert_eq!(row_for(&source, 0).get("DATASET"), Some("minbias"));
        assert_eq!(row_for(&source, 999).get("DATASET"), Some("minbias"));
    }

    #[test]
    fn test_counter_offsets_by_row() {
        let source = CounterSource::new("SEED_0", 40);
        assert_eq!(row_for(&source, 0).get("SEED_0"), Some("40"));
        assert_eq!(row_for(&source, 7).get("SEED_0"), Some("47"));
        assert!(row_for(&source, 0).hash_values().is_empty());
    }

    #[test]
    fn test_rng_deterministic_per_row() {
        let source = RngSource::new("JOB_RANDOM", 1234);
        let first = row_for(&source, 5).get("JOB_RANDOM").unwrap().to_string();
        let second = row_for(&source, 5).get("JOB_RANDOM").unwrap().to_string();
        assert_eq!(first, second);
        let other = row_for(&source, 6).get("JOB_RANDOM").unwrap().to_string();
        assert_ne!(first, other);
    }

    #[test]
    fn test_values_bounds() {
        let source = ValuesSource::new("X", vec!["a".into(), "b".into()]);
        assert_eq!(source.max_parameters(), Some(2));
        assert_eq!(row_for(&source, 1).get("X"), Some("b"));
        let mut row = JobRow::new();
        assert!(matches!(
            source.fill_parameter_info(2, &mut row),
            Err(ParameterError::OutOfRange { pnum: 2, size: 2 })
        ));
    }

    #[test]
    fn test_lookup_with_default_and_deactivation() {
        let mut table = ParamDict::default();
        table.entries.push(("a".into(), vec!["1".into()]));
        let source = LookupSource::new("Y", "X", table.clone());

        let mut row = JobRow::new();
        row.set(ParameterMetadata::new("X"), "a");
        source.fill_parameter_info(0, &mut row).unwrap();
        assert_eq!(row.get("Y"), Some("1"));
        assert!(row.active);

        // No match, no default: the row is deactivated, not an error.
        let mut row = JobRow::new();
        row.set(ParameterMetadata::new("X"), "z");
        source.fill_parameter_info(0, &mut row).unwrap();
        assert!(!row.active);

        table.default = vec!["fallback".into()];
        let source = LookupSource::new("Y", "X", table);
        let mut row = JobRow::new();
        row.set(ParameterMetadata::new("X"), "z");
        source.fill_parameter_info(0, &mut row).unwrap();
        assert_eq!(row.get("Y"), Some("fallback"));
        assert!(row.active);
    }

    #[test]
    fn test_requirement_injection() {
        let source = RequirementSource::new(vec![
            Requirement::WallTime(3600),
            Requirement::Memory(2048),
        ]);
        let row = row_for(&source, 3);
        assert!(row.hash_values().is_empty());
        assert_eq!(row.requirements().len(), 2);
        assert_eq!(row.requirements()[1], Requirement::Memory(2048));
    }
}

// Composite Parameter Sources
// Parallel zip, cartesian cross and replication combinators, with
// resync index remapping into the composite row space

use crate::params::source::{
    JobRow, ParameterMetadata, ParameterSource, ResyncResult, ResyncState,
};
use crate::params::ParameterError;

use std::collections::BTreeSet;
use tracing::debug;

/// Combines children in parallel: row i is the union of every child's
/// row i.
///
/// Children shorter than the longest bound repeat their last produced
/// row past their own length (hold-last). A row is active only when
/// every child left it active.
#[derive(Debug)]
pub struct ZipLongSource {
    children: Vec<Box<dyn ParameterSource>>,
    resync: ResyncState,
}

impl ZipLongSource {
    pub fn new(children: Vec<Box<dyn ParameterSource>>) -> Self {
        Self {
            children,
            resync: ResyncState::new(),
        }
    }
}

impl ParameterSource for ZipLongSource {
    fn max_parameters(&self) -> Option<u64> {
        self.children
            .iter()
            .filter_map(|child| child.max_parameters())
            .max()
    }

    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        for child in &self.children {
            child.fill_parameter_keys(keys);
        }
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        for child in &self.children {
            let child_pnum = match child.max_parameters() {
                Some(0) => continue,
                Some(bound) if pnum >= bound => bound - 1,
                _ => pnum,
            };
            child.fill_parameter_info(child_pnum, row)?;
        }
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }

    fn resync_create(&mut self) -> Result<ResyncResult, ParameterError> {
        let total = self.max_parameters();
        let bounds: Vec<Option<u64>> = self.children.iter().map(|c| c.max_parameters()).collect();
        let mut result = ResyncResult::default();
        for (child, bound) in self.children.iter_mut().zip(bounds) {
            let child_result = child.resync()?;
            result.size_changed |= child_result.size_changed;
            remap_zip(&child_result.added, bound, total, &mut result.added);
            remap_zip(&child_result.disabled, bound, total, &mut result.disabled);
        }
        if !result.is_empty() {
            debug!(added = result.added.len(), disabled = result.disabled.len(), "zip resync");
        }
        Ok(result)
    }
}

/// A change in a child row lands on the same composite row; a change
/// in the child's final row also lands on every padded row past the
/// child's bound.
fn remap_zip(rows: &BTreeSet<u64>, bound: Option<u64>, total: Option<u64>, out: &mut BTreeSet<u64>) {
    for &row in rows {
        out.insert(row);
        if let (Some(bound), Some(total)) = (bound, total) {
            if bound > 0 && row == bound - 1 {
                out.extend(bound..total);
            }
        }
    }
}

/// Cartesian product of children via mixed-radix index decomposition;
/// child 0 varies fastest. Every child must be bounded.
#[derive(Debug)]
pub struct CrossSource {
    children: Vec<Box<dyn ParameterSource>>,
    resync: ResyncState,
}

impl CrossSource {
    pub fn new(children: Vec<Box<dyn ParameterSource>>) -> Result<Self, ParameterError> {
        if children.iter().any(|child| child.max_parameters().is_none()) {
            return Err(ParameterError::Unbounded { kind: "cross" });
        }
        Ok(Self {
            children,
            resync: ResyncState::new(),
        })
    }

    fn sizes(&self) -> Result<Vec<u64>, ParameterError> {
        self.children
            .iter()
            .map(|child| {
                child
                    .max_parameters()
                    .ok_or(ParameterError::Unbounded { kind: "cross" })
            })
            .collect()
    }
}

impl ParameterSource for CrossSource {
    fn max_parameters(&self) -> Option<u64> {
        self.children
            .iter()
            .map(|child| child.max_parameters())
            .try_fold(1, |acc, bound| bound.map(|b| acc * b))
    }

    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        for child in &self.children {
            child.fill_parameter_keys(keys);
        }
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        let mut stride = 1;
        for child in &self.children {
            let size = child
                .max_parameters()
                .ok_or(ParameterError::Unbounded { kind: "cross" })?;
            child.fill_parameter_info((pnum / stride) % size, row)?;
            stride *= size;
        }
        Ok(())
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }

    fn resync_create(&mut self) -> Result<ResyncResult, ParameterError> {
        let sizes = self.sizes()?;
        let total: u64 = sizes.iter().product();
        let mut result = ResyncResult::default();
        let mut stride = 1;
        for (child, &size) in self.children.iter_mut().zip(&sizes) {
            let child_result = child.resync()?;
            result.size_changed |= child_result.size_changed;
            remap_cross(&child_result.added, stride, size, total, &mut result.added);
            remap_cross(&child_result.disabled, stride, size, total, &mut result.disabled);
            stride *= size;
        }
        Ok(result)
    }
}

/// A change in child row r lands on every composite row whose digit
/// for that child equals r.
fn remap_cross(rows: &BTreeSet<u64>, stride: u64, size: u64, total: u64, out: &mut BTreeSet<u64>) {
    let period = stride * size;
    if period == 0 {
        return;
    }
    for &row in rows {
        for outer in 0..total / period {
            for inner in 0..stride {
                out.insert(outer * period + row * stride + inner);
            }
        }
    }
}

/// Replicates a bounded child's entire space `times` times: row i maps
/// to child row i mod child-size.
#[derive(Debug)]
pub struct RepeatSource {
    child: Box<dyn ParameterSource>,
    times: u64,
    resync: ResyncState,
}

impl RepeatSource {
    pub fn new(child: Box<dyn ParameterSource>, times: u64) -> Result<Self, ParameterError> {
        if child.max_parameters().is_none() {
            return Err(ParameterError::Unbounded { kind: "repeat" });
        }
        Ok(Self {
            child,
            times,
            resync: ResyncState::new(),
        })
    }

    fn child_size(&self) -> Result<u64, ParameterError> {
        self.child
            .max_parameters()
            .ok_or(ParameterError::Unbounded { kind: "repeat" })
    }
}

impl ParameterSource for RepeatSource {
    fn max_parameters(&self) -> Option<u64> {
        self.child.max_parameters().map(|size| size * self.times)
    }

    fn fill_parameter_keys(&self, keys: &mut Vec<ParameterMetadata>) {
        self.child.fill_parameter_keys(keys);
    }

    fn fill_parameter_info(&self, pnum: u64, row: &mut JobRow) -> Result<(), ParameterError> {
        let size = self.child_size()?;
        if size == 0 {
            return Err(ParameterError::OutOfRange { pnum, size: 0 });
        }
        self.child.fill_parameter_info(pnum % size, row)
    }

    fn resync_state(&self) -> &ResyncState {
        &self.resync
    }

    fn resync_state_mut(&mut self) -> &mut ResyncState {
        &mut self.resync
    }

    fn resync_create(&mut self) -> Result<ResyncResult, ParameterError> {
        let size = self.child_size()?;
        let times = self.times;
        let child_result = self.child.resync()?;
        let mut result = ResyncResult {
            size_changed: child_result.size_changed,
            ..Default::default()
        };
        for &row in &child_result.added {
            result.added.extend((0..times).map(|k| row + k * size));
        }
        for &row in &child_result.disabled {
            result.disabled.extend((0..times).map(|k| row + k * size));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::basic::ValuesSource;
    use crate::params::source::ResyncInterval;
    use std::collections::BTreeSet;

    fn values(key: &str, items: &[&str]) -> Box<dyn ParameterSource> {
        Box::new(ValuesSource::new(
            key,
            items.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Bounded source that reports a canned resync result.
    #[derive(Debug)]
    struct StubSource {
        size: u64,
        report: ResyncResult,
        resync: ResyncState,
    }

    impl StubSource {
        fn new(size: u64, report: ResyncResult) -> Self {
            Self {
                size,
                report,
                resync: ResyncState::new(),
            }
        }
    }

    impl ParameterSource for StubSource {
        fn max_parameters(&self) -> Option<u64> {
            Some(self.size)
        }

        fn fill_parameter_keys(&self, _keys: &mut Vec<ParameterMetadata>) {}

        fn fill_parameter_info(&self, _pnum: u64, _row: &mut JobRow) -> Result<(), ParameterError> {
            Ok(())
        }

        fn resync_state(&self) -> &ResyncState {
            &self.resync
        }

        fn resync_state_mut(&mut self) -> &mut ResyncState {
            &mut self.resync
        }

        fn resync_create(&mut self) -> Result<ResyncResult, ParameterError> {
            Ok(self.report.clone())
        }
    }

    fn rows(items: &[u64]) -> BTreeSet<u64> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_zip_pads_with_last_row() {
        let zip = ZipLongSource::new(vec![
            values("A", &["a0", "a1"]),
            values("B", &["b0", "b1", "b2", "b3", "b4"]),
        ]);
        assert_eq!(zip.max_parameters(), Some(5));
        let mut row = JobRow::new();
        zip.fill_parameter_info(4, &mut row).unwrap();
        assert_eq!(row.get("A"), Some("a1"));
        assert_eq!(row.get("B"), Some("b4"));
    }

    #[test]
    fn test_zip_unbounded_when_all_children_are() {
        let zip = ZipLongSource::new(vec![Box::new(
            crate::params::basic::ConstSource::new("K", "v"),
        )]);
        assert_eq!(zip.max_parameters(), None);
    }

    #[test]
    fn test_cross_enumerates_every_pair_once() {
        let cross = CrossSource::new(vec![
            values("A", &["a0", "a1", "a2"]),
            values("B", &["b0", "b1", "b2", "b3"]),
        ])
        .unwrap();
        assert_eq!(cross.max_parameters(), Some(12));
        let mut seen = BTreeSet::new();
        for pnum in 0..12 {
            let mut row = JobRow::new();
            cross.fill_parameter_info(pnum, &mut row).unwrap();
            seen.insert((row.get("A").unwrap().to_string(), row.get("B").unwrap().to_string()));
        }
        assert_eq!(seen.len(), 12);
        // Child 0 varies fastest.
        let mut row = JobRow::new();
        cross.fill_parameter_info(1, &mut row).unwrap();
        assert_eq!((row.get("A"), row.get("B")), (Some("a1"), Some("b0")));
    }

    #[test]
    fn test_cross_rejects_unbounded_child() {
        let err = CrossSource::new(vec![
            values("A", &["a0"]),
            Box::new(crate::params::basic::ConstSource::new("K", "v")),
        ])
        .unwrap_err();
        assert!(matches!(err, ParameterError::Unbounded { kind: "cross" }));
    }

    #[test]
    fn test_repeat_wraps_modulo() {
        let repeat = RepeatSource::new(values("A", &["a0", "a1", "a2"]), 4).unwrap();
        assert_eq!(repeat.max_parameters(), Some(12));
        let mut row = JobRow::new();
        repeat.fill_parameter_info(7, &mut row).unwrap();
        assert_eq!(row.get("A"), Some("a1"));
    }

    #[test]
    fn test_zip_resync_expands_padded_rows() {
        // Child A is 2 rows under a 5 row composite; a change in A's
        // last row also invalidates every padded row.
        let stub_a = StubSource::new(
            2,
            ResyncResult {
                added: rows(&[1]),
                ..Default::default()
            },
        );
        let stub_b = StubSource::new(5, ResyncResult::default());
        let mut zip = ZipLongSource::new(vec![Box::new(stub_a), Box::new(stub_b)]);
        let result = zip.resync().unwrap();
        assert_eq!(result.added, rows(&[1, 2, 3, 4]));
        assert!(!result.size_changed);
    }

    #[test]
    fn test_cross_resync_hits_every_digit_row() {
        // Sizes 3 x 4; child 1 (stride 3) row 2 covers composite rows
        // with second digit 2.
        let stub_a = StubSource::new(3, ResyncResult::default());
        let stub_b = StubSource::new(
            4,
            ResyncResult {
                disabled: rows(&[2]),
                ..Default::default()
            },
        );
        let mut cross = CrossSource::new(vec![Box::new(stub_a), Box::new(stub_b)]).unwrap();
        let result = cross.resync().unwrap();
        assert_eq!(result.disabled, rows(&[6, 7, 8]));
    }

    #[test]
    fn test_repeat_resync_covers_every_period() {
        let stub = StubSource::new(
            3,
            ResyncResult {
                added: rows(&[1]),
                size_changed: true,
                ..Default::default()
            },
        );
        let mut repeat = RepeatSource::new(Box::new(stub), 4).unwrap();
        let result = repeat.resync().unwrap();
        assert_eq!(result.added, rows(&[1, 4, 7, 10]));
        assert!(result.size_changed);
    }

    #[test]
    fn test_forced_resync_recomputes() {
        let stub = StubSource::new(
            2,
            ResyncResult {
                added: rows(&[0]),
                ..Default::default()
            },
        );
        let mut zip = ZipLongSource::new(vec![Box::new(stub)]);
        zip.resync_setup(Some(ResyncInterval::Never), false, None);
        assert!(zip.resync().unwrap().is_empty());
        zip.resync_setup(None, true, None);
        assert_eq!(zip.resync().unwrap().added, rows(&[0]));
    }
}

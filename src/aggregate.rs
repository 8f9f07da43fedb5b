//! Merging per-source results
//!
//! Counters are summed field-wise *before* deduplication, while the emitted
//! record sets are deduplicated. In batch mode the aggregate `valid_lines` /
//! `regional_lines` can therefore exceed the number of output lines; callers
//! that report post-dedup figures use [`AggregateResultSet::unique_counts`].

use crate::dedup::dedup;
use crate::progress::CounterSnapshot;

/// Output of one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub records: Vec<String>,
    pub regional_records: Vec<String>,
    pub counters: CounterSnapshot,
}

/// Union of many [`ResultSet`]s with duplicate lines removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResultSet {
    pub records: Vec<String>,
    pub regional_records: Vec<String>,
    /// Field-wise sum of the per-source counters, pre-dedup
    pub counters: CounterSnapshot,
    pub sources: usize,
}

impl AggregateResultSet {
    /// `(records, regional_records)` lengths after dedup
    pub fn unique_counts(&self) -> (usize, usize) {
        (self.records.len(), self.regional_records.len())
    }

    /// Counters with valid/regional replaced by the post-dedup lengths
    pub fn reconciled_counters(&self) -> CounterSnapshot {
        self.counters
            .reconciled(self.records.len(), self.regional_records.len())
    }
}

/// Accumulates results source by source
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<String>,
    regional_records: Vec<String>,
    counters: CounterSnapshot,
    sources: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: ResultSet) {
        self.records.extend(result.records);
        self.regional_records.extend(result.regional_records);
        self.counters.add(&result.counters);
        self.sources += 1;
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    /// Deduplicate both lists (independently, in parallel) and finish
    pub fn finish(self) -> AggregateResultSet {
        let (records, regional_records) =
            rayon::join(|| dedup(self.records), || dedup(self.regional_records));

        log::debug!(
            "Aggregated {} sources: {} unique records, {} unique regional",
            self.sources,
            records.len(),
            regional_records.len()
        );

        AggregateResultSet {
            records,
            regional_records,
            counters: self.counters,
            sources: self.sources,
        }
    }
}

/// Merge a sequence of results into one deduplicated set
pub fn merge<I>(results: I) -> AggregateResultSet
where
    I: IntoIterator<Item = ResultSet>,
{
    let mut aggregator = Aggregator::new();
    for result in results {
        aggregator.add(result);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(records: &[&str], regional: &[&str], total: u64, rejected: u64) -> ResultSet {
        ResultSet {
            records: records.iter().map(|s| s.to_string()).collect(),
            regional_records: regional.iter().map(|s| s.to_string()).collect(),
            counters: CounterSnapshot {
                total_lines: total,
                valid_lines: records.len() as u64,
                regional_lines: regional.len() as u64,
                rejected_lines: rejected,
            },
        }
    }

    #[test]
    fn test_merge_deduplicates_each_list() {
        let merged = merge(vec![
            result(&["a@x.com:1", "b@uol.com.br:2"], &["b@uol.com.br:2"], 3, 1),
            result(&["b@uol.com.br:2", "c@x.com:3"], &["b@uol.com.br:2"], 4, 2),
        ]);

        assert_eq!(merged.sources, 2);
        assert_eq!(merged.records, vec!["a@x.com:1", "b@uol.com.br:2", "c@x.com:3"]);
        assert_eq!(merged.regional_records, vec!["b@uol.com.br:2"]);
    }

    #[test]
    fn test_counters_are_summed_before_dedup() {
        let merged = merge(vec![
            result(&["a@x.com:1", "dup@x.com:9"], &[], 2, 0),
            result(&["dup@x.com:9"], &[], 5, 4),
        ]);

        // Summed counters still count the duplicate line twice
        assert_eq!(merged.counters.valid_lines, 3);
        assert_eq!(merged.counters.total_lines, 7);
        assert_eq!(merged.counters.rejected_lines, 4);

        // The emitted set does not
        assert_eq!(merged.unique_counts(), (2, 0));
        assert_eq!(merged.reconciled_counters().valid_lines, 2);
        assert_eq!(merged.reconciled_counters().total_lines, 7);
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge(Vec::new());
        assert_eq!(merged, AggregateResultSet::default());
    }
}

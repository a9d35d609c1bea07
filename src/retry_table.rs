use std::collections::HashMap;

use crate::series::SeriesDescriptor;

/// Number of times an unregistered series is re-requested from the PACS
/// before being given up on.
pub(crate) const RETRY_BUDGET: u32 = 5;

/// One series awaiting registration and how many PACS re-requests it has left.
#[derive(Debug, Clone)]
pub(crate) struct RetryTableEntry {
    pub series: SeriesDescriptor,
    pub remaining_retries: u32,
}

/// The series still being reconciled, keyed by SeriesInstanceUID.
///
/// An entry stays in the table until its series is dispatched or its retries
/// are exhausted. Reconciliation is over when the table is empty.
#[derive(Debug, Default)]
pub(crate) struct RetryTable {
    entries: HashMap<String, RetryTableEntry>,
}

impl RetryTable {
    pub fn new(batch: Vec<SeriesDescriptor>) -> Self {
        let entries = batch
            .into_iter()
            .map(|series| {
                let uid = series.SeriesInstanceUID.clone();
                let entry = RetryTableEntry {
                    series,
                    remaining_retries: RETRY_BUDGET,
                };
                (uid, entry)
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of the keys currently in the table, sorted so that passes
    /// visit series in a deterministic order.
    pub fn uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.entries.keys().cloned().collect();
        uids.sort();
        uids
    }

    pub fn get(&self, uid: &str) -> Option<&RetryTableEntry> {
        self.entries.get(uid)
    }

    pub fn get_mut(&mut self, uid: &str) -> Option<&mut RetryTableEntry> {
        self.entries.get_mut(uid)
    }

    pub fn remove(&mut self, uid: &str) -> Option<RetryTableEntry> {
        self.entries.remove(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::example_series;

    #[test]
    fn test_new_table_gives_every_series_the_full_budget() {
        let series = example_series();
        let table = RetryTable::new(vec![series.clone()]);
        assert_eq!(table.len(), 1);
        let entry = table.get(&series.SeriesInstanceUID).unwrap();
        assert_eq!(entry.remaining_retries, RETRY_BUDGET);
        assert_eq!(entry.series, series);
    }

    #[test]
    fn test_remove_drains_table() {
        let mut table = RetryTable::new(vec![example_series()]);
        for uid in table.uids() {
            table.remove(&uid);
        }
        assert!(table.is_empty());
    }
}

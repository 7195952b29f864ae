use crate::{common::*, dataset::SampleKey, utils::format_sequence};

/// One discarded annotation or sample with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardRecord {
    pub sample: SampleKey,
    pub reason: String,
}

/// Accumulated discards of a validation or matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscardLog {
    pub records: Vec<DiscardRecord>,
    /// The number of excluded annotations. Can differ from the number of records.
    pub excluded_count: usize,
    pub total_count: usize,
}

impl DiscardLog {
    pub fn add(&mut self, sample: SampleKey, reason: impl Into<String>) {
        self.records.push(DiscardRecord {
            sample,
            reason: reason.into(),
        });
    }

    /// The fraction of excluded annotations, zero for an empty log.
    pub fn excluded_fraction(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.excluded_count as f64 / self.total_count as f64
        }
    }

    /// The excluded part of the log, to seed a later pass over the annotations that are
    /// left. The later pass adds the annotations it visits to the total.
    pub fn excluded_only(&self) -> Self {
        Self {
            records: self.records.clone(),
            excluded_count: self.excluded_count,
            total_count: self.excluded_count,
        }
    }

    pub fn exceeds(&self, max_discard_fraction: f64) -> bool {
        self.excluded_fraction() > max_discard_fraction
    }

    /// Bounded summary of the recorded reasons.
    pub fn summary(&self, max_items: usize, separator: &str) -> String {
        format_sequence(
            self.records.iter().map(|record| &record.reason),
            max_items,
            separator,
        )
    }

    /// Emits the recorded reasons as a warning, if any.
    pub fn log(&self, what: &str, max_items: usize) {
        if !self.records.is_empty() {
            warn!(
                excluded = self.excluded_count,
                total = self.total_count,
                "{} were excluded due to the problems found:\n{}",
                what,
                self.summary(max_items, "\n")
            );
        }
    }
}

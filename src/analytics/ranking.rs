//! Descending rankings for pie and bar charts

use serde::{Deserialize, Serialize};

use crate::analytics::category::CategoryCounts;
use crate::analytics::models::RankedEntry;

/// Ordering between entries with the same count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Keep aggregation order
    #[default]
    Insertion,
    /// Lexicographic by name
    Name,
}

/// Rank categories by count, highest first, ties in aggregation order
pub fn rank(counts: CategoryCounts) -> Vec<RankedEntry> {
    rank_with(counts, TieBreak::Insertion)
}

pub fn rank_with(counts: CategoryCounts, tie_break: TieBreak) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = counts
        .into_entries()
        .into_iter()
        .map(|(name, value)| RankedEntry { name, value })
        .collect();

    // sort_by is stable, so Insertion needs no secondary key
    match tie_break {
        TieBreak::Insertion => entries.sort_by(|a, b| b.value.cmp(&a.value)),
        TieBreak::Name => {
            entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)))
        }
    }

    entries
}

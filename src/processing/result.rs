//! Per-frame detection summary.

use super::{CoinConfig, Denomination};
use crate::runtime::Circle;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable summary of one processed frame.
///
/// Every configured denomination has an entry in [`counts`](Self::counts),
/// zero when none was seen. The total is derived from the counts at
/// construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    counts: BTreeMap<String, u32>,
    total: u64,
    unclassified: u32,
    sequence: u64,
    captured_at: DateTime<Utc>,
}

impl DetectionResult {
    /// Builds a result from explicit counts.
    pub fn from_counts<'a>(
        counts: impl IntoIterator<Item = (&'a Denomination, u32)>,
        unclassified: u32,
        sequence: u64,
    ) -> Self {
        let mut map = BTreeMap::new();
        let mut total = 0u64;
        for (denomination, count) in counts {
            total += denomination.face_value as u64 * count as u64;
            *map.entry(denomination.label.clone()).or_insert(0) += count;
        }
        Self {
            counts: map,
            total,
            unclassified,
            sequence,
            captured_at: Utc::now(),
        }
    }

    /// Classifies detected circles against the coin table.
    pub fn from_circles(circles: &[Circle], coins: &CoinConfig, sequence: u64) -> Self {
        let mut tally: Vec<u32> = vec![0; coins.denominations.len()];
        let mut unclassified = 0;

        for circle in circles {
            match coins.classify(circle.radius) {
                Some(found) => {
                    if let Some(i) = coins
                        .denominations
                        .iter()
                        .position(|d| d.label == found.label)
                    {
                        tally[i] += 1;
                    }
                }
                None => unclassified += 1,
            }
        }

        Self::from_counts(
            coins.denominations.iter().zip(tally),
            unclassified,
            sequence,
        )
    }

    /// Returns the count per denomination label.
    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    /// Count for one label, zero when unknown.
    pub fn count(&self, label: &str) -> u32 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum of count × face value.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Circles that matched no denomination.
    pub fn unclassified(&self) -> u32 {
        self.unclassified
    }

    /// Number of classified coins.
    pub fn coin_count(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Sequence number of the frame this result came from.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns when the result was produced.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coins, total {}", self.coin_count(), self.total)?;
        let seen: Vec<String> = self
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(label, count)| format!("{label}x{count}"))
            .collect();
        if !seen.is_empty() {
            write!(f, " ({})", seen.join(", "))?;
        }
        if self.unclassified > 0 {
            write!(f, ", {} unclassified", self.unclassified)?;
        }
        Ok(())
    }
}

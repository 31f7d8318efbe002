//! Scoring module
//!
//! Reduces a multiset of check results into per-category and overall
//! scores on a 0-100 scale. Every intermediate value is an integer, so the
//! result is identical for any ordering of the same results.

use crate::checks::{Category, CheckStatus, Priority};
use crate::storage::CheckResultRecord;

/// Category and overall scores of an audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditScores {
    pub seo: u8,
    pub ai_readiness: u8,
    pub technical: u8,
    pub overall: u8,
}

impl AuditScores {
    /// Score of a single category
    pub fn category(&self, category: Category) -> u8 {
        match category {
            Category::Seo => self.seo,
            Category::AiReadiness => self.ai_readiness,
            Category::Technical => self.technical,
        }
    }
}

impl Default for AuditScores {
    /// Nothing to flag: every score is 100
    fn default() -> Self {
        Self {
            seo: 100,
            ai_readiness: 100,
            technical: 100,
            overall: 100,
        }
    }
}

/// Running weighted sum for one category
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    /// Σ weight × half-credit
    earned: u64,
    /// Σ weight
    possible: u64,
}

impl Tally {
    fn add(&mut self, priority: Priority, status: CheckStatus) {
        self.earned += priority.weight() * status.half_credit();
        self.possible += priority.weight();
    }

    /// round(100 × earned / (2 × possible)), halves rounded up
    fn score(&self) -> u8 {
        if self.possible == 0 {
            return 100;
        }
        let score = (200 * self.earned + 2 * self.possible) / (4 * self.possible);
        score as u8
    }
}

/// Scores a set of `(category, priority, status)` triples
///
/// # Arguments
///
/// * `results` - One entry per executed check
///
/// # Returns
///
/// The category scores plus their rounded mean. A category with no results
/// scores 100.
pub fn score_results<I>(results: I) -> AuditScores
where
    I: IntoIterator<Item = (Category, Priority, CheckStatus)>,
{
    let mut tallies = [Tally::default(); 3];
    for (category, priority, status) in results {
        tallies[category_index(category)].add(priority, status);
    }

    let seo = tallies[category_index(Category::Seo)].score();
    let ai_readiness = tallies[category_index(Category::AiReadiness)].score();
    let technical = tallies[category_index(Category::Technical)].score();

    AuditScores {
        seo,
        ai_readiness,
        technical,
        overall: overall_score(&[seo, ai_readiness, technical]),
    }
}

/// Scores persisted check result rows
pub fn score_records(records: &[CheckResultRecord]) -> AuditScores {
    score_results(records.iter().map(|r| (r.category, r.priority, r.status)))
}

/// round(mean(scores)), halves rounded up
pub fn overall_score(scores: &[u8]) -> u8 {
    if scores.is_empty() {
        return 100;
    }
    let n = scores.len() as u64;
    let sum: u64 = scores.iter().map(|&s| s as u64).sum();
    ((2 * sum + n) / (2 * n)) as u8
}

fn category_index(category: Category) -> usize {
    match category {
        Category::Seo => 0,
        Category::AiReadiness => 1,
        Category::Technical => 2,
    }
}

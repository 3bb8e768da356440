//! Fuzzy title similarity and best-candidate selection.
//!
//! Scores are integers in `0..=100` derived from the indel ratio
//! `2 * LCS / (|a| + |b|)`. Selection keeps a running best and only replaces it on a
//! strictly higher score, or, under [`TieBreak::Recommended`], on an equal
//! score when the newcomer is recommended and the incumbent is not.

use crate::models::{AnimeRecord, Scored};

/// Similarity ratio between two strings, `100` for identical input
/// (including two empty strings) and `0` when only one side is empty.
///
/// Symmetric and deterministic; comparison is case-sensitive and operates on
/// Unicode scalar values. Halves round to even.
pub fn similarity(query: &str, title: &str) -> u8 {
    if query == title {
        return 100;
    }
    let a: Vec<char> = query.chars().collect();
    let b: Vec<char> = title.chars().collect();
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let numerator = 200 * longest_common_subsequence(&a, &b);
    let (quotient, remainder) = (numerator / total, numerator % total);
    let rounded = match (2 * remainder).cmp(&total) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient % 2,
        std::cmp::Ordering::Less => quotient,
    };
    rounded.min(100) as u8
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// How an equal score is resolved while ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Equal score replaces the incumbent only if the newcomer is recommended
    /// and the incumbent is not.
    Recommended,
    /// The first candidate reaching a score keeps it.
    FirstSeen,
}

/// Something that may carry a recommendation flag.
pub trait Recommendable {
    fn is_recommended(&self) -> bool;
}

impl Recommendable for AnimeRecord {
    fn is_recommended(&self) -> bool {
        self.recommended.unwrap_or(false)
    }
}

/// Running best `(candidate, score)` pair.
#[derive(Debug)]
pub struct BestMatch<T> {
    best: Option<T>,
    score: u8,
    tie_break: TieBreak,
}

impl<T: Recommendable> BestMatch<T> {
    /// Empty tracker: no candidate, score 0.
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            best: None,
            score: 0,
            tie_break,
        }
    }

    /// Offer a candidate. Returns `true` if it became the new best.
    pub fn consider(&mut self, candidate: T, score: u8) -> bool {
        let replace = if score > self.score {
            true
        } else if score == self.score {
            match self.tie_break {
                TieBreak::Recommended => {
                    candidate.is_recommended()
                        && !self.best.as_ref().is_some_and(Recommendable::is_recommended)
                }
                TieBreak::FirstSeen => false,
            }
        } else {
            false
        };

        if replace {
            self.best = Some(candidate);
            self.score = score;
        }
        replace
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    /// The winner, if any candidate was ever accepted.
    pub fn finish(self) -> Option<Scored<T>> {
        let score = self.score;
        self.best.map(|candidate| Scored { candidate, score })
    }
}

/// Score every record against `query` and keep the best one.
pub fn rank_records<I>(query: &str, candidates: I, tie_break: TieBreak) -> Option<Scored<AnimeRecord>>
where
    I: IntoIterator<Item = AnimeRecord>,
{
    let mut best = BestMatch::new(tie_break);
    for record in candidates {
        let score = similarity(query, &record.title);
        tracing::debug!(title = %record.title, score, "scored candidate");
        best.consider(record, score);
    }
    best.finish()
}

/// Choose between the forum's two listing paths.
///
/// The strictly higher score wins; on a tie the uploaded-listing result is
/// kept since it carries the richer metadata. A missing side scores 0.
pub fn pick_across<T>(uploaded: Option<Scored<T>>, uploading: Option<Scored<T>>) -> Option<Scored<T>> {
    let uploaded_score = uploaded.as_ref().map_or(0, |s| s.score);
    let uploading_score = uploading.as_ref().map_or(0, |s| s.score);
    if uploading_score > uploaded_score {
        uploading
    } else {
        uploaded.or(uploading)
    }
}

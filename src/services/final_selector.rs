//! Majority vote over a population, with a deterministic fallback.

use std::collections::HashMap;

use crate::domain::models::{Population, SelectionMethod, SelectionResult};
use crate::services::answer_extractor::normalize_answer;

/// Minimum votes for a majority win.
pub const MAJORITY_THRESHOLD: usize = 2;

/// One distinct normalized answer and its support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteBucket {
    pub key: String,
    /// First population index where this answer appeared.
    pub first_index: usize,
    /// The answer as extracted at `first_index`.
    pub display: String,
    pub votes: usize,
}

/// Count votes over the normalized non-null answers, in first-seen order.
pub fn tally_votes<'a>(answers: impl IntoIterator<Item = Option<&'a str>>) -> Vec<VoteBucket> {
    let mut buckets: Vec<VoteBucket> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (index, answer) in answers.into_iter().enumerate() {
        let Some(answer) = answer else { continue };
        let key = normalize_answer(answer);
        if key.is_empty() {
            continue;
        }
        match by_key.get(&key) {
            Some(&slot) => buckets[slot].votes += 1,
            None => {
                by_key.insert(key.clone(), buckets.len());
                buckets.push(VoteBucket {
                    key,
                    first_index: index,
                    display: answer.to_string(),
                    votes: 1,
                });
            }
        }
    }

    buckets
}

/// The bucket with the most votes; ties go to the answer seen first.
pub fn top_bucket(buckets: &[VoteBucket]) -> Option<&VoteBucket> {
    buckets.iter().fold(None, |best: Option<&VoteBucket>, bucket| match best {
        Some(b) if b.votes >= bucket.votes => Some(b),
        _ => Some(bucket),
    })
}

/// Pick the winning candidate of the final population.
pub fn select(population: &Population) -> SelectionResult {
    let buckets = tally_votes(population.answers());

    if let Some(top) = top_bucket(&buckets).filter(|b| b.votes >= MAJORITY_THRESHOLD) {
        return SelectionResult {
            index: top.first_index,
            method: SelectionMethod::Majority,
            answer: Some(top.display.clone()),
            votes: top.votes,
        };
    }

    let first_answered = population
        .answers()
        .enumerate()
        .find_map(|(index, answer)| answer.map(|a| (index, a.to_string())));

    match first_answered {
        Some((index, answer)) => SelectionResult {
            index,
            method: SelectionMethod::Deterministic,
            answer: Some(answer),
            votes: 1,
        },
        None => SelectionResult {
            index: 0,
            method: SelectionMethod::Deterministic,
            answer: None,
            votes: 1,
        },
    }
}

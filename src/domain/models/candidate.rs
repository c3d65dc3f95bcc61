//! Candidates and populations.

use serde::{Deserialize, Serialize};

/// One model output and the answer pulled out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub raw_text: String,
    pub extracted_answer: Option<String>,
}

impl Candidate {
    pub fn new(raw_text: impl Into<String>, extracted_answer: Option<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            extracted_answer,
        }
    }

    /// Placeholder used when a seed call fails under failure tolerance.
    pub fn empty() -> Self {
        Self::new(String::new(), None)
    }
}

/// The ordered output of one phase. Indices are positional only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    candidates: Vec<Candidate>,
}

impl Population {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn answers(&self) -> impl Iterator<Item = Option<&str>> {
        self.candidates
            .iter()
            .map(|c| c.extracted_answer.as_deref())
    }

    /// Raw texts at the given indices, in index order. Unknown indices are skipped.
    pub fn texts_at(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .filter_map(|&i| self.candidates.get(i))
            .map(|c| c.raw_text.as_str())
            .collect()
    }
}

impl From<Vec<Candidate>> for Population {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self::new(candidates)
    }
}

//! Seed and aggregation prompt templates.
//!
//! Both templates end with the same output contract: the model must finish
//! with a `Final Answer: <value>` line so that answers can be extracted and
//! voted on.

use std::fmt::Write;

/// Maximum characters of a candidate inserted into an aggregation prompt.
pub const CANDIDATE_CHAR_BUDGET: usize = 3500;

pub const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

const OUTPUT_CONTRACT: &str = "\
Output contract:
- Reason step by step, as briefly as the problem allows.
- The last line of your response must be exactly `Final Answer: <value>`.
- Put only the answer itself on that line, with no extra commentary.";

/// Prompt for an independent first-phase candidate.
pub fn build_seed(question: &str, candidate_index: usize, total_candidates: usize) -> String {
    format!(
        "You are candidate {candidate_index} of {total_candidates} independent solvers.\n\
         Solve the problem below on your own.\n\n\
         ## Problem\n{question}\n\n\
         {OUTPUT_CONTRACT}\n"
    )
}

/// Prompt asking the model to merge several prior candidates into one.
pub fn build_aggregate(
    question: &str,
    subset_texts: &[&str],
    step: usize,
    total_steps: usize,
) -> String {
    let mut prompt = format!(
        "Aggregation round {step} of {total_steps}.\n\
         Below is a problem and {} candidate solutions produced earlier. Some may be wrong.\n\
         Compare them, fix their mistakes, keep what is correct, and write one improved \
         solution. Do not just pick a candidate by majority; check the reasoning.\n\n\
         ## Problem\n{question}\n",
        subset_texts.len()
    );

    for (i, text) in subset_texts.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n## Candidate {}\n{}\n",
            i + 1,
            truncate_candidate(text)
        );
    }

    prompt.push('\n');
    prompt.push_str(OUTPUT_CONTRACT);
    prompt.push('\n');
    prompt
}

/// Cut `text` to `CANDIDATE_CHAR_BUDGET` characters, appending a marker when cut.
pub fn truncate_candidate(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(CANDIDATE_CHAR_BUDGET) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

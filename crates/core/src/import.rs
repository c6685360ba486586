//! Screening of externally parsed question/answer pairs before import.
//!
//! Parsers (CSV readers, document extractors, generators) hand over raw pairs.
//! Pairs that are blank or too long are dropped without an individual report.

use serde::{Deserialize, Serialize};

use crate::model::{CardDraft, ContentLimits, Field};

/// A raw pair produced by an external parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCandidate {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl ImportCandidate {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Surviving drafts plus the number of candidates that were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScreenedBatch {
    pub drafts: Vec<CardDraft>,
    pub dropped: usize,
}

/// Trims every candidate and keeps those whose question and answer are both
/// non-empty and within the content ceiling. Input order is preserved.
#[must_use]
pub fn screen_candidates<I>(candidates: I, limits: &ContentLimits) -> ScreenedBatch
where
    I: IntoIterator<Item = ImportCandidate>,
{
    let mut batch = ScreenedBatch::default();
    for candidate in candidates {
        let question = candidate.question.trim();
        let answer = candidate.answer.trim();
        let valid = limits.check_content(Field::Question, question).is_ok()
            && limits.check_content(Field::Answer, answer).is_ok();
        if valid {
            batch.drafts.push(CardDraft::new(question, answer));
        } else {
            batch.dropped += 1;
        }
    }
    batch
}

/// Provisional order for the item at `position` in a batch appended after
/// `base_len` existing records.
#[must_use]
pub fn provisional_order(base_len: usize, position: usize) -> u32 {
    u32::try_from(base_len + position + 1).unwrap_or(u32::MAX)
}

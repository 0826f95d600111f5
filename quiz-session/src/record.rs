use serde::{Deserialize, Serialize};

/// Every generated question carries exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// One multiple-choice question as produced by the generation step.
///
/// Records are immutable once parsed; correctness is checked by value
/// equality against `answer`, never by option index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl QuestionRecord {
    /// Topic label for downstream prompts when generation did not attach one.
    pub fn topic_or_unspecified(&self) -> &str {
        self.topic.as_deref().unwrap_or("unspecified")
    }

    /// Checks the record invariants: non-empty question text, exactly four
    /// distinct options, and `answer` equal to one of them.
    pub fn is_well_formed(&self) -> bool {
        if self.question.trim().is_empty() || self.options.len() != OPTIONS_PER_QUESTION {
            return false;
        }
        let distinct = self
            .options
            .iter()
            .all(|o| self.options.iter().filter(|other| *other == o).count() == 1);
        distinct && self.options.iter().any(|o| o == &self.answer)
    }
}

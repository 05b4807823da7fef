use serde::{Deserialize, Serialize};

/// A single quiz question as produced by the generation worker.
///
/// `question_type` is the worker's free-form question kind (`mcq`, `short`, ...).
/// Multiple-choice questions carry their answer `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type", default)]
    pub question_type: String,
    pub question: String,
    #[serde(alias = "correctAnswer", default)]
    pub correct_answer: String,
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

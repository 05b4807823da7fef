use serde::{Deserialize, Serialize};

fn default_difficulty() -> String {
    "medium".to_string()
}

/// A question/answer card from a generated deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

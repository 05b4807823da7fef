pub mod artifact;
pub mod document;
pub mod flashcard;
pub mod quiz;

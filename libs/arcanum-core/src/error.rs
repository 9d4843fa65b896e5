//! Error types for arcanum-core.

use crate::types::ExerciseKind;
use thiserror::Error;

/// Validation failures from authoring and bulk import.
///
/// These surface to the admin UI as inline messages, so every variant
/// renders a human-readable reason. A failed batch is never partially
/// applied.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("expected a JSON array of objects")]
    NotAnArray,

    #[error("{kind} {id}: title is required")]
    MissingTitle { kind: &'static str, id: i64 },

    #[error("profile: name is required")]
    MissingName,

    #[error("exercise {id}: mcq needs at least two options")]
    TooFewOptions { id: i64 },

    #[error("exercise {id}: answer index {answer} out of range for {len} options")]
    AnswerOutOfRange { id: i64, answer: usize, len: usize },

    #[error("exercise {id}: answer must not be empty")]
    EmptyAnswer { id: i64 },

    #[error("exercise {id}: solution must not be empty")]
    EmptySolution { id: i64 },

    #[error("exercise {id}: items must not be empty")]
    EmptyItems { id: i64 },

    #[error("exercise {id}: order must be a permutation of 0..{len}")]
    InvalidOrder { id: i64, len: usize },

    #[error("duplicate id {id} in batch")]
    DuplicateId { id: i64 },
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Grading was handed an answer of the wrong shape for the exercise.
/// This is caller misuse, not a wrong answer.
#[derive(Debug, Error)]
#[error("answer does not match exercise type {expected:?}")]
pub struct GradeError {
    pub expected: ExerciseKind,
}

/// Errors from store operations addressing state by ID.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile {0} not found")]
    ProfileNotFound(i64),

    #[error("course {0} not found")]
    CourseNotFound(i64),

    #[error("chapter {0} not found")]
    ChapterNotFound(i64),

    #[error("lesson {0} not found")]
    LessonNotFound(i64),

    #[error("exercise {0} not found")]
    ExerciseNotFound(i64),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Grade(#[from] GradeError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

//! Core library of the Arcanum learning platform, consumed in-process by
//! the view layer.
//!
//! Provides:
//! - Content model (Course → Chapter → Lesson → Exercise) with validation
//!   and atomic bulk import
//! - Per-profile progress tracking and completion propagation
//! - Spaced-repetition scheduling with a monotonic backoff schedule
//! - Answer grading for every exercise variant
//! - Gamification (XP, levels, streaks, achievements)
//! - JSON slot persistence with graceful corrupt-state fallback

pub mod content;
pub mod error;
pub mod gamification;
pub mod grading;
pub mod progress;
pub mod srs;
pub mod storage;
pub mod store;
pub mod types;

pub use content::{IdAllocator, IdIndex, SrsRef};
pub use error::{GradeError, StoreError, ValidationError};
pub use grading::{grade, Answer};
pub use progress::{
    chapter_progress, course_progress, record_exercise_outcome, reset_all_progress,
    reset_chapter_progress, reset_course_progress, OutcomeReport, ProgressSummary,
};
pub use srs::{BackoffSchedule, SrsQueue};
pub use storage::{JsonSlotStorage, MemorySlotStorage, SlotStorage, StorageError};
pub use store::{ChapterPatch, CoursePatch, LessonPatch, ProfilePatch, Store};
pub use types::{
    AppSettings, AppState, Chapter, Course, Exercise, ExerciseBody, ExerciseKind, Lesson,
    LogEntry, Outcome, Profile, ProfileExport, ProfileSettings, Resource, SrsItem, SrsKind,
};

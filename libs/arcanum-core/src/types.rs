//! Core types for the learning platform.
//!
//! Serde attributes pin every type to the persisted JSON document layout
//! (camelCase keys, millisecond timestamps, `"type"`-tagged exercise objects),
//! so the whole state graph round-trips through import/export unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of an exercise attempt or an SRS review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Fail,
}

impl Outcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct { Self::Success } else { Self::Fail }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Exercise discriminant, also used as the `type` field of log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Code,
    Mcq,
    Fill,
    Drag,
    Order,
}

impl ExerciseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Mcq => "mcq",
            Self::Fill => "fill",
            Self::Drag => "drag",
            Self::Order => "order",
        }
    }
}

/// Type-specific payload of an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExerciseBody {
    /// Checked via substring heuristics against `solution`, never executed.
    Code {
        prompt: String,
        #[serde(default)]
        starter: String,
        solution: String,
    },
    /// `answer` indexes into `options`.
    Mcq {
        prompt: String,
        options: Vec<String>,
        answer: usize,
    },
    /// Trimmed, case-insensitive exact match against `answer`.
    Fill { prompt: String, answer: String },
    /// `order` is the correct permutation of `items` as original indices.
    Drag {
        prompt: String,
        #[serde(deserialize_with = "items_as_strings")]
        items: Vec<String>,
        order: Vec<usize>,
    },
    Order {
        prompt: String,
        #[serde(deserialize_with = "items_as_strings")]
        items: Vec<String>,
        order: Vec<usize>,
    },
}

/// Item lists may arrive as numbers (e.g. ordering `[3, 1, 2]`); store them
/// as their string form so grading compares one representation.
fn items_as_strings<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Item {
        Text(String),
        Number(serde_json::Number),
    }

    let raw = Vec::<Item>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .map(|item| match item {
            Item::Text(text) => text,
            Item::Number(n) => n.to_string(),
        })
        .collect())
}

impl ExerciseBody {
    pub fn kind(&self) -> ExerciseKind {
        match self {
            Self::Code { .. } => ExerciseKind::Code,
            Self::Mcq { .. } => ExerciseKind::Mcq,
            Self::Fill { .. } => ExerciseKind::Fill,
            Self::Drag { .. } => ExerciseKind::Drag,
            Self::Order { .. } => ExerciseKind::Order,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::Code { prompt, .. }
            | Self::Mcq { prompt, .. }
            | Self::Fill { prompt, .. }
            | Self::Drag { prompt, .. }
            | Self::Order { prompt, .. } => prompt,
        }
    }
}

/// An exercise inside a lesson. Bulk import assigns IDs to exercises that
/// arrive without one, so committed trees always have them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    #[serde(flatten)]
    pub body: ExerciseBody,
}

impl Exercise {
    pub fn kind(&self) -> ExerciseKind {
        self.body.kind()
    }
}

/// A lesson: markdown content plus an ordered exercise list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    /// Markdown source; rendering is the view layer's concern.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// Supplementary link shown in a chapter sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Free-form review questions, displayed verbatim.
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Top of the content tree. Chapter order is significant (display and
/// unlock sequencing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// One exercise-attempt record. Append-only; at most one success entry per
/// (lessonId, type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub lesson_id: i64,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub status: Outcome,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// What an SRS queue entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrsKind {
    Lesson,
    Exercise,
}

/// A scheduled review item. `(id, kind)` is unique within a queue;
/// rescheduling mutates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SrsKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_at: DateTime<Utc>,
    pub interval_stage: u32,
    pub last_outcome: Outcome,
}

/// Per-profile preferences, carried opaquely for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "light".to_string()
}

/// A learner: gamification stats plus all progress state.
///
/// `srs_queue` and `last_active` default when absent so documents persisted
/// before those fields existed still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    pub level: u32,
    pub xp: i64,
    pub xp_to_next: i64,
    pub streak: u32,
    #[serde(default)]
    pub achievements: Vec<i64>,
    #[serde(default)]
    pub completed_lessons: Vec<i64>,
    #[serde(default)]
    pub completed_chapters: Vec<i64>,
    #[serde(default)]
    pub completed_courses: Vec<i64>,
    #[serde(default)]
    pub exercise_log: Vec<LogEntry>,
    #[serde(default)]
    pub srs_queue: crate::srs::SrsQueue,
    /// Last UTC day with a successful outcome; drives streak updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<NaiveDate>,
    #[serde(default)]
    pub settings: ProfileSettings,
}

impl Profile {
    /// Fresh profile with starting gamification stats.
    pub fn new(id: i64, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar: avatar.into(),
            level: 1,
            xp: 0,
            xp_to_next: 100,
            streak: 0,
            achievements: Vec::new(),
            completed_lessons: Vec::new(),
            completed_chapters: Vec::new(),
            completed_courses: Vec::new(),
            exercise_log: Vec::new(),
            srs_queue: Default::default(),
            last_active: None,
            settings: ProfileSettings::default(),
        }
    }
}

/// App-wide preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

/// The whole persisted state graph: one JSON document in one storage slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub selected_profile_id: i64,
    #[serde(default)]
    pub admin_mode: bool,
    #[serde(default)]
    pub app_settings: AppSettings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            courses: Vec::new(),
            selected_profile_id: 0,
            admin_mode: false,
            app_settings: AppSettings::default(),
        }
    }
}

/// Profile-scoped export bundle: one learner's record plus the content
/// needed to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileExport {
    pub profile: Profile,
    pub courses: Vec<Course>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exercise_tagged_by_type_field() {
        let json = r#"{ "id": 7, "type": "mcq", "prompt": "What is Python?",
                        "options": ["A snake", "A programming language"], "answer": 1 }"#;
        let ex: Exercise = serde_json::from_str(json).unwrap();
        assert_eq!(ex.kind(), ExerciseKind::Mcq);
        match &ex.body {
            ExerciseBody::Mcq { options, answer, .. } => {
                assert_eq!(options.len(), 2);
                assert_eq!(*answer, 1);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let back = serde_json::to_value(&ex).unwrap();
        assert_eq!(back["type"], "mcq");
        assert_eq!(back["id"], 7);
    }

    #[test]
    fn ordering_items_accept_numbers() {
        let json = r#"{ "id": 12, "type": "order", "prompt": "Sort ascending",
                        "items": [3, 1, 2], "order": [1, 2, 0] }"#;
        let ex: Exercise = serde_json::from_str(json).unwrap();
        match &ex.body {
            ExerciseBody::Order { items, order, .. } => {
                assert_eq!(items, &["3", "1", "2"]);
                assert_eq!(order, &[1, 2, 0]);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn log_entry_uses_millisecond_timestamps() {
        let json = r#"{ "lessonId": 1001, "type": "code", "status": "success",
                        "timestamp": 1710000000000 }"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.lesson_id, 1001);
        assert_eq!(entry.timestamp.timestamp_millis(), 1_710_000_000_000);

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["timestamp"], 1_710_000_000_000_i64);
        assert_eq!(back["type"], "code");
    }

    #[test]
    fn profile_without_queue_defaults_to_empty() {
        let json = r#"{ "id": 1, "name": "Demo User", "avatar": "", "level": 4,
                        "xp": 1280, "xpToNext": 1500, "streak": 4 }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert!(profile.srs_queue.is_empty());
        assert!(profile.completed_lessons.is_empty());
        assert_eq!(profile.xp_to_next, 1500);
    }

    #[test]
    fn app_state_round_trips_document_layout() {
        let state = AppState {
            profiles: vec![Profile::new(1, "Demo User", "")],
            courses: vec![Course {
                id: 1,
                title: "Learn to Code in Python".into(),
                desc: "Start your journey with Python.".into(),
                icon: "🐍".into(),
                chapters: vec![],
            }],
            selected_profile_id: 1,
            admin_mode: false,
            app_settings: AppSettings::default(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"selectedProfileId\":1"));
        assert!(json.contains("\"adminMode\":false"));
        assert!(json.contains("\"appSettings\""));
        let back: AppState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}

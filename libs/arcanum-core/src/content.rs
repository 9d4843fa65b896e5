//! Content tree queries, validation, and bulk import.
//!
//! Lookups return `Option` so a missing node is a distinguishable state,
//! never a silent fallback to the first element. Bulk import is atomic:
//! the whole batch parses, gets IDs, and validates before anything is
//! handed back for committing.

use crate::error::ValidationError;
use crate::types::{
    AppState, Chapter, Course, Exercise, ExerciseBody, Lesson, SrsItem, SrsKind,
};
use serde_json::Value;
use std::collections::HashSet;

/// Monotonic ID source. Timestamp+random generation collides under rapid
/// bulk imports; a counter seeded above every ID already in the state
/// cannot.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Seed from the highest ID anywhere in the state graph.
    pub fn seeded_from(state: &AppState) -> Self {
        let mut max = 0;
        for profile in &state.profiles {
            max = max.max(profile.id);
        }
        for course in &state.courses {
            max = max.max(course.id);
            for chapter in &course.chapters {
                max = max.max(chapter.id);
                for lesson in &chapter.lessons {
                    max = max.max(lesson.id);
                    for exercise in &lesson.exercises {
                        max = max.max(exercise.id);
                    }
                }
            }
        }
        Self { next: max + 1 }
    }

    pub fn alloc(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Lookups =====

pub fn find_course(courses: &[Course], id: i64) -> Option<&Course> {
    courses.iter().find(|c| c.id == id)
}

pub fn find_course_mut(courses: &mut [Course], id: i64) -> Option<&mut Course> {
    courses.iter_mut().find(|c| c.id == id)
}

pub fn find_chapter(course: &Course, id: i64) -> Option<&Chapter> {
    course.chapters.iter().find(|c| c.id == id)
}

pub fn find_chapter_mut(course: &mut Course, id: i64) -> Option<&mut Chapter> {
    course.chapters.iter_mut().find(|c| c.id == id)
}

pub fn find_lesson(chapter: &Chapter, id: i64) -> Option<&Lesson> {
    chapter.lessons.iter().find(|l| l.id == id)
}

pub fn find_lesson_mut(chapter: &mut Chapter, id: i64) -> Option<&mut Lesson> {
    chapter.lessons.iter_mut().find(|l| l.id == id)
}

pub fn find_exercise(lesson: &Lesson, id: i64) -> Option<&Exercise> {
    lesson.exercises.iter().find(|e| e.id == id)
}

/// Find a lesson anywhere in the content forest.
pub fn locate_lesson(courses: &[Course], lesson_id: i64) -> Option<(&Course, &Chapter, &Lesson)> {
    for course in courses {
        for chapter in &course.chapters {
            if let Some(lesson) = find_lesson(chapter, lesson_id) {
                return Some((course, chapter, lesson));
            }
        }
    }
    None
}

/// Find an exercise anywhere in the content forest, with its lesson.
pub fn locate_exercise(courses: &[Course], exercise_id: i64) -> Option<(&Lesson, &Exercise)> {
    for course in courses {
        for chapter in &course.chapters {
            for lesson in &chapter.lessons {
                if let Some(exercise) = find_exercise(lesson, exercise_id) {
                    return Some((lesson, exercise));
                }
            }
        }
    }
    None
}

/// What an SRS queue entry points at, once resolved against the content
/// tree.
#[derive(Debug, Clone, Copy)]
pub enum SrsRef<'a> {
    Lesson(&'a Lesson),
    Exercise { lesson: &'a Lesson, exercise: &'a Exercise },
}

/// Resolve a queue entry to content. `None` means the referenced node has
/// been deleted; the caller shows a placeholder and the entry stays queued
/// until a reset removes it.
pub fn resolve_srs_item<'a>(courses: &'a [Course], item: &SrsItem) -> Option<SrsRef<'a>> {
    match item.kind {
        SrsKind::Lesson => locate_lesson(courses, item.id).map(|(_, _, l)| SrsRef::Lesson(l)),
        SrsKind::Exercise => {
            locate_exercise(courses, item.id).map(|(lesson, exercise)| SrsRef::Exercise {
                lesson,
                exercise,
            })
        }
    }
}

// ===== Reset scoping =====

/// The IDs reachable from a subtree, used to scope progress resets.
/// Lesson and exercise IDs are kept separately even though the SRS queue
/// treats them as one ID space.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub chapters: HashSet<i64>,
    pub lessons: HashSet<i64>,
    pub exercises: HashSet<i64>,
}

impl Scope {
    /// All IDs an SRS entry in this scope could carry.
    pub fn srs_ids(&self) -> HashSet<i64> {
        self.lessons.union(&self.exercises).copied().collect()
    }

    fn absorb_chapter(&mut self, chapter: &Chapter) {
        self.chapters.insert(chapter.id);
        for lesson in &chapter.lessons {
            self.lessons.insert(lesson.id);
            for exercise in &lesson.exercises {
                self.exercises.insert(exercise.id);
            }
        }
    }
}

pub fn scope_of_chapter(chapter: &Chapter) -> Scope {
    let mut scope = Scope::default();
    scope.absorb_chapter(chapter);
    scope
}

pub fn scope_of_course(course: &Course) -> Scope {
    let mut scope = Scope::default();
    for chapter in &course.chapters {
        scope.absorb_chapter(chapter);
    }
    scope
}

// ===== Validation =====

pub fn validate_course(course: &Course) -> Result<(), ValidationError> {
    if course.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle {
            kind: "course",
            id: course.id,
        });
    }
    for chapter in &course.chapters {
        validate_chapter(chapter)?;
    }
    Ok(())
}

pub fn validate_chapter(chapter: &Chapter) -> Result<(), ValidationError> {
    if chapter.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle {
            kind: "chapter",
            id: chapter.id,
        });
    }
    for lesson in &chapter.lessons {
        validate_lesson(lesson)?;
    }
    Ok(())
}

pub fn validate_lesson(lesson: &Lesson) -> Result<(), ValidationError> {
    if lesson.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle {
            kind: "lesson",
            id: lesson.id,
        });
    }
    for exercise in &lesson.exercises {
        validate_exercise(exercise)?;
    }
    Ok(())
}

pub fn validate_exercise(exercise: &Exercise) -> Result<(), ValidationError> {
    let id = exercise.id;
    match &exercise.body {
        ExerciseBody::Code { solution, .. } => {
            if solution.trim().is_empty() {
                return Err(ValidationError::EmptySolution { id });
            }
        }
        ExerciseBody::Mcq { options, answer, .. } => {
            if options.len() < 2 {
                return Err(ValidationError::TooFewOptions { id });
            }
            if *answer >= options.len() {
                return Err(ValidationError::AnswerOutOfRange {
                    id,
                    answer: *answer,
                    len: options.len(),
                });
            }
        }
        ExerciseBody::Fill { answer, .. } => {
            if answer.trim().is_empty() {
                return Err(ValidationError::EmptyAnswer { id });
            }
        }
        ExerciseBody::Drag { items, order, .. } | ExerciseBody::Order { items, order, .. } => {
            if items.is_empty() {
                return Err(ValidationError::EmptyItems { id });
            }
            if !is_permutation(order, items.len()) {
                return Err(ValidationError::InvalidOrder {
                    id,
                    len: items.len(),
                });
            }
        }
    }
    Ok(())
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &idx in order {
        if idx >= len || seen[idx] {
            return false;
        }
        seen[idx] = true;
    }
    true
}

// ===== Bulk import =====

/// IDs already present in a content tree, grouped by node type. Bulk import
/// checks explicit batch IDs against these so a paste cannot shadow an
/// existing course, chapter, lesson, or exercise.
#[derive(Debug, Default, Clone)]
pub struct IdIndex {
    courses: HashSet<i64>,
    chapters: HashSet<i64>,
    lessons: HashSet<i64>,
    exercises: HashSet<i64>,
}

impl IdIndex {
    pub fn from_courses(courses: &[Course]) -> Self {
        let mut index = Self::default();
        for course in courses {
            index.courses.insert(course.id);
            for chapter in &course.chapters {
                index.chapters.insert(chapter.id);
                for lesson in &chapter.lessons {
                    index.lessons.insert(lesson.id);
                    for exercise in &lesson.exercises {
                        index.exercises.insert(exercise.id);
                    }
                }
            }
        }
        index
    }

    /// Drop a lesson's exercise IDs from the index. Replacing that lesson's
    /// exercise list must not collide with the list being replaced.
    pub fn release_exercises(&mut self, lesson: &Lesson) {
        for exercise in &lesson.exercises {
            self.exercises.remove(&exercise.id);
        }
    }
}

/// Parse a bulk-authoring JSON array of (possibly partial) courses.
/// Items missing an `id` get a fresh one before deserialization; the whole
/// batch validates or none of it is usable.
pub fn parse_courses(
    json: &str,
    ids: &mut IdAllocator,
    existing: &IdIndex,
) -> Result<Vec<Course>, ValidationError> {
    let mut value: Value = serde_json::from_str(json)?;
    let array = value.as_array_mut().ok_or(ValidationError::NotAnArray)?;
    for course in array.iter_mut() {
        assign_ids(course, &["chapters", "lessons", "exercises"], ids);
    }
    let courses: Vec<Course> = serde_json::from_value(value)?;
    check_unique(courses.iter().map(|c| c.id), &existing.courses)?;
    let chapters = || courses.iter().flat_map(|c| c.chapters.iter());
    let lessons = || chapters().flat_map(|ch| ch.lessons.iter());
    check_unique(chapters().map(|ch| ch.id), &existing.chapters)?;
    check_unique(lessons().map(|l| l.id), &existing.lessons)?;
    check_unique(
        lessons().flat_map(|l| l.exercises.iter()).map(|e| e.id),
        &existing.exercises,
    )?;
    for course in &courses {
        validate_course(course)?;
    }
    Ok(courses)
}

/// Parse a bulk-authoring JSON array of chapters.
pub fn parse_chapters(
    json: &str,
    ids: &mut IdAllocator,
    existing: &IdIndex,
) -> Result<Vec<Chapter>, ValidationError> {
    let mut value: Value = serde_json::from_str(json)?;
    let array = value.as_array_mut().ok_or(ValidationError::NotAnArray)?;
    for chapter in array.iter_mut() {
        assign_ids(chapter, &["lessons", "exercises"], ids);
    }
    let chapters: Vec<Chapter> = serde_json::from_value(value)?;
    check_unique(chapters.iter().map(|c| c.id), &existing.chapters)?;
    let lessons = || chapters.iter().flat_map(|ch| ch.lessons.iter());
    check_unique(lessons().map(|l| l.id), &existing.lessons)?;
    check_unique(
        lessons().flat_map(|l| l.exercises.iter()).map(|e| e.id),
        &existing.exercises,
    )?;
    for chapter in &chapters {
        validate_chapter(chapter)?;
    }
    Ok(chapters)
}

/// Parse a bulk-authoring JSON array of lessons.
pub fn parse_lessons(
    json: &str,
    ids: &mut IdAllocator,
    existing: &IdIndex,
) -> Result<Vec<Lesson>, ValidationError> {
    let mut value: Value = serde_json::from_str(json)?;
    let array = value.as_array_mut().ok_or(ValidationError::NotAnArray)?;
    for lesson in array.iter_mut() {
        assign_ids(lesson, &["exercises"], ids);
    }
    let lessons: Vec<Lesson> = serde_json::from_value(value)?;
    check_unique(lessons.iter().map(|l| l.id), &existing.lessons)?;
    check_unique(
        lessons.iter().flat_map(|l| l.exercises.iter()).map(|e| e.id),
        &existing.exercises,
    )?;
    for lesson in &lessons {
        validate_lesson(lesson)?;
    }
    Ok(lessons)
}

/// Parse a JSON array of exercises (the lesson-editor paste format).
pub fn parse_exercises(
    json: &str,
    ids: &mut IdAllocator,
    existing: &IdIndex,
) -> Result<Vec<Exercise>, ValidationError> {
    let mut value: Value = serde_json::from_str(json)?;
    let array = value.as_array_mut().ok_or(ValidationError::NotAnArray)?;
    for exercise in array.iter_mut() {
        assign_ids(exercise, &[], ids);
    }
    let exercises: Vec<Exercise> = serde_json::from_value(value)?;
    check_unique(exercises.iter().map(|e| e.id), &existing.exercises)?;
    for exercise in &exercises {
        validate_exercise(exercise)?;
    }
    Ok(exercises)
}

/// Give `node` an `id` if it lacks one, then recurse through the child
/// arrays named by `levels`.
fn assign_ids(node: &mut Value, levels: &[&str], ids: &mut IdAllocator) {
    let Some(obj) = node.as_object_mut() else {
        return;
    };
    let has_id = obj.get("id").and_then(Value::as_i64).is_some();
    if !has_id {
        obj.insert("id".to_string(), Value::from(ids.alloc()));
    }
    let Some((child_key, rest)) = levels.split_first() else {
        return;
    };
    if let Some(children) = obj.get_mut(*child_key).and_then(Value::as_array_mut) {
        for child in children {
            assign_ids(child, rest, ids);
        }
    }
}

fn check_unique(ids: impl Iterator<Item = i64>, taken: &HashSet<i64>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if taken.contains(&id) || !seen.insert(id) {
            return Err(ValidationError::DuplicateId { id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_lesson_course() -> Course {
        serde_json::from_str(
            r#"{
                "id": 1, "title": "Python", "desc": "", "icon": "🐍",
                "chapters": [{
                    "id": 101, "title": "Intro", "lessons": [
                        { "id": 1001, "title": "What is Python?", "exercises": [
                            { "id": 5001, "type": "fill", "prompt": "p", "answer": "programming" }
                        ]},
                        { "id": 1002, "title": "Installing", "exercises": [] }
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lookups_return_none_for_missing_ids() {
        let course = two_lesson_course();
        let chapter = find_chapter(&course, 101).unwrap();
        assert!(find_lesson(chapter, 1001).is_some());
        assert!(find_lesson(chapter, 9999).is_none());
        assert!(find_chapter(&course, 999).is_none());
    }

    #[test]
    fn locate_exercise_walks_the_whole_forest() {
        let courses = vec![two_lesson_course()];
        let (lesson, exercise) = locate_exercise(&courses, 5001).unwrap();
        assert_eq!(lesson.id, 1001);
        assert_eq!(exercise.id, 5001);
        assert!(locate_exercise(&courses, 4242).is_none());
    }

    #[test]
    fn scope_collects_reachable_ids() {
        let course = two_lesson_course();
        let scope = scope_of_course(&course);
        assert_eq!(scope.chapters, HashSet::from([101]));
        assert_eq!(scope.lessons, HashSet::from([1001, 1002]));
        assert_eq!(scope.exercises, HashSet::from([5001]));
        assert_eq!(scope.srs_ids(), HashSet::from([1001, 1002, 5001]));
    }

    #[test]
    fn allocator_seeds_above_every_existing_id() {
        let state = AppState {
            courses: vec![two_lesson_course()],
            ..Default::default()
        };
        let mut ids = IdAllocator::seeded_from(&state);
        assert_eq!(ids.alloc(), 5002);
        assert_eq!(ids.alloc(), 5003);
    }

    #[test]
    fn import_assigns_ids_to_partial_items() {
        let json = r#"[{
            "title": "Learn Git",
            "chapters": [{
                "title": "Basics",
                "lessons": [{
                    "title": "Commits",
                    "exercises": [
                        { "type": "mcq", "prompt": "?", "options": ["a", "b"], "answer": 0 }
                    ]
                }]
            }]
        }]"#;
        let mut ids = IdAllocator::new();
        let courses = parse_courses(json, &mut ids, &IdIndex::default()).unwrap();
        let course = &courses[0];
        let exercise = &course.chapters[0].lessons[0].exercises[0];

        let mut all = HashSet::new();
        assert!(all.insert(course.id));
        assert!(all.insert(course.chapters[0].id));
        assert!(all.insert(course.chapters[0].lessons[0].id));
        assert!(all.insert(exercise.id));
    }

    #[test]
    fn import_keeps_ids_that_are_already_set() {
        let json = r#"[{ "id": 77, "title": "Learn Linux" }]"#;
        let mut ids = IdAllocator::new();
        let courses = parse_courses(json, &mut ids, &IdIndex::default()).unwrap();
        assert_eq!(courses[0].id, 77);
    }

    #[test]
    fn invalid_batch_is_rejected_whole() {
        // Second course has an out-of-range mcq answer.
        let json = r#"[
            { "title": "Good", "chapters": [] },
            { "title": "Bad", "chapters": [{ "title": "c", "lessons": [{
                "title": "l", "exercises": [
                    { "type": "mcq", "prompt": "?", "options": ["a", "b"], "answer": 5 }
                ]}]
            }]}
        ]"#;
        let err = parse_courses(json, &mut IdAllocator::new(), &IdIndex::default()).unwrap_err();
        assert!(matches!(err, ValidationError::AnswerOutOfRange { answer: 5, len: 2, .. }));
    }

    #[test]
    fn malformed_json_reports_a_reason() {
        let err = parse_courses("{ not json", &mut IdAllocator::new(), &IdIndex::default()).unwrap_err();
        assert!(matches!(err, ValidationError::Json(_)));
        let err = parse_courses("{}", &mut IdAllocator::new(), &IdIndex::default()).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnArray));
    }

    #[test]
    fn duplicate_ids_in_batch_are_rejected() {
        let json = r#"[{ "id": 5, "title": "a" }, { "id": 5, "title": "b" }]"#;
        let err = parse_courses(json, &mut IdAllocator::new(), &IdIndex::default()).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { id: 5 }));
    }

    #[test]
    fn import_rejects_ids_already_in_the_tree() {
        let existing: Vec<Course> = serde_json::from_str(
            r#"[{ "id": 7, "title": "Learn Git", "chapters": [{
                "id": 8, "title": "Basics", "lessons": [{
                    "id": 9, "title": "Commits", "exercises": [
                        { "id": 10, "type": "fill", "prompt": "?", "answer": "git" }
                    ]
                }]
            }]}]"#,
        )
        .unwrap();
        let index = IdIndex::from_courses(&existing);

        let err = parse_courses(
            r#"[{ "id": 7, "title": "Learn Git" }]"#,
            &mut IdAllocator::new(),
            &index,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { id: 7 }));

        // Nested levels collide too, not just the batch's own type.
        let err = parse_courses(
            r#"[{ "title": "Fresh", "chapters": [{ "id": 8, "title": "Shadow" }] }]"#,
            &mut IdAllocator::new(),
            &index,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { id: 8 }));

        let err = parse_exercises(
            r#"[{ "id": 10, "type": "fill", "prompt": "?", "answer": "x" }]"#,
            &mut IdAllocator::new(),
            &index,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { id: 10 }));
    }

    #[test]
    fn replacing_a_lesson_may_reuse_its_own_exercise_ids() {
        let existing: Vec<Course> = serde_json::from_str(
            r#"[{ "id": 7, "title": "Learn Git", "chapters": [{
                "id": 8, "title": "Basics", "lessons": [{
                    "id": 9, "title": "Commits", "exercises": [
                        { "id": 10, "type": "fill", "prompt": "?", "answer": "git" }
                    ]
                }]
            }]}]"#,
        )
        .unwrap();
        let mut index = IdIndex::from_courses(&existing);
        index.release_exercises(&existing[0].chapters[0].lessons[0]);

        let ok = parse_exercises(
            r#"[{ "id": 10, "type": "fill", "prompt": "?", "answer": "commit" }]"#,
            &mut IdAllocator::new(),
            &index,
        )
        .unwrap();
        assert_eq!(ok[0].id, 10);
    }

    #[test]
    fn exercise_validation_covers_every_variant() {
        let mut ids = IdAllocator::new();

        let err = parse_exercises(
            r#"[{ "type": "mcq", "prompt": "?", "options": ["only"], "answer": 0 }]"#,
            &mut ids,
            &IdIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::TooFewOptions { .. }));

        let err = parse_exercises(
            r#"[{ "type": "fill", "prompt": "?", "answer": "  " }]"#,
            &mut ids,
            &IdIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::EmptyAnswer { .. }));

        let err = parse_exercises(
            r#"[{ "type": "code", "prompt": "?", "solution": "" }]"#,
            &mut ids,
            &IdIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::EmptySolution { .. }));

        let err = parse_exercises(
            r#"[{ "type": "order", "prompt": "?", "items": ["a", "b"], "order": [0, 0] }]"#,
            &mut ids,
            &IdIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOrder { .. }));

        let ok = parse_exercises(
            r#"[{ "type": "drag", "prompt": "?", "items": ["a", "b", "c"], "order": [2, 0, 1] }]"#,
            &mut ids,
            &IdIndex::default(),
        )
        .unwrap();
        assert_eq!(ok.len(), 1);
    }
}

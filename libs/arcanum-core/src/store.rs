//! The state aggregate consumed by the view layer.
//!
//! `Store` owns the whole `AppState` plus an injected storage slot; every
//! mutation goes through a method here and is followed by a synchronous,
//! fire-and-forget save. There is no ambient global: view code constructs
//! one store and passes it around, which keeps everything underneath
//! testable against `MemorySlotStorage`.

use crate::content::{self, IdAllocator};
use crate::error::{Result, StoreError, ValidationError};
use crate::grading::{self, Answer};
use crate::progress::{self, OutcomeReport};
use crate::srs::BackoffSchedule;
use crate::storage::SlotStorage;
use crate::types::{
    AppState, Course, Outcome, Profile, ProfileExport, SrsItem, SrsKind,
};
use chrono::{DateTime, Utc};

/// Partial profile update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub theme: Option<String>,
}

/// Partial course update.
#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub icon: Option<String>,
}

/// Partial chapter update.
#[derive(Debug, Clone, Default)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub icon: Option<String>,
}

/// Partial lesson update.
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

pub struct Store {
    state: AppState,
    storage: Box<dyn SlotStorage>,
    ids: IdAllocator,
    backoff: BackoffSchedule,
}

impl Store {
    /// Load state from the slot, falling back to defaults when the slot is
    /// empty or corrupt.
    pub fn open(storage: Box<dyn SlotStorage>) -> Self {
        let state = storage.load().unwrap_or_default();
        let ids = IdAllocator::seeded_from(&state);
        Self {
            state,
            storage,
            ids,
            backoff: BackoffSchedule::default(),
        }
    }

    pub fn set_backoff(&mut self, backoff: BackoffSchedule) {
        self.backoff = backoff;
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn persist(&self) {
        if let Err(err) = self.storage.save(&self.state) {
            // A lost save risks only the latest mutation.
            log::warn!("state save failed: {err}");
        }
    }

    // ===== Profiles =====

    pub fn profiles(&self) -> &[Profile] {
        &self.state.profiles
    }

    pub fn profile(&self, id: i64) -> Option<&Profile> {
        self.state.profiles.iter().find(|p| p.id == id)
    }

    fn profile_mut(&mut self, id: i64) -> Result<&mut Profile> {
        self.state
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::ProfileNotFound(id))
    }

    /// The active profile: the selected one, else the first.
    pub fn selected_profile(&self) -> Option<&Profile> {
        self.profile(self.state.selected_profile_id)
            .or_else(|| self.state.profiles.first())
    }

    pub fn set_selected_profile(&mut self, id: i64) -> Result<()> {
        self.profile(id).ok_or(StoreError::ProfileNotFound(id))?;
        self.state.selected_profile_id = id;
        self.persist();
        Ok(())
    }

    pub fn create_profile(&mut self, name: &str, avatar: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingName.into());
        }
        let id = self.ids.alloc();
        self.state.profiles.push(Profile::new(id, name.trim(), avatar));
        self.persist();
        Ok(id)
    }

    /// Add pre-built profiles (bulk import). Each gets a fresh ID so an
    /// import can never collide with existing profiles.
    pub fn add_profiles(&mut self, profiles: Vec<Profile>) -> Vec<i64> {
        let mut assigned = Vec::with_capacity(profiles.len());
        for mut profile in profiles {
            profile.id = self.ids.alloc();
            assigned.push(profile.id);
            self.state.profiles.push(profile);
        }
        self.persist();
        assigned
    }

    pub fn edit_profile(&mut self, id: i64, patch: ProfilePatch) -> Result<()> {
        let profile = self.profile_mut(id)?;
        if let Some(name) = patch.name {
            profile.name = name;
        }
        if let Some(avatar) = patch.avatar {
            profile.avatar = avatar;
        }
        if let Some(theme) = patch.theme {
            profile.settings.theme = theme;
        }
        self.persist();
        Ok(())
    }

    /// Delete a profile and everything it owns, including its SRS queue.
    pub fn delete_profile(&mut self, id: i64) -> Result<()> {
        let before = self.state.profiles.len();
        self.state.profiles.retain(|p| p.id != id);
        if self.state.profiles.len() == before {
            return Err(StoreError::ProfileNotFound(id));
        }
        if self.state.selected_profile_id == id {
            self.state.selected_profile_id =
                self.state.profiles.first().map(|p| p.id).unwrap_or(0);
        }
        self.persist();
        Ok(())
    }

    // ===== Admin mode and app settings =====

    pub fn admin_mode(&self) -> bool {
        self.state.admin_mode
    }

    pub fn set_admin_mode(&mut self, on: bool) {
        self.state.admin_mode = on;
        self.persist();
    }

    pub fn set_app_theme(&mut self, theme: &str) {
        self.state.app_settings.theme = theme.to_string();
        self.persist();
    }

    // ===== Content authoring =====

    pub fn courses(&self) -> &[Course] {
        &self.state.courses
    }

    pub fn course(&self, id: i64) -> Option<&Course> {
        content::find_course(&self.state.courses, id)
    }

    /// Bulk-import courses from an authoring JSON array. Atomic: on any
    /// validation failure nothing is added.
    pub fn import_courses(&mut self, json: &str) -> Result<Vec<i64>> {
        let existing = content::IdIndex::from_courses(&self.state.courses);
        let courses = content::parse_courses(json, &mut self.ids, &existing)?;
        let added: Vec<i64> = courses.iter().map(|c| c.id).collect();
        self.state.courses.extend(courses);
        self.persist();
        Ok(added)
    }

    /// Append chapters to a course from an authoring JSON array.
    pub fn add_chapters(&mut self, course_id: i64, json: &str) -> Result<Vec<i64>> {
        let existing = content::IdIndex::from_courses(&self.state.courses);
        let chapters = content::parse_chapters(json, &mut self.ids, &existing)?;
        let course = content::find_course_mut(&mut self.state.courses, course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        let added: Vec<i64> = chapters.iter().map(|c| c.id).collect();
        course.chapters.extend(chapters);
        self.persist();
        Ok(added)
    }

    /// Append lessons to a chapter from an authoring JSON array.
    pub fn add_lessons(&mut self, course_id: i64, chapter_id: i64, json: &str) -> Result<Vec<i64>> {
        let existing = content::IdIndex::from_courses(&self.state.courses);
        let lessons = content::parse_lessons(json, &mut self.ids, &existing)?;
        let chapter = self.chapter_mut(course_id, chapter_id)?;
        let added: Vec<i64> = lessons.iter().map(|l| l.id).collect();
        chapter.lessons.extend(lessons);
        self.persist();
        Ok(added)
    }

    /// Replace a lesson's exercise list from the editor's JSON paste.
    pub fn set_lesson_exercises(
        &mut self,
        course_id: i64,
        chapter_id: i64,
        lesson_id: i64,
        json: &str,
    ) -> Result<()> {
        let mut existing = content::IdIndex::from_courses(&self.state.courses);
        if let Some((_, _, lesson)) = content::locate_lesson(&self.state.courses, lesson_id) {
            existing.release_exercises(lesson);
        }
        let exercises = content::parse_exercises(json, &mut self.ids, &existing)?;
        let chapter = self.chapter_mut(course_id, chapter_id)?;
        let lesson = content::find_lesson_mut(chapter, lesson_id)
            .ok_or(StoreError::LessonNotFound(lesson_id))?;
        lesson.exercises = exercises;
        self.persist();
        Ok(())
    }

    /// Edits validate against a patched copy before committing, so a
    /// rejected edit leaves the stored tree untouched.
    pub fn edit_course(&mut self, id: i64, patch: CoursePatch) -> Result<()> {
        let course = content::find_course_mut(&mut self.state.courses, id)
            .ok_or(StoreError::CourseNotFound(id))?;
        let mut updated = course.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(desc) = patch.desc {
            updated.desc = desc;
        }
        if let Some(icon) = patch.icon {
            updated.icon = icon;
        }
        content::validate_course(&updated)?;
        *course = updated;
        self.persist();
        Ok(())
    }

    pub fn edit_chapter(&mut self, course_id: i64, chapter_id: i64, patch: ChapterPatch) -> Result<()> {
        let chapter = self.chapter_mut(course_id, chapter_id)?;
        let mut updated = chapter.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(desc) = patch.desc {
            updated.desc = desc;
        }
        if let Some(icon) = patch.icon {
            updated.icon = icon;
        }
        content::validate_chapter(&updated)?;
        *chapter = updated;
        self.persist();
        Ok(())
    }

    pub fn edit_lesson(
        &mut self,
        course_id: i64,
        chapter_id: i64,
        lesson_id: i64,
        patch: LessonPatch,
    ) -> Result<()> {
        let chapter = self.chapter_mut(course_id, chapter_id)?;
        let lesson = content::find_lesson_mut(chapter, lesson_id)
            .ok_or(StoreError::LessonNotFound(lesson_id))?;
        let mut updated = lesson.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(content) = patch.content {
            updated.content = content;
        }
        content::validate_lesson(&updated)?;
        *lesson = updated;
        self.persist();
        Ok(())
    }

    /// Delete a course. SRS entries referencing its content are left in
    /// place and resolve to placeholders until a reset removes them.
    pub fn delete_course(&mut self, id: i64) -> Result<()> {
        let before = self.state.courses.len();
        self.state.courses.retain(|c| c.id != id);
        if self.state.courses.len() == before {
            return Err(StoreError::CourseNotFound(id));
        }
        self.persist();
        Ok(())
    }

    pub fn delete_chapter(&mut self, course_id: i64, chapter_id: i64) -> Result<()> {
        let course = content::find_course_mut(&mut self.state.courses, course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        let before = course.chapters.len();
        course.chapters.retain(|c| c.id != chapter_id);
        if course.chapters.len() == before {
            return Err(StoreError::ChapterNotFound(chapter_id));
        }
        self.persist();
        Ok(())
    }

    pub fn delete_lesson(&mut self, course_id: i64, chapter_id: i64, lesson_id: i64) -> Result<()> {
        let chapter = self.chapter_mut(course_id, chapter_id)?;
        let before = chapter.lessons.len();
        chapter.lessons.retain(|l| l.id != lesson_id);
        if chapter.lessons.len() == before {
            return Err(StoreError::LessonNotFound(lesson_id));
        }
        self.persist();
        Ok(())
    }

    fn chapter_mut(&mut self, course_id: i64, chapter_id: i64) -> Result<&mut crate::types::Chapter> {
        let course = content::find_course_mut(&mut self.state.courses, course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        content::find_chapter_mut(course, chapter_id).ok_or(StoreError::ChapterNotFound(chapter_id))
    }

    // ===== Progress and review =====

    /// Grade an answer, record the outcome, and propagate completion.
    pub fn submit_answer(
        &mut self,
        profile_id: i64,
        lesson_id: i64,
        exercise_id: i64,
        answer: &Answer,
        now: DateTime<Utc>,
    ) -> Result<(Outcome, OutcomeReport)> {
        let (course, chapter, lesson) = content::locate_lesson(&self.state.courses, lesson_id)
            .ok_or(StoreError::LessonNotFound(lesson_id))?;
        let exercise = content::find_exercise(lesson, exercise_id)
            .ok_or(StoreError::ExerciseNotFound(exercise_id))?;
        let outcome = grading::grade(exercise, answer)?;
        let profile = self
            .state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        let report = progress::record_exercise_outcome(
            profile,
            course,
            chapter,
            lesson,
            exercise,
            outcome,
            &self.backoff,
            now,
        );
        self.persist();
        Ok((outcome, report))
    }

    /// Record an already-graded outcome (the UI grades code exercises
    /// client-side in some flows).
    pub fn record_outcome(
        &mut self,
        profile_id: i64,
        lesson_id: i64,
        exercise_id: i64,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<OutcomeReport> {
        let (course, chapter, lesson) = content::locate_lesson(&self.state.courses, lesson_id)
            .ok_or(StoreError::LessonNotFound(lesson_id))?;
        let exercise = content::find_exercise(lesson, exercise_id)
            .ok_or(StoreError::ExerciseNotFound(exercise_id))?;
        let profile = self
            .state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        let report = progress::record_exercise_outcome(
            profile,
            course,
            chapter,
            lesson,
            exercise,
            outcome,
            &self.backoff,
            now,
        );
        self.persist();
        Ok(report)
    }

    /// Items due for review, soonest first. A brand-new profile simply has
    /// an empty queue.
    pub fn due_reviews(&self, profile_id: i64, now: DateTime<Utc>) -> Result<Vec<SrsItem>> {
        let profile = self
            .profile(profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        Ok(profile.srs_queue.due(now).into_iter().cloned().collect())
    }

    /// Apply a review outcome to a queue item.
    pub fn review_item(
        &mut self,
        profile_id: i64,
        item_id: i64,
        kind: SrsKind,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Option<SrsItem>> {
        let backoff = self.backoff.clone();
        let profile = self.profile_mut(profile_id)?;
        let item = profile
            .srs_queue
            .schedule(item_id, kind, outcome, &backoff, now)
            .cloned();
        self.persist();
        Ok(item)
    }

    pub fn reset_course_progress(&mut self, profile_id: i64, course_id: i64) -> Result<()> {
        let course = content::find_course(&self.state.courses, course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        let profile = self
            .state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        progress::reset_course_progress(profile, course);
        self.persist();
        Ok(())
    }

    pub fn reset_chapter_progress(
        &mut self,
        profile_id: i64,
        course_id: i64,
        chapter_id: i64,
    ) -> Result<()> {
        let course = content::find_course(&self.state.courses, course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        let chapter = content::find_chapter(course, chapter_id)
            .ok_or(StoreError::ChapterNotFound(chapter_id))?;
        let profile = self
            .state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        progress::reset_chapter_progress(profile, course, chapter);
        self.persist();
        Ok(())
    }

    pub fn reset_all_progress(&mut self, profile_id: i64) -> Result<()> {
        let profile = self.profile_mut(profile_id)?;
        progress::reset_all_progress(profile);
        self.persist();
        Ok(())
    }

    // ===== Import / export =====

    /// Whole-state export, pretty-printed for sharing.
    pub fn export_state(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.state)
            .map_err(|e| ValidationError::Json(e.to_string()).into())
    }

    /// Replace the whole state from an exported document.
    pub fn import_state(&mut self, json: &str) -> Result<()> {
        let state: AppState =
            serde_json::from_str(json).map_err(|e| ValidationError::Json(e.to_string()))?;
        self.state = state;
        self.ids = IdAllocator::seeded_from(&self.state);
        self.persist();
        Ok(())
    }

    /// Export one learner's record bundled with the content needed to
    /// interpret it.
    pub fn export_profile(&self, profile_id: i64) -> Result<String> {
        let profile = self
            .profile(profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        let bundle = ProfileExport {
            profile: profile.clone(),
            courses: self.state.courses.clone(),
        };
        serde_json::to_string_pretty(&bundle)
            .map_err(|e| ValidationError::Json(e.to_string()).into())
    }

    /// Import a profile bundle. The profile gets a fresh ID; bundled
    /// courses are added only when their ID is not already present.
    pub fn import_profile(&mut self, json: &str) -> Result<i64> {
        let bundle: ProfileExport =
            serde_json::from_str(json).map_err(|e| ValidationError::Json(e.to_string()))?;
        for course in bundle.courses {
            if content::find_course(&self.state.courses, course.id).is_none() {
                self.state.courses.push(course);
            }
        }
        // Imported content may carry IDs above anything allocated so far.
        self.ids = IdAllocator::seeded_from(&self.state);
        let mut profile = bundle.profile;
        profile.id = self.ids.alloc();
        let id = profile.id;
        self.state.profiles.push(profile);
        self.persist();
        Ok(id)
    }
}

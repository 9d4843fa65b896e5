//! Completion propagation: exercise outcome → lesson → chapter → course.
//!
//! Completion percentages are derived views recomputed from
//! `completedLessons` and the content tree on every read; nothing here
//! stores a percentage.

use crate::content::{self, Scope};
use crate::gamification::{
    award_xp, sync_achievements, touch_streak, XP_EXERCISE_SUCCESS, XP_LESSON_COMPLETE,
};
use crate::srs::BackoffSchedule;
use crate::types::{Chapter, Course, Exercise, Lesson, LogEntry, Outcome, Profile, SrsKind};
use chrono::{DateTime, Utc};

/// What a recorded outcome changed, for the view layer to announce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeReport {
    pub lesson_completed: bool,
    pub chapter_completed: bool,
    pub course_completed: bool,
    pub xp_awarded: i64,
    pub new_achievements: Vec<i64>,
}

/// Record an exercise attempt and propagate its consequences.
///
/// Success appends at most one success log entry per (lesson, exercise
/// type) and enrolls or advances the exercise in the SRS queue. When the
/// exercise is the lesson's last by display order, the lesson is marked
/// complete (idempotently), enrolled itself, and chapter and course
/// completion cascade. Failure only appends a log entry; a failed first
/// attempt never touches the queue.
pub fn record_exercise_outcome(
    profile: &mut Profile,
    course: &Course,
    chapter: &Chapter,
    lesson: &Lesson,
    exercise: &Exercise,
    outcome: Outcome,
    backoff: &BackoffSchedule,
    now: DateTime<Utc>,
) -> OutcomeReport {
    let mut report = OutcomeReport::default();

    if outcome == Outcome::Fail {
        profile.exercise_log.push(LogEntry {
            lesson_id: lesson.id,
            kind: exercise.kind(),
            status: Outcome::Fail,
            timestamp: now,
        });
        return report;
    }

    let already_logged = profile.exercise_log.iter().any(|e| {
        e.lesson_id == lesson.id && e.kind == exercise.kind() && e.status == Outcome::Success
    });
    if !already_logged {
        profile.exercise_log.push(LogEntry {
            lesson_id: lesson.id,
            kind: exercise.kind(),
            status: Outcome::Success,
            timestamp: now,
        });
        award_xp(profile, XP_EXERCISE_SUCCESS);
        report.xp_awarded += XP_EXERCISE_SUCCESS;
    }

    profile
        .srs_queue
        .schedule(exercise.id, SrsKind::Exercise, Outcome::Success, backoff, now);
    touch_streak(profile, now);

    let is_last = lesson.exercises.last().map(|e| e.id) == Some(exercise.id);
    if is_last {
        if insert_unique(&mut profile.completed_lessons, lesson.id) {
            report.lesson_completed = true;
            award_xp(profile, XP_LESSON_COMPLETE);
            report.xp_awarded += XP_LESSON_COMPLETE;
        }
        profile
            .srs_queue
            .schedule(lesson.id, SrsKind::Lesson, Outcome::Success, backoff, now);

        let chapter_done = !chapter.lessons.is_empty()
            && chapter
                .lessons
                .iter()
                .all(|l| profile.completed_lessons.contains(&l.id));
        if chapter_done && insert_unique(&mut profile.completed_chapters, chapter.id) {
            report.chapter_completed = true;
        }

        let course_done = course_progress(profile, course).is_complete();
        if course_done && insert_unique(&mut profile.completed_courses, course.id) {
            report.course_completed = true;
        }
    }

    report.new_achievements = sync_achievements(profile);
    report
}

/// Completed/total lessons under a node, with a display percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
}

impl ProgressSummary {
    fn from_counts(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            (100.0 * completed as f64 / total as f64).round() as u32
        };
        Self {
            completed,
            total,
            percent,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

pub fn chapter_progress(profile: &Profile, chapter: &Chapter) -> ProgressSummary {
    let completed = chapter
        .lessons
        .iter()
        .filter(|l| profile.completed_lessons.contains(&l.id))
        .count();
    ProgressSummary::from_counts(completed, chapter.lessons.len())
}

pub fn course_progress(profile: &Profile, course: &Course) -> ProgressSummary {
    let mut completed = 0;
    let mut total = 0;
    for chapter in &course.chapters {
        let summary = chapter_progress(profile, chapter);
        completed += summary.completed;
        total += summary.total;
    }
    ProgressSummary::from_counts(completed, total)
}

/// Remove every progress trace reachable from `chapter`: completed
/// lessons, log entries, and SRS items in the chapter's scope, plus the
/// chapter's own completion mark and the parent course's (the course can
/// no longer be complete). Sibling chapters are untouched. The profile is
/// mutated in one step; no partial-reset state is observable.
pub fn reset_chapter_progress(profile: &mut Profile, course: &Course, chapter: &Chapter) {
    let scope = content::scope_of_chapter(chapter);
    apply_reset(profile, &scope);
    profile.completed_courses.retain(|&id| id != course.id);
}

/// Remove every progress trace reachable from `course`.
pub fn reset_course_progress(profile: &mut Profile, course: &Course) {
    let scope = content::scope_of_course(course);
    apply_reset(profile, &scope);
    profile.completed_courses.retain(|&id| id != course.id);
}

/// Wipe the profile's progress entirely. Gamification stats and earned
/// achievements stay.
pub fn reset_all_progress(profile: &mut Profile) {
    profile.completed_lessons.clear();
    profile.completed_chapters.clear();
    profile.completed_courses.clear();
    profile.exercise_log.clear();
    profile.srs_queue.clear();
}

fn apply_reset(profile: &mut Profile, scope: &Scope) {
    profile
        .completed_lessons
        .retain(|id| !scope.lessons.contains(id));
    profile
        .completed_chapters
        .retain(|id| !scope.chapters.contains(id));
    profile
        .exercise_log
        .retain(|e| !scope.lessons.contains(&e.lesson_id));
    let removed = profile.srs_queue.remove_ids(&scope.srs_ids());
    log::debug!(
        "reset removed {removed} srs items for profile {}",
        profile.id
    );
}

fn insert_unique(set: &mut Vec<i64>, id: i64) -> bool {
    if set.contains(&id) {
        false
    } else {
        set.push(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExerciseBody;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
    }

    fn fill(id: i64) -> Exercise {
        Exercise {
            id,
            body: ExerciseBody::Fill {
                prompt: "p".into(),
                answer: "a".into(),
            },
        }
    }

    fn mcq(id: i64) -> Exercise {
        Exercise {
            id,
            body: ExerciseBody::Mcq {
                prompt: "p".into(),
                options: vec!["x".into(), "y".into()],
                answer: 0,
            },
        }
    }

    fn lesson(id: i64, exercises: Vec<Exercise>) -> Lesson {
        Lesson {
            id,
            title: format!("Lesson {id}"),
            content: String::new(),
            exercises,
        }
    }

    fn chapter(id: i64, lessons: Vec<Lesson>) -> Chapter {
        Chapter {
            id,
            title: format!("Chapter {id}"),
            desc: String::new(),
            icon: String::new(),
            lessons,
            resources: vec![],
            questions: vec![],
        }
    }

    /// Two chapters: 101 has lessons 1001 (two exercises) and 1002 (one),
    /// 102 has lesson 1003 (one).
    fn course() -> Course {
        Course {
            id: 1,
            title: "Python".into(),
            desc: String::new(),
            icon: String::new(),
            chapters: vec![
                chapter(
                    101,
                    vec![
                        lesson(1001, vec![mcq(5001), fill(5002)]),
                        lesson(1002, vec![fill(5003)]),
                    ],
                ),
                chapter(102, vec![lesson(1003, vec![fill(5004)])]),
            ],
        }
    }

    fn record(
        profile: &mut Profile,
        course: &Course,
        lesson_id: i64,
        exercise_id: i64,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> OutcomeReport {
        let (c, ch, l) = content::locate_lesson(std::slice::from_ref(course), lesson_id).unwrap();
        let e = content::find_exercise(l, exercise_id).unwrap();
        record_exercise_outcome(
            profile,
            c,
            ch,
            l,
            e,
            outcome,
            &BackoffSchedule::default(),
            now,
        )
    }

    #[test]
    fn duplicate_success_logs_and_enrolls_once() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        record(&mut profile, &course, 1001, 5001, Outcome::Success, t0());
        record(&mut profile, &course, 1001, 5001, Outcome::Success, t0());

        let successes = profile
            .exercise_log
            .iter()
            .filter(|e| e.status == Outcome::Success)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(profile.srs_queue.len(), 1);
    }

    #[test]
    fn failure_only_logs() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        record(&mut profile, &course, 1001, 5001, Outcome::Fail, t0());
        record(&mut profile, &course, 1001, 5001, Outcome::Fail, t0());

        assert_eq!(profile.exercise_log.len(), 2);
        assert!(profile.srs_queue.is_empty());
        assert!(profile.completed_lessons.is_empty());
        assert_eq!(profile.xp, 0);
    }

    #[test]
    fn last_exercise_completes_the_lesson_exactly_once() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        // First exercise alone does not complete the lesson.
        let report = record(&mut profile, &course, 1001, 5001, Outcome::Success, t0());
        assert!(!report.lesson_completed);
        assert!(profile.completed_lessons.is_empty());

        let report = record(&mut profile, &course, 1001, 5002, Outcome::Success, t0());
        assert!(report.lesson_completed);
        assert_eq!(profile.completed_lessons, vec![1001]);
        // Lesson itself is now enrolled for review.
        assert!(profile.srs_queue.get(1001, SrsKind::Lesson).is_some());

        let report = record(&mut profile, &course, 1001, 5002, Outcome::Success, t0());
        assert!(!report.lesson_completed);
        assert_eq!(profile.completed_lessons, vec![1001]);
    }

    #[test]
    fn completion_cascades_to_chapter_and_course() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        record(&mut profile, &course, 1001, 5002, Outcome::Success, t0());
        let report = record(&mut profile, &course, 1002, 5003, Outcome::Success, t0());
        assert!(report.chapter_completed);
        assert!(!report.course_completed);
        assert_eq!(profile.completed_chapters, vec![101]);

        let report = record(&mut profile, &course, 1003, 5004, Outcome::Success, t0());
        assert!(report.chapter_completed);
        assert!(report.course_completed);
        assert_eq!(profile.completed_courses, vec![1]);
    }

    #[test]
    fn percent_is_recomputed_from_completed_lessons() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        assert_eq!(course_progress(&profile, &course).percent, 0);

        profile.completed_lessons = vec![1001, 1003];
        let summary = course_progress(&profile, &course);
        assert_eq!((summary.completed, summary.total, summary.percent), (2, 3, 67));

        let first_chapter = &course.chapters[0];
        assert_eq!(chapter_progress(&profile, first_chapter).percent, 50);

        // Empty chapter reads as zero, not a division error.
        let empty = chapter(999, vec![]);
        assert_eq!(chapter_progress(&profile, &empty).percent, 0);
    }

    #[test]
    fn chapter_reset_spares_sibling_chapters() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        record(&mut profile, &course, 1001, 5002, Outcome::Success, t0());
        record(&mut profile, &course, 1002, 5003, Outcome::Success, t0());
        record(&mut profile, &course, 1003, 5004, Outcome::Success, t0());
        assert_eq!(profile.completed_courses, vec![1]);

        reset_chapter_progress(&mut profile, &course, &course.chapters[0]);

        assert_eq!(profile.completed_lessons, vec![1003]);
        assert_eq!(profile.completed_chapters, vec![102]);
        // Course is no longer complete.
        assert!(profile.completed_courses.is_empty());
        assert!(profile.exercise_log.iter().all(|e| e.lesson_id == 1003));
        assert!(profile.srs_queue.get(1003, SrsKind::Lesson).is_some());
        assert!(profile.srs_queue.get(5004, SrsKind::Exercise).is_some());
        assert!(profile.srs_queue.get(1001, SrsKind::Lesson).is_none());
        assert!(profile.srs_queue.get(5002, SrsKind::Exercise).is_none());
    }

    #[test]
    fn course_reset_clears_everything_reachable() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");
        record(&mut profile, &course, 1001, 5002, Outcome::Success, t0());
        record(&mut profile, &course, 1003, 5004, Outcome::Success, t0());

        reset_course_progress(&mut profile, &course);

        assert!(profile.completed_lessons.is_empty());
        assert!(profile.completed_chapters.is_empty());
        assert!(profile.completed_courses.is_empty());
        assert!(profile.exercise_log.is_empty());
        assert!(profile.srs_queue.is_empty());
    }

    #[test]
    fn success_awards_xp_and_achievements() {
        let course = course();
        let mut profile = Profile::new(1, "Demo User", "");

        let report = record(&mut profile, &course, 1002, 5003, Outcome::Success, t0());
        assert!(report.lesson_completed);
        assert_eq!(report.xp_awarded, XP_EXERCISE_SUCCESS + XP_LESSON_COMPLETE);
        assert_eq!(profile.xp, 60);
        assert_eq!(profile.streak, 1);
        // First completed lesson unlocks achievement 1.
        assert_eq!(report.new_achievements, vec![1]);
    }
}

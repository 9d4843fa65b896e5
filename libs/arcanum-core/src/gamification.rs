//! XP, levels, streaks, and achievements.

use crate::types::Profile;
use chrono::{DateTime, Duration, Utc};

/// XP for a first successful attempt at an exercise.
pub const XP_EXERCISE_SUCCESS: i64 = 10;
/// XP for completing a lesson.
pub const XP_LESSON_COMPLETE: i64 = 50;

/// Add XP, rolling over into level-ups. The threshold grows by half each
/// level (100, 150, 225, ...), starting from the new-profile value of 100.
pub fn award_xp(profile: &mut Profile, amount: i64) {
    profile.xp += amount;
    while profile.xp_to_next > 0 && profile.xp >= profile.xp_to_next {
        profile.xp -= profile.xp_to_next;
        profile.level += 1;
        profile.xp_to_next = profile.xp_to_next * 3 / 2;
        log::debug!("profile {} reached level {}", profile.id, profile.level);
    }
}

/// Register learning activity for streak purposes. Consecutive UTC days
/// extend the streak; a gap restarts it at 1; repeat activity on the same
/// day changes nothing.
pub fn touch_streak(profile: &mut Profile, now: DateTime<Utc>) {
    let today = now.date_naive();
    match profile.last_active {
        Some(day) if day == today => return,
        Some(day) if day + Duration::days(1) == today => profile.streak += 1,
        _ => profile.streak = 1,
    }
    profile.last_active = Some(today);
}

struct Achievement {
    id: i64,
    earned: fn(&Profile) -> bool,
}

fn first_lesson(p: &Profile) -> bool {
    !p.completed_lessons.is_empty()
}
fn ten_lessons(p: &Profile) -> bool {
    p.completed_lessons.len() >= 10
}
fn twenty_five_lessons(p: &Profile) -> bool {
    p.completed_lessons.len() >= 25
}
fn streak_3(p: &Profile) -> bool {
    p.streak >= 3
}
fn streak_7(p: &Profile) -> bool {
    p.streak >= 7
}
fn level_5(p: &Profile) -> bool {
    p.level >= 5
}

/// Badge thresholds, in award order. IDs are stable; the view layer owns
/// names and icons.
const ACHIEVEMENTS: &[Achievement] = &[
    Achievement { id: 1, earned: first_lesson },
    Achievement { id: 2, earned: streak_3 },
    Achievement { id: 3, earned: streak_7 },
    Achievement { id: 4, earned: ten_lessons },
    Achievement { id: 5, earned: twenty_five_lessons },
    Achievement { id: 6, earned: level_5 },
];

/// Append any newly earned achievement IDs. Already-earned badges are kept
/// even if the underlying stat later drops (a reset does not revoke them).
pub fn sync_achievements(profile: &mut Profile) -> Vec<i64> {
    let mut earned = Vec::new();
    for achievement in ACHIEVEMENTS {
        if !profile.achievements.contains(&achievement.id) && (achievement.earned)(profile) {
            profile.achievements.push(achievement.id);
            earned.push(achievement.id);
        }
    }
    earned
}

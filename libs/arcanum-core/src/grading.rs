//! Answer grading for each exercise variant.

use crate::error::GradeError;
use crate::types::{Exercise, ExerciseBody, Outcome};

/// A learner's answer, mirroring the exercise variants. Drag and order
/// exercises share one arrangement shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Code { source: String },
    Mcq { selected: usize },
    Fill { text: String },
    Arrangement { order: Vec<usize> },
}

/// Grade an answer against an exercise.
///
/// Returns `Err` only when the answer shape does not fit the exercise
/// type; a wrong answer is `Ok(Outcome::Fail)`.
pub fn grade(exercise: &Exercise, answer: &Answer) -> Result<Outcome, GradeError> {
    let correct = match (&exercise.body, answer) {
        (ExerciseBody::Code { solution, .. }, Answer::Code { source }) => {
            code_matches(solution, source)
        }
        (ExerciseBody::Mcq { answer: expected, .. }, Answer::Mcq { selected }) => {
            selected == expected
        }
        (ExerciseBody::Fill { answer: expected, .. }, Answer::Fill { text }) => {
            text.trim().eq_ignore_ascii_case(expected.trim())
        }
        (ExerciseBody::Drag { order: expected, .. }, Answer::Arrangement { order })
        | (ExerciseBody::Order { order: expected, .. }, Answer::Arrangement { order }) => {
            order == expected
        }
        _ => {
            return Err(GradeError {
                expected: exercise.kind(),
            })
        }
    };
    Ok(Outcome::from_correct(correct))
}

/// Substring heuristic for code answers: every identifier-like token of
/// the solution must appear in the submission. The code is never executed.
fn code_matches(solution: &str, submission: &str) -> bool {
    let tokens = solution_tokens(solution);
    if tokens.is_empty() {
        return !submission.trim().is_empty();
    }
    tokens.iter().all(|t| submission.contains(t))
}

fn solution_tokens(solution: &str) -> Vec<&str> {
    solution
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .collect()
}

use std::thread;

use super::common::*;
use crate::workflows::enrollment::curriculum::{recompute_availability, PASSING_SCORE};
use crate::workflows::enrollment::domain::{
    CourseKind, CourseStatus, EnrollmentStatus, ExamStatus, UserRole,
};
use crate::workflows::enrollment::repository::{CourseStore, EnrollmentStore};
use crate::workflows::enrollment::service::WorkflowError;

#[test]
fn sessions_are_rejected_on_locked_courses() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let park = harness.curriculum_of(&enrollment)[1].clone();

    match harness.courses.complete_session(&manager, &park.id) {
        Err(WorkflowError::InvalidState(_)) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn sessions_are_rejected_for_students() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    match harness.courses.complete_session(&student, &theory.id) {
        Err(WorkflowError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn first_session_starts_the_course() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    let progress = harness
        .courses
        .complete_session(&manager, &theory.id)
        .expect("session recorded");
    assert_eq!(progress.completed_sessions, 1);
    assert!(!progress.course_completed);

    let refreshed = harness
        .platform
        .find_course(&theory.id)
        .expect("lookup succeeds")
        .expect("course present");
    assert_eq!(refreshed.status, CourseStatus::InProgress);
}

#[test]
fn reaching_the_total_completes_the_course_and_opens_the_exam() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    harness.finish_course_sessions(&manager, &theory);

    let refreshed = harness
        .platform
        .find_course(&theory.id)
        .expect("lookup succeeds")
        .expect("course present");
    assert_eq!(refreshed.status, CourseStatus::Completed);
    assert_eq!(refreshed.completed_sessions, 10);
    assert_eq!(refreshed.exam_status, ExamStatus::Available);

    // The counter never runs past the total.
    match harness.courses.complete_session(&manager, &theory.id) {
        Err(WorkflowError::InvalidState(_)) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn concurrent_session_recording_never_loses_a_count() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    thread::scope(|scope| {
        for _ in 0..5 {
            let courses = &harness.courses;
            let manager = manager.clone();
            let course_id = theory.id.clone();
            scope.spawn(move || {
                courses
                    .complete_session(&manager, &course_id)
                    .expect("session recorded");
            });
        }
    });

    let refreshed = harness
        .platform
        .find_course(&theory.id)
        .expect("lookup succeeds")
        .expect("course present");
    assert_eq!(refreshed.completed_sessions, 5);
}

#[test]
fn exams_are_rejected_until_available() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    match harness.courses.take_exam(&student, &theory.id, 95.0) {
        Err(WorkflowError::InvalidState(_)) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn pass_mark_is_inclusive_at_seventy() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();
    harness.finish_course_sessions(&manager, &theory);

    let outcome = harness
        .courses
        .take_exam(&student, &theory.id, PASSING_SCORE)
        .expect("exam submission succeeds");
    assert!(outcome.passed);

    let outcome = harness
        .courses
        .take_exam(&student, &theory.id, 69.9)
        .expect("resubmission succeeds");
    assert!(!outcome.passed);

    let refreshed = harness
        .platform
        .find_course(&theory.id)
        .expect("lookup succeeds")
        .expect("course present");
    assert_eq!(refreshed.exam_status, ExamStatus::Failed);
    assert_eq!(refreshed.exam_score, Some(69.9));
}

#[test]
fn passing_an_exam_unlocks_the_next_stage() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let courses = harness.curriculum_of(&enrollment);
    harness.finish_course_sessions(&manager, &courses[0]);

    harness
        .courses
        .take_exam(&student, &courses[0].id, 85.0)
        .expect("exam submission succeeds");

    let refreshed = harness.curriculum_of(&enrollment);
    assert_eq!(refreshed[1].status, CourseStatus::Available);
    assert_eq!(refreshed[2].status, CourseStatus::Locked);
}

#[test]
fn failing_a_resubmission_relocks_downstream_stages() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let courses = harness.curriculum_of(&enrollment);
    harness.finish_course_sessions(&manager, &courses[0]);
    harness
        .courses
        .take_exam(&student, &courses[0].id, 85.0)
        .expect("exam submission succeeds");

    // Park is open; a failed theory resubmission takes it back.
    harness
        .courses
        .take_exam(&student, &courses[0].id, 40.0)
        .expect("resubmission succeeds");

    let refreshed = harness.curriculum_of(&enrollment);
    assert_eq!(refreshed[0].exam_status, ExamStatus::Failed);
    assert_eq!(refreshed[1].status, CourseStatus::Locked);
}

#[test]
fn recomputation_is_idempotent() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let courses = harness.curriculum_of(&enrollment);
    harness.finish_course_sessions(&manager, &courses[0]);
    harness
        .courses
        .take_exam(&student, &courses[0].id, 85.0)
        .expect("exam submission succeeds");

    let first_pass = harness.curriculum_of(&enrollment);
    recompute_availability(harness.platform.as_ref(), &enrollment.id)
        .expect("recomputation succeeds");
    let second_pass = harness.curriculum_of(&enrollment);

    let states = |courses: &[crate::workflows::enrollment::domain::Course]| {
        courses
            .iter()
            .map(|course| (course.kind, course.status, course.exam_status))
            .collect::<Vec<_>>()
    };
    assert_eq!(states(&first_pass), states(&second_pass));
}

#[test]
fn passing_every_exam_completes_the_enrollment() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let courses = harness.curriculum_of(&enrollment);

    let scores = [85.0, 90.0, 75.0];
    let mut last_outcome = None;
    for (course, score) in courses.iter().zip(scores) {
        harness.finish_course_sessions(&manager, course);
        last_outcome = Some(
            harness
                .courses
                .take_exam(&student, &course.id, score)
                .expect("exam submission succeeds"),
        );
    }

    let outcome = last_outcome.expect("road exam was taken");
    assert_eq!(outcome.kind, CourseKind::Road);
    assert!(outcome.passed);
    assert!(outcome.license_earned);

    let refreshed = harness
        .platform
        .find_enrollment(&enrollment.id)
        .expect("lookup succeeds")
        .expect("enrollment present");
    assert_eq!(refreshed.status, EnrollmentStatus::Completed);
}

#[test]
fn exam_submissions_by_non_students_are_rejected() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();
    harness.finish_course_sessions(&manager, &theory);

    match harness.courses.take_exam(&manager, &theory.id, 90.0) {
        Err(WorkflowError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn course_details_are_restricted_to_participants() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    let stranger = harness.seed_account("stranger@example.com", UserRole::Student);

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();

    let details = harness
        .courses
        .course_details(&student, &theory.id)
        .expect("owner can view");
    assert_eq!(details.course.id, theory.id);
    assert_eq!(details.enrollment.id, enrollment.id);
    assert_eq!(details.school.as_ref().map(|s| s.id.clone()), Some(school.id));

    match harness.courses.course_details(&stranger, &theory.id) {
        Err(WorkflowError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

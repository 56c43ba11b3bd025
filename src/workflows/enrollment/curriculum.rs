use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::domain::{
    Actor, Course, CourseId, CourseKind, CourseStatus, Enrollment, EnrollmentId, EnrollmentStatus,
    ExamStatus, School, UserRole,
};
use super::repository::{CourseStore, PlatformStore, RepositoryError};
use super::service::WorkflowError;

/// Inclusive pass mark for every curriculum exam.
pub const PASSING_SCORE: f64 = 70.0;

/// Create the fixed three-stage curriculum for a new enrollment: theory,
/// park, road with their fixed session totals. Only the first stage starts
/// available. The batch is persisted atomically; a partial curriculum is
/// never observable.
pub fn create_courses<R>(
    store: &R,
    enrollment_id: &EnrollmentId,
) -> Result<Vec<Course>, RepositoryError>
where
    R: CourseStore + ?Sized,
{
    let courses: Vec<Course> = CourseKind::ordered()
        .into_iter()
        .enumerate()
        .map(|(index, kind)| {
            let status = if index == 0 {
                CourseStatus::Available
            } else {
                CourseStatus::Locked
            };
            Course::new(enrollment_id.clone(), kind, status)
        })
        .collect();

    store.insert_courses(&courses)?;
    Ok(courses)
}

/// Recompute which stages of an enrollment are unlocked, purely from exam
/// outcomes. The first stage is promoted out of `locked` and never re-locked
/// here. Every later stage is available iff its predecessor's exam is
/// passed; otherwise it is forced back to `locked`, reversing any earlier
/// unlock. Idempotent. Writes go through the versioned CAS and the whole
/// pass retries on a concurrent update.
pub fn recompute_availability<R>(
    store: &R,
    enrollment_id: &EnrollmentId,
) -> Result<(), RepositoryError>
where
    R: CourseStore + ?Sized,
{
    loop {
        let mut courses = store.list_courses_by_enrollment(enrollment_id)?;
        courses.sort_by_key(|course| course.kind.sequence_index());

        let mut stale = false;
        for index in 0..courses.len() {
            let desired = if index == 0 {
                (courses[0].status == CourseStatus::Locked).then_some(CourseStatus::Available)
            } else if courses[index - 1].exam_status == ExamStatus::Passed {
                (courses[index].status == CourseStatus::Locked)
                    .then_some(CourseStatus::Available)
            } else {
                (courses[index].status != CourseStatus::Locked).then_some(CourseStatus::Locked)
            };

            if let Some(status) = desired {
                let mut updated = courses[index].clone();
                updated.status = status;
                updated.updated_at = Utc::now();
                match store.update_course(updated, courses[index].version) {
                    Ok(()) => {}
                    Err(RepositoryError::StaleWrite) => {
                        stale = true;
                        break;
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        if !stale {
            return Ok(());
        }
    }
}

/// Progress report for a counted session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionProgress {
    pub course_id: CourseId,
    pub kind: CourseKind,
    pub completed_sessions: u32,
    pub total_sessions: u32,
    pub course_completed: bool,
    pub exam_available: bool,
}

impl SessionProgress {
    pub fn remaining_sessions(&self) -> u32 {
        self.total_sessions.saturating_sub(self.completed_sessions)
    }
}

/// Outcome of a scored exam submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamOutcome {
    pub course_id: CourseId,
    pub kind: CourseKind,
    pub score: f64,
    pub passed: bool,
    /// True once every stage of the enrollment has a passed exam.
    pub license_earned: bool,
}

/// View assembled for the course detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetails {
    pub course: Course,
    pub enrollment: Enrollment,
    pub school: Option<School>,
}

/// Per-course state machine: session counting and exam submission, with the
/// sequencer recomputation hanging off every exam result.
pub struct CourseService<R> {
    repository: Arc<R>,
}

impl<R> CourseService<R>
where
    R: PlatformStore + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Count one completed session. Locked stages reject outright; an
    /// available stage first moves to in-progress. Reaching the session
    /// total completes the stage and opens its exam. The read-increment-write
    /// runs under the CAS retry loop so concurrent calls never lose a count.
    pub fn complete_session(
        &self,
        actor: &Actor,
        course_id: &CourseId,
    ) -> Result<SessionProgress, WorkflowError> {
        if !matches!(actor.role, UserRole::Teacher | UserRole::Manager) {
            return Err(WorkflowError::Forbidden(
                "only teachers and managers can record sessions",
            ));
        }

        loop {
            let course = self
                .repository
                .find_course(course_id)?
                .ok_or(WorkflowError::NotFound("course"))?;

            match course.status {
                CourseStatus::Locked => {
                    return Err(WorkflowError::InvalidState(
                        "course is locked, complete the previous course first",
                    ));
                }
                CourseStatus::Completed => {
                    return Err(WorkflowError::InvalidState(
                        "course already has all sessions completed",
                    ));
                }
                CourseStatus::Available | CourseStatus::InProgress | CourseStatus::Failed => {}
            }

            let mut updated = course.clone();
            updated.completed_sessions += 1;
            if updated.completed_sessions >= updated.total_sessions {
                updated.status = CourseStatus::Completed;
                updated.exam_status = ExamStatus::Available;
            } else {
                updated.status = CourseStatus::InProgress;
            }
            updated.updated_at = Utc::now();

            match self.repository.update_course(updated.clone(), course.version) {
                Ok(()) => {
                    return Ok(SessionProgress {
                        course_id: updated.id,
                        kind: updated.kind,
                        completed_sessions: updated.completed_sessions,
                        total_sessions: updated.total_sessions,
                        course_completed: updated.status == CourseStatus::Completed,
                        exam_available: updated.exam_status == ExamStatus::Available,
                    });
                }
                Err(RepositoryError::StaleWrite) => continue,
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Submit a scored exam. Rejected while the exam has never opened;
    /// resubmission over a previous pass or fail is allowed and overwrites
    /// the recorded score. Both outcomes trigger availability recomputation
    /// for the enrollment; a pass that completes the full curriculum also
    /// completes the enrollment.
    pub fn take_exam(
        &self,
        actor: &Actor,
        course_id: &CourseId,
        score: f64,
    ) -> Result<ExamOutcome, WorkflowError> {
        if actor.role != UserRole::Student {
            return Err(WorkflowError::Forbidden("only students can take exams"));
        }

        let passed = score >= PASSING_SCORE;
        let enrollment_id;
        let updated_course;

        loop {
            let course = self
                .repository
                .find_course(course_id)?
                .ok_or(WorkflowError::NotFound("course"))?;

            if course.exam_status == ExamStatus::NotAvailable {
                return Err(WorkflowError::InvalidState("exam is not available yet"));
            }

            let mut updated = course.clone();
            updated.exam_status = if passed {
                ExamStatus::Passed
            } else {
                ExamStatus::Failed
            };
            updated.exam_score = Some(score);
            updated.updated_at = Utc::now();

            match self.repository.update_course(updated.clone(), course.version) {
                Ok(()) => {
                    enrollment_id = updated.enrollment_id.clone();
                    updated_course = updated;
                    break;
                }
                Err(RepositoryError::StaleWrite) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        recompute_availability(self.repository.as_ref(), &enrollment_id)?;

        let mut license_earned = false;
        if passed {
            let courses = self.repository.list_courses_by_enrollment(&enrollment_id)?;
            if courses
                .iter()
                .all(|course| course.exam_status == ExamStatus::Passed)
            {
                let mut enrollment = self
                    .repository
                    .find_enrollment(&enrollment_id)?
                    .ok_or(WorkflowError::NotFound("enrollment"))?;
                enrollment.status = EnrollmentStatus::Completed;
                self.repository.update_enrollment(enrollment)?;
                license_earned = true;
                info!(enrollment = %enrollment_id.0, "all exams passed, enrollment completed");
            }
        }

        Ok(ExamOutcome {
            course_id: updated_course.id,
            kind: updated_course.kind,
            score,
            passed,
            license_earned,
        })
    }

    /// Course detail view, limited to the owning student, the assigned
    /// instructor, or the school's manager.
    pub fn course_details(
        &self,
        actor: &Actor,
        course_id: &CourseId,
    ) -> Result<CourseDetails, WorkflowError> {
        let course = self
            .repository
            .find_course(course_id)?
            .ok_or(WorkflowError::NotFound("course"))?;
        let enrollment = self
            .repository
            .find_enrollment(&course.enrollment_id)?
            .ok_or(WorkflowError::NotFound("enrollment"))?;
        let school = self.repository.find_school(&enrollment.school_id)?;

        let allowed = match actor.role {
            UserRole::Student => enrollment.student_id == actor.id,
            UserRole::Teacher => course
                .teacher_id
                .as_ref()
                .map(|teacher| {
                    self.repository
                        .find_instructor(teacher)
                        .ok()
                        .flatten()
                        .is_some_and(|record| record.user_id == actor.id)
                })
                .unwrap_or(false),
            UserRole::Manager => school
                .as_ref()
                .is_some_and(|school| school.manager_id == actor.id),
            UserRole::Guest => false,
        };
        if !allowed {
            return Err(WorkflowError::Forbidden(
                "not authorized to view this course",
            ));
        }

        Ok(CourseDetails {
            course,
            enrollment,
            school,
        })
    }
}

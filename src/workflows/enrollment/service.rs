use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::curriculum::{create_courses, recompute_availability};
use super::documents::documents_complete;
use super::domain::{
    Actor, Course, CourseKind, Enrollment, EnrollmentId, EnrollmentStatus, PaymentStatus, School,
    SchoolId, StoredDocument, UserAccount, UserRole,
};
use super::repository::{MediaError, PlatformStore, RepositoryError, UserStore};

/// Error raised by every workflow service. Each rejection carries a stable
/// kind plus a human-readable reason; state-machine violations are detected
/// before any mutation is issued.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// One-way role promotion executed as part of the first enrollment or
/// school-creation action. Accounts that already hold a non-guest role are
/// left untouched. A failed promotion is logged and swallowed so the primary
/// action proceeds; there is deliberately no rollback when later steps fail.
pub(crate) fn promote_if_guest<U>(store: &U, actor: &Actor, target: UserRole)
where
    U: UserStore + ?Sized,
{
    if actor.role != UserRole::Guest {
        return;
    }

    match store.set_user_role(&actor.id, target) {
        Ok(()) => info!(user = %actor.id.0, role = target.label(), "guest promoted"),
        Err(err) => warn!(user = %actor.id.0, %err, "guest promotion failed, continuing"),
    }
}

/// Enrollment plus everything a student-facing listing needs.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOverview {
    pub enrollment: Enrollment,
    pub school: Option<School>,
    pub courses: Vec<Course>,
    pub documents_complete: bool,
}

/// Manager-facing view of an enrollment awaiting a decision.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEnrollment {
    pub enrollment: Enrollment,
    pub student: Option<UserAccount>,
    pub documents: Vec<StoredDocument>,
    pub documents_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
    pub kind: CourseKind,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentProgress {
    pub enrollment: Enrollment,
    pub school: Option<School>,
    pub courses: Vec<Course>,
    pub progress: Vec<CourseProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub total_enrollments: usize,
    pub active_enrollments: usize,
    pub pending_payments: usize,
    pub enrollments: Vec<EnrollmentProgress>,
    pub documents: Vec<StoredDocument>,
}

/// State machine governing a single enrollment from creation through
/// payment, document submission, and the manager's decision. Completion is
/// driven from the course side when the final exam passes.
pub struct EnrollmentService<R> {
    repository: Arc<R>,
}

impl<R> EnrollmentService<R>
where
    R: PlatformStore + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create an enrollment for the calling student (promoting a guest on
    /// the way), capture the school's current price, and lay down the
    /// three-stage curriculum. At most one enrollment exists per
    /// (student, school) pair; rejection never releases the slot.
    pub fn enroll(&self, actor: &Actor, school_id: &SchoolId) -> Result<Enrollment, WorkflowError> {
        if !matches!(actor.role, UserRole::Guest | UserRole::Student) {
            return Err(WorkflowError::Forbidden(
                "only guests and students can enroll",
            ));
        }

        let school = self
            .repository
            .find_school(school_id)?
            .ok_or(WorkflowError::NotFound("driving school"))?;

        if self
            .repository
            .find_enrollment_for_pair(&actor.id, school_id)?
            .is_some()
        {
            return Err(WorkflowError::Conflict("already enrolled in this school"));
        }

        promote_if_guest(self.repository.as_ref(), actor, UserRole::Student);

        let enrollment = Enrollment::new(actor.id.clone(), school_id.clone(), school.price);
        let enrollment = self.repository.insert_enrollment(enrollment)?;
        create_courses(self.repository.as_ref(), &enrollment.id)?;

        info!(
            enrollment = %enrollment.id.0,
            school = %school_id.0,
            amount = enrollment.amount,
            "enrollment created"
        );
        Ok(enrollment)
    }

    /// Trust-the-caller payment stub: the owning student marks the amount
    /// settled and the enrollment moves on to document gathering.
    pub fn complete_payment(
        &self,
        actor: &Actor,
        enrollment_id: &EnrollmentId,
    ) -> Result<Enrollment, WorkflowError> {
        if actor.role != UserRole::Student {
            return Err(WorkflowError::Forbidden(
                "only students can complete payments",
            ));
        }

        let mut enrollment = self
            .repository
            .find_enrollment(enrollment_id)?
            .ok_or(WorkflowError::NotFound("enrollment"))?;
        if enrollment.student_id != actor.id {
            return Err(WorkflowError::Forbidden(
                "enrollment belongs to another student",
            ));
        }

        enrollment.payment_status = PaymentStatus::Completed;
        enrollment.status = EnrollmentStatus::PendingDocuments;
        self.repository.update_enrollment(enrollment.clone())?;

        info!(enrollment = %enrollment_id.0, "payment recorded, awaiting documents");
        Ok(enrollment)
    }

    /// Manager approval. Blocked until the student's required document set
    /// is complete and verified; on success the curriculum availability is
    /// recomputed so the first stage is confirmed open.
    pub fn approve(
        &self,
        actor: &Actor,
        enrollment_id: &EnrollmentId,
    ) -> Result<Enrollment, WorkflowError> {
        let mut enrollment = self.owned_enrollment(actor, enrollment_id, "approve")?;

        if !documents_complete(
            self.repository.as_ref(),
            &enrollment.student_id,
            UserRole::Student,
        )? {
            return Err(WorkflowError::InvalidState(
                "student documents are not complete or verified",
            ));
        }

        enrollment.status = EnrollmentStatus::Approved;
        enrollment.approved_at = Some(Utc::now());
        self.repository.update_enrollment(enrollment.clone())?;

        recompute_availability(self.repository.as_ref(), enrollment_id)?;

        info!(enrollment = %enrollment_id.0, "enrollment approved");
        Ok(enrollment)
    }

    /// Manager rejection with a recorded reason. Terminal: no reopen path,
    /// and the uniqueness invariant still blocks a fresh enrollment at the
    /// same school. No downstream course effect.
    pub fn reject(
        &self,
        actor: &Actor,
        enrollment_id: &EnrollmentId,
        reason: String,
    ) -> Result<Enrollment, WorkflowError> {
        let mut enrollment = self.owned_enrollment(actor, enrollment_id, "reject")?;

        enrollment.status = EnrollmentStatus::Rejected;
        enrollment.rejection_reason = Some(reason);
        enrollment.rejected_at = Some(Utc::now());
        self.repository.update_enrollment(enrollment.clone())?;

        info!(enrollment = %enrollment_id.0, "enrollment rejected");
        Ok(enrollment)
    }

    pub fn my_enrollments(&self, actor: &Actor) -> Result<Vec<EnrollmentOverview>, WorkflowError> {
        if actor.role != UserRole::Student {
            return Err(WorkflowError::Forbidden(
                "only students can view their enrollments",
            ));
        }

        let complete =
            documents_complete(self.repository.as_ref(), &actor.id, UserRole::Student)?;
        let enrollments = self.repository.list_enrollments_by_student(&actor.id)?;

        enrollments
            .into_iter()
            .map(|enrollment| {
                let school = self.repository.find_school(&enrollment.school_id)?;
                let courses = self
                    .repository
                    .list_courses_by_enrollment(&enrollment.id)?;
                Ok(EnrollmentOverview {
                    enrollment,
                    school,
                    courses,
                    documents_complete: complete,
                })
            })
            .collect()
    }

    /// Enrollments awaiting the calling manager's decision, enriched with
    /// the student's account and document set.
    pub fn pending_enrollments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<PendingEnrollment>, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can view pending enrollments",
            ));
        }

        let school = self
            .repository
            .find_school_by_manager(&actor.id)?
            .ok_or(WorkflowError::NotFound("manager's driving school"))?;

        let enrollments = self
            .repository
            .list_enrollments_by_school(&school.id, Some(EnrollmentStatus::PendingApproval))?;

        enrollments
            .into_iter()
            .map(|enrollment| {
                let student = self.repository.find_user(&enrollment.student_id)?;
                let documents = self
                    .repository
                    .list_documents_by_owner(&enrollment.student_id)?;
                let complete = documents_complete(
                    self.repository.as_ref(),
                    &enrollment.student_id,
                    UserRole::Student,
                )?;
                Ok(PendingEnrollment {
                    enrollment,
                    student,
                    documents,
                    documents_complete: complete,
                })
            })
            .collect()
    }

    pub fn student_dashboard(&self, actor: &Actor) -> Result<StudentDashboard, WorkflowError> {
        if actor.role != UserRole::Student {
            return Err(WorkflowError::Forbidden(
                "only students can view the student dashboard",
            ));
        }

        let enrollments = self.repository.list_enrollments_by_student(&actor.id)?;
        let total_enrollments = enrollments.len();
        let active_enrollments = enrollments
            .iter()
            .filter(|enrollment| enrollment.status == EnrollmentStatus::Approved)
            .count();
        let pending_payments = enrollments
            .iter()
            .filter(|enrollment| enrollment.payment_status == PaymentStatus::Pending)
            .count();

        let enrollments = enrollments
            .into_iter()
            .map(|enrollment| {
                let school = self.repository.find_school(&enrollment.school_id)?;
                let courses = self
                    .repository
                    .list_courses_by_enrollment(&enrollment.id)?;
                let progress = courses
                    .iter()
                    .map(|course| CourseProgress {
                        kind: course.kind,
                        completed: course.completed_sessions,
                        total: course.total_sessions,
                    })
                    .collect();
                Ok(EnrollmentProgress {
                    enrollment,
                    school,
                    courses,
                    progress,
                })
            })
            .collect::<Result<Vec<_>, WorkflowError>>()?;

        let documents = self.repository.list_documents_by_owner(&actor.id)?;

        Ok(StudentDashboard {
            total_enrollments,
            active_enrollments,
            pending_payments,
            enrollments,
            documents,
        })
    }

    /// Shared guard for manager decisions: the enrollment must exist and the
    /// caller must manage the school it belongs to.
    fn owned_enrollment(
        &self,
        actor: &Actor,
        enrollment_id: &EnrollmentId,
        action: &'static str,
    ) -> Result<Enrollment, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can decide enrollments",
            ));
        }

        let enrollment = self
            .repository
            .find_enrollment(enrollment_id)?
            .ok_or(WorkflowError::NotFound("enrollment"))?;

        let owns = self
            .repository
            .find_school(&enrollment.school_id)?
            .is_some_and(|school| school.manager_id == actor.id);
        if !owns {
            warn!(enrollment = %enrollment_id.0, action, "manager does not own the school");
            return Err(WorkflowError::Forbidden(
                "not authorized to decide this enrollment",
            ));
        }

        Ok(enrollment)
    }
}

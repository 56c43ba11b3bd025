use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::documents::documents_complete;
use super::domain::{
    Actor, EnrollmentStatus, Instructor, InstructorId, School, SchoolId, StoredDocument,
    UserAccount, UserRole,
};
use super::repository::{MediaStore, PlatformStore};
use super::service::{promote_if_guest, WorkflowError};

/// Inbound payload for school creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSchool {
    pub name: String,
    pub address: String,
    pub state: String,
    pub phone: String,
    pub email: String,
    pub description: String,
    pub price: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Optional branding upload accompanying school creation. Failure to store
/// it degrades the result (no logo) instead of failing the action.
#[derive(Debug, Clone, Deserialize)]
pub struct LogoUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInstructor {
    pub email: String,
    #[serde(default = "default_true")]
    pub can_teach_male: bool,
    #[serde(default = "default_true")]
    pub can_teach_female: bool,
}

fn default_true() -> bool {
    true
}

/// Page of schools for the browse surface.
#[derive(Debug, Clone, Serialize)]
pub struct SchoolPage {
    pub schools: Vec<School>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorProfile {
    pub instructor: Instructor,
    pub user: Option<UserAccount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchoolDetails {
    pub school: School,
    pub instructors: Vec<InstructorProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingInstructor {
    pub instructor: Instructor,
    pub user: Option<UserAccount>,
    pub documents: Vec<StoredDocument>,
    pub documents_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerDashboard {
    pub school: School,
    pub total_students: usize,
    pub active_students: usize,
    pub pending_approvals: usize,
    pub total_instructors: usize,
    pub instructors: Vec<InstructorProfile>,
}

/// School creation and instructor roster management. Creating a school is
/// the second trigger of the role transition policy (guest becomes manager);
/// instructor approval reuses the document completeness gate with the
/// teacher's required set.
pub struct SchoolService<R, M> {
    repository: Arc<R>,
    media: Arc<M>,
}

impl<R, M> SchoolService<R, M>
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
{
    pub fn new(repository: Arc<R>, media: Arc<M>) -> Self {
        Self { repository, media }
    }

    /// Register a school owned by the caller, promoting a guest to manager.
    pub fn create_school(
        &self,
        actor: &Actor,
        details: NewSchool,
        logo: Option<LogoUpload>,
    ) -> Result<School, WorkflowError> {
        if !matches!(actor.role, UserRole::Guest | UserRole::Manager) {
            return Err(WorkflowError::Forbidden(
                "only guests and managers can create driving schools",
            ));
        }

        promote_if_guest(self.repository.as_ref(), actor, UserRole::Manager);

        let logo_url = logo.and_then(|upload| {
            match self
                .media
                .store(&upload.content, "driving-schools/logos", &upload.file_name)
            {
                Ok(stored) => Some(stored.url),
                Err(err) => {
                    warn!(%err, "logo upload failed, creating school without one");
                    None
                }
            }
        });

        let school = School {
            id: SchoolId::generate(),
            name: details.name,
            address: details.address,
            state: details.state,
            phone: details.phone,
            email: details.email,
            description: details.description,
            price: details.price,
            logo_url,
            photo_urls: Vec::new(),
            rating: 0.0,
            total_reviews: 0,
            manager_id: actor.id.clone(),
            latitude: details.latitude,
            longitude: details.longitude,
            created_at: Utc::now(),
        };
        let school = self.repository.insert_school(school)?;

        info!(school = %school.id.0, manager = %actor.id.0, "driving school created");
        Ok(school)
    }

    /// Public browse surface; no authentication required.
    pub fn list_schools(
        &self,
        state: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> Result<SchoolPage, WorkflowError> {
        let schools = self.repository.list_schools(state, skip, limit)?;
        let total = self.repository.count_schools(state)?;
        Ok(SchoolPage {
            schools,
            total,
            skip,
            limit,
        })
    }

    /// School detail with its approved instructor roster.
    pub fn school_details(&self, school_id: &SchoolId) -> Result<SchoolDetails, WorkflowError> {
        let school = self
            .repository
            .find_school(school_id)?
            .ok_or(WorkflowError::NotFound("driving school"))?;

        let instructors = self
            .repository
            .list_instructors_by_school(school_id, Some(true))?
            .into_iter()
            .map(|instructor| {
                let user = self.repository.find_user(&instructor.user_id)?;
                Ok(InstructorProfile { instructor, user })
            })
            .collect::<Result<Vec<_>, WorkflowError>>()?;

        Ok(SchoolDetails {
            school,
            instructors,
        })
    }

    /// Add an existing account to the caller's school roster as an
    /// unapproved instructor and hand the account the teacher role.
    /// Credential provisioning for brand-new people belongs to the identity
    /// collaborator, so an unknown email is rejected here.
    pub fn add_instructor(
        &self,
        actor: &Actor,
        details: NewInstructor,
    ) -> Result<Instructor, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can add instructors",
            ));
        }

        let school = self
            .repository
            .find_school_by_manager(&actor.id)?
            .ok_or(WorkflowError::NotFound("manager's driving school"))?;

        let user = self
            .repository
            .find_user_by_email(&details.email)?
            .ok_or(WorkflowError::NotFound("user account"))?;

        if self
            .repository
            .find_instructor_at_school(&user.id, &school.id)?
            .is_some()
        {
            return Err(WorkflowError::Conflict(
                "user is already an instructor at this school",
            ));
        }

        let instructor = Instructor::new(
            user.id.clone(),
            school.id.clone(),
            details.can_teach_male,
            details.can_teach_female,
        );
        let instructor = self.repository.insert_instructor(instructor)?;
        self.repository.set_user_role(&user.id, UserRole::Teacher)?;

        info!(
            instructor = %instructor.id.0,
            school = %school.id.0,
            "instructor added, awaiting document approval"
        );
        Ok(instructor)
    }

    /// Approve an instructor once their teacher document set is complete
    /// and verified.
    pub fn approve_instructor(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
    ) -> Result<Instructor, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can approve instructors",
            ));
        }

        let mut instructor = self
            .repository
            .find_instructor(instructor_id)?
            .ok_or(WorkflowError::NotFound("instructor"))?;

        let owns = self
            .repository
            .find_school(&instructor.school_id)?
            .is_some_and(|school| school.manager_id == actor.id);
        if !owns {
            return Err(WorkflowError::Forbidden(
                "not authorized to approve this instructor",
            ));
        }

        if !documents_complete(
            self.repository.as_ref(),
            &instructor.user_id,
            UserRole::Teacher,
        )? {
            return Err(WorkflowError::InvalidState(
                "instructor documents are not complete or verified",
            ));
        }

        instructor.approved = true;
        instructor.approved_at = Some(Utc::now());
        self.repository.update_instructor(instructor.clone())?;

        info!(instructor = %instructor_id.0, "instructor approved");
        Ok(instructor)
    }

    /// Unapproved roster entries for the caller's school, with document
    /// completeness per the teacher requirement set.
    pub fn pending_instructors(
        &self,
        actor: &Actor,
    ) -> Result<Vec<PendingInstructor>, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can view pending instructors",
            ));
        }

        let school = self
            .repository
            .find_school_by_manager(&actor.id)?
            .ok_or(WorkflowError::NotFound("manager's driving school"))?;

        self.repository
            .list_instructors_by_school(&school.id, Some(false))?
            .into_iter()
            .map(|instructor| {
                let user = self.repository.find_user(&instructor.user_id)?;
                let documents = self
                    .repository
                    .list_documents_by_owner(&instructor.user_id)?;
                let complete = documents_complete(
                    self.repository.as_ref(),
                    &instructor.user_id,
                    UserRole::Teacher,
                )?;
                Ok(PendingInstructor {
                    instructor,
                    user,
                    documents,
                    documents_complete: complete,
                })
            })
            .collect()
    }

    pub fn manager_dashboard(&self, actor: &Actor) -> Result<ManagerDashboard, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can view the manager dashboard",
            ));
        }

        let school = self
            .repository
            .find_school_by_manager(&actor.id)?
            .ok_or(WorkflowError::NotFound("manager's driving school"))?;

        let enrollments = self
            .repository
            .list_enrollments_by_school(&school.id, None)?;
        let total_students = enrollments.len();
        let active_students = enrollments
            .iter()
            .filter(|enrollment| enrollment.status == EnrollmentStatus::Approved)
            .count();
        let pending_approvals = enrollments
            .iter()
            .filter(|enrollment| enrollment.status == EnrollmentStatus::PendingApproval)
            .count();

        let instructors = self
            .repository
            .list_instructors_by_school(&school.id, None)?
            .into_iter()
            .map(|instructor| {
                let user = self.repository.find_user(&instructor.user_id)?;
                Ok(InstructorProfile { instructor, user })
            })
            .collect::<Result<Vec<_>, WorkflowError>>()?;

        Ok(ManagerDashboard {
            school,
            total_students,
            active_students,
            pending_approvals,
            total_instructors: instructors.len(),
            instructors,
        })
    }
}

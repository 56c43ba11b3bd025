use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, Course, CourseId, DocumentId, DocumentKind, Enrollment, EnrollmentId, EnrollmentStatus,
    Instructor, InstructorId, School, SchoolId, StoredDocument, UserAccount, UserId, UserRole,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently")]
    StaleWrite,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Account lookups plus the single field the workflow is allowed to write.
pub trait UserStore: Send + Sync {
    fn find_user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    fn set_user_role(&self, id: &UserId, role: UserRole) -> Result<(), RepositoryError>;
}

pub trait SchoolStore: Send + Sync {
    fn insert_school(&self, school: School) -> Result<School, RepositoryError>;
    fn find_school(&self, id: &SchoolId) -> Result<Option<School>, RepositoryError>;
    fn find_school_by_manager(&self, manager: &UserId)
        -> Result<Option<School>, RepositoryError>;
    fn list_schools(
        &self,
        state: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<School>, RepositoryError>;
    fn count_schools(&self, state: Option<&str>) -> Result<usize, RepositoryError>;
}

pub trait EnrollmentStore: Send + Sync {
    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError>;
    fn find_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    fn find_enrollment_for_pair(
        &self,
        student: &UserId,
        school: &SchoolId,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    fn list_enrollments_by_student(
        &self,
        student: &UserId,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    fn list_enrollments_by_school(
        &self,
        school: &SchoolId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    fn update_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError>;
    /// Batch transition: every enrollment of the student currently in
    /// `pending_documents` moves to `pending_approval`. Returns the number of
    /// records moved. Each record's check-and-set must be atomic.
    fn advance_awaiting_documents(&self, student: &UserId) -> Result<usize, RepositoryError>;
}

pub trait CourseStore: Send + Sync {
    /// All-or-nothing batch insert; a partially written curriculum must never
    /// be observable.
    fn insert_courses(&self, courses: &[Course]) -> Result<(), RepositoryError>;
    fn find_course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    fn list_courses_by_enrollment(
        &self,
        enrollment: &EnrollmentId,
    ) -> Result<Vec<Course>, RepositoryError>;
    /// Versioned compare-and-swap. The write applies only when the stored
    /// version still equals `expected_version`; the store bumps the version
    /// on success and returns [`RepositoryError::StaleWrite`] otherwise.
    /// Callers re-read and retry on a stale write.
    fn update_course(&self, course: Course, expected_version: u64) -> Result<(), RepositoryError>;
}

pub trait DocumentStore: Send + Sync {
    /// Supersede semantics: atomically drops any prior document in the
    /// (owner, kind) slot and inserts the new record.
    fn replace_document(
        &self,
        document: StoredDocument,
    ) -> Result<StoredDocument, RepositoryError>;
    fn find_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError>;
    fn list_documents_by_owner(
        &self,
        owner: &UserId,
    ) -> Result<Vec<StoredDocument>, RepositoryError>;
    fn list_verified_documents(
        &self,
        owner: &UserId,
        kinds: &[DocumentKind],
    ) -> Result<Vec<StoredDocument>, RepositoryError>;
    fn update_document(&self, document: StoredDocument) -> Result<(), RepositoryError>;
}

pub trait InstructorStore: Send + Sync {
    fn insert_instructor(&self, instructor: Instructor) -> Result<Instructor, RepositoryError>;
    fn find_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>, RepositoryError>;
    fn find_instructor_at_school(
        &self,
        user: &UserId,
        school: &SchoolId,
    ) -> Result<Option<Instructor>, RepositoryError>;
    fn list_instructors_by_school(
        &self,
        school: &SchoolId,
        approved: Option<bool>,
    ) -> Result<Vec<Instructor>, RepositoryError>;
    fn update_instructor(&self, instructor: Instructor) -> Result<(), RepositoryError>;
}

/// Umbrella over every store the workflow touches, so services stay generic
/// over a single parameter.
pub trait PlatformStore:
    UserStore + SchoolStore + EnrollmentStore + CourseStore + DocumentStore + InstructorStore
{
}

impl<T> PlatformStore for T where
    T: UserStore + SchoolStore + EnrollmentStore + CourseStore + DocumentStore + InstructorStore
{
}

/// Receipt returned by the media collaborator; recorded verbatim on the
/// document entity, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub url: String,
    pub public_id: String,
    pub size: u64,
}

/// Outbound file storage (an object store or CDN in production).
pub trait MediaStore: Send + Sync {
    fn store(
        &self,
        content: &[u8],
        folder: &str,
        file_name: &str,
    ) -> Result<StoredMedia, MediaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media storage unavailable: {0}")]
    Transport(String),
}

/// Resolves a bearer credential to the calling account. Token issuance and
/// verification mechanics live outside this crate.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<Actor, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid or expired credential")]
    Unauthorized,
}

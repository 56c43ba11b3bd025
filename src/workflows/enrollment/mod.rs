//! Enrollment, curriculum progression, and approval workflow for the
//! driving school marketplace.
//!
//! Guests enroll with a school (becoming students) or open one (becoming
//! managers), pay, upload identity and medical documents, and once a manager
//! has verified the full set the enrollment can be approved. Progress then
//! runs through the fixed theory → park → road curriculum: each stage counts
//! instructor-recorded sessions, opens an exam at the session total, and a
//! passed exam unlocks the next stage. Passing the final exam completes the
//! enrollment.

pub mod curriculum;
pub mod documents;
pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod schools;
pub mod service;

#[cfg(test)]
mod tests;

pub use curriculum::{
    create_courses, recompute_availability, CourseDetails, CourseService, ExamOutcome,
    SessionProgress, PASSING_SCORE,
};
pub use documents::{
    documents_complete, DocumentService, UploadReceipt, UploadRequest, ALLOWED_CONTENT_TYPES,
    MAX_UPLOAD_BYTES,
};
pub use domain::{
    Actor, Course, CourseId, CourseKind, CourseStatus, DocumentId, DocumentKind, Enrollment,
    EnrollmentId, EnrollmentStatus, ExamStatus, Instructor, InstructorId, PaymentStatus, School,
    SchoolId, StoredDocument, UserAccount, UserId, UserRole,
};
pub use memory::{MemoryIdentity, MemoryMedia, MemoryPlatform};
pub use repository::{
    CourseStore, DocumentStore, EnrollmentStore, IdentityError, IdentityResolver, InstructorStore,
    MediaError, MediaStore, PlatformStore, RepositoryError, SchoolStore, StoredMedia, UserStore,
};
pub use router::{platform_router, PlatformState};
pub use schools::{
    InstructorProfile, LogoUpload, ManagerDashboard, NewInstructor, NewSchool, PendingInstructor,
    SchoolDetails, SchoolPage, SchoolService,
};
pub use service::{
    CourseProgress, EnrollmentOverview, EnrollmentProgress, EnrollmentService, PendingEnrollment,
    StudentDashboard, WorkflowError,
};

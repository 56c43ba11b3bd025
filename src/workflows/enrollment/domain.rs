use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for user accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for driving schools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchoolId(pub String);

/// Identifier wrapper for enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

/// Identifier wrapper for curriculum courses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

/// Identifier wrapper for uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Identifier wrapper for instructor records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructorId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl SchoolId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl EnrollmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CourseId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl InstructorId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Account roles on the marketplace. Everyone starts as a guest; the first
/// enrollment or school-creation action promotes the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Guest,
    Student,
    Teacher,
    Manager,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Manager => "manager",
        }
    }

    /// Document kinds that must be uploaded and verified before the role's
    /// approval gates open. Guests have no gate and no required set.
    pub const fn required_documents(self) -> &'static [DocumentKind] {
        match self {
            Self::Student => &[
                DocumentKind::ProfilePhoto,
                DocumentKind::IdCard,
                DocumentKind::MedicalCertificate,
            ],
            Self::Teacher => &[
                DocumentKind::ProfilePhoto,
                DocumentKind::IdCard,
                DocumentKind::DrivingLicense,
                DocumentKind::TeachingLicense,
            ],
            Self::Manager => &[DocumentKind::ProfilePhoto, DocumentKind::IdCard],
            Self::Guest => &[],
        }
    }
}

/// The three curriculum stages, in the only order they may be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseKind {
    Theory,
    Park,
    Road,
}

impl CourseKind {
    /// Fixed progression sequence. Availability recomputation orders by this
    /// table, never by a sortable field value.
    pub const fn ordered() -> [Self; 3] {
        [Self::Theory, Self::Park, Self::Road]
    }

    pub const fn sequence_index(self) -> usize {
        match self {
            Self::Theory => 0,
            Self::Park => 1,
            Self::Road => 2,
        }
    }

    /// Sessions required to complete the stage.
    pub const fn total_sessions(self) -> u32 {
        match self {
            Self::Theory => 10,
            Self::Park => 5,
            Self::Road => 15,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Park => "park",
            Self::Road => "road",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Locked,
    Available,
    InProgress,
    Completed,
    Failed,
}

impl CourseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Available => "available",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    NotAvailable,
    Available,
    Passed,
    Failed,
}

impl ExamStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotAvailable => "not_available",
            Self::Available => "available",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    ProfilePhoto,
    IdCard,
    MedicalCertificate,
    DrivingLicense,
    TeachingLicense,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProfilePhoto => "profile_photo",
            Self::IdCard => "id_card",
            Self::MedicalCertificate => "medical_certificate",
            Self::DrivingLicense => "driving_license",
            Self::TeachingLicense => "teaching_license",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    PendingPayment,
    PendingDocuments,
    PendingApproval,
    Approved,
    Rejected,
    Completed,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PendingDocuments => "pending_documents",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

/// Resolved caller identity attached to every workflow action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: UserRole,
}

/// One student's relationship to one school. At most one exists per
/// (student, school) pair; rejection does not release the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: UserId,
    pub school_id: SchoolId,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// New enrollment awaiting payment. The amount is captured from the
    /// school's price at creation time and never re-derived.
    pub fn new(student_id: UserId, school_id: SchoolId, amount: f64) -> Self {
        Self {
            id: EnrollmentId::generate(),
            student_id,
            school_id,
            amount,
            payment_status: PaymentStatus::Pending,
            status: EnrollmentStatus::PendingPayment,
            created_at: Utc::now(),
            approved_at: None,
            rejection_reason: None,
            rejected_at: None,
        }
    }
}

/// One curriculum stage within an enrollment. Exactly one exists per
/// (enrollment, kind). The `version` field backs the storage layer's
/// compare-and-swap updates; concurrent session counting must not lose
/// increments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub enrollment_id: EnrollmentId,
    pub kind: CourseKind,
    pub status: CourseStatus,
    pub teacher_id: Option<InstructorId>,
    pub completed_sessions: u32,
    pub total_sessions: u32,
    pub exam_status: ExamStatus,
    pub exam_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Course {
    pub fn new(enrollment_id: EnrollmentId, kind: CourseKind, status: CourseStatus) -> Self {
        let now = Utc::now();
        Self {
            id: CourseId::generate(),
            enrollment_id,
            kind,
            status,
            teacher_id: None,
            completed_sessions: 0,
            total_sessions: kind.total_sessions(),
            exam_status: ExamStatus::NotAvailable,
            exam_score: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// One uploaded artifact. A fresh upload of the same kind supersedes the
/// prior record for that (owner, kind) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub kind: DocumentKind,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub verified: bool,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Account record. The workflow reads `role` for authorization and writes it
/// during guest promotion; the rest of the account lifecycle belongs to the
/// identity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub state: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub address: String,
    pub state: String,
    pub phone: String,
    pub email: String,
    pub description: String,
    pub price: f64,
    pub logo_url: Option<String>,
    pub photo_urls: Vec<String>,
    pub rating: f64,
    pub total_reviews: u32,
    pub manager_id: UserId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Instructor roster entry for a school. Unapproved until the manager signs
/// off on a complete, verified teacher document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub user_id: UserId,
    pub school_id: SchoolId,
    pub can_teach_male: bool,
    pub can_teach_female: bool,
    pub rating: f64,
    pub total_reviews: u32,
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Instructor {
    pub fn new(
        user_id: UserId,
        school_id: SchoolId,
        can_teach_male: bool,
        can_teach_female: bool,
    ) -> Self {
        Self {
            id: InstructorId::generate(),
            user_id,
            school_id,
            can_teach_male,
            can_teach_female,
            rating: 0.0,
            total_reviews: 0,
            approved: false,
            approved_at: None,
            created_at: Utc::now(),
        }
    }
}

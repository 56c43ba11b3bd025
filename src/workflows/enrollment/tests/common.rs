use std::sync::Arc;

use chrono::Utc;

use crate::workflows::enrollment::curriculum::CourseService;
use crate::workflows::enrollment::documents::{DocumentService, UploadRequest};
use crate::workflows::enrollment::domain::{
    Actor, Course, DocumentKind, Enrollment, School, SchoolId, StoredDocument, UserAccount,
    UserId, UserRole,
};
use crate::workflows::enrollment::memory::{MemoryIdentity, MemoryMedia, MemoryPlatform};
use crate::workflows::enrollment::repository::CourseStore;
use crate::workflows::enrollment::schools::{NewSchool, SchoolService};
use crate::workflows::enrollment::service::EnrollmentService;

pub(super) struct Harness {
    pub(super) platform: Arc<MemoryPlatform>,
    pub(super) media: Arc<MemoryMedia>,
    pub(super) identity: Arc<MemoryIdentity>,
    pub(super) enrollments: EnrollmentService<MemoryPlatform>,
    pub(super) courses: CourseService<MemoryPlatform>,
    pub(super) documents: DocumentService<MemoryPlatform, MemoryMedia>,
    pub(super) schools: SchoolService<MemoryPlatform, MemoryMedia>,
}

pub(super) fn harness() -> Harness {
    let platform = Arc::new(MemoryPlatform::default());
    let media = Arc::new(MemoryMedia::default());
    let identity = Arc::new(MemoryIdentity::new(platform.as_ref().clone()));

    Harness {
        enrollments: EnrollmentService::new(platform.clone()),
        courses: CourseService::new(platform.clone()),
        documents: DocumentService::new(platform.clone(), media.clone()),
        schools: SchoolService::new(platform.clone(), media.clone()),
        platform,
        media,
        identity,
    }
}

impl Harness {
    pub(super) fn seed_account(&self, email: &str, role: UserRole) -> Actor {
        let account = UserAccount {
            id: UserId::generate(),
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "Account".to_string(),
            role,
            state: "Alger".to_string(),
            active: true,
            created_at: Utc::now(),
        };
        let actor = Actor {
            id: account.id.clone(),
            role,
        };
        self.platform.seed_user(account);
        actor
    }

    /// Seed a manager account and a school it owns.
    pub(super) fn seed_school(&self, email: &str, price: f64) -> (School, Actor) {
        let manager = self.seed_account(email, UserRole::Manager);
        let school = self
            .schools
            .create_school(&manager, school_details(price), None)
            .expect("school creation succeeds");
        (school, manager)
    }

    pub(super) fn upload(&self, actor: &Actor, kind: DocumentKind) -> StoredDocument {
        self.documents
            .upload(actor, upload_request(kind))
            .expect("upload succeeds")
            .document
    }

    /// Upload and manager-verify the full student document set.
    pub(super) fn complete_student_documents(&self, student: &Actor, manager: &Actor) {
        for kind in UserRole::Student.required_documents() {
            let document = self.upload(student, *kind);
            self.documents
                .verify(manager, &document.id)
                .expect("verification succeeds");
        }
    }

    /// Upload and manager-verify the full teacher document set.
    pub(super) fn complete_teacher_documents(&self, teacher: &Actor, manager: &Actor) {
        for kind in UserRole::Teacher.required_documents() {
            let document = self.upload(teacher, *kind);
            self.documents
                .verify(manager, &document.id)
                .expect("verification succeeds");
        }
    }

    /// Take a fresh student all the way to an approved enrollment.
    pub(super) fn approved_enrollment(
        &self,
        student: &Actor,
        manager: &Actor,
        school_id: &SchoolId,
    ) -> Enrollment {
        let enrollment = self
            .enrollments
            .enroll(student, school_id)
            .expect("enrollment succeeds");
        self.enrollments
            .complete_payment(student, &enrollment.id)
            .expect("payment succeeds");
        self.complete_student_documents(student, manager);
        self.enrollments
            .approve(manager, &enrollment.id)
            .expect("approval succeeds")
    }

    pub(super) fn curriculum_of(&self, enrollment: &Enrollment) -> Vec<Course> {
        self.platform
            .list_courses_by_enrollment(&enrollment.id)
            .expect("courses load")
    }

    /// Record sessions until the course completes and its exam opens.
    pub(super) fn finish_course_sessions(&self, recorder: &Actor, course: &Course) {
        loop {
            let progress = self
                .courses
                .complete_session(recorder, &course.id)
                .expect("session recording succeeds");
            if progress.course_completed {
                break;
            }
        }
    }
}

pub(super) fn school_details(price: f64) -> NewSchool {
    NewSchool {
        name: "Auto Ecole El Bahdja".to_string(),
        address: "12 Rue Didouche Mourad".to_string(),
        state: "Alger".to_string(),
        phone: "+213 555 010 203".to_string(),
        email: "contact@elbahdja.example".to_string(),
        description: "City driving school".to_string(),
        price,
        latitude: None,
        longitude: None,
    }
}

pub(super) fn upload_request(kind: DocumentKind) -> UploadRequest {
    UploadRequest {
        kind,
        file_name: format!("{}.png", kind.label()),
        content_type: "image/png".to_string(),
        content: vec![0u8; 64],
    }
}

//! In-process collaborators backing the binary and the test suites. A
//! production deployment swaps these for real document-store, object-store,
//! and identity adapters behind the same traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::domain::{
    Actor, Course, CourseId, DocumentId, DocumentKind, Enrollment, EnrollmentId, EnrollmentStatus,
    Instructor, InstructorId, School, SchoolId, StoredDocument, UserAccount, UserId, UserRole,
};
use super::repository::{
    CourseStore, DocumentStore, EnrollmentStore, IdentityError, IdentityResolver, InstructorStore,
    MediaError, MediaStore, RepositoryError, SchoolStore, StoredMedia, UserStore,
};

/// Mutex-guarded maps standing in for the document store. Course updates go
/// through a version check so the compare-and-swap contract holds even when
/// callers race.
#[derive(Default, Clone)]
pub struct MemoryPlatform {
    users: Arc<Mutex<HashMap<UserId, UserAccount>>>,
    schools: Arc<Mutex<HashMap<SchoolId, School>>>,
    enrollments: Arc<Mutex<HashMap<EnrollmentId, Enrollment>>>,
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    documents: Arc<Mutex<HashMap<DocumentId, StoredDocument>>>,
    instructors: Arc<Mutex<HashMap<InstructorId, Instructor>>>,
}

impl MemoryPlatform {
    /// Seed an account record. Account creation is identity-collaborator
    /// territory, so this is an inherent helper rather than a trait method.
    pub fn seed_user(&self, account: UserAccount) {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        guard.insert(account.id.clone(), account);
    }
}

impl UserStore for MemoryPlatform {
    fn find_user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.users.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.users.lock().expect("user mutex poisoned");
        Ok(guard.values().find(|user| user.email == email).cloned())
    }

    fn set_user_role(&self, id: &UserId, role: UserRole) -> Result<(), RepositoryError> {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        match guard.get_mut(id) {
            Some(user) => {
                user.role = role;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl SchoolStore for MemoryPlatform {
    fn insert_school(&self, school: School) -> Result<School, RepositoryError> {
        let mut guard = self.schools.lock().expect("school mutex poisoned");
        if guard.contains_key(&school.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(school.id.clone(), school.clone());
        Ok(school)
    }

    fn find_school(&self, id: &SchoolId) -> Result<Option<School>, RepositoryError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_school_by_manager(
        &self,
        manager: &UserId,
    ) -> Result<Option<School>, RepositoryError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        Ok(guard
            .values()
            .find(|school| school.manager_id == *manager)
            .cloned())
    }

    fn list_schools(
        &self,
        state: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<School>, RepositoryError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        let mut schools: Vec<School> = guard
            .values()
            .filter(|school| state.map_or(true, |wanted| school.state == wanted))
            .cloned()
            .collect();
        schools.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(schools.into_iter().skip(skip).take(limit).collect())
    }

    fn count_schools(&self, state: Option<&str>) -> Result<usize, RepositoryError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        Ok(guard
            .values()
            .filter(|school| state.map_or(true, |wanted| school.state == wanted))
            .count())
    }
}

impl EnrollmentStore for MemoryPlatform {
    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        if guard.contains_key(&enrollment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(enrollment.id.clone(), enrollment.clone());
        Ok(enrollment)
    }

    fn find_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_enrollment_for_pair(
        &self,
        student: &UserId,
        school: &SchoolId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        Ok(guard
            .values()
            .find(|enrollment| {
                enrollment.student_id == *student && enrollment.school_id == *school
            })
            .cloned())
    }

    fn list_enrollments_by_student(
        &self,
        student: &UserId,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        let mut enrollments: Vec<Enrollment> = guard
            .values()
            .filter(|enrollment| enrollment.student_id == *student)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enrollments)
    }

    fn list_enrollments_by_school(
        &self,
        school: &SchoolId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        let mut enrollments: Vec<Enrollment> = guard
            .values()
            .filter(|enrollment| enrollment.school_id == *school)
            .filter(|enrollment| status.map_or(true, |wanted| enrollment.status == wanted))
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enrollments)
    }

    fn update_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        let mut guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        if !guard.contains_key(&enrollment.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(enrollment.id.clone(), enrollment);
        Ok(())
    }

    fn advance_awaiting_documents(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.enrollments.lock().expect("enrollment mutex poisoned");
        let mut moved = 0;
        for enrollment in guard.values_mut() {
            if enrollment.student_id == *student
                && enrollment.status == EnrollmentStatus::PendingDocuments
            {
                enrollment.status = EnrollmentStatus::PendingApproval;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

impl CourseStore for MemoryPlatform {
    fn insert_courses(&self, courses: &[Course]) -> Result<(), RepositoryError> {
        let mut guard = self.courses.lock().expect("course mutex poisoned");
        if courses.iter().any(|course| guard.contains_key(&course.id)) {
            return Err(RepositoryError::Conflict);
        }
        for course in courses {
            guard.insert(course.id.clone(), course.clone());
        }
        Ok(())
    }

    fn find_course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        let guard = self.courses.lock().expect("course mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_courses_by_enrollment(
        &self,
        enrollment: &EnrollmentId,
    ) -> Result<Vec<Course>, RepositoryError> {
        let guard = self.courses.lock().expect("course mutex poisoned");
        let mut courses: Vec<Course> = guard
            .values()
            .filter(|course| course.enrollment_id == *enrollment)
            .cloned()
            .collect();
        courses.sort_by_key(|course| course.kind.sequence_index());
        Ok(courses)
    }

    fn update_course(
        &self,
        mut course: Course,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.courses.lock().expect("course mutex poisoned");
        match guard.get(&course.id) {
            Some(stored) if stored.version == expected_version => {
                course.version = expected_version + 1;
                guard.insert(course.id.clone(), course);
                Ok(())
            }
            Some(_) => Err(RepositoryError::StaleWrite),
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl DocumentStore for MemoryPlatform {
    fn replace_document(
        &self,
        document: StoredDocument,
    ) -> Result<StoredDocument, RepositoryError> {
        let mut guard = self.documents.lock().expect("document mutex poisoned");
        guard.retain(|_, existing| {
            !(existing.owner_id == document.owner_id && existing.kind == document.kind)
        });
        guard.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn find_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("document mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_documents_by_owner(
        &self,
        owner: &UserId,
    ) -> Result<Vec<StoredDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("document mutex poisoned");
        let mut documents: Vec<StoredDocument> = guard
            .values()
            .filter(|document| document.owner_id == *owner)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(documents)
    }

    fn list_verified_documents(
        &self,
        owner: &UserId,
        kinds: &[DocumentKind],
    ) -> Result<Vec<StoredDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("document mutex poisoned");
        Ok(guard
            .values()
            .filter(|document| {
                document.owner_id == *owner
                    && document.verified
                    && kinds.contains(&document.kind)
            })
            .cloned()
            .collect())
    }

    fn update_document(&self, document: StoredDocument) -> Result<(), RepositoryError> {
        let mut guard = self.documents.lock().expect("document mutex poisoned");
        if !guard.contains_key(&document.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(document.id.clone(), document);
        Ok(())
    }
}

impl InstructorStore for MemoryPlatform {
    fn insert_instructor(&self, instructor: Instructor) -> Result<Instructor, RepositoryError> {
        let mut guard = self.instructors.lock().expect("instructor mutex poisoned");
        if guard.contains_key(&instructor.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(instructor.id.clone(), instructor.clone());
        Ok(instructor)
    }

    fn find_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>, RepositoryError> {
        let guard = self.instructors.lock().expect("instructor mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_instructor_at_school(
        &self,
        user: &UserId,
        school: &SchoolId,
    ) -> Result<Option<Instructor>, RepositoryError> {
        let guard = self.instructors.lock().expect("instructor mutex poisoned");
        Ok(guard
            .values()
            .find(|instructor| instructor.user_id == *user && instructor.school_id == *school)
            .cloned())
    }

    fn list_instructors_by_school(
        &self,
        school: &SchoolId,
        approved: Option<bool>,
    ) -> Result<Vec<Instructor>, RepositoryError> {
        let guard = self.instructors.lock().expect("instructor mutex poisoned");
        let mut instructors: Vec<Instructor> = guard
            .values()
            .filter(|instructor| instructor.school_id == *school)
            .filter(|instructor| approved.map_or(true, |wanted| instructor.approved == wanted))
            .cloned()
            .collect();
        instructors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(instructors)
    }

    fn update_instructor(&self, instructor: Instructor) -> Result<(), RepositoryError> {
        let mut guard = self.instructors.lock().expect("instructor mutex poisoned");
        if !guard.contains_key(&instructor.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(instructor.id.clone(), instructor);
        Ok(())
    }
}

/// Media store that fabricates stable URLs. Flip `set_offline` to exercise
/// the fatal and degraded upload paths.
#[derive(Default, Clone)]
pub struct MemoryMedia {
    offline: Arc<AtomicBool>,
}

impl MemoryMedia {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl MediaStore for MemoryMedia {
    fn store(
        &self,
        content: &[u8],
        folder: &str,
        file_name: &str,
    ) -> Result<StoredMedia, MediaError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MediaError::Transport("media storage offline".to_string()));
        }

        let public_id = format!("{}_{}", Uuid::new_v4(), file_name);
        Ok(StoredMedia {
            url: format!("memory://{folder}/{public_id}"),
            public_id,
            size: content.len() as u64,
        })
    }
}

/// Identity resolver backed by a token table and the user map, so a role
/// promotion is visible on the very next request.
#[derive(Default, Clone)]
pub struct MemoryIdentity {
    tokens: Arc<Mutex<HashMap<String, UserId>>>,
    platform: MemoryPlatform,
}

impl MemoryIdentity {
    pub fn new(platform: MemoryPlatform) -> Self {
        Self {
            tokens: Arc::default(),
            platform,
        }
    }

    pub fn register_token(&self, token: impl Into<String>, user: UserId) {
        let mut guard = self.tokens.lock().expect("token mutex poisoned");
        guard.insert(token.into(), user);
    }
}

impl IdentityResolver for MemoryIdentity {
    fn resolve(&self, credential: &str) -> Result<Actor, IdentityError> {
        let user_id = {
            let guard = self.tokens.lock().expect("token mutex poisoned");
            guard.get(credential).cloned()
        }
        .ok_or(IdentityError::Unauthorized)?;

        let account = self
            .platform
            .find_user(&user_id)
            .map_err(|_| IdentityError::Unauthorized)?
            .ok_or(IdentityError::Unauthorized)?;

        Ok(Actor {
            id: account.id,
            role: account.role,
        })
    }
}

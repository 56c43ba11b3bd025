use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::curriculum::CourseService;
use super::documents::{DocumentService, UploadRequest};
use super::domain::{Actor, CourseId, DocumentId, EnrollmentId, InstructorId, SchoolId};
use super::repository::{
    IdentityResolver, MediaStore, PlatformStore, RepositoryError,
};
use super::schools::{LogoUpload, NewInstructor, NewSchool, SchoolService};
use super::service::{EnrollmentService, WorkflowError};

/// Shared handler state bundling the workflow services and the identity
/// collaborator.
pub struct PlatformState<R, M, I> {
    pub enrollments: Arc<EnrollmentService<R>>,
    pub courses: Arc<CourseService<R>>,
    pub documents: Arc<DocumentService<R, M>>,
    pub schools: Arc<SchoolService<R, M>>,
    pub identity: Arc<I>,
}

impl<R, M, I> PlatformState<R, M, I>
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    pub fn new(repository: Arc<R>, media: Arc<M>, identity: Arc<I>) -> Self {
        Self {
            enrollments: Arc::new(EnrollmentService::new(repository.clone())),
            courses: Arc::new(CourseService::new(repository.clone())),
            documents: Arc::new(DocumentService::new(repository.clone(), media.clone())),
            schools: Arc::new(SchoolService::new(repository, media)),
            identity,
        }
    }
}

impl<R, M, I> Clone for PlatformState<R, M, I> {
    fn clone(&self) -> Self {
        Self {
            enrollments: self.enrollments.clone(),
            courses: self.courses.clone(),
            documents: self.documents.clone(),
            schools: self.schools.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Router builder exposing the marketplace workflow over HTTP.
pub fn platform_router<R, M, I>(state: PlatformState<R, M, I>) -> Router
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    Router::new()
        .route(
            "/api/v1/schools",
            post(create_school_handler::<R, M, I>).get(list_schools_handler::<R, M, I>),
        )
        .route(
            "/api/v1/schools/:school_id",
            get(school_details_handler::<R, M, I>),
        )
        .route("/api/v1/enrollments", post(enroll_handler::<R, M, I>))
        .route(
            "/api/v1/enrollments/mine",
            get(my_enrollments_handler::<R, M, I>),
        )
        .route(
            "/api/v1/enrollments/pending",
            get(pending_enrollments_handler::<R, M, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/payment",
            post(complete_payment_handler::<R, M, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/approve",
            post(approve_enrollment_handler::<R, M, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/reject",
            post(reject_enrollment_handler::<R, M, I>),
        )
        .route(
            "/api/v1/documents",
            post(upload_document_handler::<R, M, I>).get(my_documents_handler::<R, M, I>),
        )
        .route(
            "/api/v1/documents/:document_id/verify",
            post(verify_document_handler::<R, M, I>),
        )
        .route(
            "/api/v1/instructors",
            post(add_instructor_handler::<R, M, I>),
        )
        .route(
            "/api/v1/instructors/pending",
            get(pending_instructors_handler::<R, M, I>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/approve",
            post(approve_instructor_handler::<R, M, I>),
        )
        .route(
            "/api/v1/courses/:course_id",
            get(course_details_handler::<R, M, I>),
        )
        .route(
            "/api/v1/courses/:course_id/sessions",
            post(complete_session_handler::<R, M, I>),
        )
        .route(
            "/api/v1/courses/:course_id/exam",
            post(take_exam_handler::<R, M, I>),
        )
        .route(
            "/api/v1/dashboard/student",
            get(student_dashboard_handler::<R, M, I>),
        )
        .route(
            "/api/v1/dashboard/manager",
            get(manager_dashboard_handler::<R, M, I>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollRequest {
    pub(crate) school_id: SchoolId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamRequest {
    pub(crate) score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSchoolRequest {
    #[serde(flatten)]
    pub(crate) details: NewSchool,
    #[serde(default)]
    pub(crate) logo: Option<LogoUpload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SchoolsQuery {
    pub(crate) state: Option<String>,
    #[serde(default)]
    pub(crate) skip: usize,
    #[serde(default = "default_page_limit")]
    pub(crate) limit: usize,
}

fn default_page_limit() -> usize {
    20
}

fn authenticate<I>(identity: &I, headers: &HeaderMap) -> Result<Actor, Response>
where
    I: IdentityResolver + ?Sized,
{
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match credential {
        Some(token) => identity.resolve(token).map_err(|err| {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }),
        None => {
            let payload = json!({ "error": "missing bearer credential" });
            Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
        }
    }
}

fn error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::InvalidState(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        WorkflowError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        WorkflowError::Repository(_) | WorkflowError::Media(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn create_school_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Json(request): Json<CreateSchoolRequest>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .schools
        .create_school(&actor, request.details, request.logo)
    {
        Ok(school) => (StatusCode::CREATED, Json(school)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_schools_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    Query(query): Query<SchoolsQuery>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    match state
        .schools
        .list_schools(query.state.as_deref(), query.skip, query.limit)
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn school_details_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    Path(school_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    match state.schools.school_details(&SchoolId(school_id)) {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn enroll_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Json(request): Json<EnrollRequest>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.enrollments.enroll(&actor, &request.school_id) {
        Ok(enrollment) => {
            let payload = json!({
                "enrollment_id": enrollment.id,
                "amount": enrollment.amount,
                "status": enrollment.status.label(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn my_enrollments_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.enrollments.my_enrollments(&actor) {
        Ok(overviews) => (StatusCode::OK, Json(overviews)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn pending_enrollments_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.enrollments.pending_enrollments(&actor) {
        Ok(pending) => (StatusCode::OK, Json(pending)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn complete_payment_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .enrollments
        .complete_payment(&actor, &EnrollmentId(enrollment_id))
    {
        Ok(enrollment) => {
            let payload = json!({
                "enrollment_id": enrollment.id,
                "payment_status": enrollment.payment_status.label(),
                "status": enrollment.status.label(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_enrollment_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .enrollments
        .approve(&actor, &EnrollmentId(enrollment_id))
    {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reject_enrollment_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .enrollments
        .reject(&actor, &EnrollmentId(enrollment_id), request.reason)
    {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_document_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.documents.upload(&actor, request) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn my_documents_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.documents.my_documents(&actor) {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_document_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.documents.verify(&actor, &DocumentId(document_id)) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn add_instructor_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Json(request): Json<NewInstructor>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.schools.add_instructor(&actor, request) {
        Ok(instructor) => (StatusCode::CREATED, Json(instructor)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn pending_instructors_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.schools.pending_instructors(&actor) {
        Ok(pending) => (StatusCode::OK, Json(pending)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_instructor_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(instructor_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .schools
        .approve_instructor(&actor, &InstructorId(instructor_id))
    {
        Ok(instructor) => (StatusCode::OK, Json(instructor)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn course_details_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.courses.course_details(&actor, &CourseId(course_id)) {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn complete_session_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.courses.complete_session(&actor, &CourseId(course_id)) {
        Ok(progress) => {
            let payload = json!({
                "course_id": progress.course_id,
                "completed_sessions": progress.completed_sessions,
                "total_sessions": progress.total_sessions,
                "remaining_sessions": progress.remaining_sessions(),
                "course_completed": progress.course_completed,
                "exam_available": progress.exam_available,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn take_exam_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
    Json(request): Json<ExamRequest>,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state
        .courses
        .take_exam(&actor, &CourseId(course_id), request.score)
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn student_dashboard_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.enrollments.student_dashboard(&actor) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn manager_dashboard_handler<R, M, I>(
    State(state): State<PlatformState<R, M, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
    I: IdentityResolver + 'static,
{
    let actor = match authenticate(state.identity.as_ref(), &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.schools.manager_dashboard(&actor) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(err) => error_response(err),
    }
}

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ApplicationId, JobId, StudentId};
use super::export::RenderedDocument;
use super::forms::{
    ApplicationForm, JobPosting, LoginForm, RecruiterProfileUpdate, RecruiterRegistration,
    StudentProfileUpdate, StudentRegistration,
};
use super::identity::{Capability, IdentityError, ProviderProfile};
use super::notify::Notifier;
use super::service::{ErrorKind, PortalError, PortalService};
use super::store::EntityStore;

type SharedService<S, N> = Arc<PortalService<S, N>>;

/// Router builder exposing the portal's JSON API under `/api/v1`.
pub fn portal_router<S, N>(service: SharedService<S, N>) -> Router
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/auth/students", post(register_student::<S, N>))
        .route("/api/v1/auth/recruiters", post(register_recruiter::<S, N>))
        .route("/api/v1/auth/login", post(login::<S, N>))
        .route("/api/v1/auth/oauth/callback", post(oauth_callback::<S, N>))
        .route("/api/v1/auth/oauth/link", post(link_provider::<S, N>))
        .route(
            "/api/v1/students/me",
            get(student_profile::<S, N>).put(update_student_profile::<S, N>),
        )
        .route(
            "/api/v1/students/me/deactivate",
            post(deactivate_student::<S, N>),
        )
        .route(
            "/api/v1/students/me/resume",
            put(upload_resume::<S, N>).get(own_resume::<S, N>),
        )
        .route("/api/v1/students/:student_id/export", get(export_profile::<S, N>))
        .route("/api/v1/students/:student_id/resume", get(student_resume::<S, N>))
        .route(
            "/api/v1/recruiters/me",
            get(recruiter_profile::<S, N>).put(update_recruiter_profile::<S, N>),
        )
        .route(
            "/api/v1/recruiters/me/deactivate",
            post(deactivate_recruiter::<S, N>),
        )
        .route("/api/v1/recruiters/me/jobs", get(recruiter_jobs::<S, N>))
        .route(
            "/api/v1/jobs",
            get(open_jobs::<S, N>).post(post_job::<S, N>),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(job::<S, N>)
                .put(update_job::<S, N>)
                .delete(delete_job::<S, N>),
        )
        .route("/api/v1/jobs/:job_id/close", post(close_job::<S, N>))
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(apply::<S, N>).get(job_applications::<S, N>),
        )
        .route("/api/v1/applications", get(my_applications::<S, N>))
        .route(
            "/api/v1/applications/:application_id/review",
            post(review_application::<S, N>),
        )
        .with_state(service)
}

/// Capability decoded from the request's `Authorization: Bearer` header.
pub struct Authenticated(pub Capability);

#[axum::async_trait]
impl<S, N> FromRequestParts<SharedService<S, N>> for Authenticated
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &SharedService<S, N>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(IdentityError::Unauthenticated("missing bearer token"))?;
        Ok(Authenticated(service.authenticate(token)?))
    }
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::DuplicateKey | ErrorKind::InvalidTransition | ErrorKind::AuthConflict => {
                StatusCode::CONFLICT
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.kind().status();
        if status.is_server_error() {
            error!(error = %self, "portal request failed");
        }
        let payload = json!({
            "error": self.to_string(),
        });
        (status, Json(payload)).into_response()
    }
}

fn document_response(document: RenderedDocument) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    (
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response()
}

pub(crate) async fn register_student<S, N>(
    State(service): State<SharedService<S, N>>,
    Json(form): Json<StudentRegistration>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let session = service.register_student(form)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

pub(crate) async fn register_recruiter<S, N>(
    State(service): State<SharedService<S, N>>,
    Json(form): Json<RecruiterRegistration>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let session = service.register_recruiter(form)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn login<S, N>(
    State(service): State<SharedService<S, N>>,
    Json(form): Json<LoginForm>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.login(form)?).into_response())
}

async fn oauth_callback<S, N>(
    State(service): State<SharedService<S, N>>,
    Json(profile): Json<ProviderProfile>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.oauth_callback(profile)?).into_response())
}

async fn link_provider<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Json(profile): Json<ProviderProfile>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.link_delegated_identity(&capability, profile)?).into_response())
}

async fn student_profile<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.student_profile(&capability)?).into_response())
}

async fn update_student_profile<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Json(form): Json<StudentProfileUpdate>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.update_student_profile(&capability, form)?).into_response())
}

async fn deactivate_student<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.deactivate_student(&capability)?).into_response())
}

#[derive(Debug, Deserialize)]
struct ResumeUpload {
    filename: String,
}

async fn upload_resume<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Query(upload): Query<ResumeUpload>,
    body: Bytes,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let view = service.upload_resume(&capability, &upload.filename, &body)?;
    Ok(Json(view).into_response())
}

async fn own_resume<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let student_id = capability.student()?;
    Ok(document_response(service.resume(&capability, student_id)?))
}

async fn student_resume<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(student_id): Path<StudentId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(document_response(service.resume(&capability, student_id)?))
}

async fn export_profile<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(student_id): Path<StudentId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(document_response(
        service.export_profile(&capability, student_id)?,
    ))
}

async fn recruiter_profile<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.recruiter_profile(&capability)?).into_response())
}

async fn update_recruiter_profile<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Json(form): Json<RecruiterProfileUpdate>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.update_recruiter_profile(&capability, form)?).into_response())
}

async fn deactivate_recruiter<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.deactivate_recruiter(&capability)?).into_response())
}

async fn recruiter_jobs<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.recruiter_jobs(&capability)?).into_response())
}

async fn open_jobs<S, N>(
    State(service): State<SharedService<S, N>>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.open_jobs()?).into_response())
}

async fn post_job<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Json(form): Json<JobPosting>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let job = service.post_job(&capability, form)?;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

async fn job<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(job_id): Path<JobId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.job(job_id)?).into_response())
}

async fn update_job<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(job_id): Path<JobId>,
    Json(form): Json<JobPosting>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.update_job(&capability, job_id, form)?).into_response())
}

async fn delete_job<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(job_id): Path<JobId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    service.delete_job(&capability, job_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn close_job<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(job_id): Path<JobId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.close_job(&capability, job_id)?).into_response())
}

pub(crate) async fn apply<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(job_id): Path<JobId>,
    Json(form): Json<ApplicationForm>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let application = service.apply(&capability, job_id, form)?;
    Ok((StatusCode::CREATED, Json(application)).into_response())
}

async fn job_applications<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(job_id): Path<JobId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.job_applications(&capability, job_id)?).into_response())
}

async fn my_applications<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.my_applications(&capability)?).into_response())
}

async fn review_application<S, N>(
    State(service): State<SharedService<S, N>>,
    Authenticated(capability): Authenticated,
    Path(application_id): Path<ApplicationId>,
) -> Result<Response, PortalError>
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(Json(service.review_application(&capability, application_id)?).into_response())
}

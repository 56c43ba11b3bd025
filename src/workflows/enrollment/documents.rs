use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Actor, DocumentId, DocumentKind, StoredDocument, UserId, UserRole};
use super::repository::{DocumentStore, MediaStore, PlatformStore, RepositoryError};
use super::service::WorkflowError;

/// Upload policy applied before any bytes leave the process.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// Decide whether every document kind the role requires has been uploaded
/// *and* verified for the person. Extra verified kinds never hurt; one
/// missing or unverified required kind fails the check. Roles with no
/// required set (guests) are trivially complete. No side effects.
pub fn documents_complete<R>(
    store: &R,
    owner: &UserId,
    role: UserRole,
) -> Result<bool, RepositoryError>
where
    R: DocumentStore + ?Sized,
{
    let required = role.required_documents();
    if required.is_empty() {
        return Ok(true);
    }

    let verified = store.list_verified_documents(owner, required)?;
    let present: BTreeSet<DocumentKind> = verified.iter().map(|doc| doc.kind).collect();

    Ok(required.iter().all(|kind| present.contains(kind)))
}

/// Inbound upload payload. Content arrives as opaque bytes; this module
/// never inspects them beyond size.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub kind: DocumentKind,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Receipt handed back to the uploader.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub document: StoredDocument,
    /// Enrollments that moved from awaiting-documents to awaiting-approval
    /// as a side effect of this upload.
    pub enrollments_advanced: usize,
}

/// Service owning document intake, manager verification, and the
/// completeness-driven enrollment transition.
pub struct DocumentService<R, M> {
    repository: Arc<R>,
    media: Arc<M>,
}

impl<R, M> DocumentService<R, M>
where
    R: PlatformStore + 'static,
    M: MediaStore + 'static,
{
    pub fn new(repository: Arc<R>, media: Arc<M>) -> Self {
        Self { repository, media }
    }

    /// Store an uploaded document, superseding any prior document of the
    /// same kind for this user. A storage failure is fatal to the action.
    pub fn upload(
        &self,
        actor: &Actor,
        request: UploadRequest,
    ) -> Result<UploadReceipt, WorkflowError> {
        if !ALLOWED_CONTENT_TYPES.contains(&request.content_type.as_str()) {
            return Err(WorkflowError::InvalidState(
                "only JPEG, PNG, and PDF uploads are accepted",
            ));
        }
        if request.content.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(WorkflowError::InvalidState(
                "uploads are limited to 10 MiB",
            ));
        }

        let folder = format!(
            "driving-school/{}/{}",
            actor.role.label(),
            request.kind.label()
        );
        let stored = self
            .media
            .store(&request.content, &folder, &request.file_name)?;

        let document = StoredDocument {
            id: DocumentId::generate(),
            owner_id: actor.id.clone(),
            kind: request.kind,
            file_url: stored.url,
            file_name: request.file_name,
            file_size: stored.size,
            uploaded_at: Utc::now(),
            verified: false,
            verified_by: None,
            verified_at: None,
        };
        let document = self.repository.replace_document(document)?;

        let enrollments_advanced = if actor.role == UserRole::Student {
            self.refresh_enrollment_gate(&actor.id)?
        } else {
            0
        };

        Ok(UploadReceipt {
            document,
            enrollments_advanced,
        })
    }

    /// Manager-granted verification. Monotonic: this workflow never clears
    /// the flag. Re-evaluates the owner's completeness afterwards so a
    /// verification landing after the final upload still opens the approval
    /// gate.
    pub fn verify(
        &self,
        actor: &Actor,
        document_id: &DocumentId,
    ) -> Result<StoredDocument, WorkflowError> {
        if actor.role != UserRole::Manager {
            return Err(WorkflowError::Forbidden(
                "only managers can verify documents",
            ));
        }

        let mut document = self
            .repository
            .find_document(document_id)?
            .ok_or(WorkflowError::NotFound("document"))?;

        document.verified = true;
        document.verified_by = Some(actor.id.clone());
        document.verified_at = Some(Utc::now());
        self.repository.update_document(document.clone())?;

        match self.repository.find_user(&document.owner_id)? {
            Some(owner) if owner.role == UserRole::Student => {
                self.refresh_enrollment_gate(&owner.id)?;
            }
            Some(_) => {}
            None => warn!(owner = %document.owner_id.0, "verified document owner has no account"),
        }

        Ok(document)
    }

    pub fn my_documents(&self, actor: &Actor) -> Result<Vec<StoredDocument>, WorkflowError> {
        Ok(self.repository.list_documents_by_owner(&actor.id)?)
    }

    /// Batch side effect of uploads and verifications: once the student's
    /// required set is complete, every enrollment still gathering documents
    /// moves on to await manager approval.
    fn refresh_enrollment_gate(&self, student: &UserId) -> Result<usize, WorkflowError> {
        if !documents_complete(self.repository.as_ref(), student, UserRole::Student)? {
            return Ok(0);
        }

        let moved = self.repository.advance_awaiting_documents(student)?;
        if moved > 0 {
            info!(student = %student.0, moved, "document set complete, enrollments now await approval");
        }
        Ok(moved)
    }
}

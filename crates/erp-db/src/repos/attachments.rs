//! Attachment metadata repository.
//!
//! Files attached to any record through a `(kind, id)` reference. Only the
//! metadata is stored; the bytes live wherever `file_path` points. The
//! uploader is the actor of the current unit of work, and every add and
//! remove goes through the audit change hook.

use chrono::Utc;

use erp_core::actor::{self, ActorId};
use erp_core::entities::Attachment;
use erp_core::errors::CoreError;
use erp_core::reference::{EntityKind, EntityRef};

use crate::error::DatabaseError;
use crate::helpers::{format_timestamp, get_opt_string, parse_datetime};
use crate::repos::audit::Change;
use crate::service::ErpService;

const MAX_PATH_LEN: usize = 255;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 100;
const MAX_MIME_LEN: usize = 100;

const ATTACHMENT_COLUMNS: &str = "id, entity_kind, entity_id, file_path, name, label, file_size,
     mime_type, uploaded_by, uploaded_at";

/// A file to attach. An empty `name` becomes the last component of
/// `file_path`.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub target: EntityRef,
    pub file_path: String,
    pub name: String,
    pub label: String,
    pub file_size: Option<i64>,
    pub mime_type: String,
}

impl NewAttachment {
    #[must_use]
    pub fn new(target: EntityRef, file_path: impl Into<String>) -> Self {
        Self {
            target,
            file_path: file_path.into(),
            name: String::new(),
            label: String::new(),
            file_size: None,
            mime_type: String::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn with_size(mut self, bytes: i64) -> Self {
        self.file_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Name to store, after defaulting.
    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.file_path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(self.file_path.as_str())
        } else {
            &self.name
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "attachment {field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn validate(new: &NewAttachment) -> Result<(), CoreError> {
    if new.file_path.trim().is_empty() {
        return Err(CoreError::Validation("attachment file path is empty".into()));
    }
    check_len("file path", &new.file_path, MAX_PATH_LEN)?;
    if new.display_name().is_empty() {
        return Err(CoreError::Validation(format!(
            "attachment name is empty and '{}' has no file name",
            new.file_path
        )));
    }
    check_len("name", new.display_name(), MAX_NAME_LEN)?;
    check_len("label", &new.label, MAX_LABEL_LEN)?;
    check_len("mime type", &new.mime_type, MAX_MIME_LEN)?;
    if let Some(size) = new.file_size.filter(|size| *size < 0) {
        return Err(CoreError::Validation(format!(
            "attachment size cannot be negative, got {size}"
        )));
    }
    Ok(())
}

fn row_to_attachment(row: &libsql::Row) -> Result<Attachment, DatabaseError> {
    Ok(Attachment {
        id: row.get::<i64>(0)?,
        target: EntityRef::new(EntityKind::new(row.get::<String>(1)?)?, row.get::<i64>(2)?),
        file_path: row.get::<String>(3)?,
        name: row.get::<String>(4)?,
        label: row.get::<String>(5)?,
        file_size: row.get::<Option<i64>>(6)?,
        mime_type: row.get::<String>(7)?,
        uploaded_by: get_opt_string(row, 8)?.map(ActorId::from),
        uploaded_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

impl ErpService {
    /// Store attachment metadata, crediting the current actor, and record
    /// the creation.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` for invalid metadata, `DatabaseError` if
    /// the write fails, and `DatabaseError::AuditWrite` if the audit entry
    /// cannot be written under the strict policy.
    pub async fn add_attachment(&self, new: &NewAttachment) -> Result<Attachment, DatabaseError> {
        validate(new)?;
        let uploaded_by = actor::get_current_actor();
        let now = format_timestamp(&Utc::now());
        let row = self
            .db()
            .query_row_with(
                &format!(
                    "INSERT INTO attachments (entity_kind, entity_id, file_path, name, label,
                         file_size, mime_type, uploaded_by, uploaded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     RETURNING {ATTACHMENT_COLUMNS}"
                ),
                || {
                    libsql::params![
                        new.target.kind.as_str(),
                        new.target.id,
                        new.file_path.as_str(),
                        new.display_name(),
                        new.label.as_str(),
                        new.file_size,
                        new.mime_type.as_str(),
                        uploaded_by.as_ref().map(ActorId::as_str),
                        now.as_str()
                    ]
                },
            )
            .await?
            .ok_or(DatabaseError::NoResult)?;
        let attachment = row_to_attachment(&row)?;

        self.record_change(&attachment, Change::Created).await?;
        tracing::info!(
            id = attachment.id,
            entity = %attachment.target,
            name = %attachment.name,
            "attachment added"
        );
        Ok(attachment)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_attachment(&self, id: i64) -> Result<Option<Attachment>, DatabaseError> {
        let row = self
            .db()
            .query_row_with(
                &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"),
                || [id],
            )
            .await?;
        row.as_ref().map(row_to_attachment).transpose()
    }

    /// Attachments of one record, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_attachments(
        &self,
        target: &EntityRef,
    ) -> Result<Vec<Attachment>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ATTACHMENT_COLUMNS} FROM attachments
                     WHERE entity_kind = ?1 AND entity_id = ?2
                     ORDER BY uploaded_at DESC, id DESC"
                ),
                || libsql::params![target.kind.as_str(), target.id],
            )
            .await?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next().await? {
            attachments.push(row_to_attachment(&row)?);
        }
        Ok(attachments)
    }

    /// Delete attachment metadata and record the deletion with the removed
    /// values as the before state.
    ///
    /// Returns `None` if no attachment has that id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails, and
    /// `DatabaseError::AuditWrite` if the audit entry cannot be written under
    /// the strict policy.
    pub async fn remove_attachment(&self, id: i64) -> Result<Option<Attachment>, DatabaseError> {
        let row = self
            .db()
            .query_row_with(
                &format!("DELETE FROM attachments WHERE id = ?1 RETURNING {ATTACHMENT_COLUMNS}"),
                || [id],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let removed = row_to_attachment(&row)?;

        self.record_change(&removed, Change::Deleted { before: None })
            .await?;
        tracing::info!(id, entity = %removed.target, "attachment removed");
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_service;
    use erp_core::actor::ActorContext;
    use erp_core::enums::AuditAction;
    use erp_core::snapshot::Auditable;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn student(id: i64) -> EntityRef {
        EntityRef::new(EntityKind::STUDENT, id)
    }

    #[tokio::test]
    async fn add_credits_current_actor_and_defaults_name() {
        let svc = test_service().await;
        let new = NewAttachment::new(student(14), "attachments/2025/07/marksheet.pdf")
            .with_label("Class XII marksheet")
            .with_size(120_400)
            .with_mime_type("application/pdf");
        let stored = actor::scope(ActorContext::for_actor("user:5"), svc.add_attachment(&new))
            .await
            .unwrap();

        assert_eq!(stored.name, "marksheet.pdf");
        assert_eq!(stored.target, student(14));
        assert_eq!(stored.file_size, Some(120_400));
        assert_eq!(stored.uploaded_by, Some(ActorId::new("user:5")));
        assert_eq!(svc.get_attachment(stored.id).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn anonymous_upload_has_no_uploader() {
        let svc = test_service().await;
        let stored = svc
            .add_attachment(&NewAttachment::new(student(1), "photo.jpg").with_name("Passport photo"))
            .await
            .unwrap();
        assert_eq!(stored.uploaded_by, None);
        assert_eq!(stored.name, "Passport photo");
        assert_eq!(stored.file_size, None);
    }

    #[tokio::test]
    async fn list_is_per_target_newest_first() {
        let svc = test_service().await;
        let first = svc
            .add_attachment(&NewAttachment::new(student(1), "a.pdf"))
            .await
            .unwrap();
        svc.add_attachment(&NewAttachment::new(student(2), "b.pdf"))
            .await
            .unwrap();
        let third = svc
            .add_attachment(&NewAttachment::new(student(1), "c.pdf"))
            .await
            .unwrap();

        let ids: Vec<i64> = svc
            .list_attachments(&student(1))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert!(
            svc.list_attachments(&EntityRef::new(EntityKind::FACULTY, 1))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn add_and_remove_are_audited() {
        let svc = test_service().await;
        let stored = actor::scope(ActorContext::for_actor("user:8"), async {
            let stored = svc
                .add_attachment(&NewAttachment::new(student(3), "tc.pdf").with_label("TC"))
                .await
                .unwrap();
            svc.remove_attachment(stored.id).await.unwrap().unwrap()
        })
        .await;

        assert_eq!(svc.get_attachment(stored.id).await.unwrap(), None);
        let history = svc.audit_history(&stored.entity_ref()).await.unwrap();
        assert_eq!(history.len(), 2);

        let delete = &history[0];
        assert_eq!(delete.action, AuditAction::Delete);
        assert_eq!(delete.actor, Some(ActorId::new("user:8")));
        let before = delete.before_state.as_ref().unwrap();
        assert_eq!(before.get("label"), Some(&serde_json::json!("TC")));
        assert_eq!(before.get("target"), Some(&serde_json::json!(3)));

        assert_eq!(history[1].action, AuditAction::Create);
        assert_eq!(history[1].after_state, Some(stored.snapshot()));
    }

    #[tokio::test]
    async fn removing_unknown_attachment_changes_nothing() {
        let svc = test_service().await;
        assert_eq!(svc.remove_attachment(404).await.unwrap(), None);
        let entries = svc
            .query_audit(&crate::repos::audit::AuditFilter::default())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[rstest]
    #[case(NewAttachment::new(student(1), "  "))]
    #[case(NewAttachment::new(student(1), "uploads/"))]
    #[case(NewAttachment::new(student(1), "a.pdf").with_size(-1))]
    #[case(NewAttachment::new(student(1), "a.pdf").with_label("x".repeat(MAX_LABEL_LEN + 1)))]
    #[case(NewAttachment::new(student(1), "a.pdf").with_mime_type("m".repeat(MAX_MIME_LEN + 1)))]
    #[tokio::test]
    async fn invalid_metadata_is_rejected(#[case] new: NewAttachment) {
        let svc = test_service().await;
        let err = svc.add_attachment(&new).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
        assert!(svc.list_attachments(&student(1)).await.unwrap().is_empty());
    }
}

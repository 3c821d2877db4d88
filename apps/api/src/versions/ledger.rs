//! Version ledger: append-only snapshots with publish/rollback semantics.
//!
//! Two invariants live here:
//! - snapshots are INSERTed, never overwritten;
//! - after any publish completes, at most one version of a template is
//!   published (unpublish-siblings and publish-target run in one transaction).

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::templates::models::TemplateRow;
use crate::versions::models::VersionRow;

/// Metadata attached to a new snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    pub version_number: String,
    pub version_type: &'static str,
    pub changelog: Option<String>,
    pub is_breaking: bool,
    pub backward_compatible: bool,
}

/// Captures the given template row as an immutable version snapshot.
/// Runs inside the caller's transaction so template write + snapshot are
/// all-or-nothing.
pub async fn insert_snapshot(
    tx: &mut Transaction<'_, Postgres>,
    template: &TemplateRow,
    meta: SnapshotMeta,
) -> Result<VersionRow, AppError> {
    let row: VersionRow = sqlx::query_as(
        r#"
        INSERT INTO template_versions
            (id, template_id, version_number, version_type, changelog,
             name, description, structure, design, tags,
             is_breaking, backward_compatible)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(template.id)
    .bind(&meta.version_number)
    .bind(meta.version_type)
    .bind(&meta.changelog)
    .bind(&template.name)
    .bind(&template.description)
    .bind(&template.structure)
    .bind(&template.design)
    .bind(&template.tags)
    .bind(meta.is_breaking)
    .bind(meta.backward_compatible)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn get(pool: &PgPool, version_id: Uuid) -> Result<VersionRow, AppError> {
    let row: Option<VersionRow> = sqlx::query_as("SELECT * FROM template_versions WHERE id = $1")
        .bind(version_id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Version {version_id} not found")))
}

/// Version history for a template, newest first.
pub async fn list(pool: &PgPool, template_id: Uuid) -> Result<Vec<VersionRow>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM template_versions WHERE template_id = $1 ORDER BY created_at DESC",
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?)
}

/// Publishes a version. With `unpublish_others`, siblings are unpublished in
/// the same transaction, so the at-most-one-published invariant holds even if
/// the process dies mid-operation.
pub async fn publish(
    pool: &PgPool,
    version_id: Uuid,
    unpublish_others: bool,
) -> Result<VersionRow, AppError> {
    let version = get(pool, version_id).await?;

    let mut tx = pool.begin().await?;
    if unpublish_others {
        sqlx::query(
            r#"
            UPDATE template_versions
            SET is_published = false, published_at = NULL
            WHERE template_id = $1 AND id <> $2 AND is_published
            "#,
        )
        .bind(version.template_id)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;
    }
    let row: VersionRow = sqlx::query_as(
        r#"
        UPDATE template_versions
        SET is_published = true, published_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(version_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(
        "Published version {version_id} (v{}) of template {}",
        row.version_number, row.template_id
    );
    Ok(row)
}

/// Restores a template's content/design/tags from a version snapshot.
///
/// Fails with `Mismatch` if the version belongs to a different template.
/// With `create_backup`, the pre-revert state is snapshotted first as
/// `<current>-backup-<unix-ts>`; backup and overwrite share one transaction.
pub async fn revert_to(
    pool: &PgPool,
    template_id: Uuid,
    version_id: Uuid,
    create_backup: bool,
) -> Result<TemplateRow, AppError> {
    let version = get(pool, version_id).await?;
    if version.template_id != template_id {
        return Err(AppError::Mismatch(format!(
            "Version {version_id} belongs to template {}, not {template_id}",
            version.template_id
        )));
    }

    let mut tx = pool.begin().await?;

    let current: Option<TemplateRow> =
        sqlx::query_as("SELECT * FROM templates WHERE id = $1 FOR UPDATE")
            .bind(template_id)
            .fetch_optional(&mut *tx)
            .await?;
    let current =
        current.ok_or_else(|| AppError::NotFound(format!("Template {template_id} not found")))?;

    if create_backup {
        let backup_number = format!(
            "{}-backup-{}",
            current.current_version,
            Utc::now().timestamp()
        );
        insert_snapshot(
            &mut tx,
            &current,
            SnapshotMeta {
                version_number: backup_number,
                version_type: "patch",
                changelog: Some(format!("Automatic backup before revert to {version_id}")),
                is_breaking: false,
                backward_compatible: true,
            },
        )
        .await?;
    }

    let row: TemplateRow = sqlx::query_as(
        r#"
        UPDATE templates SET
            name = $2,
            description = $3,
            structure = $4,
            design = $5,
            tags = $6,
            current_version = $7,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(template_id)
    .bind(&version.name)
    .bind(&version.description)
    .bind(&version.structure)
    .bind(&version.design)
    .bind(&version.tags)
    .bind(&version.version_number)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        "Reverted template {template_id} to version {version_id} (v{})",
        version.version_number
    );
    Ok(row)
}

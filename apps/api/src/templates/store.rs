use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::templates::models::{
    TemplateCreate, TemplateFilters, TemplateRow, TemplateUpdate,
};
use crate::templates::resolver::ensure_no_cycle;
use crate::templates::validation::{slugify, validate_structure};
use crate::versions::ledger::{self, SnapshotMeta};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Options for deleting a template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteOptions {
    #[serde(default)]
    pub hard: bool,
    #[serde(default)]
    pub transfer_dependencies_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub error: String,
}

/// Per-item outcome of a bulk mutation. The loop keeps going past individual
/// failures; the caller gets a success count plus per-id errors.
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub succeeded: usize,
    pub failed: Vec<BulkFailure>,
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<TemplateRow, AppError> {
    let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))
}

/// Creates a template and its initial major version snapshot in one transaction.
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    req: TemplateCreate,
) -> Result<TemplateRow, AppError> {
    actor.require_admin()?;
    validate_structure(&req.structure)?;

    if let Some(parent_id) = req.parent_template_id {
        // Existence only: a fresh id cannot close a cycle, but the parent's
        // own chain must already be walkable.
        get(pool, parent_id).await?;
    }
    if let Some(base_id) = req.base_template_id {
        get(pool, base_id).await?;
    }

    let id = Uuid::new_v4();
    let slug = unique_slug(pool, &req.name).await?;
    let version = req.version.clone().unwrap_or_else(|| "1.0.0".to_string());
    let structure = serde_json::to_value(&req.structure).map_err(anyhow::Error::from)?;
    let design = serde_json::to_value(&req.design).map_err(anyhow::Error::from)?;

    let mut tx = pool.begin().await?;

    let row: TemplateRow = sqlx::query_as(
        r#"
        INSERT INTO templates
            (id, name, slug, description, category, document_kind,
             structure, design, parent_template_id, base_template_id,
             is_base_template, is_variant, is_draft, is_public, is_premium,
             tags, current_version, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&req.name)
    .bind(&slug)
    .bind(&req.description)
    .bind(req.category.as_str())
    .bind(req.document_kind.as_str())
    .bind(&structure)
    .bind(&design)
    .bind(req.parent_template_id)
    .bind(req.base_template_id)
    .bind(req.is_base_template)
    .bind(req.is_variant)
    .bind(req.is_draft)
    .bind(req.is_public)
    .bind(req.is_premium)
    .bind(&req.tags)
    .bind(&version)
    .bind(actor.user_id)
    .fetch_one(&mut *tx)
    .await?;

    ledger::insert_snapshot(
        &mut tx,
        &row,
        SnapshotMeta {
            version_number: version.clone(),
            version_type: "major",
            changelog: Some("Initial version".to_string()),
            is_breaking: false,
            backward_compatible: true,
        },
    )
    .await?;

    tx.commit().await?;
    info!("Created template {id} ('{}') v{version}", row.name);
    Ok(row)
}

/// Applies a sparse patch; appends a minor version snapshot of the new state
/// when the patch touches versioned fields and bumps the version string.
/// Re-parenting is cycle-checked before anything is written.
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    patch: TemplateUpdate,
) -> Result<TemplateRow, AppError> {
    actor.require_admin()?;
    let current = get(pool, id).await?;

    if let Some(structure) = &patch.structure {
        validate_structure(structure)?;
    }
    if let Some(Some(parent_id)) = patch.parent_template_id {
        get(pool, parent_id).await?;
        ensure_no_cycle(pool, id, parent_id).await?;
    }
    if let Some(Some(base_id)) = patch.base_template_id {
        get(pool, base_id).await?;
    }

    let snapshot_after = patch.should_snapshot(&current.current_version);
    let new_version = if snapshot_after {
        patch.version.clone().unwrap_or(current.current_version.clone())
    } else {
        current.current_version.clone()
    };

    let structure = match &patch.structure {
        Some(s) => serde_json::to_value(s).map_err(anyhow::Error::from)?,
        None => current.structure.clone(),
    };
    let design = match &patch.design {
        Some(d) => serde_json::to_value(d).map_err(anyhow::Error::from)?,
        None => current.design.clone(),
    };

    // Double-optional fields: outer None keeps the current value, Some(None)
    // writes NULL (detach / clear).
    let description = match &patch.description {
        Some(d) => d.clone(),
        None => current.description.clone(),
    };
    let parent_template_id = match patch.parent_template_id {
        Some(p) => p,
        None => current.parent_template_id,
    };
    let base_template_id = match patch.base_template_id {
        Some(b) => b,
        None => current.base_template_id,
    };

    let mut tx = pool.begin().await?;

    let row: TemplateRow = sqlx::query_as(
        r#"
        UPDATE templates SET
            name = $2,
            description = $3,
            category = $4,
            structure = $5,
            design = $6,
            parent_template_id = $7,
            base_template_id = $8,
            is_base_template = $9,
            is_variant = $10,
            is_active = $11,
            is_draft = $12,
            is_public = $13,
            is_premium = $14,
            is_featured = $15,
            review_status = $16,
            tags = $17,
            current_version = $18,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(patch.name.as_ref().unwrap_or(&current.name))
    .bind(&description)
    .bind(
        patch
            .category
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| current.category.clone()),
    )
    .bind(&structure)
    .bind(&design)
    .bind(parent_template_id)
    .bind(base_template_id)
    .bind(patch.is_base_template.unwrap_or(current.is_base_template))
    .bind(patch.is_variant.unwrap_or(current.is_variant))
    .bind(patch.is_active.unwrap_or(current.is_active))
    .bind(patch.is_draft.unwrap_or(current.is_draft))
    .bind(patch.is_public.unwrap_or(current.is_public))
    .bind(patch.is_premium.unwrap_or(current.is_premium))
    .bind(patch.is_featured.unwrap_or(current.is_featured))
    .bind(
        patch
            .review_status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| current.review_status.clone()),
    )
    .bind(patch.tags.as_ref().unwrap_or(&current.tags))
    .bind(&new_version)
    .fetch_one(&mut *tx)
    .await?;

    if snapshot_after {
        ledger::insert_snapshot(
            &mut tx,
            &row,
            SnapshotMeta {
                version_number: new_version.clone(),
                version_type: "minor",
                changelog: patch.changelog.clone(),
                is_breaking: false,
                backward_compatible: true,
            },
        )
        .await?;
        info!("Template {id} updated, snapshot appended as v{new_version}");
    } else {
        info!("Template {id} updated in place (no version bump)");
    }

    tx.commit().await?;
    Ok(row)
}

/// Soft delete flips `is_active`; hard delete requires dependents (child
/// templates, customizations) to be transferred first, then removes the row.
/// Version and usage rows go with it via FK cascade.
pub async fn delete(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    opts: DeleteOptions,
) -> Result<(), AppError> {
    actor.require_admin()?;
    get(pool, id).await?;

    if !opts.hard {
        sqlx::query("UPDATE templates SET is_active = false, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        info!("Soft-deleted template {id}");
        return Ok(());
    }

    let child_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM templates WHERE parent_template_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
    let customization_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM customizations WHERE template_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

    let transfer = opts.transfer_dependencies_to;
    if (child_count > 0 || customization_count > 0) && transfer.is_none() {
        return Err(AppError::Dependency(format!(
            "Template {id} has {child_count} child template(s) and {customization_count} \
             customization(s); supply transfer_dependencies_to or delete them first"
        )));
    }
    if let Some(target) = transfer {
        if target == id {
            return Err(AppError::Validation(
                "Cannot transfer dependents to the template being deleted".to_string(),
            ));
        }
        get(pool, target).await?;
    }

    let mut tx = pool.begin().await?;
    if let Some(target) = transfer {
        sqlx::query("UPDATE templates SET parent_template_id = $1 WHERE parent_template_id = $2")
            .bind(target)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE templates SET base_template_id = $1 WHERE base_template_id = $2")
            .bind(target)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE customizations SET template_id = $1 WHERE template_id = $2")
            .bind(target)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM templates WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        "Hard-deleted template {id} (transferred {} dependents)",
        child_count + customization_count
    );
    Ok(())
}

/// Discovery listing with predicate filters, ILIKE search and paging.
pub async fn list(pool: &PgPool, filters: &TemplateFilters) -> Result<Vec<TemplateRow>, AppError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM templates WHERE 1=1");

    if let Some(category) = filters.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(kind) = filters.document_kind {
        qb.push(" AND document_kind = ").push_bind(kind.as_str());
    }
    if let Some(v) = filters.is_active {
        qb.push(" AND is_active = ").push_bind(v);
    }
    if let Some(v) = filters.is_draft {
        qb.push(" AND is_draft = ").push_bind(v);
    }
    if let Some(v) = filters.is_public {
        qb.push(" AND is_public = ").push_bind(v);
    }
    if let Some(v) = filters.is_premium {
        qb.push(" AND is_premium = ").push_bind(v);
    }
    if let Some(v) = filters.is_featured {
        qb.push(" AND is_featured = ").push_bind(v);
    }
    if let Some(status) = filters.review_status {
        qb.push(" AND review_status = ").push_bind(status.as_str());
    }
    if let Some(min) = filters.min_rating {
        qb.push(" AND avg_rating >= ").push_bind(min);
    }
    if let Some(min) = filters.min_usage {
        qb.push(" AND usage_count >= ").push_bind(min);
    }
    if let Some(after) = filters.created_after {
        qb.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(before) = filters.created_before {
        qb.push(" AND created_at <= ").push_bind(before);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE ")
            .push_bind(pattern)
            .push("))");
    }

    match filters.sort.as_deref() {
        Some("usage") => qb.push(" ORDER BY usage_count DESC, created_at DESC"),
        Some("rating") => qb.push(" ORDER BY avg_rating DESC NULLS LAST, created_at DESC"),
        _ => qb.push(" ORDER BY created_at DESC"),
    };

    let limit = filters
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(filters.offset.unwrap_or(0).max(0));

    Ok(qb.build_query_as::<TemplateRow>().fetch_all(pool).await?)
}

/// Clones a template as a draft variant of the source's design root.
pub async fn duplicate(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    new_name: Option<String>,
) -> Result<TemplateRow, AppError> {
    actor.require_admin()?;
    let source = get(pool, id).await?;

    let name = new_name.unwrap_or_else(|| format!("{} (copy)", source.name));
    let slug = unique_slug(pool, &name).await?;
    let base_id = source.base_template_id.unwrap_or(source.id);

    let mut tx = pool.begin().await?;
    let row: TemplateRow = sqlx::query_as(
        r#"
        INSERT INTO templates
            (id, name, slug, description, category, document_kind,
             structure, design, parent_template_id, base_template_id,
             is_base_template, is_variant, is_draft, is_public, is_premium,
             tags, current_version, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                false, true, true, false, $11, $12, '1.0.0', $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&slug)
    .bind(&source.description)
    .bind(&source.category)
    .bind(&source.document_kind)
    .bind(&source.structure)
    .bind(&source.design)
    .bind(source.parent_template_id)
    .bind(base_id)
    .bind(source.is_premium)
    .bind(&source.tags)
    .bind(actor.user_id)
    .fetch_one(&mut *tx)
    .await?;

    ledger::insert_snapshot(
        &mut tx,
        &row,
        SnapshotMeta {
            version_number: "1.0.0".to_string(),
            version_type: "major",
            changelog: Some(format!("Duplicated from template {id}")),
            is_breaking: false,
            backward_compatible: true,
        },
    )
    .await?;
    tx.commit().await?;

    info!("Duplicated template {id} into {} ('{name}')", row.id);
    Ok(row)
}

/// Bulk status update; continues past per-item failures.
pub async fn bulk_update(
    pool: &PgPool,
    actor: &Actor,
    ids: &[Uuid],
    patch: &TemplateUpdate,
) -> Result<BulkResult, AppError> {
    actor.require_admin()?;
    let mut result = BulkResult {
        succeeded: 0,
        failed: Vec::new(),
    };
    for &id in ids {
        match update(pool, actor, id, patch.clone()).await {
            Ok(_) => result.succeeded += 1,
            Err(e) => result.failed.push(BulkFailure {
                id,
                error: e.to_string(),
            }),
        }
    }
    Ok(result)
}

/// Bulk delete; continues past per-item failures.
pub async fn bulk_delete(
    pool: &PgPool,
    actor: &Actor,
    ids: &[Uuid],
    opts: &DeleteOptions,
) -> Result<BulkResult, AppError> {
    actor.require_admin()?;
    let mut result = BulkResult {
        succeeded: 0,
        failed: Vec::new(),
    };
    for &id in ids {
        match delete(pool, actor, id, opts.clone()).await {
            Ok(()) => result.succeeded += 1,
            Err(e) => result.failed.push(BulkFailure {
                id,
                error: e.to_string(),
            }),
        }
    }
    Ok(result)
}

/// Derives a unique slug, suffixing a short random tail on collision.
async fn unique_slug(pool: &PgPool, name: &str) -> Result<String, AppError> {
    let base = slugify(name);
    let base = if base.is_empty() { "template".to_string() } else { base };

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE slug = $1)")
        .bind(&base)
        .fetch_one(pool)
        .await?;
    if !taken {
        return Ok(base);
    }
    let tail = Uuid::new_v4().simple().to_string();
    Ok(format!("{base}-{}", &tail[..8]))
}

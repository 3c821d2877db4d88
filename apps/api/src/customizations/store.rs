use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::customizations::models::{
    CustomizationPatch, CustomizationRow, GrantPermission, GrantRow,
};
use crate::errors::AppError;
use crate::templates::store as templates;

/// Body for `POST /api/v1/customizations`: upsert by `id` when provided.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveCustomization {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub template_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub patch: CustomizationPatch,
}

fn to_json<T: serde::Serialize>(v: &Option<T>) -> Result<Option<serde_json::Value>, AppError> {
    v.as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<CustomizationRow, AppError> {
    let row: Option<CustomizationRow> =
        sqlx::query_as("SELECT * FROM customizations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Customization {id} not found")))
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<CustomizationRow>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM customizations WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Upserts a customization. Updating someone else's row is `Forbidden`;
/// the referenced template must exist.
pub async fn save(
    pool: &PgPool,
    actor: &Actor,
    req: SaveCustomization,
) -> Result<CustomizationRow, AppError> {
    templates::get(pool, req.template_id).await?;
    let patch = &req.patch;

    let color = to_json(&patch.color_changes)?;
    let typography = to_json(&patch.typography_changes)?;
    let layout = to_json(&patch.layout_changes)?;
    let sections = to_json(&patch.section_changes)?;
    let spacing = to_json(&patch.spacing_changes)?;
    let borders = to_json(&patch.border_changes)?;
    let content = to_json(&patch.content_changes)?;

    let row: CustomizationRow = if let Some(id) = req.id {
        let existing = get(pool, id).await?;
        if existing.user_id != actor.user_id {
            return Err(AppError::Forbidden);
        }
        sqlx::query_as(
            r#"
            UPDATE customizations SET
                template_id = $2,
                name = $3,
                color_changes = $4,
                typography_changes = $5,
                layout_changes = $6,
                section_changes = $7,
                spacing_changes = $8,
                border_changes = $9,
                content_changes = $10,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.template_id)
        .bind(&req.name)
        .bind(&color)
        .bind(&typography)
        .bind(&layout)
        .bind(&sections)
        .bind(&spacing)
        .bind(&borders)
        .bind(&content)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            INSERT INTO customizations
                (id, user_id, template_id, name,
                 color_changes, typography_changes, layout_changes,
                 section_changes, spacing_changes, border_changes, content_changes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id)
        .bind(req.template_id)
        .bind(&req.name)
        .bind(&color)
        .bind(&typography)
        .bind(&layout)
        .bind(&sections)
        .bind(&spacing)
        .bind(&borders)
        .bind(&content)
        .fetch_one(pool)
        .await?
    };

    info!(
        "Saved customization {} for user {} on template {}",
        row.id, actor.user_id, req.template_id
    );
    Ok(row)
}

/// Owner-only delete. Grants cascade with the row.
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), AppError> {
    let row = get(pool, id).await?;
    if row.user_id != actor.user_id && !actor.is_admin {
        return Err(AppError::Forbidden);
    }
    sqlx::query("DELETE FROM customizations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    info!("Deleted customization {id}");
    Ok(())
}

/// Mints (or returns) a share token for the customization. Owner-only.
pub async fn share(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<String, AppError> {
    let row = get(pool, id).await?;
    if row.user_id != actor.user_id {
        return Err(AppError::Forbidden);
    }
    if let Some(token) = row.share_token {
        return Ok(token);
    }
    let token = Uuid::new_v4().simple().to_string();
    sqlx::query("UPDATE customizations SET share_token = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(&token)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Grants a user view/edit/clone permission on a customization. Owner-only.
pub async fn grant(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    grantee_user_id: Uuid,
    permission: GrantPermission,
) -> Result<GrantRow, AppError> {
    let row = get(pool, id).await?;
    if row.user_id != actor.user_id {
        return Err(AppError::Forbidden);
    }
    let grant: GrantRow = sqlx::query_as(
        r#"
        INSERT INTO customization_grants (customization_id, grantee_user_id, permission)
        VALUES ($1, $2, $3)
        ON CONFLICT (customization_id, grantee_user_id)
        DO UPDATE SET permission = EXCLUDED.permission
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(grantee_user_id)
    .bind(permission.as_str())
    .fetch_one(pool)
    .await?;
    Ok(grant)
}

/// Read access: owner, admin, share-token holder, or any grantee.
pub async fn can_view(
    pool: &PgPool,
    actor: &Actor,
    row: &CustomizationRow,
    token: Option<&str>,
) -> Result<bool, AppError> {
    if row.user_id == actor.user_id || actor.is_admin {
        return Ok(true);
    }
    if let (Some(share), Some(supplied)) = (row.share_token.as_deref(), token) {
        if share == supplied {
            return Ok(true);
        }
    }
    let granted: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM customization_grants
         WHERE customization_id = $1 AND grantee_user_id = $2)",
    )
    .bind(row.id)
    .bind(actor.user_id)
    .fetch_one(pool)
    .await?;
    Ok(granted)
}

/// Bumps the usage counters atomically in place.
pub async fn mark_applied(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE customizations SET times_used = times_used + 1, last_used_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::design::ColorPalette;
    use serde_json::json;

    #[test]
    fn test_patch_dimensions_serialize_to_columns() {
        let patch = CustomizationPatch {
            color_changes: Some(ColorPalette {
                primary: Some("#112233".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let color = to_json(&patch.color_changes).unwrap().unwrap();
        assert_eq!(color["primary"], json!("#112233"));
        assert!(to_json(&patch.layout_changes).unwrap().is_none());
        assert!(to_json(&patch.content_changes).unwrap().is_none());
    }

    #[test]
    fn test_save_body_upserts_by_optional_id() {
        let raw = json!({
            "template_id": Uuid::new_v4(),
            "patch": {"color_changes": {"primary": "#fff"}}
        });
        let req: SaveCustomization = serde_json::from_value(raw).unwrap();
        assert!(req.id.is_none());
        assert!(req.patch.color_changes.is_some());
    }
}

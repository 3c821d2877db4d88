//! Usage recorder: append-only event inserts plus atomic counter upkeep on
//! the owning template. Counters are bumped in place (`x = x + 1`) and the
//! rating aggregate is recomputed in a single statement, so concurrent events
//! cannot lose updates to an application-level read-modify-write.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::customizations::store as customizations;
use crate::errors::AppError;
use crate::templates::store as templates;
use crate::usage::models::{RecordUsage, UsageEventRow};

fn validate_rating(rating: Option<i16>) -> Result<(), AppError> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => Err(AppError::Validation(format!(
            "Rating must be between 1 and 5, got {r}"
        ))),
        _ => Ok(()),
    }
}

pub async fn record(
    pool: &PgPool,
    actor: &Actor,
    req: RecordUsage,
) -> Result<UsageEventRow, AppError> {
    validate_rating(req.rating)?;
    templates::get(pool, req.template_id).await?;
    if let Some(customization_id) = req.customization_id {
        customizations::get(pool, customization_id).await?;
    }

    let row: UsageEventRow = sqlx::query_as(
        r#"
        INSERT INTO template_usage
            (id, user_id, template_id, customization_id, document_id, action,
             device_type, session_id, country_code, duration_ms, render_ms,
             rating, feedback, converted_to_document)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(actor.user_id)
    .bind(req.template_id)
    .bind(req.customization_id)
    .bind(req.document_id)
    .bind(req.action.as_str())
    .bind(&req.device_type)
    .bind(&req.session_id)
    .bind(&req.country_code)
    .bind(req.duration_ms)
    .bind(req.render_ms)
    .bind(req.rating)
    .bind(&req.feedback)
    .bind(req.converted_to_document)
    .fetch_one(pool)
    .await?;

    sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = $1")
        .bind(req.template_id)
        .execute(pool)
        .await?;

    if req.rating.is_some() {
        refresh_rating(pool, req.template_id).await?;
    }

    info!(
        "Recorded {} event {} on template {}",
        req.action.as_str(),
        row.id,
        req.template_id
    );
    Ok(row)
}

/// Recomputes the cached rating aggregate from the event log in one
/// statement. The subquery and the write share a snapshot, so concurrent
/// rating events serialize correctly.
async fn refresh_rating(pool: &PgPool, template_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE templates t
        SET avg_rating = s.avg, total_ratings = s.cnt
        FROM (
            SELECT AVG(rating)::float8 AS avg, COUNT(*) AS cnt
            FROM template_usage
            WHERE template_id = $1 AND rating IS NOT NULL
        ) s
        WHERE t.id = $1
        "#,
    )
    .bind(template_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_in_range_accepted() {
        assert!(validate_rating(None).is_ok());
        assert!(validate_rating(Some(1)).is_ok());
        assert!(validate_rating(Some(5)).is_ok());
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        assert!(matches!(
            validate_rating(Some(0)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_rating(Some(6)),
            Err(AppError::Validation(_))
        ));
    }
}

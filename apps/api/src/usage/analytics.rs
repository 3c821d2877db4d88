//! Read-only aggregate queries over the usage log. Nothing here mutates past
//! events; the only writes are the cached-rate refresh on the template row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;

/// Optional time window shared by the analytics queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.to.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelReport {
    pub previews: i64,
    pub selections: i64,
    pub conversions: i64,
    /// selections / previews
    pub selection_rate: f64,
    /// conversions / previews
    pub conversion_rate: f64,
}

/// Pure funnel math, divide-by-zero guarded.
pub fn compute_funnel(previews: i64, selections: i64, conversions: i64) -> FunnelReport {
    let rate = |num: i64, den: i64| {
        if den > 0 {
            num as f64 / den as f64
        } else {
            0.0
        }
    };
    FunnelReport {
        previews,
        selections,
        conversions,
        selection_rate: rate(selections, previews),
        conversion_rate: rate(conversions, previews),
    }
}

#[derive(Debug, FromRow)]
struct FunnelCounts {
    previews: i64,
    selections: i64,
    conversions: i64,
}

pub async fn funnel(
    pool: &PgPool,
    template_id: Uuid,
    range: &TimeRange,
) -> Result<FunnelReport, AppError> {
    let (from, to) = range.bounds();
    let counts: FunnelCounts = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE action = 'preview') AS previews,
            COUNT(*) FILTER (WHERE action = 'select') AS selections,
            COUNT(*) FILTER (WHERE action = 'select' AND converted_to_document) AS conversions
        FROM template_usage
        WHERE template_id = $1 AND created_at BETWEEN $2 AND $3
        "#,
    )
    .bind(template_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;
    Ok(compute_funnel(
        counts.previews,
        counts.selections,
        counts.conversions,
    ))
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementReport {
    pub distinct_users: i64,
    pub distinct_sessions: i64,
    pub events_by_action: Vec<ActionCount>,
    pub avg_duration_ms: Option<f64>,
}

pub async fn engagement(
    pool: &PgPool,
    template_id: Uuid,
    range: &TimeRange,
) -> Result<EngagementReport, AppError> {
    let (from, to) = range.bounds();

    #[derive(FromRow)]
    struct Totals {
        distinct_users: i64,
        distinct_sessions: i64,
        avg_duration_ms: Option<f64>,
    }
    let totals: Totals = sqlx::query_as(
        r#"
        SELECT
            COUNT(DISTINCT user_id) AS distinct_users,
            COUNT(DISTINCT session_id) AS distinct_sessions,
            AVG(duration_ms)::float8 AS avg_duration_ms
        FROM template_usage
        WHERE template_id = $1 AND created_at BETWEEN $2 AND $3
        "#,
    )
    .bind(template_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let events_by_action: Vec<ActionCount> = sqlx::query_as(
        r#"
        SELECT action, COUNT(*) AS count
        FROM template_usage
        WHERE template_id = $1 AND created_at BETWEEN $2 AND $3
        GROUP BY action
        ORDER BY count DESC
        "#,
    )
    .bind(template_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(EngagementReport {
        distinct_users: totals.distinct_users,
        distinct_sessions: totals.distinct_sessions,
        events_by_action,
        avg_duration_ms: totals.avg_duration_ms,
    })
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PerformanceReport {
    pub total_events: i64,
    pub exports: i64,
    pub avg_render_ms: Option<f64>,
    pub export_rate: f64,
}

pub async fn performance(
    pool: &PgPool,
    template_id: Uuid,
    range: &TimeRange,
) -> Result<PerformanceReport, AppError> {
    let (from, to) = range.bounds();

    #[derive(FromRow)]
    struct Counts {
        total_events: i64,
        exports: i64,
        selections: i64,
        avg_render_ms: Option<f64>,
    }
    let counts: Counts = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total_events,
            COUNT(*) FILTER (WHERE action = 'export') AS exports,
            COUNT(*) FILTER (WHERE action = 'select') AS selections,
            AVG(render_ms)::float8 AS avg_render_ms
        FROM template_usage
        WHERE template_id = $1 AND created_at BETWEEN $2 AND $3
        "#,
    )
    .bind(template_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let export_rate = if counts.selections > 0 {
        counts.exports as f64 / counts.selections as f64
    } else {
        0.0
    };
    Ok(PerformanceReport {
        total_events: counts.total_events,
        exports: counts.exports,
        avg_render_ms: counts.avg_render_ms,
        export_rate,
    })
}

/// Refreshes the cached conversion/completion/export rates on the template
/// row from the full event log — one statement, no read-modify-write.
pub async fn refresh_metrics(pool: &PgPool, template_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE templates t
        SET conversion_rate = s.conversion_rate,
            completion_rate = s.completion_rate,
            export_rate = s.export_rate
        FROM (
            SELECT
                COUNT(*) FILTER (WHERE action = 'select' AND converted_to_document)::float8
                    / NULLIF(COUNT(*) FILTER (WHERE action = 'preview'), 0) AS conversion_rate,
                COUNT(*) FILTER (WHERE action = 'select' AND converted_to_document)::float8
                    / NULLIF(COUNT(*) FILTER (WHERE action = 'select'), 0) AS completion_rate,
                COUNT(*) FILTER (WHERE action = 'export')::float8
                    / NULLIF(COUNT(*) FILTER (WHERE action = 'select'), 0) AS export_rate
            FROM template_usage
            WHERE template_id = $1
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
    fn test_funnel_three_previews_one_converted_select() {
        let report = compute_funnel(3, 1, 1);
        assert_eq!(report.previews, 3);
        assert_eq!(report.selections, 1);
        assert_eq!(report.conversions, 1);
        assert!((report.selection_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.conversion_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_funnel_zero_previews_does_not_divide() {
        let report = compute_funnel(0, 0, 0);
        assert_eq!(report.selection_rate, 0.0);
        assert_eq!(report.conversion_rate, 0.0);
    }

    #[test]
    fn test_funnel_no_conversions() {
        let report = compute_funnel(10, 4, 0);
        assert_eq!(report.conversion_rate, 0.0);
        assert!((report.selection_rate - 0.4).abs() < 1e-9);
    }
}

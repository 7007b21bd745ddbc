use sqlx::PgPool;
use time::{Date, OffsetDateTime};

/// Audit trail of generated reports. Nothing is read back from this table by
/// the service itself; rows expire and can be purged out of band.
pub struct GeneratedReport;

impl GeneratedReport {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        db: &PgPool,
        user_id: i32,
        report_type: &str,
        report_data: &serde_json::Value,
        start_date: Option<Date>,
        end_date: Option<Date>,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO generated_reports (user_id, report_type, report_data, start_date, end_date, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(report_type)
        .bind(report_data)
        .bind(start_date)
        .bind(end_date)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }
}

//! Postgres-backed `LoanStore`.
//!
//! Every changeset runs inside one transaction. The application update carries the expected
//! status and the observed `updated_at` in its `WHERE` clause, so a concurrent writer that
//! already touched the row makes the update match zero rows and the whole changeset rolls back.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::domain::{
    ApplicationId, AuditLog, ChatMessage, Details, KycDocument, LoanApplication, LoanStatus,
    SessionId,
};
use super::repository::{ApplicationWrite, Changeset, LoanStore, StoreError};

pub struct PgLoanStore {
    pool: PgPool,
}

impl PgLoanStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migration failed: {err}")))
    }

    /// Round-trip a trivial query; used by the readiness endpoint.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_application(
        tx: &mut Transaction<'_, Postgres>,
        record: &LoanApplication,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO loan_applications (
                id, applicant_name, requested_amount, approved_amount, monthly_income, status,
                credit_score, risk_level, risk_score, dti_ratio, rejection_reason,
                sanction_letter_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.0)
        .bind(record.applicant_name.as_deref())
        .bind(to_db(record.requested_amount)?)
        .bind(record.approved_amount.map(to_db).transpose()?)
        .bind(record.monthly_income.map(to_db).transpose()?)
        .bind(record.status.label())
        .bind(record.credit_score.map(i32::from))
        .bind(record.risk_level.map(|level| level.label()))
        .bind(record.risk_score)
        .bind(record.dti_ratio)
        .bind(record.rejection_reason.as_deref())
        .bind(record.sanction_letter_url.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::Conflict)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_application(
        tx: &mut Transaction<'_, Postgres>,
        expected: LoanStatus,
        observed_at: DateTime<Utc>,
        record: &LoanApplication,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE loan_applications
            SET applicant_name = $2,
                approved_amount = $3,
                monthly_income = $4,
                status = $5,
                credit_score = $6,
                risk_level = $7,
                risk_score = $8,
                dti_ratio = $9,
                rejection_reason = $10,
                sanction_letter_url = $11,
                updated_at = $12
            WHERE id = $1 AND status = $13 AND updated_at = $14
            "#,
        )
        .bind(record.id.0)
        .bind(record.applicant_name.as_deref())
        .bind(record.approved_amount.map(to_db).transpose()?)
        .bind(record.monthly_income.map(to_db).transpose()?)
        .bind(record.status.label())
        .bind(record.credit_score.map(i32::from))
        .bind(record.risk_level.map(|level| level.label()))
        .bind(record.risk_score)
        .bind(record.dti_ratio)
        .bind(record.rejection_reason.as_deref())
        .bind(record.sanction_letter_url.as_deref())
        .bind(record.updated_at)
        .bind(expected.label())
        .bind(observed_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM loan_applications WHERE id = $1")
                .bind(record.id.0)
                .fetch_optional(&mut **tx)
                .await?;

        let Some(label) = current else {
            return Err(StoreError::NotFound);
        };
        let found: LoanStatus = parse_label(&label)?;
        if found == expected {
            Err(StoreError::StaleRecord(record.id))
        } else {
            Err(StoreError::StatusConflict { expected, found })
        }
    }

    async fn insert_document(
        tx: &mut Transaction<'_, Postgres>,
        document: &KycDocument,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kyc_documents (
                id, application_id, document_type, file_url, extracted_name, extracted_id,
                extracted_dob, extracted_address, ocr_confidence, verification_status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id)
        .bind(document.application_id.0)
        .bind(document.document_type.label())
        .bind(&document.file_url)
        .bind(document.extracted_name.as_deref())
        .bind(document.extracted_id.as_deref())
        .bind(document.extracted_dob.as_deref())
        .bind(document.extracted_address.as_deref())
        .bind(document.ocr_confidence)
        .bind(document.verification_status.label())
        .bind(document.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_audit(
        tx: &mut Transaction<'_, Postgres>,
        entry: &AuditLog,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, application_id, action, agent_type, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.application_id.map(|id| id.0))
        .bind(&entry.action)
        .bind(entry.agent_type.label())
        .bind(Json(&entry.details))
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_message(
        tx: &mut Transaction<'_, Postgres>,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (
                id, session_id, application_id, role, content, agent_type, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(message.id)
        .bind(message.session_id.as_str())
        .bind(message.application_id.map(|id| id.0))
        .bind(message.role.label())
        .bind(&message.content)
        .bind(message.agent_type.map(|agent| agent.label()))
        .bind(Json(&message.metadata))
        .bind(message.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        changeset: &Changeset,
    ) -> Result<(), StoreError> {
        match &changeset.application {
            Some(ApplicationWrite::Create(record)) => Self::insert_application(tx, record).await?,
            Some(ApplicationWrite::Update {
                expected,
                observed_at,
                record,
            }) => Self::update_application(tx, *expected, *observed_at, record).await?,
            None => {}
        }
        if let Some(document) = &changeset.document {
            Self::insert_document(tx, document).await?;
        }
        for entry in &changeset.audit {
            Self::insert_audit(tx, entry).await?;
        }
        for message in &changeset.messages {
            Self::insert_message(tx, message).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LoanStore for PgLoanStore {
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        match Self::apply(&mut tx, &changeset).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "changeset rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, applicant_name, requested_amount, approved_amount, monthly_income, status,
                   credit_score, risk_level, risk_score, dti_ratio, rejection_reason,
                   sanction_letter_url, created_at, updated_at
            FROM loan_applications
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    async fn documents(&self, id: &ApplicationId) -> Result<Vec<KycDocument>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, document_type, file_url, extracted_name, extracted_id,
                   extracted_dob, extracted_address, ocr_confidence, verification_status, created_at
            FROM kyc_documents
            WHERE application_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn audit_trail(&self, id: &ApplicationId) -> Result<Vec<AuditLog>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, action, agent_type, details, created_at
            FROM audit_logs
            WHERE application_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(audit_from_row).collect()
    }

    async fn session_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, application_id, role, content, agent_type, metadata, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

fn to_db(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("amount {value} exceeds BIGINT")))
}

fn from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative amount {value}")))
}

fn parse_label<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| StoreError::Corrupt(err.to_string()))
}

fn application_from_row(row: &PgRow) -> Result<LoanApplication, StoreError> {
    let credit_score: Option<i32> = row.try_get("credit_score")?;
    let credit_score = credit_score
        .map(|score| {
            u16::try_from(score)
                .map_err(|_| StoreError::Corrupt(format!("credit score {score} out of range")))
        })
        .transpose()?;
    let risk_level: Option<String> = row.try_get("risk_level")?;
    let status: String = row.try_get("status")?;
    let approved_amount: Option<i64> = row.try_get("approved_amount")?;
    let monthly_income: Option<i64> = row.try_get("monthly_income")?;

    Ok(LoanApplication {
        id: ApplicationId(row.try_get("id")?),
        applicant_name: row.try_get("applicant_name")?,
        requested_amount: from_db(row.try_get("requested_amount")?)?,
        approved_amount: approved_amount.map(from_db).transpose()?,
        monthly_income: monthly_income.map(from_db).transpose()?,
        status: parse_label(&status)?,
        credit_score,
        risk_level: risk_level.as_deref().map(parse_label).transpose()?,
        risk_score: row.try_get("risk_score")?,
        dti_ratio: row.try_get("dti_ratio")?,
        rejection_reason: row.try_get("rejection_reason")?,
        sanction_letter_url: row.try_get("sanction_letter_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn document_from_row(row: &PgRow) -> Result<KycDocument, StoreError> {
    let document_type: String = row.try_get("document_type")?;
    let verification_status: String = row.try_get("verification_status")?;

    Ok(KycDocument {
        id: row.try_get("id")?,
        application_id: ApplicationId(row.try_get("application_id")?),
        document_type: parse_label(&document_type)?,
        file_url: row.try_get("file_url")?,
        extracted_name: row.try_get("extracted_name")?,
        extracted_id: row.try_get("extracted_id")?,
        extracted_dob: row.try_get("extracted_dob")?,
        extracted_address: row.try_get("extracted_address")?,
        ocr_confidence: row.try_get("ocr_confidence")?,
        verification_status: parse_label(&verification_status)?,
        created_at: row.try_get("created_at")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditLog, StoreError> {
    let agent_type: String = row.try_get("agent_type")?;
    let application_id: Option<uuid::Uuid> = row.try_get("application_id")?;
    let details: Json<Details> = row.try_get("details")?;

    Ok(AuditLog {
        id: row.try_get("id")?,
        application_id: application_id.map(ApplicationId),
        action: row.try_get("action")?,
        agent_type: parse_label(&agent_type)?,
        details: details.0,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<ChatMessage, StoreError> {
    let role: String = row.try_get("role")?;
    let agent_type: Option<String> = row.try_get("agent_type")?;
    let application_id: Option<uuid::Uuid> = row.try_get("application_id")?;
    let metadata: Json<Details> = row.try_get("metadata")?;
    let session_id: String = row.try_get("session_id")?;

    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: SessionId(session_id),
        application_id: application_id.map(ApplicationId),
        role: parse_label(&role)?,
        content: row.try_get("content")?,
        agent_type: agent_type.as_deref().map(parse_label).transpose()?,
        metadata: metadata.0,
        created_at: row.try_get("created_at")?,
    })
}

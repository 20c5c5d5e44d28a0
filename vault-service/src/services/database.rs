//! PostgreSQL store. Audited mutations run inside one transaction together
//! with their ledger insert; status transitions are conditional writes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::store::{conflict_message, AuditFilter, StoreError, VaultStore};
use crate::models::{
    normalize_identifier, AuditLogEntry, Document, DocumentMetadata, DocumentStatus, GovAudit, Organization, Principal,
    RegistryRecord, Vault,
};

const PRINCIPAL_COLUMNS: &str = "id, email, telephone, nin, password_hash, role, organization_id, \
     vault_id, reset_token_hash, reset_token_expires_at, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, owner_id, vault_id, doc_type, title, notes, content_locator, \
     status, metadata, gov_audit, expires_at, created_at, updated_at";

const AUDIT_COLUMNS: &str = "id, actor_id, action, target_id, target_kind, details, created_at";

fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(conflict_message(db_err.constraint()));
        }
    }
    if matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    ) {
        return StoreError::Unavailable(err.to_string());
    }
    StoreError::Database(anyhow::Error::new(err))
}

#[derive(FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    telephone: String,
    nin: Option<String>,
    password_hash: String,
    role: String,
    organization_id: Option<Uuid>,
    vault_id: Uuid,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: row.id,
            email: row.email,
            telephone: row.telephone,
            nin: row.nin,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            organization_id: row.organization_id,
            vault_id: row.vault_id,
            reset_token_hash: row.reset_token_hash,
            reset_token_expires_at: row.reset_token_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    owner_id: Uuid,
    vault_id: Uuid,
    doc_type: String,
    title: String,
    notes: Option<String>,
    content_locator: Option<String>,
    status: String,
    metadata: Json<DocumentMetadata>,
    gov_audit: Json<GovAudit>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            owner_id: row.owner_id,
            vault_id: row.vault_id,
            doc_type: row.doc_type,
            title: row.title,
            notes: row.notes,
            content_locator: row.content_locator,
            status: row.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            metadata: row.metadata.0,
            gov_audit: row.gov_audit.0,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    org_type: String,
    code: String,
    tier: i32,
    routing_tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.id,
            name: row.name,
            org_type: row.org_type,
            code: row.code,
            tier: row.tier,
            routing_tags: row.routing_tags,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct RegistryRow {
    nin: String,
    surname: String,
    date_of_birth: NaiveDate,
    date_of_expiry: NaiveDate,
    personal_id_number: String,
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    actor_id: Option<Uuid>,
    action: String,
    target_id: Option<Uuid>,
    target_kind: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            target_id: row.target_id,
            target_kind: row
                .target_kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn insert_audit(conn: &mut PgConnection, entry: &AuditLogEntry) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, actor_id, action, target_id, target_kind, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.actor_id)
    .bind(entry.action.as_str())
    .bind(entry.target_id)
    .bind(entry.target_kind.as_str())
    .bind(&entry.details)
    .bind(entry.created_at)
    .execute(conn)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VaultStore for Database {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                map_sqlx(e)
            })?;
        Ok(())
    }

    async fn create_principal(
        &self,
        principal: &Principal,
        vault: &Vault,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // principals.vault_id is checked at commit, so the principal goes first.
        sqlx::query(
            r#"
            INSERT INTO principals (id, email, telephone, nin, password_hash, role,
                organization_id, vault_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(principal.id)
        .bind(&principal.email)
        .bind(&principal.telephone)
        .bind(&principal.nin)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(principal.organization_id)
        .bind(principal.vault_id)
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        // Same-kind duplicates already failed on principals_*_key above.
        let mut identifiers = QueryBuilder::<Postgres>::new(
            "INSERT INTO principal_identifiers (value, principal_id, kind) ",
        );
        identifiers.push_values(principal.login_identifiers(), |mut row, (kind, value)| {
            row.push_bind(value).push_bind(principal.id).push_bind(kind);
        });
        identifiers
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        sqlx::query("INSERT INTO vaults (id, owner_id, created_at) VALUES ($1, $2, $3)")
            .bind(vault.id)
            .bind(vault.owner_id)
            .bind(vault.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        insert_audit(&mut tx, entry).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        let sql = format!("SELECT {} FROM principals WHERE id = $1", PRINCIPAL_COLUMNS);
        sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn find_principals_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<Principal>, StoreError> {
        let sql = format!(
            "SELECT {} FROM principals \
             JOIN principal_identifiers ON principal_identifiers.principal_id = principals.id \
             WHERE principal_identifiers.value = $1 LIMIT 2",
            PRINCIPAL_COLUMNS
        );
        let rows = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(normalize_identifier(identifier))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn find_principal_by_nin(&self, nin: &str) -> Result<Option<Principal>, StoreError> {
        let sql = format!("SELECT {} FROM principals WHERE nin = $1", PRINCIPAL_COLUMNS);
        sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(nin)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn list_principals(&self, limit: i64) -> Result<Vec<Principal>, StoreError> {
        let sql = format!(
            "SELECT {} FROM principals ORDER BY created_at DESC LIMIT $1",
            PRINCIPAL_COLUMNS
        );
        let rows = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn set_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            UPDATE principals
            SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(principal_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_principal_by_reset_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Principal>, StoreError> {
        let sql = format!(
            "SELECT {} FROM principals WHERE reset_token_hash = $1 AND reset_token_expires_at > $2",
            PRINCIPAL_COLUMNS
        );
        sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn consume_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let updated = sqlx::query(
            r#"
            UPDATE principals
            SET password_hash = $3, reset_token_hash = NULL, reset_token_expires_at = NULL,
                updated_at = $4
            WHERE id = $1 AND reset_token_hash = $2 AND reset_token_expires_at > $4
            "#,
        )
        .bind(principal_id)
        .bind(token_hash)
        .bind(new_password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn find_registry_record(&self, nin: &str) -> Result<Option<RegistryRecord>, StoreError> {
        let row = sqlx::query_as::<_, RegistryRow>(
            r#"
            SELECT nin, surname, date_of_birth, date_of_expiry, personal_id_number
            FROM registry_records WHERE nin = $1
            "#,
        )
        .bind(nin)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(|r| RegistryRecord {
            nin: r.nin,
            surname: r.surname,
            date_of_birth: r.date_of_birth,
            date_of_expiry: r.date_of_expiry,
            personal_id_number: r.personal_id_number,
        }))
    }

    async fn create_organization(
        &self,
        organization: &Organization,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, org_type, code, tier, routing_tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(organization.id)
        .bind(&organization.name)
        .bind(&organization.org_type)
        .bind(&organization.code)
        .bind(organization.tier)
        .bind(&organization.routing_tags)
        .bind(organization.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, org_type, code, tier, routing_tags, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Organization::from))
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, org_type, code, tier, routing_tags, created_at FROM organizations ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Organization::from).collect())
    }

    async fn insert_document(
        &self,
        document: &Document,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, vault_id, doc_type, title, notes, content_locator,
                status, metadata, gov_audit, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(document.id)
        .bind(document.owner_id)
        .bind(document.vault_id)
        .bind(&document.doc_type)
        .bind(&document.title)
        .bind(&document.notes)
        .bind(&document.content_locator)
        .bind(document.status.as_str())
        .bind(Json(&document.metadata))
        .bind(Json(&document.gov_audit))
        .bind(document.expires_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Document::try_from)
            .transpose()
    }

    async fn list_documents_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE owner_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE status = $1 ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn list_lapsed_documents(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE status IN ('ISSUED', 'VERIFIED') \
             AND expires_at IS NOT NULL AND expires_at <= $1",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn transition_document(
        &self,
        updated: &Document,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let affected = sqlx::query(
            r#"
            UPDATE documents
            SET status = $2, metadata = $3, gov_audit = $4, expires_at = $5, updated_at = $6
            WHERE id = $1 AND status = $7
            "#,
        )
        .bind(updated.id)
        .bind(updated.status.as_str())
        .bind(Json(&updated.metadata))
        .bind(Json(&updated.gov_audit))
        .bind(updated.expires_at)
        .bind(updated.updated_at)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();

        if affected == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn delete_document(
        &self,
        id: Uuid,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let affected = sqlx::query("DELETE FROM documents WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        if affected == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        insert_audit(&mut tx, entry).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        insert_audit(&mut conn, entry).await
    }

    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM audit_log WHERE TRUE",
            AUDIT_COLUMNS
        ));
        if let Some(actor_id) = filter.actor_id {
            qb.push(" AND actor_id = ").push_bind(actor_id);
        }
        if let Some(action) = filter.action {
            qb.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.bounded_limit());

        let rows = qb
            .build_query_as::<AuditRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        convert_all(rows)
    }
}

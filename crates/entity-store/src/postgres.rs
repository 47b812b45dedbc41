use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    EntityId, EntityRecord, ListCriteria, LookupField, Page, Result, StoreError, VersionStamp,
    store::{EntityStore, validate_record_for_insert, validate_record_for_update},
};

const COLUMNS: &str = "id, resource, name, status, detail_info, attributes, version, deleted";

/// PostgreSQL-backed entity store implementation.
///
/// Updates are a single `UPDATE ... WHERE version = $expected`, so the
/// version check and the write are atomic at the row level.
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Creates a new PostgreSQL entity store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<EntityRecord> {
        let attributes = match row.try_get::<Value, _>("attributes")? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::InvalidRecord(format!(
                    "stored attributes are not an object: {other}"
                )));
            }
        };

        Ok(EntityRecord {
            id: Some(EntityId::new(row.try_get("id")?)),
            resource: row.try_get("resource")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            detail_info: row.try_get("detail_info")?,
            attributes,
            version: VersionStamp::from_int(row.try_get("version")?)?,
            deleted: row.try_get("deleted")?,
        })
    }

    fn map_write_error(error: sqlx::Error, record: &EntityRecord) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = error
            && db_err.constraint() == Some("unique_resource_name")
        {
            return StoreError::UniqueViolation {
                resource: record.resource.clone(),
                field: LookupField::Name.to_string(),
                value: record.name.clone(),
            };
        }
        StoreError::Database(error)
    }
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn insert(&self, record: EntityRecord) -> Result<EntityRecord> {
        validate_record_for_insert(&record)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO entities (resource, name, status, detail_info, attributes, version, deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&record.resource)
        .bind(&record.name)
        .bind(&record.status)
        .bind(&record.detail_info)
        .bind(Value::Object(record.attributes.clone()))
        .bind(record.version.as_i64())
        .bind(record.deleted)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &record))?;

        Self::row_to_record(row)
    }

    async fn update(&self, record: EntityRecord, expected: VersionStamp) -> Result<EntityRecord> {
        let id = validate_record_for_update(&record, expected)?;

        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE entities
            SET name = $1, status = $2, detail_info = $3, attributes = $4, version = $5, deleted = $6
            WHERE resource = $7 AND id = $8 AND version = $9
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&record.name)
        .bind(&record.status)
        .bind(&record.detail_info)
        .bind(Value::Object(record.attributes.clone()))
        .bind(record.version.as_i64())
        .bind(record.deleted)
        .bind(&record.resource)
        .bind(id.as_i64())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &record))?;

        if let Some(row) = row {
            return Self::row_to_record(row);
        }

        // Nothing matched: either the row is gone or another writer moved it on.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM entities WHERE resource = $1 AND id = $2")
                .bind(&record.resource)
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        match current {
            Some(actual) => {
                tracing::debug!(
                    resource = %record.resource,
                    %id,
                    %expected,
                    actual,
                    "conditional update lost"
                );
                Err(StoreError::ConcurrencyConflict {
                    resource: record.resource,
                    id,
                    expected,
                    actual: VersionStamp::from_int(actual)?,
                })
            }
            None => Err(StoreError::NotFound {
                resource: record.resource,
                id,
            }),
        }
    }

    async fn find_by_id(
        &self,
        resource: &str,
        id: EntityId,
        include_deleted: bool,
    ) -> Result<Option<EntityRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM entities
            WHERE resource = $1 AND id = $2 AND ($3 OR NOT deleted)
            "#
        ))
        .bind(resource)
        .bind(id.as_i64())
        .bind(include_deleted)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_by_field(
        &self,
        resource: &str,
        field: LookupField,
        value: &Value,
    ) -> Result<Option<EntityRecord>> {
        let row: Option<PgRow> = match field {
            LookupField::Name => {
                let name = value.as_str().ok_or_else(|| {
                    StoreError::InvalidRecord(format!("name lookup needs a string, got {value}"))
                })?;
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM entities WHERE resource = $1 AND name = $2 ORDER BY id LIMIT 1"
                ))
                .bind(resource)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
            LookupField::Attribute(key) => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM entities WHERE resource = $1 AND attributes -> $2 = $3 ORDER BY id LIMIT 1"
                ))
                .bind(resource)
                .bind(key)
                .bind(value)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(Self::row_to_record).transpose()
    }

    async fn list(&self, resource: &str, criteria: &ListCriteria) -> Result<Page<EntityRecord>> {
        let mut filter = String::from(" WHERE resource = $1 AND ($2 OR NOT deleted)");
        let mut param_count = 2;

        // Build dynamic filter
        if criteria.name_contains.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND name ILIKE ${param_count}"));
        }
        if criteria.statuses.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ANY(${param_count})"));
        }

        let limit = criteria.effective_limit();
        let offset = criteria.effective_offset();

        let count_sql = format!("SELECT COUNT(*) FROM entities{filter}");
        let select_sql = format!(
            "SELECT {COLUMNS} FROM entities{filter} ORDER BY id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let name_pattern = criteria
            .name_contains
            .as_ref()
            .map(|needle| format!("%{}%", escape_like(needle)));

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(resource)
            .bind(criteria.include_deleted);
        let mut select_query = sqlx::query(&select_sql)
            .bind(resource)
            .bind(criteria.include_deleted);

        if let Some(ref pattern) = name_pattern {
            count_query = count_query.bind(pattern);
            select_query = select_query.bind(pattern);
        }
        if let Some(ref statuses) = criteria.statuses {
            count_query = count_query.bind(statuses);
            select_query = select_query.bind(statuses);
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = select_query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Self::row_to_record)
                .collect::<Result<_>>()?,
            total: u64::try_from(total).unwrap_or_default(),
            limit,
            offset,
        })
    }
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::db::{DbError, Pool};

/// A row as returned over HTTP: `id`, the schema fields, and timestamps.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
}

impl FieldKind {
    fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Integer | FieldKind::Boolean => "INTEGER",
        }
    }
}

/// Column definition for a feature table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
}

impl FieldDef {
    pub const fn text(name: &'static str, label: &'static str) -> Self {
        Self { name, label, kind: FieldKind::Text, required: false, unique: false }
    }

    pub const fn integer(name: &'static str, label: &'static str) -> Self {
        Self { name, label, kind: FieldKind::Integer, required: false, unique: false }
    }

    pub const fn boolean(name: &'static str, label: &'static str) -> Self {
        Self { name, label, kind: FieldKind::Boolean, required: false, unique: false }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Convert a JSON value into the column's SQL representation.
    fn coerce(&self, value: &Value) -> Result<SqlValue, String> {
        match (self.kind, value) {
            (_, Value::Null) if self.required => Err(format!("{} is required", self.name)),
            (_, Value::Null) => Ok(SqlValue::Null),
            (FieldKind::Text, Value::String(s)) => {
                if self.required && s.trim().is_empty() {
                    Err(format!("{} must not be empty", self.name))
                } else {
                    Ok(SqlValue::Text(s.clone()))
                }
            }
            (FieldKind::Integer, Value::Number(n)) => n
                .as_i64()
                .map(SqlValue::Integer)
                .ok_or_else(|| format!("{} must be an integer", self.name)),
            (FieldKind::Boolean, Value::Bool(b)) => Ok(SqlValue::Integer(i64::from(*b))),
            (FieldKind::Text, _) => Err(format!("{} must be a string", self.name)),
            (FieldKind::Integer, _) => Err(format!("{} must be an integer", self.name)),
            (FieldKind::Boolean, _) => Err(format!("{} must be a boolean", self.name)),
        }
    }

    fn to_json(&self, value: SqlValue) -> Value {
        match (self.kind, value) {
            (_, SqlValue::Null) => Value::Null,
            (FieldKind::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
            (_, SqlValue::Integer(i)) => Value::from(i),
            (_, SqlValue::Real(f)) => Value::from(f),
            (_, SqlValue::Text(s)) => Value::String(s),
            (_, SqlValue::Blob(_)) => Value::Null,
        }
    }
}

/// Static description of one feature table.
#[derive(Debug)]
pub struct ResourceSchema {
    /// Table name; also the plugin name the resource is served under.
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    /// When false, create/update/delete answer 501.
    pub writable: bool,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn column_list(&self) -> String {
        self.fields.iter().map(|f| f.name).collect::<Vec<_>>().join(", ")
    }

    fn create_table_sql(&self) -> String {
        let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        for field in self.fields {
            let mut col = format!("{} {}", field.name, field.kind.sql_type());
            if field.required {
                col.push_str(" NOT NULL");
            }
            if field.unique {
                col.push_str(" UNIQUE");
            }
            columns.push(col);
        }
        columns.push("created_at TEXT NOT NULL".to_string());
        columns.push("updated_at TEXT NOT NULL".to_string());
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        )
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT id, {}, created_at, updated_at FROM {}",
            self.column_list(),
            self.table
        )
    }

    fn row_to_record(&self, row: &Row<'_>) -> rusqlite::Result<Record> {
        let mut record = Map::new();
        record.insert("id".into(), Value::from(row.get::<_, i64>(0)?));
        for (i, field) in self.fields.iter().enumerate() {
            let value: SqlValue = row.get(i + 1)?;
            record.insert(field.name.into(), field.to_json(value));
        }
        let n = self.fields.len();
        record.insert("created_at".into(), Value::String(row.get(n + 1)?));
        record.insert("updated_at".into(), Value::String(row.get(n + 2)?));
        Ok(record)
    }

    fn find_in(&self, conn: &Connection, id: i64) -> rusqlite::Result<Option<Record>> {
        let sql = format!("{} WHERE id = ?1", self.select_sql());
        conn.query_row(&sql, [id], |row| self.row_to_record(row))
            .optional()
    }

    /// Default field → label map used when nothing has been saved yet.
    pub fn default_field_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), f.label.to_string()))
            .collect()
    }
}

/// Validated column values ready for an INSERT or UPDATE.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Changes(Vec<(&'static str, SqlValue)>);

impl Changes {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Data access for one feature table.
pub struct ResourceModel {
    schema: &'static ResourceSchema,
    pool: Pool,
}

impl ResourceModel {
    pub fn new(schema: &'static ResourceSchema, pool: Pool) -> Self {
        Self { schema, pool }
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    /// Create the feature table and the shared field-map table if missing.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        let create = self.schema.create_table_sql();
        self.pool.run(move |conn| {
            conn.execute_batch(&create)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS resource_maps (
                    resource TEXT PRIMARY KEY,
                    map_json TEXT NOT NULL
                )",
            )
        })
        .await
    }

    /// Validate a JSON body against the schema.
    ///
    /// With `partial` false every required field must be present (create);
    /// with `partial` true only the supplied fields are checked (update).
    /// `id` and timestamps are ignored; any other unknown key is rejected.
    pub(crate) fn validate(&self, body: &Record, partial: bool) -> Result<Changes, String> {
        for key in body.keys() {
            let reserved = matches!(key.as_str(), "id" | "created_at" | "updated_at");
            if !reserved && self.schema.field(key).is_none() {
                return Err(format!("unknown field: {key}"));
            }
        }

        let mut changes = Vec::new();
        for field in self.schema.fields {
            match body.get(field.name) {
                Some(value) => changes.push((field.name, field.coerce(value)?)),
                None if field.required && !partial => {
                    return Err(format!("{} is required", field.name));
                }
                None => {}
            }
        }
        Ok(Changes(changes))
    }

    pub async fn list(&self) -> Result<Vec<Record>, DbError> {
        let schema = self.schema;
        self.pool
            .run(move |conn| {
                let sql = format!("{} ORDER BY id", schema.select_sql());
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| schema.row_to_record(row))?;
                rows.collect()
            })
            .await
    }

    pub async fn find(&self, id: i64) -> Result<Option<Record>, DbError> {
        let schema = self.schema;
        self.pool.run(move |conn| schema.find_in(conn, id)).await
    }

    pub(crate) async fn insert(&self, changes: Changes) -> Result<Record, DbError> {
        let schema = self.schema;
        self.pool
            .run(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let (names, mut values): (Vec<&str>, Vec<SqlValue>) = changes.0.into_iter().unzip();
                let mut columns = names;
                columns.extend(["created_at", "updated_at"]);
                values.push(SqlValue::Text(now.clone()));
                values.push(SqlValue::Text(now));
                let placeholders = (1..=columns.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders})",
                    schema.table,
                    columns.join(", ")
                );
                conn.execute(&sql, params_from_iter(values))?;
                let id = conn.last_insert_rowid();
                schema
                    .find_in(conn, id)?
                    .ok_or(rusqlite::Error::QueryReturnedNoRows)
            })
            .await
    }

    /// Apply `changes` to row `id`. Returns `None` if the row does not exist.
    pub(crate) async fn update(&self, id: i64, changes: Changes) -> Result<Option<Record>, DbError> {
        let schema = self.schema;
        self.pool
            .run(move |conn| {
                let (names, mut values): (Vec<&str>, Vec<SqlValue>) = changes.0.into_iter().unzip();
                let mut assignments: Vec<String> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("{name} = ?{}", i + 1))
                    .collect();
                values.push(SqlValue::Text(chrono::Utc::now().to_rfc3339()));
                assignments.push(format!("updated_at = ?{}", values.len()));
                values.push(SqlValue::Integer(id));
                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?{}",
                    schema.table,
                    assignments.join(", "),
                    values.len()
                );
                if conn.execute(&sql, params_from_iter(values))? == 0 {
                    return Ok(None);
                }
                schema.find_in(conn, id)
            })
            .await
    }

    /// Delete row `id`. Returns false if it did not exist.
    pub(crate) async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let table = self.schema.table;
        self.pool
            .run(move |conn| {
                let sql = format!("DELETE FROM {table} WHERE id = ?1");
                Ok(conn.execute(&sql, [id])? > 0)
            })
            .await
    }

    /// Saved field → label map, filled in with defaults for unsaved fields.
    pub async fn field_map(&self) -> Result<BTreeMap<String, String>, DbError> {
        let table = self.schema.table;
        let saved: Option<String> = self
            .pool
            .run(move |conn| {
                conn.query_row(
                    "SELECT map_json FROM resource_maps WHERE resource = ?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        let mut map = self.schema.default_field_map();
        if let Some(json) = saved {
            match serde_json::from_str::<BTreeMap<String, String>>(&json) {
                Ok(stored) => {
                    for (field, label) in stored {
                        if map.contains_key(&field) {
                            map.insert(field, label);
                        }
                    }
                }
                Err(e) => tracing::warn!(resource = table, "ignoring corrupt field map: {e}"),
            }
        }
        Ok(map)
    }

    pub(crate) async fn save_field_map(&self, map: BTreeMap<String, String>) -> Result<(), DbError> {
        let table = self.schema.table;
        // BTreeMap<String, String> always serializes
        let json = serde_json::to_string(&map).unwrap_or_default();
        self.pool
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO resource_maps (resource, map_json) VALUES (?1, ?2)
                     ON CONFLICT(resource) DO UPDATE SET map_json = excluded.map_json",
                    (table, json),
                )
                .map(|_| ())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static PEOPLE: ResourceSchema = ResourceSchema {
        table: "people",
        fields: &[
            FieldDef::text("name", "Name").required(),
            FieldDef::text("email", "E-mail").unique(),
            FieldDef::integer("age", "Age"),
            FieldDef::boolean("active", "Active"),
        ],
        writable: true,
    };

    async fn model() -> ResourceModel {
        let model = ResourceModel::new(&PEOPLE, Pool::open_in_memory().await.unwrap());
        model.ensure_schema().await.unwrap();
        model
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn validate_requires_required_fields_on_create() {
        let m = model().await;
        let err = m.validate(&record(json!({"email": "x@y.z"})), false).unwrap_err();
        assert_eq!(err, "name is required");
    }

    #[tokio::test]
    async fn validate_allows_partial_updates() {
        let m = model().await;
        let changes = m.validate(&record(json!({"age": 31})), true).unwrap();
        assert_eq!(changes.len(), 1);
    }

    #[tokio::test]
    async fn validate_rejects_unknown_and_mistyped_fields() {
        let m = model().await;
        assert_eq!(
            m.validate(&record(json!({"name": "A", "shoe": 44})), false).unwrap_err(),
            "unknown field: shoe"
        );
        assert_eq!(
            m.validate(&record(json!({"name": "A", "age": "old"})), false).unwrap_err(),
            "age must be an integer"
        );
        assert_eq!(
            m.validate(&record(json!({"name": "  "})), false).unwrap_err(),
            "name must not be empty"
        );
    }

    #[tokio::test]
    async fn validate_ignores_id_and_timestamps() {
        let m = model().await;
        let changes = m
            .validate(&record(json!({"id": 3, "name": "A", "created_at": "x"})), false)
            .unwrap();
        assert_eq!(changes.len(), 1);
    }

    #[tokio::test]
    async fn insert_and_list_round_trip_types() {
        let m = model().await;
        let changes = m
            .validate(&record(json!({"name": "Ada", "age": 36, "active": true})), false)
            .unwrap();
        let created = m.insert(changes).await.unwrap();
        assert_eq!(created["id"], 1);
        assert_eq!(created["active"], true);
        assert_eq!(created["email"], Value::Null);

        let all = m.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], "Ada");
        assert_eq!(all[0]["age"], 36);
    }

    #[tokio::test]
    async fn update_missing_row_returns_none() {
        let m = model().await;
        let changes = m.validate(&record(json!({"age": 1})), true).unwrap();
        assert!(m.update(99, changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let m = model().await;
        let created = m
            .insert(m.validate(&record(json!({"name": "Ada", "age": 36})), false).unwrap())
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();
        let updated = m
            .update(id, m.validate(&record(json!({"age": 37})), true).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "Ada");
        assert_eq!(updated["age"], 37);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let m = model().await;
        m.insert(m.validate(&record(json!({"name": "Ada"})), false).unwrap())
            .await
            .unwrap();
        assert!(m.delete(1).await.unwrap());
        assert!(!m.delete(1).await.unwrap());
    }

    #[tokio::test]
    async fn field_map_merges_saved_labels_with_defaults() {
        let m = model().await;
        assert_eq!(m.field_map().await.unwrap()["email"], "E-mail");

        let mut map = BTreeMap::new();
        map.insert("email".to_string(), "Mail".to_string());
        m.save_field_map(map).await.unwrap();

        let loaded = m.field_map().await.unwrap();
        assert_eq!(loaded["email"], "Mail");
        assert_eq!(loaded["name"], "Name");
        assert_eq!(loaded.len(), PEOPLE.fields.len());
    }
}

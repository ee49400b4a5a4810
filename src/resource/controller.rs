use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::model::{Record, ResourceModel};
use crate::error::ApiError;

/// Request handling for one feature table: turns bodies into model calls
/// and model outcomes into `ApiError`s.
pub struct ResourceController {
    model: Arc<ResourceModel>,
}

impl ResourceController {
    pub fn new(model: Arc<ResourceModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<ResourceModel> {
        &self.model
    }

    fn resource(&self) -> &'static str {
        self.model.schema().table
    }

    fn not_found(&self, id: i64) -> ApiError {
        ApiError::NotFound { resource: self.resource(), id: id.to_string() }
    }

    fn body_object(body: Value) -> Result<Record, ApiError> {
        match body {
            Value::Object(map) => Ok(map),
            _ => Err(ApiError::Validation("request body must be a JSON object".into())),
        }
    }

    pub async fn list(&self) -> Result<Vec<Record>, ApiError> {
        Ok(self.model.list().await?)
    }

    pub async fn show(&self, id: i64) -> Result<Record, ApiError> {
        self.model.find(id).await?.ok_or_else(|| self.not_found(id))
    }

    pub(crate) async fn create(&self, body: Value) -> Result<Record, ApiError> {
        let body = Self::body_object(body)?;
        let changes = self.model.validate(&body, false).map_err(ApiError::Validation)?;
        let record = self.model.insert(changes).await?;
        tracing::info!(resource = self.resource(), id = ?record.get("id"), "created");
        Ok(record)
    }

    pub(crate) async fn update(&self, id: i64, body: Value) -> Result<Record, ApiError> {
        let body = Self::body_object(body)?;
        let changes = self.model.validate(&body, true).map_err(ApiError::Validation)?;
        let record = self
            .model
            .update(id, changes)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(resource = self.resource(), id, "updated");
        Ok(record)
    }

    pub(crate) async fn destroy(&self, id: i64) -> Result<(), ApiError> {
        if !self.model.delete(id).await? {
            return Err(self.not_found(id));
        }
        tracing::info!(resource = self.resource(), id, "deleted");
        Ok(())
    }

    pub async fn field_map(&self) -> Result<BTreeMap<String, String>, ApiError> {
        Ok(self.model.field_map().await?)
    }

    pub(crate) async fn put_field_map(
        &self,
        map: BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ApiError> {
        let schema = self.model.schema();
        if let Some(unknown) = map.keys().find(|k| schema.field(k).is_none()) {
            return Err(ApiError::Validation(format!("unknown field: {unknown}")));
        }
        self.model.save_field_map(map).await?;
        self.field_map().await
    }
}

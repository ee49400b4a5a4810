use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::controller::ResourceController;
use super::model::Record;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::plugins::RoleGuard;

type Ctl = State<Arc<ResourceController>>;

async fn list(State(c): Ctl) -> Result<Json<Vec<Record>>, ApiError> {
    Ok(Json(c.list().await?))
}

async fn show(State(c): Ctl, ApiPath(id): ApiPath<i64>) -> Result<Json<Record>, ApiError> {
    Ok(Json(c.show(id).await?))
}

async fn create(State(c): Ctl, ApiJson(body): ApiJson<Value>) -> Result<(StatusCode, Json<Record>), ApiError> {
    Ok((StatusCode::CREATED, Json(c.create(body).await?)))
}

async fn update(
    State(c): Ctl,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Record>, ApiError> {
    Ok(Json(c.update(id, body).await?))
}

async fn destroy(State(c): Ctl, ApiPath(id): ApiPath<i64>) -> Result<StatusCode, ApiError> {
    c.destroy(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_map(State(c): Ctl) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    Ok(Json(c.field_map().await?))
}

async fn put_map(
    State(c): Ctl,
    ApiJson(map): ApiJson<BTreeMap<String, String>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    Ok(Json(c.put_field_map(map).await?))
}

async fn not_implemented() -> ApiError {
    ApiError::NotImplemented("this operation")
}

/// Wire a controller into its plugin router:
/// `GET /`, `GET|PUT /map`, `GET /{id}`, `POST /`, `PUT /{id}`, `DELETE /{id}`.
/// Read-only resources answer 501 on the write routes.
pub(crate) fn router(controller: Arc<ResourceController>, guard: &RoleGuard) -> Router {
    let writable = controller.model().schema().writable;

    let (collection, item) = if writable {
        (
            get(list).post(create),
            get(show).put(update).delete(destroy),
        )
    } else {
        (
            get(list).post(not_implemented),
            get(show).put(not_implemented).delete(not_implemented),
        )
    };

    let routes = Router::new()
        .route("/", collection)
        .route("/map", get(get_map).put(put_map))
        .route("/{id}", item);

    guard.apply(routes).with_state(controller)
}

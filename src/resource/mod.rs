//! Generic model / controller / router triple shared by the built-in
//! feature plugins. Each feature supplies a static `ResourceSchema`.

mod controller;
mod model;
mod routes;

pub use controller::ResourceController;
pub use model::{FieldDef, FieldKind, Record, ResourceModel, ResourceSchema};
pub(crate) use routes::router;

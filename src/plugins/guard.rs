//! Per-plugin role guard.
//!
//! Authentication is not wired up yet: the caller's role is read from the
//! `x-refdesk-role` header, and enforcement is off unless
//! `enforce_roles` is set in the config.

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;

use super::PluginDescriptor;
use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-refdesk-role";
pub const ADMIN_ROLE: &str = "admin";

/// Hands each plugin factory a guard for its own `requiredRole`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardFactory {
    enforce: bool,
}

impl GuardFactory {
    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }

    pub fn require(&self, descriptor: &PluginDescriptor) -> RoleGuard {
        RoleGuard {
            plugin: Arc::from(descriptor.name.as_str()),
            required_role: Arc::from(descriptor.required_role.as_str()),
            enforce: self.enforce,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoleGuard {
    plugin: Arc<str>,
    required_role: Arc<str>,
    enforce: bool,
}

impl RoleGuard {
    pub fn allows(&self, role: Option<&str>) -> bool {
        if !self.enforce || self.required_role.is_empty() {
            return true;
        }
        matches!(role, Some(r) if r == &*self.required_role || r == ADMIN_ROLE)
    }

    /// Layer the guard over every route of `router`.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self.clone(), require_role))
    }
}

async fn require_role(State(guard): State<RoleGuard>, req: Request, next: Next) -> Response {
    let role = req
        .headers()
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok());
    if guard.allows(role) {
        return next.run(req).await;
    }
    tracing::warn!(plugin = %guard.plugin, role = ?role, "role guard rejected request");
    ApiError::Forbidden(format!("{} requires role {}", guard.plugin, guard.required_role))
        .into_response()
}

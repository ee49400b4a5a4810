use serde::{Deserialize, Serialize};

/// Plugin identity and mount point, as declared in `plugin.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub name: String,
    pub route_base: String,
    #[serde(default)]
    pub required_role: String,
    #[serde(default)]
    pub description: String,
}

lazy_static::lazy_static! {
    static ref KEBAB_NAME: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").unwrap();
    // Static segments only: no captures, wildcards or empty segments.
    static ref ROUTE_BASE: regex::Regex =
        regex::Regex::new(r"^(/[^/:{}*\s][^/{}*\s]*)+$").unwrap();
}

impl PluginDescriptor {
    /// Descriptor whose `route_base` is derived from `name`.
    pub fn new(name: &str, required_role: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            route_base: Self::expected_route_base(name),
            required_role: required_role.to_string(),
            description: description.to_string(),
        }
    }

    pub fn expected_route_base(name: &str) -> String {
        format!("/api/{name}")
    }

    /// Check the descriptor can be mounted.
    ///
    /// Returns the list of non-fatal warnings on success. A `route_base`
    /// that differs from `/api/<name>` is only a warning; a route base the
    /// router cannot nest at is an error.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        if self.name.is_empty() {
            return Err("name is empty".into());
        }
        if !KEBAB_NAME.is_match(&self.name) {
            return Err(format!("name \"{}\" is not kebab-case", self.name));
        }
        if !ROUTE_BASE.is_match(&self.route_base) {
            return Err(format!(
                "routeBase \"{}\" must be an absolute path of static segments",
                self.route_base
            ));
        }

        let mut warnings = Vec::new();
        let expected = Self::expected_route_base(&self.name);
        if self.route_base != expected {
            warnings.push(format!(
                "routeBase \"{}\" differs from expected \"{expected}\"",
                self.route_base
            ));
        }
        if self.required_role.is_empty() {
            warnings.push("no requiredRole; routes are public".into());
        }
        Ok(warnings)
    }
}

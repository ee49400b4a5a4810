use crate::plugins::{PluginEnv, PluginParts};
use crate::resource::{FieldDef, ResourceSchema};

/// Channels are provisioned outside the API; writes answer 501.
pub static CHANNELS: ResourceSchema = ResourceSchema {
    table: "channels",
    fields: &[
        FieldDef::text("name", "Name").required().unique(),
        FieldDef::text("kind", "Kind").required(),
        FieldDef::text("address", "Address"),
    ],
    writable: false,
};

pub(super) fn factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
    super::resource_plugin(&CHANNELS, env)
}

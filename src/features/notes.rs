use crate::plugins::{PluginEnv, PluginParts};
use crate::resource::{FieldDef, ResourceSchema};

pub static NOTES: ResourceSchema = ResourceSchema {
    table: "notes",
    fields: &[
        FieldDef::text("title", "Title").required(),
        FieldDef::text("body", "Body"),
        FieldDef::integer("contact_id", "Contact"),
    ],
    writable: true,
};

pub(super) fn factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
    super::resource_plugin(&NOTES, env)
}

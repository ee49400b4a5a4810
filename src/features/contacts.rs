use crate::plugins::{PluginEnv, PluginParts};
use crate::resource::{FieldDef, ResourceSchema};

pub static CONTACTS: ResourceSchema = ResourceSchema {
    table: "contacts",
    fields: &[
        FieldDef::text("name", "Name").required(),
        FieldDef::text("email", "E-mail").unique(),
        FieldDef::text("phone", "Phone"),
        FieldDef::text("organization", "Organization"),
    ],
    writable: true,
};

pub(super) fn factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
    super::resource_plugin(&CONTACTS, env)
}

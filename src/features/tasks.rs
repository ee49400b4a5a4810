use crate::plugins::{PluginEnv, PluginParts};
use crate::resource::{FieldDef, ResourceSchema};

pub static TASKS: ResourceSchema = ResourceSchema {
    table: "tasks",
    fields: &[
        FieldDef::text("title", "Title").required(),
        FieldDef::boolean("done", "Done"),
        FieldDef::text("due_date", "Due"),
        FieldDef::integer("contact_id", "Contact"),
    ],
    writable: true,
};

pub(super) fn factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
    super::resource_plugin(&TASKS, env)
}

pub mod fields;
pub mod update;

pub use fields::{FieldsCommands, handle_fields_command};
pub use update::{UpdateCommands, handle_update_command};

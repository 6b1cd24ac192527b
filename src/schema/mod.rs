//! The versioned schema document: types, merge rules, validation and the
//! repository store.
pub mod merge;
pub mod store;
pub mod types;
pub mod validation;

pub use merge::{merge_configs, merge_configs_at};
pub use store::{
    ExportResult, LoadOutcome, SCHEMA_FILE_NAME, SchemaStore, export_schema_to_repo,
    sanitize_config,
};
pub use types::{BackupConfig, MachineConfig, SystemMetadata, TrackedFile};
pub use validation::ValidationWarning;

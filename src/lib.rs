pub mod config;
pub mod error;
pub mod db;
pub mod ingest;
pub mod schema;
pub mod leads;
pub mod progress;

pub use config::Config;
pub use error::{ColdlistError, Result};
pub use ingest::{load_bytes, load_file, LoadedFile, RawTable, Record};
pub use leads::{materialize, LeadRecord, LeadStatus};
pub use progress::ProgressContext;
pub use schema::{infer_field_type, infer_fields, FieldDescriptor, FieldSet, FieldType, MappingPlan};

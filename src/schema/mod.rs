pub mod field;
pub mod infer;
pub mod mapping;

pub use field::{FieldDescriptor, FieldSet, FieldType};
pub use infer::{infer_field_type, infer_fields};
pub use mapping::{FieldMapping, MappingPlan};

use super::field::{FieldDescriptor, FieldSet, FieldType};
use crate::ingest::table::RawTable;
use crate::leads::roles::infer_role;

/// Infer a column's type from its header text
///
/// Case-insensitive substring match, first match wins: Phone, Email, Url, Date,
/// otherwise PlainText. Number is never inferred; it is only set by editing.
pub fn infer_field_type(header: &str) -> FieldType {
    infer_role(header).field_type().unwrap_or(FieldType::PlainText)
}

/// Propose one visible descriptor per distinct header, in column order
pub fn infer_fields(table: &RawTable) -> FieldSet {
    let fields = table
        .distinct_headers()
        .into_iter()
        .map(|header| FieldDescriptor::new(header, infer_field_type(header)))
        .collect();
    FieldSet::new(fields)
}

use serde::Serialize;
use std::collections::HashSet;

use super::field::FieldSet;
use crate::error::{ColdlistError, Result};

/// Association of one incoming header with an existing field
///
/// `target_field_id = None` means the column is new: its values are kept
/// under the raw header text and no field is created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pub source_header: String,
    pub target_field_id: Option<String>,
}

/// Mappings for one import batch, one per header position
///
/// A target field is held by at most one header. Assigning a target that
/// another header holds moves it (the most recent assignment wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingPlan {
    mappings: Vec<FieldMapping>,
}

impl MappingPlan {
    /// Propose mappings by case-insensitive name equality
    pub fn propose(headers: &[String], fields: &FieldSet) -> Self {
        let mut used: HashSet<String> = HashSet::new();
        let mappings = headers
            .iter()
            .map(|header| {
                let target = fields
                    .find_by_name(header)
                    .map(|f| f.id().to_string())
                    .filter(|id| used.insert(id.clone()));
                FieldMapping {
                    source_header: header.clone(),
                    target_field_id: target,
                }
            })
            .collect();
        Self { mappings }
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Set or clear the target of the header at `index`
    pub fn assign(&mut self, index: usize, target_field_id: Option<&str>, fields: &FieldSet) -> Result<()> {
        if index >= self.mappings.len() {
            return Err(ColdlistError::InvalidInput(format!(
                "header index {} out of range ({} headers)",
                index,
                self.mappings.len()
            )));
        }

        if let Some(id) = target_field_id {
            if fields.find_by_id(id).is_none() {
                return Err(ColdlistError::InvalidInput(format!("unknown field id: {}", id)));
            }
            for (i, mapping) in self.mappings.iter_mut().enumerate() {
                if i != index && mapping.target_field_id.as_deref() == Some(id) {
                    log::debug!("Field {} moved from header {:?}", id, mapping.source_header);
                    mapping.target_field_id = None;
                }
            }
        }

        self.mappings[index].target_field_id = target_field_id.map(str::to_string);
        Ok(())
    }

    /// Assign by header text and field name (both case-insensitive); `None` unmaps
    pub fn assign_by_name(&mut self, header: &str, field_name: Option<&str>, fields: &FieldSet) -> Result<()> {
        let wanted = header.to_lowercase();
        let index = self
            .mappings
            .iter()
            .position(|m| m.source_header == header)
            .or_else(|| {
                self.mappings
                    .iter()
                    .position(|m| m.source_header.to_lowercase() == wanted)
            })
            .ok_or_else(|| ColdlistError::InvalidInput(format!("no column named {:?} in file", header)))?;

        let target = match field_name {
            Some(name) => Some(
                fields
                    .find_by_name(name)
                    .ok_or_else(|| ColdlistError::InvalidInput(format!("list has no field named {:?}", name)))?
                    .id()
                    .to_string(),
            ),
            None => None,
        };

        self.assign(index, target.as_deref(), fields)
    }

    /// Field ids currently held by some header
    pub fn used_targets(&self) -> HashSet<&str> {
        self.mappings
            .iter()
            .filter_map(|m| m.target_field_id.as_deref())
            .collect()
    }

    /// False when a different header already holds `field_id`, or when an
    /// unmapped header would be stored under the same key as the field
    pub fn is_target_available(&self, index: usize, field_id: &str, fields: &FieldSet) -> bool {
        let field_name = fields.find_by_id(field_id).map(|f| f.name.as_str());
        !self.mappings.iter().enumerate().any(|(i, m)| {
            i != index
                && (m.target_field_id.as_deref() == Some(field_id)
                    || (m.target_field_id.is_none() && Some(m.source_header.as_str()) == field_name))
        })
    }

    /// Storage keys claimed by a mapped header and by at least one other header
    ///
    /// Duplicate raw headers that are both unmapped are not reported; they
    /// collapse the same way they do when a list is created.
    pub fn conflicting_keys(&self, fields: &FieldSet) -> Vec<String> {
        let keys = self.storage_keys(fields);
        let mut conflicts: Vec<String> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let clash = keys.iter().enumerate().any(|(j, other)| {
                j != i
                    && other == key
                    && (self.mappings[i].target_field_id.is_some() || self.mappings[j].target_field_id.is_some())
            });
            if clash && !conflicts.contains(key) {
                conflicts.push(key.clone());
            }
        }
        conflicts
    }

    /// Headers mapped onto an existing field
    pub fn matched_headers(&self) -> Vec<&str> {
        self.mappings
            .iter()
            .filter(|m| m.target_field_id.is_some())
            .map(|m| m.source_header.as_str())
            .collect()
    }

    /// Headers that will be carried as new, undeclared data
    pub fn new_headers(&self) -> Vec<&str> {
        self.mappings
            .iter()
            .filter(|m| m.target_field_id.is_none())
            .map(|m| m.source_header.as_str())
            .collect()
    }

    /// Key each header's values are stored under: the target field's name,
    /// or the raw header when unmapped
    pub fn storage_keys(&self, fields: &FieldSet) -> Vec<String> {
        self.mappings
            .iter()
            .map(|m| {
                m.target_field_id
                    .as_deref()
                    .and_then(|id| fields.find_by_id(id))
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| m.source_header.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{FieldDescriptor, FieldType};

    fn list_fields() -> FieldSet {
        FieldSet::new(vec![
            FieldDescriptor::new("Company", FieldType::PlainText),
            FieldDescriptor::new("Email", FieldType::Email),
            FieldDescriptor::new("Phone", FieldType::Phone),
        ])
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_propose_case_insensitive() {
        let fields = list_fields();
        let plan = MappingPlan::propose(&headers(&["email", "Mobile"]), &fields);

        let email_id = fields.find_by_name("Email").unwrap().id();
        assert_eq!(plan.mappings()[0].target_field_id.as_deref(), Some(email_id));
        assert_eq!(plan.mappings()[1].target_field_id, None);
        assert_eq!(plan.matched_headers(), vec!["email"]);
        assert_eq!(plan.new_headers(), vec!["Mobile"]);
    }

    #[test]
    fn test_propose_never_reuses_a_target() {
        let fields = list_fields();
        let plan = MappingPlan::propose(&headers(&["PHONE", "phone"]), &fields);
        assert!(plan.mappings()[0].target_field_id.is_some());
        assert!(plan.mappings()[1].target_field_id.is_none());
    }

    #[test]
    fn test_assign_last_write_wins() {
        let fields = list_fields();
        let phone_id = fields.find_by_name("Phone").unwrap().id().to_string();
        let mut plan = MappingPlan::propose(&headers(&["Phone", "Mobile"]), &fields);

        assert!(!plan.is_target_available(1, &phone_id, &fields));
        assert!(plan.is_target_available(0, &phone_id, &fields));

        plan.assign(1, Some(&phone_id), &fields).unwrap();
        assert_eq!(plan.mappings()[1].target_field_id.as_deref(), Some(phone_id.as_str()));
        assert_eq!(plan.mappings()[0].target_field_id, None);
        assert_eq!(plan.used_targets().len(), 1);
    }

    #[test]
    fn test_assign_rejects_unknown_targets() {
        let fields = list_fields();
        let mut plan = MappingPlan::propose(&headers(&["Phone"]), &fields);
        assert!(plan.assign(0, Some("nope"), &fields).is_err());
        assert!(plan.assign(3, None, &fields).is_err());
    }

    #[test]
    fn test_assign_by_name_and_unmap() {
        let fields = list_fields();
        let mut plan = MappingPlan::propose(&headers(&["Firm", "Email"]), &fields);

        plan.assign_by_name("firm", Some("company"), &fields).unwrap();
        plan.assign_by_name("Email", None, &fields).unwrap();

        assert_eq!(plan.matched_headers(), vec!["Firm"]);
        assert_eq!(plan.new_headers(), vec!["Email"]);
        assert!(plan.assign_by_name("Fax", None, &fields).is_err());
        assert!(plan.assign_by_name("Firm", Some("Fax"), &fields).is_err());
    }

    #[test]
    fn test_unmapped_header_with_field_name_blocks_target() {
        let fields = list_fields();
        let phone_id = fields.find_by_name("Phone").unwrap().id().to_string();
        let mut plan = MappingPlan::propose(&headers(&["Phone", "Tel"]), &fields);

        // moving Phone onto Tel leaves the raw "Phone" column under the same key
        plan.assign_by_name("Tel", Some("Phone"), &fields).unwrap();
        assert_eq!(plan.conflicting_keys(&fields), vec!["Phone"]);
        assert!(!plan.is_target_available(1, &phone_id, &fields));

        plan.assign_by_name("Tel", None, &fields).unwrap();
        plan.assign_by_name("Phone", Some("Phone"), &fields).unwrap();
        assert!(plan.conflicting_keys(&fields).is_empty());
    }

    #[test]
    fn test_duplicate_unmapped_headers_are_not_conflicts() {
        let fields = list_fields();
        let plan = MappingPlan::propose(&headers(&["City", "City"]), &fields);
        assert!(plan.conflicting_keys(&fields).is_empty());
    }

    #[test]
    fn test_storage_keys() {
        let fields = list_fields();
        let plan = MappingPlan::propose(&headers(&["company", "Mobile"]), &fields);
        assert_eq!(plan.storage_keys(&fields), vec!["Company", "Mobile"]);
    }
}

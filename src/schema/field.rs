use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ColdlistError, Result};

/// Semantic type of a list column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    PlainText,
    Phone,
    Email,
    Url,
    Number,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::PlainText,
        FieldType::Phone,
        FieldType::Email,
        FieldType::Url,
        FieldType::Number,
        FieldType::Date,
    ];

    /// Label shown in the fields editor
    pub fn label(self) -> &'static str {
        match self {
            FieldType::PlainText => "String (standard)",
            FieldType::Phone => "Phone",
            FieldType::Email => "E-mail",
            FieldType::Url => "www",
            FieldType::Number => "Number",
            FieldType::Date => "Date",
        }
    }

    fn key(self) -> &'static str {
        match self {
            FieldType::PlainText => "plain_text",
            FieldType::Phone => "phone",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Number => "number",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FieldType {
    type Err = ColdlistError;

    /// Accepts the snake_case key or the editor label, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|t| t.key() == wanted || t.label().to_lowercase() == wanted)
            .ok_or_else(|| ColdlistError::InvalidInput(format!("unknown field type: {}", s)))
    }
}

/// A column definition within a list
///
/// `id` is assigned once and never changes; name, type and visibility are editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub visible: bool,
}

impl FieldDescriptor {
    /// New visible field with a freshly generated id
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            field_type,
            visible: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Ordered field definitions of one list; order is the display order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: Vec<FieldDescriptor>,
}

impl FieldSet {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Case-insensitive name lookup; the first match in display order wins
    pub fn find_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        let name = name.to_lowercase();
        self.fields.iter().find(|f| f.name.to_lowercase() == name)
    }

    /// Fields shown in list and detail views
    pub fn visible(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.visible)
    }

    /// Append a visible plain-text field
    pub fn add_field(&mut self, name: impl Into<String>) -> Result<&FieldDescriptor> {
        let name = validate_name(name.into())?;
        self.fields.push(FieldDescriptor::new(name, FieldType::PlainText));
        Ok(&self.fields[self.fields.len() - 1])
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        let name = validate_name(name.into())?;
        self.field_mut(index)?.name = name;
        Ok(())
    }

    pub fn set_type(&mut self, index: usize, field_type: FieldType) -> Result<()> {
        self.field_mut(index)?.field_type = field_type;
        Ok(())
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> Result<()> {
        self.field_mut(index)?.visible = visible;
        Ok(())
    }

    /// Delete a field; only ever called on explicit user request
    pub fn remove(&mut self, index: usize) -> Result<FieldDescriptor> {
        self.check_index(index)?;
        Ok(self.fields.remove(index))
    }

    /// Move the field at `from` so that it ends up at index `to`
    pub fn move_field(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let field = self.fields.remove(from);
            self.fields.insert(to, field);
        }
        Ok(())
    }

    fn field_mut(&mut self, index: usize) -> Result<&mut FieldDescriptor> {
        let len = self.fields.len();
        self.fields
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.fields.len() {
            Ok(())
        } else {
            Err(out_of_range(index, self.fields.len()))
        }
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

fn validate_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ColdlistError::InvalidInput("field name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn out_of_range(index: usize, len: usize) -> ColdlistError {
    ColdlistError::InvalidInput(format!("field index {} out of range (list has {} fields)", index, len))
}

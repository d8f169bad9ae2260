//! Semantic roles derived from column names.
//!
//! One keyword table serves both creation-time type inference and every
//! read-time accessor (display name, phone numbers, e-mail) so the heuristic
//! lives in exactly one place.

use crate::ingest::table::Record;
use crate::schema::field::{FieldDescriptor, FieldSet, FieldType};

/// What a column holds, judged from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticRole {
    Phone,
    Email,
    Website,
    Date,
    Name,
    Company,
    /// Registration or payer code of a business
    CompanyCode,
    Notes,
    Other,
}

// Substring keywords, checked in this order; first match wins.
const PHONE_KEYWORDS: &[&str] = &["phone", "tel", "mobile", "telefon", "mobilus"];
const EMAIL_KEYWORDS: &[&str] = &["email", "e-mail", "mail", "el. paštas", "el_pastas"];
const WEBSITE_KEYWORDS: &[&str] = &["url", "www", "website", "link", "svetain"];
const DATE_KEYWORDS: &[&str] = &["date", "data"];

// Whole-name keys.
const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstname", "name"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastname"];
const NAME_KEYS: &[&str] = &["first_name", "firstname", "name", "last_name", "lastname", "full_name", "pavadinimas"];
const COMPANY_KEYS: &[&str] = &["company", "organization", "business", "įmonė", "imone"];
const COMPANY_CODE_KEYS: &[&str] = &[
    "company_code",
    "company code",
    "mokėtojo kodas",
    "moketojo kodas",
    "mokėtojo_kodas",
    "moketojo_kodas",
    "įmonės kodas",
    "imones_kodas",
];
const NOTES_KEYS: &[&str] = &["notes", "note", "comments", "remark", "pastaba"];

/// Infer the role of a column from its name
pub fn infer_role(key: &str) -> SemanticRole {
    let lower = key.trim().to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if contains_any(PHONE_KEYWORDS) {
        SemanticRole::Phone
    } else if contains_any(EMAIL_KEYWORDS) {
        SemanticRole::Email
    } else if contains_any(WEBSITE_KEYWORDS) {
        SemanticRole::Website
    } else if contains_any(DATE_KEYWORDS) {
        SemanticRole::Date
    } else if NAME_KEYS.contains(&lower.as_str()) {
        SemanticRole::Name
    } else if COMPANY_KEYS.contains(&lower.as_str()) {
        SemanticRole::Company
    } else if COMPANY_CODE_KEYS.contains(&lower.as_str()) {
        SemanticRole::CompanyCode
    } else if NOTES_KEYS.contains(&lower.as_str()) {
        SemanticRole::Notes
    } else {
        SemanticRole::Other
    }
}

impl SemanticRole {
    /// Declared field type corresponding to this role, if any
    pub fn field_type(self) -> Option<FieldType> {
        match self {
            SemanticRole::Phone => Some(FieldType::Phone),
            SemanticRole::Email => Some(FieldType::Email),
            SemanticRole::Website => Some(FieldType::Url),
            SemanticRole::Date => Some(FieldType::Date),
            _ => None,
        }
    }
}

/// Typed, read-only view over one lead's data
///
/// Declared fields are consulted before falling back to key-name roles.
#[derive(Debug, Clone, Copy)]
pub struct LeadView<'a> {
    data: &'a Record,
    fields: &'a FieldSet,
}

impl<'a> LeadView<'a> {
    pub fn new(data: &'a Record, fields: &'a FieldSet) -> Self {
        Self { data, fields }
    }

    /// Value of a declared field, by descriptor
    pub fn value(&self, field: &FieldDescriptor) -> Option<&'a str> {
        non_empty(self.data.get(&field.name).or_else(|| self.data.get_ignore_case(&field.name)))
    }

    /// Visible declared fields paired with their values, in display order
    pub fn visible_values(&self) -> Vec<(&'a FieldDescriptor, &'a str)> {
        self.fields
            .visible()
            .map(|f| (f, self.value(f).unwrap_or("")))
            .collect()
    }

    /// Every distinct phone number on the lead
    pub fn phones(&self) -> Vec<&'a str> {
        let mut phones = Vec::new();
        for value in self.role_values(SemanticRole::Phone) {
            if !phones.contains(&value) {
                phones.push(value);
            }
        }
        phones
    }

    pub fn phone(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::Phone).into_iter().next()
    }

    pub fn email(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::Email).into_iter().next()
    }

    pub fn website(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::Website).into_iter().next()
    }

    pub fn company(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::Company).into_iter().next()
    }

    pub fn company_code(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::CompanyCode).into_iter().next()
    }

    pub fn notes(&self) -> Option<&'a str> {
        self.role_values(SemanticRole::Notes).into_iter().next()
    }

    /// Name shown for the lead: the first declared field's value, else
    /// first/last name keys, else the company, else "Unknown".
    pub fn display_name(&self) -> String {
        if let Some(value) = self.fields.get(0).and_then(|f| self.value(f)) {
            return value.to_string();
        }

        let first = self.first_key(FIRST_NAME_KEYS);
        let last = self.first_key(LAST_NAME_KEYS);
        let joined = [first, last].into_iter().flatten().collect::<Vec<_>>().join(" ");
        if !joined.is_empty() {
            return joined;
        }

        self.company()
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn first_key(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter()
            .find_map(|k| non_empty(self.data.get_ignore_case(k)))
    }

    /// Non-empty values for a role: typed declared fields first, then raw keys
    fn role_values(&self, role: SemanticRole) -> Vec<&'a str> {
        let mut values = Vec::new();

        if let Some(field_type) = role.field_type() {
            for field in self.fields.iter().filter(|f| f.field_type == field_type) {
                values.extend(self.value(field));
            }
        }

        for (key, value) in self.data.iter() {
            if infer_role(key) == role {
                values.extend(non_empty(Some(value)));
            }
        }

        values
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_infer_role_precedence() {
        assert_eq!(infer_role("Mobile Phone Number"), SemanticRole::Phone);
        assert_eq!(infer_role("Telefonas"), SemanticRole::Phone);
        assert_eq!(infer_role("E-Mail address"), SemanticRole::Email);
        assert_eq!(infer_role("Company Website"), SemanticRole::Website);
        assert_eq!(infer_role("Signup Date"), SemanticRole::Date);
        // phone beats email when both keywords appear
        assert_eq!(infer_role("phone or mail"), SemanticRole::Phone);
    }

    #[test]
    fn test_infer_role_exact_keys() {
        assert_eq!(infer_role("Name"), SemanticRole::Name);
        assert_eq!(infer_role("company"), SemanticRole::Company);
        assert_eq!(infer_role("Notes"), SemanticRole::Notes);
        assert_eq!(infer_role("Company name"), SemanticRole::Other);
        assert_eq!(infer_role("Mokėtojo kodas"), SemanticRole::CompanyCode);
        assert_eq!(infer_role("company_code"), SemanticRole::CompanyCode);
    }

    #[test]
    fn test_company_code_accessor() {
        let data = record(&[("Name", "UAB Acme"), ("Mokėtojo kodas", " 302512345 ")]);
        assert_eq!(LeadView::new(&data, &FieldSet::default()).company_code(), Some("302512345"));

        let data = record(&[("company_code", "")]);
        assert_eq!(LeadView::new(&data, &FieldSet::default()).company_code(), None);
    }

    #[test]
    fn test_display_name_prefers_first_declared_field() {
        let fields = FieldSet::new(vec![FieldDescriptor::new("Company", FieldType::PlainText)]);
        let data = record(&[("name", "Jonas"), ("Company", "UAB Acme")]);
        assert_eq!(LeadView::new(&data, &fields).display_name(), "UAB Acme");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let fields = FieldSet::default();

        let data = record(&[("First_Name", "Ada"), ("last_name", "Lovelace")]);
        assert_eq!(LeadView::new(&data, &fields).display_name(), "Ada Lovelace");

        let data = record(&[("company", "Beta LLC")]);
        assert_eq!(LeadView::new(&data, &fields).display_name(), "Beta LLC");

        let data = record(&[("notes", "call after 5")]);
        assert_eq!(LeadView::new(&data, &fields).display_name(), "Unknown");
    }

    #[test]
    fn test_phones_from_typed_fields_and_keys() {
        let fields = FieldSet::new(vec![FieldDescriptor::new("Contact", FieldType::Phone)]);
        let data = record(&[
            ("Contact", "+1-555-0100"),
            ("Mobile", "+1-555-0199"),
            ("Office tel", ""),
            ("Email", "sales@acme.com"),
        ]);
        let view = LeadView::new(&data, &fields);

        assert_eq!(view.phones(), vec!["+1-555-0100", "+1-555-0199"]);
        assert_eq!(view.phone(), Some("+1-555-0100"));
        assert_eq!(view.email(), Some("sales@acme.com"));
        assert_eq!(view.website(), None);
    }

    #[test]
    fn test_visible_values_in_display_order() {
        let mut fields = FieldSet::new(vec![
            FieldDescriptor::new("Name", FieldType::PlainText),
            FieldDescriptor::new("Phone", FieldType::Phone),
            FieldDescriptor::new("Internal id", FieldType::Number),
        ]);
        fields.set_visible(2, false).unwrap();
        let data = record(&[("Phone", "1"), ("Name", "Acme"), ("Internal id", "7")]);

        let values: Vec<(&str, &str)> = LeadView::new(&data, &fields)
            .visible_values()
            .into_iter()
            .map(|(f, v)| (f.name.as_str(), v))
            .collect();
        assert_eq!(values, vec![("Name", "Acme"), ("Phone", "1")]);
    }
}

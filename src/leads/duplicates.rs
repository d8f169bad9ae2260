use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::roles::LeadView;
use crate::config::LeadsConfig;
use crate::error::{ColdlistError, Result};
use crate::ingest::table::Record;
use crate::schema::field::FieldSet;

/// Which value a duplicate group was matched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatch {
    CompanyCode,
    Phone,
}

impl fmt::Display for DuplicateMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicateMatch::CompanyCode => "company code",
            DuplicateMatch::Phone => "phone",
        })
    }
}

/// Leads sharing one company code or one normalized phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub matched_on: DuplicateMatch,
    pub value: String,
    pub lead_ids: Vec<String>,
}

/// One lead to compare, read through its own list's fields
#[derive(Debug, Clone, Copy)]
pub struct DuplicateCandidate<'a> {
    pub lead_id: &'a str,
    pub data: &'a Record,
    pub fields: &'a FieldSet,
}

impl<'a> DuplicateCandidate<'a> {
    pub fn new(lead_id: &'a str, data: &'a Record, fields: &'a FieldSet) -> Self {
        Self { lead_id, data, fields }
    }
}

/// Phone normalization for comparison
pub struct PhoneNormalizer {
    separators: Regex,
    national_prefix: Option<Regex>,
}

impl PhoneNormalizer {
    pub fn new(national_prefix: Option<&str>) -> Result<Self> {
        let separators = Regex::new(r"[\s\-()+]")
            .map_err(|e| ColdlistError::Config(format!("phone separator pattern: {}", e)))?;
        let national_prefix = national_prefix
            .map(|p| Regex::new(&format!("^{}", regex::escape(p))))
            .transpose()
            .map_err(|e| ColdlistError::Config(format!("phone prefix pattern: {}", e)))?;
        Ok(Self {
            separators,
            national_prefix,
        })
    }

    /// Drop separators and `+`, then a leading `00`, then the national prefix
    pub fn normalize(&self, phone: &str) -> String {
        let stripped = self.separators.replace_all(phone, "");
        let digits = stripped.strip_prefix("00").unwrap_or(&*stripped);
        match &self.national_prefix {
            Some(prefix) => prefix.replace(digits, "").into_owned(),
            None => digits.to_string(),
        }
    }
}

/// Normalize with no national prefix configured
pub fn normalize_phone(phone: &str) -> Result<String> {
    Ok(PhoneNormalizer::new(None)?.normalize(phone))
}

/// Groups keyed by value, kept in order of first appearance
struct Grouper {
    matched_on: DuplicateMatch,
    index: HashMap<String, usize>,
    groups: Vec<DuplicateGroup>,
}

impl Grouper {
    fn new(matched_on: DuplicateMatch) -> Self {
        Self {
            matched_on,
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn add(&mut self, value: String, lead_id: &str) {
        match self.index.get(&value) {
            Some(&pos) => self.groups[pos].lead_ids.push(lead_id.to_string()),
            None => {
                self.index.insert(value.clone(), self.groups.len());
                self.groups.push(DuplicateGroup {
                    matched_on: self.matched_on,
                    value,
                    lead_ids: vec![lead_id.to_string()],
                });
            }
        }
    }

    fn into_duplicates(self) -> impl Iterator<Item = DuplicateGroup> {
        self.groups.into_iter().filter(|g| g.lead_ids.len() > 1)
    }
}

/// Group leads that share a company code or a primary phone number
///
/// Company-code groups come first. A phone group whose leads all already sit
/// in company-code groups is left out. Codes shorter than
/// `min_company_code_len` and numbers shorter than `min_phone_digits` after
/// normalization are ignored. Within each kind, groups keep the order of
/// first appearance.
pub fn find_duplicate_groups<'a, I>(candidates: I, config: &LeadsConfig) -> Result<Vec<DuplicateGroup>>
where
    I: IntoIterator<Item = DuplicateCandidate<'a>>,
{
    let normalizer = PhoneNormalizer::new(config.phone_prefix.as_deref())?;
    let mut by_code = Grouper::new(DuplicateMatch::CompanyCode);
    let mut by_phone = Grouper::new(DuplicateMatch::Phone);

    for candidate in candidates {
        let view = LeadView::new(candidate.data, candidate.fields);

        if let Some(code) = view.company_code() {
            if code.chars().count() >= config.min_company_code_len {
                by_code.add(code.to_string(), candidate.lead_id);
            }
        }

        if let Some(phone) = view.phone().map(|p| normalizer.normalize(p)) {
            if phone.chars().count() >= config.min_phone_digits {
                by_phone.add(phone, candidate.lead_id);
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_code.into_duplicates().collect();
    let grouped: HashSet<String> = groups.iter().flat_map(|g| g.lead_ids.iter().cloned()).collect();

    groups.extend(
        by_phone
            .into_duplicates()
            .filter(|g| !g.lead_ids.iter().all(|id| grouped.contains(id))),
    );
    Ok(groups)
}

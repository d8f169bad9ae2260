pub mod duplicates;
pub mod roles;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ColdlistError, Result};
use crate::ingest::table::{RawTable, Record};
use crate::schema::field::FieldSet;
use crate::schema::mapping::MappingPlan;

pub use duplicates::{find_duplicate_groups, normalize_phone, DuplicateCandidate, DuplicateGroup, DuplicateMatch};
pub use roles::{infer_role, LeadView, SemanticRole};

/// Lifecycle status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Callback,
    Won,
    Lost,
    Archived,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Callback => "callback",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
            LeadStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ColdlistError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "qualified" => Ok(LeadStatus::Qualified),
            "callback" => Ok(LeadStatus::Callback),
            "won" => Ok(LeadStatus::Won),
            "lost" => Ok(LeadStatus::Lost),
            "archived" => Ok(LeadStatus::Archived),
            other => Err(ColdlistError::InvalidInput(format!("unknown lead status: {}", other))),
        }
    }
}

/// One materialized row, ready to hand to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub data: Record,
    pub status: LeadStatus,
}

/// One lead per table row, every header copied under its own name
pub fn materialize(table: &RawTable) -> Vec<LeadRecord> {
    materialize_with_keys(table, &table.headers)
}

/// One lead per table row, mapped headers stored under their field's name
pub fn materialize_mapped(table: &RawTable, plan: &MappingPlan, fields: &FieldSet) -> Result<Vec<LeadRecord>> {
    if plan.len() != table.headers.len() {
        return Err(ColdlistError::InvalidInput(format!(
            "mapping covers {} headers but the file has {}",
            plan.len(),
            table.headers.len()
        )));
    }
    let conflicts = plan.conflicting_keys(fields);
    if !conflicts.is_empty() {
        return Err(ColdlistError::InvalidInput(format!(
            "more than one column would be stored as {}; unmap or remap one of them",
            conflicts
                .iter()
                .map(|k| format!("{:?}", k))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(materialize_with_keys(table, &plan.storage_keys(fields)))
}

fn materialize_with_keys(table: &RawTable, keys: &[String]) -> Vec<LeadRecord> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut data = Record::with_capacity(keys.len());
            for (header, key) in table.headers.iter().zip(keys) {
                data.insert(key.as_str(), row.get(header).unwrap_or(""));
            }
            LeadRecord {
                data,
                status: LeadStatus::New,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::loaders::delimited::parse_delimited;
    use crate::schema::field::{FieldDescriptor, FieldType};

    #[test]
    fn test_materialize_single_row() {
        let table = RawTable {
            headers: vec!["A".to_string(), "B".to_string()],
            rows: vec![vec![("A", "x"), ("B", "y")].into_iter().collect()],
        };
        let leads = materialize(&table);

        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].status, LeadStatus::New);
        assert_eq!(leads[0].data.iter().collect::<Vec<_>>(), vec![("A", "x"), ("B", "y")]);
    }

    #[test]
    fn test_materialize_keeps_every_row_in_order() {
        let table = parse_delimited("Name,Phone\nAcme,1\nBeta,\nGamma,3");
        let leads = materialize(&table);
        let names: Vec<&str> = leads.iter().map(|l| l.data.get("Name").unwrap()).collect();
        assert_eq!(names, vec!["Acme", "Beta", "Gamma"]);
        assert_eq!(leads[1].data.get("Phone"), Some(""));
    }

    #[test]
    fn test_materialize_mapped_renames_matched_columns() {
        let fields = FieldSet::new(vec![
            FieldDescriptor::new("Company", FieldType::PlainText),
            FieldDescriptor::new("Phone", FieldType::Phone),
        ]);
        let table = parse_delimited("company,Tel,City\nAcme,+370 600 00000,Vilnius");
        let mut plan = MappingPlan::propose(&table.headers, &fields);
        plan.assign_by_name("Tel", Some("Phone"), &fields).unwrap();

        let leads = materialize_mapped(&table, &plan, &fields).unwrap();
        let data: Vec<(&str, &str)> = leads[0].data.iter().collect();
        assert_eq!(
            data,
            vec![("Company", "Acme"), ("Phone", "+370 600 00000"), ("City", "Vilnius")]
        );
    }

    #[test]
    fn test_materialize_mapped_rejects_foreign_plan() {
        let fields = FieldSet::default();
        let table = parse_delimited("A,B\n1,2");
        let plan = MappingPlan::propose(&["A".to_string()], &fields);
        assert!(materialize_mapped(&table, &plan, &fields).is_err());
    }

    #[test]
    fn test_materialize_mapped_rejects_key_collision() {
        let fields = FieldSet::new(vec![FieldDescriptor::new("Phone", FieldType::Phone)]);
        let table = parse_delimited("Phone,Tel\n111,222");
        let mut plan = MappingPlan::propose(&table.headers, &fields);
        plan.assign_by_name("Tel", Some("Phone"), &fields).unwrap();

        let err = materialize_mapped(&table, &plan, &fields).unwrap_err();
        assert!(matches!(err, ColdlistError::InvalidInput(_)));
        assert!(err.to_string().contains("\"Phone\""));
    }

    #[test]
    fn test_status_round_trip_text() {
        for status in ["new", "contacted", "qualified", "callback", "won", "lost", "archived"] {
            assert_eq!(status.parse::<LeadStatus>().unwrap().as_str(), status);
        }
        assert!("pending".parse::<LeadStatus>().is_err());
    }
}

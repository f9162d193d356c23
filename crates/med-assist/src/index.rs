/// Autocomplete index over the drug catalog.
///
/// Four sorted, de-duplicated sets of lower-cased tokens, rebuilt whenever
/// the catalog is (re)loaded and read-only everywhere else. Sorted
/// materialization keeps autocomplete ordering reproducible across rebuilds.
use std::collections::BTreeSet;

use crate::model::DrugRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndex {
    pub drug_names: Vec<String>,
    pub brand_names: Vec<String>,
    pub conditions: Vec<String>,
    pub drug_classes: Vec<String>,
}

impl SearchIndex {
    /// Derive the index from the catalog. Never fails: malformed or empty
    /// fields are skipped, since partial indexing beats no search at all.
    pub fn build(records: &[DrugRecord]) -> Self {
        let mut drug_names = BTreeSet::new();
        let mut brand_names = BTreeSet::new();
        let mut conditions = BTreeSet::new();
        let mut drug_classes = BTreeSet::new();

        for record in records {
            insert_token(&mut drug_names, &record.generic_name);
            insert_split(&mut brand_names, &record.brand_names);
            insert_split(&mut drug_classes, &record.drug_classes);
            if let Some(condition) = &record.medical_condition {
                insert_split(&mut conditions, condition);
            }
        }

        Self {
            drug_names: drug_names.into_iter().collect(),
            brand_names: brand_names.into_iter().collect(),
            conditions: conditions.into_iter().collect(),
            drug_classes: drug_classes.into_iter().collect(),
        }
    }
}

fn insert_token(set: &mut BTreeSet<String>, value: &str) {
    let token = value.trim().to_lowercase();
    if !token.is_empty() {
        set.insert(token);
    }
}

fn insert_split(set: &mut BTreeSet<String>, value: &str) {
    for part in value.split(',') {
        insert_token(set, part);
    }
}

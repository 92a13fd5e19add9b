use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::classify::{Classification, Classifier, StatusCategory};
use crate::derivation::{derive, Derived};
use crate::models::LoanRecord;
use crate::normalize::format_number;
use crate::rules::RuleBook;

/// A record after derivation and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRecord {
    pub record: LoanRecord,
    pub derived: Derived,
    pub class: Classification,
}

/// Side tables collected during the classification pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Distinct non-blank status keys, sorted.
    pub status_keys: Vec<String>,
    /// `(status key, overdue value)` for every missed status lookup,
    /// deduplicated in first-seen order.
    pub status_misses: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub reporting_date: NaiveDate,
    pub records: Vec<ProcessedRecord>,
    pub diagnostics: Diagnostics,
}

/// Derive, then classify, every record in input order.
pub fn process(records: Vec<LoanRecord>, rules: &RuleBook, reporting_date: NaiveDate) -> Batch {
    let classifier = Classifier::new(rules);
    let mut keys = BTreeSet::new();
    let mut seen_misses = HashSet::new();
    let mut misses = Vec::new();

    let processed: Vec<ProcessedRecord> = records
        .into_iter()
        .map(|record| {
            let derived = derive(&record, reporting_date);
            let class = classifier.classify(&record, &derived);

            let key = record.status_key();
            if !key.trim().is_empty() {
                keys.insert(key.to_string());
            }
            if class.status == StatusCategory::NotFound {
                let miss = (key.to_string(), format_number(record.overdue()));
                if seen_misses.insert(miss.clone()) {
                    misses.push(miss);
                }
            }
            ProcessedRecord { record, derived, class }
        })
        .collect();

    if !misses.is_empty() {
        debug!(count = misses.len(), "status keys missing from the status map");
    }
    info!(records = processed.len(), %reporting_date, "classified records");

    Batch {
        reporting_date,
        records: processed,
        diagnostics: Diagnostics {
            status_keys: keys.into_iter().collect(),
            status_misses: misses,
        },
    }
}

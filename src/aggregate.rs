//! Grouped summaries over classified records.
//!
//! Groups are keyed by the category strings exactly as they appear on the
//! record, empty strings included, and are emitted in ascending key order.

use std::collections::BTreeMap;

use crate::pipeline::ProcessedRecord;

pub const SELECTION_KEY_HEADERS: [&str; 11] = [
    "S070Код",
    "S070Строка",
    "S186Строка",
    "S186Код",
    "S186КодиСтрока",
    "S190Строка",
    "S190Код",
    "S190КодИСтрока",
    "S242Строка",
    "S242Код",
    "S242КодИСтрока",
];

pub const COMMISSION_KEY_HEADERS: [&str; 5] = [
    "S070Код",
    "S070Строка",
    "S190Строка",
    "S190Код",
    "S190КодИСтрока",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRow {
    pub key: Vec<String>,
    pub sum: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionRow {
    pub key: Vec<String>,
    pub commission: f64,
    pub amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionTotalsRow {
    pub key: Vec<String>,
    pub commission: f64,
    pub amount: f64,
}

/// Running sums for one group.
#[derive(Debug, Clone, Copy)]
struct Accumulator<const N: usize> {
    sums: [f64; N],
    count: usize,
}

impl<const N: usize> Default for Accumulator<N> {
    fn default() -> Self {
        Self { sums: [0.0; N], count: 0 }
    }
}

fn group<const N: usize>(
    items: impl IntoIterator<Item = (Vec<String>, [f64; N])>,
) -> BTreeMap<Vec<String>, Accumulator<N>> {
    let mut groups: BTreeMap<Vec<String>, Accumulator<N>> = BTreeMap::new();
    for (key, values) in items {
        let acc = groups.entry(key).or_default();
        for (sum, v) in acc.sums.iter_mut().zip(values) {
            *sum += v;
        }
        acc.count += 1;
    }
    groups
}

pub fn selection_key(r: &ProcessedRecord) -> Vec<String> {
    let c = &r.class;
    vec![
        c.s070_code.clone(),
        c.s070_composite.clone(),
        c.s186.text.clone(),
        c.s186.code.clone(),
        c.s186.composite(),
        c.s190.text.clone(),
        c.s190.code.clone(),
        c.s190.composite(),
        c.s242.text.clone(),
        c.s242.code.clone(),
        c.s242.composite(),
    ]
}

pub fn commission_key(r: &ProcessedRecord) -> Vec<String> {
    let c = &r.class;
    vec![
        c.s070_code.clone(),
        c.s070_composite.clone(),
        c.s190.text.clone(),
        c.s190.code.clone(),
        c.s190.composite(),
    ]
}

/// Disbursed amount per category group, over records with a strictly
/// positive disbursed amount.
pub fn selection(records: &[ProcessedRecord]) -> Vec<SelectionRow> {
    let items = records
        .iter()
        .filter(|r| r.record.disbursed_amount() > 0.0)
        .map(|r| (selection_key(r), [r.record.disbursed_amount()]));
    group(items)
        .into_iter()
        .map(|(key, acc)| SelectionRow { key, sum: acc.sums[0], count: acc.count })
        .collect()
}

/// Selection rows fit for submission: positive sum and count.
pub fn selection_for_nbu(rows: &[SelectionRow]) -> Vec<SelectionRow> {
    rows.iter().filter(|r| r.sum > 0.0 && r.count > 0).cloned().collect()
}

/// In-period commission and as-of-date amount per S070/S190 group, over
/// every record.
pub fn commission(records: &[ProcessedRecord]) -> Vec<CommissionRow> {
    let items = records.iter().map(|r| {
        (
            commission_key(r),
            [r.derived.commission_in_period, r.derived.amount_as_of_date],
        )
    });
    group(items)
        .into_iter()
        .map(|(key, acc)| CommissionRow {
            key,
            commission: acc.sums[0],
            amount: acc.sums[1],
            count: acc.count,
        })
        .collect()
}

/// Re-aggregates commission rows by the same key and drops groups where
/// both sums are exactly zero.
pub fn commission_for_nbu(rows: &[CommissionRow]) -> Vec<CommissionTotalsRow> {
    let items = rows.iter().map(|r| (r.key.clone(), [r.commission, r.amount]));
    group(items)
        .into_iter()
        .filter(|(_, acc)| acc.sums[0] != 0.0 || acc.sums[1] != 0.0)
        .map(|(key, acc)| CommissionTotalsRow {
            key,
            commission: acc.sums[0],
            amount: acc.sums[1],
        })
        .collect()
}

//! Rule tables loaded once per run from the rule configuration file.
//!
//! The configuration is loosely shaped (a status entry is either a bare value
//! or an object, a range block is either a keyed object or a list, bounds may
//! be numbers or numeric strings). Everything is resolved into typed tables
//! here, before any record is classified.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LoanbookError, Result};

pub const DEFAULT_CODE: &str = "00";

// ---------------------------------------------------------------------------
// Status map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRule {
    pub value: String,
    pub needs_overdue_check: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StatusRuleTable {
    entries: HashMap<String, StatusRule>,
}

impl StatusRuleTable {
    pub fn lookup(&self, key: &str) -> Option<&StatusRule> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries sorted by key, for display.
    pub fn sorted(&self) -> Vec<(&str, &StatusRule)> {
        let mut out: Vec<_> = self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }
}

// ---------------------------------------------------------------------------
// Code / label map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CodeLabelTable {
    codes: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl CodeLabelTable {
    /// Registered code, or `"00"` when the key is unknown.
    pub fn code(&self, key: &str) -> &str {
        self.codes.get(key).map(String::as_str).unwrap_or(DEFAULT_CODE)
    }

    /// Registered label, or the key itself when none is registered.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        match self.labels.get(key) {
            Some(label) if !label.is_empty() => label.as_str(),
            _ => key,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.codes.keys().map(String::as_str).collect();
        keys.sort();
        keys
    }
}

// ---------------------------------------------------------------------------
// Range rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RangeRule {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub code: String,
}

impl RangeRule {
    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Rules kept sorted by `(start, end)`; equal bounds keep file order.
#[derive(Debug, Clone, Default)]
pub struct RangeRuleList {
    rules: Vec<RangeRule>,
}

impl RangeRuleList {
    pub fn new(mut rules: Vec<RangeRule>) -> Self {
        rules.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));
        Self { rules }
    }

    /// First rule, in sorted order, whose inclusive interval holds `value`.
    pub fn find(&self, value: Option<f64>) -> Option<&RangeRule> {
        let v = value?;
        self.rules.iter().find(|r| r.contains(v))
    }

    /// `(text, code)` of the matching rule, or `("00", "")` when nothing
    /// matches or the input is not a number.
    pub fn match_value(&self, value: Option<f64>) -> (&str, &str) {
        match self.find(value) {
            Some(r) => (r.text.as_str(), r.code.as_str()),
            None => (DEFAULT_CODE, ""),
        }
    }

    pub fn rules(&self) -> &[RangeRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

// ---------------------------------------------------------------------------
// Rule book
// ---------------------------------------------------------------------------

/// All rule tables of a run. Immutable once loaded and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    pub status: StatusRuleTable,
    pub s070: CodeLabelTable,
    pub s186: RangeRuleList,
    pub s190: RangeRuleList,
    pub s242: RangeRuleList,
}

#[derive(Deserialize, Default)]
struct RawRuleFile {
    #[serde(rename = "статус2БЛОК", alias = "status", default)]
    status: Option<Map<String, Value>>,
    #[serde(rename = "S070БЛОК", alias = "s070", default)]
    s070: Option<Map<String, Value>>,
    #[serde(rename = "S186БЛОК", alias = "s186", default)]
    s186: Option<RawRangeBlock>,
    #[serde(rename = "S190БЛОК", alias = "s190", default)]
    s190: Option<RawRangeBlock>,
    #[serde(rename = "S242БЛОК", alias = "s242", default)]
    s242: Option<RawRangeBlock>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRangeBlock {
    Keyed(Map<String, Value>),
    Listed(Vec<Value>),
    Other(Value),
}

impl RuleBook {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoanbookError::RulesNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let content = content.trim_start_matches('\u{feff}');
        let book = Self::from_json_str(content).map_err(|reason| LoanbookError::InvalidRules {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(
            path = %path.display(),
            status = book.status.len(),
            s070 = book.s070.len(),
            s186 = book.s186.len(),
            s190 = book.s190.len(),
            s242 = book.s242.len(),
            "loaded rule tables"
        );
        Ok(book)
    }

    pub fn from_json_str(content: &str) -> std::result::Result<Self, String> {
        let raw: RawRuleFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        Ok(Self {
            status: parse_status_block(raw.status.unwrap_or_default()),
            s070: parse_code_label_block(raw.s070.unwrap_or_default()),
            s186: parse_range_block("S186", raw.s186),
            s190: parse_range_block("S190", raw.s190),
            s242: parse_range_block("S242", raw.s242),
        })
    }
}

// ---------------------------------------------------------------------------
// Block parsers
// ---------------------------------------------------------------------------

/// String form of a scalar config value. `null` becomes empty.
fn scalar_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        other => other.to_string(),
    }
}

/// First present key wins, even when its value is `null`.
fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn is_yes(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        other => {
            let s = scalar_string(other).trim().to_lowercase();
            s == "да" || s == "yes" || s == "true"
        }
    }
}

fn parse_status_block(block: Map<String, Value>) -> StatusRuleTable {
    let entries = block
        .into_iter()
        .map(|(key, entry)| {
            let rule = match &entry {
                Value::String(s) => StatusRule { value: s.clone(), needs_overdue_check: false },
                Value::Object(obj) => StatusRule {
                    value: first_of(obj, &["value", "значение"]).map(scalar_string).unwrap_or_default(),
                    needs_overdue_check: first_of(obj, &["проверкаколонка38", "check_column_38"])
                        .map(is_yes)
                        .unwrap_or(false),
                },
                _ => StatusRule { value: String::new(), needs_overdue_check: false },
            };
            (key, rule)
        })
        .collect();
    StatusRuleTable { entries }
}

fn parse_code_label_block(block: Map<String, Value>) -> CodeLabelTable {
    let mut table = CodeLabelTable::default();
    for (key, entry) in block {
        let (code, label) = match &entry {
            Value::Object(obj) => (
                first_of(obj, &["код", "code", "value"]).map(scalar_string).unwrap_or_default(),
                first_of(obj, &["кодстрокдоп", "label"]).map(scalar_string).unwrap_or_default(),
            ),
            other => (scalar_string(other), String::new()),
        };
        table.codes.insert(key.clone(), code);
        table.labels.insert(key, label);
    }
    table
}

fn bound(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn parse_range_rule(obj: &Map<String, Value>, text_keys: &[&str]) -> Option<RangeRule> {
    let start = bound(first_of(obj, &["начало", "start"]))?;
    let end = bound(first_of(obj, &["конец", "end"]))?;
    Some(RangeRule {
        start,
        end,
        text: first_of(obj, text_keys).map(scalar_string).unwrap_or_default(),
        code: first_of(obj, &["кодстроки", "code", "код"]).map(scalar_string).unwrap_or_default(),
    })
}

fn parse_range_block(name: &str, block: Option<RawRangeBlock>) -> RangeRuleList {
    const KEYED_TEXT: &[&str] = &["значение", "value", "текст", "label"];
    const LISTED_TEXT: &[&str] = &["значение", "value", "текст", "label", "ключ"];

    let (entries, text_keys): (Vec<Value>, &[&str]) = match block {
        None => (Vec::new(), KEYED_TEXT),
        Some(RawRangeBlock::Keyed(map)) => (map.into_iter().map(|(_, v)| v).collect(), KEYED_TEXT),
        Some(RawRangeBlock::Listed(list)) => (list, LISTED_TEXT),
        Some(RawRangeBlock::Other(v)) => {
            warn!(block = name, value = %v, "range block is neither an object nor a list; ignored");
            (Vec::new(), KEYED_TEXT)
        }
    };

    let mut dropped = 0usize;
    let rules = entries
        .iter()
        .filter_map(|entry| {
            let parsed = entry.as_object().and_then(|obj| parse_range_rule(obj, text_keys));
            if parsed.is_none() {
                dropped += 1;
            }
            parsed
        })
        .collect();
    if dropped > 0 {
        debug!(block = name, dropped, "skipped range entries without numeric bounds");
    }
    RangeRuleList::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(start: f64, end: f64, text: &str, code: &str) -> RangeRule {
        RangeRule { start, end, text: text.into(), code: code.into() }
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let list = RangeRuleList::new(vec![rule(1.0, 30.0, "short", "1")]);
        assert_eq!(list.match_value(Some(1.0)), ("short", "1"));
        assert_eq!(list.match_value(Some(30.0)), ("short", "1"));
        assert_eq!(list.match_value(Some(30.5)), ("00", ""));
        assert_eq!(list.match_value(Some(0.0)), ("00", ""));
    }

    #[test]
    fn test_overlapping_ranges_smallest_start_then_end_wins() {
        let list = RangeRuleList::new(vec![
            rule(10.0, 100.0, "wide", "3"),
            rule(0.0, 50.0, "low-wide", "2"),
            rule(0.0, 20.0, "low-narrow", "1"),
        ]);
        assert_eq!(list.match_value(Some(15.0)), ("low-narrow", "1"));
        assert_eq!(list.match_value(Some(40.0)), ("low-wide", "2"));
        assert_eq!(list.match_value(Some(60.0)), ("wide", "3"));
    }

    #[test]
    fn test_equal_bounds_keep_file_order() {
        let list = RangeRuleList::new(vec![rule(0.0, 5.0, "first", "A"), rule(0.0, 5.0, "second", "B")]);
        assert_eq!(list.match_value(Some(3.0)), ("first", "A"));
    }

    #[test]
    fn test_non_numeric_input_yields_sentinel() {
        let list = RangeRuleList::new(vec![rule(0.0, 5.0, "x", "1")]);
        assert_eq!(list.match_value(None), ("00", ""));
    }

    #[test]
    fn test_status_block_literal_and_object_entries() {
        let json = r#"{
            "статус2БЛОК": {
                "A": "Активний",
                "B": {"value": "ignored", "проверкаколонка38": "Да"},
                "C": {"значение": "Реструктуризований", "проверкаколонка38": "нет"},
                "D": 17
            }
        }"#;
        let book = RuleBook::from_json_str(json).unwrap();
        assert_eq!(
            book.status.lookup("A"),
            Some(&StatusRule { value: "Активний".into(), needs_overdue_check: false })
        );
        assert!(book.status.lookup("B").unwrap().needs_overdue_check);
        assert_eq!(book.status.lookup("C").unwrap().value, "Реструктуризований");
        assert!(!book.status.lookup("C").unwrap().needs_overdue_check);
        assert_eq!(book.status.lookup("D").unwrap().value, "");
        assert!(book.status.lookup("E").is_none());
    }

    #[test]
    fn test_code_label_defaults() {
        let json = r#"{
            "S070БЛОК": {
                "Активний": {"код": "1", "кодстрокдоп": "Діючий"},
                "Прострочений": "2",
                "Закритий": {"code": "3"}
            }
        }"#;
        let book = RuleBook::from_json_str(json).unwrap();
        assert_eq!(book.s070.code("Активний"), "1");
        assert_eq!(book.s070.label("Активний"), "Діючий");
        assert_eq!(book.s070.code("Прострочений"), "2");
        assert_eq!(book.s070.label("Прострочений"), "Прострочений");
        assert_eq!(book.s070.code("Закритий"), "3");
        assert_eq!(book.s070.code("Ненашли"), "00");
        assert_eq!(book.s070.label("Ненашли"), "Ненашли");
    }

    #[test]
    fn test_range_block_as_object_and_list() {
        let json = r#"{
            "S186БЛОК": {
                "b": {"начало": "31", "конец": 90, "значение": "до 3 міс", "кодстроки": "2"},
                "a": {"начало": 0, "конец": 30, "значение": "до 1 міс", "кодстроки": "1"}
            },
            "S190БЛОК": [
                {"start": 1, "end": 7, "ключ": "1-7 днів", "code": "B"},
                {"start": "x", "end": 7, "label": "broken", "code": "Z"},
                "not an object",
                {"start": 0, "end": 0, "label": "без прострочки", "code": "A"}
            ]
        }"#;
        let book = RuleBook::from_json_str(json).unwrap();
        assert_eq!(book.s186.len(), 2);
        assert_eq!(book.s186.rules()[0].text, "до 1 міс");
        assert_eq!(book.s186.match_value(Some(45.0)), ("до 3 міс", "2"));
        assert_eq!(book.s190.len(), 2);
        assert_eq!(book.s190.match_value(Some(0.0)), ("без прострочки", "A"));
        assert_eq!(book.s190.match_value(Some(3.0)), ("1-7 днів", "B"));
        assert_eq!(book.s242.len(), 0);
    }

    #[test]
    fn test_missing_blocks_are_empty() {
        let book = RuleBook::from_json_str("{}").unwrap();
        assert_eq!(book.status.len(), 0);
        assert_eq!(book.s070.len(), 0);
        assert_eq!(book.s186.len(), 0);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status2_map.json");
        let err = RuleBook::load(&path).unwrap_err();
        assert!(err.to_string().contains("status2_map.json"));
    }

    #[test]
    fn test_load_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = RuleBook::load(&path).unwrap_err();
        assert!(matches!(err, LoanbookError::InvalidRules { .. }));
        assert!(err.to_string().contains("rules.json"));
    }
}

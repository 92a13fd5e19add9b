use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::normalize::format_number;
use crate::rules::{RangeRuleList, RuleBook};
use crate::settings::{resolve_config_path, RULES_FILE};

fn range_table(rules: &RangeRuleList) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Start", "End", "Text", "Code"]);
    for (i, rule) in rules.rules().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format_number(rule.start)).set_alignment(CellAlignment::Right),
            Cell::new(format_number(rule.end)).set_alignment(CellAlignment::Right),
            Cell::new(&rule.text),
            Cell::new(&rule.code),
        ]);
    }
    table
}

pub fn list(rules: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(rules.as_deref(), RULES_FILE);
    let book = RuleBook::load(&path)?;
    println!("Rules from {}\n", path.display().to_string().cyan());

    let mut status = Table::new();
    status.set_header(vec!["Key", "Status", "Overdue check"]);
    for (key, rule) in book.status.sorted() {
        status.add_row(vec![
            Cell::new(key),
            Cell::new(&rule.value),
            Cell::new(if rule.needs_overdue_check { "yes" } else { "" }),
        ]);
    }
    println!("{} ({})\n{status}\n", "Status map".bold(), book.status.len());

    let mut s070 = Table::new();
    s070.set_header(vec!["Status", "Code", "Label"]);
    for key in book.s070.sorted_keys() {
        s070.add_row(vec![
            Cell::new(key),
            Cell::new(book.s070.code(key)),
            Cell::new(book.s070.label(key)),
        ]);
    }
    println!("{} ({})\n{s070}\n", "S070 codes".bold(), book.s070.len());

    for (name, list) in [("S186", &book.s186), ("S190", &book.s190), ("S242", &book.s242)] {
        println!("{} ({})\n{}\n", format!("{name} ranges").bold(), list.len(), range_table(list));
    }
    Ok(())
}

use std::path::PathBuf;

use colored::Colorize;

use crate::error::{LoanbookError, Result};
use crate::settings::{RULES_FILE, SETTINGS_FILE};

const SETTINGS_TEMPLATE: &str = r#"{
  "files": [
    "MC_NBU_2025-07.xlsx"
  ],
  "поточнадата": "01.08.2025",
  "sheet_name": "Лист1"
}
"#;

const RULES_TEMPLATE: &str = r#"{
  "статус2БЛОК": {
    "Погашено": "Закритий",
    "Діючий": "Активний",
    "Прострочено": "Прострочений",
    "Діючий з перевіркою": {"значение": "Прострочений", "проверкаколонка38": "да"}
  },
  "S070БЛОК": {
    "Активний": {"код": "1", "кодстрокдоп": "Стандартний"},
    "Прострочений": {"код": "2", "кодстрокдоп": "Прострочений"},
    "Закритий": {"код": "3", "кодстрокдоп": "Закритий"},
    "Ненашли": {"код": "9", "кодстрокдоп": "Не визначено"}
  },
  "S186БЛОК": [
    {"начало": 0, "конец": 30, "значение": "До 30 днів", "кодстроки": "1"},
    {"начало": 31, "конец": 365, "значение": "Від 31 до 365 днів", "кодстроки": "2"},
    {"начало": 366, "конец": 100000, "значение": "Понад рік", "кодстроки": "3"}
  ],
  "S190БЛОК": [
    {"начало": 0, "конец": 0, "значение": "Без прострочення", "кодстроки": "A"},
    {"начало": 1, "конец": 30, "значение": "Від 1 до 30 днів", "кодстроки": "B"},
    {"начало": 31, "конец": 100000, "значение": "Понад 30 днів", "кодстроки": "C"}
  ],
  "S242БЛОК": [
    {"начало": -100000, "конец": 0, "значение": "Строк минув", "кодстроки": "0"},
    {"начало": 1, "конец": 30, "значение": "До 30 днів", "кодстроки": "1"},
    {"начало": 31, "конец": 100000, "значение": "Понад 30 днів", "кодстроки": "2"}
  ]
}
"#;

pub fn run(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let targets = [(SETTINGS_FILE, SETTINGS_TEMPLATE), (RULES_FILE, RULES_TEMPLATE)];
    if !force {
        if let Some((name, _)) = targets.iter().find(|(name, _)| dir.join(name).exists()) {
            return Err(LoanbookError::Other(format!(
                "{} already exists (use --force to overwrite)",
                dir.join(name).display()
            )));
        }
    }
    for (name, content) in targets {
        let path = dir.join(name);
        std::fs::write(&path, content)?;
        println!("Wrote {}", path.display().to_string().green());
    }
    Ok(())
}

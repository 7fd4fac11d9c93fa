// Persistence of the selection and grouping histories.
//
// One unified JSON file for the exam selections of every sheet, one JSON
// file per sheet for the group drawings. Files are rewritten whole; there is
// no locking, per the single-operator model.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use tirage::Drawing;

use crate::app::*;

pub const EXAM_HISTORY_FILE: &str = "historique_exam.json";
pub const GROUP_HISTORY_PREFIX: &str = "group_history_";

/// One persisted exam selection. The wire names match the historical file
/// format.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExamEntry {
    #[serde(rename = "Identité")]
    pub identity: String,
    #[serde(rename = "Feuille")]
    pub sheet: String,
}

pub fn exam_history_path(dir: &Path) -> PathBuf {
    dir.join(EXAM_HISTORY_FILE)
}

pub fn group_history_path(dir: &Path, sheet: &str) -> PathBuf {
    dir.join(format!("{}{}.json", GROUP_HISTORY_PREFIX, sheet))
}

/// Loads the unified exam history. A missing file is an empty history.
pub fn load_exam_history(path: &Path) -> AppResult<Vec<ExamEntry>> {
    match read_if_exists(path)? {
        None => Ok(Vec::new()),
        Some(contents) => serde_json::from_str(&contents).context(ParsingHistorySnafu {
            path: path.display().to_string(),
        }),
    }
}

/// Rewrites the unified exam history in full.
pub fn save_exam_history(entries: &[ExamEntry], path: &Path) -> AppResult<()> {
    write_json(entries, path)
}

/// Loads the drawing history of one sheet. A missing file is an empty
/// history.
pub fn load_group_history(path: &Path) -> AppResult<Vec<Drawing>> {
    match read_if_exists(path)? {
        None => Ok(Vec::new()),
        Some(contents) => serde_json::from_str(&contents).context(ParsingHistorySnafu {
            path: path.display().to_string(),
        }),
    }
}

/// Rewrites the drawing history of one sheet in full.
pub fn save_group_history(past: &[Drawing], path: &Path) -> AppResult<()> {
    write_json(past, path)
}

/// Membership view of the unified history: for each sheet, the set of
/// identities already selected there.
pub fn selected_by_sheet(entries: &[ExamEntry]) -> HashMap<String, HashSet<String>> {
    let mut index: HashMap<String, HashSet<String>> = HashMap::new();
    for entry in entries {
        index
            .entry(entry.sheet.clone())
            .or_default()
            .insert(entry.identity.clone());
    }
    index
}

/// One-time import of a legacy per-sheet history file (a JSON array of
/// identities) into the unified file. Every imported identity is tagged with
/// the sheet the legacy file was keyed by. Returns the number of imported
/// records.
pub fn import_legacy_exam_history(
    legacy_path: &Path,
    sheet: &str,
    unified_path: &Path,
) -> AppResult<usize> {
    let contents = fs::read_to_string(legacy_path).context(ReadingHistorySnafu {
        path: legacy_path.display().to_string(),
    })?;
    let identities: Vec<String> = serde_json::from_str(&contents).context(ParsingHistorySnafu {
        path: legacy_path.display().to_string(),
    })?;

    let mut entries = load_exam_history(unified_path)?;
    let count = identities.len();
    entries.extend(identities.into_iter().map(|identity| ExamEntry {
        identity,
        sheet: sheet.to_string(),
    }));
    save_exam_history(&entries, unified_path)?;
    info!(
        "import_legacy_exam_history: imported {} record(s) from {:?} for sheet {}",
        count, legacy_path, sheet
    );
    Ok(count)
}

fn read_if_exists(path: &Path) -> AppResult<Option<String>> {
    if !path.exists() {
        debug!("read_if_exists: no file at {:?}, starting empty", path);
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .context(ReadingHistorySnafu {
            path: path.display().to_string(),
        })
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> AppResult<()> {
    let js = serde_json::to_string_pretty(value).context(ParsingHistorySnafu {
        path: path.display().to_string(),
    })?;
    fs::write(path, js).context(WritingHistorySnafu {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn entry(identity: &str, sheet: &str) -> ExamEntry {
        ExamEntry {
            identity: identity.to_string(),
            sheet: sheet.to_string(),
        }
    }

    #[test]
    fn missing_files_load_as_empty_histories() {
        let dir = temp_dir("hist-missing");
        assert_eq!(
            load_exam_history(&exam_history_path(&dir)).unwrap(),
            Vec::new()
        );
        assert_eq!(
            load_group_history(&group_history_path(&dir, "G01")).unwrap(),
            Vec::<Drawing>::new()
        );
    }

    #[test]
    fn exam_history_round_trips() {
        let dir = temp_dir("hist-exam");
        let path = exam_history_path(&dir);
        let entries = vec![
            entry("Marie Curie", "G01"),
            entry("Paul Langevin", "G01"),
            entry("Irène Joliot", "G02"),
        ];
        save_exam_history(&entries, &path).unwrap();
        assert_eq!(load_exam_history(&path).unwrap(), entries);
    }

    #[test]
    fn exam_history_uses_the_historical_wire_names() {
        let dir = temp_dir("hist-wire");
        let path = exam_history_path(&dir);
        save_exam_history(&[entry("Marie Curie", "G01")], &path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Identité"), "raw: {}", raw);
        assert!(raw.contains("Feuille"), "raw: {}", raw);
    }

    #[test]
    fn group_history_round_trips() {
        let dir = temp_dir("hist-groups");
        let path = group_history_path(&dir, "G01");
        let past: Vec<Drawing> = vec![
            vec![
                vec!["A B".to_string(), "C D".to_string()],
                vec!["E F".to_string()],
            ],
            vec![
                vec!["E F".to_string()],
                vec!["A B".to_string(), "C D".to_string()],
            ],
        ];
        save_group_history(&past, &path).unwrap();
        assert_eq!(load_group_history(&path).unwrap(), past);
    }

    #[test]
    fn group_history_files_are_keyed_by_sheet() {
        let dir = temp_dir("hist-key");
        assert_ne!(
            group_history_path(&dir, "G01"),
            group_history_path(&dir, "G02")
        );
        assert!(group_history_path(&dir, "G01")
            .to_string_lossy()
            .ends_with("group_history_G01.json"));
    }

    #[test]
    fn membership_is_indexed_by_sheet() {
        let entries = vec![
            entry("Marie Curie", "G01"),
            entry("Paul Langevin", "G02"),
            entry("Marie Curie", "G02"),
        ];
        let index = selected_by_sheet(&entries);
        assert_eq!(index["G01"].len(), 1);
        assert_eq!(index["G02"].len(), 2);
        assert!(index["G02"].contains("Marie Curie"));
        assert!(index.get("G03").is_none());
    }

    #[test]
    fn corrupted_files_are_reported_with_their_path() {
        let dir = temp_dir("hist-bad");
        let path = exam_history_path(&dir);
        fs::write(&path, "{not json").unwrap();
        match load_exam_history(&path) {
            Err(AppError::ParsingHistory { path: p, .. }) => {
                assert!(p.ends_with(EXAM_HISTORY_FILE));
            }
            other => panic!("expected ParsingHistory, got {:?}", other),
        }
    }

    #[test]
    fn legacy_files_migrate_with_the_given_sheet() {
        let dir = temp_dir("hist-migrate");
        let legacy = dir.join("historique_exam_G04.json");
        fs::write(&legacy, r#"["Marie Curie", "Paul Langevin"]"#).unwrap();
        let unified = exam_history_path(&dir);
        save_exam_history(&[entry("Irène Joliot", "G02")], &unified).unwrap();

        let count = import_legacy_exam_history(&legacy, "G04", &unified).unwrap();
        assert_eq!(count, 2);

        let entries = load_exam_history(&unified).unwrap();
        assert_eq!(
            entries,
            vec![
                entry("Irène Joliot", "G02"),
                entry("Marie Curie", "G04"),
                entry("Paul Langevin", "G04"),
            ]
        );
    }
}

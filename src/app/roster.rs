// Primitives for reading the attendance workbook.

use std::collections::HashMap;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use tirage::RosterEntry;

use crate::app::*;

pub const LAST_NAME_COLUMN: &str = "NOM";
pub const FIRST_NAME_COLUMN: &str = "PRÉNOM";
pub const WEEK_COLUMN_PREFIX: &str = "SEMAINE";
/// The only cell value that counts as attendance.
pub const PRESENT: &str = "Présent";

/// One student row: the derived identity plus the raw attendance cells, keyed
/// by week column name. The identity is recomputed at every load; there is no
/// persistent identifier.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StudentRecord {
    pub identity: String,
    pub attendance: HashMap<String, String>,
}

/// The worksheet names of the workbook, in file order.
pub fn list_sheets(path: &str) -> AppResult<Vec<String>> {
    let workbook: Xlsx<_> = open_workbook(path).context(OpeningWorkbookSnafu { path })?;
    Ok(workbook.sheet_names().to_vec())
}

/// The presence columns of a sheet, in column order.
pub fn week_columns(path: &str, sheet: &str) -> AppResult<Vec<String>> {
    let wrange = sheet_range(path, sheet)?;
    let header = wrange.rows().next().context(EmptyWorksheetSnafu { sheet })?;
    Ok(week_columns_of_header(header))
}

/// All student rows of a sheet, with their attendance cells.
pub fn load_students(path: &str, sheet: &str) -> AppResult<Vec<StudentRecord>> {
    load_students_checked(path, sheet, &[])
}

/// The identities of a sheet, in row order.
pub fn load_identities(path: &str, sheet: &str) -> AppResult<Vec<String>> {
    let students = load_students(path, sheet)?;
    Ok(students.into_iter().map(|s| s.identity).collect())
}

/// The rows of a sheet with their presence flag resolved against one week
/// column. Fails when the week column is absent from the sheet.
pub fn load_presence_roster(path: &str, sheet: &str, week: &str) -> AppResult<Vec<RosterEntry>> {
    let students = load_students_checked(path, sheet, &[week])?;
    let res: Vec<RosterEntry> = students
        .into_iter()
        .map(|s| RosterEntry {
            present: s.attendance.get(week).map(String::as_str) == Some(PRESENT),
            identity: s.identity,
        })
        .collect();
    debug!(
        "load_presence_roster: sheet {}: {} rows, {} present",
        sheet,
        res.len(),
        res.iter().filter(|r| r.present).count()
    );
    Ok(res)
}

/// One pass over the sheet. The name columns are always required; the
/// attendance map holds every week column plus the extra required ones.
fn load_students_checked(
    path: &str,
    sheet: &str,
    extra_required: &[&str],
) -> AppResult<Vec<StudentRecord>> {
    let wrange = sheet_range(path, sheet)?;
    let header = wrange.rows().next().context(EmptyWorksheetSnafu { sheet })?;
    let mut required: Vec<&str> = vec![LAST_NAME_COLUMN, FIRST_NAME_COLUMN];
    required.extend(extra_required);
    let mapping = column_index_mapping(sheet, &required, header)?;
    let last_idx = mapping[LAST_NAME_COLUMN];
    let first_idx = mapping[FIRST_NAME_COLUMN];

    let mut tracked: Vec<(String, usize)> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| match cell {
            DataType::String(s) if s.starts_with(WEEK_COLUMN_PREFIX) => Some((s.clone(), idx)),
            _ => None,
        })
        .collect();
    for cname in extra_required {
        if !tracked.iter().any(|(name, _)| name == cname) {
            tracked.push((cname.to_string(), mapping[*cname]));
        }
    }

    let mut res: Vec<StudentRecord> = Vec::new();
    let mut iter = wrange.rows();
    iter.next();
    for row in iter {
        debug!("load_students_checked: row: {:?}", row);
        let last = cell_string(row.get(last_idx));
        let first = cell_string(row.get(first_idx));
        // Trailing rows with no name at all are not students.
        if last.is_empty() && first.is_empty() {
            continue;
        }
        let attendance = tracked
            .iter()
            .map(|(name, idx)| (name.clone(), cell_string(row.get(*idx))))
            .collect();
        res.push(StudentRecord {
            identity: identity(&first, &last),
            attendance,
        });
    }
    Ok(res)
}

/// Given the header of a sheet, finds the column index of every required
/// column name. All the missing names are reported together.
pub fn column_index_mapping(
    sheet: &str,
    required: &[&str],
    header: &[DataType],
) -> AppResult<HashMap<String, usize>> {
    let col_names: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| match cell {
            DataType::String(s) => Some((s.clone(), idx)),
            _ => None,
        })
        .collect();
    debug!("column_index_mapping: sheet {}: columns {:?}", sheet, col_names);

    let mut mapping: HashMap<String, usize> = HashMap::new();
    let mut missing: Vec<String> = Vec::new();
    for cname in required {
        match col_names.get(*cname) {
            Some(idx) => {
                mapping.insert(cname.to_string(), *idx);
            }
            None => missing.push(cname.to_string()),
        }
    }
    if !missing.is_empty() {
        return MissingColumnsSnafu {
            sheet,
            columns: missing,
        }
        .fail();
    }
    Ok(mapping)
}

pub fn week_columns_of_header(header: &[DataType]) -> Vec<String> {
    header
        .iter()
        .filter_map(|cell| match cell {
            DataType::String(s) if s.starts_with(WEEK_COLUMN_PREFIX) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn identity(first: &str, last: &str) -> String {
    format!("{} {}", first, last)
}

fn cell_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(s)) => s.trim().to_string(),
        Some(DataType::Int(i)) => i.to_string(),
        Some(DataType::Float(f)) => f.to_string(),
        Some(DataType::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn sheet_range(path: &str, sheet: &str) -> AppResult<calamine::Range<DataType>> {
    debug!("sheet_range: path: {:?} worksheet: {:?}", path, sheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningWorkbookSnafu { path })?;
    workbook
        .worksheet_range(sheet)
        .context(MissingWorksheetSnafu { sheet })?
        .context(OpeningWorkbookSnafu { path })
}

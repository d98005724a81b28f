//! Symptom → fault lookup table loaded from a spreadsheet at startup.
//!
//! The first row is treated as a header and discarded. The first two
//! columns are read positionally as (symptom, fault); header names and
//! extra columns are ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use tracing::{info, warn};

/// One row of the fault table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeRow {
    pub symptom: String,
    pub fault: String,
}

/// Ordered, read-only fault table.
#[derive(Debug, Clone)]
pub struct KnowledgeTable {
    rows: Vec<KnowledgeRow>,
    source: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("table file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported table format '{}' (expected .xlsx, .xls, .ods or .csv)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("failed to read workbook '{}': {source}", path.display())]
    Workbook { path: PathBuf, source: calamine::Error },
    #[error("failed to read csv '{}': {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("workbook '{}' has no worksheets", .0.display())]
    NoWorksheet(PathBuf),
    #[error("table '{}' has {found} column(s), expected at least 2", path.display())]
    TooFewColumns { path: PathBuf, found: usize },
}

/// Table availability, decided once at startup.
#[derive(Debug, Clone)]
pub enum TableState {
    Loaded(KnowledgeTable),
    /// Diagnosis and listing are disabled.
    Absent { reason: String },
}

impl TableState {
    pub fn from_load(result: Result<KnowledgeTable, LoadError>) -> Self {
        match result {
            Ok(table) => Self::Loaded(table),
            Err(e) => Self::Absent { reason: e.to_string() },
        }
    }

    pub fn table(&self) -> Option<&KnowledgeTable> {
        match self {
            Self::Loaded(table) => Some(table),
            Self::Absent { .. } => None,
        }
    }
}

impl KnowledgeTable {
    pub fn new(rows: Vec<KnowledgeRow>) -> Self {
        Self { rows, source: PathBuf::new() }
    }

    /// Load a table, picking the reader by file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let raw_rows = match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path)?,
            "csv" => read_csv(path)?,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };

        let rows = collect_rows(raw_rows);
        info!("Loaded {} fault table rows from {}", rows.len(), path.display());
        Ok(Self { rows, source: path.to_path_buf() })
    }

    pub fn rows(&self) -> &[KnowledgeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl fmt::Display for KnowledgeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.symptom, self.fault)
    }
}

/// Data rows as (symptom, fault) pairs, header already dropped.
fn read_workbook(path: &Path) -> Result<Vec<(String, String)>, LoadError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| LoadError::Workbook { path: path.to_path_buf(), source: e })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::NoWorksheet(path.to_path_buf()))?
        .map_err(|e| LoadError::Workbook { path: path.to_path_buf(), source: e })?;

    let width = range.width();
    if width < 2 {
        return Err(LoadError::TooFewColumns { path: path.to_path_buf(), found: width });
    }

    Ok(range
        .rows()
        .skip(1)
        .map(|row| (cell_text(row.first()), cell_text(row.get(1))))
        .collect())
}

fn cell_text(cell: Option<&Data>) -> String {
    cell.map(|c| c.to_string().trim().to_string()).unwrap_or_default()
}

fn read_csv(path: &Path) -> Result<Vec<(String, String)>, LoadError> {
    let csv_err = |e: csv::Error| LoadError::Csv { path: path.to_path_buf(), source: e };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let width = reader.headers().map_err(csv_err)?.len();
    if width < 2 {
        return Err(LoadError::TooFewColumns { path: path.to_path_buf(), found: width });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let symptom = record.get(0).unwrap_or("").to_string();
        let fault = record.get(1).unwrap_or("").to_string();
        rows.push((symptom, fault));
    }
    Ok(rows)
}

fn collect_rows(raw: Vec<(String, String)>) -> Vec<KnowledgeRow> {
    let mut rows = Vec::with_capacity(raw.len());
    let mut incomplete = 0usize;

    for (symptom, fault) in raw {
        match (symptom.is_empty(), fault.is_empty()) {
            (true, true) => continue,
            (false, false) => rows.push(KnowledgeRow { symptom, fault }),
            _ => incomplete += 1,
        }
    }

    if incomplete > 0 {
        warn!("Skipped {incomplete} fault table row(s) with an empty symptom or fault");
    }
    rows
}

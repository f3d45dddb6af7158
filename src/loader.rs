//! CSV ingestion for tree-label observations.
//!
//! The file must carry the columns `NombreEtiqueta`, `cuadricula`, `lat`,
//! `long`, `Fecha` and `Operador`. Coordinates use a decimal comma, dates are
//! `DD/MM/YYYY` optionally followed by ` HH:MM:SS` and a `,ffffff` fraction.
//!
//! Separators are tried in order and the first one whose header contains every
//! required column, and whose records all have the header's width, wins. Bad
//! coordinates or dates null the field only.

use crate::config::{LoadOptions, MissingCoordinates};
use crate::errors::{preview, LoadError};
use crate::models::{Dataset, Observation};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, warn};

pub const COL_LABEL: &str = "NombreEtiqueta";
pub const COL_GRID: &str = "cuadricula";
pub const COL_LAT: &str = "lat";
pub const COL_LONG: &str = "long";
pub const COL_DATE: &str = "Fecha";
pub const COL_OPERATOR: &str = "Operador";

pub const REQUIRED_COLUMNS: [&str; 6] = [COL_LABEL, COL_GRID, COL_LAT, COL_LONG, COL_DATE, COL_OPERATOR];

const DATE_FORMAT: &str = "%d/%m/%Y";
const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const DATE_KEY_FORMAT: &str = "%d/%m";

/// Read and parse the file at `path`.
pub async fn load(path: &Path, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let bytes = fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = parse(&bytes, options)?;
    info!(path = %path.display(), rows = dataset.len(), "loaded tree observations");
    Ok(dataset)
}

/// Parse raw CSV bytes, trying each candidate separator in turn.
pub fn parse(bytes: &[u8], options: &LoadOptions) -> Result<Dataset, LoadError> {
    let candidates = options.separator.candidates();

    for &separator in &candidates {
        let rows = match parse_with_separator(bytes, separator) {
            Ok(rows) => rows,
            Err(rejection) => {
                debug!(separator = ?char::from(separator), %rejection, "separator rejected");
                continue;
            }
        };

        let total = rows.len();
        let rows: Vec<Observation> = match options.missing_coordinates {
            MissingCoordinates::Drop => rows.into_iter().filter(|row| row.coordinates().is_some()).collect(),
            MissingCoordinates::Keep => rows,
        };
        if rows.len() < total {
            warn!(dropped = total - rows.len(), "dropped rows without coordinates");
        }
        if rows.is_empty() {
            return Err(LoadError::Empty { preview: preview(bytes) });
        }

        debug!(separator = ?char::from(separator), rows = rows.len(), "separator accepted");
        return Ok(Dataset::new(rows));
    }

    Err(LoadError::NoUsableSeparator {
        tried: candidates
            .iter()
            .map(|sep| format!("{:?}", char::from(*sep)))
            .collect::<Vec<_>>()
            .join(", "),
        required: REQUIRED_COLUMNS.join(", "),
        preview: preview(bytes),
    })
}

#[derive(Debug)]
enum Rejection {
    MissingColumns(Vec<&'static str>),
    Ragged { line: u64, expected: usize, found: usize },
    Malformed(csv::Error),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingColumns(missing) => write!(f, "missing columns: {}", missing.join(", ")),
            Rejection::Ragged { line, expected, found } => {
                write!(f, "line {line} has {found} fields, header has {expected}")
            }
            Rejection::Malformed(err) => write!(f, "malformed csv: {err}"),
        }
    }
}

struct ColumnIndex {
    label: usize,
    grid: usize,
    lat: usize,
    long: usize,
    date: usize,
    operator: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, Rejection> {
        let names: Vec<&str> = headers
            .iter()
            .map(|name| name.trim_start_matches('\u{feff}').trim())
            .collect();
        let position = |column: &str| names.iter().position(|name| *name == column);

        let missing: Vec<&'static str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| position(*column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Rejection::MissingColumns(missing));
        }

        let index = |column: &str| position(column).unwrap_or_default();
        Ok(Self {
            label: index(COL_LABEL),
            grid: index(COL_GRID),
            lat: index(COL_LAT),
            long: index(COL_LONG),
            date: index(COL_DATE),
            operator: index(COL_OPERATOR),
        })
    }
}

fn parse_with_separator(bytes: &[u8], separator: u8) -> Result<Vec<Observation>, Rejection> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(Rejection::Malformed)?;
    let width = headers.len();
    let columns = ColumnIndex::from_headers(headers)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(Rejection::Malformed)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != width {
            return Err(Rejection::Ragged {
                line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }
        rows.push(observation_from_record(&record, &columns));
    }
    Ok(rows)
}

fn observation_from_record(record: &StringRecord, columns: &ColumnIndex) -> Observation {
    let field = |index: usize| record.get(index).unwrap_or("").to_string();

    let label_name = field(columns.label);
    let labels = split_labels(&label_name);
    let date = parse_date(&field(columns.date));

    Observation {
        label_count: labels.len(),
        labels,
        grid_cell: field(columns.grid),
        latitude: parse_decimal_comma(&field(columns.lat)),
        longitude: parse_decimal_comma(&field(columns.long)),
        date_key: date.map(|value| value.format(DATE_KEY_FORMAT).to_string()),
        date,
        operator: field(columns.operator),
        label_name,
    }
}

/// `"40,4168"` -> `Some(40.4168)`. Anything that is not a finite number is `None`.
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parses `DD/MM/YYYY`, `DD/MM/YYYY HH:MM:SS` or `DD/MM/YYYY HH:MM:SS,ffffff`.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Some((main, fraction)) = raw.split_once(',') {
        if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let nanos: u32 = format!("{fraction:0<9}").parse().ok()?;
        return NaiveDateTime::parse_from_str(main, DATE_TIME_FORMAT)
            .ok()?
            .with_nanosecond(nanos);
    }

    if let Ok(value) = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT) {
        return Some(value);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Every `,`-separated part, trimmed. Empty parts are kept and counted.
pub fn split_labels(label_name: &str) -> Vec<String> {
    label_name.split(',').map(|label| label.trim().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    options: LoadOptions,
}

struct CacheEntry {
    fingerprint: Fingerprint,
    dataset: Arc<Dataset>,
}

/// Process-wide cache of loaded datasets, keyed by path and invalidated when
/// the file's modification time or length changes.
#[derive(Default)]
pub struct DatasetCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(&self, path: &Path, options: &LoadOptions) -> Result<Arc<Dataset>, LoadError> {
        let metadata = fs::metadata(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fingerprint = Fingerprint {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            options: *options,
        };

        if let Some(entry) = self.entries.read().await.get(path) {
            if entry.fingerprint == fingerprint {
                debug!(path = %path.display(), "dataset cache hit");
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        // concurrent misses wait here and reuse the first load
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(path) {
            if entry.fingerprint == fingerprint {
                debug!(path = %path.display(), "dataset cache filled while waiting");
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        let dataset = Arc::new(load(path, options).await?);
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                fingerprint,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }
}

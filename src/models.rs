use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One tree-label observation as loaded from the CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub label_name: String,
    pub grid_cell: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: Option<NaiveDateTime>,
    pub operator: String,
    pub labels: Vec<String>,
    pub label_count: usize,
    /// `DD/MM`, shared by the same day of different years.
    pub date_key: Option<String>,
}

impl Observation {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Loaded rows in file order. Never mutated after load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Observation>,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct grid cells in first-appearance order.
    pub fn grid_cells(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut cells = Vec::new();
        for row in &self.rows {
            if seen.insert(row.grid_cell.as_str()) {
                cells.push(row.grid_cell.clone());
            }
        }
        cells
    }
}

/// Per-session filter state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub grid_cells: BTreeSet<String>,
    pub date_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartStyle {
    pub colors: Vec<String>,
    pub height: u32,
    pub show_values: bool,
    pub show_markers: bool,
    pub marker_size: u32,
    pub show_legend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub points: Vec<ChartPoint>,
    /// Keys currently selected on this chart, for highlighting.
    pub selected: Vec<String>,
    pub style: ChartStyle,
}

impl ChartSpec {
    pub fn total(&self) -> usize {
        self.points.iter().map(|point| point.y).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lon: f64,
    pub tooltip: String,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub radius: u32,
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSpec {
    pub center: [f64; 2],
    pub zoom: u8,
    pub tiles: Option<String>,
    pub attribution: Option<String>,
    pub markers: Vec<MapMarker>,
    pub marker_style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub label_name: String,
    pub grid_cell: String,
    pub date: Option<String>,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub trees: usize,
    pub labels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub metrics: Metrics,
    pub map: MapSpec,
    pub grid_chart: ChartSpec,
    pub date_chart: ChartSpec,
    pub table: Vec<TableRow>,
    /// Options for the grid multi-select, taken from the unfiltered data.
    pub grid_options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub session: String,
    pub selection: FilterSelection,
    pub error: Option<String>,
    pub view: Option<DashboardView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickPoint {
    pub x: String,
}

/// Payloads posted by the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionRequest {
    ClickGridBar { points: Vec<ClickPoint> },
    ClickDatePoint { points: Vec<ClickPoint> },
    SelectGridCells { cells: Vec<String> },
    Reset,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

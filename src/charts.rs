use crate::models::{
    ChartKind, ChartPoint, ChartSpec, ChartStyle, Dataset, FilterSelection, MapMarker, MapSpec, MarkerStyle,
};
use chrono::NaiveDateTime;
use std::collections::HashMap;

pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];
pub const LINE_COLOR: &str = "#2ca02c";
pub const CHART_HEIGHT: u32 = 400;

pub const SATELLITE_TILES: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";
pub const SATELLITE_ATTRIBUTION: &str = "Esri";
pub const DEFAULT_CENTER: [f64; 2] = [0.0, 0.0];
pub const DEFAULT_ZOOM: u8 = 2;
pub const DATA_ZOOM: u8 = 14;

const Y_TITLE: &str = "Trees";

/// Rows per grid cell, largest first; equal counts keep first-appearance order.
pub fn grid_counts(dataset: &Dataset) -> Vec<ChartPoint> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut points: Vec<ChartPoint> = Vec::new();

    for row in &dataset.rows {
        match index.get(row.grid_cell.as_str()) {
            Some(&position) => points[position].y += 1,
            None => {
                index.insert(row.grid_cell.as_str(), points.len());
                points.push(ChartPoint {
                    x: row.grid_cell.clone(),
                    y: 1,
                });
            }
        }
    }

    points.sort_by(|a, b| b.y.cmp(&a.y));
    points
}

/// Rows per `DD/MM` key. Buckets are ordered by the earliest full date that
/// falls in them; rows without a date are not counted.
pub fn date_counts(dataset: &Dataset) -> Vec<ChartPoint> {
    let mut buckets: HashMap<&str, (NaiveDateTime, usize)> = HashMap::new();

    for row in &dataset.rows {
        let (Some(key), Some(date)) = (row.date_key.as_deref(), row.date) else {
            continue;
        };
        let bucket = buckets.entry(key).or_insert((date, 0));
        bucket.0 = bucket.0.min(date);
        bucket.1 += 1;
    }

    let mut ordered: Vec<(&str, NaiveDateTime, usize)> =
        buckets.into_iter().map(|(key, (first, count))| (key, first, count)).collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    ordered
        .into_iter()
        .map(|(key, _, count)| ChartPoint {
            x: key.to_string(),
            y: count,
        })
        .collect()
}

pub fn grid_chart(dataset: &Dataset, selection: &FilterSelection) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Bar,
        title: "Trees per grid cell".to_string(),
        x_title: String::new(),
        y_title: Y_TITLE.to_string(),
        points: grid_counts(dataset),
        selected: selection.grid_cells.iter().cloned().collect(),
        style: ChartStyle {
            colors: PALETTE.iter().map(|color| color.to_string()).collect(),
            height: CHART_HEIGHT,
            show_values: true,
            show_markers: false,
            marker_size: 0,
            show_legend: false,
        },
    }
}

pub fn date_chart(dataset: &Dataset, selection: &FilterSelection) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Line,
        title: "Trees labelled per day".to_string(),
        x_title: "Date (day/month)".to_string(),
        y_title: Y_TITLE.to_string(),
        points: date_counts(dataset),
        selected: selection.date_key.iter().cloned().collect(),
        style: ChartStyle {
            colors: vec![LINE_COLOR.to_string()],
            height: CHART_HEIGHT,
            show_values: true,
            show_markers: true,
            marker_size: 8,
            show_legend: false,
        },
    }
}

pub fn map_spec(dataset: &Dataset) -> MapSpec {
    let markers: Vec<MapMarker> = dataset
        .rows
        .iter()
        .filter_map(|row| {
            let (lat, lon) = row.coordinates()?;
            let date = row
                .date
                .map(|date| date.format("%d/%m/%Y").to_string())
                .unwrap_or_default();
            Some(MapMarker {
                lat,
                lon,
                tooltip: row.label_name.clone(),
                popup: format!("Label: {}\nGrid cell: {}\nDate: {}", row.label_name, row.grid_cell, date),
            })
        })
        .collect();

    let marker_style = MarkerStyle {
        radius: 6,
        color: "black".to_string(),
        fill_color: "green".to_string(),
        fill_opacity: 0.7,
    };

    if markers.is_empty() {
        return MapSpec {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            tiles: None,
            attribution: None,
            markers,
            marker_style,
        };
    }

    let count = markers.len() as f64;
    let lat = markers.iter().map(|marker| marker.lat).sum::<f64>() / count;
    let lon = markers.iter().map(|marker| marker.lon).sum::<f64>() / count;

    MapSpec {
        center: [lat, lon],
        zoom: DATA_ZOOM,
        tiles: Some(SATELLITE_TILES.to_string()),
        attribution: Some(SATELLITE_ATTRIBUTION.to_string()),
        markers,
        marker_style,
    }
}

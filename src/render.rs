use crate::charts::{date_chart, grid_chart, map_spec};
use crate::filter::apply_selection;
use crate::models::{Dataset, DashboardView, FilterSelection, Metrics, TableRow};

/// Recompute everything the page shows for one selection.
pub fn render(dataset: &Dataset, selection: &FilterSelection) -> DashboardView {
    let filtered = apply_selection(dataset, selection);

    DashboardView {
        metrics: Metrics {
            trees: filtered.len(),
            labels: filtered.rows.iter().map(|row| row.label_count).sum(),
        },
        map: map_spec(&filtered),
        grid_chart: grid_chart(&filtered, selection),
        date_chart: date_chart(&filtered, selection),
        table: table_rows(&filtered),
        grid_options: dataset.grid_cells(),
    }
}

fn table_rows(dataset: &Dataset) -> Vec<TableRow> {
    dataset
        .rows
        .iter()
        .map(|row| TableRow {
            label_name: row.label_name.clone(),
            grid_cell: row.grid_cell.clone(),
            date: row.date.map(|date| {
                if date.time() == chrono::NaiveTime::MIN {
                    date.format("%d/%m/%Y").to_string()
                } else {
                    date.format("%d/%m/%Y %H:%M:%S").to_string()
                }
            }),
            operator: row.operator.clone(),
        })
        .collect()
}

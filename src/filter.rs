use crate::models::{Dataset, FilterSelection};
use std::collections::BTreeSet;

/// Rows matching both filters, in their original order. An empty grid set
/// and a missing date key each mean "no filter".
pub fn apply(dataset: &Dataset, grid_cells: &BTreeSet<String>, date_key: Option<&str>) -> Dataset {
    let rows = dataset
        .rows
        .iter()
        .filter(|row| grid_cells.is_empty() || grid_cells.contains(&row.grid_cell))
        .filter(|row| match date_key {
            Some(key) => row.date_key.as_deref() == Some(key),
            None => true,
        })
        .cloned()
        .collect();
    Dataset::new(rows)
}

pub fn apply_selection(dataset: &Dataset, selection: &FilterSelection) -> Dataset {
    apply(dataset, &selection.grid_cells, selection.date_key.as_deref())
}

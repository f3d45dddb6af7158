use crate::config::GridSelectionMode;
use crate::models::{FilterSelection, InteractionRequest};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Bars under the click, in the order the chart reported them.
    ClickGridBar(Vec<String>),
    ClickDatePoint(String),
    SelectGridCells(BTreeSet<String>),
    Reset,
}

impl Interaction {
    /// `None` for click payloads without any point, which change nothing.
    pub fn from_request(request: InteractionRequest) -> Option<Self> {
        let interaction = match request {
            InteractionRequest::ClickGridBar { points } => {
                if points.is_empty() {
                    return None;
                }
                Interaction::ClickGridBar(points.into_iter().map(|point| point.x).collect())
            }
            InteractionRequest::ClickDatePoint { points } => {
                Interaction::ClickDatePoint(points.into_iter().next()?.x)
            }
            InteractionRequest::SelectGridCells { cells } => Interaction::SelectGridCells(cells.into_iter().collect()),
            InteractionRequest::Reset => Interaction::Reset,
        };
        Some(interaction)
    }
}

impl FilterSelection {
    pub fn apply(&mut self, interaction: Interaction, mode: GridSelectionMode) {
        match interaction {
            Interaction::ClickGridBar(values) => match mode {
                GridSelectionMode::Replace => {
                    if let Some(first) = values.into_iter().next() {
                        self.grid_cells = BTreeSet::from([first]);
                    }
                }
                GridSelectionMode::Accumulate => self.grid_cells.extend(values),
            },
            Interaction::ClickDatePoint(value) => self.date_key = Some(value),
            Interaction::SelectGridCells(cells) => self.grid_cells = cells,
            Interaction::Reset => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        self.grid_cells.clear();
        self.date_key = None;
    }

    pub fn is_empty(&self) -> bool {
        self.grid_cells.is_empty() && self.date_key.is_none()
    }
}

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::detector::Comparison;
use crate::document::UnitKind;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn value_cell(value: f64, unit: &str) -> Cell {
    Cell::new(format!("{value} {unit}"))
}

/// Relative change, red when it crossed the threshold in the adverse
/// direction, yellow when adverse but tolerated, green otherwise.
pub fn color_coded_change_cell(comparison: &Comparison) -> Cell {
    let Some(baseline) = comparison.baseline else {
        return Cell::new("n/a").fg(TableColor::DarkGrey);
    };

    let text = format!("{:+.1}%", baseline.delta * 100.0);
    let adverse = match comparison.kind {
        UnitKind::Rate => baseline.delta < 0.0,
        UnitKind::Duration => baseline.delta > 0.0,
    };

    if comparison.regressed {
        Cell::new(text).fg(TableColor::Red)
    } else if adverse {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Green)
    }
}

pub fn status_cell(comparison: &Comparison) -> Cell {
    match (comparison.baseline, comparison.regressed) {
        (_, true) => Cell::new("regression").fg(TableColor::Red),
        (Some(_), false) => Cell::new("ok").fg(TableColor::Green),
        (None, false) => Cell::new("new").fg(TableColor::DarkGrey),
    }
}

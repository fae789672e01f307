use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::pipeline::RunOutput;
use crate::report::{history_table, roster_table, selection_table};

pub struct ExportReport {
    pub roster_rows: usize,
    pub selection_rows: usize,
    pub history_rows: usize,
}

/// Writes the roster, the selection trace and the player history as sheets.
pub fn export_workbook(path: &Path, output: &RunOutput) -> Result<ExportReport> {
    let roster_rows = roster_table(&output.roster);
    let selection_rows = selection_table(output);
    let history_rows = history_table(output);

    let mut workbook = Workbook::new();
    for (name, rows) in [
        ("Roster", &roster_rows),
        ("Selection", &selection_rows),
        ("History", &history_rows),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_rows(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    tracing::info!(path = %path.display(), "workbook written");
    Ok(ExportReport {
        roster_rows: roster_rows.len().saturating_sub(1),
        selection_rows: selection_rows.len().saturating_sub(1),
        history_rows: history_rows.len().saturating_sub(1),
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

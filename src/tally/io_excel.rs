// Reads workbooks (xlsx, xls, ods, ...) through calamine.

use calamine::{open_workbook_auto, DataType, Reader};

use form_reconcile::{Cell, UploadedSheet};

use crate::tally::io_common::{blank_cell, simplify_file_name, text_cell, DecodeOptions};
use crate::tally::*;

pub fn read_workbook(path: &str, opts: &DecodeOptions) -> TallyResult<UploadedSheet> {
    let mut workbook = open_workbook_auto(path).context(OpeningSpreadsheetSnafu { path })?;

    // A worksheet name was provided, use it. Otherwise, the exports have the
    // responses in the first worksheet.
    let worksheet_name = match opts.worksheet_name.clone() {
        Some(name) => name,
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .context(EmptySpreadsheetSnafu { path })?,
    };
    debug!(
        "read_workbook: path: {:?} worksheet: {:?}",
        path, &worksheet_name
    );
    let wrange = workbook
        .worksheet_range(&worksheet_name)
        .context(MissingWorksheetSnafu {
            path,
            worksheet: worksheet_name.clone(),
        })?
        .context(OpeningSpreadsheetSnafu { path })?;

    let rows: Vec<Vec<Cell>> = wrange
        .rows()
        .map(|row| row.iter().map(|c| read_cell(c, opts)).collect())
        .collect();

    Ok(UploadedSheet {
        filename: simplify_file_name(path),
        sheet_title: Some(worksheet_name),
        rows,
    })
}

fn read_cell(cell: &DataType, opts: &DecodeOptions) -> Cell {
    match cell {
        DataType::Empty => blank_cell(opts),
        DataType::String(s) => text_cell(s, opts),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Float(f) | DataType::DateTime(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Bool(*b),
        // Error cells still hold an answer slot that was filled in.
        other => Cell::Text(format!("{:?}", other)),
    }
}

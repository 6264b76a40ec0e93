// Primitives shared by the spreadsheet readers.

use std::path::Path;

use form_reconcile::{Cell, UploadedSheet};

use crate::tally::*;

/// The file formats the readers understand.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    /// Decided from the extension of each file.
    Auto,
    /// Any workbook format: xlsx, xlsm, xlsb, xls, ods.
    Excel,
    /// Delimited text.
    Csv,
}

impl InputType {
    pub fn parse(s: &str) -> TallyResult<InputType> {
        match s {
            "auto" => Ok(InputType::Auto),
            "xlsx" | "excel" => Ok(InputType::Excel),
            "csv" => Ok(InputType::Csv),
            x => UnknownInputTypeSnafu { input_type: x }.fail(),
        }
    }

    /// The concrete type to use for the given file.
    pub fn resolve(self, path: &str) -> InputType {
        match self {
            InputType::Auto => {
                let ext = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase());
                match ext.as_deref() {
                    Some("csv") | Some("tsv") | Some("txt") => InputType::Csv,
                    _ => InputType::Excel,
                }
            }
            x => x,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DecodeOptions {
    pub input_type: InputType,
    pub worksheet_name: Option<String>,
    /// The value given to blank cells. Leave it empty so that blank rows can be detected.
    pub blank_cell_value: String,
    pub csv_delimiter: u8,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            input_type: InputType::Auto,
            worksheet_name: None,
            blank_cell_value: String::new(),
            csv_delimiter: b',',
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn blank_cell(opts: &DecodeOptions) -> Cell {
    if opts.blank_cell_value.is_empty() {
        Cell::Blank
    } else {
        Cell::Text(opts.blank_cell_value.clone())
    }
}

pub fn text_cell(s: &str, opts: &DecodeOptions) -> Cell {
    if s.is_empty() {
        blank_cell(opts)
    } else {
        Cell::Text(s.to_string())
    }
}

/// Decodes one file into a sheet, with the reader matching its type.
pub fn decode_file(path: &str, opts: &DecodeOptions) -> TallyResult<UploadedSheet> {
    let input_type = opts.input_type.resolve(path);
    info!("Attempting to read {:?} as {:?}", path, input_type);
    let sheet = match input_type {
        InputType::Csv => io_csv::read_delimited(path, opts)?,
        _ => io_excel::read_workbook(path, opts)?,
    };
    debug!(
        "decode_file: {:?}: {} rows, sheet title {:?}",
        path,
        sheet.rows.len(),
        sheet.sheet_title
    );
    Ok(sheet)
}

use crate::tally::io_common::InputType;
use crate::tally::*;

use form_reconcile::{ReconcileOptions, TieBreak};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(rename = "catalogPath")]
    pub catalog_path: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "blankCellValue")]
    pub blank_cell_value: Option<String>,
    #[serde(rename = "csvDelimiter")]
    pub csv_delimiter: Option<String>,
    #[serde(rename = "tieBreak")]
    pub tie_break: Option<String>,
    #[serde(rename = "reverseContains")]
    pub reverse_contains: Option<bool>,
    #[serde(rename = "maxWriteRetries")]
    pub max_write_retries: Option<u32>,
}

impl TallyConfig {
    pub fn tie_break(&self) -> TallyResult<TieBreak> {
        match self.tie_break.as_deref() {
            None | Some("catalogOrder") => Ok(TieBreak::CatalogOrder),
            Some("mostRecent") => Ok(TieBreak::MostRecent),
            Some(x) => whatever!("unknown tie break mode: {:?}", x),
        }
    }

    pub fn reconcile_options(&self) -> TallyResult<ReconcileOptions> {
        let defaults = ReconcileOptions::DEFAULT_OPTIONS;
        Ok(ReconcileOptions {
            tie_break: self.tie_break()?,
            reverse_contains: self.reverse_contains.unwrap_or(defaults.reverse_contains),
            max_write_retries: self.max_write_retries.unwrap_or(defaults.max_write_retries),
        })
    }

    pub fn input_type(&self) -> TallyResult<InputType> {
        match self.input_type.as_deref() {
            None => Ok(InputType::Auto),
            Some(s) => InputType::parse(s),
        }
    }

    /// The delimiter of delimited-text inputs. `\t` is accepted for tabs.
    pub fn csv_delimiter(&self) -> TallyResult<u8> {
        match self.csv_delimiter.as_deref() {
            None => Ok(b','),
            Some("\\t") => Ok(b'\t'),
            Some(s) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(s) => whatever!("the CSV delimiter must be a single ASCII character, got {:?}", s),
        }
    }
}

pub fn read_config(path: &str) -> TallyResult<TallyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: TallyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

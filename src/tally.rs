use log::{debug, info, warn};

use form_reconcile::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::{diff, Difference};

use crate::args::Args;
use crate::tally::config_reader::*;
use crate::tally::io_common::{decode_file, DecodeOptions};
use crate::tally::store_json::JsonCatalog;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod store_json;

/// Used when neither the command line nor the configuration name a catalog.
pub const DEFAULT_CATALOG_PATH: &str = "forms.json";

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningSpreadsheet {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("Spreadsheet {path} has no worksheet"))]
    EmptySpreadsheet { path: String },
    #[snafu(display("Spreadsheet {path} has no worksheet named {worksheet}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("Error opening delimited file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Unknown input type {input_type:?} (expected auto, xlsx or csv)"))]
    UnknownInputType { input_type: String },
    #[snafu(display("Error reading {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the report"))]
    SerializingReport { source: serde_json::Error },
    #[snafu(display("No files provided"))]
    NoInputFiles {},
    #[snafu(display("Error reading the catalog of forms"))]
    ListingCatalog { source: CatalogError },
    #[snafu(display("The upload failed"))]
    Batch { source: BatchError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

/// Everything needed to run an upload, once the configuration file and the
/// command line have been merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub catalog_path: PathBuf,
    pub decode: DecodeOptions,
    pub options: ReconcileOptions,
}

pub fn resolve_settings(args: &Args) -> TallyResult<Settings> {
    let (config, config_dir) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let dir = Path::new(p).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (TallyConfig::default(), None),
    };

    let catalog_path = match (&args.catalog, &config.catalog_path, &config_dir) {
        (Some(p), _, _) => PathBuf::from(p),
        (None, Some(p), Some(dir)) => dir.join(p),
        (None, Some(p), None) => PathBuf::from(p),
        (None, None, _) => PathBuf::from(DEFAULT_CATALOG_PATH),
    };

    let input_type = match &args.input_type {
        Some(s) => io_common::InputType::parse(s)?,
        None => config.input_type()?,
    };

    let decode = DecodeOptions {
        input_type,
        worksheet_name: args
            .worksheet_name
            .clone()
            .or_else(|| config.worksheet_name.clone()),
        blank_cell_value: config.blank_cell_value.clone().unwrap_or_default(),
        csv_delimiter: config.csv_delimiter()?,
    };

    let settings = Settings {
        catalog_path,
        decode,
        options: config.reconcile_options()?,
    };
    debug!("resolve_settings: {:?}", settings);
    Ok(settings)
}

// A file of the upload, after the decoding step.
enum Decoded {
    Sheet(UploadedSheet),
    Failed(RejectedSheet),
}

fn decode_all(paths: &[String], opts: &DecodeOptions) -> Vec<Decoded> {
    paths
        .iter()
        .map(|p| match decode_file(p, opts) {
            Ok(sheet) => Decoded::Sheet(sheet),
            Err(e) => {
                warn!("Could not read {:?}: {}", p, e);
                Decoded::Failed(RejectedSheet {
                    filename: io_common::simplify_file_name(p),
                    reason: RejectReason::Unreadable(error_chain(&e)),
                })
            }
        })
        .collect()
}

// Puts the decoding failures back in their place among the outcomes of the
// sheets that were reconciled.
fn merge_outcomes(decoded: Vec<Decoded>, reconciled: Vec<SheetOutcome>) -> Vec<SheetOutcome> {
    let mut reconciled = reconciled.into_iter();
    decoded
        .into_iter()
        .filter_map(|d| match d {
            Decoded::Sheet(_) => reconciled.next(),
            Decoded::Failed(r) => Some(SheetOutcome::Rejected(r)),
        })
        .collect()
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

fn outcome_to_json(outcome: &SheetOutcome) -> JSValue {
    match outcome {
        SheetOutcome::Accepted { filename, intent } => json!({
            "filename": filename,
            "slug": intent.slug,
            "matchedDisplayName": intent.display_name,
            "submissionCount": intent.new_count,
            "previousCount": intent.previous_count,
            "isNewForm": intent.is_new_form,
            "matchTier": intent.tier.to_string(),
        }),
        SheetOutcome::Rejected(r) => json!({
            "filename": r.filename,
            "reason": r.reason.to_string(),
        }),
    }
}

pub fn build_report_js(outcomes: &[SheetOutcome], dry_run: bool) -> JSValue {
    let results: Vec<JSValue> = outcomes.iter().map(outcome_to_json).collect();
    json!({
        "dryRun": dry_run,
        "results": results,
    })
}

// One line per form, so that the catalog changes read well as a diff.
fn catalog_lines(forms: &[FormRecord]) -> String {
    forms
        .iter()
        .map(|f| format!("{}\t{}\t{}", f.slug, f.display_name, f.submission_count))
        .collect::<Vec<String>>()
        .join("\n")
}

/// A line diff of two states of the catalog: ` ` for unchanged forms, `-` and
/// `+` for the old and new lines of changed or created forms.
pub fn catalog_diff(before: &[FormRecord], after: &[FormRecord]) -> String {
    let (_, changes) = diff(&catalog_lines(before), &catalog_lines(after), "\n");
    let mut out = String::new();
    for change in changes {
        let (prefix, text) = match &change {
            Difference::Same(t) => (' ', t),
            Difference::Rem(t) => ('-', t),
            Difference::Add(t) => ('+', t),
        };
        for line in text.split('\n').filter(|l| !l.is_empty()) {
            out.push(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn write_output(js: &JSValue, out: Option<&str>) -> TallyResult<()> {
    let pretty = serde_json::to_string_pretty(js).context(SerializingReportSnafu {})?;
    match out {
        None | Some("stdout") | Some("") => {
            println!("{}", pretty);
        }
        Some(path) => {
            fs::write(path, pretty).context(WritingOutputSnafu { path })?;
            info!("Report written to {:?}", path);
        }
    }
    Ok(())
}

fn log_outcomes(outcomes: &[SheetOutcome]) {
    for o in outcomes {
        match o {
            SheetOutcome::Accepted { filename, intent } => info!(
                "{} -> {} ({}) [{}]: {} submissions{}",
                filename,
                intent.display_name,
                intent.slug,
                intent.tier,
                intent.new_count,
                if intent.is_new_form { ", new form" } else { "" }
            ),
            SheetOutcome::Rejected(r) => warn!("{} rejected: {}", r.filename, r.reason),
        }
    }
}

/// Prints the forms of the catalog, the most recent first.
pub fn list_forms(catalog: &JsonCatalog, out: Option<&str>) -> TallyResult<()> {
    let mut forms = catalog.load().context(ListingCatalogSnafu {})?.forms;
    forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let js = serde_json::to_value(&forms).context(SerializingReportSnafu {})?;
    write_output(&json!({ "forms": js }), out)
}

/// Runs one upload of spreadsheets against the catalog.
///
/// Files that cannot be read or that contain no submission are reported and
/// do not stop the others. Only problems with the catalog itself (or with the
/// request) are returned as errors.
pub fn run_upload(
    inputs: &[String],
    settings: &Settings,
    dry_run: bool,
) -> TallyResult<Vec<SheetOutcome>> {
    ensure!(!inputs.is_empty(), NoInputFilesSnafu {});
    let decoded = decode_all(inputs, &settings.decode);
    let sheets: Vec<UploadedSheet> = decoded
        .iter()
        .filter_map(|d| match d {
            Decoded::Sheet(s) => Some(s.clone()),
            Decoded::Failed(_) => None,
        })
        .collect();

    let mut catalog = JsonCatalog::new(&settings.catalog_path);
    let reconciled: Vec<SheetOutcome> = if sheets.is_empty() {
        warn!("None of the {} files could be read", inputs.len());
        Vec::new()
    } else if dry_run {
        let snapshot = catalog.list_all().context(ListingCatalogSnafu {})?;
        let plan = reconcile_batch(&sheets, &snapshot, &settings.options);
        let preview = plan.preview(&snapshot);
        // The report owns the standard output.
        eprintln!("Changes to {}:", catalog.path().display());
        eprint!("{}", catalog_diff(&snapshot, &preview));
        plan.outcomes
    } else {
        let report =
            run_batch(&mut catalog, &sheets, &settings.options).context(BatchSnafu {})?;
        info!(
            "Upload done: {} forms written after {} attempt(s)",
            report.rows_written, report.attempts
        );
        report.outcomes
    };

    let outcomes = merge_outcomes(decoded, reconciled);
    log_outcomes(&outcomes);
    Ok(outcomes)
}

pub fn run(args: &Args) -> TallyResult<()> {
    let settings = resolve_settings(args)?;
    if args.list {
        let catalog = JsonCatalog::new(&settings.catalog_path);
        return list_forms(&catalog, args.out.as_deref());
    }
    let outcomes = run_upload(&args.input, &settings, args.dry_run)?;
    let js = build_report_js(&outcomes, args.dry_run);
    write_output(&js, args.out.as_deref())
}

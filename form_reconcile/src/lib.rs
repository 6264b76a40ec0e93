mod config;
use log::{debug, info, warn};
use snafu::prelude::*;

use std::collections::HashSet;

pub mod catalog;
pub mod manual;
pub mod matcher;
pub mod normalize;
pub mod rows;
pub mod slug;

pub use crate::catalog::{Catalog, CatalogError, CatalogWrite, MemoryCatalog};
pub use crate::config::*;

use crate::matcher::match_form_with;
use crate::normalize::derive_identity;
use crate::rows::{count_submissions, data_rows};
use crate::slug::generate_slug;

/// Errors that stop a whole upload.
///
/// Problems with individual files are not errors: they are reported as
/// `SheetOutcome::Rejected` and the rest of the upload goes on.
#[derive(Debug, Snafu)]
pub enum BatchError {
    #[snafu(display("no files were provided"))]
    NoFiles {},
    #[snafu(display("could not read the form catalog"))]
    CatalogRead { source: CatalogError },
    /// Every sheet may have been reconciled correctly, but none of the
    /// decisions reached the catalog.
    #[snafu(display("could not write {rows} forms to the catalog after {attempts} attempt(s)"))]
    CatalogWrite {
        source: CatalogError,
        rows: usize,
        attempts: u32,
    },
}

// **** Batch-local catalog view ****

// The catalog as seen by the sheets of one upload. Later sheets see the forms
// created or updated by earlier sheets, before anything is written.
struct BatchView {
    records: Vec<FormRecord>,
    slugs: HashSet<String>,
    tie_break: TieBreak,
}

impl BatchView {
    fn new(snapshot: &[FormRecord], tie_break: TieBreak) -> BatchView {
        let mut records = snapshot.to_vec();
        if tie_break == TieBreak::MostRecent {
            // Stable: forms without a creation date keep their relative order, last.
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let slugs = records.iter().map(|f| f.slug.clone()).collect();
        BatchView {
            records,
            slugs,
            tie_break,
        }
    }

    fn get(&self, slug: &str) -> Option<&FormRecord> {
        self.records.iter().find(|f| f.slug == slug)
    }

    fn record(&mut self, intent: &ReconciliationIntent) {
        if intent.is_new_form {
            let form = FormRecord::new(&intent.slug, &intent.display_name, intent.new_count);
            self.slugs.insert(intent.slug.clone());
            match self.tie_break {
                TieBreak::CatalogOrder => self.records.push(form),
                TieBreak::MostRecent => self.records.insert(0, form),
            }
        } else if let Some(form) = self.records.iter_mut().find(|f| f.slug == intent.slug) {
            form.submission_count = intent.new_count;
        }
    }
}

fn reconcile_in_view(
    sheet: &UploadedSheet,
    view: &mut BatchView,
    options: &ReconcileOptions,
) -> SheetOutcome {
    let count = count_submissions(data_rows(&sheet.rows));
    if count == 0 {
        info!(
            "{}: no valid submissions in {} rows",
            sheet.filename,
            sheet.rows.len()
        );
        return SheetOutcome::Rejected(RejectedSheet {
            filename: sheet.filename.clone(),
            reason: RejectReason::NoValidSubmissions,
        });
    }

    let identity = derive_identity(&sheet.filename, sheet.sheet_title.as_deref());
    let m = match_form_with(&identity, &view.records, options.reverse_contains);
    debug!("{}: identity {:?} count {}", sheet.filename, identity, count);

    let intent = match m.matched_slug.as_deref().and_then(|s| view.get(s)) {
        Some(existing) => ReconciliationIntent {
            slug: existing.slug.clone(),
            display_name: existing.display_name.clone(),
            identity: identity.clone(),
            new_count: count,
            is_new_form: false,
            previous_count: Some(existing.submission_count),
            tier: m.tier,
        },
        None => {
            let slug = generate_slug(&identity, &view.slugs);
            ReconciliationIntent {
                slug,
                display_name: identity.clone(),
                identity: identity.clone(),
                new_count: count,
                is_new_form: true,
                previous_count: None,
                tier: MatchTier::NoMatch,
            }
        }
    };
    info!(
        "{}: {} -> {} ({:?}) {} submissions, previously {:?}",
        sheet.filename,
        if intent.is_new_form { "new form" } else { "update" },
        intent.slug,
        intent.display_name,
        intent.new_count,
        intent.previous_count
    );
    view.record(&intent);
    SheetOutcome::Accepted {
        filename: sheet.filename.clone(),
        intent,
    }
}

/// Reconciles a single sheet against a catalog snapshot.
pub fn reconcile(
    sheet: &UploadedSheet,
    snapshot: &[FormRecord],
    options: &ReconcileOptions,
) -> SheetOutcome {
    let mut view = BatchView::new(snapshot, options.tie_break);
    reconcile_in_view(sheet, &mut view, options)
}

/// Reconciles all the sheets of an upload, in order, against one snapshot.
///
/// This does not touch any storage: the result is the plan of what should be
/// written.
pub fn reconcile_batch(
    sheets: &[UploadedSheet],
    snapshot: &[FormRecord],
    options: &ReconcileOptions,
) -> BatchPlan {
    let mut view = BatchView::new(snapshot, options.tie_break);
    let outcomes = sheets
        .iter()
        .map(|sheet| reconcile_in_view(sheet, &mut view, options))
        .collect();
    BatchPlan { outcomes }
}

impl BatchPlan {
    pub fn intents(&self) -> impl Iterator<Item = &ReconciliationIntent> {
        self.outcomes.iter().filter_map(|o| match o {
            SheetOutcome::Accepted { intent, .. } => Some(intent),
            SheetOutcome::Rejected(_) => None,
        })
    }

    pub fn rejections(&self) -> impl Iterator<Item = &RejectedSheet> {
        self.outcomes.iter().filter_map(|o| match o {
            SheetOutcome::Rejected(r) => Some(r),
            SheetOutcome::Accepted { .. } => None,
        })
    }

    /// The rows of the single batched write.
    ///
    /// Several sheets of the same form collapse into one row carrying the last
    /// count. The row creates the form if any of these sheets created it.
    pub fn writes(&self) -> Vec<CatalogWrite> {
        let mut res: Vec<CatalogWrite> = Vec::new();
        for intent in self.intents() {
            match res.iter_mut().find(|w| w.slug == intent.slug) {
                Some(w) => {
                    w.submission_count = intent.new_count;
                    w.create |= intent.is_new_form;
                }
                None => res.push(CatalogWrite {
                    slug: intent.slug.clone(),
                    name: intent.display_name.clone(),
                    submission_count: intent.new_count,
                    create: intent.is_new_form,
                }),
            }
        }
        res
    }

    /// The catalog as it would be after a successful write of this plan.
    pub fn preview(&self, snapshot: &[FormRecord]) -> Vec<FormRecord> {
        let mut records = snapshot.to_vec();
        catalog::apply_writes(&mut records, &self.writes());
        records
    }
}

/// Runs an upload against a catalog.
///
/// The catalog is read once, all the sheets are reconciled, and all the
/// decisions are written with a single call. If the write fails with a
/// retryable error (a slug taken by a concurrent upload, or a write with an
/// unknown outcome), the catalog is read again and the upload planned again
/// before retrying. Count updates are overwrites, so replaying them is safe;
/// creations are checked against the fresh read.
pub fn run_batch<C: Catalog + ?Sized>(
    catalog: &mut C,
    sheets: &[UploadedSheet],
    options: &ReconcileOptions,
) -> Result<BatchReport, BatchError> {
    ensure!(!sheets.is_empty(), NoFilesSnafu {});
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let snapshot = catalog.list_all().context(CatalogReadSnafu {})?;
        info!(
            "run_batch: attempt {}: {} sheets against {} forms",
            attempts,
            sheets.len(),
            snapshot.len()
        );
        let plan = reconcile_batch(sheets, &snapshot, options);
        let writes = plan.writes();
        if writes.is_empty() {
            info!("run_batch: nothing to write");
            return Ok(BatchReport {
                outcomes: plan.outcomes,
                rows_written: 0,
                attempts,
            });
        }
        match catalog.upsert_batch(&writes) {
            Ok(()) => {
                info!("run_batch: wrote {} forms", writes.len());
                return Ok(BatchReport {
                    outcomes: plan.outcomes,
                    rows_written: writes.len(),
                    attempts,
                });
            }
            Err(e) if e.is_retryable() && attempts <= options.max_write_retries => {
                warn!(
                    "run_batch: write failed ({}), planning again with a fresh catalog",
                    e
                );
            }
            Err(e) => {
                return Err(BatchError::CatalogWrite {
                    source: e,
                    rows: writes.len(),
                    attempts,
                });
            }
        }
    }
}

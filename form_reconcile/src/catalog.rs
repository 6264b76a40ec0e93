//! The storage side of the reconciliation.
//!
//! The engine only needs two operations from the store that owns the forms:
//! listing all of them once per upload, and writing all the decisions of an
//! upload in a single call.

use log::debug;
use snafu::prelude::*;

use crate::config::FormRecord;

/// One row of a batched write.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CatalogWrite {
    pub slug: String,
    pub name: String,
    pub submission_count: u64,
    /// The row creates a new form. The store must refuse it if the slug is
    /// already taken instead of overwriting an unrelated form.
    pub create: bool,
}

#[derive(Debug, Snafu)]
pub enum CatalogError {
    #[snafu(display("slugs already taken in the catalog: {}", slugs.join(", ")))]
    SlugConflict { slugs: Vec<String> },
    /// The store could not tell whether the write was applied (timeout, lost connection).
    #[snafu(display("unknown outcome for the catalog write: {message}"))]
    UnknownOutcome { message: String },
    #[snafu(display("catalog failure: {message}"))]
    Backend { message: String },
}

impl CatalogError {
    /// Errors after which reading the catalog again and planning the upload
    /// again is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::SlugConflict { .. } | CatalogError::UnknownOutcome { .. }
        )
    }
}

/// A store of forms, keyed by slug.
pub trait Catalog {
    /// All the forms, in the natural order of the store.
    fn list_all(&self) -> Result<Vec<FormRecord>, CatalogError>;

    /// Inserts or updates all the rows at once, keyed by slug.
    ///
    /// Implementations must apply either all rows or none, and must fail with
    /// `SlugConflict` for `create` rows whose slug already exists. Updates
    /// change the name and the submission count, never the click count.
    fn upsert_batch(&mut self, rows: &[CatalogWrite]) -> Result<(), CatalogError>;
}

/// The slugs of `create` rows that are already used by `records`.
pub fn conflicting_slugs(records: &[FormRecord], rows: &[CatalogWrite]) -> Vec<String> {
    rows.iter()
        .filter(|r| r.create && records.iter().any(|f| f.slug == r.slug))
        .map(|r| r.slug.clone())
        .collect()
}

/// Applies rows to a list of forms. New forms are appended.
pub(crate) fn apply_writes(records: &mut Vec<FormRecord>, rows: &[CatalogWrite]) {
    for row in rows {
        match records.iter_mut().find(|f| f.slug == row.slug) {
            Some(existing) => {
                existing.display_name = row.name.clone();
                existing.submission_count = row.submission_count;
            }
            None => {
                records.push(FormRecord::new(&row.slug, &row.name, row.submission_count));
            }
        }
    }
}

/// A catalog that lives in memory.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MemoryCatalog {
    forms: Vec<FormRecord>,
}

impl MemoryCatalog {
    pub fn new() -> MemoryCatalog {
        MemoryCatalog { forms: Vec::new() }
    }

    pub fn from_records(forms: Vec<FormRecord>) -> MemoryCatalog {
        MemoryCatalog { forms }
    }

    pub fn records(&self) -> &[FormRecord] {
        &self.forms
    }

    pub fn get(&self, slug: &str) -> Option<&FormRecord> {
        self.forms.iter().find(|f| f.slug == slug)
    }
}

impl Catalog for MemoryCatalog {
    fn list_all(&self) -> Result<Vec<FormRecord>, CatalogError> {
        Ok(self.forms.clone())
    }

    fn upsert_batch(&mut self, rows: &[CatalogWrite]) -> Result<(), CatalogError> {
        let slugs = conflicting_slugs(&self.forms, rows);
        ensure!(slugs.is_empty(), SlugConflictSnafu { slugs });
        debug!("MemoryCatalog: applying {} rows", rows.len());
        apply_writes(&mut self.forms, rows);
        Ok(())
    }
}

// The catalog of forms, stored as a JSON file.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use form_reconcile::catalog::conflicting_slugs;
use form_reconcile::{Catalog, CatalogError, CatalogWrite, FormRecord};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::tally::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoredForm {
    pub slug: String,
    pub name: String,
    #[serde(rename = "formUrl", default, skip_serializing_if = "Option::is_none")]
    pub form_url: Option<String>,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub submissions: u64,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredForm {
    fn to_record(&self) -> FormRecord {
        FormRecord {
            slug: self.slug.clone(),
            display_name: self.name.clone(),
            submission_count: self.submissions,
            click_count: self.clicks,
            created_at: self.created_at,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub forms: Vec<StoredForm>,
}

/// A catalog kept in a single JSON file.
///
/// A missing file is an empty catalog. Writes replace the whole file at once,
/// and hold an exclusive lock on `<path>.lock` from the read that checks the
/// slugs to the rename.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: &Path) -> JsonCatalog {
        JsonCatalog {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<CatalogFile, CatalogError> {
        if !self.path.exists() {
            debug!("JsonCatalog: {:?} does not exist yet", self.path);
            return Ok(CatalogFile::default());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| CatalogError::Backend {
            message: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        let file: CatalogFile =
            serde_json::from_str(&contents).map_err(|e| CatalogError::Backend {
                message: format!("cannot parse {}: {}", self.path.display(), e),
            })?;
        let mut seen: HashSet<&str> = HashSet::new();
        let duplicates: Vec<&str> = file
            .forms
            .iter()
            .map(|f| f.slug.as_str())
            .filter(|slug| !seen.insert(*slug))
            .collect();
        if !duplicates.is_empty() {
            return Err(CatalogError::Backend {
                message: format!(
                    "{} has duplicate slugs: {}",
                    self.path.display(),
                    duplicates.join(", ")
                ),
            });
        }
        Ok(file)
    }

    // `Path::parent` is `Some("")` for a bare file name.
    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Takes the write lock of the catalog. It is released when the returned
    /// file is dropped.
    fn lock(&self) -> Result<File, CatalogError> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);
        let locked = fs::create_dir_all(self.dir())
            .and_then(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(&lock_path)
            })
            .and_then(|f| {
                f.lock_exclusive()?;
                Ok(f)
            });
        locked.map_err(|e| CatalogError::Backend {
            message: format!("cannot lock {}: {}", lock_path.display(), e),
        })
    }

    fn save(&self, file: &CatalogFile) -> Result<(), CatalogError> {
        let backend = |e: &dyn std::error::Error| CatalogError::Backend {
            message: format!("cannot write {}: {}", self.path.display(), e),
        };
        let contents = serde_json::to_string_pretty(file).map_err(|e| backend(&e))?;
        let mut tmp = NamedTempFile::new_in(self.dir()).map_err(|e| backend(&e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| backend(&e))?;
        tmp.persist(&self.path).map_err(|e| backend(&e))?;
        Ok(())
    }
}

impl Catalog for JsonCatalog {
    fn list_all(&self) -> Result<Vec<FormRecord>, CatalogError> {
        Ok(self.load()?.forms.iter().map(|f| f.to_record()).collect())
    }

    fn upsert_batch(&mut self, rows: &[CatalogWrite]) -> Result<(), CatalogError> {
        let _lock = self.lock()?;
        let mut file = self.load()?;
        let records: Vec<FormRecord> = file.forms.iter().map(|f| f.to_record()).collect();
        let slugs = conflicting_slugs(&records, rows);
        if !slugs.is_empty() {
            warn!("JsonCatalog: slugs taken since the catalog was read: {:?}", slugs);
            return Err(CatalogError::SlugConflict { slugs });
        }
        let now = Utc::now();
        for row in rows {
            match file.forms.iter_mut().find(|f| f.slug == row.slug) {
                Some(form) => {
                    form.name = row.name.clone();
                    form.submissions = row.submission_count;
                }
                None => file.forms.push(StoredForm {
                    slug: row.slug.clone(),
                    name: row.name.clone(),
                    form_url: None,
                    clicks: 0,
                    submissions: row.submission_count,
                    created_at: Some(now),
                }),
            }
        }
        self.save(&file)?;
        info!("JsonCatalog: wrote {} forms to {:?}", rows.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(slug: &str, name: &str, count: u64, create: bool) -> CatalogWrite {
        CatalogWrite {
            slug: slug.to_string(),
            name: name.to_string(),
            submission_count: count,
            create,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = JsonCatalog::new(&dir.path().join("forms.json"));
        assert!(c.list_all().unwrap().is_empty());
    }

    #[test]
    fn keeps_fields_it_does_not_own() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("forms.json");
        fs::write(
            &p,
            r#"{"forms":[{"slug":"winter","name":"Winter Feedback","formUrl":"https://forms.office.com/r/x",
                "clicks":31,"submissions":2,"createdAt":"2024-01-09T10:00:00Z"}]}"#,
        )
        .unwrap();
        let mut c = JsonCatalog::new(&p);
        c.upsert_batch(&[
            write("winter", "Winter Feedback", 12, false),
            write("spring", "spring", 4, true),
        ])
        .unwrap();

        let file = c.load().unwrap();
        assert_eq!(file.forms.len(), 2);
        let winter = &file.forms[0];
        assert_eq!(winter.submissions, 12);
        assert_eq!(winter.clicks, 31);
        assert_eq!(
            winter.form_url.as_deref(),
            Some("https://forms.office.com/r/x")
        );
        let spring = &file.forms[1];
        assert_eq!(spring.clicks, 0);
        assert!(spring.created_at.is_some());
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_str().unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["forms.json", "forms.json.lock"]);
    }

    #[test]
    fn create_over_existing_slug_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = JsonCatalog::new(&dir.path().join("forms.json"));
        c.upsert_batch(&[write("a", "a", 1, true)]).unwrap();
        let err = c
            .upsert_batch(&[write("b", "b", 1, true), write("a", "other a", 2, true)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::SlugConflict { .. }));
        let forms = c.list_all().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].display_name, "a");
    }

    #[test]
    fn unreadable_file_is_a_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("forms.json");
        fs::write(&p, "not json").unwrap();
        let err = JsonCatalog::new(&p).list_all().unwrap_err();
        assert!(matches!(err, CatalogError::Backend { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn creation_by_another_writer_surfaces_as_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("forms.json");
        let mut first = JsonCatalog::new(&p);
        let mut second = JsonCatalog::new(&p);

        assert!(first.list_all().unwrap().is_empty());
        second
            .upsert_batch(&[write("survey-a", "survey a", 3, true)])
            .unwrap();
        let err = first
            .upsert_batch(&[write("survey-a", "survey a", 5, true)])
            .unwrap_err();
        match &err {
            CatalogError::SlugConflict { slugs } => assert_eq!(slugs, &vec!["survey-a".to_string()]),
            e => panic!("unexpected error {:?}", e),
        }
        assert!(err.is_retryable());
        let forms = second.list_all().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].submission_count, 3);
    }

    #[test]
    fn concurrent_writers_keep_every_form() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("forms.json");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let p = p.clone();
                std::thread::spawn(move || {
                    let slug = format!("form-{}", i);
                    JsonCatalog::new(&p)
                        .upsert_batch(&[write(&slug, &slug, i, true)])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut slugs: Vec<String> = JsonCatalog::new(&p)
            .list_all()
            .unwrap()
            .into_iter()
            .map(|f| f.slug)
            .collect();
        slugs.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("form-{}", i)).collect();
        assert_eq!(slugs, expected);
    }

    #[test]
    fn duplicate_slugs_in_the_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("forms.json");
        fs::write(
            &p,
            r#"{"forms":[{"slug":"a","name":"A"},{"slug":"b","name":"B"},{"slug":"a","name":"A again"}]}"#,
        )
        .unwrap();
        let mut c = JsonCatalog::new(&p);
        match c.list_all().unwrap_err() {
            CatalogError::Backend { message } => assert!(message.contains("duplicate slugs: a")),
            e => panic!("unexpected error {:?}", e),
        }
        let err = c.upsert_batch(&[write("a", "A", 4, false)]).unwrap_err();
        assert!(matches!(err, CatalogError::Backend { .. }));
    }

    #[test]
    fn creates_the_catalog_directory() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data").join("forms.json");
        let mut c = JsonCatalog::new(&p);
        c.upsert_batch(&[write("a", "a", 1, true)]).unwrap();
        assert_eq!(c.list_all().unwrap().len(), 1);
    }
}

// Primitives for reading delimited text exports.

use form_reconcile::{Cell, UploadedSheet};

use crate::tally::io_common::{simplify_file_name, text_cell, DecodeOptions};
use crate::tally::*;

/// Reads every line of the file, header included. Lines may have different lengths.
pub fn read_delimited(path: &str, opts: &DecodeOptions) -> TallyResult<UploadedSheet> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(opts.csv_delimiter)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        debug!("read_delimited: lineno: {:?} line: {:?}", lineno, line);
        rows.push(line.iter().map(|s| text_cell(s, opts)).collect());
    }

    Ok(UploadedSheet {
        filename: simplify_file_name(path),
        sheet_title: None,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_reconcile::rows::{count_submissions, data_rows};

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let p = dir.path().join(name);
        fs::write(&p, contents).unwrap();
        p.to_str().unwrap().to_string()
    }

    #[test]
    fn reads_ragged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(
            &dir,
            "Course Survey.csv",
            "Id,Name,Answer\n1,Ann,yes\n2,,\n,,\n3\n,,,\n",
        );
        let sheet = read_delimited(&p, &DecodeOptions::default()).unwrap();
        assert_eq!(sheet.filename, "Course Survey.csv");
        assert_eq!(sheet.sheet_title, None);
        assert_eq!(sheet.rows.len(), 6);
        assert_eq!(sheet.rows[4], vec![Cell::Text("3".to_string())]);
        assert_eq!(count_submissions(data_rows(&sheet.rows)), 3);
    }

    #[test]
    fn custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(&dir, "export.csv", "a;b\nx;y\n");
        let opts = DecodeOptions {
            csv_delimiter: b';',
            ..DecodeOptions::default()
        };
        let sheet = read_delimited(&p, &opts).unwrap();
        assert_eq!(
            sheet.rows[1],
            vec![Cell::Text("x".to_string()), Cell::Text("y".to_string())]
        );
    }

    #[test]
    fn missing_file() {
        let err = read_delimited("/nonexistent/dir/form.csv", &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, TallyError::CsvOpen { .. }));
    }
}

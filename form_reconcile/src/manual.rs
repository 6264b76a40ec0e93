/*!

This is the long-form manual for `form_reconcile` and `formtally`.

## Overview

Survey providers (Microsoft Forms, Google Forms, ...) let you export all the
responses of a form as a spreadsheet. `formtally` takes one or more of these
exports and updates the submission counts stored in a catalog of forms.
For each file it:

1. counts the submissions: every row after the header with at least one
   non-blank cell. Files without any submission are rejected.
2. derives the identity of the form from the file name, or from the title of
   the worksheet when the file name is not useful (`Sheet1.xlsx`).
3. finds the form in the catalog (see matching below), or creates a new form.
4. overwrites the stored count with the count of the file.

All the files of one upload are processed in order, and the catalog is written
once at the end. A file that creates a form is visible to the next files of the
same upload: uploading `Survey-A-1-1.xlsx` twice creates one form.

## Identities

File names are normalized before any comparison:

| file name                  | identity          |
|----------------------------|-------------------|
| `Winter Feedback.xlsx`     | `winter feedback` |
| `Winter_Feedback (1).xlsx` | `winter feedback` |
| `Survey-A-1-1.xlsx`        | `survey a`        |
| `Sheet1.xlsx` (sheet `Course Survey`) | `course survey` |

When neither the file name nor the sheet title gives an identity, the identity
is `default form`.

## Matching

The identity is compared with the normalized names of the forms of the catalog:

- `exactName`: same normalized name.
- `normalizedName`: the name of the form contains the identity. For instance
  the export `Winter Feedback.xlsx` matches the form `Winter Feedback Extra`.
- `fuzzyContains`: the identity contains the name of the form. This tier is
  disabled unless `reverseContains` is set in the configuration.

When several forms satisfy the same tier, the first one in the catalog wins.
Set `tieBreak` to `mostRecent` to pick the most recently created form instead.
The report shows, for every file, the form it was matched to: always check
it when names are ambiguous.

## Command line

```bash
formtally --catalog forms.json -i 'Winter Feedback.xlsx' -i 'Survey-A-1-1.csv'
```

- `--dry-run` prints the report, prints the changes to the catalog on the standard
  error, and writes nothing.
- `--list` prints the forms of the catalog.
- `--out` writes the report to a file instead of the standard output.
- `--verbose` turns on debug logging.

## Configuration

All the keys are optional:

```json
{
  "catalogPath": "forms.json",
  "inputType": "auto",
  "worksheetName": "Form1",
  "blankCellValue": "",
  "csvDelimiter": ",",
  "tieBreak": "catalogOrder",
  "reverseContains": false,
  "maxWriteRetries": 2
}
```

`inputType` is one of `auto` (by extension), `xlsx` (any workbook format) or
`csv`. A relative `catalogPath` is resolved against the directory of the
configuration file.

## Catalog file

```json
{
  "forms": [
    {
      "slug": "winter-feedback",
      "name": "Winter Feedback",
      "formUrl": "https://forms.office.com/r/abc",
      "clicks": 31,
      "submissions": 12,
      "createdAt": "2024-01-09T10:00:00Z"
    }
  ]
}
```

Slugs are unique and never change. A new form gets a slug derived from its
name, with `-1`, `-2`, ... appended when the slug is already taken.

*/

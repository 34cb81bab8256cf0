//! Spreadsheet flattening for the extraction prompt
//!
//! Turns every sheet into `Row <n>: <header>: <value> | ...` lines so the
//! model sees one line per table row next to the raw file.

use std::io::Cursor;

use calamine::{Reader, open_workbook_auto_from_rs};

use crate::model::UploadedDocument;

/// Sheet label used for CSV files, which have no sheet names
const CSV_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Cell grid of one sheet, header row first
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRows {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Flatten a spreadsheet document into row-oriented text.
///
/// `limit` caps the number of emitted rows across all sheets combined.
pub fn flatten_document(
    document: &UploadedDocument,
    limit: Option<usize>,
) -> Result<String, SpreadsheetError> {
    let sheets = read_sheets(document)?;
    Ok(flatten_sheets(&sheets, limit))
}

fn is_csv(document: &UploadedDocument) -> bool {
    document.mime_type == "text/csv" || document.extension().as_deref() == Some("csv")
}

/// Read all sheets of the document into string grids
pub fn read_sheets(document: &UploadedDocument) -> Result<Vec<SheetRows>, SpreadsheetError> {
    if is_csv(document) {
        return Ok(vec![read_csv(&document.data)?]);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(document.data.to_vec()))?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "Skipping unreadable sheet");
                continue;
            }
        };
        let rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        sheets.push(SheetRows { name, rows });
    }

    tracing::debug!(
        document = %document.name,
        sheet_count = sheets.len(),
        "Read workbook sheets"
    );
    Ok(sheets)
}

fn read_csv(data: &[u8]) -> Result<SheetRows, SpreadsheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(strip_bom(data));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(SheetRows {
        name: CSV_SHEET_NAME.to_string(),
        rows,
    })
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data)
}

/// Render sheet grids as prompt text
pub fn flatten_sheets(sheets: &[SheetRows], limit: Option<usize>) -> String {
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut sections = Vec::new();

    for sheet in sheets {
        if remaining == 0 {
            break;
        }

        let Some((header_row, data)) = sheet.rows.split_first() else {
            continue;
        };

        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(idx, title)| {
                let title = title.trim();
                if title.is_empty() {
                    format!("Column {}", idx + 1)
                } else {
                    title.to_string()
                }
            })
            .collect();

        let data_rows: Vec<&Vec<String>> = data
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();

        let mut lines = Vec::new();
        for (idx, row) in data_rows.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let cells: Vec<String> = headers
                .iter()
                .enumerate()
                .filter_map(|(col, header)| {
                    let value = row.get(col).map(|c| c.trim()).unwrap_or_default();
                    (!value.is_empty()).then(|| format!("{header}: {value}"))
                })
                .collect();

            if cells.is_empty() {
                continue;
            }
            lines.push(format!("Row {}: {}", idx + 1, cells.join(" | ")));
            remaining -= 1;
        }

        if !lines.is_empty() {
            sections.push(format!("Sheet \"{}\":\n{}", sheet.name, lines.join("\n")));
        }
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, rows: &[&[&str]]) -> SheetRows {
        SheetRows {
            name: name.to_string(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_flatten_rows_with_headers() {
        let sheets = vec![sheet(
            "Позиции",
            &[
                &["Наименование", "Кол-во", ""],
                &["Кабель", "100", "м"],
                &["Муфта", "", "шт"],
            ],
        )];

        let text = flatten_sheets(&sheets, None);
        assert_eq!(
            text,
            "Sheet \"Позиции\":\n\
             Row 1: Наименование: Кабель | Кол-во: 100 | Column 3: м\n\
             Row 2: Наименование: Муфта | Column 3: шт"
        );
    }

    #[test]
    fn test_blank_rows_are_skipped_before_numbering() {
        let sheets = vec![sheet("S", &[&["A"], &["x"], &["  "], &["y"]])];
        let text = flatten_sheets(&sheets, None);
        assert_eq!(text, "Sheet \"S\":\nRow 1: A: x\nRow 2: A: y");
    }

    #[test]
    fn test_cells_beyond_header_are_ignored() {
        let sheets = vec![sheet("S", &[&["A"], &["", "orphan"], &["kept", "dropped"]])];
        let text = flatten_sheets(&sheets, None);
        assert_eq!(text, "Sheet \"S\":\nRow 2: A: kept");
    }

    #[test]
    fn test_limit_is_global_across_sheets() {
        let sheets = vec![
            sheet("First", &[&["A"], &["1"], &["2"]]),
            sheet("Second", &[&["B"], &["3"], &["4"]]),
        ];

        let text = flatten_sheets(&sheets, Some(3));
        assert_eq!(
            text,
            "Sheet \"First\":\nRow 1: A: 1\nRow 2: A: 2\n\nSheet \"Second\":\nRow 1: B: 3"
        );
        assert_eq!(flatten_sheets(&sheets, Some(0)), "");
    }

    #[test]
    fn test_sheets_without_data_are_omitted() {
        let sheets = vec![sheet("Empty", &[&["A"]]), sheet("None", &[]), sheet("S", &[&["A"], &["1"]])];
        assert_eq!(flatten_sheets(&sheets, None), "Sheet \"S\":\nRow 1: A: 1");
    }

    #[test]
    fn test_csv_document_is_read_as_single_sheet() {
        let document = UploadedDocument::new(
            "req.csv",
            None,
            "\u{feff}Параметр,Значение\nЦена,100 руб\n,\nСрок,\"5 дней, не более\"\n"
                .as_bytes()
                .to_vec(),
        );
        let text = flatten_document(&document, None).unwrap();
        assert_eq!(
            text,
            "Sheet \"Sheet1\":\n\
             Row 1: Параметр: Цена | Значение: 100 руб\n\
             Row 2: Параметр: Срок | Значение: 5 дней, не более"
        );
    }

    #[test]
    fn test_garbage_workbook_is_an_error() {
        let document = UploadedDocument::new("req.xlsx", None, b"not a workbook".to_vec());
        assert!(matches!(
            flatten_document(&document, None),
            Err(SpreadsheetError::Workbook(_))
        ));
    }
}

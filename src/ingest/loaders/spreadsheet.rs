use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};
use std::io::Cursor;

use super::Loader;
use crate::error::{ColdlistError, Result};
use crate::ingest::table::RawTable;

/// Excel workbook loader (`.xlsx`, `.xls`); reads the first sheet only
pub struct SpreadsheetLoader;

impl Loader for SpreadsheetLoader {
    fn can_load(&self, extension: &str) -> bool {
        matches!(extension, "xlsx" | "xls")
    }

    fn load(&self, bytes: &[u8], file_name: &str) -> Result<RawTable> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| ColdlistError::UnreadableFile(format!("{}: {}", file_name, e)))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => {
                range.map_err(|e| ColdlistError::UnreadableFile(format!("{}: {}", file_name, e)))?
            }
            None => {
                log::warn!("Workbook {} has no sheets", file_name);
                return Ok(RawTable::empty());
            }
        };

        Ok(RawTable::from_grid(range_to_grid(&range)))
    }
}

/// Convert a sheet range into rows of trimmed strings; blank cells become "".
pub fn range_to_grid(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    let text = match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match cell.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        // empty and error cells
        _ => String::new(),
    };
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String(" Name ".to_string()));
        range.set_value((0, 1), Data::Empty);
        range.set_value((0, 2), Data::String("Phone".to_string()));
        range.set_value((1, 0), Data::String("Acme".to_string()));
        range.set_value((1, 1), Data::String("hidden".to_string()));
        range.set_value((1, 2), Data::Float(37060000000.0));
        // row 2 left blank
        range.set_value((3, 0), Data::String("Beta".to_string()));
        range.set_value((3, 2), Data::Int(5550200));
        range
    }

    #[test]
    fn test_range_to_grid_stringifies_cells() {
        let grid = range_to_grid(&sample_range());
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0], vec!["Name", "", "Phone"]);
        assert_eq!(grid[1], vec!["Acme", "hidden", "37060000000"]);
        assert_eq!(grid[2], vec!["", "", ""]);
    }

    #[test]
    fn test_blank_header_keeps_positional_alignment() {
        let table = RawTable::from_grid(range_to_grid(&sample_range()));
        assert_eq!(table.headers, vec!["Name", "Phone"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].get("Phone"), Some("37060000000"));
        assert_eq!(table.rows[1].get("Name"), Some("Beta"));
        assert_eq!(table.rows[1].get("Phone"), Some("5550200"));
    }

    #[test]
    fn test_corrupt_workbook_is_unreadable() {
        let err = SpreadsheetLoader
            .load(b"definitely not a zip archive", "leads.xlsx")
            .unwrap_err();
        assert!(matches!(err, ColdlistError::UnreadableFile(_)));
        assert!(err.to_string().starts_with("could not read file"));
    }

    #[test]
    fn test_can_load() {
        assert!(SpreadsheetLoader.can_load("xlsx"));
        assert!(SpreadsheetLoader.can_load("xls"));
        assert!(!SpreadsheetLoader.can_load("csv"));
    }

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="Leads" sheetId="1" r:id="rId1"/>
<sheet name="Archive" sheetId="2" r:id="rId2"/>
</sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    // style 1 uses built-in number format 14 (m/d/yyyy)
    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
</cellXfs>
</styleSheet>"#;

    const LEADS_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:C2"/>
<sheetData>
<row r="1">
<c r="A1" t="inlineStr"><is><t>Name</t></is></c>
<c r="B1" t="inlineStr"><is><t>Signup Date</t></is></c>
<c r="C1" t="inlineStr"><is><t>Phone</t></is></c>
</row>
<row r="2">
<c r="A2" t="inlineStr"><is><t> Acme Corp </t></is></c>
<c r="B2" s="1"><v>45292</v></c>
<c r="C2"><v>37060000001</v></c>
</row>
</sheetData>
</worksheet>"#;

    const ARCHIVE_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:A2"/>
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Old header</t></is></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>Old lead</t></is></c></row>
</sheetData>
</worksheet>"#;

    fn two_sheet_workbook() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/styles.xml", STYLES),
            ("xl/worksheets/sheet1.xml", LEADS_SHEET),
            ("xl/worksheets/sheet2.xml", ARCHIVE_SHEET),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_load_xlsx_first_sheet_with_dates() {
        let table = SpreadsheetLoader.load(&two_sheet_workbook(), "leads.xlsx").unwrap();

        assert_eq!(table.headers, vec!["Name", "Signup Date", "Phone"]);
        assert_eq!(table.row_count(), 1);
        let row = &table.rows[0];
        assert_eq!(row.get("Name"), Some("Acme Corp"));
        assert_eq!(row.get("Signup Date"), Some("2024-01-01"));
        assert_eq!(row.get("Phone"), Some("37060000001"));
        assert_eq!(row.get("Old header"), None);
    }
}

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};
use crate::export::rows::ExportTable;
use crate::models::BreakdownResult;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// 列号(从1开始)转字母: 1 -> A, 27 -> AA
fn column_letter(mut col: u32) -> String {
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    result
}

fn escape_xml(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn cell_xml(reference: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(format!("<c r=\"{}\"><v>{}</v></c>", reference, n)),
        Some(Value::Bool(b)) => Some(format!(
            "<c r=\"{}\" t=\"b\"><v>{}</v></c>",
            reference,
            if *b { 1 } else { 0 }
        )),
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(inline_string(reference, s)),
        Some(other) => Some(inline_string(reference, &other.to_string())),
    }
}

fn inline_string(reference: &str, text: &str) -> String {
    format!(
        "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
        reference,
        escape_xml(text)
    )
}

fn sheet_xml(table: &ExportTable) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str("<row r=\"1\">");
    for (col, header) in table.headers.iter().enumerate() {
        let reference = format!("{}1", column_letter(col as u32 + 1));
        xml.push_str(&inline_string(&reference, &header.title));
    }
    xml.push_str("</row>");

    for (row_idx, row) in table.rows.iter().enumerate() {
        let r = row_idx + 2;
        xml.push_str(&format!("<row r=\"{}\">", r));
        for (col, value) in table.cells(row).enumerate() {
            let reference = format!("{}{}", column_letter(col as u32 + 1), r);
            if let Some(cell) = cell_xml(&reference, value) {
                xml.push_str(&cell);
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(sheet_name)
    )
}

fn core_xml() -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:creator>vfx_breakdown</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{0}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{0}</dcterms:modified></cp:coreProperties>"#,
        now
    )
}

/// 表格写成单工作表的 `.xlsx`(不带样式)
pub fn to_xlsx(table: &ExportTable, sheet_name: &str) -> BreakdownResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("docProps/core.xml", core_xml()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(table)),
    ];
    for (name, content) in parts.iter() {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn save_xlsx(table: &ExportTable, sheet_name: &str, path: &Path) -> BreakdownResult<()> {
    let bytes = to_xlsx(table, sheet_name)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Base64编码的 `.xlsx`，供不能直接写文件的调用方使用
pub fn xlsx_base64(table: &ExportTable, sheet_name: &str) -> BreakdownResult<String> {
    let bytes = to_xlsx(table, sheet_name)?;
    Ok(base64::encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::rows::{ExportHeader, ExportRow};
    use serde_json::json;
    use std::io::Read;

    fn table() -> ExportTable {
        let mut row = ExportRow::new();
        row.insert("page".to_string(), json!(2));
        row.insert("text".to_string(), json!("Fire & <smoke>"));
        row.insert("flag".to_string(), json!(true));
        ExportTable {
            headers: vec![
                ExportHeader { id: "page".to_string(), title: "页码".to_string() },
                ExportHeader { id: "text".to_string(), title: "内容".to_string() },
                ExportHeader { id: "flag".to_string(), title: "Rex".to_string() },
            ],
            rows: vec![row],
        }
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(28), "AB");
    }

    #[test]
    fn workbook_contains_sheet_cells() {
        let bytes = to_xlsx(&table(), "Breakdown").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains("<c r=\"A2\"><v>2</v></c>"));
        assert!(sheet.contains("Fire &amp; &lt;smoke&gt;"));
        assert!(sheet.contains("<c r=\"C2\" t=\"b\"><v>1</v></c>"));
        assert!(archive.by_name("docProps/core.xml").is_ok());
    }

    #[test]
    fn base64_output_decodes() {
        let encoded = xlsx_base64(&table(), "Breakdown").unwrap();
        let decoded = base64::decode(&encoded).unwrap();
        assert_eq!(&decoded[..2], b"PK");
    }
}

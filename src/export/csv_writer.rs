use std::fs;
use std::path::Path;
use serde_json::Value;
use crate::export::rows::ExportTable;
use crate::models::BreakdownResult;

/// 单元格显示文本
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "x".to_string(),
        Some(Value::Bool(false)) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn escape_csv_field(field: &str) -> String {
    // 含逗号、引号或换行时整体加引号，引号写两遍
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 表格写成CSV文本，第一行为表头标题
pub fn to_csv(table: &ExportTable) -> String {
    let mut output = String::new();
    let titles: Vec<String> = table.headers.iter().map(|h| escape_csv_field(&h.title)).collect();
    output.push_str(&titles.join(","));
    output.push_str("\r\n");

    for row in &table.rows {
        let cells: Vec<String> = table
            .cells(row)
            .map(|value| escape_csv_field(&cell_text(value)))
            .collect();
        output.push_str(&cells.join(","));
        output.push_str("\r\n");
    }
    output
}

/// 保存CSV文件(带BOM，便于表格软件识别UTF-8)
pub fn save_csv(table: &ExportTable, path: &Path) -> BreakdownResult<()> {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(to_csv(table).as_bytes());
    fs::write(path, bytes)?;
    Ok(())
}

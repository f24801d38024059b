//! 宿主程序调用的API
//!
//! 解析和文档转换都是CPU密集的同步算法，这里统一放到阻塞线程池执行，
//! 不占用调用方的异步运行时

use std::collections::BTreeMap;
use std::path::Path;
use serde::Serialize;
use tokio::task;
use tokio::time;
use tracing::{info, warn};
use crate::document::DocumentConverter;
use crate::export::{save_csv, save_xlsx, serialize_script, to_csv, xlsx_base64, ExportTable, RowGenerator};
use crate::metrics::{MetricsEngine, PageFraction};
use crate::models::{BreakdownError, BreakdownResult, Conf, Document, EntityRegistry, ScriptToken};
use crate::parser::{ParseOutput, ScriptParser};

/// 导出表格的工作表名
pub const SHEET_NAME: &str = "Breakdown";

/// OCR分页之间插入的分页线
pub const OCR_PAGE_RULE: &str = "===";

/// 导出结果
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub success: bool,
    pub message: String,
    pub file_path: Option<String>,
}

impl ExportResult {
    fn from_result(result: BreakdownResult<()>, output_path: &str, what: &str) -> Self {
        match result {
            Ok(()) => ExportResult {
                success: true,
                message: format!("{}导出成功", what),
                file_path: Some(output_path.to_string()),
            },
            Err(e) => {
                warn!("{}导出失败: {}", what, e);
                ExportResult {
                    success: false,
                    message: format!("导出失败: {}", e),
                    file_path: None,
                }
            }
        }
    }
}

/// 剧本统计摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptStats {
    pub scenes: usize,
    pub pages: u32,
    pub dialogue_blocks: usize,
    pub action_blocks: usize,
    pub entities: usize,
    pub total_lines: usize,
    /// 按页数估算的总长度
    pub length: PageFraction,
    /// VFX难度 -> 带该难度标注的块数
    pub vfx_by_level: BTreeMap<String, usize>,
}

impl ScriptStats {
    pub fn collect(tokens: &[ScriptToken], entities: &EntityRegistry, conf: &Conf) -> Self {
        let engine = MetricsEngine::new(conf);
        let metrics = engine.analyze(tokens);
        let mut stats = ScriptStats {
            entities: entities.len(),
            total_lines: metrics.total_lines,
            length: engine.page_count(metrics.total_lines),
            pages: 1,
            ..ScriptStats::default()
        };
        for token in tokens {
            match token {
                ScriptToken::SceneHeading { .. } | ScriptToken::Flashback { .. } => stats.scenes += 1,
                ScriptToken::Dialogue { .. } => stats.dialogue_blocks += 1,
                ScriptToken::Action { .. } => stats.action_blocks += 1,
                ScriptToken::PageBreak { page_num } => stats.pages = stats.pages.max(*page_num),
                _ => {}
            }
            if let Some(tag) = token.vfx() {
                *stats.vfx_by_level.entry(tag.level.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    pub fn vfx_total(&self) -> usize {
        self.vfx_by_level.values().sum()
    }
}

/// 拼接逐页OCR结果，页与页之间插入带页码的分页线
///
/// 第一页之前不插分页线，空白页同样占一个页码
pub fn join_ocr_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut script = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            script.push_str(&format!("\n\n{}{}{}\n\n", OCR_PAGE_RULE, " ".repeat(30), i + 1));
        }
        script.push_str(page.as_ref().trim_end());
    }
    script.push('\n');
    script
}

/// 解析剧本文本
pub async fn parse_script(text: String, conf: Conf) -> BreakdownResult<ParseOutput> {
    conf.validate()?;
    let output = task::spawn_blocking(move || ScriptParser::new(&conf).parse(&text)).await??;
    info!(
        "解析完成: {}个token，{}行被跳过，耗时{}ms",
        output.tokens.len(),
        output.line_errors.len(),
        output.parse_time
    );
    Ok(output)
}

/// 解析剧本文本，返回JSON
pub async fn parse_script_json(text: String, conf: Conf) -> BreakdownResult<String> {
    let output = parse_script(text, conf).await?;
    Ok(serde_json::to_string(&output)?)
}

/// token列表转编辑器文档
pub async fn tokens_to_document(tokens: Vec<ScriptToken>, entities: EntityRegistry, conf: Conf) -> BreakdownResult<Document> {
    let document = task::spawn_blocking(move || {
        DocumentConverter::new(&conf).to_document(&tokens, &entities)
    })
    .await?;
    Ok(document)
}

/// 编辑器文档转回token列表
///
/// 配置了超时时，超时返回 `ConversionTimeout`；转换线程内部同样按期限检查，
/// 不会在后台继续产生结果
pub async fn document_to_tokens(document: Document, conf: Conf) -> BreakdownResult<(Vec<ScriptToken>, EntityRegistry)> {
    let timeout = conf.conversion_timeout();
    let handle = task::spawn_blocking(move || {
        DocumentConverter::new(&conf).document_to_tokens(&document)
    });
    match timeout {
        Some(limit) => match time::timeout(limit, handle).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!("文档转换超过{:?}，放弃结果", limit);
                Err(BreakdownError::ConversionTimeout(limit))
            }
        },
        None => handle.await?,
    }
}

/// 生成导出表格
pub fn export_table(tokens: &[ScriptToken], entities: &EntityRegistry, conf: &Conf) -> ExportTable {
    RowGenerator::new(conf).generate(tokens, entities)
}

/// 解析并导出CSV文件
pub async fn export_to_csv(text: String, output_path: String, conf: Conf) -> ExportResult {
    let result = async {
        let parsed = parse_script(text, conf.clone()).await?;
        let table = export_table(&parsed.tokens, &parsed.entities, &conf);
        save_csv(&table, Path::new(&output_path))
    }
    .await;
    ExportResult::from_result(result, &output_path, "CSV")
}

/// 解析并导出CSV文本
pub async fn export_to_csv_string(text: String, conf: Conf) -> BreakdownResult<String> {
    let parsed = parse_script(text, conf.clone()).await?;
    Ok(to_csv(&export_table(&parsed.tokens, &parsed.entities, &conf)))
}

/// 解析并导出XLSX文件
pub async fn export_to_xlsx(text: String, output_path: String, conf: Conf) -> ExportResult {
    let result = async {
        let parsed = parse_script(text, conf.clone()).await?;
        let table = export_table(&parsed.tokens, &parsed.entities, &conf);
        save_xlsx(&table, SHEET_NAME, Path::new(&output_path))
    }
    .await;
    ExportResult::from_result(result, &output_path, "XLSX")
}

/// 获取XLSX文档的Base64编码
pub async fn export_to_xlsx_base64(text: String, conf: Conf) -> BreakdownResult<String> {
    let parsed = parse_script(text, conf.clone()).await?;
    let table = export_table(&parsed.tokens, &parsed.entities, &conf);
    xlsx_base64(&table, SHEET_NAME)
}

/// 重新解析后写回剧本文本；`clean` 为 true 时去掉全部标注
pub async fn export_raw_script(text: String, conf: Conf, clean: bool) -> BreakdownResult<String> {
    let parsed = parse_script(text, conf).await?;
    Ok(serialize_script(&parsed.tokens, &parsed.entities, clean))
}

/// 解析并统计
pub async fn script_stats(text: String, conf: Conf) -> BreakdownResult<ScriptStats> {
    let parsed = parse_script(text, conf.clone()).await?;
    Ok(ScriptStats::collect(&parsed.tokens, &parsed.entities, &conf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_pages_are_joined_with_numbered_rules() {
        let joined = join_ocr_pages(&["INT. A - DAY\n\n", "", "Text."]);
        let rule2 = format!("==={}2", " ".repeat(30));
        let rule3 = format!("==={}3", " ".repeat(30));
        assert_eq!(joined, format!("INT. A - DAY\n\n{}\n\n\n\n{}\n\nText.\n", rule2, rule3));
    }

    #[test]
    fn stats_count_blocks_and_levels() {
        let tokens = vec![
            ScriptToken::scene_heading("A", "1", 1),
            ScriptToken::Action {
                text: "Boom.".to_string(),
                vfx: Some(crate::models::VfxTag::new("hard")),
            },
            ScriptToken::PageBreak { page_num: 2 },
            ScriptToken::DialogueBegin,
            ScriptToken::character("JOHN", "JOHN", false),
            ScriptToken::dialogue("Hi."),
            ScriptToken::DialogueEnd,
        ];
        let stats = ScriptStats::collect(&tokens, &EntityRegistry::new(), &Conf::default());
        assert_eq!(stats.scenes, 1);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.action_blocks, 1);
        assert_eq!(stats.dialogue_blocks, 1);
        assert_eq!(stats.vfx_total(), 1);
        assert_eq!(stats.vfx_by_level.get("hard"), Some(&1));
    }
}

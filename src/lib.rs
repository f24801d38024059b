pub mod models;
pub mod utils;
pub mod parser;
pub mod document;
pub mod metrics;
pub mod export;
pub mod api;

pub use models::{
    BreakdownError,
    BreakdownResult,
    Conf,
    Document,
    Entity,
    EntityKind,
    EntityRegistry,
    ExportMode,
    ParseLineError,
    ScriptToken,
    VfxLevel,
    VfxTag
};

pub use parser::{
    ParseOutput,
    ScriptParser
};

pub use document::{
    tokens_to_document,
    DocumentConverter
};

pub use metrics::{
    fractional_page_count,
    MetricsEngine,
    PageFraction,
    ScriptMetrics
};

pub use export::{
    serialize_script,
    ExportTable,
    RowGenerator
};

pub use api::{
    ExportResult,
    ScriptStats,
    join_ocr_pages,
    parse_script,
    document_to_tokens,
    export_to_csv,
    export_to_xlsx,
    export_to_xlsx_base64,
    script_stats
};

/// 解析剧本文本
///
/// # Arguments
///
/// * `script` - 剧本文本
/// * `config` - 配置对象
///
/// # Returns
///
/// 解析结果对象；空输入返回 `InvalidInput`
pub fn parse(script: &str, config: &Conf) -> BreakdownResult<ParseOutput> {
    ScriptParser::new(config).parse(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let config = Conf::default();
        let result = parse("INT. ROOM - DAY\n\nHello, world!", &config).unwrap();
        assert!(!result.tokens.is_empty());
    }
}

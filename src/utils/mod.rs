pub mod breakdown_constants;

pub use breakdown_constants::{BreakdownConstants, PatternLibrary, ANNOTATION_REGEX, LINE_REGEX, TYPOGRAPHY_REGEX};

/// 排版归一化
///
/// 弯引号换成直引号，长破折号换成连字符，CRLF 换成 LF，去掉行尾空白，
/// 连续多个空行合并成一个
pub fn normalize_script(text: &str) -> String {
    let t = TYPOGRAPHY_REGEX["line_end"].replace_all(text, "\n");
    let t = TYPOGRAPHY_REGEX["smart_single"].replace_all(&t, "'");
    let t = TYPOGRAPHY_REGEX["smart_double"].replace_all(&t, "\"");
    let t = TYPOGRAPHY_REGEX["dash"].replace_all(&t, "-");
    let t = TYPOGRAPHY_REGEX["nbsp"].replace_all(&t, " ");
    let t = TYPOGRAPHY_REGEX["trailing_ws"].replace_all(&t, "");
    let t = TYPOGRAPHY_REGEX["blank_run"].replace_all(&t, "\n\n");
    t.into_owned()
}

/// 行首缩进列数，制表符按固定宽度折算
pub fn leading_indent(line: &str) -> usize {
    let mut columns = 0;
    for c in line.chars() {
        match c {
            ' ' => columns += 1,
            '\t' => columns += BreakdownConstants::TAB_WIDTH,
            _ => break,
        }
    }
    columns
}

/// 去除实体标记和注解后的纯文本
///
/// `**Name**[[char]]` 只保留名称，`[[...]]` 整体删除，行内多余空格合并
pub fn plain_text(text: &str) -> String {
    let t = ANNOTATION_REGEX["inline_entity"].replace_all(text, "$name");
    let t = ANNOTATION_REGEX["bracket"].replace_all(&t, "");
    t.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// 取出文本中的自由注释内容(排除保留关键字开头的标注)
pub fn extract_notes(text: &str) -> Vec<String> {
    ANNOTATION_REGEX["bracket"]
        .captures_iter(text)
        .filter_map(|caps| {
            let body = caps["body"].trim();
            if body.is_empty() || BreakdownConstants::is_reserved(body) {
                None
            } else {
                Some(body.to_string())
            }
        })
        .collect()
}

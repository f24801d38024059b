use crate::models::{ParseLineError, VfxTag};
use crate::utils::LINE_REGEX;

/// 单行的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// `!` 开头的强制动作行，`text` 已去掉一个 `!`
    ForcedAction { text: String },
    SceneHeading { text: String, number: Option<String> },
    Transition { text: String },
    /// `<` 开头的居中文本
    Centered { text: String },
    Flashback { text: String, number: Option<String> },
    /// `===` 分页线，带页码时直接指定页码
    PageBreak { page: Option<u32> },
    Blank,
    Parenthetical { text: String },
    Character {
        name: String,
        extension: Option<String>,
        dual: bool,
        /// 以 `@` 强制为角色
        forced: bool,
    },
    /// 默认: 普通文本(动作或对白内容)
    Text,
}

impl LineKind {
    pub fn name(&self) -> &'static str {
        match self {
            LineKind::ForcedAction { .. } => "forced-action",
            LineKind::SceneHeading { .. } => "scene-heading",
            LineKind::Transition { .. } => "transition",
            LineKind::Centered { .. } => "centered",
            LineKind::Flashback { .. } => "flashback",
            LineKind::PageBreak { .. } => "page-break",
            LineKind::Blank => "blank",
            LineKind::Parenthetical { .. } => "parenthetical",
            LineKind::Character { .. } => "character",
            LineKind::Text => "text",
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, LineKind::Blank)
    }

    /// 强制角色行 `@Name`
    pub fn is_forced_character(&self) -> bool {
        matches!(self, LineKind::Character { forced: true, .. })
    }

    /// 独立成token的结构行，任何块都要在它前面结束
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            LineKind::PageBreak { .. }
                | LineKind::SceneHeading { .. }
                | LineKind::Transition { .. }
                | LineKind::Centered { .. }
                | LineKind::Flashback { .. }
        )
    }

    /// 会结束对白块的行
    pub fn breaks_dialogue(&self) -> bool {
        self.is_structural()
            || self.is_forced_character()
            || matches!(self, LineKind::ForcedAction { .. })
    }

    /// 会结束动作块的行(角色缩进跳变另行判断)
    pub fn breaks_action(&self) -> bool {
        self.is_structural() || self.is_forced_character()
    }
}

/// 分类后的行，附带缩进和本行的VFX标注
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// 行号(从0开始)
    pub line_no: usize,
    pub indent: usize,
    /// 去掉首尾空白的行文本
    pub text: String,
    pub kind: LineKind,
    pub vfx: Option<VfxTag>,
}

impl ClassifiedLine {
    pub fn new(line_no: usize, indent: usize, text: &str, kind: LineKind) -> Self {
        ClassifiedLine {
            line_no,
            indent,
            text: text.trim().to_string(),
            kind,
            vfx: None,
        }
    }

    pub fn with_vfx(mut self, vfx: Option<VfxTag>) -> Self {
        self.vfx = vfx;
        self
    }
}

fn scene_number(caps: &regex::Captures) -> Option<String> {
    caps.name("trail")
        .or_else(|| caps.name("lead"))
        .map(|m| m.as_str().to_string())
}

/// 按固定优先级分类一行文本
///
/// 强制动作 > 场景标题 > 转场 > 居中 > 闪回 > 分页 > 空行 > 括号注释 > 角色 > 普通文本
pub fn classify(line_no: usize, line: &str) -> Result<LineKind, ParseLineError> {
    if let Some(caps) = LINE_REGEX["forced_action"].captures(line) {
        return Ok(LineKind::ForcedAction {
            text: caps["text"].trim().to_string(),
        });
    }

    if let Some(caps) = LINE_REGEX["scene_heading"].captures(line) {
        let text = caps
            .name("forced")
            .or_else(|| caps.name("text"))
            .map_or("", |m| m.as_str())
            .trim()
            .to_string();
        return Ok(LineKind::SceneHeading {
            text,
            number: scene_number(&caps),
        });
    }

    if let Some(caps) = LINE_REGEX["transition"].captures(line) {
        return Ok(LineKind::Transition {
            text: caps["text"].trim().to_string(),
        });
    }

    if let Some(caps) = LINE_REGEX["centered"].captures(line) {
        return Ok(LineKind::Centered {
            text: caps["text"].to_string(),
        });
    }

    if let Some(caps) = LINE_REGEX["flashback"].captures(line) {
        return Ok(LineKind::Flashback {
            text: caps["text"].trim().to_string(),
            number: scene_number(&caps),
        });
    }

    if let Some(caps) = LINE_REGEX["page_break"].captures(line) {
        let page = match caps.name("page") {
            Some(value) => Some(value.as_str().parse::<u32>().map_err(|_| {
                ParseLineError::InvalidPageNumber {
                    line: line_no,
                    value: value.as_str().to_string(),
                }
            })?),
            None => None,
        };
        return Ok(LineKind::PageBreak { page });
    }

    if LINE_REGEX["blank"].is_match(line) {
        return Ok(LineKind::Blank);
    }

    if let Some(caps) = LINE_REGEX["parenthetical"].captures(line) {
        return Ok(LineKind::Parenthetical {
            text: caps["text"].to_string(),
        });
    }

    if let Some(caps) = LINE_REGEX["character"].captures(line) {
        let forced = caps.name("forced").is_some();
        let name = caps
            .name("forced")
            .or_else(|| caps.name("name"))
            .map_or("", |m| m.as_str())
            .trim()
            .to_string();
        if !name.is_empty() {
            return Ok(LineKind::Character {
                name,
                extension: caps.name("ext").map(|m| m.as_str().trim().to_string()),
                dual: caps.name("dual").is_some(),
                forced,
            });
        }
    }

    Ok(LineKind::Text)
}

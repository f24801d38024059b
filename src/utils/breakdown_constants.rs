use std::collections::HashMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use crate::models::vfx::{VfxLevel, VfxTag};

pub struct BreakdownConstants;

impl BreakdownConstants {
    /// `[[...]]` 中保留的关键字，不作为自由注释处理
    pub fn reserved_keywords() -> [&'static str; 5] {
        ["vfx", "char", "prop", "env", "fx"]
    }

    /// 判断 `[[...]]` 的内容是否以保留关键字开头
    pub fn is_reserved(body: &str) -> bool {
        let first = body.split_whitespace().next().unwrap_or("").to_lowercase();
        Self::reserved_keywords().contains(&first.as_str())
    }

    /// 缩进跳变的默认阈值(列)
    pub const INDENT_JUMP_THRESHOLD: usize = 4;
    /// 制表符折算的列数
    pub const TAB_WIDTH: usize = 4;
}

lazy_static! {
    // 行级分类正则
    pub static ref LINE_REGEX: HashMap<&'static str, Regex> = {
        let mut map = HashMap::new();
        map.insert("forced_action", Regex::new(r"^\s*!(?P<text>.*)$").unwrap());
        map.insert("scene_heading", Regex::new(r"^\s*(?:#(?P<lead>[^#\s]+)#\s*)?(?:\.(?P<forced>[^.\s].*?)|(?P<prefix>INT\.?/EXT|I\.?/E|I-E|INT|EXT|EST)[.\s]\s*(?P<text>.*?))\s*(?:#(?P<trail>[^#\s]+)#)?\s*$").unwrap());
        map.insert("transition", Regex::new(r"^\s*(?P<text>[\p{Lu}\d .'\-]*TO:|FADE (?:IN|OUT)[.:]?|FADE TO BLACK[.:]?|CUT TO BLACK[.:]?|(?:\p{Lu}+ )*CUT:|DISSOLVE:)\s*$").unwrap());
        map.insert("centered", Regex::new(r"^\s*<\s*(?P<text>.+?)\s*$").unwrap());
        map.insert("flashback", Regex::new(r"^\s*(?:#(?P<lead>[^#\s]+)#\s*)?(?P<text>(?:FLASHBACK|CURRENT DAY|HOME VIDEO)\b.*?)\s*(?:#(?P<trail>[^#\s]+)#)?\s*$").unwrap());
        map.insert("page_break", Regex::new(r"^\s*={3,}\s*(?P<page>\S+)?\s*$").unwrap());
        map.insert("blank", Regex::new(r"^\s*$").unwrap());
        map.insert("parenthetical", Regex::new(r"^\s*(?P<text>\(.+\)|（.+）)\s*$").unwrap());
        map.insert("character", Regex::new(r"^\s*(?:@(?P<forced>[^\r\n(（^]+?)|(?P<name>\p{Lu}[^\p{Ll}\r\n@(（^]*?))\s*(?P<ext>\(.*\)|（.*）)?\s*(?P<dual>\^)?\s*$").unwrap());
        map
    };

    // 行内标注正则
    pub static ref ANNOTATION_REGEX: HashMap<&'static str, Regex> = {
        let mut map = HashMap::new();
        // **Name**[[type]]
        map.insert("inline_entity", Regex::new(r"\*\*(?P<name>[^*\[\]\n]+?)\*\*\[\[(?P<kind>char|prop|env|fx)\]\]").unwrap());
        // [[type Name1, Name2]]
        map.insert("declaration", Regex::new(r"\[\[(?P<kind>char|prop|env|fx)\s+(?P<names>[^\[\]\n]+)\]\]").unwrap());
        // 任意 [[...]]
        map.insert("bracket", Regex::new(r"\[\[(?P<body>[^\[\]\n]*)\]\]").unwrap());
        // 行内片段切分: 实体标记或 [[...]]
        map.insert("span", Regex::new(r"\*\*(?P<name>[^*\[\]\n]+?)\*\*\[\[(?P<kind>char|prop|env|fx)\]\]|\[\[(?P<body>[^\[\]\n]*)\]\]").unwrap());
        map
    };

    // 排版归一化正则
    pub static ref TYPOGRAPHY_REGEX: HashMap<&'static str, Regex> = {
        let mut map = HashMap::new();
        map.insert("line_end", Regex::new(r"\r\n?").unwrap());
        map.insert("smart_single", Regex::new(r"[‘’‚‛′]").unwrap());
        map.insert("smart_double", Regex::new(r"[“”„‟″]").unwrap());
        map.insert("dash", Regex::new(r"[—–―]").unwrap());
        map.insert("nbsp", Regex::new(r"\u{a0}").unwrap());
        map.insert("trailing_ws", Regex::new(r"(?m)[ \t]+$").unwrap());
        map.insert("blank_run", Regex::new(r"\n{3,}").unwrap());
        map
    };
}

/// 依赖VFX难度配置的匹配器
///
/// 难度集合由调用方注入，VFX标注正则在构造时按配置生成
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    levels: Vec<VfxLevel>,
    vfx: Regex,
}

impl PatternLibrary {
    pub fn new(levels: &[VfxLevel]) -> Self {
        let alternatives = if levels.is_empty() {
            // 没有配置任何难度时，不匹配任何标注
            r"\b\B".to_string()
        } else {
            levels
                .iter()
                .map(|l| regex::escape(&l.id))
                .collect::<Vec<_>>()
                .join("|")
        };
        let vfx = Regex::new(&format!(
            r"(?P<gap>[ \t]*)\[\[\s*(?i:vfx)\s+(?:(?P<shot>\d+[A-Za-z]*)\s+)?(?P<level>(?i:{}))\s*\]\]",
            alternatives
        ))
        .unwrap_or_else(|_| Regex::new(r"\b\B").unwrap());
        PatternLibrary {
            levels: levels.to_vec(),
            vfx,
        }
    }

    pub fn levels(&self) -> &[VfxLevel] {
        &self.levels
    }

    /// 按id查找难度的显示名称
    pub fn level_label(&self, id: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|l| l.id.eq_ignore_ascii_case(id))
            .map(|l| l.label.as_str())
    }

    /// 提取并去除行内所有合法的VFX标注，按出现顺序返回
    pub fn extract_vfx(&self, line: &str) -> (String, Vec<VfxTag>) {
        let mut tags = Vec::new();
        for caps in self.vfx.captures_iter(line) {
            let level = caps["level"].to_lowercase();
            let tag = match caps.name("shot") {
                Some(shot) => VfxTag::with_shot(shot.as_str(), &level),
                None => VfxTag::new(&level),
            };
            tags.push(tag);
        }
        if tags.is_empty() {
            return (line.to_string(), tags);
        }
        // 标注前的空白随标注一起去掉，行首缩进保留
        let stripped = self.vfx.replace_all(line, |caps: &Captures| {
            let at_line_start = caps.get(0).map_or(false, |m| m.start() == 0);
            if at_line_start {
                caps["gap"].to_string()
            } else {
                String::new()
            }
        });
        (stripped.trim_end().to_string(), tags)
    }

    pub fn is_scene_heading(&self, line: &str) -> bool {
        LINE_REGEX["scene_heading"].is_match(line)
    }

    pub fn is_transition(&self, line: &str) -> bool {
        LINE_REGEX["transition"].is_match(line)
    }

    pub fn is_flashback(&self, line: &str) -> bool {
        LINE_REGEX["flashback"].is_match(line)
    }

    pub fn is_page_break(&self, line: &str) -> bool {
        LINE_REGEX["page_break"].is_match(line)
    }

    pub fn is_character(&self, line: &str) -> bool {
        LINE_REGEX["character"].is_match(line)
    }
}

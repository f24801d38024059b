use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::models::entity::EntityKind;
use crate::utils::{BreakdownConstants, ANNOTATION_REGEX};

/// 块元素携带的属性名
pub mod attr {
    pub const SCENE: &str = "data-scene";
    pub const PAGE: &str = "data-page";
    pub const COLLAPSED: &str = "data-collapsed";
    pub const VFX: &str = "data-vfx";
    pub const SHOT: &str = "data-shot";
    pub const CHARACTER: &str = "data-character";
    pub const DUAL: &str = "data-dual";
}

/// 块元素的语义类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockClass {
    SceneHeading,
    Action,
    Character,
    Parenthetical,
    Dialogue,
    Transition,
    Flashback,
    PageBreak,
    Centered,
    /// 隔开两个相邻的同类文本块
    Separator,
}

impl BlockClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockClass::SceneHeading => "scene-heading",
            BlockClass::Action => "action",
            BlockClass::Character => "character",
            BlockClass::Parenthetical => "parenthetical",
            BlockClass::Dialogue => "dialogue",
            BlockClass::Transition => "transition",
            BlockClass::Flashback => "flashback",
            BlockClass::PageBreak => "page-break",
            BlockClass::Centered => "centered",
            BlockClass::Separator => "separator",
        }
    }
}

/// 属性值: 字符串或布尔
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Str(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

/// 行内片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Span {
    Text { text: String },
    Entity {
        #[serde(rename = "type")]
        entity: EntityKind,
        text: String,
    },
    Note { text: String },
}

impl Span {
    pub fn text(text: &str) -> Self {
        Span::Text { text: text.to_string() }
    }

    /// 渲染回标注语法
    pub fn to_markup(&self) -> String {
        match self {
            Span::Text { text } => text.clone(),
            Span::Entity { entity, text } => format!("**{}**[[{}]]", text, entity),
            Span::Note { text } => format!("[[{}]]", text),
        }
    }
}

/// 把一行文本切成片段；与 `Span::to_markup` 互逆
pub fn parse_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    let mut pending = String::new();

    for caps in ANNOTATION_REGEX["span"].captures_iter(line) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        pending.push_str(&line[last..whole.start()]);
        last = whole.end();

        let span = if let (Some(name), Some(kind)) = (caps.name("name"), caps.name("kind")) {
            kind.as_str().parse::<EntityKind>().ok().map(|entity| Span::Entity {
                entity,
                text: name.as_str().to_string(),
            })
        } else {
            caps.name("body")
                .filter(|body| !BreakdownConstants::is_reserved(body.as_str()))
                .map(|body| Span::Note { text: body.as_str().to_string() })
        };

        match span {
            Some(span) => {
                if !pending.is_empty() {
                    spans.push(Span::Text { text: std::mem::take(&mut pending) });
                }
                spans.push(span);
            }
            // 保留关键字的标注留在文本里
            None => pending.push_str(whole.as_str()),
        }
    }
    pending.push_str(&line[last..]);
    if !pending.is_empty() {
        spans.push(Span::Text { text: pending });
    }
    spans
}

/// 文档中的一个块元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub class: BlockClass,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl Block {
    pub fn new(class: BlockClass) -> Self {
        Block {
            class,
            attrs: BTreeMap::new(),
            spans: Vec::new(),
        }
    }

    pub fn with_line(class: BlockClass, line: &str) -> Self {
        Block {
            class,
            attrs: BTreeMap::new(),
            spans: parse_spans(line),
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_string(), AttrValue::Str(value.to_string()));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.attrs.insert(key.to_string(), AttrValue::Bool(value));
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.attrs.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// 片段拼回原始文本
    pub fn markup(&self) -> String {
        self.spans.iter().map(Span::to_markup).collect()
    }

    // 转换为HTML格式(用于预览)
    pub fn to_html(&self) -> String {
        let mut attrs = String::new();
        for (key, value) in &self.attrs {
            match value {
                AttrValue::Bool(true) => attrs.push_str(&format!(" {}", key)),
                AttrValue::Bool(false) => {}
                AttrValue::Str(s) => attrs.push_str(&format!(" {}=\"{}\"", key, escape_html(s))),
            }
        }
        let mut inner = String::new();
        for span in &self.spans {
            match span {
                Span::Text { text } => inner.push_str(&escape_html(text)),
                Span::Entity { entity, text } => inner.push_str(&format!(
                    "<span class=\"entity\" data-type=\"{}\">{}</span>",
                    entity,
                    escape_html(text)
                )),
                Span::Note { text } => inner.push_str(&format!(
                    "<span class=\"note\">{}</span>",
                    escape_html(text)
                )),
            }
        }
        match self.class {
            BlockClass::PageBreak | BlockClass::Separator => {
                format!("<hr class=\"{}\"{}>", self.class.as_str(), attrs)
            }
            _ => format!("<p class=\"{}\"{}>{}</p>", self.class.as_str(), attrs, inner),
        }
    }
}

/// 实体声明(文档头部)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

/// 编辑器使用的块文档
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub declarations: Vec<EntityDecl>,
    pub blocks: Vec<Block>,
}

impl Document {
    // 生成HTML输出
    pub fn to_html(&self) -> String {
        let mut buffer = String::new();
        for block in &self.blocks {
            buffer.push_str(&block.to_html());
            buffer.push('\n');
        }
        buffer
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

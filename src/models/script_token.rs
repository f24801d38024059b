use serde::{Deserialize, Serialize};
use crate::models::vfx::VfxTag;
use crate::utils::plain_text;

fn is_false(value: &bool) -> bool {
    !*value
}

/// 剧本解析后的最小结构单元
///
/// 每种类型只携带自己合法的字段；序列化后 `type` 字段为 kebab-case 的类型名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ScriptToken {
    #[serde(rename_all = "camelCase")]
    SceneHeading {
        text: String,
        scene_num: String,
        page_num: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vfx: Option<VfxTag>,
        /// 编辑器中场景是否折叠
        #[serde(default, skip_serializing_if = "is_false")]
        collapsed: bool,
    },
    Action {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vfx: Option<VfxTag>,
    },
    Character {
        text: String,
        character: String,
        dual: bool,
    },
    Parenthetical {
        text: String,
    },
    Dialogue {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vfx: Option<VfxTag>,
    },
    DialogueBegin,
    DialogueEnd,
    Transition {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Flashback {
        text: String,
        scene_num: String,
        page_num: u32,
    },
    #[serde(rename_all = "camelCase")]
    PageBreak {
        page_num: u32,
    },
    Centered {
        text: String,
    },
}

impl ScriptToken {
    pub fn action(text: &str) -> Self {
        ScriptToken::Action {
            text: text.to_string(),
            vfx: None,
        }
    }

    pub fn dialogue(text: &str) -> Self {
        ScriptToken::Dialogue {
            text: text.to_string(),
            vfx: None,
        }
    }

    pub fn scene_heading(text: &str, scene_num: &str, page_num: u32) -> Self {
        ScriptToken::SceneHeading {
            text: text.to_string(),
            scene_num: scene_num.to_string(),
            page_num,
            vfx: None,
            collapsed: false,
        }
    }

    pub fn character(text: &str, character: &str, dual: bool) -> Self {
        ScriptToken::Character {
            text: text.to_string(),
            character: character.to_string(),
            dual,
        }
    }

    /// token类型名，与序列化的 `type` 字段一致
    pub fn token_type(&self) -> &'static str {
        match self {
            ScriptToken::SceneHeading { .. } => "scene-heading",
            ScriptToken::Action { .. } => "action",
            ScriptToken::Character { .. } => "character",
            ScriptToken::Parenthetical { .. } => "parenthetical",
            ScriptToken::Dialogue { .. } => "dialogue",
            ScriptToken::DialogueBegin => "dialogue-begin",
            ScriptToken::DialogueEnd => "dialogue-end",
            ScriptToken::Transition { .. } => "transition",
            ScriptToken::Flashback { .. } => "flashback",
            ScriptToken::PageBreak { .. } => "page-break",
            ScriptToken::Centered { .. } => "centered",
        }
    }

    // 检查token类型是否匹配
    pub fn is_type(&self, types: &[&str]) -> bool {
        types.contains(&self.token_type())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ScriptToken::SceneHeading { text, .. }
            | ScriptToken::Action { text, .. }
            | ScriptToken::Character { text, .. }
            | ScriptToken::Parenthetical { text }
            | ScriptToken::Dialogue { text, .. }
            | ScriptToken::Transition { text }
            | ScriptToken::Flashback { text, .. }
            | ScriptToken::Centered { text } => Some(text),
            ScriptToken::DialogueBegin | ScriptToken::DialogueEnd | ScriptToken::PageBreak { .. } => None,
        }
    }

    pub fn vfx(&self) -> Option<&VfxTag> {
        match self {
            ScriptToken::SceneHeading { vfx, .. }
            | ScriptToken::Action { vfx, .. }
            | ScriptToken::Dialogue { vfx, .. } => vfx.as_ref(),
            _ => None,
        }
    }

    pub fn scene_num(&self) -> Option<&str> {
        match self {
            ScriptToken::SceneHeading { scene_num, .. } | ScriptToken::Flashback { scene_num, .. } => {
                Some(scene_num)
            }
            _ => None,
        }
    }

    pub fn page_num(&self) -> Option<u32> {
        match self {
            ScriptToken::SceneHeading { page_num, .. }
            | ScriptToken::Flashback { page_num, .. }
            | ScriptToken::PageBreak { page_num } => Some(*page_num),
            _ => None,
        }
    }

    /// 是否开始一个新场景
    pub fn is_scene_start(&self) -> bool {
        matches!(self, ScriptToken::SceneHeading { .. } | ScriptToken::Flashback { .. })
    }

    // 获取清理后的文本(去除实体标记和注解)
    pub fn clean_text(&self) -> String {
        self.text().map(plain_text).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kebab_type_and_camel_fields() {
        let token = ScriptToken::scene_heading("HOUSE - DAY", "1", 1);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["type"], "scene-heading");
        assert_eq!(json["sceneNum"], "1");
        assert_eq!(json["pageNum"], 1);
        assert!(json.get("vfx").is_none());
        assert!(json.get("collapsed").is_none());

        let begin = serde_json::to_value(&ScriptToken::DialogueBegin).unwrap();
        assert_eq!(begin, serde_json::json!({"type": "dialogue-begin"}));
    }

    #[test]
    fn deserializes_vfx_string() {
        let token: ScriptToken =
            serde_json::from_str(r#"{"type":"action","text":"Boom.","vfx":"3 hard"}"#).unwrap();
        assert_eq!(token.vfx(), Some(&VfxTag::with_shot("3", "hard")));
    }

    #[test]
    fn clean_text_drops_markup() {
        let token = ScriptToken::action("**Rex**[[char]] grabs the gun [[check prop]]");
        assert_eq!(token.clean_text(), "Rex grabs the gun");
    }
}

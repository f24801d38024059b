use serde::{Deserialize, Serialize};
use std::fmt;

/// 可配置的VFX难度等级
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfxLevel {
    /// 标注中使用的id，如 `hard`
    pub id: String,
    /// 导出表头等处显示的名称
    pub label: String,
}

impl VfxLevel {
    pub fn new(id: &str, label: &str) -> Self {
        VfxLevel {
            id: id.to_lowercase(),
            label: label.to_string(),
        }
    }

    /// 默认的四级难度
    pub fn defaults() -> Vec<VfxLevel> {
        vec![
            VfxLevel::new("easy", "Easy"),
            VfxLevel::new("mid", "Mid"),
            VfxLevel::new("hard", "Hard"),
            VfxLevel::new("epic", "Epic"),
        ]
    }
}

/// 附着在token上的VFX标注: 难度等级，可带镜头编号
///
/// 序列化形式与标注文本一致: `hard` 或 `3 hard`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VfxTag {
    pub shot: Option<String>,
    pub level: String,
}

impl VfxTag {
    pub fn new(level: &str) -> Self {
        VfxTag {
            shot: None,
            level: level.to_lowercase(),
        }
    }

    pub fn with_shot(shot: &str, level: &str) -> Self {
        VfxTag {
            shot: Some(shot.to_string()),
            level: level.to_lowercase(),
        }
    }

    /// 合并同一块内后出现的标注
    ///
    /// 带镜头编号的标注优先; 只有难度的标注只更新难度，保留已有的镜头编号
    pub fn merge(current: Option<VfxTag>, incoming: VfxTag) -> VfxTag {
        match current {
            Some(current) if incoming.shot.is_none() => VfxTag {
                shot: current.shot,
                level: incoming.level,
            },
            _ => incoming,
        }
    }

    /// 渲染回原始标注语法 `[[vfx 3 hard]]`
    pub fn to_annotation(&self) -> String {
        format!("[[vfx {}]]", self)
    }
}

impl fmt::Display for VfxTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shot {
            Some(shot) => write!(f, "{} {}", shot, self.level),
            None => write!(f, "{}", self.level),
        }
    }
}

impl TryFrom<String> for VfxTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = value.split_whitespace().collect();
        match parts.as_slice() {
            [level] => Ok(VfxTag::new(level)),
            [shot, level] => Ok(VfxTag::with_shot(shot, level)),
            _ => Err(format!("无效的VFX标注: {}", value)),
        }
    }
}

impl From<VfxTag> for String {
    fn from(tag: VfxTag) -> Self {
        tag.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shot_numbered_annotation_wins() {
        let merged = VfxTag::merge(Some(VfxTag::new("easy")), VfxTag::with_shot("3", "hard"));
        assert_eq!(merged.to_string(), "3 hard");
    }

    #[test]
    fn bare_level_keeps_existing_shot() {
        let merged = VfxTag::merge(Some(VfxTag::with_shot("3", "easy")), VfxTag::new("mid"));
        assert_eq!(merged.to_string(), "3 mid");
    }

    #[test]
    fn later_shot_replaces_earlier_shot() {
        let merged = VfxTag::merge(Some(VfxTag::with_shot("3", "easy")), VfxTag::with_shot("4", "epic"));
        assert_eq!(merged, VfxTag::with_shot("4", "epic"));
    }

    #[test]
    fn serializes_as_annotation_text() {
        let json = serde_json::to_string(&VfxTag::with_shot("12A", "Hard")).unwrap();
        assert_eq!(json, "\"12A hard\"");
        let back: VfxTag = serde_json::from_str("\"mid\"").unwrap();
        assert_eq!(back, VfxTag::new("mid"));
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::models::script_token::ScriptToken;
use crate::utils::breakdown_constants::ANNOTATION_REGEX;

/// 实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Char,
    Prop,
    Env,
    Fx,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [EntityKind::Char, EntityKind::Prop, EntityKind::Env, EntityKind::Fx];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Char => "char",
            EntityKind::Prop => "prop",
            EntityKind::Env => "env",
            EntityKind::Fx => "fx",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "char" => Ok(EntityKind::Char),
            "prop" => Ok(EntityKind::Prop),
            "env" => Ok(EntityKind::Env),
            "fx" => Ok(EntityKind::Fx),
            other => Err(format!("未知的实体类别: {}", other)),
        }
    }
}

/// 剧本中出现的角色/道具/场景/特效
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// 首次出现时的显示名称
    pub name: String,
    pub count: usize,
}

/// 实体的归一化键: 去除首尾空白并大写
pub fn entity_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// 实体表，每次完整解析时重建
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRegistry {
    entities: BTreeMap<String, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记实体；已存在时保留最初的类别和名称，返回是否新建
    pub fn define(&mut self, name: &str, kind: EntityKind) -> bool {
        let key = entity_key(name);
        if key.is_empty() || self.entities.contains_key(&key) {
            return false;
        }
        self.entities.insert(
            key,
            Entity {
                kind,
                name: name.trim().to_string(),
                count: 0,
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(&entity_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(&entity_key(name))
    }

    /// 计数只增不减
    pub fn increment(&mut self, key: &str, n: usize) {
        if let Some(entity) = self.entities.get_mut(key) {
            entity.count += n;
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 按键排序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entity)> {
        self.entities.iter()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.kind == kind)
    }

    /// 基于当前实体表构造提及计数器
    pub fn matcher(&self) -> MentionMatcher {
        let patterns = self
            .entities
            .iter()
            .filter_map(|(key, entity)| {
                whole_word_regex(&entity.name).map(|re| (key.clone(), re))
            })
            .collect();
        MentionMatcher { patterns }
    }

    /// 统计整份token列表中的提及次数并累加到计数上
    pub fn tally(&mut self, tokens: &[ScriptToken]) {
        let matcher = self.matcher();
        for token in tokens {
            for (key, n) in matcher.count_in(token) {
                self.increment(&key, n);
            }
        }
    }
}

fn whole_word_regex(name: &str) -> Option<Regex> {
    let name = name.trim();
    let first = name.chars().next()?;
    let last = name.chars().last()?;
    let prefix = if first.is_alphanumeric() { r"\b" } else { "" };
    let suffix = if last.is_alphanumeric() { r"\b" } else { "" };
    Regex::new(&format!("(?i){}{}{}", prefix, regex::escape(name), suffix)).ok()
}

/// 实体提及计数器
///
/// 解析器的计数和导出时的场景统计共用同一套规则:
/// 角色提示行 +1，内联实体标记 +1，其余文本按整词(不区分大小写)匹配计数
pub struct MentionMatcher {
    patterns: Vec<(String, Regex)>,
}

impl MentionMatcher {
    pub fn count_in(&self, token: &ScriptToken) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        match token {
            ScriptToken::Character { character, .. } => {
                let key = entity_key(character);
                if self.patterns.iter().any(|(k, _)| *k == key) {
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
            ScriptToken::Action { text, .. }
            | ScriptToken::Dialogue { text, .. }
            | ScriptToken::Parenthetical { text } => {
                let mut rest = String::with_capacity(text.len());
                let mut last = 0;
                for caps in ANNOTATION_REGEX["inline_entity"].captures_iter(text) {
                    let whole = caps.get(0).map_or(0..0, |m| m.range());
                    let key = entity_key(&caps["name"]);
                    if self.patterns.iter().any(|(k, _)| *k == key) {
                        *counts.entry(key).or_insert(0) += 1;
                    }
                    rest.push_str(&text[last..whole.start]);
                    rest.push(' ');
                    last = whole.end;
                }
                rest.push_str(&text[last..]);
                let rest = ANNOTATION_REGEX["bracket"].replace_all(&rest, " ");

                for (key, re) in &self.patterns {
                    let n = re.find_iter(&rest).count();
                    if n > 0 {
                        *counts.entry(key.clone()).or_insert(0) += n;
                    }
                }
            }
            _ => {}
        }
        counts
    }
}

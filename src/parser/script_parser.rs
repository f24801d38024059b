use std::collections::HashSet;
use std::time::Instant;
use serde::Serialize;
use tracing::{debug, warn};
use crate::models::{
    BreakdownError,
    BreakdownResult,
    Conf,
    EntityKind,
    EntityRegistry,
    ParseLineError,
    ScriptToken,
};
use crate::parser::annotations::extract_annotations;
use crate::parser::line_classifier::{classify, ClassifiedLine, LineKind};
use crate::parser::state_machine::{transition, BlockState, Emit, IndentTracker};
use crate::utils::{normalize_script, PatternLibrary};

/// 解析结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutput {
    pub tokens: Vec<ScriptToken>,
    pub entities: EntityRegistry,
    /// 被跳过的行
    pub line_errors: Vec<ParseLineError>,
    /// 解析耗时(毫秒)
    pub parse_time: u64,
}

/// 场景编号分配
///
/// 显式编号 `#n#` 原样使用；自动编号取上一个编号的数字部分加一，
/// 该编号已被占用(包括文档后面出现的显式编号)时改为在上一个编号后加字母后缀
#[derive(Debug, Clone, Default)]
pub struct SceneNumbering {
    previous: String,
    taken: HashSet<String>,
}

impl SceneNumbering {
    pub fn new(explicit: HashSet<String>) -> Self {
        SceneNumbering {
            previous: "0".to_string(),
            taken: explicit,
        }
    }

    pub fn assign(&mut self, explicit: Option<&str>) -> String {
        let number = match explicit {
            Some(number) => number.to_string(),
            None => self.next_free(),
        };
        self.taken.insert(number.clone());
        self.previous = number.clone();
        number
    }

    fn next_free(&self) -> String {
        let digits: String = self.previous.chars().take_while(|c| c.is_ascii_digit()).collect();
        let base = digits.parse::<u64>().unwrap_or(0);

        let candidate = (base + 1).to_string();
        if !self.taken.contains(&candidate) {
            return candidate;
        }
        for suffix in 'A'..='Z' {
            let candidate = format!("{}{}", base, suffix);
            if !self.taken.contains(&candidate) {
                return candidate;
            }
        }
        // 字母用完后继续向后找空闲数字
        let mut next = base + 2;
        while self.taken.contains(&next.to_string()) {
            next += 1;
        }
        next.to_string()
    }
}

/// 剧本文本解析器
#[derive(Debug, Clone)]
pub struct ScriptParser {
    patterns: PatternLibrary,
    indent_threshold: usize,
}

impl ScriptParser {
    pub fn new(conf: &Conf) -> Self {
        ScriptParser {
            patterns: PatternLibrary::new(&conf.vfx_levels),
            indent_threshold: conf.indent_jump_threshold,
        }
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    /// 预先扫描全文的显式场景编号
    fn explicit_scene_numbers(&self, lines: &[&str]) -> HashSet<String> {
        let mut numbers = HashSet::new();
        for (line_no, raw) in lines.iter().enumerate() {
            let (text, _) = self.patterns.extract_vfx(raw);
            match classify(line_no, &text) {
                Ok(LineKind::SceneHeading { number: Some(n), .. })
                | Ok(LineKind::Flashback { number: Some(n), .. }) => {
                    numbers.insert(n);
                }
                _ => {}
            }
        }
        numbers
    }

    /// 解析剧本文本
    ///
    /// 单行错误会被记录并跳过，不会中断整体解析；只有空输入会直接返回错误
    pub fn parse(&self, script: &str) -> BreakdownResult<ParseOutput> {
        if script.trim().is_empty() {
            return Err(BreakdownError::InvalidInput("剧本内容为空".to_string()));
        }
        let start = Instant::now();

        let normalized = normalize_script(script);
        let lines: Vec<&str> = normalized.lines().collect();
        let mut numbering = SceneNumbering::new(self.explicit_scene_numbers(&lines));

        let mut output = ParseOutput::default();
        let mut registry = EntityRegistry::new();
        let mut tracker = IndentTracker::new(self.indent_threshold);
        let mut state = BlockState::Idle;
        let mut page: u32 = 1;

        for (line_no, raw) in lines.iter().enumerate() {
            let annotations = match extract_annotations(line_no, raw, &self.patterns) {
                Ok(annotations) => annotations,
                Err(err) => {
                    warn!("{}，已跳过", err);
                    tracker.observe(raw);
                    output.line_errors.push(err);
                    continue;
                }
            };

            if annotations.annotation_only {
                for (name, kind) in &annotations.declarations {
                    registry.define(name, *kind);
                }
                if let Some(tag) = annotations.vfx {
                    if !state.absorb_vfx(tag) {
                        debug!("第{}行: 块外的VFX标注被忽略", line_no);
                    }
                }
                continue;
            }

            let kind = match classify(line_no, &annotations.text) {
                Ok(kind) => kind,
                Err(err) => {
                    warn!("{}，已跳过", err);
                    tracker.observe(raw);
                    output.line_errors.push(err);
                    continue;
                }
            };

            for (name, entity_kind) in annotations.declarations.iter().chain(annotations.inline.iter()) {
                registry.define(name, *entity_kind);
            }

            let ctx = tracker.observe(&annotations.text);
            let line = ClassifiedLine::new(line_no, ctx.indent, &annotations.text, kind)
                .with_vfx(annotations.vfx);
            let (next, emitted) = transition(state, &line, &ctx);
            state = next;
            for emit in emitted {
                Self::resolve(emit, &mut numbering, &mut page, &mut registry, &mut output.tokens);
            }
        }

        for emit in state.finish() {
            Self::resolve(emit, &mut numbering, &mut page, &mut registry, &mut output.tokens);
        }

        registry.tally(&output.tokens);
        output.entities = registry;
        output.parse_time = start.elapsed().as_millis() as u64;
        debug!(
            "解析完成: {}个token, {}个实体, {}行出错",
            output.tokens.len(),
            output.entities.len(),
            output.line_errors.len()
        );
        Ok(output)
    }

    // 分配场景编号和页码，登记角色
    fn resolve(
        emit: Emit,
        numbering: &mut SceneNumbering,
        page: &mut u32,
        registry: &mut EntityRegistry,
        tokens: &mut Vec<ScriptToken>,
    ) {
        let token = match emit {
            Emit::Token(token) => {
                if let ScriptToken::Character { character, .. } = &token {
                    registry.define(character, EntityKind::Char);
                }
                token
            }
            Emit::SceneHeading { text, number, vfx } => ScriptToken::SceneHeading {
                text,
                scene_num: numbering.assign(number.as_deref()),
                page_num: *page,
                vfx,
                collapsed: false,
            },
            Emit::Flashback { text, number } => ScriptToken::Flashback {
                text,
                scene_num: numbering.assign(number.as_deref()),
                page_num: *page,
            },
            Emit::PageBreak { page: explicit } => {
                *page = explicit.unwrap_or(*page + 1);
                ScriptToken::PageBreak { page_num: *page }
            }
        };
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_numbers_skip_explicit_ones() {
        let explicit: HashSet<String> = ["2".to_string()].into_iter().collect();
        let mut numbering = SceneNumbering::new(explicit);
        assert_eq!(numbering.assign(None), "1");
        assert_eq!(numbering.assign(None), "1A");
        assert_eq!(numbering.assign(Some("2")), "2");
        assert_eq!(numbering.assign(None), "3");
    }

    #[test]
    fn suffix_skips_used_letters() {
        let explicit: HashSet<String> = ["6".to_string(), "5A".to_string()].into_iter().collect();
        let mut numbering = SceneNumbering::new(explicit);
        assert_eq!(numbering.assign(Some("5")), "5");
        assert_eq!(numbering.assign(None), "5B");
    }

    #[test]
    fn annotation_only_line_merges_into_block() {
        let parser = ScriptParser::new(&Conf::default());
        let out = parser.parse("He runs.\n[[vfx 2 hard]]\nStill running.\n").unwrap();
        assert_eq!(out.tokens.len(), 1);
        assert_eq!(out.tokens[0].vfx().map(|v| v.to_string()), Some("2 hard".to_string()));
        assert_eq!(out.tokens[0].text(), Some("He runs.\nStill running."));
    }

    #[test]
    fn empty_script_is_invalid_input() {
        let parser = ScriptParser::new(&Conf::default());
        assert!(matches!(parser.parse("  \n\n"), Err(BreakdownError::InvalidInput(_))));
    }
}

use unicode_segmentation::UnicodeSegmentation;
use crate::models::{EntityKind, EntityRegistry, ScriptToken, VfxTag};
use crate::parser::{classify, LineKind};
use crate::utils::plain_text;

/// 各类行的起始列
pub const DIALOGUE_COLUMN: usize = 10;
pub const CHARACTER_COLUMN: usize = 15;
pub const TRANSITION_COLUMN: usize = 45;
/// 居中文本参照的行宽
pub const PAGE_WIDTH: usize = 60;
/// 分页线与页码之间的空格数
const PAGE_RULE_GAP: usize = 30;

fn indent(column: usize, text: &str) -> String {
    format!("{}{}", " ".repeat(column), text)
}

fn annotate(text: &str, vfx: Option<&VfxTag>, clean: bool) -> String {
    match vfx {
        Some(tag) if !clean => format!("{} {}", text, tag.to_annotation()),
        _ => text.to_string(),
    }
}

/// 解析时会被当成普通文本以外的行
fn needs_forced_first_line(line: &str) -> bool {
    !matches!(classify(0, line), Ok(LineKind::Text))
}

/// 动作块后续行中会打断动作块的行
fn needs_forced_continuation(line: &str) -> bool {
    match classify(0, line) {
        Ok(kind) => kind.is_blank() || kind.breaks_action() || matches!(kind, LineKind::ForcedAction { .. }),
        Err(_) => true,
    }
}

fn is_plain_cue(text: &str) -> bool {
    matches!(classify(0, text), Ok(LineKind::Character { forced: false, .. }))
}

struct Writer {
    clean: bool,
    lines: Vec<String>,
    /// 当前对白组是否已有括号注释或对白
    group_has_content: bool,
    /// 上一个对白组为空，下一行必须强制类型
    force_next: bool,
}

impl Writer {
    fn text(&self, text: &str) -> String {
        if self.clean {
            plain_text(text)
        } else {
            text.to_string()
        }
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn header(&mut self, entities: &EntityRegistry) {
        let mut wrote = false;
        for kind in EntityKind::ALL {
            let names: Vec<&str> = entities.of_kind(kind).map(|e| e.name.as_str()).collect();
            if !names.is_empty() {
                self.lines.push(format!("[[{} {}]]", kind, names.join(", ")));
                wrote = true;
            }
        }
        if wrote {
            self.blank();
        }
    }

    fn action(&mut self, text: &str, vfx: Option<&VfxTag>) {
        let force_first = std::mem::take(&mut self.force_next);
        let text = self.text(text);
        for (i, line) in text.split('\n').enumerate() {
            let forced = !self.clean
                && if i == 0 {
                    force_first || needs_forced_first_line(line)
                } else {
                    needs_forced_continuation(line)
                };
            let line = if forced { format!("!{}", line) } else { line.to_string() };
            let line = if i == 0 { annotate(&line, vfx, self.clean) } else { line };
            self.lines.push(line);
        }
        self.blank();
    }

    fn character(&mut self, text: &str, dual: bool) {
        let force = std::mem::take(&mut self.force_next);
        self.group_has_content = false;
        let line = if self.clean {
            plain_text(text).to_uppercase()
        } else {
            let mut cue = if force || !is_plain_cue(text) {
                format!("@{}", text)
            } else {
                text.to_string()
            };
            if dual {
                cue.push_str(" ^");
            }
            cue
        };
        self.lines.push(indent(CHARACTER_COLUMN, &line));
    }

    fn dialogue(&mut self, text: &str, vfx: Option<&VfxTag>) {
        self.group_has_content = true;
        let text = self.text(text);
        let mut annotated = false;
        for line in text.split('\n') {
            if line.trim().is_empty() {
                self.blank();
                continue;
            }
            let line = if annotated {
                line.to_string()
            } else {
                annotated = true;
                annotate(line, vfx, self.clean)
            };
            self.lines.push(indent(DIALOGUE_COLUMN, &line));
        }
    }

    fn write(&mut self, token: &ScriptToken) {
        match token {
            ScriptToken::SceneHeading { text, scene_num, vfx, .. } => {
                let text = self.text(text);
                let line = if self.clean {
                    if scene_num.is_empty() {
                        text
                    } else {
                        format!("{}  {}", scene_num, text)
                    }
                } else {
                    // 文本为空或以 `.` 开头时 `.` 前缀无法识别，改用 INT.
                    let mut line = if text.is_empty() || text.starts_with('.') {
                        format!("INT. {}", text)
                    } else {
                        format!(".{}", text)
                    };
                    if !scene_num.is_empty() {
                        line.push_str(&format!(" #{}#", scene_num));
                    }
                    annotate(&line, vfx.as_ref(), false)
                };
                self.lines.push(line);
                self.blank();
            }
            ScriptToken::Action { text, vfx } => self.action(text, vfx.as_ref()),
            ScriptToken::DialogueBegin => self.group_has_content = false,
            ScriptToken::Character { text, dual, .. } => self.character(text, *dual),
            ScriptToken::Parenthetical { text } => {
                self.group_has_content = true;
                let text = self.text(text);
                self.lines.push(indent(DIALOGUE_COLUMN, &text));
            }
            ScriptToken::Dialogue { text, vfx } => self.dialogue(text, vfx.as_ref()),
            ScriptToken::DialogueEnd => {
                if !self.group_has_content {
                    self.force_next = true;
                }
            }
            ScriptToken::Transition { text } => {
                let text = self.text(text);
                self.lines.push(indent(TRANSITION_COLUMN, &text));
                self.blank();
            }
            ScriptToken::Centered { text } => {
                let text = self.text(text);
                let body = if self.clean { text } else { format!("< {}", text) };
                let width = body.graphemes(true).count();
                let pad = PAGE_WIDTH.saturating_sub(width) / 2;
                self.lines.push(indent(pad, &body));
                self.blank();
            }
            ScriptToken::Flashback { text, scene_num, .. } => {
                let text = self.text(text);
                if self.clean || scene_num.is_empty() {
                    self.lines.push(text);
                } else {
                    self.lines.push(format!("{} #{}#", text, scene_num));
                }
                self.blank();
            }
            ScriptToken::PageBreak { page_num } => {
                self.lines.push(format!("==={}{}", " ".repeat(PAGE_RULE_GAP), page_num));
                self.blank();
            }
        }
        // 结构行会结束对白组，强制标记只对紧随其后的行有效
        if !matches!(token, ScriptToken::DialogueEnd) {
            self.force_next = false;
        }
    }
}

/// token列表写回剧本文本
///
/// 非 clean 模式保留所有标注，并在文件头声明全部实体，可无损重新解析；
/// clean 模式去掉全部标注，用于阅读
pub fn serialize_script(tokens: &[ScriptToken], entities: &EntityRegistry, clean: bool) -> String {
    let mut writer = Writer {
        clean,
        lines: Vec::new(),
        group_has_content: false,
        force_next: false,
    };
    if !clean {
        writer.header(entities);
    }
    for token in tokens {
        writer.write(token);
    }
    let mut output = writer.lines.join("\n");
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_and_annotations() {
        let tokens = vec![
            ScriptToken::SceneHeading {
                text: "HOUSE - DAY".to_string(),
                scene_num: "1".to_string(),
                page_num: 1,
                vfx: Some(VfxTag::new("easy")),
                collapsed: false,
            },
            ScriptToken::DialogueBegin,
            ScriptToken::character("McGee", "McGee", true),
            ScriptToken::Parenthetical { text: "(quietly)".to_string() },
            ScriptToken::Dialogue {
                text: "Hello.\n\nBye.".to_string(),
                vfx: Some(VfxTag::with_shot("2", "hard")),
            },
            ScriptToken::DialogueEnd,
            ScriptToken::PageBreak { page_num: 2 },
        ];
        let text = serialize_script(&tokens, &EntityRegistry::new(), false);
        let expected = [
            ".HOUSE - DAY #1# [[vfx easy]]",
            "",
            "               @McGee ^",
            "          (quietly)",
            "          Hello. [[vfx 2 hard]]",
            "",
            "          Bye.",
            "===                              2",
            "",
            "",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn forces_ambiguous_action_lines() {
        let tokens = vec![ScriptToken::action("BOOM!\nINT. STILL ACTION\nquiet")];
        let text = serialize_script(&tokens, &EntityRegistry::new(), false);
        assert_eq!(text, "!BOOM!\n!INT. STILL ACTION\nquiet\n\n");
    }

    #[test]
    fn empty_group_forces_next_cue() {
        let tokens = vec![
            ScriptToken::DialogueBegin,
            ScriptToken::character("JOHN", "JOHN", false),
            ScriptToken::DialogueEnd,
            ScriptToken::DialogueBegin,
            ScriptToken::character("MARY", "MARY", false),
            ScriptToken::dialogue("Hi."),
            ScriptToken::DialogueEnd,
        ];
        let text = serialize_script(&tokens, &EntityRegistry::new(), true);
        assert!(text.contains("               MARY"));
        let text = serialize_script(&tokens, &EntityRegistry::new(), false);
        assert!(text.contains("               @MARY\n"));
    }

    #[test]
    fn clean_mode_strips_markup() {
        let mut registry = EntityRegistry::new();
        registry.define("Rex", EntityKind::Char);
        let tokens = vec![ScriptToken::Action {
            text: "**Rex**[[char]] jumps. [[wire removal]]".to_string(),
            vfx: Some(VfxTag::new("mid")),
        }];
        assert_eq!(serialize_script(&tokens, &registry, true), "Rex jumps.\n\n");
        assert_eq!(
            serialize_script(&tokens, &registry, false),
            "[[char Rex]]\n\n**Rex**[[char]] jumps. [[wire removal]] [[vfx mid]]\n\n"
        );
    }
}

use crate::models::{ScriptToken, VfxTag};
use crate::parser::line_classifier::{ClassifiedLine, LineKind};
use crate::utils::leading_indent;

/// 缩进跳变方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentJump {
    None,
    Right,
    Left,
}

/// 文档排版: 还没出现过缩进行之前视为全部顶格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    FlushLeft,
    Indented,
}

/// 当前行的缩进上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentContext {
    pub indent: usize,
    pub jump: IndentJump,
    pub layout: Layout,
    pub threshold: usize,
}

/// 跟踪上一非空行的缩进
#[derive(Debug, Clone)]
pub struct IndentTracker {
    threshold: usize,
    previous: Option<usize>,
    layout: Layout,
}

impl IndentTracker {
    pub fn new(threshold: usize) -> Self {
        IndentTracker {
            threshold,
            previous: None,
            layout: Layout::FlushLeft,
        }
    }

    /// 观察一行并推进缩进状态；空行沿用上一行的缩进
    pub fn observe(&mut self, line: &str) -> IndentContext {
        if line.trim().is_empty() {
            return IndentContext {
                indent: self.previous.unwrap_or(0),
                jump: IndentJump::None,
                layout: self.layout,
                threshold: self.threshold,
            };
        }

        let indent = leading_indent(line);
        let jump = match self.previous {
            Some(prev) if indent > prev + self.threshold => IndentJump::Right,
            Some(prev) if prev > indent + self.threshold => IndentJump::Left,
            _ => IndentJump::None,
        };
        let context = IndentContext {
            indent,
            jump,
            layout: self.layout,
            threshold: self.threshold,
        };
        self.previous = Some(indent);
        if indent > self.threshold {
            self.layout = Layout::Indented;
        }
        context
    }
}

/// 状态机输出；结构行的编号由解析器决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    Token(ScriptToken),
    SceneHeading {
        text: String,
        number: Option<String>,
        vfx: Option<VfxTag>,
    },
    Flashback {
        text: String,
        number: Option<String>,
    },
    PageBreak {
        page: Option<u32>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionBlock {
    lines: Vec<String>,
    vfx: Option<VfxTag>,
}

impl ActionBlock {
    fn start(text: &str, vfx: Option<VfxTag>) -> Self {
        ActionBlock {
            lines: vec![text.to_string()],
            vfx,
        }
    }

    fn close(self, emitted: &mut Vec<Emit>) {
        emitted.push(Emit::Token(ScriptToken::Action {
            text: self.lines.join("\n"),
            vfx: self.vfx,
        }));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogueBlock {
    /// 尚未输出的对白行
    pending: Vec<String>,
    /// 整个对白组共用的VFX标注
    vfx: Option<VfxTag>,
    /// 角色行之后是否已经有内容
    has_content: bool,
    last_blank: bool,
}

impl DialogueBlock {
    /// 输出积累的对白行；全是空行时不输出
    fn flush(&mut self, emitted: &mut Vec<Emit>) {
        let has_text = self.has_pending_text();
        let lines = std::mem::take(&mut self.pending);
        if has_text {
            emitted.push(Emit::Token(ScriptToken::Dialogue {
                text: lines.join("\n"),
                vfx: self.vfx.clone(),
            }));
        }
    }

    fn has_pending_text(&self) -> bool {
        self.pending.iter().any(|l| !l.trim().is_empty())
    }

    /// 缩进跳变时是否结束对白组。括号注释之后跳回对白列不算结束
    fn ends_on_jump(&self, line: &ClassifiedLine, ctx: &IndentContext) -> bool {
        if ctx.jump == IndentJump::None {
            return false;
        }
        let cue = matches!(line.kind, LineKind::Character { .. }) && ctx.jump == IndentJump::Right;
        self.has_pending_text() || (self.has_content && (ctx.indent <= ctx.threshold || cue))
    }

    fn close(mut self, emitted: &mut Vec<Emit>) {
        self.flush(emitted);
        emitted.push(Emit::Token(ScriptToken::DialogueEnd));
    }
}

/// 块积累状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BlockState {
    #[default]
    Idle,
    AccumulatingAction(ActionBlock),
    AccumulatingDialogue(DialogueBlock),
}

impl BlockState {
    pub fn name(&self) -> &'static str {
        match self {
            BlockState::Idle => "idle",
            BlockState::AccumulatingAction(_) => "action",
            BlockState::AccumulatingDialogue(_) => "dialogue",
        }
    }

    /// 把单独一行的VFX标注并入当前块
    pub fn absorb_vfx(&mut self, tag: VfxTag) -> bool {
        match self {
            BlockState::AccumulatingAction(block) => {
                block.vfx = Some(VfxTag::merge(block.vfx.take(), tag));
                true
            }
            BlockState::AccumulatingDialogue(block) => {
                block.vfx = Some(VfxTag::merge(block.vfx.take(), tag));
                true
            }
            BlockState::Idle => false,
        }
    }

    /// 输入结束时关闭未完成的块
    pub fn finish(self) -> Vec<Emit> {
        let mut emitted = Vec::new();
        match self {
            BlockState::Idle => {}
            BlockState::AccumulatingAction(block) => block.close(&mut emitted),
            BlockState::AccumulatingDialogue(block) => block.close(&mut emitted),
        }
        emitted
    }
}

enum Step {
    Stay(BlockState),
    /// 当前块已关闭，本行交给空闲状态重新处理
    Reprocess,
}

fn merge_vfx(current: &mut Option<VfxTag>, incoming: &Option<VfxTag>) {
    if let Some(tag) = incoming {
        *current = Some(VfxTag::merge(current.take(), tag.clone()));
    }
}

/// 状态转移: (当前状态, 分类后的行) -> (新状态, 输出)
pub fn transition(
    state: BlockState,
    line: &ClassifiedLine,
    ctx: &IndentContext,
) -> (BlockState, Vec<Emit>) {
    let mut emitted = Vec::new();
    let step = match state {
        BlockState::Idle => Step::Reprocess,
        BlockState::AccumulatingAction(block) => action_step(block, line, ctx, &mut emitted),
        BlockState::AccumulatingDialogue(block) => dialogue_step(block, line, ctx, &mut emitted),
    };
    let next = match step {
        Step::Stay(next) => next,
        Step::Reprocess => idle_step(line, ctx, &mut emitted),
    };
    (next, emitted)
}

fn is_cue(forced: bool, ctx: &IndentContext) -> bool {
    forced
        || ctx.indent > ctx.threshold
        || ctx.jump == IndentJump::Right
        || ctx.layout == Layout::FlushLeft
}

fn idle_step(line: &ClassifiedLine, ctx: &IndentContext, emitted: &mut Vec<Emit>) -> BlockState {
    match &line.kind {
        LineKind::Blank => BlockState::Idle,
        LineKind::ForcedAction { text } => {
            BlockState::AccumulatingAction(ActionBlock::start(text, line.vfx.clone()))
        }
        LineKind::SceneHeading { text, number } => {
            emitted.push(Emit::SceneHeading {
                text: text.clone(),
                number: number.clone(),
                vfx: line.vfx.clone(),
            });
            BlockState::Idle
        }
        LineKind::Flashback { text, number } => {
            emitted.push(Emit::Flashback {
                text: text.clone(),
                number: number.clone(),
            });
            BlockState::Idle
        }
        LineKind::PageBreak { page } => {
            emitted.push(Emit::PageBreak { page: *page });
            BlockState::Idle
        }
        LineKind::Transition { text } => {
            emitted.push(Emit::Token(ScriptToken::Transition { text: text.clone() }));
            BlockState::Idle
        }
        LineKind::Centered { text } => {
            emitted.push(Emit::Token(ScriptToken::Centered { text: text.clone() }));
            BlockState::Idle
        }
        LineKind::Character { name, extension, dual, forced } if is_cue(*forced, ctx) => {
            let text = match extension {
                Some(ext) => format!("{} {}", name, ext),
                None => name.clone(),
            };
            emitted.push(Emit::Token(ScriptToken::DialogueBegin));
            emitted.push(Emit::Token(ScriptToken::character(&text, name, *dual)));
            BlockState::AccumulatingDialogue(DialogueBlock {
                vfx: line.vfx.clone(),
                ..DialogueBlock::default()
            })
        }
        // 不满足角色条件的大写行、孤立的括号行都当作动作
        LineKind::Character { .. } | LineKind::Parenthetical { .. } | LineKind::Text => {
            BlockState::AccumulatingAction(ActionBlock::start(&line.text, line.vfx.clone()))
        }
    }
}

fn action_step(
    mut block: ActionBlock,
    line: &ClassifiedLine,
    ctx: &IndentContext,
    emitted: &mut Vec<Emit>,
) -> Step {
    let cue_jump = matches!(line.kind, LineKind::Character { .. }) && ctx.jump == IndentJump::Right;
    if line.kind.is_blank() || line.kind.breaks_action() || cue_jump {
        block.close(emitted);
        return Step::Reprocess;
    }

    let text = match &line.kind {
        LineKind::ForcedAction { text } => text.as_str(),
        _ => line.text.as_str(),
    };
    block.lines.push(text.to_string());
    merge_vfx(&mut block.vfx, &line.vfx);
    Step::Stay(BlockState::AccumulatingAction(block))
}

fn dialogue_step(
    mut block: DialogueBlock,
    line: &ClassifiedLine,
    ctx: &IndentContext,
    emitted: &mut Vec<Emit>,
) -> Step {
    if line.kind.breaks_dialogue() {
        block.close(emitted);
        return Step::Reprocess;
    }

    match &line.kind {
        LineKind::Blank => {
            block.pending.push(String::new());
            block.last_blank = true;
            merge_vfx(&mut block.vfx, &line.vfx);
            Step::Stay(BlockState::AccumulatingDialogue(block))
        }
        LineKind::Parenthetical { text } => {
            merge_vfx(&mut block.vfx, &line.vfx);
            block.flush(emitted);
            emitted.push(Emit::Token(ScriptToken::Parenthetical { text: text.clone() }));
            block.has_content = true;
            block.last_blank = false;
            Step::Stay(BlockState::AccumulatingDialogue(block))
        }
        _ if block.ends_on_jump(line, ctx) => {
            block.close(emitted);
            Step::Reprocess
        }
        _ if block.last_blank && ctx.indent <= ctx.threshold => {
            block.close(emitted);
            Step::Reprocess
        }
        _ => {
            block.pending.push(line.text.clone());
            block.has_content = true;
            block.last_blank = false;
            merge_vfx(&mut block.vfx, &line.vfx);
            Step::Stay(BlockState::AccumulatingDialogue(block))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::line_classifier::classify;

    struct Harness {
        state: BlockState,
        tracker: IndentTracker,
        emitted: Vec<Emit>,
        line_no: usize,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                state: BlockState::Idle,
                tracker: IndentTracker::new(4),
                emitted: Vec::new(),
                line_no: 0,
            }
        }

        fn feed(&mut self, raw: &str, vfx: Option<VfxTag>) {
            let kind = classify(self.line_no, raw).unwrap();
            let ctx = self.tracker.observe(raw);
            let line = ClassifiedLine::new(self.line_no, ctx.indent, raw, kind).with_vfx(vfx);
            let state = std::mem::take(&mut self.state);
            let (next, out) = transition(state, &line, &ctx);
            self.state = next;
            self.emitted.extend(out);
            self.line_no += 1;
        }

        fn lines(mut self, raw: &[&str]) -> Vec<Emit> {
            for line in raw {
                self.feed(line, None);
            }
            let mut out = self.emitted;
            out.extend(self.state.finish());
            out
        }
    }

    fn tok(token: ScriptToken) -> Emit {
        Emit::Token(token)
    }

    #[test]
    fn flush_left_cue_starts_dialogue() {
        let out = Harness::new().lines(&["JOHN", "Hello there.", ""]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("JOHN", "JOHN", false)),
                tok(ScriptToken::dialogue("Hello there.\n")),
                tok(ScriptToken::DialogueEnd),
            ]
        );
    }

    #[test]
    fn indented_layout_needs_cue_indent() {
        let out = Harness::new().lines(&[
            "               MARY",
            "          Hi.",
            "BANG!",
        ]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("MARY", "MARY", false)),
                tok(ScriptToken::dialogue("Hi.")),
                tok(ScriptToken::DialogueEnd),
                tok(ScriptToken::action("BANG!")),
            ]
        );
    }

    #[test]
    fn parenthetical_splits_dialogue_and_keeps_vfx() {
        let mut harness = Harness::new();
        harness.feed("               MARY", None);
        harness.feed("          Run.", Some(VfxTag::with_shot("3", "easy")));
        harness.feed("          (beat)", None);
        harness.feed("          Now.", Some(VfxTag::new("mid")));
        let mut out = harness.emitted;
        out.extend(harness.state.finish());
        assert_eq!(
            out[2],
            tok(ScriptToken::Dialogue {
                text: "Run.".to_string(),
                vfx: Some(VfxTag::with_shot("3", "easy"))
            })
        );
        assert_eq!(out[3], tok(ScriptToken::Parenthetical { text: "(beat)".to_string() }));
        assert_eq!(
            out[4],
            tok(ScriptToken::Dialogue {
                text: "Now.".to_string(),
                vfx: Some(VfxTag::with_shot("3", "mid"))
            })
        );
    }

    #[test]
    fn dialogue_resumes_left_of_parenthetical() {
        let out = Harness::new().lines(&[
            "                      JOHN",
            "                (quietly)",
            "          Go now.",
            "          Please.",
        ]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("JOHN", "JOHN", false)),
                tok(ScriptToken::Parenthetical { text: "(quietly)".to_string() }),
                tok(ScriptToken::dialogue("Go now.\nPlease.")),
                tok(ScriptToken::DialogueEnd),
            ]
        );
    }

    #[test]
    fn mid_speech_parenthetical_keeps_group_open() {
        let out = Harness::new().lines(&[
            "                      JOHN",
            "          Wait.",
            "                (beat)",
            "          Go now.",
            "",
            "                      MARY",
            "          Fine.",
        ]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("JOHN", "JOHN", false)),
                tok(ScriptToken::dialogue("Wait.")),
                tok(ScriptToken::Parenthetical { text: "(beat)".to_string() }),
                tok(ScriptToken::dialogue("Go now.\n")),
                tok(ScriptToken::DialogueEnd),
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("MARY", "MARY", false)),
                tok(ScriptToken::dialogue("Fine.")),
                tok(ScriptToken::DialogueEnd),
            ]
        );
    }

    #[test]
    fn group_ending_in_parenthetical_still_closes() {
        let out = Harness::new().lines(&[
            "               JOHN",
            "          (nods)",
            "The door slams.",
        ]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("JOHN", "JOHN", false)),
                tok(ScriptToken::Parenthetical { text: "(nods)".to_string() }),
                tok(ScriptToken::DialogueEnd),
                tok(ScriptToken::action("The door slams.")),
            ]
        );
    }

    #[test]
    fn action_closes_on_blank_and_strips_forced_sigil() {
        let out = Harness::new().lines(&["He runs.", "!INT. NOT A HEADING", "", "She stops."]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::action("He runs.\nINT. NOT A HEADING")),
                tok(ScriptToken::action("She stops.")),
            ]
        );
    }

    #[test]
    fn break_pattern_closes_dialogue() {
        let out = Harness::new().lines(&["JOHN", "Wait", "==="]);
        assert_eq!(out.last(), Some(&Emit::PageBreak { page: None }));
        assert_eq!(out[3], tok(ScriptToken::DialogueEnd));
    }

    #[test]
    fn empty_dialogue_group_emits_no_dialogue() {
        let out = Harness::new().lines(&["JOHN", "", "INT. HOUSE"]);
        assert_eq!(
            out,
            vec![
                tok(ScriptToken::DialogueBegin),
                tok(ScriptToken::character("JOHN", "JOHN", false)),
                tok(ScriptToken::DialogueEnd),
                Emit::SceneHeading {
                    text: "HOUSE".to_string(),
                    number: None,
                    vfx: None
                },
            ]
        );
    }

    #[test]
    fn blank_line_inherits_indent() {
        let mut tracker = IndentTracker::new(4);
        tracker.observe("          text");
        let ctx = tracker.observe("");
        assert_eq!(ctx.indent, 10);
        assert_eq!(ctx.jump, IndentJump::None);
        let ctx = tracker.observe("               CUE");
        assert_eq!(ctx.jump, IndentJump::Right);
        assert_eq!(ctx.layout, Layout::Indented);
    }
}

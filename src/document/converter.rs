use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use crate::models::{
    attr,
    Block,
    BlockClass,
    BreakdownError,
    BreakdownResult,
    Conf,
    Document,
    EntityDecl,
    EntityKind,
    EntityRegistry,
    ScriptToken,
    Span,
    VfxTag,
};
use crate::parser::SceneNumbering;
use crate::utils::{PatternLibrary, ANNOTATION_REGEX};

fn set_vfx(block: &mut Block, vfx: Option<&VfxTag>) {
    if let Some(tag) = vfx {
        block.set_str(attr::VFX, &tag.level);
        if let Some(shot) = &tag.shot {
            block.set_str(attr::SHOT, shot);
        }
    }
}

fn block_vfx(block: &Block) -> Option<VfxTag> {
    block.get_str(attr::VFX).map(|level| match block.get_str(attr::SHOT) {
        Some(shot) => VfxTag::with_shot(shot, level),
        None => VfxTag::new(level),
    })
}

/// 多行token按行拆成子块，每个子块都带上VFX属性
fn push_lines(blocks: &mut Vec<Block>, class: BlockClass, text: &str, vfx: Option<&VfxTag>) {
    // 相邻的同类token之间插入分隔块，避免回读时被合并
    if blocks.last().map_or(false, |b| b.class == class) {
        blocks.push(Block::new(BlockClass::Separator));
    }
    for line in text.split('\n') {
        let mut block = Block::with_line(class, line);
        set_vfx(&mut block, vfx);
        blocks.push(block);
    }
}

/// token列表转换为编辑器文档
pub fn tokens_to_document(tokens: &[ScriptToken], entities: &EntityRegistry) -> Document {
    let declarations = entities
        .iter()
        .map(|(_, entity)| EntityDecl {
            name: entity.name.clone(),
            kind: entity.kind,
        })
        .collect();

    let mut blocks: Vec<Block> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            ScriptToken::SceneHeading { text, scene_num, page_num, vfx, collapsed } => {
                let mut block = Block::with_line(BlockClass::SceneHeading, text);
                block.set_str(attr::SCENE, scene_num);
                block.set_str(attr::PAGE, &page_num.to_string());
                block.set_bool(attr::COLLAPSED, *collapsed);
                set_vfx(&mut block, vfx.as_ref());
                blocks.push(block);
            }
            ScriptToken::Action { text, vfx } => {
                push_lines(&mut blocks, BlockClass::Action, text, vfx.as_ref());
            }
            ScriptToken::Dialogue { text, vfx } => {
                push_lines(&mut blocks, BlockClass::Dialogue, text, vfx.as_ref());
            }
            ScriptToken::Character { text, character, dual } => {
                let mut block = Block::with_line(BlockClass::Character, text);
                block.set_str(attr::CHARACTER, character);
                block.set_bool(attr::DUAL, *dual);
                blocks.push(block);
            }
            ScriptToken::Parenthetical { text } => {
                blocks.push(Block::with_line(BlockClass::Parenthetical, text));
            }
            ScriptToken::Transition { text } => {
                blocks.push(Block::with_line(BlockClass::Transition, text));
            }
            ScriptToken::Centered { text } => {
                blocks.push(Block::with_line(BlockClass::Centered, text));
            }
            ScriptToken::Flashback { text, scene_num, page_num } => {
                let mut block = Block::with_line(BlockClass::Flashback, text);
                block.set_str(attr::SCENE, scene_num);
                block.set_str(attr::PAGE, &page_num.to_string());
                blocks.push(block);
            }
            ScriptToken::PageBreak { page_num } => {
                let mut block = Block::new(BlockClass::PageBreak);
                block.set_str(attr::PAGE, &page_num.to_string());
                blocks.push(block);
            }
            // 对白组的起止由角色块隐含表示
            ScriptToken::DialogueBegin | ScriptToken::DialogueEnd => {}
        }
    }

    Document { declarations, blocks }
}

/// 正在合并的多行块
struct OpenRun {
    class: BlockClass,
    lines: Vec<String>,
    vfx: Option<VfxTag>,
}

/// 文档回读状态
struct Reader<'a> {
    patterns: &'a PatternLibrary,
    tokens: Vec<ScriptToken>,
    registry: EntityRegistry,
    open: Option<OpenRun>,
    in_group: bool,
    page: u32,
    numbering: SceneNumbering,
}

/// 块上记录的场次号，空值视为未编号
fn scene_attr(block: &Block) -> Option<&str> {
    match block.class {
        BlockClass::SceneHeading | BlockClass::Flashback => {
            block.get_str(attr::SCENE).filter(|n| !n.trim().is_empty())
        }
        _ => None,
    }
}

impl<'a> Reader<'a> {
    fn new(patterns: &'a PatternLibrary, blocks: &[Block]) -> Self {
        let explicit: HashSet<String> = blocks
            .iter()
            .filter_map(scene_attr)
            .map(str::to_string)
            .collect();
        Reader {
            patterns,
            tokens: Vec::new(),
            registry: EntityRegistry::new(),
            open: None,
            in_group: false,
            page: 1,
            numbering: SceneNumbering::new(explicit),
        }
    }

    /// 取块文本，顺带清理残留的声明和VFX标注
    fn block_text(&mut self, block: &Block) -> (String, Option<VfxTag>) {
        for span in &block.spans {
            if let Span::Entity { entity, text } = span {
                self.registry.define(text, *entity);
            }
        }

        let markup = block.markup();
        let (mut text, tags) = self.patterns.extract_vfx(&markup);
        if ANNOTATION_REGEX["declaration"].is_match(&text) {
            for caps in ANNOTATION_REGEX["declaration"].captures_iter(&text) {
                if let Ok(kind) = caps["kind"].parse::<EntityKind>() {
                    for name in caps["names"].split(',') {
                        self.registry.define(name, kind);
                    }
                }
            }
            text = ANNOTATION_REGEX["declaration"].replace_all(&text, "").trim_end().to_string();
        }

        let vfx = tags
            .into_iter()
            .fold(block_vfx(block), |current, tag| Some(VfxTag::merge(current, tag)));
        (text, vfx)
    }

    fn flush_run(&mut self) {
        if let Some(run) = self.open.take() {
            let text = run.lines.join("\n");
            let token = match run.class {
                BlockClass::Dialogue => ScriptToken::Dialogue { text, vfx: run.vfx },
                _ => ScriptToken::Action { text, vfx: run.vfx },
            };
            self.tokens.push(token);
        }
    }

    fn close_group(&mut self) {
        self.flush_run();
        if self.in_group {
            self.tokens.push(ScriptToken::DialogueEnd);
            self.in_group = false;
        }
    }

    fn push_run_line(&mut self, class: BlockClass, text: String, vfx: Option<VfxTag>) {
        if self.open.as_ref().map_or(false, |run| run.class != class) {
            self.flush_run();
        }
        match self.open.as_mut() {
            Some(run) => {
                run.lines.push(text);
                if let Some(tag) = vfx {
                    run.vfx = Some(VfxTag::merge(run.vfx.take(), tag));
                }
            }
            None => {
                self.open = Some(OpenRun {
                    class,
                    lines: vec![text],
                    vfx,
                });
            }
        }
    }

    fn page_attr(&self, block: &Block, fallback: u32) -> u32 {
        block
            .get_str(attr::PAGE)
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(fallback)
    }

    fn read(&mut self, block: &Block) {
        match block.class {
            BlockClass::Separator => self.flush_run(),
            BlockClass::Action => {
                if self.in_group {
                    self.close_group();
                }
                let (text, vfx) = self.block_text(block);
                self.push_run_line(BlockClass::Action, text, vfx);
            }
            BlockClass::Dialogue => {
                let (text, vfx) = self.block_text(block);
                if self.in_group {
                    self.push_run_line(BlockClass::Dialogue, text, vfx);
                } else {
                    warn!("对白块不在对白组内，按动作处理: {}", text);
                    self.push_run_line(BlockClass::Action, text, vfx);
                }
            }
            BlockClass::Character => {
                self.close_group();
                let (text, _) = self.block_text(block);
                let character = block
                    .get_str(attr::CHARACTER)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        text.split(|c| c == '(' || c == '（').next().unwrap_or("").trim().to_string()
                    });
                self.registry.define(&character, EntityKind::Char);
                self.tokens.push(ScriptToken::DialogueBegin);
                self.tokens.push(ScriptToken::Character {
                    text,
                    character,
                    dual: block.get_bool(attr::DUAL),
                });
                self.in_group = true;
            }
            BlockClass::Parenthetical => {
                self.flush_run();
                let (text, _) = self.block_text(block);
                self.tokens.push(ScriptToken::Parenthetical { text });
            }
            BlockClass::SceneHeading => {
                self.close_group();
                let (text, vfx) = self.block_text(block);
                self.page = self.page_attr(block, self.page);
                self.tokens.push(ScriptToken::SceneHeading {
                    text,
                    scene_num: self.numbering.assign(scene_attr(block)),
                    page_num: self.page,
                    vfx,
                    collapsed: block.get_bool(attr::COLLAPSED),
                });
            }
            BlockClass::Flashback => {
                self.close_group();
                let (text, _) = self.block_text(block);
                self.page = self.page_attr(block, self.page);
                self.tokens.push(ScriptToken::Flashback {
                    text,
                    scene_num: self.numbering.assign(scene_attr(block)),
                    page_num: self.page,
                });
            }
            BlockClass::Transition => {
                self.close_group();
                let (text, _) = self.block_text(block);
                self.tokens.push(ScriptToken::Transition { text });
            }
            BlockClass::Centered => {
                self.close_group();
                let (text, _) = self.block_text(block);
                self.tokens.push(ScriptToken::Centered { text });
            }
            BlockClass::PageBreak => {
                self.close_group();
                self.page = self.page_attr(block, self.page + 1);
                self.tokens.push(ScriptToken::PageBreak { page_num: self.page });
            }
        }
    }
}

/// 编辑器文档与token之间的转换器
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    patterns: PatternLibrary,
    timeout: Option<Duration>,
}

impl DocumentConverter {
    pub fn new(conf: &Conf) -> Self {
        DocumentConverter {
            patterns: PatternLibrary::new(&conf.vfx_levels),
            timeout: conf.conversion_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn to_document(&self, tokens: &[ScriptToken], entities: &EntityRegistry) -> Document {
        tokens_to_document(tokens, entities)
    }

    /// 文档转回token列表并重建实体表
    ///
    /// 超时返回 `ConversionTimeout`，不返回部分结果
    pub fn document_to_tokens(
        &self,
        document: &Document,
    ) -> BreakdownResult<(Vec<ScriptToken>, EntityRegistry)> {
        let deadline = self.timeout.map(|t| (Instant::now() + t, t));
        let mut reader = Reader::new(&self.patterns, &document.blocks);

        for decl in &document.declarations {
            reader.registry.define(&decl.name, decl.kind);
        }

        for block in &document.blocks {
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    warn!("文档转换超时，已处理{}个token", reader.tokens.len());
                    return Err(BreakdownError::ConversionTimeout(timeout));
                }
            }
            reader.read(block);
        }
        reader.close_group();

        let Reader { tokens, mut registry, .. } = reader;
        registry.tally(&tokens);
        debug!("文档转换完成: {}个块 -> {}个token", document.blocks.len(), tokens.len());
        Ok((tokens, registry))
    }
}

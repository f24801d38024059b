use std::collections::{BTreeMap, HashMap};
use serde::Serialize;
use serde_json::{json, Value};
use crate::metrics::{MetricsEngine, ScriptMetrics, PROLOGUE_SCENE};
use crate::models::{Conf, EntityRegistry, ExportMode, ScriptToken, VfxTag};
use crate::utils::{extract_notes, plain_text, PatternLibrary};

/// 表头: 列id和显示标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportHeader {
    pub id: String,
    pub title: String,
}

impl ExportHeader {
    fn new(id: &str, title: &str) -> Self {
        ExportHeader {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

/// 一行数据，键为列id
pub type ExportRow = HashMap<String, Value>;

/// 与格式无关的表格
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportTable {
    pub headers: Vec<ExportHeader>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    /// 按表头顺序取一行的单元格
    pub fn cells<'a>(&'a self, row: &'a ExportRow) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.headers.iter().map(move |h| row.get(&h.id))
    }
}

pub fn shots_column(shots_per_page: u32) -> String {
    format!("shots_{}", shots_per_page)
}

pub fn entity_column(key: &str) -> String {
    format!("entity:{}", key)
}

/// 块文本: 去掉标注，换行合并成空格
fn flatten(text: &str) -> String {
    plain_text(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 导出行生成器
///
/// 每个场景标题一行汇总，每个带VFX标注的对白/动作块一行(完整模式下是全部块)
#[derive(Debug, Clone)]
pub struct RowGenerator {
    patterns: PatternLibrary,
    engine: MetricsEngine,
    mode: ExportMode,
}

impl RowGenerator {
    pub fn new(conf: &Conf) -> Self {
        RowGenerator {
            patterns: PatternLibrary::new(&conf.vfx_levels),
            engine: MetricsEngine::new(conf),
            mode: conf.export_mode,
        }
    }

    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn headers(&self, entities: &EntityRegistry) -> Vec<ExportHeader> {
        let mut headers = vec![
            ExportHeader::new("page", "页码"),
            ExportHeader::new("scene", "场次"),
            ExportHeader::new("text", "内容"),
            ExportHeader::new("length", "长度(页)"),
        ];
        for n in self.engine.shots_per_page() {
            headers.push(ExportHeader::new(&shots_column(*n), &format!("镜头数({}/页)", n)));
        }
        headers.push(ExportHeader::new("vfx", "VFX难度"));
        headers.push(ExportHeader::new("shot", "镜头号"));
        headers.push(ExportHeader::new("notes", "备注"));
        for (key, entity) in entities.iter() {
            headers.push(ExportHeader::new(
                &entity_column(key),
                &format!("{} ({})", entity.name, entity.kind),
            ));
        }
        headers
    }

    fn put_vfx(&self, row: &mut ExportRow, vfx: Option<&VfxTag>) {
        match vfx {
            Some(tag) => {
                let label = self.patterns.level_label(&tag.level).unwrap_or(&tag.level);
                row.insert("vfx".to_string(), json!(label));
                row.insert("shot".to_string(), json!(tag.shot.clone().unwrap_or_default()));
            }
            None => {
                row.insert("vfx".to_string(), json!(""));
                row.insert("shot".to_string(), json!(""));
            }
        }
    }

    fn put_shots(&self, row: &mut ExportRow, shots: &[u32]) {
        for (n, count) in self.engine.shots_per_page().iter().zip(shots) {
            row.insert(shots_column(*n), json!(count));
        }
    }

    /// 场景范围内的实体出现次数
    fn scene_profile(
        tokens: &[ScriptToken],
        entities: &EntityRegistry,
    ) -> BTreeMap<String, usize> {
        let matcher = entities.matcher();
        let mut profile = BTreeMap::new();
        for token in tokens {
            for (key, n) in matcher.count_in(token) {
                *profile.entry(key).or_insert(0) += n;
            }
        }
        profile
    }

    pub fn generate(&self, tokens: &[ScriptToken], entities: &EntityRegistry) -> ExportTable {
        let metrics = self.engine.analyze(tokens);
        self.generate_with_metrics(tokens, entities, &metrics)
    }

    pub fn generate_with_metrics(
        &self,
        tokens: &[ScriptToken],
        entities: &EntityRegistry,
        metrics: &ScriptMetrics,
    ) -> ExportTable {
        let headers = self.headers(entities);
        let scene_starts: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_scene_start())
            .map(|(i, _)| i)
            .collect();

        let mut rows = Vec::new();
        let mut page: u32 = 1;
        let mut scene = PROLOGUE_SCENE.to_string();
        let mut speaker: Option<String> = None;

        for (index, token) in tokens.iter().enumerate() {
            match token {
                ScriptToken::PageBreak { page_num } => page = *page_num,
                ScriptToken::Character { character, .. } => speaker = Some(character.clone()),
                ScriptToken::DialogueEnd => speaker = None,
                ScriptToken::SceneHeading { .. } | ScriptToken::Flashback { .. } => {
                    scene = token.scene_num().unwrap_or_default().to_string();
                    let end = scene_starts
                        .iter()
                        .copied()
                        .find(|&start| start > index)
                        .unwrap_or(tokens.len());
                    let profile = Self::scene_profile(&tokens[index + 1..end], entities);

                    let text = token.text().unwrap_or_default();
                    let mut row = ExportRow::new();
                    row.insert("page".to_string(), json!(token.page_num().unwrap_or(page)));
                    row.insert("scene".to_string(), json!(scene));
                    row.insert("text".to_string(), json!(flatten(text)));
                    row.insert("notes".to_string(), json!(extract_notes(text).join("; ")));
                    self.put_vfx(&mut row, token.vfx());
                    match metrics.scene_at(index) {
                        Some(m) => {
                            row.insert("length".to_string(), json!(m.length.label));
                            self.put_shots(&mut row, &m.shots);
                        }
                        None => {
                            row.insert("length".to_string(), json!("0"));
                        }
                    }
                    for (key, _) in entities.iter() {
                        let count = profile.get(key).copied().unwrap_or(0);
                        row.insert(entity_column(key), json!(count));
                    }
                    rows.push(row);
                }
                ScriptToken::Dialogue { text, vfx } | ScriptToken::Action { text, vfx } => {
                    if self.mode == ExportMode::VfxOnly && vfx.is_none() {
                        continue;
                    }
                    let rendered = match (token, &speaker) {
                        (ScriptToken::Dialogue { .. }, Some(name)) => {
                            format!("{}: {}", name, flatten(text))
                        }
                        _ => flatten(text),
                    };

                    let mut row = ExportRow::new();
                    row.insert("page".to_string(), json!(page));
                    row.insert("scene".to_string(), json!(scene));
                    row.insert("notes".to_string(), json!(extract_notes(text).join("; ")));
                    self.put_vfx(&mut row, vfx.as_ref());
                    if let Some(m) = metrics.block_at(index) {
                        row.insert("length".to_string(), json!(m.length.label));
                        self.put_shots(&mut row, &m.shots);
                    }
                    // 块级只做子串判断
                    let lowered = rendered.to_lowercase();
                    for (key, entity) in entities.iter() {
                        let present = lowered.contains(&entity.name.to_lowercase());
                        row.insert(entity_column(key), json!(present));
                    }
                    row.insert("text".to_string(), json!(rendered));
                    rows.push(row);
                }
                _ => {}
            }
        }

        ExportTable { headers, rows }
    }
}

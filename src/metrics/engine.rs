use std::collections::{BTreeMap, HashSet};
use serde::Serialize;
use crate::metrics::fraction::{fractional_page_count, PageFraction};
use crate::models::{Conf, ScriptToken};

/// 标题之前的内容归入的场景键
pub const PROLOGUE_SCENE: &str = "0";

/// token占用的行数
pub fn line_weight(token: &ScriptToken) -> usize {
    let newlines = token.text().map_or(0, |t| t.matches('\n').count());
    match token {
        ScriptToken::SceneHeading { .. } => 2,
        ScriptToken::Character { .. } | ScriptToken::Parenthetical { .. } => 1 + newlines,
        ScriptToken::Dialogue { .. }
        | ScriptToken::Action { .. }
        | ScriptToken::Flashback { .. }
        | ScriptToken::Transition { .. }
        | ScriptToken::Centered { .. } => 2 + newlines,
        ScriptToken::DialogueBegin | ScriptToken::DialogueEnd | ScriptToken::PageBreak { .. } => 0,
    }
}

/// 场景编号重复时生成不冲突的统计键: `5` -> `5A`
fn unique_scene_key(number: &str, used: &HashSet<String>) -> String {
    if !used.contains(number) {
        return number.to_string();
    }
    for suffix in 'A'..='Z' {
        let candidate = format!("{}{}", number, suffix);
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    let mut n = 2;
    while used.contains(&format!("{}-{}", number, n)) {
        n += 1;
    }
    format!("{}-{}", number, n)
}

/// 镜头数估算
///
/// 每种"每页镜头数"假设各自维护已计入的行数，逐块分配本页的镜头，
/// 块大小不均时累计值也不会漂移
#[derive(Debug, Clone)]
pub struct ShotEstimator {
    shots_per_page: Vec<u32>,
    accounted: Vec<f64>,
}

impl ShotEstimator {
    pub fn new(shots_per_page: &[u32]) -> Self {
        ShotEstimator {
            shots_per_page: shots_per_page.to_vec(),
            accounted: vec![0.0; shots_per_page.len()],
        }
    }

    /// 换页时清零
    pub fn reset(&mut self) {
        self.accounted.iter_mut().for_each(|a| *a = 0.0);
    }

    /// `page_lines_so_far` 含当前块，`page_total` 为本页总行数
    pub fn allocate(&mut self, page_lines_so_far: usize, page_total: usize) -> Vec<u32> {
        if page_total == 0 {
            return vec![0; self.shots_per_page.len()];
        }
        let total = page_total as f64;
        self.shots_per_page
            .iter()
            .zip(self.accounted.iter_mut())
            .map(|(&per_page, accounted)| {
                let per_page = per_page as f64;
                let shots = (per_page * (page_lines_so_far as f64 - *accounted) / total)
                    .round()
                    .max(0.0);
                *accounted += shots * total / per_page;
                shots as u32
            })
            .collect()
    }
}

/// 单个场景的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneMetrics {
    /// 去重后的统计键
    pub key: String,
    pub scene_num: String,
    /// 场景开始token的下标；标题前的内容为 None
    pub token_index: Option<usize>,
    pub page: u32,
    pub lines: usize,
    pub length: PageFraction,
    /// 各假设下本场景的镜头数(块镜头数之和)
    pub shots: Vec<u32>,
}

/// 单个对白/动作块的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockMetrics {
    pub token_index: usize,
    pub scene_key: String,
    pub page: u32,
    pub lines: usize,
    /// 场景内截至本块、尚未计入的长度
    pub length: PageFraction,
    pub shots: Vec<u32>,
}

/// 整个剧本的统计结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptMetrics {
    /// 页码 -> 行数
    pub pages: BTreeMap<u32, usize>,
    /// 场景键 -> 行数
    pub scene_lines: BTreeMap<String, usize>,
    pub scenes: Vec<SceneMetrics>,
    pub blocks: Vec<BlockMetrics>,
    pub total_lines: usize,
}

impl ScriptMetrics {
    pub fn scene(&self, key: &str) -> Option<&SceneMetrics> {
        self.scenes.iter().find(|s| s.key == key)
    }

    /// 按token下标查找场景
    pub fn scene_at(&self, token_index: usize) -> Option<&SceneMetrics> {
        self.scenes.iter().find(|s| s.token_index == Some(token_index))
    }

    pub fn block_at(&self, token_index: usize) -> Option<&BlockMetrics> {
        self.blocks.iter().find(|b| b.token_index == token_index)
    }
}

/// 行数、页数和镜头数统计
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    lines_per_page: f64,
    shots_per_page: Vec<u32>,
}

impl MetricsEngine {
    pub fn new(conf: &Conf) -> Self {
        MetricsEngine {
            lines_per_page: conf.lines_per_page,
            shots_per_page: conf.shots_per_page.clone(),
        }
    }

    pub fn shots_per_page(&self) -> &[u32] {
        &self.shots_per_page
    }

    pub fn page_count(&self, line_count: usize) -> PageFraction {
        fractional_page_count(line_count as f64, self.lines_per_page)
    }

    /// 第一遍: 各页、各场景的总行数
    fn totals(&self, tokens: &[ScriptToken]) -> (BTreeMap<u32, usize>, Vec<SceneMetrics>) {
        let mut pages = BTreeMap::new();
        let mut scenes: Vec<SceneMetrics> = Vec::new();
        let mut used = HashSet::new();
        let mut page = 1;

        for (index, token) in tokens.iter().enumerate() {
            if let ScriptToken::PageBreak { page_num } = token {
                page = *page_num;
                continue;
            }
            if token.is_scene_start() {
                let number = token.scene_num().unwrap_or_default();
                let key = unique_scene_key(number, &used);
                used.insert(key.clone());
                scenes.push(SceneMetrics {
                    key,
                    scene_num: number.to_string(),
                    token_index: Some(index),
                    page: token.page_num().unwrap_or(page),
                    lines: 0,
                    length: PageFraction::zero(),
                    shots: vec![0; self.shots_per_page.len()],
                });
            }
            let weight = line_weight(token);
            if weight == 0 {
                continue;
            }
            *pages.entry(page).or_insert(0) += weight;
            if scenes.is_empty() {
                used.insert(PROLOGUE_SCENE.to_string());
                scenes.push(SceneMetrics {
                    key: PROLOGUE_SCENE.to_string(),
                    scene_num: PROLOGUE_SCENE.to_string(),
                    token_index: None,
                    page,
                    lines: 0,
                    length: PageFraction::zero(),
                    shots: vec![0; self.shots_per_page.len()],
                });
            }
            if let Some(scene) = scenes.last_mut() {
                scene.lines += weight;
            }
        }
        (pages, scenes)
    }

    /// 统计整份token列表
    pub fn analyze(&self, tokens: &[ScriptToken]) -> ScriptMetrics {
        let (pages, mut scenes) = self.totals(tokens);

        let mut blocks = Vec::new();
        let mut estimator = ShotEstimator::new(&self.shots_per_page);
        let mut page = 1;
        let mut page_so_far = 0;
        // 当前场景在 scenes 中的位置
        let mut scene_pos: Option<usize> = None;
        let mut scene_so_far = 0;
        let mut scene_accounted = 0.0;

        for (index, token) in tokens.iter().enumerate() {
            if let ScriptToken::PageBreak { page_num } = token {
                page = *page_num;
                page_so_far = 0;
                estimator.reset();
                continue;
            }
            if token.is_scene_start() {
                scene_pos = scenes.iter().position(|s| s.token_index == Some(index));
                scene_so_far = 0;
                scene_accounted = 0.0;
            }
            let weight = line_weight(token);
            if weight == 0 {
                continue;
            }
            if scene_pos.is_none() {
                scene_pos = scenes.iter().position(|s| s.token_index.is_none());
            }
            page_so_far += weight;
            scene_so_far += weight;

            if matches!(token, ScriptToken::Dialogue { .. } | ScriptToken::Action { .. }) {
                let page_total = pages.get(&page).copied().unwrap_or(0);
                let shots = estimator.allocate(page_so_far, page_total);
                let length = fractional_page_count(
                    scene_so_far as f64 - scene_accounted,
                    self.lines_per_page,
                );
                scene_accounted += length.lines;

                let scene_key = match scene_pos.and_then(|p| scenes.get_mut(p)) {
                    Some(scene) => {
                        for (sum, n) in scene.shots.iter_mut().zip(&shots) {
                            *sum += n;
                        }
                        scene.key.clone()
                    }
                    None => PROLOGUE_SCENE.to_string(),
                };
                blocks.push(BlockMetrics {
                    token_index: index,
                    scene_key,
                    page,
                    lines: weight,
                    length,
                    shots,
                });
            }
        }

        for scene in scenes.iter_mut() {
            scene.length = self.page_count(scene.lines);
        }
        let scene_lines = scenes.iter().map(|s| (s.key.clone(), s.lines)).collect();
        let total_lines = pages.values().sum();

        ScriptMetrics {
            pages,
            scene_lines,
            scenes,
            blocks,
            total_lines,
        }
    }
}

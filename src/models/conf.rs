use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::models::error::{BreakdownError, BreakdownResult};
use crate::models::vfx::VfxLevel;
use crate::utils::BreakdownConstants;

/// 导出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// 只导出带VFX标注的块
    #[default]
    VfxOnly,
    /// 导出全部对白/动作块
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// 可识别的VFX难度等级
    pub vfx_levels: Vec<VfxLevel>,
    /// 每页行数
    pub lines_per_page: f64,
    /// 每页镜头数的几种估算假设
    pub shots_per_page: Vec<u32>,
    /// 缩进跳变阈值(列)，超过该值视为换了段落类型
    pub indent_jump_threshold: usize,
    /// 文档转换超时(毫秒)，0 表示不限制
    pub conversion_timeout_ms: u64,
    /// 导出模式
    pub export_mode: ExportMode,
}

impl Default for Conf {
    fn default() -> Self {
        Conf {
            vfx_levels: VfxLevel::defaults(),
            lines_per_page: 56.0,
            shots_per_page: vec![14, 20, 24],
            indent_jump_threshold: BreakdownConstants::INDENT_JUMP_THRESHOLD,
            conversion_timeout_ms: 10_000,
            export_mode: ExportMode::VfxOnly,
        }
    }
}

impl Conf {
    /// 从JSON配置文件读取，缺省字段使用默认值
    pub fn load(path: &Path) -> BreakdownResult<Conf> {
        let raw = fs::read_to_string(path)?;
        let conf: Conf = serde_json::from_str(&raw)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn save(&self, path: &Path) -> BreakdownResult<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// 检查统计相关参数
    pub fn validate(&self) -> BreakdownResult<()> {
        if !self.lines_per_page.is_finite() || self.lines_per_page < 1.0 {
            return Err(BreakdownError::MetricsDegenerate(format!(
                "lines_per_page = {}",
                self.lines_per_page
            )));
        }
        if self.shots_per_page.iter().any(|s| *s == 0) {
            return Err(BreakdownError::MetricsDegenerate(
                "shots_per_page 不能包含 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn conversion_timeout(&self) -> Option<Duration> {
        if self.conversion_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.conversion_timeout_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let conf: Conf = serde_json::from_str(r#"{"lines_per_page": 50, "export_mode": "full"}"#).unwrap();
        assert_eq!(conf.lines_per_page, 50.0);
        assert_eq!(conf.export_mode, ExportMode::Full);
        assert_eq!(conf.shots_per_page, vec![14, 20, 24]);
        assert_eq!(conf.vfx_levels.len(), 4);
    }

    #[test]
    fn rejects_degenerate_page_size() {
        let mut conf = Conf::default();
        conf.lines_per_page = 0.0;
        assert!(matches!(conf.validate(), Err(BreakdownError::MetricsDegenerate(_))));
        conf.lines_per_page = f64::NAN;
        assert!(conf.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breakdown.json");
        let mut conf = Conf::default();
        conf.vfx_levels.push(VfxLevel::new("insane", "Insane"));
        conf.save(&path).unwrap();
        assert_eq!(Conf::load(&path).unwrap(), conf);
    }
}

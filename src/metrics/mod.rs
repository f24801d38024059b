pub mod fraction;
pub mod engine;

pub use fraction::{fractional_page_count, PageFraction};
pub use engine::{
    line_weight, BlockMetrics, MetricsEngine, SceneMetrics, ScriptMetrics, ShotEstimator,
    PROLOGUE_SCENE,
};

use serde::Serialize;

/// 候选分母，按从小到大顺序尝试
const DENOMINATORS: [u32; 5] = [2, 4, 8, 16, 32];

/// 页数的分数近似
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFraction {
    /// 显示文本，如 `1 3/8`、`5/8`、`2`
    pub label: String,
    /// 近似后的页数
    pub decimal: f64,
    /// 近似页数折算回的行数，调用方用它累计已计入的行数
    pub lines: f64,
}

impl PageFraction {
    pub fn zero() -> Self {
        PageFraction {
            label: "0".to_string(),
            decimal: 0.0,
            lines: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.decimal == 0.0
    }
}

impl Default for PageFraction {
    fn default() -> Self {
        Self::zero()
    }
}

/// 把行数换算成页数，取最接近的低分母分数
///
/// 不足 1/32 页按 1/32 页计；行数为0或参数非有限值时返回零结果
pub fn fractional_page_count(line_count: f64, lines_per_page: f64) -> PageFraction {
    if !line_count.is_finite() || !lines_per_page.is_finite() || lines_per_page == 0.0 {
        return PageFraction::zero();
    }
    let line_count = line_count.max(0.0);
    if line_count == 0.0 {
        return PageFraction::zero();
    }
    let lines_per_page = lines_per_page.max(1.0);

    let ratio = (line_count / lines_per_page).max(1.0 / 32.0);
    let mut whole = ratio.floor() as u64;
    let remainder = ratio - ratio.floor();

    let mut best: Option<(u32, u32, f64)> = None;
    for den in DENOMINATORS {
        let num = (remainder * den as f64).round() as u32;
        let error = (remainder - num as f64 / den as f64).abs();
        // 只接受严格更好的近似，误差相同时保留较小的分母
        if best.map_or(true, |(_, _, best_error)| error < best_error) {
            best = Some((num, den, error));
        }
    }
    let (mut num, den) = best.map_or((0, 1), |(num, den, _)| (num, den));
    if num == den {
        whole += 1;
        num = 0;
    }

    let decimal = whole as f64 + num as f64 / den as f64;
    let label = match (whole, num) {
        (w, 0) => w.to_string(),
        (0, n) => format!("{}/{}", n, den),
        (w, n) => format!("{} {}/{}", w, n, den),
    };

    PageFraction {
        label,
        decimal,
        lines: decimal * lines_per_page,
    }
}

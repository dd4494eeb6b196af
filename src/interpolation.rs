//! 插值曲线表
//!
//! 把关键帧里的 4 个控制值（两个贝塞尔控制点坐标）量化成 256 采样的
//! 缓动曲线查找表。表一经构建即只读，可以跨线程并发求值。

use once_cell::sync::Lazy;

/// 量化采样数
pub const CURVE_SAMPLE_COUNT: usize = 256;

/// 线性曲线的默认控制值 (x1, y1, x2, y2)
pub const LINEAR_CONTROL: [u8; 4] = [20, 20, 107, 107];

static LINEAR_TABLE: Lazy<InterpolationTable> =
    Lazy::new(|| InterpolationTable::build(LINEAR_CONTROL));

/// 量化缓动曲线
///
/// 不变量：`samples[0] == 0`，`samples[last] == 1`，单调非减。
/// `linear` 为 true 时跳过表构建，求值退化为恒等映射。
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolationTable {
    control: [u8; 4],
    linear: bool,
    samples: Vec<f32>,
}

impl InterpolationTable {
    pub fn build(control: [u8; 4]) -> Self {
        Self::build_with(control, CURVE_SAMPLE_COUNT)
    }

    pub fn build_with(control: [u8; 4], sample_count: usize) -> Self {
        // x1 == y1 且 x2 == y2 时控制点落在对角线上，即恒等曲线
        let linear = control[0] == control[1] && control[2] == control[3];
        if linear || sample_count < 2 {
            return Self {
                control,
                linear: true,
                samples: Vec::new(),
            };
        }

        let curve = Bezier::from_control(control);
        let last = (sample_count - 1) as f32;
        let mut samples = Vec::with_capacity(sample_count);
        let mut prev = 0.0f32;
        for i in 0..sample_count {
            let t = i as f32 / last;
            // 数值求解可能有微小回退，用前值钳住以保证单调
            let value = curve.evaluate(t).clamp(0.0, 1.0).max(prev);
            samples.push(value);
            prev = value;
        }
        samples[0] = 0.0;
        samples[sample_count - 1] = 1.0;

        Self {
            control,
            linear: false,
            samples,
        }
    }

    pub fn control(&self) -> [u8; 4] {
        self.control
    }

    pub fn is_linear(&self) -> bool {
        self.linear
    }

    pub fn sample_count(&self) -> usize {
        if self.linear {
            CURVE_SAMPLE_COUNT
        } else {
            self.samples.len()
        }
    }

    #[cfg(test)]
    pub(crate) fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// 求值 `t ∈ [0, 1]`：索引定位后在相邻采样间线性插值
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if self.linear {
            return t;
        }
        let scaled = t * self.samples.len() as f32;
        let index = (scaled as usize).min(self.samples.len() - 1);
        if index + 1 >= self.samples.len() {
            return self.samples[index];
        }
        let fraction = scaled - index as f32;
        lerp_f32(self.samples[index], self.samples[index + 1], fraction)
    }
}

impl Default for InterpolationTable {
    fn default() -> Self {
        LINEAR_TABLE.clone()
    }
}

/// 三次贝塞尔缓动曲线，控制值按 /127 归一化
struct Bezier {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Bezier {
    fn from_control(control: [u8; 4]) -> Self {
        Self {
            x1: control[0] as f32 / 127.0,
            y1: control[1] as f32 / 127.0,
            x2: control[2] as f32 / 127.0,
            y2: control[3] as f32 / 127.0,
        }
    }

    /// 牛顿法求解 x(s) = t，再取对应的 y(s)
    fn evaluate(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        let mut s = t;
        for _ in 0..15 {
            let x = self.curve_x(s);
            let dx = self.derivative_x(s);
            if dx.abs() < 1e-6 {
                break;
            }
            let next = s - (x - t) / dx;
            if (next - s).abs() < 1e-6 {
                break;
            }
            s = next;
        }

        self.curve_y(s)
    }

    fn curve_x(&self, s: f32) -> f32 {
        let s2 = s * s;
        let s3 = s2 * s;
        let u = 1.0 - s;
        3.0 * u * u * s * self.x1 + 3.0 * u * s2 * self.x2 + s3
    }

    fn curve_y(&self, s: f32) -> f32 {
        let s2 = s * s;
        let s3 = s2 * s;
        let u = 1.0 - s;
        3.0 * u * u * s * self.y1 + 3.0 * u * s2 * self.y2 + s3
    }

    fn derivative_x(&self, s: f32) -> f32 {
        let u = 1.0 - s;
        3.0 * u * u * self.x1 + 6.0 * u * s * (self.x2 - self.x1) + 3.0 * s * s * (1.0 - self.x2)
    }
}

/// 标量线性插值
pub fn lerp_f32(from: f32, to: f32, t: f32) -> f32 {
    from * (1.0 - t) + to * t
}

/// 两个关键帧时刻之间的插值系数，钳到 [0, 1]
pub fn coefficient(from: u64, to: u64, query: f32) -> f32 {
    if to <= from {
        return 0.0;
    }
    let span = (to - from) as f32;
    ((query - from as f32) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_control_detected() {
        let table = InterpolationTable::build(LINEAR_CONTROL);
        assert!(table.is_linear());
        assert_eq!(table.evaluate(0.25), 0.25);
        assert_eq!(table.evaluate(1.0), 1.0);
    }

    #[test]
    fn test_default_is_linear() {
        assert!(InterpolationTable::default().is_linear());
    }

    #[test]
    fn test_endpoints_pinned() {
        let table = InterpolationTable::build([64, 0, 64, 127]);
        assert!(!table.is_linear());
        let samples = table.samples();
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[samples.len() - 1], 1.0);
    }

    #[test]
    fn test_monotonic_for_arbitrary_controls() {
        for control in [
            [0u8, 127, 127, 0],
            [127, 0, 0, 127],
            [1, 126, 3, 9],
            [90, 12, 33, 100],
        ] {
            let table = InterpolationTable::build(control);
            let samples = table.samples();
            for pair in samples.windows(2) {
                assert!(pair[0] <= pair[1], "control {control:?} not monotonic");
            }
        }
    }

    #[test]
    fn test_evaluate_in_unit_range() {
        let table = InterpolationTable::build([10, 100, 120, 20]);
        let mut t = 0.0f32;
        while t <= 1.0 {
            let v = table.evaluate(t);
            assert!((0.0..=1.0).contains(&v));
            t += 0.01;
        }
        assert_eq!(table.evaluate(0.0), 0.0);
        assert_eq!(table.evaluate(1.0), 1.0);
    }

    #[test]
    fn test_evaluate_clamps_out_of_range() {
        let table = InterpolationTable::build([10, 100, 120, 20]);
        assert_eq!(table.evaluate(-0.5), 0.0);
        assert_eq!(table.evaluate(2.0), 1.0);
    }

    #[test]
    fn test_coefficient_clamped() {
        assert_eq!(coefficient(0, 10, 5.0), 0.5);
        assert_eq!(coefficient(0, 10, -1.0), 0.0);
        assert_eq!(coefficient(0, 10, 25.0), 1.0);
        // 退化区间不产生除零
        assert_eq!(coefficient(10, 10, 10.0), 0.0);
    }
}

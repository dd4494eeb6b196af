//! 动画轨道
//!
//! 单个命名目标（骨骼、Morph，或相机/光源这类单例通道）的有序关键帧
//! 序列。轨道自带游标：顺序播放时括弧查找从上次位置向前扫描，
//! 回退查找从头扫描——正确性不依赖查询顺序，只影响扫描代价。

use glam::Vec3;

use crate::interpolation::{coefficient, lerp_f32};
use crate::keyframe::{
    BoneKeyframe, CameraKeyframe, FrameIndex, KeyframeBase, LightKeyframe, ModelKeyframe,
    MorphKeyframe,
};
use crate::target::{BoneTransform, CameraTransform, LightTransform, ModelState};

/// 可插值的关键帧类型
pub trait Sample: KeyframeBase {
    type Output;

    /// 单个关键帧的取值
    fn value(&self) -> Self::Output;

    /// 在 `from`、`to` 之间按（已钳到 [0,1] 的）权重插值。
    /// 各通道的曲线取自 `to` 关键帧。
    fn interpolate(from: &Self, to: &Self, weight: f32) -> Self::Output;
}

/// 一个命名目标的关键帧轨道
#[derive(Clone, Debug)]
pub struct Track<K> {
    name: String,
    keyframes: Vec<K>,
    target: Option<usize>,
    cursor: usize,
}

impl<K: KeyframeBase> Track<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyframes: Vec::new(),
            target: None,
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keyframes(&self) -> &[K] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// 解析后的外部目标句柄；`None` 表示模型没有同名实体，不是错误
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<usize>) {
        self.target = target;
    }

    pub fn max_frame_index(&self) -> FrameIndex {
        self.keyframes
            .iter()
            .map(|k| k.frame_index())
            .max()
            .unwrap_or(0)
    }

    /// 精确查找某帧的关键帧
    pub fn find(&self, frame_index: FrameIndex) -> Option<&K> {
        self.keyframes
            .iter()
            .find(|k| k.frame_index() == frame_index)
    }

    /// 插入关键帧，保持按 (帧, 层) 升序——括弧查找假定时间有序，
    /// 层索引只作同帧内的次序。同位置的旧帧被替换并返回
    pub fn insert(&mut self, keyframe: K) -> Option<K> {
        let key = (keyframe.frame_index(), keyframe.layer_index());
        match self
            .keyframes
            .binary_search_by_key(&key, |k| (k.frame_index(), k.layer_index()))
        {
            Ok(i) => Some(std::mem::replace(&mut self.keyframes[i], keyframe)),
            Err(i) => {
                self.keyframes.insert(i, keyframe);
                None
            }
        }
    }

    /// 移除指定帧的关键帧
    pub fn remove(&mut self, frame_index: FrameIndex) -> Option<K> {
        let i = self
            .keyframes
            .iter()
            .position(|k| k.frame_index() == frame_index)?;
        self.cursor = 0;
        Some(self.keyframes.remove(i))
    }

    /// 查找包围 `query` 的关键帧括弧 `(from, to)`
    ///
    /// 查询时刻钳到末帧（不外推）。若 `query` 不早于游标所在帧则从
    /// 游标向前扫描（顺序播放的常见情形），否则从头扫描。
    pub fn find_bracket(&mut self, query: f32) -> Option<(usize, usize)> {
        if self.keyframes.is_empty() {
            return None;
        }
        let last = self.keyframes.len() - 1;
        let clamped = query.min(self.keyframes[last].frame_index() as f32);

        let hint = self.cursor.min(last);
        let start = if clamped >= self.keyframes[hint].frame_index() as f32 {
            hint
        } else {
            0
        };

        let mut to = last;
        for i in start..=last {
            if self.keyframes[i].frame_index() as f32 >= clamped {
                to = i;
                break;
            }
        }
        let from = to.saturating_sub(1);
        self.cursor = from;
        Some((from, to))
    }
}

impl<K: Sample> Track<K> {
    /// 在 `query` 处求值
    ///
    /// 括弧两端同帧时直接返回前帧取值（退化括弧，避免除零）。
    /// 空轨道返回 `None`。
    pub fn sample(&mut self, query: f32) -> Option<K::Output> {
        let (from, to) = self.find_bracket(query)?;
        let a = &self.keyframes[from];
        let b = &self.keyframes[to];
        if from == to || a.frame_index() == b.frame_index() {
            return Some(a.value());
        }
        let weight = coefficient(a.frame_index(), b.frame_index(), query);
        if weight >= 1.0 {
            return Some(b.value());
        }
        if weight <= 0.0 {
            return Some(a.value());
        }
        Some(K::interpolate(a, b, weight))
    }
}

impl Sample for BoneKeyframe {
    type Output = BoneTransform;

    fn value(&self) -> BoneTransform {
        BoneTransform {
            translation: self.translation,
            orientation: self.orientation,
        }
    }

    fn interpolate(from: &Self, to: &Self, weight: f32) -> BoneTransform {
        let curves = &to.interpolation;
        let translation = Vec3::new(
            lerp_f32(
                from.translation.x,
                to.translation.x,
                curves.translation_x.evaluate(weight),
            ),
            lerp_f32(
                from.translation.y,
                to.translation.y,
                curves.translation_y.evaluate(weight),
            ),
            lerp_f32(
                from.translation.z,
                to.translation.z,
                curves.translation_z.evaluate(weight),
            ),
        );
        // 旋转通道用曲线调整后的权重做球面插值
        let orientation = from
            .orientation
            .slerp(to.orientation, curves.orientation.evaluate(weight));
        BoneTransform {
            translation,
            orientation,
        }
    }
}

impl Sample for MorphKeyframe {
    type Output = f32;

    fn value(&self) -> f32 {
        self.weight
    }

    fn interpolate(from: &Self, to: &Self, weight: f32) -> f32 {
        lerp_f32(from.weight, to.weight, to.interpolation.evaluate(weight))
    }
}

impl Sample for CameraKeyframe {
    type Output = CameraTransform;

    fn value(&self) -> CameraTransform {
        CameraTransform {
            look_at: self.look_at,
            angle: self.angle,
            distance: self.distance,
            fov: self.fov,
        }
    }

    fn interpolate(from: &Self, to: &Self, weight: f32) -> CameraTransform {
        let curves = &to.interpolation;
        let look_at = Vec3::new(
            lerp_f32(
                from.look_at.x,
                to.look_at.x,
                curves.lookat_x.evaluate(weight),
            ),
            lerp_f32(
                from.look_at.y,
                to.look_at.y,
                curves.lookat_y.evaluate(weight),
            ),
            lerp_f32(
                from.look_at.z,
                to.look_at.z,
                curves.lookat_z.evaluate(weight),
            ),
        );
        // 欧拉角三个分量共用 angle 通道的曲线
        let angle_weight = curves.angle.evaluate(weight);
        let angle = Vec3::new(
            lerp_f32(from.angle.x, to.angle.x, angle_weight),
            lerp_f32(from.angle.y, to.angle.y, angle_weight),
            lerp_f32(from.angle.z, to.angle.z, angle_weight),
        );
        CameraTransform {
            look_at,
            angle,
            distance: lerp_f32(from.distance, to.distance, curves.distance.evaluate(weight)),
            fov: lerp_f32(from.fov, to.fov, curves.fov.evaluate(weight)),
        }
    }
}

impl Sample for LightKeyframe {
    type Output = LightTransform;

    fn value(&self) -> LightTransform {
        LightTransform {
            color: self.color,
            direction: self.direction,
        }
    }

    fn interpolate(from: &Self, to: &Self, weight: f32) -> LightTransform {
        LightTransform {
            color: from.color.lerp(to.color, weight),
            direction: from.direction.lerp(to.direction, weight),
        }
    }
}

impl Sample for ModelKeyframe {
    type Output = ModelState;

    fn value(&self) -> ModelState {
        ModelState {
            visible: self.visible,
            edge_color: self.edge_color,
            edge_width: self.edge_width,
            constraint_states: self.constraint_states.clone(),
        }
    }

    /// 可见性是阶跃量：到达 `to` 帧之前保持 `from` 的状态
    fn interpolate(from: &Self, to: &Self, weight: f32) -> ModelState {
        if weight >= 1.0 {
            to.value()
        } else {
            from.value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn bone_track() -> Track<BoneKeyframe> {
        let mut track = Track::new("センター");
        for (frame, y) in [(0u64, 0.0f32), (10, 10.0), (20, 20.0)] {
            let mut keyframe = BoneKeyframe::new(frame);
            keyframe.translation = Vec3::new(0.0, y, 0.0);
            track.insert(keyframe);
        }
        track
    }

    #[test]
    fn test_bracket_midpoint() {
        let mut track = bone_track();
        assert_eq!(track.find_bracket(5.0), Some((0, 1)));
        let value = track.sample(5.0).unwrap();
        assert!((value.translation.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_bracket_exact_last() {
        let mut track = bone_track();
        let value = track.sample(20.0).unwrap();
        assert_eq!(value.translation.y, 20.0);
    }

    #[test]
    fn test_bracket_clamps_past_end() {
        let mut track = bone_track();
        // 不外推：越过末帧钳到末帧取值
        let value = track.sample(25.0).unwrap();
        assert_eq!(value.translation.y, 20.0);
    }

    #[test]
    fn test_query_before_first_keyframe() {
        let mut track = Track::new("a");
        let mut keyframe = BoneKeyframe::new(10);
        keyframe.translation = Vec3::new(1.0, 2.0, 3.0);
        track.insert(keyframe);
        let mut second = BoneKeyframe::new(20);
        second.translation = Vec3::new(9.0, 9.0, 9.0);
        track.insert(second);

        let value = track.sample(3.0).unwrap();
        assert_eq!(value.translation, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_single_keyframe_bracket() {
        let mut track = Track::new("a");
        track.insert(MorphKeyframe::new(7, 0.25));
        assert_eq!(track.find_bracket(0.0), Some((0, 0)));
        assert_eq!(track.find_bracket(100.0), Some((0, 0)));
        assert_eq!(track.sample(50.0), Some(0.25));
    }

    #[test]
    fn test_degenerate_bracket_no_division_by_zero() {
        let mut track = Track::new("a");
        let mut first = BoneKeyframe::new(5);
        first.translation = Vec3::new(1.0, 0.0, 0.0);
        first.layer_index = 0;
        let mut second = BoneKeyframe::new(5);
        second.translation = Vec3::new(2.0, 0.0, 0.0);
        second.layer_index = 1;
        track.insert(first);
        track.insert(second);

        // 同帧括弧返回前帧取值
        let value = track.sample(5.0).unwrap();
        assert_eq!(value.translation.x, 1.0);
    }

    #[test]
    fn test_cursor_accelerated_then_backward() {
        let mut track = bone_track();
        track.sample(15.0);
        assert_eq!(track.find_bracket(18.0), Some((1, 2)));
        // 回退查找仍然正确，只是从头扫描
        assert_eq!(track.find_bracket(2.0), Some((0, 1)));
    }

    #[test]
    fn test_layered_keyframes_stay_time_sorted() {
        let mut track = Track::new("a");
        let mut late = BoneKeyframe::new(20);
        late.translation = Vec3::new(0.0, 20.0, 0.0);
        track.insert(late);
        let mut early = BoneKeyframe::new(5);
        early.layer_index = 1;
        early.translation = Vec3::new(0.0, 5.0, 0.0);
        track.insert(early);

        // 层索引更高但时间更早的关键帧排在前面,括弧与钳制按时间工作
        assert_eq!(track.keyframes()[0].frame_index, 5);
        let value = track.sample(12.5).unwrap();
        assert!((value.translation.y - 12.5).abs() < 1e-5);
        let value = track.sample(25.0).unwrap();
        assert_eq!(value.translation.y, 20.0);
    }

    #[test]
    fn test_insert_replaces_same_frame() {
        let mut track = Track::new("a");
        track.insert(MorphKeyframe::new(5, 0.1));
        let replaced = track.insert(MorphKeyframe::new(5, 0.9));
        assert_eq!(replaced.map(|k| k.weight), Some(0.1));
        assert_eq!(track.len(), 1);
        assert_eq!(track.sample(5.0), Some(0.9));
    }

    #[test]
    fn test_remove_keyframe() {
        let mut track = bone_track();
        assert!(track.remove(10).is_some());
        assert_eq!(track.len(), 2);
        assert!(track.remove(10).is_none());
    }

    #[test]
    fn test_empty_track_sample_is_none() {
        let mut track: Track<MorphKeyframe> = Track::new("a");
        assert_eq!(track.sample(0.0), None);
    }

    #[test]
    fn test_curve_weighted_interpolation() {
        let mut track = Track::new("a");
        let from = MorphKeyframe::new(0, 0.0);
        let mut to = MorphKeyframe::new(10, 1.0);
        // 非线性曲线:中点权重被曲线重映射
        to.interpolation = InterpolationTableFixture::ease();
        track.insert(from);
        track.insert(to);
        let value = track.sample(5.0).unwrap();
        let curve_mid = InterpolationTableFixture::ease().evaluate(0.5);
        assert!((value - curve_mid).abs() < 1e-5);
        assert!(value != 0.5);
    }

    #[test]
    fn test_rotation_slerp() {
        let mut track = Track::new("a");
        let from = BoneKeyframe::new(0);
        let mut to = BoneKeyframe::new(10);
        to.orientation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        track.insert(from);
        track.insert(to);

        let value = track.sample(5.0).unwrap();
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(value.orientation.angle_between(expected).abs() < 1e-4);
    }

    #[test]
    fn test_model_keyframe_steps() {
        let mut track = Track::new("model");
        let mut hidden = ModelKeyframe::new(10);
        hidden.visible = false;
        track.insert(ModelKeyframe::new(0));
        track.insert(hidden);

        assert!(track.sample(9.5).unwrap().visible);
        assert!(!track.sample(10.0).unwrap().visible);
    }

    struct InterpolationTableFixture;

    impl InterpolationTableFixture {
        fn ease() -> crate::interpolation::InterpolationTable {
            crate::interpolation::InterpolationTable::build([100, 10, 110, 20])
        }
    }
}

//! 动画关键帧
//!
//! 五类关键帧共享「有时刻、可比较」的契约（[`KeyframeBase`]），
//! 具体负载各自独立，另提供 [`Keyframe`] 标签联合给泛用工具使用。

use glam::{Quat, Vec3, Vec4};

use crate::interpolation::InterpolationTable;

/// 存储时刻（帧粒度）。查询时刻允许小数，见 [`crate::track::Track`]。
pub type FrameIndex = u64;

/// 关键帧公共契约
pub trait KeyframeBase {
    fn frame_index(&self) -> FrameIndex;

    /// 层索引，仅骨骼关键帧使用
    fn layer_index(&self) -> u32 {
        0
    }

    /// 绑定模型时补出的隐式 0 帧
    fn identity_at(frame_index: FrameIndex) -> Self
    where
        Self: Sized;

    /// 是否为哨兵值（恒等变换/零权重），seek 时允许跳过
    fn is_identity(&self) -> bool {
        false
    }
}

/// 骨骼关键帧的四个通道曲线 {X, Y, Z, 旋转}
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneInterpolation {
    pub translation_x: InterpolationTable,
    pub translation_y: InterpolationTable,
    pub translation_z: InterpolationTable,
    pub orientation: InterpolationTable,
}

/// 骨骼关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct BoneKeyframe {
    pub frame_index: FrameIndex,
    pub layer_index: u32,
    pub translation: Vec3,
    pub orientation: Quat,
    pub interpolation: BoneInterpolation,
}

impl BoneKeyframe {
    pub fn new(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            layer_index: 0,
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            interpolation: BoneInterpolation::default(),
        }
    }
}

impl KeyframeBase for BoneKeyframe {
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn layer_index(&self) -> u32 {
        self.layer_index
    }

    fn identity_at(frame_index: FrameIndex) -> Self {
        Self::new(frame_index)
    }

    fn is_identity(&self) -> bool {
        self.translation == Vec3::ZERO && self.orientation == Quat::IDENTITY
    }
}

/// Morph 关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct MorphKeyframe {
    pub frame_index: FrameIndex,
    pub weight: f32,
    pub interpolation: InterpolationTable,
}

impl MorphKeyframe {
    pub fn new(frame_index: FrameIndex, weight: f32) -> Self {
        Self {
            frame_index,
            weight,
            interpolation: InterpolationTable::default(),
        }
    }
}

impl KeyframeBase for MorphKeyframe {
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn identity_at(frame_index: FrameIndex) -> Self {
        Self::new(frame_index, 0.0)
    }

    fn is_identity(&self) -> bool {
        self.weight == 0.0
    }
}

/// 相机关键帧的六个通道曲线
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraInterpolation {
    pub lookat_x: InterpolationTable,
    pub lookat_y: InterpolationTable,
    pub lookat_z: InterpolationTable,
    pub angle: InterpolationTable,
    pub distance: InterpolationTable,
    pub fov: InterpolationTable,
}

/// 相机关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct CameraKeyframe {
    pub frame_index: FrameIndex,
    pub look_at: Vec3,
    /// 欧拉角（弧度）
    pub angle: Vec3,
    pub distance: f32,
    pub fov: f32,
    pub interpolation: CameraInterpolation,
}

impl CameraKeyframe {
    pub fn new(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            look_at: Vec3::ZERO,
            angle: Vec3::ZERO,
            distance: 0.0,
            fov: 30.0,
            interpolation: CameraInterpolation::default(),
        }
    }
}

impl KeyframeBase for CameraKeyframe {
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn identity_at(frame_index: FrameIndex) -> Self {
        Self::new(frame_index)
    }
}

/// 光源关键帧（仅线性插值，不带曲线）
#[derive(Clone, Debug, PartialEq)]
pub struct LightKeyframe {
    pub frame_index: FrameIndex,
    pub color: Vec3,
    pub direction: Vec3,
}

impl LightKeyframe {
    pub fn new(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            color: Vec3::splat(0.6),
            direction: Vec3::new(-0.5, -1.0, 0.5),
        }
    }
}

impl KeyframeBase for LightKeyframe {
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn identity_at(frame_index: FrameIndex) -> Self {
        Self::new(frame_index)
    }
}

/// 某根骨骼在该帧的 IK 启用状态，骨骼以名称表 id 引用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelConstraintState {
    pub bone_id: i32,
    pub enabled: bool,
}

/// 模型关键帧（可见性、描边、IK 开关）
#[derive(Clone, Debug, PartialEq)]
pub struct ModelKeyframe {
    pub frame_index: FrameIndex,
    pub visible: bool,
    pub edge_color: Vec4,
    pub edge_width: f32,
    pub constraint_states: Vec<ModelConstraintState>,
}

impl ModelKeyframe {
    pub fn new(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            visible: true,
            edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            edge_width: 1.0,
            constraint_states: Vec::new(),
        }
    }
}

impl KeyframeBase for ModelKeyframe {
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn identity_at(frame_index: FrameIndex) -> Self {
        Self::new(frame_index)
    }
}

/// 关键帧标签联合
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframe {
    Bone(BoneKeyframe),
    Morph(MorphKeyframe),
    Camera(CameraKeyframe),
    Light(LightKeyframe),
    Model(ModelKeyframe),
}

impl Keyframe {
    pub fn frame_index(&self) -> FrameIndex {
        match self {
            Keyframe::Bone(k) => k.frame_index,
            Keyframe::Morph(k) => k.frame_index,
            Keyframe::Camera(k) => k.frame_index,
            Keyframe::Light(k) => k.frame_index,
            Keyframe::Model(k) => k.frame_index,
        }
    }

    pub fn layer_index(&self) -> u32 {
        match self {
            Keyframe::Bone(k) => k.layer_index,
            _ => 0,
        }
    }
}

impl From<BoneKeyframe> for Keyframe {
    fn from(value: BoneKeyframe) -> Self {
        Keyframe::Bone(value)
    }
}

impl From<MorphKeyframe> for Keyframe {
    fn from(value: MorphKeyframe) -> Self {
        Keyframe::Morph(value)
    }
}

impl From<CameraKeyframe> for Keyframe {
    fn from(value: CameraKeyframe) -> Self {
        Keyframe::Camera(value)
    }
}

impl From<LightKeyframe> for Keyframe {
    fn from(value: LightKeyframe) -> Self {
        Keyframe::Light(value)
    }
}

impl From<ModelKeyframe> for Keyframe {
    fn from(value: ModelKeyframe) -> Self {
        Keyframe::Model(value)
    }
}

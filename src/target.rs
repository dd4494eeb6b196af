//! 外部绑定目标
//!
//! 动画求值的写出端。模型由宿主持有，这里只定义解析句柄与写回的
//! 接口（两阶段绑定：先按名称解析成句柄，逐帧只用句柄）。
//! 相机/光源没有外部对象，求值结果以值类型交给调用方。

use glam::{Quat, Vec3, Vec4};

use crate::keyframe::ModelConstraintState;

/// 骨骼轨道求值结果（局部平移 + 局部旋转）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub orientation: Quat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

/// 相机轨道求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraTransform {
    pub look_at: Vec3,
    pub angle: Vec3,
    pub distance: f32,
    pub fov: f32,
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self {
            look_at: Vec3::ZERO,
            angle: Vec3::ZERO,
            distance: 0.0,
            fov: 30.0,
        }
    }
}

/// 光源轨道求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightTransform {
    pub color: Vec3,
    pub direction: Vec3,
}

impl Default for LightTransform {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.6),
            direction: Vec3::new(-0.5, -1.0, 0.5),
        }
    }
}

/// 模型轨道求值结果（阶跃，不插值）
#[derive(Clone, Debug, PartialEq)]
pub struct ModelState {
    pub visible: bool,
    pub edge_color: Vec4,
    pub edge_width: f32,
    pub constraint_states: Vec<ModelConstraintState>,
}

impl Default for ModelState {
    fn default() -> Self {
        Self {
            visible: true,
            edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            edge_width: 1.0,
            constraint_states: Vec::new(),
        }
    }
}

/// 动画写出的目标模型，由宿主实现
///
/// 查不到名称返回 `None` 不是错误：对应轨道照常求值，只是不写出。
pub trait TargetModel {
    fn find_bone(&self, name: &str) -> Option<usize>;

    fn find_morph(&self, name: &str) -> Option<usize>;

    fn set_bone_transform(&mut self, bone: usize, transform: &BoneTransform);

    fn set_morph_weight(&mut self, morph: usize, weight: f32);

    fn set_visible(&mut self, visible: bool);

    fn set_constraint_enabled(&mut self, bone: usize, enabled: bool);
}

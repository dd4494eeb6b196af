//! 关键帧动作编解码与回放引擎
//!
//! 提供 MMD 系动作数据的核心功能：
//! - 二进制动作文件读写（两阶段：预检 + 解析）
//! - 骨骼/Morph/相机/光源/模型可见性五类动画轨道
//! - 量化插值曲线求值与顺序寻址加速
//! - 顶点蒙皮混合（BDEF1/BDEF2/BDEF4/SDEF/QDEF）

mod buffer;
mod vmd;

pub mod animation;
pub mod interpolation;
pub mod keyframe;
pub mod motion;
pub mod name_table;
pub mod skinning;
pub mod target;
pub mod track;

pub use animation::Animation;
pub use interpolation::InterpolationTable;
pub use keyframe::{
    BoneInterpolation, BoneKeyframe, CameraInterpolation, CameraKeyframe, FrameIndex, Keyframe,
    KeyframeBase, LightKeyframe, ModelConstraintState, ModelKeyframe, MorphKeyframe,
};
pub use motion::Motion;
pub use name_table::NameTable;
pub use skinning::{compute_skinning, SkinningInput, SkinningOutput, VertexDeform};
pub use target::{BoneTransform, CameraTransform, LightTransform, ModelState, TargetModel};
pub use track::{Sample, Track};

use std::fmt;

use thiserror::Error;

/// 动作文件的段落标识（预检错误定位用）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Bone,
    Morph,
    Camera,
    Light,
    SelfShadow,
    Model,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Bone => "bone",
            Section::Morph => "morph",
            Section::Camera => "camera",
            Section::Light => "light",
            Section::SelfShadow => "self shadow",
            Section::Model => "model",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    #[error("buffer shorter than signature and name")]
    InvalidHeader,

    #[error("invalid motion signature")]
    InvalidSignature,

    #[error("{0} section count exceeds remaining buffer")]
    SectionCount(Section),

    #[error("keyframe record exceeds remaining buffer")]
    TruncatedRecord,
}

pub type Result<T> = std::result::Result<T, MotionError>;

//! 顶点蒙皮
//!
//! 把骨骼姿态矩阵按顶点的变形方式混合到位置和法线上。
//! 法线只吃旋转分量且不归一化，调用方在最终着色前统一归一化。

mod deform;

pub use deform::{compute_skinning, deform_normal, deform_position};

use glam::{Mat4, Vec3};

/// 顶点的骨骼绑定方式
///
/// 骨骼索引为负表示未绑定，求值时按单位矩阵处理。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VertexDeform {
    /// 单骨骼
    Bdef1 { bone: i32 },
    /// 双骨骼，第二权重恒为 `1 - weight`
    Bdef2 { bones: [i32; 2], weight: f32 },
    /// 四骨骼加权
    Bdef4 { bones: [i32; 4], weights: [f32; 4] },
    /// 球面变形，带中心点与两个半径控制点
    Sdef {
        bones: [i32; 2],
        weight: f32,
        c: Vec3,
        r0: Vec3,
        r1: Vec3,
    },
    /// 对偶四元数变形，当前按线性四骨骼混合求值
    Qdef { bones: [i32; 4], weights: [f32; 4] },
}

/// 一批顶点的蒙皮输入
pub struct SkinningInput<'a> {
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub deforms: &'a [VertexDeform],
    /// 骨骼局部→世界的姿态矩阵，按骨骼索引排列
    pub bone_matrices: &'a [Mat4],
}

/// 蒙皮结果，与输入顶点一一对应
pub struct SkinningOutput {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

//! 蒙皮求值
//!
//! 标量路径逐顶点求值，批量入口用 rayon 并行切分。

use glam::{Mat4, Quat, Vec3};
use rayon::prelude::*;

use super::{SkinningInput, SkinningOutput, VertexDeform};

/// 负索引与越界索引都按未绑定处理
fn matrix_at(matrices: &[Mat4], index: i32) -> Mat4 {
    if index < 0 {
        return Mat4::IDENTITY;
    }
    matrices.get(index as usize).copied().unwrap_or(Mat4::IDENTITY)
}

/// 顶点位置蒙皮
pub fn deform_position(position: Vec3, deform: &VertexDeform, matrices: &[Mat4]) -> Vec3 {
    match *deform {
        VertexDeform::Bdef1 { bone } => matrix_at(matrices, bone).transform_point3(position),
        VertexDeform::Bdef2 { bones, weight } => {
            let p0 = matrix_at(matrices, bones[0]).transform_point3(position);
            let p1 = matrix_at(matrices, bones[1]).transform_point3(position);
            p0 * weight + p1 * (1.0 - weight)
        }
        VertexDeform::Bdef4 { bones, weights } | VertexDeform::Qdef { bones, weights } => {
            let mut blended = Vec3::ZERO;
            for (bone, weight) in bones.iter().zip(weights) {
                if weight != 0.0 {
                    blended += matrix_at(matrices, *bone).transform_point3(position) * weight;
                }
            }
            blended
        }
        VertexDeform::Sdef {
            bones,
            weight,
            c,
            r0,
            r1,
        } => {
            let w0 = weight;
            let w1 = 1.0 - weight;
            let m0 = matrix_at(matrices, bones[0]);
            let m1 = matrix_at(matrices, bones[1]);

            // 半径控制点先向加权平均收缩一半，抑制弯折处的体积塌陷
            let rw = r0 * w0 + r1 * w1;
            let cr0 = c + (r0 - rw) * 0.5;
            let cr1 = c + (r1 - rw) * 0.5;

            let rotation = sdef_rotation(&m0, &m1, w1);
            rotation * (position - c)
                + m0.transform_point3(cr0) * w0
                + m1.transform_point3(cr1) * w1
        }
    }
}

/// 法线蒙皮：只施加旋转分量，结果不归一化
pub fn deform_normal(normal: Vec3, deform: &VertexDeform, matrices: &[Mat4]) -> Vec3 {
    match *deform {
        VertexDeform::Bdef1 { bone } => matrix_at(matrices, bone).transform_vector3(normal),
        VertexDeform::Bdef2 { bones, weight } => {
            let n0 = matrix_at(matrices, bones[0]).transform_vector3(normal);
            let n1 = matrix_at(matrices, bones[1]).transform_vector3(normal);
            n0 * weight + n1 * (1.0 - weight)
        }
        VertexDeform::Bdef4 { bones, weights } | VertexDeform::Qdef { bones, weights } => {
            let mut blended = Vec3::ZERO;
            for (bone, weight) in bones.iter().zip(weights) {
                if weight != 0.0 {
                    blended += matrix_at(matrices, *bone).transform_vector3(normal) * weight;
                }
            }
            blended
        }
        VertexDeform::Sdef { bones, weight, .. } => {
            let m0 = matrix_at(matrices, bones[0]);
            let m1 = matrix_at(matrices, bones[1]);
            sdef_rotation(&m0, &m1, 1.0 - weight) * normal
        }
    }
}

fn sdef_rotation(m0: &Mat4, m1: &Mat4, t: f32) -> Quat {
    let q0 = Quat::from_mat4(m0);
    let q1 = Quat::from_mat4(m1);
    q0.slerp(q1, t)
}

/// 批量蒙皮，按顶点并行
pub fn compute_skinning(input: &SkinningInput) -> SkinningOutput {
    let (positions, normals) = input
        .positions
        .par_iter()
        .zip(input.normals.par_iter())
        .zip(input.deforms.par_iter())
        .map(|((position, normal), deform)| {
            (
                deform_position(*position, deform, input.bone_matrices),
                deform_normal(*normal, deform, input.bone_matrices),
            )
        })
        .unzip();
    SkinningOutput { positions, normals }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(offset: Vec3) -> Mat4 {
        Mat4::from_translation(offset)
    }

    #[test]
    fn test_bdef1_follows_bone() {
        let matrices = [translate(Vec3::new(0.0, 2.0, 0.0))];
        let deform = VertexDeform::Bdef1 { bone: 0 };
        let moved = deform_position(Vec3::new(1.0, 0.0, 0.0), &deform, &matrices);
        assert!((moved - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_unbound_bone_is_identity() {
        let matrices = [translate(Vec3::new(0.0, 2.0, 0.0))];
        let deform = VertexDeform::Bdef1 { bone: -1 };
        let position = Vec3::new(1.0, 1.0, 1.0);
        assert_eq!(deform_position(position, &deform, &matrices), position);
    }

    #[test]
    fn test_bdef2_weight_law() {
        let matrices = [
            translate(Vec3::new(0.0, 10.0, 0.0)),
            translate(Vec3::new(0.0, -10.0, 0.0)),
        ];
        let deform = VertexDeform::Bdef2 {
            bones: [0, 1],
            weight: 0.75,
        };
        // w=0.75 → 0.75*(+10) + 0.25*(-10) = +5
        let moved = deform_position(Vec3::ZERO, &deform, &matrices);
        assert!((moved - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_bdef4_partition_of_unity() {
        let offset = Vec3::new(3.0, -1.0, 2.0);
        let matrices = [translate(offset); 4];
        let deform = VertexDeform::Bdef4 {
            bones: [0, 1, 2, 3],
            weights: [0.4, 0.3, 0.2, 0.1],
        };
        // 权重和为 1 且矩阵相同,结果等于单矩阵变换
        let position = Vec3::new(1.0, 1.0, 1.0);
        let moved = deform_position(position, &deform, &matrices);
        assert!((moved - (position + offset)).length() < 1e-5);
    }

    #[test]
    fn test_sdef_matches_rigid_transform_when_bones_agree() {
        let offset = Vec3::new(0.0, 1.0, 0.0);
        let matrices = [translate(offset), translate(offset)];
        let deform = VertexDeform::Sdef {
            bones: [0, 1],
            weight: 0.5,
            c: Vec3::new(0.0, 5.0, 0.0),
            r0: Vec3::new(0.0, 6.0, 0.0),
            r1: Vec3::new(0.0, 4.0, 0.0),
        };
        let position = Vec3::new(1.0, 5.0, 0.0);
        let moved = deform_position(position, &deform, &matrices);
        assert!((moved - (position + offset)).length() < 1e-4);
    }

    #[test]
    fn test_normal_ignores_translation() {
        let mut matrix = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        matrix.w_axis = glam::Vec4::new(100.0, 100.0, 100.0, 1.0);
        let deform = VertexDeform::Bdef1 { bone: 0 };
        let rotated = deform_normal(Vec3::X, &deform, &[matrix]);
        assert!((rotated - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_blended_normal_not_normalized() {
        let matrices = [
            Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Mat4::from_rotation_z(-std::f32::consts::FRAC_PI_2),
        ];
        let deform = VertexDeform::Bdef2 {
            bones: [0, 1],
            weight: 0.5,
        };
        // 相反旋转各半,混合后长度塌缩;此处不做归一化
        let blended = deform_normal(Vec3::X, &deform, &matrices);
        assert!(blended.length() < 0.5);
    }

    #[test]
    fn test_qdef_blends_like_bdef4() {
        let matrices = [
            translate(Vec3::new(2.0, 0.0, 0.0)),
            translate(Vec3::new(0.0, 2.0, 0.0)),
            Mat4::IDENTITY,
            Mat4::IDENTITY,
        ];
        let weights = [0.5, 0.5, 0.0, 0.0];
        let qdef = VertexDeform::Qdef {
            bones: [0, 1, 2, 3],
            weights,
        };
        let bdef = VertexDeform::Bdef4 {
            bones: [0, 1, 2, 3],
            weights,
        };
        let position = Vec3::ONE;
        assert_eq!(
            deform_position(position, &qdef, &matrices),
            deform_position(position, &bdef, &matrices)
        );
    }

    #[test]
    fn test_compute_skinning_batch() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = vec![Vec3::Y; 3];
        let deforms = vec![VertexDeform::Bdef1 { bone: 0 }; 3];
        let matrices = [translate(Vec3::new(0.0, 0.0, 5.0))];

        let output = compute_skinning(&SkinningInput {
            positions: &positions,
            normals: &normals,
            deforms: &deforms,
            bone_matrices: &matrices,
        });

        assert_eq!(output.positions.len(), 3);
        assert_eq!(output.normals.len(), 3);
        for (moved, original) in output.positions.iter().zip(&positions) {
            assert!((*moved - (*original + Vec3::new(0.0, 0.0, 5.0))).length() < 1e-6);
        }
        for normal in &output.normals {
            assert!((*normal - Vec3::Y).length() < 1e-6);
        }
    }
}

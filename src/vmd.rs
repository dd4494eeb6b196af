//! 二进制动作文件编解码
//!
//! 固定小端布局，段顺序 {头, 骨骼, Morph, 相机, 光源, 自阴影, 模型}。
//! 读取分两阶段：`preparse` 只做边界验证、不分配，任何截断/越界在这里
//! 变成类型化错误；通过之后 `parse` 才构建关键帧。`estimate_size` 与
//! `save` 的字节数严格相等。

use crate::animation::Animation;
use crate::buffer::{Buffer, MutableBuffer};
use crate::interpolation::InterpolationTable;
use crate::keyframe::{
    BoneKeyframe, CameraKeyframe, KeyframeBase, LightKeyframe, ModelConstraintState,
    ModelKeyframe, MorphKeyframe,
};
use crate::motion::{Motion, SINGLETON_TRACK};
use crate::track::Track;
use crate::{MotionError, Result, Section};

const SIGNATURE: &[u8] = b"Vocaloid Motion Data 0002";
const SIGNATURE_SIZE: usize = 30;
const TARGET_NAME_LENGTH: usize = 20;
const HEADER_SIZE: usize = SIGNATURE_SIZE + TARGET_NAME_LENGTH;

const BONE_NAME_LENGTH: usize = 15;
const MORPH_NAME_LENGTH: usize = 15;
const CONSTRAINT_BONE_NAME_LENGTH: usize = 20;

// 各段的固定记录步长
const BONE_RECORD_SIZE: usize = BONE_NAME_LENGTH + 8 + 12 + 16 + 16;
const MORPH_RECORD_SIZE: usize = MORPH_NAME_LENGTH + 8 + 4 + 4;
const CAMERA_RECORD_SIZE: usize = 4 + 4 + 12 + 12 + 24 + 4;
const LIGHT_RECORD_SIZE: usize = 4 + 12 + 12;
const SELF_SHADOW_RECORD_SIZE: usize = 4 + 1 + 4;
// 模型记录:固定头 + 变长 IK 列表
const MODEL_RECORD_FIXED_SIZE: usize = 4 + 1 + 4;
const CONSTRAINT_STATE_SIZE: usize = CONSTRAINT_BONE_NAME_LENGTH + 1;

impl Motion {
    /// 从字节缓冲解码
    pub fn load(data: &[u8]) -> Result<Motion> {
        Self::load_with_offset(data, 0)
    }

    /// 从字节缓冲解码，所有帧索引整体平移 `offset`
    pub fn load_with_offset(data: &[u8], offset: u64) -> Result<Motion> {
        preparse(data)?;
        let mut motion = Motion::new();
        parse(&mut motion, data, offset)?;
        log::debug!(
            "motion loaded: {} bone, {} morph, {} camera, {} light, {} model keyframes, duration {}",
            motion.bone.keyframe_count(),
            motion.morph.keyframe_count(),
            motion.camera.keyframe_count(),
            motion.light.keyframe_count(),
            motion.model.keyframe_count(),
            motion.duration(),
        );
        Ok(motion)
    }

    /// 编码为字节缓冲。写出字节数恒等于 [`Motion::estimate_size`]。
    pub fn save(&self) -> Vec<u8> {
        let mut buffer = MutableBuffer::with_capacity(self.estimate_size());

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature[..SIGNATURE.len()].copy_from_slice(SIGNATURE);
        buffer.write_bytes(&signature);
        buffer.write_fixed_string(&self.target_model_name, TARGET_NAME_LENGTH);

        buffer.write_i32(self.bone.keyframe_count() as i32);
        for track in sorted_tracks(&self.bone) {
            for keyframe in track.keyframes() {
                save_bone_keyframe(&mut buffer, track.name(), keyframe);
            }
        }

        buffer.write_i32(self.morph.keyframe_count() as i32);
        for track in sorted_tracks(&self.morph) {
            for keyframe in track.keyframes() {
                save_morph_keyframe(&mut buffer, track.name(), keyframe);
            }
        }

        buffer.write_i32(self.camera.keyframe_count() as i32);
        for track in self.camera.tracks() {
            for keyframe in track.keyframes() {
                save_camera_keyframe(&mut buffer, keyframe);
            }
        }

        buffer.write_i32(self.light.keyframe_count() as i32);
        for track in self.light.tracks() {
            for keyframe in track.keyframes() {
                save_light_keyframe(&mut buffer, keyframe);
            }
        }

        // 自阴影段恒为空
        buffer.write_i32(0);

        buffer.write_i32(self.model.keyframe_count() as i32);
        for track in self.model.tracks() {
            for keyframe in track.keyframes() {
                save_model_keyframe(&mut buffer, self, keyframe);
            }
        }

        buffer.into_vec()
    }

    /// `save` 将写出的确切字节数
    pub fn estimate_size(&self) -> usize {
        let model_section: usize = self
            .model
            .tracks()
            .iter()
            .flat_map(|track| track.keyframes())
            .map(|keyframe| {
                MODEL_RECORD_FIXED_SIZE + keyframe.constraint_states.len() * CONSTRAINT_STATE_SIZE
            })
            .sum();
        HEADER_SIZE
            + 4
            + self.bone.keyframe_count() * BONE_RECORD_SIZE
            + 4
            + self.morph.keyframe_count() * MORPH_RECORD_SIZE
            + 4
            + self.camera.keyframe_count() * CAMERA_RECORD_SIZE
            + 4
            + self.light.keyframe_count() * LIGHT_RECORD_SIZE
            + 4
            + 4
            + model_section
    }
}

/// 轨道按名称排序，保证写出顺序确定
fn sorted_tracks<K: KeyframeBase>(animation: &Animation<K>) -> Vec<&Track<K>> {
    let mut tracks: Vec<&Track<K>> = animation.tracks().iter().collect();
    tracks.sort_by(|a, b| a.name().cmp(b.name()));
    tracks
}

/// 验证全部段的边界，不分配、不构建
fn preparse(data: &[u8]) -> Result<()> {
    if data.len() < HEADER_SIZE {
        return Err(MotionError::InvalidHeader);
    }
    if &data[..SIGNATURE.len()] != SIGNATURE {
        return Err(MotionError::InvalidSignature);
    }

    let mut cursor = HEADER_SIZE;
    cursor = check_fixed_section(data, cursor, Section::Bone, BONE_RECORD_SIZE)?;
    cursor = check_fixed_section(data, cursor, Section::Morph, MORPH_RECORD_SIZE)?;

    // Morph 段之后允许文件在段边界处提前结束
    for (section, stride) in [
        (Section::Camera, CAMERA_RECORD_SIZE),
        (Section::Light, LIGHT_RECORD_SIZE),
        (Section::SelfShadow, SELF_SHADOW_RECORD_SIZE),
    ] {
        if cursor == data.len() {
            return Ok(());
        }
        cursor = check_fixed_section(data, cursor, section, stride)?;
    }
    if cursor == data.len() {
        return Ok(());
    }

    check_model_section(data, cursor)
}

/// 校验「4 字节计数 + 计数×步长」能装进剩余缓冲，返回新游标
fn check_fixed_section(
    data: &[u8],
    cursor: usize,
    section: Section,
    stride: usize,
) -> Result<usize> {
    let count = read_section_count(data, cursor, section)?;
    let body = count
        .checked_mul(stride)
        .ok_or(MotionError::SectionCount(section))?;
    let remaining = data.len() - cursor - 4;
    if body > remaining {
        return Err(MotionError::SectionCount(section));
    }
    Ok(cursor + 4 + body)
}

fn check_model_section(data: &[u8], cursor: usize) -> Result<()> {
    let count = read_section_count(data, cursor, Section::Model)?;
    let mut cursor = cursor + 4;
    for _ in 0..count {
        if data.len() - cursor < MODEL_RECORD_FIXED_SIZE {
            return Err(MotionError::TruncatedRecord);
        }
        let raw = &data[cursor + 5..cursor + 9];
        let constraints = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        if constraints < 0 {
            return Err(MotionError::TruncatedRecord);
        }
        let body = (constraints as usize)
            .checked_mul(CONSTRAINT_STATE_SIZE)
            .ok_or(MotionError::TruncatedRecord)?;
        cursor += MODEL_RECORD_FIXED_SIZE;
        if data.len() - cursor < body {
            return Err(MotionError::TruncatedRecord);
        }
        cursor += body;
    }
    Ok(())
}

fn read_section_count(data: &[u8], cursor: usize, section: Section) -> Result<usize> {
    if data.len() - cursor < 4 {
        return Err(MotionError::SectionCount(section));
    }
    let raw = &data[cursor..cursor + 4];
    let count = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if count < 0 {
        return Err(MotionError::SectionCount(section));
    }
    Ok(count as usize)
}

/// 构建阶段。边界已由 `preparse` 证明，这里的 `?` 只是防御性传播。
fn parse(motion: &mut Motion, data: &[u8], offset: u64) -> Result<()> {
    let mut buffer = Buffer::new(data);
    buffer.skip(SIGNATURE_SIZE)?;
    motion.target_model_name = buffer.read_fixed_string(TARGET_NAME_LENGTH)?;

    let bone_count = buffer.read_i32()? as usize;
    for _ in 0..bone_count {
        let (name, keyframe) = parse_bone_keyframe(&mut buffer, offset)?;
        motion.bone.add_keyframe(&name, keyframe);
    }

    let morph_count = buffer.read_i32()? as usize;
    for _ in 0..morph_count {
        let (name, keyframe) = parse_morph_keyframe(&mut buffer, offset)?;
        motion.morph.add_keyframe(&name, keyframe);
    }
    if buffer.is_end() {
        return Ok(());
    }

    let camera_count = buffer.read_i32()? as usize;
    for _ in 0..camera_count {
        let keyframe = parse_camera_keyframe(&mut buffer, offset)?;
        motion.camera.add_keyframe(SINGLETON_TRACK, keyframe);
    }
    if buffer.is_end() {
        return Ok(());
    }

    let light_count = buffer.read_i32()? as usize;
    for _ in 0..light_count {
        let keyframe = parse_light_keyframe(&mut buffer, offset)?;
        motion.light.add_keyframe(SINGLETON_TRACK, keyframe);
    }
    if buffer.is_end() {
        return Ok(());
    }

    // 自阴影段只校验不保留
    let self_shadow_count = buffer.read_i32()? as usize;
    buffer.skip(self_shadow_count * SELF_SHADOW_RECORD_SIZE)?;
    if buffer.is_end() {
        return Ok(());
    }

    let model_count = buffer.read_i32()? as usize;
    for _ in 0..model_count {
        let keyframe = parse_model_keyframe(motion, &mut buffer, offset)?;
        motion.model.add_keyframe(SINGLETON_TRACK, keyframe);
    }
    Ok(())
}

fn parse_bone_keyframe(buffer: &mut Buffer, offset: u64) -> Result<(String, BoneKeyframe)> {
    let name = buffer.read_fixed_string(BONE_NAME_LENGTH)?;
    let mut keyframe = BoneKeyframe::new(buffer.read_u64()? + offset);
    keyframe.translation = buffer.read_vec3()?;
    keyframe.orientation = buffer.read_quat()?;
    keyframe.interpolation.translation_x = read_table(buffer)?;
    keyframe.interpolation.translation_y = read_table(buffer)?;
    keyframe.interpolation.translation_z = read_table(buffer)?;
    keyframe.interpolation.orientation = read_table(buffer)?;
    Ok((name, keyframe))
}

fn save_bone_keyframe(buffer: &mut MutableBuffer, name: &str, keyframe: &BoneKeyframe) {
    buffer.write_fixed_string(name, BONE_NAME_LENGTH);
    buffer.write_u64(keyframe.frame_index);
    buffer.write_vec3(keyframe.translation);
    buffer.write_quat(keyframe.orientation);
    buffer.write_bytes(&keyframe.interpolation.translation_x.control());
    buffer.write_bytes(&keyframe.interpolation.translation_y.control());
    buffer.write_bytes(&keyframe.interpolation.translation_z.control());
    buffer.write_bytes(&keyframe.interpolation.orientation.control());
}

fn parse_morph_keyframe(buffer: &mut Buffer, offset: u64) -> Result<(String, MorphKeyframe)> {
    let name = buffer.read_fixed_string(MORPH_NAME_LENGTH)?;
    let frame_index = buffer.read_u64()? + offset;
    let weight = buffer.read_f32()?;
    let mut keyframe = MorphKeyframe::new(frame_index, weight);
    keyframe.interpolation = read_table(buffer)?;
    Ok((name, keyframe))
}

fn save_morph_keyframe(buffer: &mut MutableBuffer, name: &str, keyframe: &MorphKeyframe) {
    buffer.write_fixed_string(name, MORPH_NAME_LENGTH);
    buffer.write_u64(keyframe.frame_index);
    buffer.write_f32(keyframe.weight);
    buffer.write_bytes(&keyframe.interpolation.control());
}

fn parse_camera_keyframe(buffer: &mut Buffer, offset: u64) -> Result<CameraKeyframe> {
    let mut keyframe = CameraKeyframe::new(buffer.read_u32()? as u64 + offset);
    keyframe.distance = buffer.read_f32()?;
    keyframe.look_at = buffer.read_vec3()?;
    keyframe.angle = buffer.read_vec3()?;
    keyframe.interpolation.lookat_x = read_table(buffer)?;
    keyframe.interpolation.lookat_y = read_table(buffer)?;
    keyframe.interpolation.lookat_z = read_table(buffer)?;
    keyframe.interpolation.angle = read_table(buffer)?;
    keyframe.interpolation.distance = read_table(buffer)?;
    keyframe.interpolation.fov = read_table(buffer)?;
    keyframe.fov = buffer.read_f32()?;
    Ok(keyframe)
}

fn save_camera_keyframe(buffer: &mut MutableBuffer, keyframe: &CameraKeyframe) {
    buffer.write_u32(keyframe.frame_index as u32);
    buffer.write_f32(keyframe.distance);
    buffer.write_vec3(keyframe.look_at);
    buffer.write_vec3(keyframe.angle);
    buffer.write_bytes(&keyframe.interpolation.lookat_x.control());
    buffer.write_bytes(&keyframe.interpolation.lookat_y.control());
    buffer.write_bytes(&keyframe.interpolation.lookat_z.control());
    buffer.write_bytes(&keyframe.interpolation.angle.control());
    buffer.write_bytes(&keyframe.interpolation.distance.control());
    buffer.write_bytes(&keyframe.interpolation.fov.control());
    buffer.write_f32(keyframe.fov);
}

fn parse_light_keyframe(buffer: &mut Buffer, offset: u64) -> Result<LightKeyframe> {
    let mut keyframe = LightKeyframe::new(buffer.read_u32()? as u64 + offset);
    keyframe.color = buffer.read_vec3()?;
    keyframe.direction = buffer.read_vec3()?;
    Ok(keyframe)
}

fn save_light_keyframe(buffer: &mut MutableBuffer, keyframe: &LightKeyframe) {
    buffer.write_u32(keyframe.frame_index as u32);
    buffer.write_vec3(keyframe.color);
    buffer.write_vec3(keyframe.direction);
}

fn parse_model_keyframe(
    motion: &mut Motion,
    buffer: &mut Buffer,
    offset: u64,
) -> Result<ModelKeyframe> {
    let mut keyframe = ModelKeyframe::new(buffer.read_u32()? as u64 + offset);
    keyframe.visible = buffer.read_u8()? != 0;
    let count = buffer.read_i32()?.max(0) as usize;
    keyframe.constraint_states.reserve(count);
    for _ in 0..count {
        let name = buffer.read_fixed_string(CONSTRAINT_BONE_NAME_LENGTH)?;
        let bone_id = motion.bone_names.add_name(&name);
        let enabled = buffer.read_u8()? != 0;
        keyframe
            .constraint_states
            .push(ModelConstraintState { bone_id, enabled });
    }
    Ok(keyframe)
}

fn save_model_keyframe(buffer: &mut MutableBuffer, motion: &Motion, keyframe: &ModelKeyframe) {
    buffer.write_u32(keyframe.frame_index as u32);
    buffer.write_u8(keyframe.visible as u8);
    buffer.write_i32(keyframe.constraint_states.len() as i32);
    for state in &keyframe.constraint_states {
        let name = motion.bone_names.value(state.bone_id).unwrap_or("");
        buffer.write_fixed_string(name, CONSTRAINT_BONE_NAME_LENGTH);
        buffer.write_u8(state.enabled as u8);
    }
}

fn read_table(buffer: &mut Buffer) -> Result<InterpolationTable> {
    let raw = buffer.read_bytes(4)?;
    Ok(InterpolationTable::build([raw[0], raw[1], raw[2], raw[3]]))
}

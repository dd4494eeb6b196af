//! Motion 聚合
//!
//! 五类动画的持有者：播放时钟、模型绑定、关键帧编辑入口都在这里。
//! 二进制编解码见 `vmd` 模块（同一类型上的另一组 impl）。

use std::collections::HashMap;

use crate::animation::Animation;
use crate::keyframe::{
    BoneKeyframe, CameraKeyframe, FrameIndex, LightKeyframe, ModelKeyframe, MorphKeyframe,
};
use crate::name_table::NameTable;
use crate::target::{CameraTransform, LightTransform, TargetModel};

/// 相机/光源/模型这类单例通道的内部轨道名
pub(crate) const SINGLETON_TRACK: &str = "";

/// 默认播放帧率
pub const DEFAULT_FPS: f32 = 30.0;

/// 一份完整的动作数据
#[derive(Debug)]
pub struct Motion {
    pub(crate) target_model_name: String,
    pub(crate) bone: Animation<BoneKeyframe>,
    pub(crate) morph: Animation<MorphKeyframe>,
    pub(crate) camera: Animation<CameraKeyframe>,
    pub(crate) light: Animation<LightKeyframe>,
    pub(crate) model: Animation<ModelKeyframe>,
    /// 模型关键帧的 IK 状态以 id 引用骨骼名
    pub(crate) bone_names: NameTable,
    /// 绑定时解析好的 id → 模型骨骼句柄，逐帧查表不再按名称解析
    constraint_handles: HashMap<i32, usize>,
    current_time: f32,
    active: bool,
    preferred_fps: f32,
    camera_state: CameraTransform,
    light_state: LightTransform,
}

impl Motion {
    pub fn new() -> Self {
        Self {
            target_model_name: String::new(),
            bone: Animation::new(),
            morph: Animation::new(),
            camera: Animation::new(),
            light: Animation::new(),
            model: Animation::new(),
            bone_names: NameTable::new(),
            constraint_handles: HashMap::new(),
            current_time: 0.0,
            active: true,
            preferred_fps: DEFAULT_FPS,
            camera_state: CameraTransform::default(),
            light_state: LightTransform::default(),
        }
    }

    pub fn target_model_name(&self) -> &str {
        &self.target_model_name
    }

    pub fn set_target_model_name(&mut self, name: impl Into<String>) {
        self.target_model_name = name.into();
    }

    /// 全部动画的最大帧索引
    pub fn duration(&self) -> FrameIndex {
        self.bone
            .duration()
            .max(self.morph.duration())
            .max(self.camera.duration())
            .max(self.light.duration())
            .max(self.model.duration())
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn preferred_fps(&self) -> f32 {
        self.preferred_fps
    }

    pub fn set_preferred_fps(&mut self, fps: f32) {
        if fps > 0.0 {
            self.preferred_fps = fps;
        }
    }

    /// 秒 → 帧
    pub fn seconds_to_frame(&self, seconds: f32) -> f32 {
        seconds * self.preferred_fps
    }

    /// 最近一次 seek 的相机取值
    pub fn camera(&self) -> CameraTransform {
        self.camera_state
    }

    /// 最近一次 seek 的光源取值
    pub fn light(&self) -> LightTransform {
        self.light_state
    }

    pub fn bone_animation(&self) -> &Animation<BoneKeyframe> {
        &self.bone
    }

    pub fn morph_animation(&self) -> &Animation<MorphKeyframe> {
        &self.morph
    }

    pub fn camera_animation(&self) -> &Animation<CameraKeyframe> {
        &self.camera
    }

    pub fn light_animation(&self) -> &Animation<LightKeyframe> {
        &self.light
    }

    pub fn model_animation(&self) -> &Animation<ModelKeyframe> {
        &self.model
    }

    pub fn bone_names(&self) -> &NameTable {
        &self.bone_names
    }

    /// 注册模型关键帧里引用的骨骼名，返回 id
    pub fn register_bone_name(&mut self, name: &str) -> i32 {
        self.bone_names.add_name(name)
    }

    /// 重新按名称解析全部轨道的外部句柄（两阶段绑定的解析阶段）。
    /// 传 `None` 清除全部句柄。关键帧数据不受影响。
    pub fn bind_model(&mut self, model: Option<&dyn TargetModel>) {
        match model {
            Some(model) => {
                self.bone.bind(|name| model.find_bone(name));
                self.morph.bind(|name| model.find_morph(name));
                self.constraint_handles.clear();
                for name in self.bone_names.names() {
                    if let (Some(id), Some(handle)) =
                        (self.bone_names.key(name), model.find_bone(name))
                    {
                        self.constraint_handles.insert(id, handle);
                    }
                }
                log::debug!(
                    "bind model: {} bone tracks, {} morph tracks, {} constraint handles",
                    self.bone.len(),
                    self.morph.len(),
                    self.constraint_handles.len()
                );
            }
            None => {
                self.bone.unbind();
                self.morph.unbind();
                self.constraint_handles.clear();
            }
        }
    }

    /// 求值 `time` 并把结果写到模型/内部相机光源状态
    pub fn seek(&mut self, time: f32, model: &mut dyn TargetModel) {
        self.current_time = time.max(0.0);

        self.bone.seek_with(self.current_time, |_, target, value| {
            if let Some(handle) = target {
                model.set_bone_transform(handle, &value);
            }
        });

        self.morph.seek_with(self.current_time, |_, target, value| {
            if let Some(handle) = target {
                model.set_morph_weight(handle, value);
            }
        });

        let handles = &self.constraint_handles;
        self.model.seek_with(self.current_time, |_, _, state| {
            model.set_visible(state.visible);
            for constraint in &state.constraint_states {
                if let Some(&handle) = handles.get(&constraint.bone_id) {
                    model.set_constraint_enabled(handle, constraint.enabled);
                }
            }
        });

        let mut camera_state = self.camera_state;
        self.camera.seek_with(self.current_time, |_, _, value| {
            camera_state = value;
        });
        self.camera_state = camera_state;

        let mut light_state = self.light_state;
        self.light.seek_with(self.current_time, |_, _, value| {
            light_state = value;
        });
        self.light_state = light_state;
    }

    /// 前进 `delta` 帧；越过总时长后清除 `active` 标志
    pub fn advance(&mut self, delta: f32, model: &mut dyn TargetModel) {
        let next = self.current_time + delta;
        self.seek(next, model);
        if self.current_time >= self.duration() as f32 {
            self.active = false;
        }
    }

    /// 重置播放时钟
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.active = true;
    }

    pub fn add_bone_keyframe(&mut self, name: &str, keyframe: BoneKeyframe) -> Option<BoneKeyframe> {
        self.bone.add_keyframe(name, keyframe)
    }

    pub fn replace_bone_keyframe(
        &mut self,
        name: &str,
        keyframe: BoneKeyframe,
    ) -> Option<BoneKeyframe> {
        self.bone.replace_keyframe(name, keyframe)
    }

    pub fn remove_bone_keyframe(
        &mut self,
        name: &str,
        frame_index: FrameIndex,
    ) -> Option<BoneKeyframe> {
        self.bone.remove_keyframe(name, frame_index)
    }

    pub fn add_morph_keyframe(
        &mut self,
        name: &str,
        keyframe: MorphKeyframe,
    ) -> Option<MorphKeyframe> {
        self.morph.add_keyframe(name, keyframe)
    }

    pub fn replace_morph_keyframe(
        &mut self,
        name: &str,
        keyframe: MorphKeyframe,
    ) -> Option<MorphKeyframe> {
        self.morph.replace_keyframe(name, keyframe)
    }

    pub fn remove_morph_keyframe(
        &mut self,
        name: &str,
        frame_index: FrameIndex,
    ) -> Option<MorphKeyframe> {
        self.morph.remove_keyframe(name, frame_index)
    }

    pub fn add_camera_keyframe(&mut self, keyframe: CameraKeyframe) -> Option<CameraKeyframe> {
        self.camera.add_keyframe(SINGLETON_TRACK, keyframe)
    }

    pub fn remove_camera_keyframe(&mut self, frame_index: FrameIndex) -> Option<CameraKeyframe> {
        self.camera.remove_keyframe(SINGLETON_TRACK, frame_index)
    }

    pub fn add_light_keyframe(&mut self, keyframe: LightKeyframe) -> Option<LightKeyframe> {
        self.light.add_keyframe(SINGLETON_TRACK, keyframe)
    }

    pub fn remove_light_keyframe(&mut self, frame_index: FrameIndex) -> Option<LightKeyframe> {
        self.light.remove_keyframe(SINGLETON_TRACK, frame_index)
    }

    pub fn add_model_keyframe(&mut self, keyframe: ModelKeyframe) -> Option<ModelKeyframe> {
        self.model.add_keyframe(SINGLETON_TRACK, keyframe)
    }

    pub fn remove_model_keyframe(&mut self, frame_index: FrameIndex) -> Option<ModelKeyframe> {
        self.model.remove_keyframe(SINGLETON_TRACK, frame_index)
    }

    /// 合并另一份动作的骨骼/Morph 轨道（同帧以 `other` 为准）
    pub fn merge(&mut self, other: &Motion) {
        for track in other.bone.tracks() {
            for keyframe in track.keyframes() {
                self.bone.add_keyframe(track.name(), keyframe.clone());
            }
        }
        for track in other.morph.tracks() {
            for keyframe in track.keyframes() {
                self.morph.add_keyframe(track.name(), keyframe.clone());
            }
        }
    }
}

impl Default for Motion {
    fn default() -> Self {
        Self::new()
    }
}

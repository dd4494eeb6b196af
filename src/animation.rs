//! 动画注册表
//!
//! 一种属性（骨骼 / Morph / 相机 / 光源 / 模型可见性）的名称 → 轨道
//! 映射，持有时长缓存与批量求值入口。轨道随首个关键帧创建、随最后
//! 一个关键帧移除而销毁。

use std::collections::HashMap;

use crate::keyframe::{FrameIndex, KeyframeBase};
use crate::track::{Sample, Track};

/// 一类属性的全部轨道
#[derive(Clone, Debug)]
pub struct Animation<K> {
    tracks: Vec<Track<K>>,
    index: HashMap<String, usize>,
    duration: FrameIndex,
}

impl<K: KeyframeBase> Animation<K> {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            index: HashMap::new(),
            duration: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// 全部轨道的最大帧索引
    pub fn duration(&self) -> FrameIndex {
        self.duration
    }

    /// 全部轨道的关键帧总数
    pub fn keyframe_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    pub fn track(&self, name: &str) -> Option<&Track<K>> {
        self.index.get(name).map(|&i| &self.tracks[i])
    }

    pub fn track_mut(&mut self, name: &str) -> Option<&mut Track<K>> {
        let i = *self.index.get(name)?;
        Some(&mut self.tracks[i])
    }

    pub fn tracks(&self) -> &[Track<K>] {
        &self.tracks
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(Track::name)
    }

    pub fn contains_track(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 插入关键帧；目标轨道不存在时创建。同 (帧, 层) 的旧帧被替换并返回
    pub fn add_keyframe(&mut self, name: &str, keyframe: K) -> Option<K> {
        let i = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.tracks.push(Track::new(name));
                let i = self.tracks.len() - 1;
                self.index.insert(name.to_string(), i);
                i
            }
        };
        let replaced = self.tracks[i].insert(keyframe);
        self.refresh_duration();
        replaced
    }

    /// 替换既有关键帧；轨道或帧不存在时不做任何事
    pub fn replace_keyframe(&mut self, name: &str, keyframe: K) -> Option<K> {
        let i = *self.index.get(name)?;
        self.tracks[i].find(keyframe.frame_index())?;
        let replaced = self.tracks[i].insert(keyframe);
        self.refresh_duration();
        replaced
    }

    /// 移除关键帧；轨道清空后随之销毁
    pub fn remove_keyframe(&mut self, name: &str, frame_index: FrameIndex) -> Option<K> {
        let i = *self.index.get(name)?;
        let removed = self.tracks[i].remove(frame_index)?;
        if self.tracks[i].is_empty() {
            self.tracks.remove(i);
            self.rebuild_index();
        }
        self.refresh_duration();
        Some(removed)
    }

    /// 重新按名称解析全部轨道的外部句柄，并补出缺失的隐式 0 帧。
    /// 关键帧数据不受影响。
    pub fn bind(&mut self, mut resolve: impl FnMut(&str) -> Option<usize>) {
        for track in &mut self.tracks {
            let target = resolve(track.name());
            track.set_target(target);
            if track.find(0).is_none() {
                track.insert(K::identity_at(0));
            }
        }
    }

    /// 清除全部轨道的外部句柄
    pub fn unbind(&mut self) {
        for track in &mut self.tracks {
            track.set_target(None);
        }
    }

    fn refresh_duration(&mut self) {
        self.duration = self
            .tracks
            .iter()
            .map(Track::max_frame_index)
            .max()
            .unwrap_or(0);
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, track) in self.tracks.iter().enumerate() {
            self.index.insert(track.name().to_string(), i);
        }
    }
}

impl<K: Sample> Animation<K> {
    /// 对每条轨道求值，结果连同轨道名与目标句柄交给 `apply`。
    ///
    /// 只有单个哨兵关键帧（恒等变换/零权重）的轨道会被跳过，
    /// 这是性能捷径而非正确性要求。
    pub fn seek_with(&mut self, query: f32, mut apply: impl FnMut(&str, Option<usize>, K::Output)) {
        for track in &mut self.tracks {
            if track.len() == 1 && track.keyframes()[0].is_identity() {
                continue;
            }
            let target = track.target();
            let Some(value) = track.sample(query) else {
                continue;
            };
            apply(track.name(), target, value);
        }
    }
}

impl<K: KeyframeBase> Default for Animation<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{BoneKeyframe, MorphKeyframe};
    use glam::Vec3;

    #[test]
    fn test_duration_tracks_max_frame() {
        let mut animation = Animation::new();
        animation.add_keyframe("a", MorphKeyframe::new(10, 1.0));
        animation.add_keyframe("b", MorphKeyframe::new(30, 1.0));
        assert_eq!(animation.duration(), 30);

        animation.remove_keyframe("b", 30);
        assert_eq!(animation.duration(), 10);
    }

    #[test]
    fn test_track_created_and_destroyed() {
        let mut animation = Animation::new();
        animation.add_keyframe("まばたき", MorphKeyframe::new(0, 0.5));
        assert!(animation.contains_track("まばたき"));

        animation.remove_keyframe("まばたき", 0);
        assert!(!animation.contains_track("まばたき"));
        assert!(animation.is_empty());
    }

    #[test]
    fn test_remove_rebuilds_index() {
        let mut animation = Animation::new();
        animation.add_keyframe("a", MorphKeyframe::new(1, 0.1));
        animation.add_keyframe("b", MorphKeyframe::new(2, 0.2));
        animation.add_keyframe("c", MorphKeyframe::new(3, 0.3));
        animation.remove_keyframe("a", 1);

        assert_eq!(animation.track("b").map(Track::len), Some(1));
        assert_eq!(animation.track("c").map(Track::len), Some(1));
    }

    #[test]
    fn test_replace_requires_existing_frame() {
        let mut animation = Animation::new();
        animation.add_keyframe("a", MorphKeyframe::new(5, 0.1));
        assert!(animation.replace_keyframe("a", MorphKeyframe::new(6, 0.9)).is_none());
        assert_eq!(animation.keyframe_count(), 1);

        let replaced = animation.replace_keyframe("a", MorphKeyframe::new(5, 0.9));
        assert_eq!(replaced.map(|k| k.weight), Some(0.1));
    }

    #[test]
    fn test_bind_synthesizes_frame_zero() {
        let mut animation = Animation::new();
        let mut keyframe = BoneKeyframe::new(10);
        keyframe.translation = Vec3::new(0.0, 1.0, 0.0);
        animation.add_keyframe("左腕", keyframe);

        animation.bind(|name| if name == "左腕" { Some(3) } else { None });
        let track = animation.track("左腕").unwrap();
        assert_eq!(track.target(), Some(3));
        assert_eq!(track.len(), 2);
        assert!(track.find(0).unwrap().is_identity());
    }

    #[test]
    fn test_bind_missing_target_is_not_error() {
        let mut animation = Animation::new();
        animation.add_keyframe("未知", MorphKeyframe::new(5, 1.0));
        animation.bind(|_| None);
        assert_eq!(animation.track("未知").unwrap().target(), None);
    }

    #[test]
    fn test_seek_skips_identity_sentinel() {
        let mut animation = Animation::new();
        animation.add_keyframe("idle", MorphKeyframe::new(0, 0.0));
        animation.add_keyframe("active", MorphKeyframe::new(0, 0.7));

        let mut seen = Vec::new();
        animation.seek_with(0.0, |name, _, value| seen.push((name.to_string(), value)));
        assert_eq!(seen, vec![("active".to_string(), 0.7)]);
    }
}

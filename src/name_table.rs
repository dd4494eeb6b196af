//! 名称间接表
//!
//! 为替代容器格式准备的双向查找：小整数 id ↔ 完整名称。
//! 模型关键帧的 IK 状态用 id 引用骨骼，避免逐关键帧重复名称字符串。

use std::collections::HashMap;

/// id ↔ 名称双向表，按内容去重
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    by_name: HashMap<String, i32>,
    by_id: HashMap<i32, String>,
    next_id: i32,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册名称，重复内容返回已有 id
    pub fn add_name(&mut self, name: &str) -> i32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
        id
    }

    /// 名称 → id
    pub fn key(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// id → 名称
    pub fn value(&self, key: i32) -> Option<&str> {
        self.by_id.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

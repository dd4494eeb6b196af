//! 有界字节缓冲读写
//!
//! 解析侧是一个带边界检查的游标，越界读取返回类型化错误而不是 panic；
//! 写入侧是一个可增长缓冲，写入不会失败。

use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec3};

use crate::{MotionError, Result};

/// 只读游标
pub struct Buffer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Buffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(MotionError::TruncatedRecord);
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    pub fn read_quat(&mut self) -> Result<Quat> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        let w = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    /// 读取固定宽度、null 填充的 Shift-JIS 字符串
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(decode_shift_jis(bytes))
    }
}

/// 可增长写缓冲
pub struct MutableBuffer {
    data: Vec<u8>,
}

impl MutableBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_i32(&mut raw, value);
        self.data.extend_from_slice(&raw);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, value);
        self.data.extend_from_slice(&raw);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_u64(&mut raw, value);
        self.data.extend_from_slice(&raw);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_f32(&mut raw, value);
        self.data.extend_from_slice(&raw);
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    /// 写入固定宽度字符串：Shift-JIS 编码，超长截断，不足 null 填充
    pub fn write_fixed_string(&mut self, value: &str, len: usize) {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(value);
        if encoded.len() >= len {
            self.data.extend_from_slice(&encoded[..len]);
        } else {
            self.data.extend_from_slice(&encoded);
            self.data.resize(self.data.len() + (len - encoded.len()), 0);
        }
    }
}

impl Default for MutableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// 解码 Shift-JIS 字符串（在首个 null 处截断）
pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (decoded, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes[..end]);
    decoded.into_owned()
}

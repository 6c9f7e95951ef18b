use std::borrow::Cow;

use binrw::binrw;

use crate::{FsError, Result};

/// 名字的最大字节数
pub const NAME_MAX_LEN: usize = 27;

/// 文件系统项的元信息
///
/// 名字为空的槽位是空闲的，删除后留下的墓碑也是如此。
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    inode_id: u32,
}

impl DirEntry {
    /// 元信息大小恒为32字节
    pub const SIZE: usize = 32;

    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        validate_name(name)?;
        let bytes = name.as_bytes();
        let mut raw = [0; NAME_MAX_LEN + 1];
        raw[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            name: raw,
            inode_id,
        })
    }

    /// 名字的原始字节，不含结尾的 \0
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    /// 别的实现写下的名字未必是合法 UTF-8
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name[0] == 0
    }

    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        !self.is_empty() && self.name_bytes() == name.as_bytes()
    }

    /// `.` 与 `..`
    #[inline]
    pub fn is_relative(&self) -> bool {
        matches!(self.name_bytes(), b"." | b"..")
    }

    /// 只改名字，inode 编号保持不变
    pub fn rename(&mut self, name: &str) -> Result<()> {
        *self = Self::new(name, self.inode_id)?;
        Ok(())
    }
}

/// 名字不能为空，不能含 `/` 或 \0，且至多 [`NAME_MAX_LEN`] 字节
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\0']) {
        return Err(FsError::InvalidName(name.to_owned()));
    }
    if name.len() > NAME_MAX_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

//! # 目录树层
//!
//! 目录的内容是一块紧密排列的 [`DirEntry`]，容量为 `block_size / 32`。
//! 目录永远只有格式化或创建时分配的那一个数据块，满了就是满了。
//!
//! 删除目录项只把槽位清零（墓碑），之后插入的项会复用它。

use crate::block::Block;
use crate::fs::{now, FileSystem, Mounted};
use crate::layout::{DirEntry, DiskInode};
use crate::path::Path;
use crate::{FsError, Result, ROOT_INODE};

/// 目录项所在的槽位，连同整块一起带出来，便于原地修改后写回
pub(crate) struct Slot {
    pub block: Block,
    pub offset: usize,
    pub entry: DirEntry,
}

impl FileSystem {
    /// 沿绝对路径从根目录逐级查找，返回最终的 inode 编号与内容
    pub fn resolve(&self, path: &str) -> Result<(u32, DiskInode)> {
        self.mounted()?.resolve(path)
    }

    /// 在目录 `parent_id` 下按名字查找目录项
    pub fn find_entry(&self, parent_id: u32, name: &str) -> Result<DirEntry> {
        let mounted = self.mounted()?;
        let parent = mounted.read_dir_inode(parent_id)?;
        mounted.find_entry(&parent, name)
    }

    /// 在目录 `parent_id` 的第一个空槽位登记新项
    pub fn add_entry(&mut self, parent_id: u32, name: &str, inode_id: u32) -> Result<()> {
        self.mounted()?.add_entry(parent_id, name, inode_id)
    }

    /// 把目录 `parent_id` 中指向 `inode_id` 的项清零
    pub fn remove_entry(&mut self, parent_id: u32, inode_id: u32) -> Result<()> {
        self.mounted()?.remove_entry(parent_id, inode_id)
    }
}

impl Mounted {
    pub fn resolve(&self, path: &str) -> Result<(u32, DiskInode)> {
        if !path.is_absolute() {
            return Err(FsError::InvalidPath(path.to_owned()));
        }

        let mut inode_id = ROOT_INODE;
        let mut inode = self.read_inode(ROOT_INODE)?;
        for cmp in path.components() {
            // 不能穿过普通文件继续往下走
            if !inode.is_dir() {
                return Err(FsError::NotADirectory);
            }
            inode_id = self.find_entry(&inode, cmp)?.inode_id();
            inode = self.read_inode(inode_id)?;
        }

        Ok((inode_id, inode))
    }

    /// 读出 inode 并确认它是目录
    pub fn read_dir_inode(&self, inode_id: u32) -> Result<DiskInode> {
        let inode = self.read_inode(inode_id)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(inode)
    }

    /// 名字匹配的项，包括 `.` 与 `..`
    pub fn find_entry(&self, dir: &DiskInode, name: &str) -> Result<DirEntry> {
        self.scan(dir, |entry| entry.is_named(name))?
            .map(|slot| slot.entry)
            .ok_or(FsError::NotFound)
    }

    /// 目录中所有非空的项，按槽位顺序
    pub fn entries(&self, dir: &DiskInode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        self.scan(dir, |entry| {
            if !entry.is_empty() {
                entries.push(entry.clone());
            }
            false
        })?;
        Ok(entries)
    }

    pub fn has_free_slot(&self, dir: &DiskInode) -> Result<bool> {
        Ok(self.scan(dir, DirEntry::is_empty)?.is_some())
    }

    pub fn add_entry(&self, parent_id: u32, name: &str, inode_id: u32) -> Result<()> {
        let new_entry = DirEntry::new(name, inode_id)?;
        let mut parent = self.read_dir_inode(parent_id)?;

        let Some(mut slot) = self.scan(&parent, DirEntry::is_empty)? else {
            return Err(FsError::DirectoryFull);
        };
        slot.block.set(slot.offset, &new_entry)?;
        self.disk.store(&slot.block)?;
        log::debug!("added entry {name:?} -> inode {inode_id} in directory {parent_id}");

        parent.modified = now();
        self.write_inode(parent_id, &parent)
    }

    /// `.` 与 `..` 不会被当作目标
    pub fn remove_entry(&self, parent_id: u32, inode_id: u32) -> Result<()> {
        let mut parent = self.read_dir_inode(parent_id)?;

        let Some(mut slot) = self.scan(&parent, |entry| {
            !entry.is_empty() && !entry.is_relative() && entry.inode_id() == inode_id
        })?
        else {
            return Err(FsError::NotFound);
        };
        slot.block.set(slot.offset, &DirEntry::default())?;
        self.disk.store(&slot.block)?;
        log::debug!(
            "removed entry {:?} -> inode {inode_id} from directory {parent_id}",
            slot.entry.name()
        );

        parent.modified = now();
        self.write_inode(parent_id, &parent)
    }

    /// 原地改名，inode 编号不变
    pub fn rename_entry(&self, parent_id: u32, old_name: &str, new_name: &str) -> Result<()> {
        let mut parent = self.read_dir_inode(parent_id)?;

        let Some(mut slot) = self.scan(&parent, |entry| entry.is_named(old_name))? else {
            return Err(FsError::NotFound);
        };
        slot.entry.rename(new_name)?;
        slot.block.set(slot.offset, &slot.entry)?;
        self.disk.store(&slot.block)?;
        log::debug!("renamed entry {old_name:?} to {new_name:?} in directory {parent_id}");

        parent.modified = now();
        self.write_inode(parent_id, &parent)
    }

    /// 依次检查目录各数据块中的每个槽位，返回第一个令 `pred` 成立的槽位
    fn scan(&self, dir: &DiskInode, mut pred: impl FnMut(&DirEntry) -> bool) -> Result<Option<Slot>> {
        debug_assert!(dir.is_dir());
        let slots = self.block_size() / DirEntry::SIZE;

        for block_id in dir.blocks() {
            let block = self.disk.load(block_id)?;
            for offset in (0..slots).map(|i| i * DirEntry::SIZE) {
                let entry: DirEntry = block.get(offset)?;
                if pred(&entry) {
                    return Ok(Some(Slot {
                        block,
                        offset,
                        entry,
                    }));
                }
            }
        }

        Ok(None)
    }
}

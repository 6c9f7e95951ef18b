//! # 文件操作层
//!
//! 对外的命令集合，由目录树层与磁盘管理器层组合而成。
//! 路径一律是绝对路径。
//!
//! 多步操作（位图、inode、目录项依次写入）不是原子的。
//! 创建类操作中途失败时，会归还本次已分配的 inode 与数据块；
//! 但若进程在两次设备写之间中止，位图与可达性仍可能不一致。

use std::io::{Read, Write};

use enumflags2::bitflags;

use crate::block::Block;
use crate::fs::{now, FileSystem, Mounted};
use crate::layout::{validate_name, DiskInode, DiskInodeKind};
use crate::path::Path;
use crate::{FsError, Result, DIRECT_COUNT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub inode: u32,
    pub kind: StatKind,
    pub links: u32,
    pub size: u32,
    /// 占用的数据块数
    pub blocks: u32,
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

/// 位图统计出的使用量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub used_inodes: u32,
    pub total_inodes: u32,
    pub used_blocks: u32,
    /// 数据区的块数
    pub total_blocks: u32,
    pub block_size: u32,
}

impl FileSystem {
    /// 目录：列出数据块中所有非空项的名字（含 `.` 与 `..`）；
    /// 文件：只给出路径的最后一项。
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let mounted = self.mounted()?;
        let (_, inode) = mounted.resolve(path)?;

        if !inode.is_dir() {
            let name = path.file_name().unwrap_or(path);
            return Ok(vec![name.to_owned()]);
        }

        Ok(mounted
            .entries(&inode)?
            .iter()
            .map(|entry| entry.name().into_owned())
            .collect())
    }

    /// 创建空目录，其中只有 `.` 与 `..`
    pub fn make_directory(&mut self, path: &str) -> Result<u32> {
        let mounted = self.mounted()?;
        let (parent_path, name) = split(path)?;
        let (parent_id, mut parent) = mounted.resolve(parent_path)?;
        mounted.check_new_entry(&parent, name)?;

        let mut allocs = Allocations::new(mounted);
        let inode_id = allocs.inode()?;
        let data = allocs.block()?;
        let now = now();

        allocs.run(|mounted| {
            mounted.init_dir(inode_id, parent_id, data, now)?;
            mounted.add_entry(parent_id, name, inode_id)
        })?;

        // 新目录的 `..` 指向父目录；add_entry 刚改过父目录的时间戳，需重新读取
        parent = mounted.read_inode(parent_id)?;
        parent.links += 1;
        mounted.write_inode(parent_id, &parent)?;

        log::info!("created directory {path} in inode {inode_id}");
        Ok(inode_id)
    }

    /// 把宿主机上的字节流写成新文件。
    ///
    /// 至多写入 [`DIRECT_COUNT`] 块，超出部分不会被读取也不会计入大小；
    /// 记录的大小是实际存下的字节数。总是创建新的 inode，不会覆盖已有文件。
    pub fn ingest(&mut self, path: &str, source: impl Read, source_len: u64) -> Result<u32> {
        let mounted = self.mounted()?;
        let (parent_path, name) = split(path)?;
        let (parent_id, parent) = mounted.resolve(parent_path)?;
        mounted.check_new_entry(&parent, name)?;

        let block_size = mounted.block_size();
        let max_size = DiskInode::max_size(block_size);
        let limit = source_len.min(max_size as u64);
        if source_len > limit {
            log::warn!("{path}: only the first {limit} of {source_len} bytes fit in {DIRECT_COUNT} blocks");
        }

        let mut data = Vec::with_capacity(limit as usize);
        source.take(limit).read_to_end(&mut data)?;

        let mut allocs = Allocations::new(mounted);
        let inode_id = allocs.inode()?;
        let mut inode = DiskInode::new(DiskInodeKind::File, now());
        inode.size = data.len() as u32;

        for (index, chunk) in data.chunks(block_size).enumerate() {
            let block_id = allocs.block()?;
            let mut block = Block::zeroed(block_id, block_size);
            block.data_mut()[..chunk.len()].copy_from_slice(chunk);
            allocs.run(|mounted| mounted.disk.store(&block))?;
            inode.set_block(index, block_id);
        }

        allocs.run(|mounted| {
            mounted.write_inode(inode_id, &inode)?;
            mounted.add_entry(parent_id, name, inode_id)
        })?;

        log::info!("wrote {} bytes to {path} in inode {inode_id}", inode.size);
        Ok(inode_id)
    }

    /// 把文件的全部内容按顺序写进 `out`，返回字节数
    pub fn dump(&self, path: &str, mut out: impl Write) -> Result<usize> {
        let mounted = self.mounted()?;
        let (_, inode) = mounted.resolve(path)?;
        if inode.is_dir() {
            return Err(FsError::NotAFile);
        }

        let block_size = mounted.block_size();
        let mut remaining = inode.size as usize;
        for index in 0..DiskInode::count_data_block(inode.size, block_size) {
            // 大小与索引不一致时，以索引为准
            let Some(block_id) = inode.block_id(index) else {
                break;
            };
            let block = mounted.disk.load(block_id)?;
            let len = remaining.min(block_size);
            out.write_all(&block.data()[..len])?;
            remaining -= len;
        }

        Ok(inode.size as usize - remaining)
    }

    /// 删除普通文件：归还全部数据块与 inode，再把父目录中的项清零
    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let mounted = self.mounted()?;
        let (parent_id, inode_id, inode) = mounted.resolve_child(path)?;
        if inode.is_dir() {
            return Err(FsError::NotAFile);
        }

        for block_id in inode.blocks() {
            mounted.free_block(block_id)?;
        }
        mounted.free_inode(inode_id)?;
        mounted.remove_entry(parent_id, inode_id)?;

        log::info!("removed file {path}");
        Ok(())
    }

    /// 删除空目录，即只剩 `.` 与 `..` 的目录
    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        let mounted = self.mounted()?;
        if path.is_root() {
            return Err(FsError::RootDirectory);
        }
        let (parent_id, inode_id, inode) = mounted.resolve_child(path)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if mounted.entries(&inode)?.len() > 2 {
            return Err(FsError::DirectoryNotEmpty);
        }

        for block_id in inode.blocks() {
            mounted.free_block(block_id)?;
        }
        mounted.free_inode(inode_id)?;
        mounted.remove_entry(parent_id, inode_id)?;

        let mut parent = mounted.read_inode(parent_id)?;
        parent.links = parent.links.saturating_sub(1);
        mounted.write_inode(parent_id, &parent)?;

        log::info!("removed directory {path}");
        Ok(())
    }

    /// 同一目录下改名；跨目录移动不受支持
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let mounted = self.mounted()?;
        let (old_parent, old_name) = split(old_path)?;
        let (new_parent, new_name) = split(new_path)?;
        reject_relative(old_path, old_name)?;
        reject_relative(new_path, new_name)?;
        validate_name(new_name)?;

        // 父目录按 inode 比较，`/a/.` 与 `/a` 是同一个目录
        let (parent_id, parent) = mounted.resolve(old_parent)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if mounted.resolve(new_parent)?.0 != parent_id {
            return Err(FsError::UnsupportedOperation(
                "moving between directories",
            ));
        }
        mounted.find_entry(&parent, old_name)?;
        if old_name == new_name {
            return Ok(());
        }
        if mounted.find_entry(&parent, new_name).is_ok() {
            return Err(FsError::AlreadyExists);
        }

        mounted.rename_entry(parent_id, old_name, new_name)?;
        log::info!("renamed {old_path} to {new_path}");
        Ok(())
    }

    /// 供外层切换工作目录前校验
    pub fn is_directory(&self, path: &str) -> Result<bool> {
        Ok(self.mounted()?.resolve(path)?.1.is_dir())
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        let (inode_id, inode) = self.mounted()?.resolve(path)?;
        Ok(Stat::new(inode_id, &inode))
    }

    pub fn usage(&self) -> Result<Usage> {
        let mounted = self.mounted()?;
        let sb = &mounted.super_block;
        Ok(Usage {
            used_inodes: mounted.inode_bitmap.count_allocated(&mounted.disk)?,
            total_inodes: mounted.inode_bitmap.capacity(),
            used_blocks: mounted.block_bitmap.count_allocated(&mounted.disk)?,
            total_blocks: sb.data_blocks(),
            block_size: sb.block_size,
        })
    }
}

impl Mounted {
    /// 新名字合法，父目录存在、没有同名项、还有空槽位
    fn check_new_entry(&self, parent: &DiskInode, name: &str) -> Result<()> {
        validate_name(name)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        match self.find_entry(parent, name) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => (),
            Err(e) => return Err(e),
        }
        if !self.has_free_slot(parent)? {
            return Err(FsError::DirectoryFull);
        }
        Ok(())
    }

    /// 解析出父目录与目标，目标不能是 `.` 或 `..`
    fn resolve_child(&self, path: &str) -> Result<(u32, u32, DiskInode)> {
        let (parent_path, name) = split(path)?;
        reject_relative(path, name)?;

        let (parent_id, parent) = self.resolve(parent_path)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let inode_id = self.find_entry(&parent, name)?.inode_id();
        let inode = self.read_inode(inode_id)?;

        Ok((parent_id, inode_id, inode))
    }
}

/// 一次操作中分配到的资源；失败时全部归还
struct Allocations<'a> {
    mounted: &'a Mounted,
    inode: Option<u32>,
    blocks: Vec<u32>,
}

impl<'a> Allocations<'a> {
    fn new(mounted: &'a Mounted) -> Self {
        Self {
            mounted,
            inode: None,
            blocks: Vec::new(),
        }
    }

    fn inode(&mut self) -> Result<u32> {
        let id = self.run(Mounted::alloc_inode)?;
        self.inode = Some(id);
        Ok(id)
    }

    fn block(&mut self) -> Result<u32> {
        let id = self.run(Mounted::alloc_block)?;
        self.blocks.push(id);
        Ok(id)
    }

    /// 执行一步；出错则回滚此前的分配，再把错误交出去
    fn run<V>(&mut self, f: impl FnOnce(&Mounted) -> Result<V>) -> Result<V> {
        f(self.mounted).inspect_err(|_| self.rollback())
    }

    fn rollback(&mut self) {
        for block_id in self.blocks.drain(..) {
            if let Err(e) = self.mounted.free_block(block_id) {
                log::warn!("failed to release data block {block_id}: {e}");
            }
        }
        if let Some(inode_id) = self.inode.take() {
            if let Err(e) = self.mounted.free_inode(inode_id) {
                log::warn!("failed to release inode {inode_id}: {e}");
            }
        }
    }
}

impl Stat {
    pub fn new(inode_id: u32, inode: &DiskInode) -> Self {
        Self {
            inode: inode_id,
            kind: inode.kind.into(),
            links: inode.links,
            size: inode.size,
            blocks: inode.block_count() as u32,
            created: inode.created,
            modified: inode.modified,
            accessed: inode.accessed,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == StatKind::DIR
    }
}

impl From<DiskInodeKind> for StatKind {
    #[inline]
    fn from(kind: DiskInodeKind) -> Self {
        match kind {
            DiskInodeKind::Directory => Self::DIR,
            DiskInodeKind::File => Self::FILE,
        }
    }
}

/// 绝对路径拆成 `(父目录, 文件名)`
fn split(path: &str) -> Result<(&str, &str)> {
    if !path.is_absolute() {
        return Err(FsError::InvalidPath(path.to_owned()));
    }
    path.parent_file()
        .ok_or_else(|| FsError::InvalidPath(path.to_owned()))
}

fn reject_relative(path: &str, name: &str) -> Result<()> {
    if matches!(name, "." | "..") {
        return Err(FsError::InvalidPath(path.to_owned()));
    }
    Ok(())
}

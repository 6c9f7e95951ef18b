//! 索引节点与索引节点表
//!
//! 每个 inode 只有 [`DIRECT_COUNT`] 个直接索引块，没有间接索引：
//! 文件大小的上限就是 `DIRECT_COUNT * block_size`。
//! 记录中原本放一级、二级间接索引的 8 个字节保留为 0，
//! 只是为了与经典布局保持同样的记录宽度。
//!
//! 直接索引为 0 表示该位置没有数据块（0 号块是超级块，不可能是数据块）。

use binrw::binrw;

use crate::block::Disk;
use crate::{FsError, Result, DIRECT_COUNT};

/// 编码后 inode 记录的字节数
pub const INODE_SIZE: usize = 96;

#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskInode {
    /// 类型
    pub kind: DiskInodeKind,
    /// 硬链接个数
    pub links: u32,
    /// 字节数
    #[brw(pad_after = 4)]
    pub size: u32,
    /// 以下时间戳均为 Unix 纪元以来的秒数
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
    /// 直接索引块，存储容量：DIRECT_COUNT * block_size 字节
    #[brw(pad_after = 8)]
    direct: [u32; DIRECT_COUNT],
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum DiskInodeKind {
    #[default]
    File = 0,
    Directory = 1,
}

impl DiskInode {
    pub fn new(kind: DiskInodeKind, now: u64) -> Self {
        Self {
            kind,
            links: match kind {
                DiskInodeKind::File => 1,
                // 自身的 `.` 加上父目录中的项
                DiskInodeKind::Directory => 2,
            },
            created: now,
            modified: now,
            accessed: now,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == DiskInodeKind::Directory
    }

    /// 第 `index` 个直接索引块，未分配时为空
    #[inline]
    pub fn block_id(&self, index: usize) -> Option<u32> {
        self.direct.get(index).copied().filter(|&id| id != 0)
    }

    /// 依次给出已分配的数据块
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct.iter().copied().filter(|&id| id != 0)
    }

    /// 占用的数据块数
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// 把数据块挂到第 `index` 个直接索引上
    pub fn set_block(&mut self, index: usize, block_id: u32) {
        assert!(index < DIRECT_COUNT, "only {DIRECT_COUNT} direct blocks");
        self.direct[index] = block_id;
    }

    /// 计算容纳指定数据量需要多少个**数据块**
    #[inline]
    pub fn count_data_block(size: u32, block_size: usize) -> usize {
        (size as usize).div_ceil(block_size)
    }

    /// 单个文件能容纳的最大字节数
    #[inline]
    pub fn max_size(block_size: usize) -> usize {
        DIRECT_COUNT * block_size
    }
}

/// 索引节点表：从 `start_block` 起紧密排列的 inode 记录
#[derive(Debug, Clone)]
pub struct InodeTable {
    start_block: u32,
    inodes_per_block: u32,
    count: u32,
}

impl InodeTable {
    pub fn new(start_block: u32, block_size: usize, count: u32) -> Self {
        Self {
            start_block,
            inodes_per_block: (block_size / INODE_SIZE) as u32,
            count,
        }
    }

    /// 通过ID获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    pub fn position(&self, inode_id: u32) -> Result<(u32, usize)> {
        if inode_id >= self.count {
            return Err(FsError::InodeOutOfRange(inode_id));
        }
        let block_id = self.start_block + inode_id / self.inodes_per_block;
        let offset = (inode_id % self.inodes_per_block) as usize * INODE_SIZE;

        Ok((block_id, offset))
    }

    pub fn read(&self, disk: &Disk, inode_id: u32) -> Result<DiskInode> {
        let (block_id, offset) = self.position(inode_id)?;
        disk.load(block_id)?.get(offset)
    }

    /// 整块读出、改写其中一条记录、再整块写回
    pub fn write(&self, disk: &Disk, inode_id: u32, inode: &DiskInode) -> Result<()> {
        let (block_id, offset) = self.position(inode_id)?;
        let mut block = disk.load(block_id)?;
        block.set(offset, inode)?;
        disk.store(&block)?;
        log::debug!("wrote inode {inode_id} to block {block_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};

    use super::*;

    #[test]
    fn record_width() {
        let mut inode = DiskInode::new(DiskInodeKind::Directory, 0x1122_3344);
        inode.size = 4096;
        inode.set_block(0, 18);
        inode.set_block(11, 99);

        let mut buf = Cursor::new(Vec::new());
        inode.write(&mut buf).unwrap();
        let bytes = buf.get_ref();
        assert_eq!(bytes.len(), INODE_SIZE);
        assert_eq!(&bytes[..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &4096u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0; 4]);
        assert_eq!(&bytes[16..24], &0x1122_3344u64.to_le_bytes());
        assert_eq!(&bytes[40..44], &18u32.to_le_bytes());
        assert_eq!(&bytes[84..88], &99u32.to_le_bytes());
        // 间接索引的位置恒为 0
        assert_eq!(&bytes[88..], &[0; 8]);

        buf.set_position(0);
        assert_eq!(DiskInode::read(&mut buf).unwrap(), inode);
    }

    #[test]
    fn blocks_skip_holes() {
        let mut inode = DiskInode::new(DiskInodeKind::File, 0);
        assert_eq!(inode.links, 1);
        inode.set_block(0, 20);
        inode.set_block(1, 21);
        assert_eq!(inode.blocks().collect::<Vec<_>>(), [20, 21]);
        assert_eq!(inode.block_id(1), Some(21));
        assert_eq!(inode.block_id(2), None);
        assert_eq!(inode.block_id(DIRECT_COUNT), None);
    }

    #[test]
    fn table_position() {
        // 4096 / 96 = 42 个 inode 一块
        let table = InodeTable::new(3, 4096, 640);
        assert_eq!(table.position(0).unwrap(), (3, 0));
        assert_eq!(table.position(41).unwrap(), (3, 41 * INODE_SIZE));
        assert_eq!(table.position(42).unwrap(), (4, 0));
        assert!(matches!(
            table.position(640),
            Err(FsError::InodeOutOfRange(640))
        ));
    }

    #[test]
    fn count_blocks() {
        assert_eq!(DiskInode::count_data_block(0, 4096), 0);
        assert_eq!(DiskInode::count_data_block(5000, 4096), 2);
        assert_eq!(DiskInode::count_data_block(8192, 4096), 2);
        assert_eq!(DiskInode::max_size(512), 6144);
    }
}

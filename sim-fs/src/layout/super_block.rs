use binrw::binrw;

use crate::layout::INODE_SIZE;
use crate::{FsError, Result, BOOTSTRAP_BLOCK_SIZE, MAGIC};

/// 块大小的下限，一块至少放得下一个 inode 与四个目录项
const MIN_BLOCK_SIZE: u32 = 128;
/// 块大小的上限，保证文件大小上限放得进 `u32`
const MAX_BLOCK_SIZE: u32 = 1 << 20;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录几何参数，并定位其它连续区域
///
/// 各区域的起始块号只在格式化时计算一次，之后只读。
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    /// 文件系统占据块数
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub block_size: u32,
    pub inode_bitmap_start: u32,
    pub block_bitmap_start: u32,
    pub inode_table_start: u32,
    /// 数据区的起始块
    pub data_start: u32,
}

impl SuperBlock {
    /// 编码后的字节数
    pub const SIZE: usize = 32;

    /// 按磁盘大小与块大小计算布局。
    ///
    /// 块总数为 `disk_size / block_size`，inode 数为块数的四分之一；
    /// 两张位图与 inode 表各自向上取整到整块，从 1 号块起依次紧挨着排布。
    pub fn new(disk_size: u64, block_size: u32) -> Result<Self> {
        if !is_valid_block_size(block_size) {
            return Err(FsError::InvalidGeometry(format!(
                "block size {block_size} must be a power of two between {MIN_BLOCK_SIZE} and {MAX_BLOCK_SIZE}"
            )));
        }
        if disk_size < BOOTSTRAP_BLOCK_SIZE as u64 {
            return Err(FsError::InvalidGeometry(format!(
                "disk size {disk_size} is smaller than the {BOOTSTRAP_BLOCK_SIZE}-byte boot block"
            )));
        }
        let total_blocks = u32::try_from(disk_size / block_size as u64).map_err(|_| {
            FsError::InvalidGeometry(format!("disk size {disk_size} has too many blocks"))
        })?;
        let total_inodes = total_blocks / 4;

        let bits_per_block = block_size as u64 * 8;
        let inode_bitmap_blocks = (total_inodes as u64).div_ceil(bits_per_block);
        let block_bitmap_blocks = (total_blocks as u64).div_ceil(bits_per_block);
        let inode_table_blocks =
            (total_inodes as u64 * INODE_SIZE as u64).div_ceil(block_size as u64);

        let inode_bitmap_start: u32 = 1;
        let block_bitmap_start = inode_bitmap_start as u64 + inode_bitmap_blocks;
        let inode_table_start = block_bitmap_start + block_bitmap_blocks;
        let data_start = inode_table_start + inode_table_blocks;

        // 至少要放得下根目录的 inode 与数据块
        if total_inodes == 0 || data_start >= total_blocks as u64 {
            return Err(FsError::InvalidGeometry(format!(
                "{total_blocks} blocks of {block_size} bytes leave no room for data"
            )));
        }

        Ok(Self {
            magic: MAGIC,
            total_blocks,
            total_inodes,
            block_size,
            inode_bitmap_start,
            // 均小于 total_blocks，不会截断
            block_bitmap_start: block_bitmap_start as u32,
            inode_table_start: inode_table_start as u32,
            data_start: data_start as u32,
        })
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// 挂载时的完整校验：魔数正确，块大小合法，
    /// 各区域单调递增地落在磁盘内，且位图与 inode 表装得下各自的条目
    pub fn validate(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(FsError::InvalidSuperblock("bad magic number"));
        }
        if !is_valid_block_size(self.block_size) {
            return Err(FsError::InvalidSuperblock("bad block size"));
        }
        let monotonic = 0 < self.inode_bitmap_start
            && self.inode_bitmap_start <= self.block_bitmap_start
            && self.block_bitmap_start <= self.inode_table_start
            && self.inode_table_start <= self.data_start
            && self.data_start < self.total_blocks;
        if !monotonic {
            return Err(FsError::InvalidSuperblock("layout offsets out of order"));
        }

        let block_size = self.block_size as u64;
        let bits_per_block = block_size * 8;
        if self.total_inodes == 0
            || (self.inode_bitmap_blocks() as u64) * bits_per_block < self.total_inodes as u64
            || (self.block_bitmap_blocks() as u64) * bits_per_block < self.total_blocks as u64
        {
            return Err(FsError::InvalidSuperblock("bitmaps too small for the counts"));
        }
        let inode_table_len = self.total_inodes as u64 * INODE_SIZE as u64;
        if inode_table_len > self.inode_table_blocks() as u64 * block_size {
            return Err(FsError::InvalidSuperblock("inode table overlaps the data region"));
        }
        Ok(())
    }

    #[inline]
    pub fn inode_bitmap_blocks(&self) -> u32 {
        self.block_bitmap_start - self.inode_bitmap_start
    }

    #[inline]
    pub fn block_bitmap_blocks(&self) -> u32 {
        self.inode_table_start - self.block_bitmap_start
    }

    #[inline]
    pub fn inode_table_blocks(&self) -> u32 {
        self.data_start - self.inode_table_start
    }

    /// 数据区的块数
    #[inline]
    pub fn data_blocks(&self) -> u32 {
        self.total_blocks - self.data_start
    }
}

#[inline]
fn is_valid_block_size(block_size: u32) -> bool {
    block_size.is_power_of_two() && (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};

    use super::*;

    #[test]
    fn classic_geometry() {
        // 10 MiB，4 KiB 块
        let sb = SuperBlock::new(10 * 1024 * 1024, 4096).unwrap();
        assert_eq!(sb.total_blocks, 2560);
        assert_eq!(sb.total_inodes, 640);
        assert_eq!(sb.inode_bitmap_start, 1);
        assert_eq!(sb.block_bitmap_start, 2);
        assert_eq!(sb.inode_table_start, 3);
        // 640 * 96 / 4096 向上取整为 15 块
        assert_eq!(sb.data_start, 18);
        assert!(sb.validate().is_ok());
    }

    #[test]
    fn encoded_size() {
        let sb = SuperBlock::new(1 << 20, 512).unwrap();
        let mut buf = Cursor::new(Vec::new());
        sb.write(&mut buf).unwrap();
        assert_eq!(buf.get_ref().len(), SuperBlock::SIZE);
        assert_eq!(&buf.get_ref()[..4], &MAGIC.to_le_bytes());

        buf.set_position(0);
        assert_eq!(SuperBlock::read(&mut buf).unwrap(), sb);
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            SuperBlock::new(1 << 20, 1000),
            Err(FsError::InvalidGeometry(_))
        ));
        assert!(matches!(
            SuperBlock::new(2048, 512),
            Err(FsError::InvalidGeometry(_))
        ));
        // 4 个块、1 个 inode：元数据把磁盘占满了
        assert!(matches!(
            SuperBlock::new(4096, 1024),
            Err(FsError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn corrupted_counts() {
        let mut sb = SuperBlock::new(1 << 20, 512).unwrap();
        sb.block_size = 64;
        assert!(matches!(sb.validate(), Err(FsError::InvalidSuperblock(_))));

        let mut sb = SuperBlock::new(1 << 20, 512).unwrap();
        sb.total_inodes += 1;
        assert!(matches!(sb.validate(), Err(FsError::InvalidSuperblock(_))));

        let mut sb = SuperBlock::new(1 << 20, 512).unwrap();
        sb.total_inodes = 0;
        assert!(matches!(sb.validate(), Err(FsError::InvalidSuperblock(_))));
    }

    #[test]
    fn corrupted_magic() {
        let mut sb = SuperBlock::new(1 << 20, 512).unwrap();
        sb.magic = 0xBEEF;
        assert!(matches!(
            sb.validate(),
            Err(FsError::InvalidSuperblock(_))
        ));
    }
}

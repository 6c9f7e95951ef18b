//! # 磁盘管理器层
//!
//! 构建出磁盘的布局并使用。
//!
//! [`FileSystem`] 是一次会话：持有块设备，挂载后还持有超级块快照、
//! 两张位图与 inode 表的位置。所有操作都以 `&self` / `&mut self`
//! 经由它进行，不存在进程级的全局挂载状态。

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::BlockDevice;

use crate::block::{Block, Disk};
use crate::layout::*;
use crate::{FsError, Resource, Result, BOOTSTRAP_BLOCK_SIZE, ROOT_INODE};

#[derive(Debug)]
pub struct FileSystem {
    device: Arc<dyn BlockDevice>,
    mounted: Option<Mounted>,
}

/// 挂载后才有的状态
#[derive(Debug)]
pub(crate) struct Mounted {
    pub disk: Disk,
    pub super_block: SuperBlock,
    pub inode_bitmap: Bitmap,
    pub block_bitmap: Bitmap,
    pub inode_table: InodeTable,
}

impl FileSystem {
    /// 尚未挂载的会话
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            mounted: None,
        }
    }

    /// 在设备上写出全新的布局与根目录。
    ///
    /// 设备需已是恰好 `disk_size` 字节的全零后备存储。
    /// 完成后会话处于未挂载状态，之前的挂载一并作废。
    pub fn format(&mut self, disk_size: u64, block_size: u32) -> Result<SuperBlock> {
        let super_block = SuperBlock::new(disk_size, block_size)?;
        self.mounted = None;
        log::info!(
            "formatting {} blocks of {} bytes, {} inodes",
            super_block.total_blocks,
            super_block.block_size,
            super_block.total_inodes
        );

        let disk = Disk::new(self.device.clone(), block_size as usize);
        let mut block = Block::zeroed(0, disk.block_size());
        block.set(0, &super_block)?;
        disk.store(&block)?;

        // 元数据区全部清零
        for block_id in 1..super_block.data_start {
            disk.zero(block_id)?;
        }
        log::debug!("zeroed metadata blocks 1..{}", super_block.data_start);

        let mounted = Mounted::new(disk, super_block);
        let root = mounted.alloc_inode()?;
        debug_assert_eq!(root, ROOT_INODE);
        let data = mounted.alloc_block()?;
        mounted.init_dir(root, root, data, now())?;
        log::info!("created root directory in inode {root}, data block {data}");

        Ok(super_block)
    }

    /// 读出并校验超级块，然后按其声明的块大小寻址。
    /// 已挂载时什么也不做。
    pub fn mount(&mut self) -> Result<()> {
        if self.mounted.is_some() {
            return Ok(());
        }

        let bootstrap = Disk::new(self.device.clone(), BOOTSTRAP_BLOCK_SIZE);
        let super_block: SuperBlock = bootstrap.load(0)?.get(0)?;
        super_block.validate()?;

        let disk = Disk::new(self.device.clone(), super_block.block_size as usize);
        self.mounted = Some(Mounted::new(disk, super_block));
        log::info!("mounted filesystem with {} blocks", super_block.total_blocks);

        Ok(())
    }

    /// 丢弃挂载状态；未挂载时什么也不做
    pub fn unmount(&mut self) {
        if self.mounted.take().is_some() {
            log::info!("unmounted filesystem");
        }
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// 超级块快照
    pub fn superblock(&self) -> Result<SuperBlock> {
        Ok(self.mounted()?.super_block)
    }

    /// 在磁盘上分配新的 inode 并返回其ID
    pub fn alloc_inode(&mut self) -> Result<u32> {
        self.mounted()?.alloc_inode()
    }

    /// 在磁盘上分配新的数据块并返回其（绝对）块号
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.mounted()?.alloc_block()
    }

    pub fn free_inode(&mut self, inode_id: u32) -> Result<()> {
        self.mounted()?.free_inode(inode_id)
    }

    pub fn free_block(&mut self, block_id: u32) -> Result<()> {
        self.mounted()?.free_block(block_id)
    }

    pub fn read_inode(&self, inode_id: u32) -> Result<DiskInode> {
        self.mounted()?.read_inode(inode_id)
    }

    pub fn write_inode(&mut self, inode_id: u32, inode: &DiskInode) -> Result<()> {
        self.mounted()?.write_inode(inode_id, inode)
    }

    pub(crate) fn mounted(&self) -> Result<&Mounted> {
        self.mounted.as_ref().ok_or(FsError::NotMounted)
    }
}

impl Mounted {
    fn new(disk: Disk, super_block: SuperBlock) -> Self {
        let sb = &super_block;
        Self {
            inode_bitmap: Bitmap::new(
                sb.inode_bitmap_start,
                sb.inode_bitmap_blocks(),
                0..sb.total_inodes,
            ),
            block_bitmap: Bitmap::new(
                sb.block_bitmap_start,
                sb.block_bitmap_blocks(),
                sb.data_start..sb.total_blocks,
            ),
            inode_table: InodeTable::new(
                sb.inode_table_start,
                disk.block_size(),
                sb.total_inodes,
            ),
            disk,
            super_block,
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.disk.block_size()
    }

    pub fn alloc_inode(&self) -> Result<u32> {
        let id = self
            .inode_bitmap
            .alloc(&self.disk)?
            .ok_or(FsError::NoSpace(Resource::Inode))?;
        log::debug!("allocated inode {id}");
        Ok(id)
    }

    pub fn alloc_block(&self) -> Result<u32> {
        let id = self
            .block_bitmap
            .alloc(&self.disk)?
            .ok_or(FsError::NoSpace(Resource::Block))?;
        log::debug!("allocated data block {id}");
        Ok(id)
    }

    /// 只清位图，inode 内容保持原样
    pub fn free_inode(&self, inode_id: u32) -> Result<()> {
        log::debug!("freeing inode {inode_id}");
        self.inode_bitmap.dealloc(&self.disk, inode_id)
    }

    /// 只清位图，块内容保持原样
    pub fn free_block(&self, block_id: u32) -> Result<()> {
        log::debug!("freeing data block {block_id}");
        self.block_bitmap.dealloc(&self.disk, block_id)
    }

    #[inline]
    pub fn read_inode(&self, inode_id: u32) -> Result<DiskInode> {
        self.inode_table.read(&self.disk, inode_id)
    }

    #[inline]
    pub fn write_inode(&self, inode_id: u32, inode: &DiskInode) -> Result<()> {
        self.inode_table.write(&self.disk, inode_id, inode)
    }

    /// 初始化目录：inode 指向唯一的数据块，块内放 `.` 与 `..`
    pub fn init_dir(&self, inode_id: u32, parent_id: u32, data: u32, now: u64) -> Result<()> {
        let mut inode = DiskInode::new(DiskInodeKind::Directory, now);
        inode.size = self.block_size() as u32;
        inode.set_block(0, data);
        self.write_inode(inode_id, &inode)?;

        let mut block = Block::zeroed(data, self.block_size());
        block.set(0, &DirEntry::new(".", inode_id)?)?;
        block.set(DirEntry::SIZE, &DirEntry::new("..", parent_id)?)?;
        self.disk.store(&block)
    }
}

/// Unix 纪元以来的秒数
pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

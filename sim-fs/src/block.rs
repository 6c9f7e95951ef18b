//! # 块读写层
//!
//! 把块设备上的一整块读进内存缓冲区，修改后再整块写回。
//! 这里刻意没有缓存：每次 [`Disk::load`] 与 [`Disk::store`] 都会直达设备。
//!
//! 磁盘上的记录通过 [`Block::get`] 与 [`Block::set`] 按偏移解码、编码，
//! 布局由 `binrw` 描述，与宿主机的结构体填充无关。

use std::io::Cursor;
use std::sync::Arc;

use binrw::{BinRead, BinWrite, Endian};
use block_dev::BlockDevice;

use crate::Result;

/// 以固定块大小寻址的设备句柄
#[derive(Debug, Clone)]
pub struct Disk {
    device: Arc<dyn BlockDevice>,
    block_size: usize,
}

/// 内存中的一块
#[derive(Debug)]
pub struct Block {
    /// 对应的块ID
    id: u32,
    /// 块的全部字节
    data: Box<[u8]>,
}

impl Disk {
    #[inline]
    pub fn new(device: Arc<dyn BlockDevice>, block_size: usize) -> Self {
        Self { device, block_size }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn load(&self, id: u32) -> Result<Block> {
        let mut block = Block::zeroed(id, self.block_size);
        self.device.read_block(id as usize, &mut block.data)?;
        Ok(block)
    }

    pub fn store(&self, block: &Block) -> Result<()> {
        debug_assert_eq!(block.data.len(), self.block_size);
        self.device.write_block(block.id as usize, &block.data)?;
        Ok(())
    }

    /// 把整块写成 0
    #[inline]
    pub fn zero(&self, id: u32) -> Result<()> {
        self.store(&Block::zeroed(id, self.block_size))
    }
}

impl Block {
    #[inline]
    pub fn zeroed(id: u32, size: usize) -> Self {
        Self {
            id,
            data: vec![0; size].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 从块内偏移 `offset` 处解码一条记录
    pub fn get<T>(&self, offset: usize) -> Result<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        let mut cursor = Cursor::new(&self.data[offset..]);
        Ok(T::read_options(&mut cursor, Endian::Little, ())?)
    }

    /// 把记录编码到块内偏移 `offset` 处
    pub fn set<T>(&mut self, offset: usize, value: &T) -> Result<()>
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        let mut cursor = Cursor::new(&mut self.data[offset..]);
        value.write_options(&mut cursor, Endian::Little, ())?;
        Ok(())
    }
}

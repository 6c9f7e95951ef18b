use std::ops::Range;

use crate::block::Disk;
use crate::Result;

/// 位图区域，记录其指示区域的分配情况
///
/// 位为 1 表示已分配；每个字节内从最高位开始编号。
/// 编号 = 位图块索引 * 每块位数 + 字节索引 * 8 + 位序。
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// 位图的起始块
    start_block_id: u32,
    /// 位图占用块数
    blocks: u32,
    /// 允许分配的编号范围；数据块位图的前缀属于元数据区，不参与分配
    range: Range<u32>,
}

/// 编号在位图中的位置
struct BitPos {
    block_index: u32,
    byte_index: usize,
    mask: u8,
}

impl Bitmap {
    #[inline]
    pub fn new(start_block_id: u32, blocks: u32, range: Range<u32>) -> Self {
        Self {
            start_block_id,
            blocks,
            range,
        }
    }

    /// 可分配编号的总数
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.range.len() as u32
    }

    /// 首次适配：按块、按字节、字节内从高位到低位寻找第一个 0 位，
    /// 置位并写回所在的位图块，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&self, disk: &Disk) -> Result<Option<u32>> {
        let bits = disk.block_size() as u32 * 8;

        for block_index in 0..self.blocks {
            let first = block_index * bits;
            if first >= self.range.end {
                break;
            }
            // 整块都落在可分配范围之前
            if first + bits <= self.range.start {
                continue;
            }

            let mut block = disk.load(self.start_block_id + block_index)?;
            let Some(pos) = self.first_free(block.data(), block_index, first) else {
                continue;
            };

            block.data_mut()[pos.byte_index] |= pos.mask;
            disk.store(&block)?;
            return Ok(Some(pos.encode(bits)));
        }

        Ok(None)
    }

    /// 清除编号对应的位；范围外的编号直接忽略
    pub fn dealloc(&self, disk: &Disk, id: u32) -> Result<()> {
        if !self.range.contains(&id) {
            log::warn!("ignoring free of out-of-range index {id}");
            return Ok(());
        }

        let pos = BitPos::decode(id, disk.block_size() as u32 * 8);
        let mut block = disk.load(self.start_block_id + pos.block_index)?;
        let byte = &mut block.data_mut()[pos.byte_index];
        if *byte & pos.mask == 0 {
            log::warn!("index {id} freed twice");
        }
        *byte &= !pos.mask;
        disk.store(&block)
    }

    /// 范围内已分配的编号个数
    pub fn count_allocated(&self, disk: &Disk) -> Result<u32> {
        let bits = disk.block_size() as u32 * 8;
        let mut count = 0;

        for block_index in 0..self.blocks {
            let first = block_index * bits;
            if first >= self.range.end {
                break;
            }
            let block = disk.load(self.start_block_id + block_index)?;
            for (byte_index, &byte) in block.data().iter().enumerate() {
                if byte == 0 {
                    continue;
                }
                count += (0..8u32)
                    .filter(|bit| byte & (0x80 >> bit) != 0)
                    .filter(|bit| self.range.contains(&(first + byte_index as u32 * 8 + bit)))
                    .count() as u32;
            }
        }

        Ok(count)
    }

    /// 在一块位图内找范围内的第一个 0 位
    fn first_free(&self, data: &[u8], block_index: u32, first: u32) -> Option<BitPos> {
        for (byte_index, &byte) in data.iter().enumerate() {
            // 满字节直接跳过
            if byte == u8::MAX {
                continue;
            }
            for bit in 0..8u32 {
                let id = first + byte_index as u32 * 8 + bit;
                let mask = 0x80 >> bit;
                if byte & mask != 0 || id < self.range.start {
                    continue;
                }
                if id >= self.range.end {
                    return None;
                }
                return Some(BitPos {
                    block_index,
                    byte_index,
                    mask,
                });
            }
        }

        None
    }
}

impl BitPos {
    fn decode(id: u32, bits_per_block: u32) -> Self {
        let inblock = id % bits_per_block;
        Self {
            block_index: id / bits_per_block,
            byte_index: (inblock / 8) as usize,
            mask: 0x80 >> (inblock % 8),
        }
    }

    /// 线性映射编码得到编号
    fn encode(&self, bits_per_block: u32) -> u32 {
        self.block_index * bits_per_block
            + self.byte_index as u32 * 8
            + self.mask.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_position_roundtrip() {
        for id in [0, 7, 8, 4095, 4096, 10_000] {
            assert_eq!(BitPos::decode(id, 4096).encode(4096), id);
        }
        let pos = BitPos::decode(9, 4096);
        assert_eq!(pos.byte_index, 1);
        assert_eq!(pos.mask, 0b0100_0000);
    }

    #[test]
    fn msb_first() {
        let bitmap = Bitmap::new(1, 1, 0..64);
        let data = [0b1110_0000, 0, 0, 0];
        let pos = bitmap.first_free(&data, 0, 0).unwrap();
        assert_eq!(pos.byte_index, 0);
        assert_eq!(pos.mask, 0b0001_0000);
        assert_eq!(pos.encode(4096), 3);
    }

    #[test]
    fn respects_range() {
        // 前 10 位属于元数据区
        let bitmap = Bitmap::new(1, 1, 10..12);
        let data = [0u8; 4];
        assert_eq!(bitmap.first_free(&data, 0, 0).unwrap().encode(32), 10);

        let data = [0, 0b0011_0000, 0, 0];
        assert!(bitmap.first_free(&data, 0, 0).is_none());
    }
}

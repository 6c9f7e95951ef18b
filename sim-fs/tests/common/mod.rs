#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sim_fs::{BlockDevice, FileSystem};

/// 内存中的后备存储
#[derive(Debug)]
pub struct MemoryDisk {
    bytes: Mutex<Vec<u8>>,
    /// 置位后所有写操作失败
    fail_writes: AtomicBool,
}

impl MemoryDisk {
    pub fn new(disk_size: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new(vec![0; disk_size]),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 直接改写后备存储中的字节
    pub fn patch(&self, offset: usize, data: &[u8]) {
        self.bytes.lock().unwrap()[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }
}

impl BlockDevice for MemoryDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let bytes = self.bytes.lock().unwrap();
        let start = block_id * buf.len();
        let src = bytes
            .get(start..start + buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "not a complete block!"))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure"));
        }
        let mut bytes = self.bytes.lock().unwrap();
        let start = block_id * buf.len();
        let dest = bytes
            .get_mut(start..start + buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::WriteZero, "not a complete block!"))?;
        dest.copy_from_slice(buf);
        Ok(())
    }
}

pub const MIB: usize = 1024 * 1024;

/// 格式化并挂载一块内存盘
pub fn mounted(disk_size: usize, block_size: u32) -> (Arc<MemoryDisk>, FileSystem) {
    let disk = MemoryDisk::new(disk_size);
    let mut fs = FileSystem::new(disk.clone());
    fs.format(disk_size as u64, block_size).unwrap();
    fs.mount().unwrap();
    (disk, fs)
}

/// 确定性的测试数据
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// 从根目录出发遍历，统计可达的 inode 与数据块数（根目录计入）
pub fn reachable(fs: &FileSystem) -> (u32, u32) {
    fn walk(fs: &FileSystem, path: &str, inodes: &mut u32, blocks: &mut u32) {
        let stat = fs.stat(path).unwrap();
        *inodes += 1;
        *blocks += stat.blocks;
        if !stat.is_dir() {
            return;
        }
        for name in fs.list(path).unwrap() {
            if name == "." || name == ".." {
                continue;
            }
            let child = if path == "/" {
                format!("/{name}")
            } else {
                format!("{path}/{name}")
            };
            walk(fs, &child, inodes, blocks);
        }
    }

    let (mut inodes, mut blocks) = (0, 0);
    walk(fs, "/", &mut inodes, &mut blocks);
    (inodes, blocks)
}

/// 位图状态与可达性一致：没有泄漏，也没有悬空
pub fn assert_consistent(fs: &FileSystem) {
    let usage = fs.usage().unwrap();
    let (inodes, blocks) = reachable(fs);
    assert_eq!(usage.used_inodes, inodes, "inode bitmap disagrees with the tree");
    assert_eq!(usage.used_blocks, blocks, "block bitmap disagrees with the tree");
}

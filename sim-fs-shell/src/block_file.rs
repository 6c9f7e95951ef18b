use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use block_dev::BlockDevice;

/// 宿主机上的一个普通文件充当整块磁盘
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    /// 后备文件的字节数，越界的读写视为不完整的块
    len: u64,
}

impl BlockFile {
    /// 创建（或截断）后备文件，填满 `disk_size` 个零字节
    pub fn format(path: impl AsRef<Path>, disk_size: u64) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len(disk_size)?;

        Ok(Self {
            file: Mutex::new(fd),
            len: disk_size,
        })
    }

    /// 以读写方式打开已有的后备文件
    pub fn mount(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let len = fd.metadata()?.len();

        Ok(Self {
            file: Mutex::new(fd),
            len,
        })
    }

    /// 落盘并关闭
    pub fn unmount(self) -> io::Result<()> {
        let fd = self.file.into_inner().unwrap_or_else(PoisonError::into_inner);
        fd.sync_all()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 定位到第 `block_id` 块；整块放不下时报 `kind` 错误
    fn seek(
        &self,
        block_id: usize,
        size: usize,
        kind: io::ErrorKind,
    ) -> io::Result<MutexGuard<'_, File>> {
        let start = (block_id * size) as u64;
        if start + size as u64 > self.len {
            return Err(io::Error::new(kind, "not a complete block!"));
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start(start))?;
        Ok(file)
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.seek(block_id, buf.len(), io::ErrorKind::UnexpectedEof)?;
        file.read_exact(buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.seek(block_id, buf.len(), io::ErrorKind::WriteZero)?;
        file.write_all(buf)
    }
}

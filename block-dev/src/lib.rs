//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘，
//! 或者宿主机上的一个普通文件；[`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 块大小不由设备决定，而由调用者传入的缓冲区长度决定：
//! 第 `i` 块位于字节偏移 `i * buf.len()` 处。
//! 文件系统挂载时先用引导块大小读出超级块，再切换到超级块声明的块大小。

use std::any::Any;
use std::fmt::Debug;
use std::io;

/// 块设备驱动特质
///
/// 每次读写都是完整的一块，不做缓存，也不支持部分块操作；
/// 读写不足一块视为错误。
pub trait BlockDevice: Send + Sync + Any + Debug {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;
}

/* sim-fs 的整体架构，自上而下 */

// 文件操作层：ls、mkdir、写入、读出、删除、改名等对外命令
mod ops;
pub use ops::{Stat, StatKind, Usage};

// 目录树层：路径解析与目录项的查找、插入、墓碑化
mod dir;

// 磁盘管理器层：布局、挂载，以及 inode / 数据块的分配与回收
mod fs;
pub use fs::FileSystem;

// 磁盘数据结构层：表示磁盘文件系统的数据结构及其编解码
mod layout;
pub use layout::{DirEntry, DiskInode, DiskInodeKind, SuperBlock};

// 块读写层：整块读写设备，不做缓存
mod block;

mod error;
pub use error::{FsError, Resource, Result};

pub mod path;

pub use block_dev::BlockDevice;

/// 超级块魔数，每次挂载都要校验
pub const MAGIC: u32 = 0xDA7A;
/// 挂载时读取超级块所用的块大小，此时真实块大小尚未可知
pub const BOOTSTRAP_BLOCK_SIZE: usize = 4096;
/// 每个 inode 的直接索引块数量，也就是文件大小的硬上限（以块计）
pub const DIRECT_COUNT: usize = 12;
/// 根目录的 inode 编号
pub const ROOT_INODE: u32 = 0;

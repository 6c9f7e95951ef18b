//! # 磁盘数据结构层
//!
//! sim-fs 的磁盘布局：
//! 超级块 | 索引节点位图 | 数据块位图 | 索引节点表 | 数据块区域
//!
//! 所有记录均为小端序，字段顺序与宽度见各自的类型定义。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, DiskInodeKind, InodeTable, INODE_SIZE};

/// 文件项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{validate_name, DirEntry, NAME_MAX_LEN};

use std::fmt;
use std::io;

use thiserror::Error;

/// 文件系统的全部错误；所有错误都交还调用者，不会自动重试。
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("not a regular file")]
    NotAFile,

    #[error("file or directory already exists")]
    AlreadyExists,

    #[error("directory not empty")]
    DirectoryNotEmpty,

    /// 目录只有一个数据块，槽位用尽后不会再扩张
    #[error("directory is full")]
    DirectoryFull,

    #[error("no space left on device: out of {0}")]
    NoSpace(Resource),

    #[error("file name longer than {max} bytes", max = crate::layout::NAME_MAX_LEN)]
    NameTooLong,

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("cannot remove the root directory")]
    RootDirectory,

    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    #[error("invalid superblock: {0}")]
    InvalidSuperblock(&'static str),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("filesystem is not mounted")]
    NotMounted,

    #[error("inode {0} is out of range")]
    InodeOutOfRange(u32),

    /// 底层块设备或宿主机数据源读写失败
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("on-disk record codec error: {0}")]
    Codec(#[from] binrw::Error),
}

/// 可被耗尽的磁盘资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inode,
    Block,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Inode => f.write_str("inodes"),
            Resource::Block => f.write_str("data blocks"),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

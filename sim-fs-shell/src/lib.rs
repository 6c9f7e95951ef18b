//! 宿主机一侧的工具：把普通文件当作块设备，在其上运行命令解释器


mod block_file;
mod shell;

pub use block_file::BlockFile;
pub use shell::{Flow, Shell};

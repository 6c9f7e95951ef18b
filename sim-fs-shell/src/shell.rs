//! 交互式与批处理的命令解释器
//!
//! 命令中的路径可以是相对当前工作目录的，交给文件系统前先规范化为绝对路径。
//! 单条命令失败只报告错误，不会结束会话。

use std::fs::File;
use std::io::{self, BufRead, Write};

use log::LevelFilter;
use sim_fs::path::Path;
use sim_fs::{FileSystem, FsError};
use thiserror::Error;
use typed_bytesize::ByteSizeIec;

const HELP: &str = "\
ls [path]                 list a directory
mkdir <path>              create a directory
cd [path]                 change the working directory
write <path> <host-file>  copy a host file into the disk
cat <path>                print a file
rm <path>                 remove a file
rmdir <path>              remove an empty directory
mv <old> <new>            rename within the same directory
stat <path>               show inode details
df                        show inode and block usage
verbose on|off            toggle the allocation trace
help                      show this message
exit                      leave the shell";

/// 执行完一条命令后是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("command not found")]
    Unknown,

    #[error("{path}: {source}")]
    Fs { path: String, source: FsError },

    /// 宿主机上的文件打不开
    #[error("{path}: {source}")]
    Host { path: String, source: io::Error },

    /// 输出流本身出错，会话无法继续
    #[error(transparent)]
    Output(#[from] io::Error),
}

type CommandResult = Result<Flow, CommandError>;

pub struct Shell<W, E> {
    fs: FileSystem,
    cwd: String,
    out: W,
    err: E,
}

impl<W: Write, E: Write> Shell<W, E> {
    /// 文件系统应已挂载；工作目录从根目录开始
    pub fn new(fs: FileSystem, out: W, err: E) -> Self {
        Self {
            fs,
            cwd: String::from("/"),
            out,
            err,
        }
    }

    #[inline]
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    #[inline]
    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    pub fn prompt(&self) -> String {
        format!("sim-fs:{}$ ", self.cwd)
    }

    /// 结束会话，交还文件系统与输出流
    pub fn into_parts(self) -> (FileSystem, W, E) {
        (self.fs, self.out, self.err)
    }

    /// 逐行执行直到输入耗尽或遇到 `exit`。
    ///
    /// 交互模式下每行之前打印提示符；批处理模式下回显每条命令。
    pub fn run(&mut self, input: impl BufRead, interactive: bool) -> io::Result<()> {
        if interactive {
            write!(self.out, "{}", self.prompt())?;
            self.out.flush()?;
        }

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if !interactive && !line.is_empty() {
                writeln!(self.out, "{}{line}", self.prompt())?;
            }

            if self.execute(line)? == Flow::Exit {
                break;
            }

            if interactive {
                write!(self.out, "{}", self.prompt())?;
                self.out.flush()?;
            }
        }

        self.out.flush()
    }

    /// 执行一条命令；命令失败写入错误流，只有输出流的错误才会返回
    pub fn execute(&mut self, line: &str) -> io::Result<Flow> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = args.split_first() else {
            return Ok(Flow::Continue);
        };
        // `#` 开头的行是注释
        if cmd.starts_with('#') {
            return Ok(Flow::Continue);
        }

        match self.dispatch(cmd, args) {
            Ok(flow) => Ok(flow),
            Err(CommandError::Output(e)) => Err(e),
            Err(e) => {
                writeln!(self.err, "{cmd}: {e}")?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, cmd: &str, args: &[&str]) -> CommandResult {
        match (cmd, args) {
            ("ls", []) => self.ls("."),
            ("ls", [path]) => self.ls(path),
            ("ls", _) => Err(CommandError::Usage("ls [path]")),

            ("mkdir", [path]) => self.mkdir(path),
            ("mkdir", _) => Err(CommandError::Usage("mkdir <path>")),

            ("cd", []) => {
                self.cwd = String::from("/");
                Ok(Flow::Continue)
            }
            ("cd", [path]) => self.cd(path),
            ("cd", _) => Err(CommandError::Usage("cd [path]")),

            ("write", [path, host]) => self.write(path, host),
            ("write", _) => Err(CommandError::Usage("write <path> <host-file>")),

            ("cat", [path]) => self.cat(path),
            ("cat", _) => Err(CommandError::Usage("cat <path>")),

            ("rm", [path]) => self.rm(path),
            ("rm", _) => Err(CommandError::Usage("rm <path>")),

            ("rmdir", [path]) => self.rmdir(path),
            ("rmdir", _) => Err(CommandError::Usage("rmdir <path>")),

            ("mv", [old, new]) => self.mv(old, new),
            ("mv", _) => Err(CommandError::Usage("mv <old> <new>")),

            ("stat", [path]) => self.stat(path),
            ("stat", _) => Err(CommandError::Usage("stat <path>")),

            ("df", []) => self.df(),
            ("df", _) => Err(CommandError::Usage("df")),

            ("verbose", ["on"]) => {
                log::set_max_level(LevelFilter::Debug);
                writeln!(self.out, "verbose mode on")?;
                Ok(Flow::Continue)
            }
            ("verbose", ["off"]) => {
                log::set_max_level(LevelFilter::Info);
                writeln!(self.out, "verbose mode off")?;
                Ok(Flow::Continue)
            }
            ("verbose", _) => Err(CommandError::Usage("verbose on|off")),

            ("help", _) => {
                writeln!(self.out, "{HELP}")?;
                Ok(Flow::Continue)
            }
            ("exit" | "quit", _) => Ok(Flow::Exit),

            _ => Err(CommandError::Unknown),
        }
    }

    fn ls(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        let names = self.fs.list(&abs).map_err(fs_error(path))?;
        for name in names {
            writeln!(self.out, "{name}")?;
        }
        Ok(Flow::Continue)
    }

    fn mkdir(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        self.fs.make_directory(&abs).map_err(fs_error(path))?;
        Ok(Flow::Continue)
    }

    fn cd(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        if !self.fs.is_directory(&abs).map_err(fs_error(path))? {
            return Err(fs_error(path)(FsError::NotADirectory));
        }
        self.cwd = abs;
        Ok(Flow::Continue)
    }

    fn write(&mut self, path: &str, host: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        let host_error = |source: io::Error| CommandError::Host {
            path: host.to_owned(),
            source,
        };
        let file = File::open(host).map_err(host_error)?;
        let len = file.metadata().map_err(host_error)?.len();

        self.fs.ingest(&abs, file, len).map_err(fs_error(path))?;
        let size = self.fs.stat(&abs).map_err(fs_error(path))?.size;
        writeln!(self.out, "wrote {size} of {len} bytes to {abs}")?;
        Ok(Flow::Continue)
    }

    fn cat(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        let mut content = Vec::new();
        self.fs.dump(&abs, &mut content).map_err(fs_error(path))?;

        self.out.write_all(&content)?;
        if !content.is_empty() && !content.ends_with(b"\n") {
            writeln!(self.out)?;
        }
        Ok(Flow::Continue)
    }

    fn rm(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        self.fs.remove_file(&abs).map_err(fs_error(path))?;
        Ok(Flow::Continue)
    }

    fn rmdir(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        // 不能删掉脚下的目录
        if !abs.is_root() && contains(&abs, &self.cwd) {
            return Err(fs_error(path)(FsError::UnsupportedOperation(
                "removing the working directory",
            )));
        }
        self.fs.remove_directory(&abs).map_err(fs_error(path))?;
        Ok(Flow::Continue)
    }

    fn mv(&mut self, old: &str, new: &str) -> CommandResult {
        let old_abs = self.absolute(old)?;
        let new_abs = self.absolute(new)?;
        self.fs.rename(&old_abs, &new_abs).map_err(fs_error(old))?;
        Ok(Flow::Continue)
    }

    fn stat(&mut self, path: &str) -> CommandResult {
        let abs = self.absolute(path)?;
        let stat = self.fs.stat(&abs).map_err(fs_error(path))?;
        let kind = if stat.is_dir() {
            "directory"
        } else {
            "regular file"
        };

        writeln!(self.out, "  File: {abs}")?;
        writeln!(self.out, "  Type: {kind}")?;
        writeln!(self.out, " Inode: {}\tLinks: {}", stat.inode, stat.links)?;
        writeln!(self.out, "  Size: {}\tBlocks: {}", stat.size, stat.blocks)?;
        writeln!(self.out, "Access: {}", stat.accessed)?;
        writeln!(self.out, "Modify: {}", stat.modified)?;
        writeln!(self.out, " Birth: {}", stat.created)?;
        Ok(Flow::Continue)
    }

    fn df(&mut self) -> CommandResult {
        let usage = self.fs.usage().map_err(fs_error("/"))?;
        let bytes = |blocks: u32| ByteSizeIec(blocks as u64 * usage.block_size as u64);

        writeln!(
            self.out,
            "inodes: {} used, {} free, {} total",
            usage.used_inodes,
            usage.total_inodes - usage.used_inodes,
            usage.total_inodes
        )?;
        writeln!(
            self.out,
            "blocks: {} used, {} free, {} total ({} bytes each)",
            usage.used_blocks,
            usage.total_blocks - usage.used_blocks,
            usage.total_blocks,
            usage.block_size
        )?;
        writeln!(
            self.out,
            "space:  {} used, {} free",
            bytes(usage.used_blocks),
            bytes(usage.total_blocks - usage.used_blocks)
        )?;
        Ok(Flow::Continue)
    }

    /// 相对路径接在工作目录之后，`.` 与 `..` 按字面消去
    fn absolute(&self, path: &str) -> Result<String, CommandError> {
        path.canonicalize(&self.cwd)
            .ok_or_else(|| fs_error(path)(FsError::InvalidPath(path.to_owned())))
    }
}

/// `ancestor` 是否为 `path` 自身或其祖先
fn contains(ancestor: &str, path: &str) -> bool {
    let mut cmps = path.components();
    ancestor.components().all(|cmp| cmps.next() == Some(cmp))
}

fn fs_error(path: &str) -> impl Fn(FsError) -> CommandError + '_ {
    move |source| CommandError::Fs {
        path: path.to_owned(),
        source,
    }
}

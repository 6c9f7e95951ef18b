use std::path::PathBuf;

use clap::Parser;
use typed_bytesize::ByteSizeIec;

/// Block-based filesystem simulator on a single host file
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// Batch file with one command per line; commands come from stdin when absent
    pub script: Option<PathBuf>,

    /// Backing file of the simulated disk
    #[arg(long, default_value = "dados/meu_so.disk")]
    pub disk: PathBuf,

    /// Disk size in bytes, used when formatting
    #[arg(long, default_value_t = ByteSizeIec::mib(10).0)]
    pub disk_size: u64,

    /// Block size in bytes, used when formatting
    #[arg(long, default_value_t = 4096)]
    pub block_size: u32,

    /// Format the disk even if the backing file already exists
    #[arg(long)]
    pub format: bool,
}

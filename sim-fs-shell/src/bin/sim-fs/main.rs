mod cli;

use std::fs::{self, File};
use std::io::{self, BufReader, IsTerminal};
use std::sync::Arc;

use clap::Parser;
use log::LevelFilter;
use sim_fs::FileSystem;
use sim_fs_shell::{BlockFile, Shell};

use self::cli::Cli;

fn main() -> sim_fs::Result<()> {
    // 记录器本身放行 Debug，实际级别由全局上限控制，`verbose on` 只需调高上限
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Info);
    }

    let cli = Cli::parse();

    if let Some(dir) = cli.disk.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let block_file = if cli.format || !cli.disk.exists() {
        let block_file = Arc::new(BlockFile::format(&cli.disk, cli.disk_size)?);
        FileSystem::new(block_file.clone()).format(cli.disk_size, cli.block_size)?;
        log::info!("formatted {:?}", cli.disk);
        block_file
    } else {
        Arc::new(BlockFile::mount(&cli.disk)?)
    };

    let mut fs = FileSystem::new(block_file.clone());
    fs.mount()?;

    let mut shell = Shell::new(fs, io::stdout(), io::stderr());
    match &cli.script {
        Some(script) => shell.run(BufReader::new(File::open(script)?), false)?,
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            shell.run(stdin.lock(), interactive)?;
        }
    }

    let (mut fs, _, _) = shell.into_parts();
    fs.unmount();
    drop(fs);
    if let Ok(block_file) = Arc::try_unwrap(block_file) {
        block_file.unmount()?;
    }

    Ok(())
}

mod config;
mod crypto;
mod error;
mod fuse;
mod store;
mod vfs;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use config::{Cli, Command, Config, MetaStore};
use crypto::PageCipher;
use store::{AttrStore, FileContentStore, HttpAttrStore, LocalAttrStore};
use vfs::page::PageCodec;
use vfs::MetaFs;

type BoxError = Box<dyn std::error::Error>;

fn init_logging(config: &Config) -> Result<(), BoxError> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<(), BoxError> {
    std::fs::create_dir_all(&config.data_dir)?;

    // Kept alive for the whole session when the metadata service is remote.
    let mut runtime = None;
    let attrs: Arc<dyn AttrStore> = match &config.meta_store {
        MetaStore::Local => Arc::new(LocalAttrStore::open(&config.data_dir)?),
        MetaStore::Remote { host, port } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("metafs-http")
                .enable_all()
                .build()?;
            let store = HttpAttrStore::new(host, *port, rt.handle().clone())?;
            runtime = Some(rt);
            log::info!("metadata service at {}:{}", host, port);
            Arc::new(store)
        }
    };
    let content = Arc::new(FileContentStore::open(&config.data_dir)?);
    log::info!("content store at {}", config.data_dir.display());

    let cipher = PageCipher::new(&config.key)?;
    let codec = PageCodec::new(config.page_size, config.header_size, cipher)?;
    let fs = Arc::new(MetaFs::new(attrs, content, codec, config.default_mode)?);

    let mountpoint: Option<PathBuf> = match cli.command {
        Some(Command::Check) => {
            let report = fs.check_tree()?;
            println!(
                "checked {} directories, {} entries",
                report.directories, report.entries
            );
            for dropped in &report.dropped {
                println!("dropped dangling entry {}", dropped);
            }
            None
        }
        Some(Command::Mount { mountpoint }) => Some(mountpoint),
        None => Some(
            cli.mountpoint
                .ok_or("no mountpoint given (try `metafs mount <MOUNTPOINT>`)")?,
        ),
    };

    if let Some(mountpoint) = mountpoint {
        fuse::mount(fs, &mountpoint)?;
    }

    drop(runtime);
    Ok(())
}

fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match Config::from_options(&cli.options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("metafs: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("metafs: cannot open log file: {}", e);
        std::process::exit(2);
    }
    log::info!("metafs {} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli, config) {
        log::error!("{}", e);
        eprintln!("metafs: {}", e);
        std::process::exit(1);
    }
}

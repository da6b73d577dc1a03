//! Command line and environment configuration.
//!
//! Every option can come from a flag or a `METAFS_*` environment variable;
//! `main` loads a `.env` file first so both paths see it.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::kdf::KdfError;
use crate::crypto::utils::UtilError;
use crate::crypto::{clear_bytes, derive_page_key, key_from_hex};
use crate::vfs::page::{DEFAULT_HEADER_SIZE, DEFAULT_PAGE_SIZE, MIN_HEADER_SIZE};

/// Default port of the remote metadata service.
pub const DEFAULT_META_PORT: u16 = 27080;

#[derive(Parser, Debug)]
#[command(
    name = "metafs",
    version,
    about = "Userspace filesystem over an attribute store and an encrypted content store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Where to mount (shorthand for `metafs mount <MOUNTPOINT>`)
    pub mountpoint: Option<PathBuf>,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mount the filesystem and serve requests until unmounted
    Mount { mountpoint: PathBuf },
    /// Walk the tree from / and drop directory entries whose record is gone
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Log file (default: stderr)
    #[arg(long, env = "METAFS_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Permission bits for / and for symlinks, in octal
    #[arg(long, env = "METAFS_DEFAULT_MODE", default_value = "755", value_parser = parse_octal, global = true)]
    pub default_mode: u32,

    /// Directory holding content (and local metadata)
    #[arg(long, env = "METAFS_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Metadata service host; omit to keep metadata in the data directory
    #[arg(long, env = "METAFS_META_HOST", global = true)]
    pub meta_host: Option<String>,

    #[arg(long, env = "METAFS_META_PORT", default_value_t = DEFAULT_META_PORT, global = true)]
    pub meta_port: u16,

    #[arg(long, env = "METAFS_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    pub page_size: usize,

    #[arg(long, env = "METAFS_HEADER_SIZE", default_value_t = DEFAULT_HEADER_SIZE, global = true)]
    pub header_size: usize,

    /// File containing the hex-encoded 32-byte page key
    #[arg(long, env = "METAFS_KEY_FILE", global = true)]
    pub key_file: Option<PathBuf>,

    /// Passphrase the page key is derived from
    #[arg(long, env = "METAFS_PASSPHRASE", hide_env_values = true, global = true)]
    pub passphrase: Option<String>,
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|_| format!("'{}' is not an octal mode", s))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("header size {header} is below the minimum of {min}")]
    HeaderTooSmall { header: usize, min: usize },
    #[error("header size {header} must be smaller than page size {page}")]
    HeaderTooLarge { header: usize, page: usize },
    #[error("default mode {0:o} has bits outside 7777")]
    InvalidMode(u32),
    #[error("no page key: set --key-file or METAFS_PASSPHRASE")]
    MissingKey,
    #[error("cannot read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad key file: {0}")]
    InvalidKey(#[from] UtilError),
    #[error("cannot derive key: {0}")]
    Passphrase(#[from] KdfError),
    #[error("no data directory: set --data-dir")]
    NoDataDir,
}

/// Where Node Records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaStore {
    /// JSON documents under the data directory.
    Local,
    Remote { host: String, port: u16 },
}

/// Validated runtime configuration.
pub struct Config {
    pub log_file: Option<PathBuf>,
    pub default_mode: u32,
    pub data_dir: PathBuf,
    pub meta_store: MetaStore,
    pub page_size: usize,
    pub header_size: usize,
    pub key: Zeroizing<Vec<u8>>,
}

impl Config {
    pub fn from_options(opts: &Options) -> Result<Self, ConfigError> {
        if opts.header_size < MIN_HEADER_SIZE {
            return Err(ConfigError::HeaderTooSmall {
                header: opts.header_size,
                min: MIN_HEADER_SIZE,
            });
        }
        if opts.header_size >= opts.page_size {
            return Err(ConfigError::HeaderTooLarge {
                header: opts.header_size,
                page: opts.page_size,
            });
        }
        if opts.default_mode > 0o7777 {
            return Err(ConfigError::InvalidMode(opts.default_mode));
        }

        let data_dir = match &opts.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join("metafs"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let meta_store = match &opts.meta_host {
            Some(host) if !host.is_empty() => MetaStore::Remote {
                host: host.clone(),
                port: opts.meta_port,
            },
            _ => MetaStore::Local,
        };

        Ok(Self {
            log_file: opts.log_file.clone(),
            default_mode: opts.default_mode,
            data_dir,
            meta_store,
            page_size: opts.page_size,
            header_size: opts.header_size,
            key: load_key(opts)?,
        })
    }
}

/// Key file first, then passphrase.
fn load_key(opts: &Options) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    if let Some(path) = &opts.key_file {
        let mut raw = fs::read(path).map_err(|source| ConfigError::KeyFile {
            path: path.clone(),
            source,
        })?;
        let parsed = std::str::from_utf8(&raw)
            .map_err(|_| UtilError::InvalidHex)
            .and_then(key_from_hex);
        clear_bytes(&mut raw);
        return Ok(parsed?);
    }

    match &opts.passphrase {
        Some(passphrase) if !passphrase.is_empty() => Ok(derive_page_key(passphrase.as_bytes())?),
        _ => Err(ConfigError::MissingKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["metafs"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["--data-dir", "/tmp/m"]);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["/mnt/x", "--passphrase", "pw"]);
        assert_eq!(cli.mountpoint, Some(PathBuf::from("/mnt/x")));
        assert!(cli.command.is_none());

        let config = Config::from_options(&cli.options).unwrap();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.header_size, 93);
        assert_eq!(config.default_mode, 0o755);
        assert_eq!(config.meta_store, MetaStore::Local);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/m"));
        assert_eq!(config.key.len(), 32);
    }

    #[test]
    fn test_subcommands() {
        let cli = parse(&["check", "--passphrase", "pw"]);
        assert!(matches!(cli.command, Some(Command::Check)));

        let cli = parse(&["mount", "/mnt/y", "--meta-host", "db.local"]);
        match cli.command {
            Some(Command::Mount { mountpoint }) => assert_eq!(mountpoint, PathBuf::from("/mnt/y")),
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.options.meta_host.as_deref(), Some("db.local"));
    }

    #[test]
    fn test_remote_meta_store() {
        let cli = parse(&["--meta-host", "db", "--meta-port", "9000", "--passphrase", "pw"]);
        let config = Config::from_options(&cli.options).unwrap();
        assert_eq!(
            config.meta_store,
            MetaStore::Remote {
                host: "db".to_string(),
                port: 9000
            }
        );
    }

    #[test]
    fn test_octal_mode() {
        assert_eq!(parse_octal("700").unwrap(), 0o700);
        assert_eq!(parse_octal("0o644").unwrap(), 0o644);
        assert!(parse_octal("9").is_err());

        let cli = parse(&["--default-mode", "17777", "--passphrase", "pw"]);
        assert!(matches!(
            Config::from_options(&cli.options),
            Err(ConfigError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_page_layout_validation() {
        let cli = parse(&["--header-size", "16", "--passphrase", "pw"]);
        assert!(matches!(
            Config::from_options(&cli.options),
            Err(ConfigError::HeaderTooSmall { header: 16, .. })
        ));

        let cli = parse(&["--page-size", "64", "--header-size", "64", "--passphrase", "pw"]);
        assert!(matches!(
            Config::from_options(&cli.options),
            Err(ConfigError::HeaderTooLarge { .. })
        ));

        let cli = parse(&["--page-size", "64", "--header-size", "32", "--passphrase", "pw"]);
        assert!(Config::from_options(&cli.options).is_ok());
    }

    #[test]
    fn test_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.key");
        fs::write(&good, format!("{}\n", "ab".repeat(32))).unwrap();
        let short = dir.path().join("short.key");
        fs::write(&short, "abcd").unwrap();

        let cli = parse(&["--key-file", good.to_str().unwrap()]);
        let config = Config::from_options(&cli.options).unwrap();
        assert_eq!(config.key.as_slice(), &[0xab; 32][..]);

        let cli = parse(&["--key-file", short.to_str().unwrap()]);
        assert!(matches!(
            Config::from_options(&cli.options),
            Err(ConfigError::InvalidKey(UtilError::InvalidKeyLength(2)))
        ));

        let cli = parse(&["--key-file", "/nonexistent/metafs.key"]);
        assert!(matches!(
            Config::from_options(&cli.options),
            Err(ConfigError::KeyFile { .. })
        ));
    }

    fn bare_options() -> Options {
        Options {
            log_file: None,
            default_mode: 0o755,
            data_dir: Some(PathBuf::from("/tmp/m")),
            meta_host: None,
            meta_port: DEFAULT_META_PORT,
            page_size: DEFAULT_PAGE_SIZE,
            header_size: DEFAULT_HEADER_SIZE,
            key_file: None,
            passphrase: None,
        }
    }

    #[test]
    fn test_missing_key() {
        let opts = bare_options();
        assert!(matches!(
            Config::from_options(&opts),
            Err(ConfigError::MissingKey)
        ));

        let opts = Options {
            passphrase: Some(String::new()),
            ..bare_options()
        };
        assert!(matches!(
            Config::from_options(&opts),
            Err(ConfigError::MissingKey)
        ));
    }
}

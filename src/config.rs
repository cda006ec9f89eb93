//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;
use std::time::Duration;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

/// Max size of an individual uploaded file.
pub const MAX_FILE_SIZE: u64 = 200 * 1024;
/// Scratch buffer capacity shared by every transfer.
pub const SCRATCH_BUFSIZE: usize = 0xFFFE;
pub const VFS_PATH_MAX: usize = 4096;
pub const OBJ_NAME_LEN: usize = 255;
/// Longest absolute path a request may resolve to.
pub const FILE_PATH_MAX: usize = VFS_PATH_MAX + OBJ_NAME_LEN;
pub const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RECV_RETRIES: u32 = 6;
pub const DEFAULT_TRANSFER_WAIT_SECS: u64 = 30;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "nano-drive", version = VERSION_INFO, about = "nano-drive file server")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "NANO_STORAGE_DIR",
        default_value = ".nano/storage",
        help = "Storage directory for files"
    )]
    pub storage_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "NANO_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "NANO_HTTP_PORT",
        default_value_t = 5080,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(long, env = "NANO_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "NANO_MAX_FILE_SIZE",
        default_value_t = MAX_FILE_SIZE,
        help = "Max upload size in bytes"
    )]
    pub max_file_size: u64,
    #[arg(
        long,
        env = "NANO_SCRATCH_SIZE",
        default_value_t = SCRATCH_BUFSIZE,
        help = "Scratch buffer capacity in bytes"
    )]
    pub scratch_size: usize,
    #[arg(
        long,
        env = "NANO_MAX_PATH_LEN",
        default_value_t = FILE_PATH_MAX,
        help = "Max length of a resolved file path"
    )]
    pub max_path_len: usize,
    #[arg(
        long,
        env = "NANO_CHUNK_TIMEOUT_SECS",
        default_value_t = DEFAULT_CHUNK_TIMEOUT_SECS,
        help = "Timeout for receiving or sending a single chunk"
    )]
    pub chunk_timeout_secs: u64,
    #[arg(
        long,
        env = "NANO_RECV_RETRIES",
        default_value_t = DEFAULT_RECV_RETRIES,
        help = "Consecutive receive timeouts tolerated before an upload is aborted"
    )]
    pub recv_retries: u32,
    #[arg(
        long,
        env = "NANO_TRANSFER_WAIT_SECS",
        default_value_t = DEFAULT_TRANSFER_WAIT_SECS,
        help = "How long a request waits for the scratch buffer"
    )]
    pub transfer_wait_secs: u64,
}

/// Limits applied by the transfer handlers.
#[derive(Clone, Debug)]
pub struct TransferLimits {
    pub max_file_size: u64,
    pub max_path_len: usize,
    pub chunk_timeout: Duration,
    pub recv_retries: u32,
    pub transfer_wait: Duration,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_path_len: FILE_PATH_MAX,
            chunk_timeout: Duration::from_secs(DEFAULT_CHUNK_TIMEOUT_SECS),
            recv_retries: DEFAULT_RECV_RETRIES,
            transfer_wait: Duration::from_secs(DEFAULT_TRANSFER_WAIT_SECS),
        }
    }
}

impl From<&Args> for TransferLimits {
    fn from(args: &Args) -> Self {
        Self {
            max_file_size: args.max_file_size,
            max_path_len: args.max_path_len,
            chunk_timeout: Duration::from_secs(args.chunk_timeout_secs),
            recv_retries: args.recv_retries,
            transfer_wait: Duration::from_secs(args.transfer_wait_secs),
        }
    }
}

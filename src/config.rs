//! CLI arguments and server configuration defaults.

use clap::Parser;

pub const DEFAULT_PORT: u16 = 5106;
pub const DEFAULT_MAX_BODY_SIZE: usize = 128 * 1024 * 1024;
pub const REPOSITORY_URL: &str = "https://github.com/theatom06/pinas";
pub const HASH_PARTS: usize = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "pinas", version, about = "PiNAS file storage server")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "PINAS_STORAGE_DIR",
        default_value = "drive",
        help = "Root directory served by the file routes"
    )]
    pub storage_dir: String,
    #[arg(
        short = 'l',
        long,
        env = "PINAS_LOG_DIR",
        default_value = "logs",
        help = "Directory holding one request log per server run"
    )]
    pub log_dir: String,
    #[arg(
        short = 'd',
        long,
        env = "PINAS_DEPLOY_DIR",
        default_value = ".",
        help = "Working directory for paperplane deployments"
    )]
    pub deploy_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "PINAS_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "PINAS_MAX_BODY_SIZE",
        default_value_t = DEFAULT_MAX_BODY_SIZE,
        help = "Max request body size in bytes"
    )]
    pub max_body_size: usize,
}

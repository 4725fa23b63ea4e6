//! 每次运行一个的请求日志文件：控制台与文件双写。

use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Append-only log of handled requests for the current server run.
#[derive(Debug)]
pub struct RequestLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RequestLog {
    /// Creates `<dir>/<started>.log` and writes the start banner.
    pub async fn create(dir: &Path, started: DateTime<Utc>) -> io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(log_file_name(started));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("Server started at {}\n\n", iso(started)).as_bytes())
            .await?;
        file.flush().await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, message: &str) {
        info!("{message}");
        self.append(message).await;
    }

    pub async fn record_error(&self, message: &str) {
        warn!("{message}");
        self.append(message).await;
    }

    pub async fn contents(&self) -> io::Result<String> {
        let _guard = self.file.lock().await;
        fs::read_to_string(&self.path).await
    }

    /// 写入停止时间（服务关闭时调用）。
    pub async fn close(&self) {
        let trailer = format!("Server stopped at {}\n\n", iso(Utc::now()));
        self.write_raw(&trailer).await;
    }

    async fn append(&self, message: &str) {
        let line = format!("[{}] {message}\n", iso(Utc::now()));
        self.write_raw(&line).await;
    }

    async fn write_raw(&self, text: &str) {
        let mut file = self.file.lock().await;
        let result = async {
            file.write_all(text.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, path = %self.path.display(), "request log write failed");
        }
    }
}

/// Builds the `<label> <subject> from <user agent>` line for a handled request.
pub fn request_line(label: &str, subject: &str, user_agent: Option<&str>) -> String {
    let user_agent = user_agent.unwrap_or("unknown");
    if subject.is_empty() {
        format!("{label} from {user_agent}")
    } else {
        format!("{label} {subject} from {user_agent}")
    }
}

fn log_file_name(started: DateTime<Utc>) -> String {
    format!("{}.log", iso(started).replace(':', "-"))
}

fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

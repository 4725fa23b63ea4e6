//! 文件路由：列表、元数据、下载、删除、上传、重命名与分段哈希。

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::config::HASH_PARTS;
use crate::error::ApiError;
use crate::fingerprint::fingerprint;
use crate::http::{ClientAgent, agent_name};
use crate::request_log::{RequestLog, request_line};
use crate::storage::{ROOT_ID, Storage, StorageError};

/// Logs a storage failure and swaps it for the route's generic message.
async fn checked<T>(
    log: &RequestLog,
    result: Result<T, StorageError>,
    action: &str,
    message: &'static str,
) -> Result<T, ApiError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            log.record_error(&format!("Error {action}: {err}")).await;
            Err(ApiError::Failure(message))
        }
    }
}

fn plain_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// 列出目录内容（`root` 表示存储根目录）。
pub async fn list_files(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<Response, ApiError> {
    let subject = if id == ROOT_ID { "" } else { id.as_str() };
    log.record(&request_line("List", subject, agent_name(&agent)))
        .await;
    let names = checked(
        &log,
        storage.list_names(&id).await,
        "listing files",
        "Failed to list files",
    )
    .await?;
    Ok(plain_text(names.join("\n")))
}

/// 返回文件状态字段，每行 `key: value`。
pub async fn file_metadata(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<Response, ApiError> {
    log.record(&request_line("Metadata", &id, agent_name(&agent)))
        .await;
    let fields = checked(
        &log,
        storage.metadata(&id).await,
        "getting metadata",
        "Failed to get metadata",
    )
    .await?;
    let body = fields
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(plain_text(body))
}

pub async fn download_file(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<Response, ApiError> {
    log.record(&request_line("Download", &id, agent_name(&agent)))
        .await;
    let contents = checked(
        &log,
        storage.read(&id).await,
        "downloading file",
        "Failed to download file",
    )
    .await?;
    let mime = mime_guess::from_path(&id).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.essence_str().to_string())], contents).into_response())
}

pub async fn delete_file(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<&'static str, ApiError> {
    log.record(&request_line("Delete", &id, agent_name(&agent)))
        .await;
    checked(
        &log,
        storage.delete(&id).await,
        "deleting file",
        "Failed to delete file",
    )
    .await?;
    Ok("File deleted successfully")
}

/// 以请求体覆盖写入文件（父目录按需创建）。
pub async fn upload_file(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    log.record(&request_line("Upload", &id, agent_name(&agent)))
        .await;
    checked(
        &log,
        storage.write(&id, &body).await,
        "uploading file",
        "Failed to upload file",
    )
    .await?;
    Ok("File uploaded successfully")
}

pub async fn upload_requires_post() -> ApiError {
    ApiError::MethodNotAllowed("Only POST requests are allowed")
}

/// 重命名：请求体为新路径，复制后删除旧文件。
pub async fn rename_file(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
    new_name: String,
) -> Result<&'static str, ApiError> {
    let subject = format!("{id} to {new_name}");
    log.record(&request_line("Rename", &subject, agent_name(&agent)))
        .await;
    checked(
        &log,
        storage.rename(&id, &new_name).await,
        "renaming file",
        "Failed to rename file",
    )
    .await?;
    Ok("File renamed successfully")
}

/// 分段 SHA-512 指纹；读取失败按未处理错误返回。
pub async fn hash_file(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<String, ApiError> {
    log.record(&request_line("Hash", "", agent_name(&agent)))
        .await;
    let text = match storage.read_text(&id).await {
        Ok(text) => text,
        Err(err) => {
            log.record_error(&format!("Server error: {err}")).await;
            return Err(ApiError::Unhandled(err.to_string()));
        }
    };
    tokio::task::spawn_blocking(move || fingerprint(&text, HASH_PARTS))
        .await
        .map_err(|err| ApiError::Unhandled(err.to_string()))
}

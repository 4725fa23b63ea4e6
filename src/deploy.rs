//! Paperplane deployments: an uploaded tar archive is unpacked and its
//! `deploy.sh` is executed.
//!
//! This runs arbitrary caller supplied code with the server's privileges.
//! Nothing is sandboxed; any production variant must put its own access
//! control in front of this route.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;
use tracing::warn;

use crate::error::ApiError;
use crate::http::{ClientAgent, agent_name};
use crate::request_log::{RequestLog, request_line};

pub const DEPLOY_SCRIPT: &str = "deploy.sh";

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeployStep {
    Resolve,
    Write,
    Extract,
    Permit,
    Execute,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployFailure {
    pub step: DeployStep,
    pub message: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl DeployFailure {
    fn io(step: DeployStep, err: std::io::Error) -> Self {
        Self {
            step,
            message: err.to_string(),
            exit_code: None,
            stderr: String::new(),
        }
    }
}

/// Runs deployments inside a fixed working directory.
#[derive(Debug)]
pub struct Deployer {
    work_dir: PathBuf,
}

impl Deployer {
    pub fn new(work_dir: PathBuf) -> Self {
        Self { work_dir }
    }

    pub async fn ensure_work_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.work_dir).await
    }

    /// Writes, unpacks and runs `archive_name`, returning the script's stdout.
    ///
    /// The archive is removed afterwards whether or not a step failed.
    pub async fn deploy(
        &self,
        archive_name: &str,
        archive: &[u8],
    ) -> Result<String, DeployFailure> {
        let archive_name = archive_name.trim_start_matches(['/', '\\']);
        if archive_name.is_empty() || archive_name.contains("..") {
            return Err(DeployFailure {
                step: DeployStep::Resolve,
                message: "Invalid path".into(),
                exit_code: None,
                stderr: String::new(),
            });
        }
        let archive_path = self.work_dir.join(archive_name);
        let result = self.unpack_and_run(archive_name, archive).await;
        if let Err(err) = fs::remove_file(&archive_path).await {
            warn!(error = %err, archive = %archive_path.display(), "archive cleanup failed");
        }
        result
    }

    async fn unpack_and_run(
        &self,
        archive_name: &str,
        archive: &[u8],
    ) -> Result<String, DeployFailure> {
        let folder = archive_name.replacen(".tar", "", 1);

        fs::write(self.work_dir.join(archive_name), archive)
            .await
            .map_err(|err| DeployFailure::io(DeployStep::Write, err))?;

        run_step(
            DeployStep::Extract,
            Command::new("tar")
                .arg("-xf")
                .arg(archive_name)
                .current_dir(&self.work_dir),
        )
        .await?;

        run_step(
            DeployStep::Permit,
            Command::new("chmod")
                .arg("+x")
                .arg(format!("{folder}/{DEPLOY_SCRIPT}"))
                .current_dir(&self.work_dir),
        )
        .await?;

        let output = run_step(
            DeployStep::Execute,
            Command::new("sh")
                .arg(format!("./{DEPLOY_SCRIPT}"))
                .current_dir(self.work_dir.join(&folder)),
        )
        .await?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

async fn run_step(step: DeployStep, command: &mut Command) -> Result<Output, DeployFailure> {
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| DeployFailure::io(step, err))?;
    if !output.status.success() {
        return Err(DeployFailure {
            step,
            message: format!("{step:?} exited with {}", output.status),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}

/// `POST /paperplane/upload/{id}`
pub async fn deploy_project(
    Path(id): Path<String>,
    agent: ClientAgent,
    Extension(deployer): Extension<Arc<Deployer>>,
    Extension(log): Extension<Arc<RequestLog>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    log.record(&request_line("Paperplane", &id, agent_name(&agent)))
        .await;
    match deployer.deploy(&id, &body).await {
        Ok(stdout) => Ok(Json(json!({
            "message": "Project deployed successfully",
            "response": stdout,
        }))),
        Err(failure) => {
            log.record_error(&format!("Error deploying {id}: {}", failure.message))
                .await;
            Err(ApiError::Deploy(failure))
        }
    }
}

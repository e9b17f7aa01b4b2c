use actix_web::http::StatusCode;
use log::{debug, warn};
use std::path::PathBuf;

use crate::error::GatewayError;
use crate::file_system::{self, BaseDir};
use crate::models::{Action, DataBody, FileActionRequest, FileActionResponse, SourceMode};

/// What happens when a filesystem call fails after the request validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Surface the failure to the caller as error code 4.
    #[default]
    Report,
    /// Log it and still answer `status: true`.
    Log,
}

/// Whether `remove` waits for the delete before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemovalMode {
    #[default]
    Await,
    /// Fire and forget. A read issued right after may still see the file.
    Detached,
}

pub struct FileActionDispatcher {
    base: BaseDir,
    failures: FailurePolicy,
    removal: RemovalMode,
}

impl FileActionDispatcher {
    pub fn new(base: BaseDir) -> Self {
        FileActionDispatcher {
            base,
            failures: FailurePolicy::default(),
            removal: RemovalMode::default(),
        }
    }

    pub fn with_failure_policy(mut self, failures: FailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_removal_mode(mut self, removal: RemovalMode) -> Self {
        self.removal = removal;
        self
    }

    pub fn base(&self) -> &BaseDir {
        &self.base
    }

    /// Decodes a raw body and runs it. Every action outcome, logical errors
    /// included, travels with HTTP 200.
    pub async fn handle_body(&self, body: &[u8]) -> (FileActionResponse, StatusCode) {
        let request = FileActionRequest::decode(body);
        (self.dispatch(&request).await, StatusCode::OK)
    }

    pub async fn dispatch(&self, request: &FileActionRequest) -> FileActionResponse {
        debug!(
            "{} [FILE: {}] [DESTINATION: {}] [SOURCE: {:?}]",
            request.action.as_str(),
            request.file,
            request.destination().unwrap_or("-"),
            request.source
        );
        let outcome = match request.action {
            Action::Copy => self.copy(request).await,
            Action::Write => self.write(request).await,
            Action::Read => self.read(request).await,
            Action::Remove => self.remove(request).await,
            Action::None => Ok(FileActionResponse::welcome()),
        };
        match outcome {
            Ok(response) => response,
            Err(err) => self.settle(err),
        }
    }

    fn settle(&self, err: GatewayError) -> FileActionResponse {
        if let GatewayError::Operation {
            operation,
            path,
            source,
        } = &err
        {
            warn!("FILE SERVER:: {} failed for '{}': {}", operation, path.display(), source);
            if self.failures == FailurePolicy::Log {
                return FileActionResponse::ok();
            }
        }
        FileActionResponse::failure(&err)
    }

    fn destination(&self, request: &FileActionRequest) -> Result<PathBuf, GatewayError> {
        request
            .destination()
            .map(|d| self.base.resolve(Some(d)))
            .ok_or(GatewayError::MissingDestination)
    }

    async fn existing_file(&self, relative: &str) -> Result<PathBuf, GatewayError> {
        let path = self.base.resolve(Some(relative));
        if file_system::file_exists(&path).await {
            Ok(path)
        } else {
            Err(GatewayError::FileNotFound { path })
        }
    }

    async fn copy(&self, request: &FileActionRequest) -> Result<FileActionResponse, GatewayError> {
        let destination = self.destination(request)?;
        let source = self.existing_file(&request.file).await?;
        let contents = file_system::read_file(&source)
            .await
            .map_err(|e| GatewayError::operation("copy", &source, e))?;
        file_system::write_file(&destination, &contents)
            .await
            .map_err(|e| GatewayError::operation("copy", &destination, e))?;
        Ok(FileActionResponse::ok())
    }

    async fn write(&self, request: &FileActionRequest) -> Result<FileActionResponse, GatewayError> {
        let destination = self.destination(request)?;
        let contents = match request.source {
            SourceMode::Data => request.file.as_bytes().to_vec(),
            SourceMode::Local => {
                let source = self.base.resolve(Some(&request.file));
                file_system::read_file(&source)
                    .await
                    .map_err(|e| GatewayError::operation("write", &source, e))?
            }
        };
        file_system::write_file(&destination, &contents)
            .await
            .map_err(|e| GatewayError::operation("write", &destination, e))?;
        Ok(FileActionResponse::ok())
    }

    async fn read(&self, request: &FileActionRequest) -> Result<FileActionResponse, GatewayError> {
        let path = self.existing_file(&request.file).await?;
        let contents = file_system::read_file(&path)
            .await
            .map_err(|e| GatewayError::operation("read", &path, e))?;
        Ok(FileActionResponse::with_data(DataBody::from_bytes(contents)))
    }

    async fn remove(&self, request: &FileActionRequest) -> Result<FileActionResponse, GatewayError> {
        let path = self.base.resolve(Some(&request.file));
        if !file_system::file_exists(&path).await {
            return Ok(FileActionResponse::ok());
        }
        match self.removal {
            RemovalMode::Await => {
                file_system::remove_file(&path)
                    .await
                    .map_err(|e| GatewayError::operation("remove", &path, e))?;
            }
            RemovalMode::Detached => {
                tokio::spawn(async move {
                    if let Err(e) = file_system::remove_file(&path).await {
                        warn!("FILE SERVER:: remove failed for '{}': {}", path.display(), e);
                    }
                });
            }
        }
        Ok(FileActionResponse::ok())
    }
}

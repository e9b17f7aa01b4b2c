use actix_files::NamedFile;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, warn};
use std::borrow::Cow;

use crate::dispatcher::FileActionDispatcher;
use crate::error::GatewayError;
use crate::file_system;
use crate::models::FileActionResponse;

pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Largest POST body read before answering 413. Registered as app data.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// Single entry point for every path. `POST` goes through the action
/// dispatcher, `GET` serves a file straight from the request path, anything
/// else is turned away before the body is read.
pub async fn entry(
    req: HttpRequest,
    payload: web::Payload,
    dispatcher: web::Data<FileActionDispatcher>,
) -> HttpResponse {
    match *req.method() {
        Method::POST => {
            let limit = req
                .app_data::<BodyLimit>()
                .map_or(DEFAULT_BODY_LIMIT, |l| l.0);
            let body = match payload.to_bytes_limited(limit).await {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    warn!("Failed to read request body: {}", e);
                    return HttpResponse::BadRequest().finish();
                }
                Err(_) => {
                    debug!("Request body exceeds {} bytes", limit);
                    return HttpResponse::PayloadTooLarge().finish();
                }
            };
            let (response, status) = dispatcher.handle_body(&body).await;
            HttpResponse::build(status).json(response)
        }
        Method::GET => serve_file(&req, &dispatcher).await,
        _ => {
            debug!("Rejecting {} {}", req.method(), req.path());
            reject(GatewayError::MethodNotAllowed)
        }
    }
}

async fn serve_file(req: &HttpRequest, dispatcher: &FileActionDispatcher) -> HttpResponse {
    let raw = req.path();
    let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() {
        return HttpResponse::Ok().json(FileActionResponse::welcome());
    }
    let path = dispatcher.base().resolve(Some(relative));
    debug!("Serving file: {}", path.display());

    if !file_system::file_exists(&path).await {
        let err = GatewayError::FileNotFound { path };
        return HttpResponse::NotFound().json(FileActionResponse::failure_with_status(&err, 404));
    }
    match NamedFile::open_async(&path).await {
        Ok(file) => file.into_response(req),
        Err(e) => {
            warn!("Failed to open '{}': {}", path.display(), e);
            reject(GatewayError::operation("read", path, e))
        }
    }
}

fn reject(err: GatewayError) -> HttpResponse {
    HttpResponse::build(err.http_status()).json(FileActionResponse::failure(&err))
}

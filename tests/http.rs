use actix_web::http::{Method, StatusCode};
use actix_web::{test, web, App};
use edge_file_server::dispatcher::FileActionDispatcher;
use edge_file_server::file_system::BaseDir;
use edge_file_server::handlers;
use edge_file_server::models::FileActionResponse;
use serde_json::json;
use tempfile::TempDir;

fn dispatcher(dir: &TempDir) -> web::Data<FileActionDispatcher> {
    web::Data::new(FileActionDispatcher::new(BaseDir::new(dir.path()).unwrap()))
}

macro_rules! gateway {
    ($dir:expr) => {
        test::init_service(
            App::new()
                .app_data(dispatcher($dir))
                .default_service(web::to(handlers::entry)),
        )
        .await
    };
}

#[actix_rt::test]
async fn wrong_method_is_rejected_with_405() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let req = test::TestRequest::default()
            .method(method)
            .uri("/")
            .set_payload(r#"{"action":"remove","file":"x"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], json!(false));
        assert_eq!(body["error"]["code"], json!(1));
        assert_eq!(body["error"]["status"], json!(405));
    }
}

#[actix_rt::test]
async fn post_write_then_read_over_http() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(
            json!({"action": "write", "file": "hello", "destination": "out/greeting.txt", "source": "data"})
                .to_string(),
        )
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"status": true}));

    let req = test::TestRequest::post()
        .uri("/any/path")
        .set_payload(json!({"action": "read", "file": "out/greeting.txt"}).to_string())
        .to_request();
    let body: FileActionResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.status);
    assert_eq!(body.data.unwrap().file, "hello");
}

#[actix_rt::test]
async fn logical_errors_travel_with_200() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(json!({"action": "copy", "file": "missing.txt", "destination": "b"}).to_string())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: FileActionResponse = test::read_body_json(resp).await;
    assert!(!body.status);
    assert_eq!(body.error.unwrap().code, 3);
}

#[actix_rt::test]
async fn garbage_body_gets_welcome() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::post()
        .uri("/")
        .set_payload("definitely not json")
        .to_request();
    let body: FileActionResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.status);
    assert_eq!(
        body.meta.unwrap()["message"],
        json!("Welcome to Edge Runtime File Server")
    );
}

#[actix_rt::test]
async fn get_serves_file_bytes() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("storage/logo")).unwrap();
    std::fs::write(dir.path().join("storage/logo/saved.txt"), "saved contents").unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::get()
        .uri("/storage/logo/saved.txt")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"saved contents");
}

#[actix_rt::test]
async fn get_missing_file_is_404() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::get().uri("/nope.txt").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: FileActionResponse = test::read_body_json(resp).await;
    let error = body.error.unwrap();
    assert_eq!(error.code, 3);
    assert_eq!(error.http_status, 404);
}

#[actix_rt::test]
async fn get_root_is_a_health_check() {
    let dir = TempDir::new().unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::get().uri("/").to_request();
    let body: FileActionResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.status);
    assert!(body.meta.is_some());
}

#[actix_rt::test]
async fn get_decodes_percent_encoded_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("my file.txt"), "spaced out").unwrap();
    let app = gateway!(&dir);

    let req = test::TestRequest::get().uri("/my%20file.txt").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"spaced out");
}

#[actix_rt::test]
async fn method_guard_runs_before_body_limit() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(dispatcher(&dir))
            .app_data(handlers::BodyLimit(8))
            .default_service(web::to(handlers::entry)),
    )
    .await;
    let oversized = "x".repeat(64);

    let req = test::TestRequest::put()
        .uri("/")
        .set_payload(oversized.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: FileActionResponse = test::read_body_json(resp).await;
    assert_eq!(body.error.unwrap().code, 1);

    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(oversized)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

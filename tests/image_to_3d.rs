use std::fs::File;
use std::io::Write;

use serde_json::json;
use tripo_gen::{TripoClient, TripoError};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "2b5a60fe-7a9c-4f2f-9d3e-1c5b8a7d6e4f";

#[tokio::test]
async fn uploads_local_file_then_creates_task() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "image_token": TOKEN }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/task"))
        .and(body_partial_json(json!({
            "type": "image_to_model",
            "file": { "type": "png", "file_token": TOKEN }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "task_id": "task-123" }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("test_image.png");
    let mut file = File::create(&image_path).unwrap();
    file.write_all(b"dummy image data").unwrap();

    let client = TripoClient::new_with_url(Some("test_api_key".to_string()), &server.uri()).unwrap();
    let task_id = client
        .image_to_model(image_path.to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(task_id, "task-123");
}

#[tokio::test]
async fn url_input_is_passed_through_without_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/task"))
        .and(body_partial_json(json!({
            "type": "image_to_model",
            "file": { "url": "https://example.com/photo.jpg" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "task_id": "task-456" }
        })))
        .mount(&server)
        .await;

    let client = TripoClient::new_with_url(Some("test_api_key".to_string()), &server.uri()).unwrap();
    let task_id = client
        .image_to_model("https://example.com/photo.jpg", None)
        .await
        .unwrap();

    assert_eq!(task_id, "task-456");
}

#[tokio::test]
async fn file_token_input_is_passed_through_without_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/task"))
        .and(body_partial_json(json!({
            "type": "image_to_model",
            "file": { "file_token": TOKEN }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "task_id": "task-789" }
        })))
        .mount(&server)
        .await;

    let client = TripoClient::new_with_url(Some("test_api_key".to_string()), &server.uri()).unwrap();
    let task_id = client.image_to_model(TOKEN, None).await.unwrap();

    assert_eq!(task_id, "task-789");
}

#[tokio::test]
async fn missing_input_file_fails_before_any_request() {
    // Nothing listens here; an attempted request would fail differently.
    let client =
        TripoClient::new_with_url(Some("test_api_key".to_string()), "http://127.0.0.1:9/").unwrap();

    let err = client
        .image_to_model("/definitely/not/here.png", None)
        .await
        .unwrap_err();

    assert!(matches!(err, TripoError::InputNotFound { .. }));
}

#[tokio::test]
async fn upload_service_error_aborts_pipeline() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1,
            "message": "unsupported image format"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("test_image.png");
    File::create(&image_path)
        .unwrap()
        .write_all(b"dummy image data")
        .unwrap();

    let client = TripoClient::new_with_url(Some("test_api_key".to_string()), &server.uri()).unwrap();
    let err = client
        .image_to_model(image_path.to_str().unwrap(), None)
        .await
        .unwrap_err();

    match err {
        TripoError::UploadFailed { message } => assert_eq!(message, "unsupported image format"),
        other => panic!("expected UploadFailed, got {other:?}"),
    }
}

//! Media serving and health endpoint tests.

mod common;

use common::{audio_part, cover_part, create_test_wav, riff_form, TestServer, CREATOR};
use reqwest::{header, multipart};
use serde_json::Value;

/// Upload a riff with a cover and return (audio url, cover url)
async fn upload_with_cover(server: &TestServer, seed: u8) -> (String, String) {
    let form = multipart::Form::new()
        .part("audio", audio_part(seed))
        .part("cover", cover_part(512, 256))
        .text("title", "Covered")
        .text("walletAddress", CREATOR);
    let riff = server.upload(form).await;

    (
        riff["audioUrl"].as_str().unwrap().to_string(),
        riff["coverUrl"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_serve_audio() {
    let server = TestServer::start().await;
    let (audio_url, _) = upload_with_cover(&server, 3).await;

    let response = server.client().get(&audio_url).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/x-wav");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600, immutable"
    );
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key(header::ETAG));

    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), create_test_wav(3).as_slice());
}

#[tokio::test]
async fn test_serve_cover_is_resized() {
    let server = TestServer::start().await;
    let (_, cover_url) = upload_with_cover(&server, 1).await;

    let response = server.client().get(&cover_url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let body = response.bytes().await.unwrap();
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!(image.width(), 256);
    assert_eq!(image.height(), 128);
}

#[tokio::test]
async fn test_etag_not_modified() {
    let server = TestServer::start().await;
    let client = server.client();
    let (audio_url, _) = upload_with_cover(&server, 1).await;

    let response = client.get(&audio_url).send().await.unwrap();
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();

    let response = client
        .get(&audio_url)
        .header(header::IF_NONE_MATCH, &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 304);

    let response = client
        .get(&audio_url)
        .header(header::IF_NONE_MATCH, "\"something-else\"")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_identical_audio_is_stored_once() {
    let server = TestServer::start().await;

    let first = server.upload(riff_form("One", 9)).await;
    let second = server.upload(riff_form("Two", 9)).await;

    assert_ne!(first["id"], second["id"]);
    assert_eq!(first["audioUrl"], second["audioUrl"]);

    let stats: Value = server
        .client()
        .get(server.url("/health/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["riff_count"], 2);
    assert_eq!(stats["media_count"], 1);
}

#[tokio::test]
async fn test_unknown_media_not_found() {
    let server = TestServer::start().await;
    let client = server.client();

    let response = client
        .get(server.url("/media/00000000-0000-0000-0000-000000000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .get(server.url("/media/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::start().await;
    let client = server.client();

    let live: Value = client
        .get(server.url("/health/live"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(live["status"], "ok");

    let response = client.get(server.url("/health/ready")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let ready: Value = response.json().await.unwrap();
    assert_eq!(ready["database"], "connected");

    let stats: Value = client
        .get(server.url("/health/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["riff_count"], 0);
    assert_eq!(stats["media_count"], 0);
}

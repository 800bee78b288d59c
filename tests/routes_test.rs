//! Route table tests.
//!
//! The riff routes run over a recording controller, so these tests see exactly
//! which operations a request reaches and with which arguments.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use riff_marketplace_server::{
    config::UploadConfig,
    error::Result,
    handlers::riff_routes,
    models::{
        ActivityResponse, ClaimResponse, FavoriteResponse, MintResponse, Riff, RiffFilter,
        RiffPage, RiffResponse, StakeResponse, StakingRewardsResponse, UnstakeResponse,
        UploadRiffRequest,
    },
    services::RiffController,
    validation::UploadFiles,
    RiffApi,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

/// Controller double that records every call
#[derive(Default)]
struct RecordingController {
    calls: Mutex<Vec<String>>,
}

impl RecordingController {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn sample_riff(id: u64) -> RiffResponse {
    let riff = Riff {
        id,
        title: "Loop".to_string(),
        description: None,
        genre: None,
        mood: None,
        instrument: None,
        key_signature: None,
        time_signature: None,
        is_bargain_bin: false,
        collection_id: None,
        price: None,
        currency: "ETH".to_string(),
        royalty_percentage: 10,
        is_stakable: true,
        staking_royalty_share: 50,
        unlock_source_files: false,
        unlock_remix_rights: false,
        unlock_private_messages: false,
        unlock_backstage_content: false,
        wallet_address: "0xabc".to_string(),
        audio_id: Uuid::nil(),
        cover_id: None,
        favorites_count: 0,
        mint: None,
        created_at: Utc::now(),
    };
    RiffResponse::from_riff(&riff, "http://riffs.test")
}

#[async_trait]
impl RiffController for RecordingController {
    async fn get_all_riffs(&self, filter: RiffFilter) -> Result<RiffPage> {
        self.record(format!(
            "get_all_riffs(genre={:?}, limit={:?}, offset={:?}, stakable={:?})",
            filter.genre, filter.limit, filter.offset, filter.stakable
        ));
        Ok(RiffPage {
            riffs: vec![],
            total: 0,
            limit: 20,
            offset: 0,
        })
    }

    async fn get_riff_by_id(&self, id: i64) -> Result<RiffResponse> {
        self.record(format!("get_riff_by_id({})", id));
        Ok(sample_riff(id as u64))
    }

    async fn get_riff_activity(&self, id: i64) -> Result<ActivityResponse> {
        self.record(format!("get_riff_activity({})", id));
        Ok(ActivityResponse {
            riff_id: id as u64,
            events: vec![],
        })
    }

    async fn upload_riff(
        &self,
        request: UploadRiffRequest,
        files: UploadFiles,
    ) -> Result<RiffResponse> {
        self.record(format!(
            "upload_riff({}, {}, audio={}, cover={})",
            request.title,
            request.wallet_address,
            files.audio.is_some(),
            files.cover.is_some()
        ));
        Ok(sample_riff(1))
    }

    async fn mint_riff(&self, id: i64, wallet_address: String) -> Result<MintResponse> {
        self.record(format!("mint_riff({}, {})", id, wallet_address));
        Ok(MintResponse {
            riff_id: id as u64,
            token_id: 1,
            owner_address: wallet_address,
            minted_at: Utc::now(),
        })
    }

    async fn stake_riff(
        &self,
        id: i64,
        wallet_address: String,
        amount: f64,
    ) -> Result<StakeResponse> {
        self.record(format!("stake_riff({}, {}, {})", id, wallet_address, amount));
        Ok(StakeResponse {
            riff_id: id as u64,
            wallet_address,
            staked_amount: amount,
            pending_rewards: 0.0,
        })
    }

    async fn unstake_riff(&self, id: i64, wallet_address: String) -> Result<UnstakeResponse> {
        self.record(format!("unstake_riff({}, {})", id, wallet_address));
        Ok(UnstakeResponse {
            riff_id: id as u64,
            wallet_address,
            unstaked_amount: 0.0,
            pending_rewards: 0.0,
        })
    }

    async fn get_staking_rewards(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<StakingRewardsResponse> {
        self.record(format!("get_staking_rewards({}, {})", id, wallet_address));
        Ok(StakingRewardsResponse {
            riff_id: id as u64,
            wallet_address,
            staked_amount: 0.0,
            pending_rewards: 0.0,
            total_claimed: 0.0,
            staking_royalty_share: 50,
            annual_reward_rate: 0.12,
        })
    }

    async fn claim_rewards(&self, id: i64, wallet_address: String) -> Result<ClaimResponse> {
        self.record(format!("claim_rewards({}, {})", id, wallet_address));
        Ok(ClaimResponse {
            riff_id: id as u64,
            wallet_address,
            claimed: 0.5,
            total_claimed: 0.5,
        })
    }

    async fn add_to_favorites(&self, id: i64, wallet_address: String) -> Result<FavoriteResponse> {
        self.record(format!("add_to_favorites({}, {})", id, wallet_address));
        Ok(FavoriteResponse {
            riff_id: id as u64,
            wallet_address,
            is_favorite: true,
            favorites_count: 1,
        })
    }

    async fn remove_from_favorites(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<FavoriteResponse> {
        self.record(format!("remove_from_favorites({}, {})", id, wallet_address));
        Ok(FavoriteResponse {
            riff_id: id as u64,
            wallet_address,
            is_favorite: false,
            favorites_count: 0,
        })
    }

    async fn get_latest_riff(&self) -> Result<RiffResponse> {
        self.record("get_latest_riff".to_string());
        Ok(sample_riff(2))
    }

    async fn get_random_riff(&self) -> Result<RiffResponse> {
        self.record("get_random_riff".to_string());
        Ok(sample_riff(3))
    }
}

fn upload_config() -> UploadConfig {
    UploadConfig {
        max_audio_size: 1024,
        max_cover_size: 1024,
        allowed_audio_types: vec!["audio/x-wav".to_string()],
        allowed_image_types: vec!["image/png".to_string()],
    }
}

fn router() -> (Router, Arc<RecordingController>) {
    let controller = Arc::new(RecordingController::default());
    let api = RiffApi::new(controller.clone(), upload_config());
    (riff_routes(api), controller)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

const BOUNDARY: &str = "riff-test-boundary";

type FormPart = (String, Option<String>, Vec<u8>);

fn text(name: &str, value: &str) -> FormPart {
    (name.to_string(), None, value.as_bytes().to_vec())
}

fn file(name: &str, file_name: &str, data: &[u8]) -> FormPart {
    (name.to_string(), Some(file_name.to_string()), data.to_vec())
}

/// Build a multipart upload request
fn multipart(parts: Vec<FormPart>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn error_fields(json: &Value) -> Vec<String> {
    json["errors"]
        .as_array()
        .expect("errors array")
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_valid_requests_reach_controller_once() {
    let cases: Vec<(Request<Body>, &str)> = vec![
        (
            get("/?genre=rock&limit=10&offset=5&stakable=true"),
            "get_all_riffs(genre=Some(\"rock\"), limit=Some(10), offset=Some(5), stakable=Some(true))",
        ),
        (get("/riff/7"), "get_riff_by_id(7)"),
        (get("/activity/7"), "get_riff_activity(7)"),
        (
            post_json("/riff/7/mint", serde_json::json!({"walletAddress": "0xabc"})),
            "mint_riff(7, 0xabc)",
        ),
        (
            post_json("/stake/riff/7/0xabc", serde_json::json!({"amount": 2.5})),
            "stake_riff(7, 0xabc, 2.5)",
        ),
        (post_empty("/unstake/riff/7/0xabc"), "unstake_riff(7, 0xabc)"),
        (get("/rewards/7/0xabc"), "get_staking_rewards(7, 0xabc)"),
        (post_empty("/rewards-claim/riff/7/0xabc"), "claim_rewards(7, 0xabc)"),
        (post_empty("/favorite/add/riff/7/0xabc"), "add_to_favorites(7, 0xabc)"),
        (
            post_empty("/favorite/remove/riff/7/0xabc"),
            "remove_from_favorites(7, 0xabc)",
        ),
        (get("/latest"), "get_latest_riff"),
        (get("/random"), "get_random_riff"),
    ];

    for (request, expected) in cases {
        let (app, controller) = router();
        let uri = request.uri().to_string();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(controller.calls(), vec![expected.to_string()], "{}", uri);
    }
}

#[tokio::test]
async fn test_listing_without_query_uses_defaults() {
    let (app, controller) = router();
    let (status, json) = send(app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(
        controller.calls(),
        vec!["get_all_riffs(genre=None, limit=None, offset=None, stakable=None)"]
    );
}

#[tokio::test]
async fn test_invalid_requests_never_reach_controller() {
    let cases: Vec<(Request<Body>, Vec<&str>)> = vec![
        (get("/?limit=101"), vec!["limit"]),
        (get("/?limit=0"), vec!["limit"]),
        (get("/?offset=-1"), vec!["offset"]),
        (get("/?limit=ten&stakable=maybe"), vec!["limit", "stakable"]),
        (get("/?priceMin=cheap"), vec!["priceMin"]),
        (get("/riff/abc"), vec!["id"]),
        (get("/activity/1.5"), vec!["id"]),
        (post_empty("/riff/7/mint"), vec!["walletAddress"]),
        (
            post_json("/riff/x/mint", serde_json::json!({"walletAddress": ""})),
            vec!["id", "walletAddress"],
        ),
        (
            post_json("/stake/riff/7/0xabc", serde_json::json!({"amount": 0})),
            vec!["amount"],
        ),
        (
            post_json("/stake/riff/7/0xabc", serde_json::json!({"amount": "lots"})),
            vec!["amount"],
        ),
        (get("/rewards/seven/0xabc"), vec!["id"]),
        (post_empty("/favorite/add/riff/-x/0xabc"), vec!["id"]),
    ];

    for (request, fields) in cases {
        let (app, controller) = router();
        let uri = request.uri().to_string();
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json["error"], "validation_error", "{}", uri);
        assert_eq!(error_fields(&json), fields, "{}", uri);
        assert!(controller.calls().is_empty(), "{}", uri);
    }
}

#[tokio::test]
async fn test_upload_dispatches_parsed_form() {
    let (app, controller) = router();
    let request = multipart(vec![
        text("title", "Loop"),
        text("walletAddress", "0xabc"),
        text("isStakable", "true"),
        text("royaltyPercentage", "15"),
        file("audio", "loop.wav", b"RIFF0000WAVE"),
    ]);
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], 1);
    assert_eq!(
        controller.calls(),
        vec!["upload_riff(Loop, 0xabc, audio=true, cover=false)"]
    );
}

#[tokio::test]
async fn test_upload_field_errors_are_collected() {
    let (app, controller) = router();
    let request = multipart(vec![
        text("royaltyPercentage", "150"),
        text("stakingRoyaltyShare", "-1"),
        file("audio", "a.wav", b"RIFF0000WAVE"),
        file("audio", "b.wav", b"RIFF1111WAVE"),
    ]);
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_fields(&json),
        vec![
            "audio",
            "royaltyPercentage",
            "stakingRoyaltyShare",
            "title",
            "walletAddress"
        ]
    );
    assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn test_upload_file_over_limit_rejected() {
    let (app, controller) = router();
    let request = multipart(vec![
        text("title", "Loop"),
        text("walletAddress", "0xabc"),
        file("audio", "big.wav", &[0u8; 2048]),
    ]);
    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let (app, _) = router();
    let (status, _) = send(app, get("/riff/7/extra")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (app, controller) = router();
    let (status, _) = send(app, post_empty("/latest")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(controller.calls().is_empty());
}

//! Common test utilities and helpers.

#![allow(dead_code)]

use reqwest::multipart;
use riff_marketplace_server::{
    config::{
        Config, LoggingConfig, MarketplaceConfig, ProcessingConfig, RateLimitConfig, ServerConfig,
        StakingConfig, StorageConfig, UploadConfig,
    },
    create_router, AppState, RateLimiter,
};
use serde_json::Value;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener as TokioTcpListener;

/// Wallet used as the creator in most tests
pub const CREATOR: &str = "0xCreator";

/// Test server instance
pub struct TestServer {
    pub base_url: String,
    pub data_dir: TempDir,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a test server on a random port
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start a test server after adjusting the default test configuration
    pub async fn start_with(customize: impl FnOnce(&mut Config)) -> Self {
        let port = get_available_port();
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = create_test_config(&data_dir, port, &base_url);
        customize(&mut config);

        let rate_limiter = RateLimiter::new(&config.rate_limit);
        let state = AppState::new(config)
            .await
            .expect("Failed to create app state");
        let app = create_router(state, &rate_limiter);

        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        let listener = TokioTcpListener::bind(addr)
            .await
            .expect("Failed to bind listener");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            );
            tokio::select! {
                _ = server => {}
                _ = shutdown_rx => {}
            }
        });

        // Give the server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url,
            data_dir,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get HTTP client
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap()
    }

    /// Get URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a riff and return the created riff JSON
    pub async fn upload(&self, form: multipart::Form) -> Value {
        let response = self
            .client()
            .post(self.url("/api/riffs/upload"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), 201, "upload failed");
        response.json().await.expect("Failed to parse JSON")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Create test configuration
fn create_test_config(data_dir: &TempDir, port: u16, base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            base_url: base_url.to_string(),
            cache_max_age: 3600,
        },
        storage: StorageConfig {
            data_dir: data_dir.path().to_path_buf(),
            audio_dir: "audio".to_string(),
            covers_dir: "covers".to_string(),
            directory_levels: 2,
        },
        upload: UploadConfig {
            max_audio_size: 1024 * 1024,
            max_cover_size: 1024 * 1024,
            allowed_audio_types: vec!["audio/mpeg".to_string(), "audio/x-wav".to_string()],
            allowed_image_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        },
        processing: ProcessingConfig {
            output_format: "png".to_string(),
            output_quality: 80,
            max_image_dimension: 256,
        },
        marketplace: MarketplaceConfig::default(),
        staking: StakingConfig::default(),
        rate_limit: RateLimitConfig {
            enabled: false,
            requests_per_window: 1000,
            window_seconds: 60,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Find an available TCP port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

/// Create a small WAV file; `seed` varies the content hash
pub fn create_test_wav(seed: u8) -> Vec<u8> {
    let samples = [seed; 64];
    let mut data = Vec::new();
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    data.extend_from_slice(b"WAVEfmt ");
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // PCM
    data.extend_from_slice(&1u16.to_le_bytes()); // mono
    data.extend_from_slice(&8000u32.to_le_bytes());
    data.extend_from_slice(&8000u32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&8u16.to_le_bytes());
    data.extend_from_slice(b"data");
    data.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    data.extend_from_slice(&samples);
    data
}

/// Create a test PNG image
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    use image::codecs::png::PngEncoder;
    use image::{ImageBuffer, ImageEncoder, Rgb};

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255) / width) as u8,
            ((y * 255) / height) as u8,
            128,
        ])
    });

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .expect("Failed to encode PNG");

    buffer
}

/// Multipart part holding a WAV file
pub fn audio_part(seed: u8) -> multipart::Part {
    multipart::Part::bytes(create_test_wav(seed))
        .file_name("riff.wav")
        .mime_str("audio/wav")
        .unwrap()
}

/// Multipart part holding a PNG cover
pub fn cover_part(width: u32, height: u32) -> multipart::Part {
    multipart::Part::bytes(create_test_png(width, height))
        .file_name("cover.png")
        .mime_str("image/png")
        .unwrap()
}

/// Minimal valid upload form: audio, title and creator wallet
pub fn riff_form(title: &str, seed: u8) -> multipart::Form {
    multipart::Form::new()
        .part("audio", audio_part(seed))
        .text("title", title.to_string())
        .text("walletAddress", CREATOR)
}

use anyhow::Result;
use async_trait::async_trait;
use gapi_helper::{Endpoints, GapiConfig, GapiResult, RetryPolicy, TokenProvider};
use httpmock::MockServer;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tempfile::TempDir;

/// Identity reported by [`MockTokenProvider`].
pub const TEST_IDENTITY: &str = "robot@gapi-helper-tests.iam.gserviceaccount.com";

/// Bearer token served by [`MockTokenProvider`].
pub const TEST_TOKEN: &str = "test-token";

static INIT: Once = Once::new();

/// Initializes a tracing subscriber once per test binary. Honors `RUST_LOG`.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// --- Test Setup ---

/// A mock Google API server plus a configuration pointing every endpoint at it.
///
/// Cache and backup directories live in a scratch directory removed on drop.
pub struct TestSetup {
    pub server: MockServer,
    pub config: GapiConfig,
    pub tokens: Arc<MockTokenProvider>,
    pub temp_dir: TempDir,
}

impl TestSetup {
    pub fn new() -> Result<Self> {
        setup_tracing();
        let server = MockServer::start();
        let temp_dir = tempfile::tempdir()?;

        let cache_dir = temp_dir.path().join("cache");
        let backup_dir = temp_dir.path().join("backups");
        std::fs::create_dir_all(&cache_dir)?;
        std::fs::create_dir_all(&backup_dir)?;

        let mut config = GapiConfig::new(temp_dir.path().join("unused-credentials.json"));
        config.endpoints = Endpoints::with_base(&server.base_url());
        config.retry = RetryPolicy::none();
        config.sheets.cache_dir = Some(cache_dir);
        config.sheets.backup_dir = Some(backup_dir);

        Ok(Self {
            server,
            config,
            tokens: Arc::new(MockTokenProvider::new()),
            temp_dir,
        })
    }

    /// The token provider as a trait object, ready for `with_token_provider` constructors.
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        self.tokens.clone()
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }
}

// --- Mock Token Provider ---

/// Serves [`TEST_TOKEN`] and counts how often tokens are requested and reset.
#[derive(Debug, Default)]
pub struct MockTokenProvider {
    requests: AtomicUsize,
    resets: AtomicUsize,
}

impl MockTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn access_token(&self) -> GapiResult<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(TEST_TOKEN.to_string())
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn identity(&self) -> Option<&str> {
        Some(TEST_IDENTITY)
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use product_api::app::AppState;
use product_api::auth::JwtAuthenticator;
use product_api::config::AppConfig;
use product_api::database::MemoryProductStore;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub auth: Arc<JwtAuthenticator>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// In-process server on a free port backed by the in-memory store
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(&[]).await
    }

    pub async fn spawn_with(extra: &[(&str, &str)]) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("JWT_SECRET".into(), TEST_SECRET.into());
        vars.insert("PRODUCT_STORE".into(), "memory".into());
        vars.insert("HOST".into(), "127.0.0.1".into());
        vars.insert("PORT".into(), port.to_string());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = AppConfig::from_map(&vars)?;

        let auth = Arc::new(JwtAuthenticator::new(&config.security)?);
        let state = AppState::new(
            Arc::new(MemoryProductStore::new()),
            auth.clone(),
            config.security.enforce_ownership,
        );

        let listener = TcpListener::bind(config.bind_addr()).await?;
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            if let Err(e) = product_api::server::serve(listener, state, &config, shutdown).await {
                eprintln!("test server exited: {e:?}");
            }
        });

        let server = Self {
            port,
            base_url,
            auth,
            shutdown: Some(tx),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token_for(&self, user_id: i64) -> String {
        self.auth.issue(user_id).expect("issue test token")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

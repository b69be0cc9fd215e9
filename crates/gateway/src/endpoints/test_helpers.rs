//! エンドポイントテスト用のエンジン・状態・サーバー起動ヘルパー。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EnvelopeMode, GatewayConfig, GatewayState};
use crate::engine::{Artifact, EngineOutput, SourceDocument, TranslationEngine};
use crate::error::GatewayError;
use crate::storage::LocalSignedStorage;

/// 呼び出し回数を数え、固定の出力を返すエンジン。
pub(crate) struct CountingEngine {
    pub calls: Arc<AtomicUsize>,
    output: EngineOutput,
}

impl CountingEngine {
    pub fn new(output: EngineOutput) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            output,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(EngineOutput {
            translated_text: Some(text.to_string()),
            artifact: None,
        })
    }

    pub fn artifact(bytes: &[u8], content_type: &str, extension: &str) -> Self {
        Self::new(EngineOutput {
            translated_text: None,
            artifact: Some(Artifact {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                extension: extension.to_string(),
            }),
        })
    }
}

#[async_trait::async_trait]
impl TranslationEngine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    async fn translate(&self, _document: SourceDocument) -> Result<EngineOutput, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// 常に失敗するエンジン。
pub(crate) struct FailingEngine(pub String);

#[async_trait::async_trait]
impl TranslationEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn translate(&self, _document: SourceDocument) -> Result<EngineOutput, GatewayError> {
        Err(GatewayError::Engine(self.0.clone()))
    }
}

/// ベースURLとエンベロープ形式を指定して状態を組み立てる。
pub(crate) fn state_at(
    base_url: &str,
    engine: impl TranslationEngine + 'static,
    envelope: EnvelopeMode,
) -> (Arc<GatewayState>, Arc<LocalSignedStorage>) {
    let storage = Arc::new(
        LocalSignedStorage::new(base_url, b"endpoint-test-secret".to_vec(), 1024 * 1024).unwrap(),
    );
    let config = GatewayConfig {
        envelope,
        ..GatewayConfig::default()
    };
    let state = Arc::new(GatewayState {
        config,
        storage: storage.clone(),
        engine: Box::new(engine),
    });
    (state, storage)
}

/// サーバーを起動しないテスト用の状態。
pub(crate) fn test_state(
    engine: impl TranslationEngine + 'static,
) -> (Arc<GatewayState>, Arc<LocalSignedStorage>) {
    state_at("http://localhost:3000", engine, EnvelopeMode::Direct)
}

/// Gatewayを127.0.0.1の空きポートで起動し、ベースURLと状態を返す。
pub(crate) async fn spawn_gateway_with(
    engine: impl TranslationEngine + 'static,
    envelope: EnvelopeMode,
) -> (String, Arc<GatewayState>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (state, storage) = state_at(&base, engine, envelope);
    let app = crate::build_router(state.clone(), Some(storage));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (base, state)
}

pub(crate) async fn spawn_gateway(
    engine: impl TranslationEngine + 'static,
) -> (String, Arc<GatewayState>) {
    spawn_gateway_with(engine, EnvelopeMode::Direct).await
}

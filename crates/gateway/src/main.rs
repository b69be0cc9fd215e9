//! # 翻訳ゲートウェイ サーバー
//!
//! 設定は起動時に環境変数から一度だけ読み込む。
//! ストレージ（`STORAGE_BACKEND`）と翻訳エンジン（`ENGINE_MODE`）は
//! ここで選択し、トレイトオブジェクトとして共有状態に載せる。

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use translate_gateway::build_router;
use translate_gateway::config::{EngineMode, GatewayConfig, GatewayState, StorageBackendKind};
use translate_gateway::engine::{HttpTranslationEngine, MockTranslationEngine, TranslationEngine};
use translate_gateway::storage::{LocalSignedStorage, ObjectStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;

    // ストレージ
    let mut local_storage = None;
    let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
        StorageBackendKind::Local => {
            let local = Arc::new(LocalSignedStorage::from_env()?);
            local_storage = Some(local.clone());
            local
        }
        #[cfg(feature = "vendor-aws")]
        StorageBackendKind::S3 => Arc::new(translate_gateway::storage::S3ObjectStorage::from_env()?),
        #[cfg(not(feature = "vendor-aws"))]
        StorageBackendKind::S3 => {
            anyhow::bail!("STORAGE_BACKEND=s3 には vendor-aws feature が必要です")
        }
    };

    // 翻訳エンジン
    let engine: Box<dyn TranslationEngine> = match config.engine_mode {
        EngineMode::Http => Box::new(HttpTranslationEngine::from_env()?),
        EngineMode::Mock => {
            tracing::warn!("ENGINE_MODE=mock: モック翻訳エンジンを使用します（開発環境用）");
            Box::new(MockTranslationEngine::new())
        }
    };

    tracing::info!(
        storage_backend = ?config.storage_backend,
        engine = engine.name(),
        envelope = ?config.envelope,
        source_language = %config.source_language,
        target_language = %config.target_language,
        "Gateway設定を読み込みました"
    );

    let addr = config.listen_addr.clone();
    let state = Arc::new(GatewayState {
        config,
        storage,
        engine,
    });
    let app = build_router(state, local_storage);

    tracing::info!("Gatewayを {} で起動します", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

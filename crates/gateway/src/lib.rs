//! # 翻訳ゲートウェイ
//!
//! 文書翻訳の3ステップ（アップロード許可 → 翻訳ディスパッチ → ダウンロード許可）
//! を提供するHTTPサーバー。各ステップは独立しており、共有状態は
//! オブジェクトストレージのキー名前空間のみ。
//!
//! ## API エンドポイント
//! - `POST /upload-url` — 書き込み用署名付きURL発行
//! - `POST /translate` — 翻訳ディスパッチ（`?mode=upload|process|download`）
//! - `GET /download-url` — 読み取り用署名付きURL発行
//! - `GET /healthz` — 死活監視
//! - `PUT|GET /storage/{*key}` — 内蔵ストレージ（`STORAGE_BACKEND=local` のみ）

pub mod config;
pub mod endpoints;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod storage;

use std::sync::Arc;

use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{EnvelopeMode, GatewayState};
use crate::endpoints::{handle_download_url, handle_translate, handle_upload_url};
use crate::storage::LocalSignedStorage;

/// Gatewayのルーターを構築する。
///
/// `local_storage` を渡すと内蔵ストレージのPUT/GETルートも公開する。
/// エンベロープはAPIルートにのみ適用し、ストレージのバイト列は包まない。
pub fn build_router(
    state: Arc<GatewayState>,
    local_storage: Option<Arc<LocalSignedStorage>>,
) -> axum::Router {
    let envelope_mode = state.config.envelope;

    let mut api = axum::Router::new()
        .route("/upload-url", post(handle_upload_url))
        .route("/translate", post(handle_translate))
        .route("/download-url", get(handle_download_url))
        .with_state(state);
    if envelope_mode == EnvelopeMode::Wrapped {
        api = api.layer(axum::middleware::map_response(envelope::wrap_response));
    }

    let mut app = api.route("/healthz", get(|| async { "ok" }));
    if let Some(local_storage) = local_storage {
        app = app.merge(local_storage.router());
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

//! # GET /download-url
//!
//! result名前空間のキーに限り、読み取り用署名付きURLを発行する。
//! システム内で唯一の認可チェック。incoming名前空間を含む他のキーは
//! 一律 `AccessDenied` とし、境界の規則はクライアントに明かさない。

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use translate_types::{DownloadGrant, DownloadGrantQuery, StorageKey};

use super::required;
use crate::config::GatewayState;
use crate::error::GatewayError;

/// ダウンロード許可を発行する。オブジェクトの存在は確認しない。
pub async fn issue_download_grant(
    state: &GatewayState,
    object_key: Option<String>,
) -> Result<DownloadGrant, GatewayError> {
    let object_key = StorageKey::new(required(object_key, "objectKey")?);

    if !state.config.namespaces.is_result(&object_key) {
        return Err(GatewayError::AccessDenied(format!(
            "download requested outside result namespace: {object_key}"
        )));
    }

    let presigned = state
        .storage
        .presign_get(&object_key, state.config.download_expiry_secs)
        .await?;

    tracing::info!(
        object_key = %object_key,
        expires_at = presigned.expires_at,
        "ダウンロード許可を発行"
    );

    Ok(DownloadGrant {
        download_url: presigned.url,
        object_key: object_key.into_string(),
        expires_at: Some(presigned.expires_at),
    })
}

/// GET /download-url?objectKey=...
pub async fn handle_download_url(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<DownloadGrantQuery>, QueryRejection>,
) -> Result<Json<DownloadGrant>, GatewayError> {
    let Query(query) = query?;
    issue_download_grant(&state, query.object_key).await.map(Json)
}

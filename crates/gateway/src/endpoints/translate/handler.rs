//! `/translate` ハンドラ。
//!
//! ルーティング層の都合で1つのルートしか公開できない場合に備え、
//! `?mode=` で3ステップすべてを受け付ける。
//!
//! | mode | ボディ | 処理 |
//! |---|---|---|
//! | `upload` | `{fileName, contentType}` | アップロード許可 |
//! | `process`（省略時） | `{objectKey}` | 翻訳ディスパッチ |
//! | `download` | `{objectKey}` | ダウンロード許可 |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use translate_types::{TranslationRequest, UploadGrantRequest};

use super::dispatch::dispatch_translation;
use crate::config::GatewayState;
use crate::endpoints::download_url::issue_download_grant;
use crate::endpoints::upload_url::issue_upload_grant;
use crate::error::GatewayError;

/// `/translate` が受け付けるモード。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslateMode {
    Upload,
    #[default]
    Process,
    Download,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModeQuery {
    #[serde(default)]
    pub mode: Option<TranslateMode>,
}

/// ボディをJSONオブジェクトとして読む。空ボディは `{}` と同じ扱い。
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        GatewayError::InvalidRequest(format!("request body must be a JSON object: {e}"))
    })
}

/// POST /translate[?mode=upload|process|download]
pub async fn handle_translate(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<ModeQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let Query(query) = query?;
    let mode = query.mode.unwrap_or_default();

    let response = match mode {
        TranslateMode::Upload => {
            let request: UploadGrantRequest = parse_body(&body)?;
            Json(issue_upload_grant(&state, request).await?).into_response()
        }
        TranslateMode::Process => {
            let request: TranslationRequest = parse_body(&body)?;
            Json(dispatch_translation(&state, request.object_key).await?).into_response()
        }
        TranslateMode::Download => {
            let request: TranslationRequest = parse_body(&body)?;
            Json(issue_download_grant(&state, request.object_key).await?).into_response()
        }
    };
    Ok(response)
}

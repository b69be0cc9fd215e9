//! # ルーティング層エミュレーション
//!
//! `RESPONSE_ENVELOPE=wrapped` のとき、APIレスポンスを
//! `{"statusCode", "headers", "body": "<json>"}` に包み直し、
//! HTTPステータスは常に200で返す。クライアントの正規化処理を
//! 実環境と同じ形で検証するためのもの。

use axum::body::to_bytes;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use translate_types::envelope;

use crate::error::GatewayError;

/// 包み直すレスポンスボディの上限（バイト）
const MAX_WRAPPED_BODY_BYTES: usize = 10 * 1024 * 1024;

/// `axum::middleware::map_response` 用。
///
/// ボディを読めなかった場合も、内側ステータス500のエラーボディを包んで返す。
pub async fn wrap_response(response: Response) -> Response {
    let (parts, body) = response.into_parts();

    let (status, payload) = match to_bytes(body, MAX_WRAPPED_BODY_BYTES).await {
        Ok(bytes) if bytes.is_empty() => (parts.status.as_u16(), Value::Null),
        Ok(bytes) => (
            parts.status.as_u16(),
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        ),
        Err(e) => {
            let error = GatewayError::Internal(format!("レスポンスボディの読み込みに失敗: {e}"));
            tracing::error!(error = %error, "レスポンスを包み直せません");
            let body = serde_json::to_value(error.response_body()).unwrap_or(Value::Null);
            (error.status().as_u16(), body)
        }
    };

    let mut wrapped = Json(envelope::wrap(status, &payload)).into_response();
    // 下位レイヤが付けたヘッダ（Content-Type以外）は複数値も含めて引き継ぐ
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            wrapped.headers_mut().append(name.clone(), value.clone());
        }
    }
    wrapped.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    wrapped
}

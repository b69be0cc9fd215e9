//! # Gateway エラー型
//!
//! 全エンドポイント共通のエラー型。ハンドラ境界で必ずこの型に変換し、
//! ステータスコードとJSONボディ（`{"message": ...}`）を伴って返す。
//!
//! 内部要因（ストレージ・署名・エンジン）の詳細はサーバーログにのみ出し、
//! クライアントには汎用メッセージを返す。

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::Json;
use translate_types::ErrorResponse;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 入力の欠落・不正（メッセージは欠落フィールド名を含む）
    #[error("{0}")]
    InvalidRequest(String),
    /// 名前空間外のキーへのアクセス。中身はログ用で、クライアントには返さない。
    #[error("Access denied")]
    AccessDenied(String),
    /// 参照されたオブジェクトが存在しない
    #[error("Object not found: {0}")]
    NotFound(String),
    /// 翻訳エンジンの呼び出し失敗・契約違反
    #[error("翻訳エンジンの呼び出しに失敗: {0}")]
    Engine(String),
    /// ストレージ操作・URL署名の失敗
    #[error("ストレージ操作に失敗: {0}")]
    Storage(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl GatewayError {
    /// エラー種別に対応するHTTPステータス。
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::AccessDenied(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Engine(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Storage(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// クライアントに返すボディ。
    pub fn response_body(&self) -> ErrorResponse {
        match self {
            GatewayError::InvalidRequest(message) => ErrorResponse {
                message: message.clone(),
                error: None,
            },
            GatewayError::AccessDenied(_) | GatewayError::NotFound(_) => ErrorResponse {
                message: self.to_string(),
                error: None,
            },
            GatewayError::Engine(detail) => ErrorResponse {
                message: "Translation failed".to_string(),
                error: Some(detail.clone()),
            },
            GatewayError::Storage(_) | GatewayError::Internal(_) => ErrorResponse {
                message: "Internal server error".to_string(),
                error: None,
            },
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            GatewayError::AccessDenied(reason) => {
                tracing::warn!(reason = %reason, "名前空間外へのアクセスを拒否");
            }
            GatewayError::Engine(_) | GatewayError::Storage(_) | GatewayError::Internal(_) => {
                tracing::error!(error = %self, "リクエスト処理に失敗");
            }
            GatewayError::InvalidRequest(_) | GatewayError::NotFound(_) => {
                tracing::debug!(error = %self, "リクエストを拒否");
            }
        }
        (self.status(), Json(self.response_body())).into_response()
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::InvalidRequest(format!(
            "request body must be a JSON object: {}",
            rejection.body_text()
        ))
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::InvalidRequest(format!(
            "invalid query string: {}",
            rejection.body_text()
        ))
    }
}

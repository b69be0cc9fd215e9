//! # Gatewayエンドポイント
//!
//! - `POST /upload-url` — 書き込み用署名付きURL発行
//! - `POST /translate` — 翻訳ディスパッチ（`?mode=` で3ステップを多重化可能）
//! - `GET /download-url` — 読み取り用署名付きURL発行（result名前空間のみ）

pub mod download_url;
pub mod translate;
pub mod upload_url;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use download_url::handle_download_url;
pub use translate::handle_translate;
pub use upload_url::handle_upload_url;

use crate::error::GatewayError;

/// 必須フィールドを取り出す。欠落・空白のみは `InvalidRequest`。
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, GatewayError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest(format!("{field} is required")))
}

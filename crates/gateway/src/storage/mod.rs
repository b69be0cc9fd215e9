//! # オブジェクトストレージ
//!
//! Gatewayとクライアント・翻訳ディスパッチが共有する唯一の状態。
//! 署名付きURLの発行とオブジェクトの読み書きをトレイトで抽象化する。
//!
//! - `s3` — S3互換ストレージ実装（`vendor-aws` feature）
//! - `local` — Gateway内蔵のHMAC署名付きストレージ（開発・テスト用）

pub mod local;
#[cfg(feature = "vendor-aws")]
pub mod s3;

pub use local::LocalSignedStorage;
#[cfg(feature = "vendor-aws")]
pub use s3::S3ObjectStorage;

use std::time::{SystemTime, UNIX_EPOCH};

use translate_types::StorageKey;

use crate::error::GatewayError;

/// ストレージから読み出したオブジェクト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// オブジェクト本体
    pub bytes: Vec<u8>,
    /// 保存時のContent-Type（取得できた場合）
    pub content_type: Option<String>,
}

/// 署名付きURLと、その署名に含めた有効期限。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// 署名付きURL
    pub url: String,
    /// 有効期限（UNIXタイムスタンプ）。署名された期限より後にはならない。
    pub expires_at: u64,
}

/// オブジェクトストレージの抽象インターフェース。
///
/// 署名付きURLは発行しただけではオブジェクトを作らない。
/// PUT用URLは `content_type` を署名に含み、実際のPUTで異なる
/// `Content-Type` が送られた場合はストレージ側が拒否する。
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 書き込み用署名付きURL（PUT）を生成する。
    async fn presign_put(
        &self,
        key: &StorageKey,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError>;

    /// 読み取り用署名付きURL（GET）を生成する。
    async fn presign_get(
        &self,
        key: &StorageKey,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError>;

    /// オブジェクトを取得する。存在しなければ `GatewayError::NotFound`。
    async fn get_object(&self, key: &StorageKey) -> Result<StoredObject, GatewayError>;

    /// オブジェクトを保存する。
    async fn put_object(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GatewayError>;
}

/// `expiry_secs` 秒後のUNIXタイムスタンプ。
pub(crate) fn expiry_from_now(expiry_secs: u32) -> Result<u64, GatewayError> {
    Ok(unix_now()? + u64::from(expiry_secs))
}

/// 現在時刻のUNIXタイムスタンプ（秒）。
pub fn unix_now() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| GatewayError::Internal(format!("時刻取得失敗: {e}")))
}

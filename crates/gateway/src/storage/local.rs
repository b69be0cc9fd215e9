//! # Gateway内蔵 署名付きストレージ
//!
//! S3を用意できない開発環境・テスト用のオブジェクトストレージ。
//! オブジェクトはメモリ内に保持し、`/storage/{*key}` でPUT/GETを受け付ける。
//! 本番では使わないこと。
//!
//! ## 容量
//! オブジェクトは削除されず、期限切れのアップロードも残り続ける。
//! メモリを食い尽くさないよう、保持する合計バイト数に上限
//! （`LOCAL_STORAGE_MAX_TOTAL_BYTES`）を設け、超える書き込みは
//! `507 Insufficient Storage` で拒否する。同じキーへの上書きは
//! 古いオブジェクトの分を差し引いて数える。
//!
//! ## 署名
//! `HMAC-SHA256(secret, canonical)` を16進で `signature` クエリに載せる。
//! canonical は method・key・Content-Type（GETは空）・expires を
//! 長さ付きで連結したもの。以下のリクエストは403で拒否する。
//! - `expires` を過ぎたもの
//! - 署名が一致しないもの（キー・メソッドの差し替えを含む）
//! - PUTで署名時と異なる `Content-Type` を送ったもの

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;
use translate_types::StorageKey;

use super::{expiry_from_now, unix_now, ObjectStorage, PresignedUrl, StoredObject};
use crate::config::{env_or, env_parse};
use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

/// ストレージ用ルートの先頭セグメント
pub const ROUTE_PREFIX: &str = "storage";
/// PUTで受け付ける既定の最大サイズ（バイト）
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 50 * 1024 * 1024;
/// 保持する合計サイズの既定の上限（バイト）
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 512 * 1024 * 1024;

/// 署名付きURLのクエリ。
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    /// 有効期限（UNIXタイムスタンプ）
    pub expires: Option<u64>,
    /// 16進エンコードされたHMAC
    pub signature: Option<String>,
}

/// Gateway内蔵の署名付きストレージ。
pub struct LocalSignedStorage {
    /// 署名付きURLのベース（クライアントから到達できるGatewayのURL）
    public_base_url: reqwest::Url,
    /// HMAC鍵
    secret: Vec<u8>,
    /// PUTで受け付ける最大サイズ
    max_object_bytes: usize,
    /// 保持する合計サイズの上限
    max_total_bytes: usize,
    /// 保存済みオブジェクト
    objects: RwLock<ObjectTable>,
}

/// 保存済みオブジェクトと、その合計サイズ。
#[derive(Default)]
struct ObjectTable {
    entries: HashMap<StorageKey, StoredObject>,
    total_bytes: usize,
}

/// 合計サイズの上限を超える書き込み。
#[derive(Debug)]
struct CapacityExceeded;

impl LocalSignedStorage {
    pub fn new(
        public_base_url: &str,
        secret: Vec<u8>,
        max_object_bytes: usize,
    ) -> anyhow::Result<Self> {
        let public_base_url = reqwest::Url::parse(public_base_url)?;
        if public_base_url.cannot_be_a_base() {
            anyhow::bail!("LOCAL_STORAGE_PUBLIC_URLはベースURLとして使えません: {public_base_url}");
        }
        if secret.is_empty() {
            anyhow::bail!("署名鍵が空です");
        }
        Ok(Self {
            public_base_url,
            secret,
            max_object_bytes,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            objects: RwLock::new(ObjectTable::default()),
        })
    }

    /// 保持する合計サイズの上限を変更する。
    pub fn with_max_total_bytes(mut self, max_total_bytes: usize) -> Self {
        self.max_total_bytes = max_total_bytes;
        self
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let public_base_url = env_or("LOCAL_STORAGE_PUBLIC_URL", "http://localhost:3000");
        let max_object_bytes = env_parse("LOCAL_STORAGE_MAX_BYTES", DEFAULT_MAX_OBJECT_BYTES)?;
        let max_total_bytes = env_parse("LOCAL_STORAGE_MAX_TOTAL_BYTES", DEFAULT_MAX_TOTAL_BYTES)?;

        let secret = match std::env::var("LOCAL_STORAGE_SECRET") {
            Ok(key_hex) => hex::decode(key_hex.trim())
                .map_err(|e| anyhow::anyhow!("LOCAL_STORAGE_SECRETは16進数である必要があります: {e}"))?,
            Err(_) => {
                // 開発環境用: 再起動すると発行済みURLは無効になる
                tracing::warn!("LOCAL_STORAGE_SECRETが未設定です。ランダム鍵を生成します（開発環境用）");
                let mut key = vec![0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut key);
                key
            }
        };

        tracing::info!(
            public_base_url = %public_base_url,
            max_total_bytes,
            "内蔵ストレージを初期化（開発・テスト用）"
        );
        Ok(Self::new(&public_base_url, secret, max_object_bytes)?.with_max_total_bytes(max_total_bytes))
    }

    /// `/storage/{*key}` のPUT/GETを受け付けるルーター。
    pub fn router(self: Arc<Self>) -> axum::Router {
        let limit = self.max_object_bytes;
        axum::Router::new()
            .route(
                &format!("/{ROUTE_PREFIX}/{{*key}}"),
                get(handle_get).put(handle_put),
            )
            .layer(DefaultBodyLimit::max(limit))
            .with_state(self)
    }

    fn mac(&self) -> Result<HmacSha256, GatewayError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| GatewayError::Internal(format!("HMAC初期化失敗: {e}")))
    }

    fn canonical(method: &str, key: &str, content_type: &str, expires: u64) -> String {
        let expires = expires.to_string();
        [method, key, content_type, expires.as_str()]
            .iter()
            .map(|field| format!("{}:{}", field.len(), field))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn sign(
        &self,
        method: &str,
        key: &str,
        content_type: &str,
        expires: u64,
    ) -> Result<String, GatewayError> {
        let mut mac = self.mac()?;
        mac.update(Self::canonical(method, key, content_type, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 指定時刻まで有効な署名付きURLを組み立てる。
    pub(crate) fn signed_url(
        &self,
        method: &str,
        key: &StorageKey,
        content_type: &str,
        expires: u64,
    ) -> Result<String, GatewayError> {
        let signature = self.sign(method, key.as_str(), content_type, expires)?;

        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Internal("ベースURLにパスを付与できません".to_string()))?
            .pop_if_empty()
            .push(ROUTE_PREFIX)
            .extend(key.as_str().split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url.to_string())
    }

    /// 署名・有効期限を検証する。
    fn verify(
        &self,
        method: &str,
        key: &str,
        content_type: &str,
        query: &SignedQuery,
    ) -> Result<(), (StatusCode, String)> {
        let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
            return Err((StatusCode::FORBIDDEN, "missing signature".to_string()));
        };

        let now = unix_now().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        if now > expires {
            return Err((StatusCode::FORBIDDEN, "request has expired".to_string()));
        }

        let signature = hex::decode(signature)
            .map_err(|_| (StatusCode::FORBIDDEN, "malformed signature".to_string()))?;
        let mut mac = self
            .mac()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        mac.update(Self::canonical(method, key, content_type, expires).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| (StatusCode::FORBIDDEN, "signature does not match".to_string()))
    }

    /// 合計サイズの上限内であれば保存する。
    async fn store(&self, key: &StorageKey, object: StoredObject) -> Result<(), CapacityExceeded> {
        let mut table = self.objects.write().await;
        let replaced = table.entries.get(key).map_or(0, |old| old.bytes.len());
        let total = table.total_bytes - replaced + object.bytes.len();
        if total > self.max_total_bytes {
            return Err(CapacityExceeded);
        }
        table.total_bytes = total;
        table.entries.insert(key.clone(), object);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalSignedStorage {
    async fn presign_put(
        &self,
        key: &StorageKey,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError> {
        let expires_at = expiry_from_now(expiry_secs)?;
        let url = self.signed_url("PUT", key, content_type, expires_at)?;
        Ok(PresignedUrl { url, expires_at })
    }

    async fn presign_get(
        &self,
        key: &StorageKey,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError> {
        let expires_at = expiry_from_now(expiry_secs)?;
        let url = self.signed_url("GET", key, "", expires_at)?;
        Ok(PresignedUrl { url, expires_at })
    }

    async fn get_object(&self, key: &StorageKey) -> Result<StoredObject, GatewayError> {
        self.objects
            .read()
            .await
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GatewayError> {
        let object = StoredObject {
            bytes,
            content_type: Some(content_type.to_string()),
        };
        self.store(key, object)
            .await
            .map_err(|CapacityExceeded| GatewayError::Storage(format!("容量上限を超えるため保存できません: {key}")))
    }
}

/// PUT /storage/{*key} — 署名付きURLによる直接アップロード。
async fn handle_put(
    State(storage): State<Arc<LocalSignedStorage>>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if let Err((status, reason)) = storage.verify("PUT", &key, &content_type, &query) {
        tracing::warn!(object_key = %key, reason = %reason, "署名付きPUTを拒否");
        return (status, reason).into_response();
    }

    let key = StorageKey::new(key);
    let size = body.len();
    let object = StoredObject {
        bytes: body.to_vec(),
        content_type: Some(content_type),
    };
    if storage.store(&key, object).await.is_err() {
        tracing::warn!(object_key = %key, bytes = size, "容量上限のためPUTを拒否");
        return (StatusCode::INSUFFICIENT_STORAGE, "storage capacity exceeded").into_response();
    }

    tracing::info!(object_key = %key, bytes = size, "オブジェクトを保存");
    StatusCode::OK.into_response()
}

/// GET /storage/{*key} — 署名付きURLによる直接ダウンロード。
async fn handle_get(
    State(storage): State<Arc<LocalSignedStorage>>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Response {
    if let Err((status, reason)) = storage.verify("GET", &key, "", &query) {
        tracing::warn!(object_key = %key, reason = %reason, "署名付きGETを拒否");
        return (status, reason).into_response();
    }

    match storage.get_object(&StorageKey::new(key)).await {
        Ok(object) => {
            let content_type = object
                .content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            ([(header::CONTENT_TYPE, content_type)], object.bytes).into_response()
        }
        Err(e) => e.into_response(),
    }
}

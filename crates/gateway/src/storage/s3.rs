//! # S3互換ストレージ実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを使用するストレージ実装。
//! 署名付きURLはクライアント向けエンドポイント（設定されていれば）で生成し、
//! 翻訳ディスパッチのオブジェクト読み書きは内部エンドポイントで行う。
//!
//! rust-s3 0.35 の `presign_put` は `http` 0.2 の `HeaderMap` を受け取るため、
//! このモジュールのヘッダー型は `http` 0.2 から取る。

use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use s3::error::S3Error;
use translate_types::StorageKey;

use super::{expiry_from_now, ObjectStorage, PresignedUrl, StoredObject};
use crate::config::env_or;
use crate::error::GatewayError;

/// 既定のバケット名
const DEFAULT_BUCKET: &str = "translate-tool-upload-bucket";
/// 既定のリージョン
const DEFAULT_REGION: &str = "ap-northeast-1";

/// S3互換ストレージ実装。
pub struct S3ObjectStorage {
    /// 内部通信用バケット（オブジェクトの取得・保存）
    bucket_internal: s3::Bucket,
    /// クライアント向けバケット（署名付きURL生成用）。
    /// Noneの場合はbucket_internalを使用する。
    bucket_public: Option<s3::Bucket>,
}

impl S3ObjectStorage {
    pub fn new(bucket_internal: s3::Bucket, bucket_public: Option<s3::Bucket>) -> Self {
        Self {
            bucket_internal,
            bucket_public,
        }
    }

    /// カスタムエンドポイント（MinIO等）向けのパススタイルバケットを初期化する。
    fn init_custom_bucket(
        bucket_name: &str,
        region: &str,
        endpoint: &str,
        credentials: &s3::creds::Credentials,
    ) -> anyhow::Result<s3::Bucket> {
        let region = s3::Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };
        let bucket =
            s3::Bucket::new(bucket_name, region, credentials.clone())?.with_path_style();
        Ok(*bucket)
    }

    /// 環境変数から構築する。
    ///
    /// `S3_ACCESS_KEY` / `S3_SECRET_KEY` が未設定の場合はAWSの既定の
    /// 認証情報チェーン（環境変数・プロファイル・インスタンスロール）を使う。
    pub fn from_env() -> anyhow::Result<Self> {
        let bucket_name = std::env::var("S3_BUCKET")
            .or_else(|_| std::env::var("UPLOAD_BUCKET"))
            .unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
        let region_name = std::env::var("S3_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let credentials = match (
            std::env::var("S3_ACCESS_KEY"),
            std::env::var("S3_SECRET_KEY"),
        ) {
            (Ok(access_key), Ok(secret_key)) => s3::creds::Credentials::new(
                Some(&access_key),
                Some(&secret_key),
                None,
                None,
                None,
            )?,
            _ => s3::creds::Credentials::default()?,
        };

        let endpoint = env_or("S3_ENDPOINT", "");
        let bucket_internal = if endpoint.is_empty() {
            let region: s3::Region = region_name
                .parse()
                .map_err(|e| anyhow::anyhow!("リージョン名が不正です: {region_name}: {e}"))?;
            *s3::Bucket::new(&bucket_name, region, credentials.clone())?
        } else {
            Self::init_custom_bucket(&bucket_name, &region_name, &endpoint, &credentials)?
        };

        let bucket_public = std::env::var("S3_PUBLIC_ENDPOINT")
            .ok()
            .map(|public_ep| {
                tracing::info!(
                    s3_public_endpoint = %public_ep,
                    "クライアント向けS3エンドポイントを設定"
                );
                Self::init_custom_bucket(&bucket_name, &region_name, &public_ep, &credentials)
            })
            .transpose()?;

        tracing::info!(bucket = %bucket_name, region = %region_name, "S3ストレージを初期化");
        Ok(Self::new(bucket_internal, bucket_public))
    }

    fn signing_bucket(&self) -> &s3::Bucket {
        self.bucket_public.as_ref().unwrap_or(&self.bucket_internal)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for S3ObjectStorage {
    /// Content-Typeを署名ヘッダに含めたPUT用URLを生成する。
    async fn presign_put(
        &self,
        key: &StorageKey,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError> {
        let content_type = HeaderValue::from_str(content_type).map_err(|e| {
            GatewayError::InvalidRequest(format!("contentType is not a valid header value: {e}"))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type);

        // 署名より前に計算し、報告する期限が署名された期限を超えないようにする
        let expires_at = expiry_from_now(expiry_secs)?;
        let url = self
            .signing_bucket()
            .presign_put(key.as_str(), expiry_secs, Some(headers), None)
            .await
            .map_err(|e| GatewayError::Storage(format!("署名付きアップロードURL生成失敗: {e}")))?;
        Ok(PresignedUrl { url, expires_at })
    }

    async fn presign_get(
        &self,
        key: &StorageKey,
        expiry_secs: u32,
    ) -> Result<PresignedUrl, GatewayError> {
        let expires_at = expiry_from_now(expiry_secs)?;
        let url = self
            .signing_bucket()
            .presign_get(key.as_str(), expiry_secs, None)
            .await
            .map_err(|e| GatewayError::Storage(format!("署名付きダウンロードURL生成失敗: {e}")))?;
        Ok(PresignedUrl { url, expires_at })
    }

    async fn get_object(&self, key: &StorageKey) -> Result<StoredObject, GatewayError> {
        let response = match self.bucket_internal.get_object(key.as_str()).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(GatewayError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(GatewayError::Storage(format!(
                    "オブジェクト取得失敗: {key}: {e}"
                )))
            }
        };

        match response.status_code() {
            404 => Err(GatewayError::NotFound(key.to_string())),
            code if !(200..300).contains(&code) => Err(GatewayError::Storage(format!(
                "オブジェクト取得失敗: {key}: HTTP {code}"
            ))),
            _ => Ok(StoredObject {
                content_type: response.headers().get("content-type").cloned(),
                bytes: response.bytes().to_vec(),
            }),
        }
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .bucket_internal
            .put_object_with_content_type(key.as_str(), &bytes, content_type)
            .await
            .map_err(|e| GatewayError::Storage(format!("オブジェクト保存失敗: {key}: {e}")))?;

        let code = response.status_code();
        if !(200..300).contains(&code) {
            return Err(GatewayError::Storage(format!(
                "オブジェクト保存失敗: {key}: HTTP {code}"
            )));
        }
        Ok(())
    }
}

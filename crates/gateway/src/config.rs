//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ読み込み、以降は読み取り専用で各ハンドラに渡す。

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use translate_types::KeyNamespaces;

use crate::engine::TranslationEngine;
use crate::storage::ObjectStorage;

/// 署名付きURLの既定有効期限（秒）。アップロード・ダウンロード共通。
pub const DEFAULT_GRANT_EXPIRY_SECS: u32 = 5 * 60;

/// レスポンスの包み方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeMode {
    /// ハンドラのJSONをそのまま返す
    #[default]
    Direct,
    /// ルーティング層と同じ `{statusCode, headers, body: "<json>"}` 形式で包む
    Wrapped,
}

impl FromStr for EnvelopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "wrapped" => Ok(Self::Wrapped),
            other => Err(format!("unknown envelope mode: {other}")),
        }
    }
}

/// オブジェクトストレージのバックエンド種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// S3互換ストレージ（AWS S3, MinIO, Cloudflare R2 等）
    S3,
    /// Gateway内蔵の署名付きストレージ（開発・テスト用）
    Local,
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// 翻訳エンジンの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// 外部の翻訳エンジンにHTTPで委譲する
    Http,
    /// ローカル開発用モック
    Mock,
}

impl FromStr for EngineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown engine mode: {other}")),
        }
    }
}

/// プロセス全体で不変のGateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// incoming / result 名前空間
    pub namespaces: KeyNamespaces,
    /// アップロード用署名付きURLの有効期限（秒）
    pub upload_expiry_secs: u32,
    /// ダウンロード用署名付きURLの有効期限（秒）
    pub download_expiry_secs: u32,
    /// 翻訳元言語
    pub source_language: String,
    /// 翻訳先言語
    pub target_language: String,
    /// レスポンスの包み方
    pub envelope: EnvelopeMode,
    /// ストレージバックエンド
    pub storage_backend: StorageBackendKind,
    /// 翻訳エンジン種別
    pub engine_mode: EngineMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            namespaces: KeyNamespaces::default(),
            upload_expiry_secs: DEFAULT_GRANT_EXPIRY_SECS,
            download_expiry_secs: DEFAULT_GRANT_EXPIRY_SECS,
            source_language: "en".to_string(),
            target_language: "ja".to_string(),
            envelope: EnvelopeMode::Direct,
            storage_backend: StorageBackendKind::S3,
            engine_mode: EngineMode::Http,
        }
    }
}

impl GatewayConfig {
    /// 環境変数から構築する。未設定の項目は既定値を使う。
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let namespaces = KeyNamespaces::new(
            &env_or("UPLOAD_PREFIX", &defaults.namespaces.incoming),
            &env_or("TRANSLATED_PREFIX", &defaults.namespaces.result),
        );
        if namespaces.incoming.is_empty()
            || namespaces.result.is_empty()
            || namespaces.incoming == namespaces.result
        {
            anyhow::bail!(
                "UPLOAD_PREFIXとTRANSLATED_PREFIXは空でない異なる値である必要があります"
            );
        }

        Ok(Self {
            listen_addr: env_or("LISTEN_ADDR", &defaults.listen_addr),
            namespaces,
            upload_expiry_secs: env_parse("UPLOAD_URL_EXPIRY_SECS", defaults.upload_expiry_secs)?,
            download_expiry_secs: env_parse(
                "DOWNLOAD_URL_EXPIRY_SECS",
                defaults.download_expiry_secs,
            )?,
            source_language: env_or("SOURCE_LANGUAGE", &defaults.source_language),
            target_language: env_or("TARGET_LANGUAGE", &defaults.target_language),
            envelope: env_parse("RESPONSE_ENVELOPE", defaults.envelope)?,
            storage_backend: env_parse("STORAGE_BACKEND", defaults.storage_backend)?,
            engine_mode: env_parse("ENGINE_MODE", defaults.engine_mode)?,
        })
    }
}

/// 環境変数を読み、未設定または空なら既定値を返す。
pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// 環境変数をパースする。未設定なら既定値。
pub(crate) fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("環境変数 {name} の値が不正です: {e}")),
        _ => Ok(default),
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 起動時に確定した設定
    pub config: GatewayConfig,
    /// オブジェクトストレージ（S3互換等、トレイトで抽象化）
    pub storage: Arc<dyn ObjectStorage>,
    /// 翻訳エンジン（HTTP委譲・モック等、トレイトで抽象化）
    pub engine: Box<dyn TranslationEngine>,
}

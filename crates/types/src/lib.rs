//! # 翻訳ゲートウェイ 共有型定義
//!
//! アップロード許可・翻訳ディスパッチ・ダウンロード許可の3ステップで
//! やり取りされるリクエスト/レスポンスをRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - JSONフィールド名: camelCase（ブラウザクライアントとの互換性のため）
//! - 有効期限: UNIXタイムスタンプ（秒）

use serde::{Deserialize, Serialize};

pub mod envelope;
pub mod keys;

pub use keys::{KeyNamespaces, StorageKey};

// ---------------------------------------------------------------------------
// アップロード許可
// ---------------------------------------------------------------------------

/// POST /upload-url のリクエスト。
///
/// 必須チェックをハンドラ側で行い、欠落フィールド名をエラーに含めるため
/// 全フィールドをOptionで受ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrantRequest {
    /// 元のファイル名
    #[serde(default)]
    pub file_name: Option<String>,
    /// アップロード時に送信するContent-Type
    #[serde(default)]
    pub content_type: Option<String>,
}

/// 書き込み用の署名付きURL。
///
/// クライアントはこのURLにPUTする際、`content_type` と同一の
/// `Content-Type` ヘッダを送信しなければならない（署名に含まれるため）。
/// 最小のレスポンスは `{uploadUrl, objectKey}` のみで、その場合の
/// Content-Typeは許可を求めたときの値になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    /// 署名付きアップロードURL（PUT）
    pub upload_url: String,
    /// 割り当てられたオブジェクトキー（incoming名前空間）
    pub object_key: String,
    /// 署名に含まれるContent-Type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// URL有効期限（UNIXタイムスタンプ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// 翻訳ディスパッチ
// ---------------------------------------------------------------------------

/// POST /translate のリクエスト。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    /// アップロード済みオブジェクトのキー
    #[serde(default)]
    pub object_key: Option<String>,
}

/// 翻訳結果。
///
/// `translated_text` と `result_key` の少なくとも一方が設定される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// エンジンが直接返した翻訳テキスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    /// 翻訳成果物のキー（result名前空間）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    /// 成果物の署名付きダウンロードURL（`result_key` がある場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// `download_url` の有効期限（UNIXタイムスタンプ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TranslationResult {
    /// テキストも成果物も持たない結果はエンジン契約違反。
    pub fn is_empty(&self) -> bool {
        self.translated_text
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
            && self.result_key.is_none()
    }
}

// ---------------------------------------------------------------------------
// ダウンロード許可
// ---------------------------------------------------------------------------

/// GET /download-url のクエリ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadGrantQuery {
    /// 翻訳成果物のキー
    #[serde(default)]
    pub object_key: Option<String>,
}

/// 読み取り用の署名付きURL。result名前空間のキーにのみ発行される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadGrant {
    /// 署名付きダウンロードURL（GET）
    pub download_url: String,
    /// 対象オブジェクトキー
    pub object_key: String,
    /// URL有効期限（UNIXタイムスタンプ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// エラー
// ---------------------------------------------------------------------------

/// 全エンドポイント共通のエラーレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 利用者向けメッセージ
    pub message: String,
    /// 診断用の詳細（エンジンエラー時のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

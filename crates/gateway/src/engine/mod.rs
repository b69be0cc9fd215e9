//! # 翻訳エンジン抽象化
//!
//! 翻訳エンジン本体（テキスト抽出・OCR・機械翻訳・PDF生成）はGatewayの外側にあり、
//! Gatewayはアップロード済みの原本を渡して翻訳テキストと成果物を受け取るだけ。
//! 環境変数 `ENGINE_MODE` で実装を切り替える。
//!
//! 現在のエンジン実装:
//! - `http` — 外部の翻訳エンジンにJSONで委譲
//! - `mock` — ローカル開発用（入力テキストに言語タグを付けて返す）

pub mod http;
pub mod mock;

pub use self::http::HttpTranslationEngine;
pub use self::mock::MockTranslationEngine;

use serde::Serialize;
use translate_types::StorageKey;

use crate::error::GatewayError;

/// 原本の種別。エンジンはこれでテキスト抽出かOCRかを選ぶ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// PDF（テキスト抽出、取れなければOCR）
    Pdf,
    /// 画像・スクリーンショット（OCR）
    Image,
}

impl DocumentKind {
    /// 拡張子 `.pdf` または `application/pdf` ならPDF、それ以外は画像として扱う。
    pub fn detect(key: &StorageKey, content_type: Option<&str>) -> Self {
        let is_pdf_type = content_type
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/pdf"))
            .unwrap_or(false);
        if is_pdf_type || key.extension().as_deref() == Some("pdf") {
            Self::Pdf
        } else {
            Self::Image
        }
    }
}

/// エンジンに渡す原本。
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// 原本のキー
    pub object_key: StorageKey,
    /// 原本の種別
    pub kind: DocumentKind,
    /// 保存時のContent-Type
    pub content_type: Option<String>,
    /// 原本のバイト列
    pub bytes: Vec<u8>,
    /// 翻訳元言語
    pub source_language: String,
    /// 翻訳先言語
    pub target_language: String,
}

/// エンジンが生成したダウンロード可能な成果物。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// 成果物本体
    pub bytes: Vec<u8>,
    /// 成果物のContent-Type
    pub content_type: String,
    /// 保存キーに使う拡張子（ドットなし）
    pub extension: String,
}

/// エンジンの出力。少なくとも一方が設定されていなければ契約違反。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// 翻訳テキスト
    pub translated_text: Option<String>,
    /// 翻訳成果物
    pub artifact: Option<Artifact>,
}

/// 翻訳エンジンのトレイト。
///
/// 呼び出しは同期的に完了を待つ。再呼び出しは冪等ではない
/// （エンジンの出力が変わりうる・課金が発生しうる）。
#[async_trait::async_trait]
pub trait TranslationEngine: Send + Sync {
    /// ログ用のエンジン名
    fn name(&self) -> &str;

    /// 原本を翻訳する。失敗は `GatewayError::Engine` で返す。
    async fn translate(&self, document: SourceDocument) -> Result<EngineOutput, GatewayError>;
}

/// Content-Typeから保存用の拡張子を決める。
///
/// 候補が複数ある場合は、逆引きで同じContent-Typeに戻るものを選ぶ。
/// 不明なContent-Typeは `bin`。
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some(candidates) = mime_guess::get_mime_extensions_str(&essence) else {
        return "bin";
    };
    candidates
        .iter()
        .find(|ext| mime_guess::from_ext(ext).first_raw() == Some(essence.as_str()))
        .or_else(|| candidates.first())
        .copied()
        .unwrap_or("bin")
}

//! # モック翻訳エンジン
//!
//! ローカル開発用。外部エンジンなしで3ステップの流れを確認できる。
//! 原本がUTF-8テキストならそれに言語タグを付けて返し、
//! 同じ内容を `text/plain` の成果物としても返す。

use super::{Artifact, DocumentKind, EngineOutput, SourceDocument, TranslationEngine};
use crate::error::GatewayError;

/// モック翻訳エンジン。
#[derive(Debug, Default)]
pub struct MockTranslationEngine;

impl MockTranslationEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl TranslationEngine for MockTranslationEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, document: SourceDocument) -> Result<EngineOutput, GatewayError> {
        if document.bytes.is_empty() {
            return Err(GatewayError::Engine(format!(
                "source document is empty: {}",
                document.object_key
            )));
        }

        let tag = format!("[{}->{}]", document.source_language, document.target_language);
        let translated = match (document.kind, std::str::from_utf8(&document.bytes)) {
            (_, Ok(text)) => format!("{tag} {}", text.trim()),
            (DocumentKind::Pdf, Err(_)) => {
                format!("{tag} PDF document ({} bytes)", document.bytes.len())
            }
            (DocumentKind::Image, Err(_)) => {
                format!("{tag} image document ({} bytes)", document.bytes.len())
            }
        };

        tracing::debug!(object_key = %document.object_key, "モックエンジンで翻訳");
        Ok(EngineOutput {
            artifact: Some(Artifact {
                bytes: translated.clone().into_bytes(),
                content_type: "text/plain; charset=utf-8".to_string(),
                extension: "txt".to_string(),
            }),
            translated_text: Some(translated),
        })
    }
}

//! # HTTP翻訳エンジン
//!
//! 外部の翻訳エンジンに `POST {endpoint}/translate` で原本を渡す。
//!
//! ## リクエスト
//! ```text
//! {"objectKey", "kind": "pdf"|"image", "contentType"?, "sourceLanguage",
//!  "targetLanguage", "document": <Base64>}
//! ```
//!
//! ## レスポンス
//! ```text
//! {"translatedText"?, "artifact"?: {"contentType", "extension"?, "data": <Base64>}}
//! ```
//! エンジン自体がルーティング層の背後にある場合に備え、レスポンスは
//! エンベロープ正規化してから読む。

use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use translate_types::envelope;

use super::{extension_for, Artifact, DocumentKind, EngineOutput, SourceDocument, TranslationEngine};
use crate::config::env_or;
use crate::error::GatewayError;

/// エラー詳細としてクライアントに返す最大文字数
const MAX_DETAIL_CHARS: usize = 512;

/// Base64エンジン（Standard）
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EngineRequest<'a> {
    object_key: &'a str,
    kind: DocumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    source_language: &'a str,
    target_language: &'a str,
    document: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineResponse {
    #[serde(default)]
    translated_text: Option<String>,
    #[serde(default)]
    artifact: Option<EngineArtifact>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineArtifact {
    content_type: String,
    #[serde(default)]
    extension: Option<String>,
    data: String,
}

/// HTTP経由の翻訳エンジン。
pub struct HttpTranslationEngine {
    /// エンジンのベースURL
    endpoint: String,
    /// HTTPクライアント
    http_client: reqwest::Client,
}

impl HttpTranslationEngine {
    /// `timeout` がNoneの場合、エンジンが応答するまで待ち続ける。
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client: builder.build()?,
        })
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = env_or("ENGINE_ENDPOINT", "http://localhost:4000");
        let timeout = std::env::var("ENGINE_TIMEOUT_SECS")
            .ok()
            .map(|raw| raw.trim().parse::<u64>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("ENGINE_TIMEOUT_SECSの値が不正です: {e}"))?
            .map(Duration::from_secs);

        tracing::info!(engine_endpoint = %endpoint, timeout = ?timeout, "HTTP翻訳エンジンを設定");
        Self::new(&endpoint, timeout)
    }
}

#[async_trait::async_trait]
impl TranslationEngine for HttpTranslationEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn translate(&self, document: SourceDocument) -> Result<EngineOutput, GatewayError> {
        let request = EngineRequest {
            object_key: document.object_key.as_str(),
            kind: document.kind,
            content_type: document.content_type.as_deref(),
            source_language: &document.source_language,
            target_language: &document.target_language,
            document: b64().encode(&document.bytes),
        };

        let url = format!("{}/translate", self.endpoint);
        // エンジンのURLをエラーメッセージに含めない
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Engine(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Engine(format!("failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(GatewayError::Engine(format!(
                "engine returned HTTP {}: {}",
                status.as_u16(),
                error_detail(&body)
            )));
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Engine(format!("response is not JSON: {e}")))?;
        let unwrapped = envelope::unwrap(raw)
            .map_err(|e| GatewayError::Engine(format!("malformed response envelope: {e}")))?;
        if unwrapped.is_error_status() {
            return Err(GatewayError::Engine(format!(
                "engine returned status {}: {}",
                unwrapped.status.unwrap_or_default(),
                error_detail(&unwrapped.payload.to_string())
            )));
        }

        let parsed: EngineResponse = serde_json::from_value(unwrapped.payload)
            .map_err(|e| GatewayError::Engine(format!("unexpected response shape: {e}")))?;

        let artifact = parsed
            .artifact
            .map(|artifact| {
                let bytes = b64()
                    .decode(artifact.data.as_bytes())
                    .map_err(|e| GatewayError::Engine(format!("artifact is not Base64: {e}")))?;
                let extension = artifact
                    .extension
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                    .unwrap_or_else(|| extension_for(&artifact.content_type).to_string());
                Ok::<_, GatewayError>(Artifact {
                    bytes,
                    content_type: artifact.content_type,
                    extension,
                })
            })
            .transpose()?;

        Ok(EngineOutput {
            translated_text: parsed.translated_text,
            artifact,
        })
    }
}

/// エンジンのエラーボディから `message`（あれば `error` も）を取り出し、長さを制限する。
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| envelope::normalize(v).ok())
        .and_then(|v| {
            let message = v.get("message")?.as_str()?.to_string();
            Some(match v.get("error").and_then(|e| e.as_str()) {
                Some(error) => format!("{message} ({error})"),
                None => message,
            })
        })
        .unwrap_or_else(|| body.trim().to_string());
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::Json;
    use translate_types::StorageKey;

    fn document() -> SourceDocument {
        SourceDocument {
            object_key: StorageKey::new("uploads/1-report.pdf"),
            kind: DocumentKind::Pdf,
            content_type: Some("application/pdf".to_string()),
            bytes: b"%PDF-1.7".to_vec(),
            source_language: "en".to_string(),
            target_language: "ja".to_string(),
        }
    }

    /// モック翻訳エンジンを起動し、ポートを返す。
    async fn start_mock_engine(app: axum::Router) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        port
    }

    #[tokio::test]
    async fn test_translate_with_artifact() {
        let app = axum::Router::new().route(
            "/translate",
            axum::routing::post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["kind"], "pdf");
                assert_eq!(body["sourceLanguage"], "en");
                assert_eq!(body["targetLanguage"], "ja");
                assert_eq!(body["document"], b64().encode(b"%PDF-1.7"));
                Json(serde_json::json!({
                    "translatedText": "報告書",
                    "artifact": {"contentType": "application/pdf", "data": b64().encode(b"%PDF-ja")}
                }))
            }),
        );
        let port = start_mock_engine(app).await;
        let engine = HttpTranslationEngine::new(&format!("http://127.0.0.1:{port}/"), None).unwrap();

        let output = engine.translate(document()).await.unwrap();
        assert_eq!(output.translated_text.as_deref(), Some("報告書"));
        let artifact = output.artifact.unwrap();
        assert_eq!(artifact.bytes, b"%PDF-ja");
        assert_eq!(artifact.extension, "pdf");
    }

    /// ルーティング層に包まれたレスポンスも読めることを確認
    #[tokio::test]
    async fn test_translate_reads_wrapped_response() {
        let app = axum::Router::new().route(
            "/translate",
            axum::routing::post(|| async {
                Json(envelope::wrap(200, &serde_json::json!({"translatedText": "こんにちは"})))
            }),
        );
        let port = start_mock_engine(app).await;
        let engine = HttpTranslationEngine::new(&format!("http://127.0.0.1:{port}"), None).unwrap();

        let output = engine.translate(document()).await.unwrap();
        assert_eq!(output.translated_text.as_deref(), Some("こんにちは"));
        assert!(output.artifact.is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_is_engine_error() {
        let app = axum::Router::new().route(
            "/translate",
            axum::routing::post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "message": "translation failed",
                        "error": "PDF page limit exceeded: 12 pages (max 10)"
                    })),
                )
            }),
        );
        let port = start_mock_engine(app).await;
        let engine = HttpTranslationEngine::new(&format!("http://127.0.0.1:{port}"), None).unwrap();

        let err = engine.translate(document()).await.unwrap_err();
        match err {
            GatewayError::Engine(detail) => {
                assert!(detail.contains("HTTP 500"));
                assert!(detail.contains("page limit exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// 接続失敗時のメッセージにエンジンのURLが含まれないことを確認
    #[tokio::test]
    async fn test_connection_failure_hides_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let engine = HttpTranslationEngine::new(&format!("http://127.0.0.1:{port}"), None).unwrap();
        let err = engine.translate(document()).await.unwrap_err();
        match err {
            GatewayError::Engine(detail) => {
                assert!(!detail.contains("127.0.0.1"), "URLが漏れている: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_detail_is_truncated() {
        let long = "x".repeat(2000);
        assert_eq!(error_detail(&long).chars().count(), MAX_DETAIL_CHARS);
        assert_eq!(
            error_detail(r#"{"message":"OCR failed"}"#),
            "OCR failed"
        );
    }
}

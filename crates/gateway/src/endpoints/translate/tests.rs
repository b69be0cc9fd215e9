use std::sync::atomic::Ordering;

use translate_types::envelope;
use translate_types::{StorageKey, TranslationResult, UploadGrant};

use super::*;
use crate::config::EnvelopeMode;
use crate::endpoints::test_helpers::{
    spawn_gateway, spawn_gateway_with, test_state, CountingEngine, FailingEngine,
};
use crate::engine::MockTranslationEngine;
use crate::error::GatewayError;

async fn put_source(state: &crate::config::GatewayState, key: &str, bytes: &[u8], ct: &str) {
    state
        .storage
        .put_object(&StorageKey::new(key), bytes.to_vec(), ct)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_object_key_does_not_call_engine() {
    let engine = CountingEngine::text("翻訳済み");
    let calls = engine.calls.clone();
    let (state, _) = test_state(engine);

    let err = dispatch_translation(&state, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(ref m) if m == "objectKey is required"));
    let err = dispatch_translation(&state, Some("  ".into())).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_foreign_namespace_is_denied() {
    let engine = CountingEngine::text("翻訳済み");
    let calls = engine.calls.clone();
    let (state, _) = test_state(engine);
    put_source(&state, "translated/abc-translated.txt", b"secret", "text/plain").await;

    let err = dispatch_translation(&state, Some("translated/abc-translated.txt".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AccessDenied(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_source_is_not_found() {
    let engine = CountingEngine::text("翻訳済み");
    let calls = engine.calls.clone();
    let (state, _) = test_state(engine);

    let err = dispatch_translation(&state, Some("uploads/nope-report.pdf".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_text_only_result() {
    let (state, _) = test_state(CountingEngine::text("こんにちは"));
    put_source(&state, "uploads/1-hello.png", b"\x89PNG", "image/png").await;

    let result = dispatch_translation(&state, Some("uploads/1-hello.png".into()))
        .await
        .unwrap();
    assert_eq!(
        result,
        TranslationResult {
            translated_text: Some("こんにちは".into()),
            ..TranslationResult::default()
        }
    );
}

#[tokio::test]
async fn test_artifact_is_stored_in_result_namespace() {
    let (state, _) = test_state(CountingEngine::artifact(b"%PDF-ja", "application/pdf", "pdf"));
    put_source(&state, "uploads/1-report.pdf", b"%PDF-en", "application/pdf").await;

    let result = dispatch_translation(&state, Some("uploads/1-report.pdf".into()))
        .await
        .unwrap();
    let result_key = result.result_key.unwrap();
    assert!(result_key.starts_with("translated/"));
    assert!(result_key.ends_with("-translated.pdf"));
    assert!(result.download_url.unwrap().contains(&result_key));
    assert!(result.expires_at.is_some());
    assert!(result.translated_text.is_none());

    let stored = state
        .storage
        .get_object(&StorageKey::new(result_key))
        .await
        .unwrap();
    assert_eq!(stored.bytes, b"%PDF-ja");
    assert_eq!(stored.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_empty_engine_output_is_engine_error() {
    let (state, _) = test_state(CountingEngine::text("   "));
    put_source(&state, "uploads/1-blank.png", b"img", "image/png").await;

    let err = dispatch_translation(&state, Some("uploads/1-blank.png".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Engine(_)));
}

#[tokio::test]
async fn test_repeat_dispatch_calls_engine_each_time() {
    let engine = CountingEngine::artifact(b"out", "text/plain", "txt");
    let calls = engine.calls.clone();
    let (state, _) = test_state(engine);
    put_source(&state, "uploads/1-a.txt", b"in", "text/plain").await;

    let first = dispatch_translation(&state, Some("uploads/1-a.txt".into()))
        .await
        .unwrap();
    let second = dispatch_translation(&state, Some("uploads/1-a.txt".into()))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_ne!(first.result_key, second.result_key);
}

#[tokio::test]
async fn test_http_error_statuses() {
    let (base, state) = spawn_gateway(FailingEngine("OCR backend unavailable".into())).await;
    put_source(&state, "uploads/1-scan.png", b"img", "image/png").await;
    let client = reqwest::Client::new();

    let cases = [
        (serde_json::json!({}), 400),
        (serde_json::json!({"objectKey": "translated/x.pdf"}), 403),
        (serde_json::json!({"objectKey": "uploads/missing.pdf"}), 404),
        (serde_json::json!({"objectKey": "uploads/1-scan.png"}), 502),
    ];
    for (body, expected) in cases {
        let resp = client
            .post(format!("{base}/translate"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected, "{body}");
        let error: serde_json::Value = resp.json().await.unwrap();
        assert!(error["message"].is_string());
    }

    let resp = client
        .post(format!("{base}/translate"))
        .json(&serde_json::json!({"objectKey": "uploads/1-scan.png"}))
        .send()
        .await
        .unwrap();
    let error: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(error["message"], "Translation failed");
    assert_eq!(error["error"], "OCR backend unavailable");
}

/// `?mode=` で3ステップを1ルートに多重化できることを確認
#[tokio::test]
async fn test_mode_multiplexed_pipeline() {
    let (base, _) = spawn_gateway(MockTranslationEngine::new()).await;
    let client = reqwest::Client::new();

    let grant: UploadGrant = client
        .post(format!("{base}/translate?mode=upload"))
        .json(&serde_json::json!({"fileName": "note.txt", "contentType": "text/plain"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let put = client
        .put(&grant.upload_url)
        .header("content-type", grant.content_type.as_deref().unwrap())
        .body("hello")
        .send()
        .await
        .unwrap();
    assert!(put.status().is_success());

    let result: TranslationResult = client
        .post(format!("{base}/translate?mode=process"))
        .json(&serde_json::json!({"objectKey": grant.object_key}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result.translated_text.as_deref(), Some("[en->ja] hello"));
    let result_key = result.result_key.unwrap();

    let download: serde_json::Value = client
        .post(format!("{base}/translate?mode=download"))
        .json(&serde_json::json!({"objectKey": result_key}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bytes = client
        .get(download["downloadUrl"].as_str().unwrap())
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"[en->ja] hello");

    let resp = client
        .post(format!("{base}/translate?mode=delete"))
        .json(&serde_json::json!({"objectKey": "uploads/x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

/// ルーティング層エミュレーションでは常にHTTP 200で、内側のstatusCodeに結果が入る
#[tokio::test]
async fn test_wrapped_envelope_mode() {
    let (base, state) =
        spawn_gateway_with(CountingEngine::text("translated"), EnvelopeMode::Wrapped).await;
    put_source(&state, "uploads/1-a.png", b"img", "image/png").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/translate"))
        .json(&serde_json::json!({"objectKey": "uploads/1-a.png"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let raw: serde_json::Value = resp.json().await.unwrap();
    assert!(raw["body"].is_string());
    let unwrapped = envelope::unwrap(raw).unwrap();
    assert_eq!(unwrapped.status, Some(200));
    assert_eq!(unwrapped.payload["translatedText"], "translated");

    let resp = client
        .get(format!("{base}/download-url"))
        .query(&[("objectKey", "uploads/1-a.png")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let unwrapped = envelope::unwrap(resp.json().await.unwrap()).unwrap();
    assert_eq!(unwrapped.status, Some(403));
    assert!(unwrapped.is_error_status());
    assert_eq!(unwrapped.payload["message"], "Access denied");
}

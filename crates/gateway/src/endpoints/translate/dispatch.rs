//! 翻訳ディスパッチ本体。
//!
//! 1. `objectKey` の必須チェックとincoming名前空間チェック
//! 2. ストレージから原本を取得（無ければ `NotFound`）
//! 3. 翻訳エンジンを同期的に呼び出す
//! 4. 成果物があればresult名前空間に保存し、テキストと合わせて返す

use translate_types::{StorageKey, TranslationResult};

use crate::config::GatewayState;
use crate::endpoints::required;
use crate::engine::{DocumentKind, EngineOutput, SourceDocument};
use crate::error::GatewayError;

/// 原本を翻訳し、結果を返す。
///
/// 同じキーでの再呼び出しは冪等ではない。エンジンは毎回呼ばれ、
/// 成果物は毎回新しいキーで保存される。
pub async fn dispatch_translation(
    state: &GatewayState,
    object_key: Option<String>,
) -> Result<TranslationResult, GatewayError> {
    let object_key = StorageKey::new(required(object_key, "objectKey")?);

    // 任意オブジェクトの読み出しに使われないよう、incoming名前空間に限定する
    if !state.config.namespaces.is_incoming(&object_key) {
        return Err(GatewayError::AccessDenied(format!(
            "translation requested outside incoming namespace: {object_key}"
        )));
    }

    let source = state.storage.get_object(&object_key).await?;
    let kind = DocumentKind::detect(&object_key, source.content_type.as_deref());

    tracing::info!(
        object_key = %object_key,
        kind = ?kind,
        size = source.bytes.len(),
        engine = state.engine.name(),
        "翻訳を開始"
    );

    let output = state
        .engine
        .translate(SourceDocument {
            object_key: object_key.clone(),
            kind,
            content_type: source.content_type,
            bytes: source.bytes,
            source_language: state.config.source_language.clone(),
            target_language: state.config.target_language.clone(),
        })
        .await?;

    let result = shape_result(state, output).await?;

    tracing::info!(
        object_key = %object_key,
        result_key = result.result_key.as_deref().unwrap_or("-"),
        has_text = result.translated_text.is_some(),
        "翻訳完了"
    );
    Ok(result)
}

/// エンジン出力をレスポンスの形に整える。
///
/// 成果物は `{result}/{uuid}-translated.{ext}` に保存し、署名付き
/// ダウンロードURLも付ける。空白のみのテキストは無いものとして扱い、
/// テキストも成果物も無ければ `GatewayError::Engine`。
pub async fn shape_result(
    state: &GatewayState,
    output: EngineOutput,
) -> Result<TranslationResult, GatewayError> {
    let translated_text = output.translated_text.filter(|t| !t.trim().is_empty());

    let mut result = TranslationResult {
        translated_text,
        ..TranslationResult::default()
    };

    if let Some(artifact) = output.artifact {
        let disambiguator = uuid::Uuid::new_v4().simple().to_string();
        let result_key = state
            .config
            .namespaces
            .result_key(&disambiguator, &artifact.extension);

        state
            .storage
            .put_object(&result_key, artifact.bytes, &artifact.content_type)
            .await?;
        let presigned = state
            .storage
            .presign_get(&result_key, state.config.download_expiry_secs)
            .await?;

        result.expires_at = Some(presigned.expires_at);
        result.download_url = Some(presigned.url);
        result.result_key = Some(result_key.into_string());
    }

    if result.is_empty() {
        return Err(GatewayError::Engine(
            "engine returned neither translated text nor an artifact".to_string(),
        ));
    }
    Ok(result)
}

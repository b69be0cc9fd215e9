//! # POST /upload-url
//!
//! incoming名前空間に新しいキーを割り当て、書き込み用署名付きURLを発行する。
//! この時点ではストレージにオブジェクトは作られない。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use translate_types::keys::sanitize_file_name;
use translate_types::{UploadGrant, UploadGrantRequest};

use super::required;
use crate::config::GatewayState;
use crate::error::GatewayError;

/// アップロード許可を発行する。
///
/// キーは `{incoming}/{uuid}-{fileName}`。UUIDにより同名ファイルの
/// 同時アップロードでもキーは衝突しない。署名はContent-Typeを含むため、
/// クライアントは返された `contentType` をそのままPUTに使う必要がある。
pub async fn issue_upload_grant(
    state: &GatewayState,
    request: UploadGrantRequest,
) -> Result<UploadGrant, GatewayError> {
    let file_name = required(request.file_name, "fileName")?;
    let content_type = required(request.content_type, "contentType")?;

    let file_name = sanitize_file_name(&file_name).ok_or_else(|| {
        GatewayError::InvalidRequest(format!("fileName is not a valid file name: {file_name}"))
    })?;

    let disambiguator = uuid::Uuid::new_v4().simple().to_string();
    let object_key = state
        .config
        .namespaces
        .upload_key(&disambiguator, file_name);

    let presigned = state
        .storage
        .presign_put(&object_key, &content_type, state.config.upload_expiry_secs)
        .await?;

    tracing::info!(
        object_key = %object_key,
        content_type = %content_type,
        expires_at = presigned.expires_at,
        "アップロード許可を発行"
    );

    Ok(UploadGrant {
        upload_url: presigned.url,
        object_key: object_key.into_string(),
        content_type: Some(content_type),
        expires_at: Some(presigned.expires_at),
    })
}

/// POST /upload-url
pub async fn handle_upload_url(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<UploadGrantRequest>, JsonRejection>,
) -> Result<Json<UploadGrant>, GatewayError> {
    let Json(request) = body?;
    issue_upload_grant(&state, request).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::test_helpers::{spawn_gateway, test_state, CountingEngine};

    #[tokio::test]
    async fn test_grant_key_is_in_incoming_namespace() {
        let (state, _) = test_state(CountingEngine::text("ok"));
        let grant = issue_upload_grant(
            &state,
            UploadGrantRequest {
                file_name: Some("report.pdf".into()),
                content_type: Some("application/pdf".into()),
            },
        )
        .await
        .unwrap();

        assert!(grant.object_key.starts_with("uploads/"));
        assert!(grant.object_key.ends_with("-report.pdf"));
        assert_eq!(grant.content_type.as_deref(), Some("application/pdf"));
        assert!(grant.upload_url.contains("/storage/uploads/"));
    }

    /// 返す `expiresAt` はURLに署名された期限そのもの
    #[tokio::test]
    async fn test_reported_expiry_is_signed_expiry() {
        let (state, _) = test_state(CountingEngine::text("ok"));
        let grant = issue_upload_grant(
            &state,
            UploadGrantRequest {
                file_name: Some("scan.png".into()),
                content_type: Some("image/png".into()),
            },
        )
        .await
        .unwrap();

        let url = reqwest::Url::parse(&grant.upload_url).unwrap();
        let signed = url
            .query_pairs()
            .find(|(k, _)| k == "expires")
            .map(|(_, v)| v.parse::<u64>().unwrap());
        assert_eq!(grant.expires_at, signed);
    }

    #[tokio::test]
    async fn test_same_file_name_gets_distinct_keys() {
        let (state, _) = test_state(CountingEngine::text("ok"));
        let request = || UploadGrantRequest {
            file_name: Some("same.png".into()),
            content_type: Some("image/png".into()),
        };
        let (a, b) = tokio::join!(
            issue_upload_grant(&state, request()),
            issue_upload_grant(&state, request())
        );
        assert_ne!(a.unwrap().object_key, b.unwrap().object_key);
    }

    #[tokio::test]
    async fn test_file_name_path_is_stripped() {
        let (state, _) = test_state(CountingEngine::text("ok"));
        let grant = issue_upload_grant(
            &state,
            UploadGrantRequest {
                file_name: Some("../../translated/evil.pdf".into()),
                content_type: Some("application/pdf".into()),
            },
        )
        .await
        .unwrap();
        assert!(grant.object_key.starts_with("uploads/"));
        assert!(grant.object_key.ends_with("-evil.pdf"));
        assert!(!grant.object_key.contains(".."));
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_request() {
        let (base, _) = spawn_gateway(CountingEngine::text("ok")).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/upload-url"))
            .json(&serde_json::json!({"fileName": "a.pdf"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "contentType is required");

        let resp = client
            .post(format!("{base}/upload-url"))
            .json(&serde_json::json!({"contentType": "application/pdf"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "fileName is required");
    }

    #[tokio::test]
    async fn test_non_json_body_is_bad_request() {
        let (base, _) = spawn_gateway(CountingEngine::text("ok")).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/upload-url"))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }
}

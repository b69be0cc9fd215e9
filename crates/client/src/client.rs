//! Gateway HTTPクライアント。

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use translate_types::envelope;
use translate_types::{DownloadGrant, TranslationResult, UploadGrant};

use crate::error::{ClientError, PipelineStep, StepContext};

/// Gatewayのルート構成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteStyle {
    /// `/upload-url`, `/translate`, `/download-url` の3ルート
    #[default]
    Distinct,
    /// `/translate?mode=upload|process|download` の1ルート
    Mode,
}

/// パイプライン全体の結果。
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// アップロードに使った許可
    pub upload: UploadGrant,
    /// 翻訳結果
    pub result: TranslationResult,
    /// ダウンロードした成果物（`result_key` がある場合のみ）
    pub artifact: Option<Vec<u8>>,
}

/// 翻訳ゲートウェイのクライアント。
#[derive(Debug, Clone)]
pub struct TranslateClient {
    http: reqwest::Client,
    base_url: String,
    routes: RouteStyle,
}

impl TranslateClient {
    /// `timeout` は各リクエストに適用される。翻訳ディスパッチは
    /// エンジンの完了まで待つため、Noneにしておくのが無難。
    /// タイムアウトしてもサーバー側の処理は止まらない。
    pub fn new(
        base_url: &str,
        routes: RouteStyle,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            routes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 書き込み用の署名付きURLを取得する。
    ///
    /// 応答に `contentType` が無い場合は、要求した `content_type` で補う。
    pub async fn request_upload_grant(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<UploadGrant, ClientError> {
        let body = serde_json::json!({"fileName": file_name, "contentType": content_type});
        let request = match self.routes {
            RouteStyle::Distinct => self.http.post(self.url("/upload-url")),
            RouteStyle::Mode => self.http.post(self.url("/translate?mode=upload")),
        };
        let mut grant: UploadGrant = self.call(request.json(&body)).await?;

        if grant.upload_url.is_empty() || grant.object_key.is_empty() {
            return Err(ClientError::Contract(
                "upload grant is missing uploadUrl or objectKey".to_string(),
            ));
        }
        grant
            .content_type
            .get_or_insert_with(|| content_type.to_string());
        tracing::debug!(object_key = %grant.object_key, "アップロード許可を取得");
        Ok(grant)
    }

    /// 許可に従ってストレージへ直接PUTする。
    ///
    /// `Content-Type` は署名に含まれているため、必ず許可の値をそのまま送る。
    pub async fn upload(&self, grant: &UploadGrant, bytes: Vec<u8>) -> Result<(), ClientError> {
        let content_type = grant.content_type.as_deref().ok_or_else(|| {
            ClientError::Contract("upload grant has no contentType to send".to_string())
        })?;
        let response = self
            .http
            .put(&grant.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: non_empty(message, "upload rejected by storage"),
            });
        }
        tracing::debug!(object_key = %grant.object_key, "アップロード完了");
        Ok(())
    }

    /// アップロード済みオブジェクトの翻訳を依頼する。エンジン完了まで戻らない。
    pub async fn translate(&self, object_key: &str) -> Result<TranslationResult, ClientError> {
        let body = serde_json::json!({"objectKey": object_key});
        let request = match self.routes {
            RouteStyle::Distinct => self.http.post(self.url("/translate")),
            RouteStyle::Mode => self.http.post(self.url("/translate?mode=process")),
        };
        let result: TranslationResult = self.call(request.json(&body)).await?;

        if result.is_empty() {
            return Err(ClientError::Contract(
                "translation returned neither translatedText nor resultKey".to_string(),
            ));
        }
        Ok(result)
    }

    /// 翻訳成果物の読み取り用署名付きURLを取得する。
    pub async fn request_download_grant(
        &self,
        object_key: &str,
    ) -> Result<DownloadGrant, ClientError> {
        let request = match self.routes {
            RouteStyle::Distinct => self
                .http
                .get(self.url("/download-url"))
                .query(&[("objectKey", object_key)]),
            RouteStyle::Mode => self
                .http
                .post(self.url("/translate?mode=download"))
                .json(&serde_json::json!({"objectKey": object_key})),
        };
        let grant: DownloadGrant = self.call(request).await?;

        if grant.download_url.is_empty() {
            return Err(ClientError::Contract(
                "download grant is missing downloadUrl".to_string(),
            ));
        }
        Ok(grant)
    }

    /// 署名付きURLから成果物を取得する。
    pub async fn download(&self, download_url: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.http.get(download_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: non_empty(message, "download rejected by storage"),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// 3ステップを順に実行する。
    ///
    /// 途中で失敗した場合は、失敗したステップを `ClientError::Step` に載せて
    /// 中断する。アップロード済みのオブジェクトは残り、再試行は行わない。
    pub async fn translate_document(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<PipelineOutput, ClientError> {
        let upload = self
            .request_upload_grant(file_name, content_type)
            .await
            .at(PipelineStep::UploadGrant)?;

        self.upload(&upload, bytes).await.at(PipelineStep::Upload)?;

        let result = self
            .translate(&upload.object_key)
            .await
            .at(PipelineStep::Translate)?;

        let artifact = match (&result.result_key, &result.download_url) {
            (Some(_), Some(url)) => Some(self.download(url).await.at(PipelineStep::Download)?),
            (Some(result_key), None) => {
                let grant = self
                    .request_download_grant(result_key)
                    .await
                    .at(PipelineStep::DownloadGrant)?;
                Some(
                    self.download(&grant.download_url)
                        .await
                        .at(PipelineStep::Download)?,
                )
            }
            (None, _) => None,
        };

        Ok(PipelineOutput {
            upload,
            result,
            artifact,
        })
    }

    /// リクエストを送り、エンベロープを外して `T` として読む。
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let outer = response.status();
        let text = response.text().await?;

        let raw: Value = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(_) if !outer.is_success() => {
                return Err(ClientError::Status {
                    status: outer.as_u16(),
                    message: non_empty(text, "request failed"),
                })
            }
            Err(e) => return Err(ClientError::Contract(format!("response is not JSON: {e}"))),
        };

        let unwrapped = match envelope::unwrap(raw) {
            Ok(unwrapped) => unwrapped,
            Err(_) if !outer.is_success() => {
                return Err(ClientError::Status {
                    status: outer.as_u16(),
                    message: non_empty(text, "request failed"),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if !outer.is_success() || unwrapped.is_error_status() {
            let status = match unwrapped.status {
                Some(inner) if !(200..300).contains(&inner) => inner,
                _ => outer.as_u16(),
            };
            return Err(ClientError::Status {
                status,
                message: error_message(&unwrapped.payload),
            });
        }

        serde_json::from_value(unwrapped.payload)
            .map_err(|e| ClientError::Contract(format!("unexpected response shape: {e}")))
    }
}

/// エラーボディから表示用メッセージを組み立てる。
fn error_message(payload: &Value) -> String {
    match payload.get("message").and_then(Value::as_str) {
        Some(message) => match payload.get("error").and_then(Value::as_str) {
            Some(detail) => format!("{message} ({detail})"),
            None => message.to_string(),
        },
        None => payload.to_string(),
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

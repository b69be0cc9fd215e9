//! クライアントエラー型。

use std::fmt;

use translate_types::envelope::EnvelopeError;

/// パイプラインの各ステップ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    UploadGrant,
    Upload,
    Translate,
    DownloadGrant,
    Download,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::UploadGrant => "upload grant",
            PipelineStep::Upload => "upload",
            PipelineStep::Translate => "translation",
            PipelineStep::DownloadGrant => "download grant",
            PipelineStep::Download => "download",
        };
        f.write_str(name)
    }
}

/// クライアントエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 通信自体の失敗
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// 非2xx（外側のHTTPステータス、またはエンベロープ内の `statusCode`）
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    /// エンベロープの `body` が読めない
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// 2xxだがレスポンスの形が契約と合わない
    #[error("unexpected response: {0}")]
    Contract(String),
    /// パイプラインのどのステップで失敗したか
    #[error("{step} failed: {source}")]
    Step {
        step: PipelineStep,
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// サーバーが返したステータス（`Step` は中身をたどる）。
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Step { source, .. } => source.status(),
            _ => None,
        }
    }

    /// 失敗したステップ。
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            ClientError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// `Result` に失敗ステップを付与する。
pub(crate) trait StepContext<T> {
    fn at(self, step: PipelineStep) -> Result<T, ClientError>;
}

impl<T> StepContext<T> for Result<T, ClientError> {
    fn at(self, step: PipelineStep) -> Result<T, ClientError> {
        self.map_err(|e| ClientError::Step {
            step,
            source: Box::new(e),
        })
    }
}

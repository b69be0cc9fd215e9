//! # レスポンスエンベロープ正規化
//!
//! ルーティング層（API Gatewayの非プロキシ統合など）はハンドラの出力を
//! `{"statusCode": 200, "headers": {...}, "body": "{\"objectKey\":...}"}`
//! のように文字列化したJSONで包んで返すことがある。包まれていない場合も
//! あるため、クライアントは名前付きフィールドを読む前に必ず [`normalize`]
//! を通す。
//!
//! `normalize(wrap(x)) == x`、かつ包まれていない `x` について
//! `normalize(x) == x` が成り立つ。

use serde_json::{Map, Value};

/// 文字列化されたペイロードを持つフィールド名
pub const BODY_FIELD: &str = "body";
/// エンベロープ内のHTTPステータスのフィールド名
pub const STATUS_FIELD: &str = "statusCode";
/// エンベロープ内のヘッダのフィールド名
pub const HEADERS_FIELD: &str = "headers";

/// エンベロープ正規化エラー。
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// `statusCode` 付きエンベロープの `body` がJSONとして読めない
    #[error("envelope body is not valid JSON: {0}")]
    MalformedBody(String),
}

/// エンベロープを外した結果。
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    /// エンベロープ内の `statusCode`（包まれていなければNone）
    pub status: Option<u16>,
    /// ハンドラが返したペイロード
    pub payload: Value,
}

impl Unwrapped {
    /// エンベロープ内ステータスが非2xxかどうか。
    pub fn is_error_status(&self) -> bool {
        self.status.is_some_and(|s| !(200..300).contains(&s))
    }
}

/// エンベロープを検出して外し、内側のステータスも返す。
///
/// - `body` が文字列でJSONとしてパースできる → パース結果を返す
/// - `statusCode` と非文字列の `body` を持つ → `body` をそのまま返す
/// - それ以外 → 入力をそのまま返す
pub fn unwrap(raw: Value) -> Result<Unwrapped, EnvelopeError> {
    let (status, body) = match &raw {
        Value::Object(map) => (status_of(map), map.get(BODY_FIELD).cloned()),
        _ => (None, None),
    };

    match body {
        Some(Value::String(encoded)) => match serde_json::from_str(&encoded) {
            Ok(payload) => Ok(Unwrapped { status, payload }),
            Err(e) if status.is_some() => Err(EnvelopeError::MalformedBody(e.to_string())),
            // 文字列の body を持つだけの通常ペイロード
            Err(_) => Ok(Unwrapped {
                status: None,
                payload: raw,
            }),
        },
        Some(payload) if status.is_some() => Ok(Unwrapped { status, payload }),
        _ => Ok(Unwrapped {
            status: None,
            payload: raw,
        }),
    }
}

/// ペイロードだけが必要な場合の [`unwrap`]。
pub fn normalize(raw: Value) -> Result<Value, EnvelopeError> {
    unwrap(raw).map(|u| u.payload)
}

/// ルーティング層と同じ形でペイロードを包む。
pub fn wrap(status: u16, payload: &Value) -> Value {
    let mut envelope = Map::new();
    envelope.insert(STATUS_FIELD.to_string(), Value::from(status));
    envelope.insert(
        HEADERS_FIELD.to_string(),
        serde_json::json!({
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*",
        }),
    );
    envelope.insert(BODY_FIELD.to_string(), Value::String(payload.to_string()));
    Value::Object(envelope)
}

fn status_of(map: &Map<String, Value>) -> Option<u16> {
    map.get(STATUS_FIELD)
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
}

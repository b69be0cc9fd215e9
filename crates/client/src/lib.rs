//! # 翻訳ゲートウェイ クライアント
//!
//! アップロード許可 → ストレージへの直接PUT → 翻訳ディスパッチ →
//! （ダウンロード許可 → ダウンロード）を順に実行する。
//! 各ステップは前のステップの成功を確認してから始める。
//!
//! Gatewayのレスポンスはルーティング層によって文字列化JSONで包まれて
//! いる場合があるため、全レスポンスを [`translate_types::envelope::unwrap`]
//! で正規化してから読む。外側のHTTPステータスとエンベロープ内の
//! `statusCode` のどちらかが非2xxなら失敗として扱う。

pub mod client;
pub mod error;

pub use client::{PipelineOutput, RouteStyle, TranslateClient};
pub use error::{ClientError, PipelineStep};

//! # POST /translate
//!
//! アップロード済みの原本を翻訳エンジンに渡し、結果を整形して返す。
//!
//! - `dispatch` — 名前空間チェック・エンジン呼び出し・結果整形
//! - `handler` — `?mode=upload|process|download` による多重化

mod dispatch;
mod handler;

#[cfg(test)]
mod tests;

pub use dispatch::{dispatch_translation, shape_result};
pub use handler::{handle_translate, ModeQuery, TranslateMode};

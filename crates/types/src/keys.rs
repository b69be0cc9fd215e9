//! # ストレージキーと名前空間
//!
//! オブジェクトストレージ上のキーは先頭セグメントで2つの名前空間に分かれる。
//! - incoming（既定 `uploads/`）: クライアントがアップロードした原本
//! - result（既定 `translated/`）: 翻訳成果物。ダウンロード許可はここに限られる。

use std::fmt;

use serde::{Deserialize, Serialize};

/// incoming名前空間の既定プレフィックス
pub const DEFAULT_INCOMING_PREFIX: &str = "uploads";
/// result名前空間の既定プレフィックス
pub const DEFAULT_RESULT_PREFIX: &str = "translated";

/// ストレージ上の1オブジェクトを識別する不変のキー。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// キーが `prefix/` 配下にあるかを判定する。
    ///
    /// プレフィックス以降が空のキーや、空・`.`・`..` のセグメントを含むキーは
    /// どの名前空間にも属さないものとして扱う。
    pub fn is_within(&self, prefix: &str) -> bool {
        let Some(rest) = self
            .0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return false;
        };

        !rest.is_empty()
            && rest
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
    }

    /// 最終セグメントの拡張子（小文字化済み）。
    pub fn extension(&self) -> Option<String> {
        let file_name = self.0.rsplit('/').next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// incoming / result 名前空間のプレフィックス組。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespaces {
    /// アップロード原本のプレフィックス（末尾スラッシュなし）
    pub incoming: String,
    /// 翻訳成果物のプレフィックス（末尾スラッシュなし）
    pub result: String,
}

impl Default for KeyNamespaces {
    fn default() -> Self {
        Self::new(DEFAULT_INCOMING_PREFIX, DEFAULT_RESULT_PREFIX)
    }
}

impl KeyNamespaces {
    /// 前後のスラッシュを取り除いてプレフィックスを保持する。
    pub fn new(incoming: &str, result: &str) -> Self {
        Self {
            incoming: incoming.trim_matches('/').to_string(),
            result: result.trim_matches('/').to_string(),
        }
    }

    /// アップロード用キー `<incoming>/<disambiguator>-<file_name>` を導出する。
    ///
    /// `file_name` は [`sanitize_file_name`] 済みであること。
    pub fn upload_key(&self, disambiguator: &str, file_name: &str) -> StorageKey {
        StorageKey(format!("{}/{}-{}", self.incoming, disambiguator, file_name))
    }

    /// 成果物用キー `<result>/<disambiguator>-translated.<extension>` を導出する。
    pub fn result_key(&self, disambiguator: &str, extension: &str) -> StorageKey {
        StorageKey(format!(
            "{}/{}-translated.{}",
            self.result, disambiguator, extension
        ))
    }

    pub fn is_incoming(&self, key: &StorageKey) -> bool {
        key.is_within(&self.incoming)
    }

    pub fn is_result(&self, key: &StorageKey) -> bool {
        key.is_within(&self.result)
    }
}

/// クライアントが送ってきたファイル名からパス部分を取り除く。
///
/// ブラウザによってはフルパスが送られるため最終要素のみを使う。
/// 空・`.`・`..`・制御文字を含む名前は受け付けない。
pub fn sanitize_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return None;
    }
    Some(name)
}

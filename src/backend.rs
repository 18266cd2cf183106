use crate::types::ScamAnalysis;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// 文字起こしバックエンドの共通トレイト
///
/// 音声ファイル1件を渡すと文字起こしテキストを返す。
/// 本番実装は `whisper_api::WhisperClient`、テストではモックを使う。
#[async_trait]
pub trait TranscribeBackend: Send + Sync {
    /// 音声ファイルを文字起こしする
    async fn transcribe_file(&self, path: &Path) -> Result<String>;
}

/// 詐欺分類バックエンドの共通トレイト
///
/// 文字起こしテキストを渡すと構造化された解析結果を返す。
/// 通信失敗・不正なレスポンスはいずれもエラーとして返し、
/// 呼び出し側が解析失敗レコードに変換する。
#[async_trait]
pub trait ClassifyBackend: Send + Sync {
    /// テキストを解析して詐欺判定を返す
    async fn classify(&self, transcript: &str) -> Result<ScamAnalysis>;
}

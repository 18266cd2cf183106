use crate::backend::TranscribeBackend;
use crate::config::WhisperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;

/// OpenAI Whisper API レスポンス
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// OpenAI Whisper API クライアント
///
/// 音声ファイルを multipart でアップロードし、文字起こし
/// テキストを受け取る。バッチ解析用なのでストリーミングは
/// 行わず、1ファイル1リクエストで完結する。
pub struct WhisperClient {
    config: WhisperConfig,
    client: reqwest::Client,
}

impl WhisperClient {
    /// クライアントを生成する
    ///
    /// # Errors
    ///
    /// APIキーが未設定、またはHTTPクライアントの構築に失敗した
    /// 場合にエラーを返す。これは致命的初期化エラーとして扱われ、
    /// 呼び出し側は実行自体を中止する。
    pub fn new(config: &WhisperConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!("Whisper APIキーが設定されていません");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Whisper API HTTPクライアント作成失敗")?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// 拡張子からMIMEタイプを推定
    fn mime_for(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        }
    }

    /// Whisper APIを呼び出して文字起こし
    async fn request_transcription(&self, path: &Path) -> Result<String> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("音声ファイルの読み込みに失敗: {:?}", path))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let part = multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str(Self::mime_for(path))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone());

        if let Some(ref language) = self.config.language {
            form = form.text("language", language.clone());
        }
        if !self.config.initial_prompt.is_empty() {
            // 金融語彙への認識バイアス（誤認識しやすい専門語対策）
            form = form.text("prompt", self.config.initial_prompt.clone());
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .context("Whisper API リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Whisper API エラー: {} - {}", status, error_text);
        }

        let whisper_response: WhisperResponse = response
            .json::<WhisperResponse>()
            .await
            .context("Whisper API レスポンスパース失敗")?;

        Ok(whisper_response.text.trim().to_string())
    }
}

#[async_trait]
impl TranscribeBackend for WhisperClient {
    async fn transcribe_file(&self, path: &Path) -> Result<String> {
        log::debug!("Whisper API: {:?} を文字起こし中", path);
        self.request_transcription(path).await
    }
}

use crate::config::TtsConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 合成音声の想定フォーマット（時長推定に使用）
///
/// 16kHz / 16-bit / モノラル = 32000 バイト/秒
const BYTES_PER_SECOND: f64 = 16000.0 * 2.0;

/// 1件分の合成リクエスト
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// 合成するテキスト
    pub text: String,
    /// 音色ID
    pub voice: u32,
    /// 語速 (おおむね 4..=7)
    pub speed: u32,
    /// 音調 (おおむね 4..=6)
    pub pitch: u32,
    /// 音量
    pub volume: u32,
    /// 音声フォーマット（"wav" 固定）
    pub format: &'static str,
}

/// 合成結果
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizedAudio {
    /// 音声バイト列（WAV）
    pub audio: Vec<u8>,
    /// 推定時長（秒）
    pub duration_estimate: f64,
}

/// TTSサービスのエラー封筒
///
/// このタイプのAPIは正常時に音声バイト列を、エラー時にJSONを
/// 返す。Content-Type がJSONならこの封筒としてパースする。
#[derive(Debug, Deserialize)]
struct TtsErrorEnvelope {
    #[serde(alias = "err_no")]
    code: i64,
    #[serde(alias = "err_msg")]
    message: String,
}

/// 音声合成バックエンドの共通トレイト
///
/// 1リクエスト = 1テキストの同期的な合成。以前の実装にあった
/// コールバック + ポーリング + ロック付き共有マップの構成は、
/// 結果を直接返す単一のフューチャに置き換えている。
#[async_trait]
pub trait SynthesizeBackend: Send + Sync {
    /// テキストを合成して音声バイト列を返す
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio>;
}

/// HTTP TTSクライアント
///
/// 1件あたりの待ち時間はHTTPクライアントのタイムアウト
/// （既定60秒）で打ち切る。タイムアウトや通信エラーは呼び出し側で
/// そのアイテムの失敗として記録され、実行は続行される。
pub struct TtsClient {
    config: TtsConfig,
    client: reqwest::Client,
}

impl TtsClient {
    /// クライアントを生成する
    ///
    /// # Errors
    ///
    /// エンドポイントまたはトークンが未設定の場合にエラーを返す
    /// （致命的初期化エラー）。
    pub fn new(config: &TtsConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            anyhow::bail!("TTSエンドポイントが設定されていません");
        }
        if config.token.is_empty() {
            anyhow::bail!("TTSアクセストークンが設定されていません");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("TTS HTTPクライアント作成失敗")?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// バイト数から時長を推定する
    pub fn estimate_duration_secs(audio_len: usize) -> f64 {
        audio_len as f64 / BYTES_PER_SECOND
    }

    async fn request_synthesis(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(request)
            .send()
            .await
            .context("TTS APIリクエスト失敗")?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .bytes()
            .await
            .context("TTS APIレスポンス本文の取得に失敗")?;

        // 正常時は音声バイト列、エラー時はJSONの封筒が返る
        if content_type.contains("json") {
            return Err(Self::envelope_error(&body));
        }
        if !status.is_success() {
            anyhow::bail!("TTS APIエラー: {}", status);
        }
        if body.is_empty() {
            anyhow::bail!("TTS APIが空の音声を返しました");
        }

        let audio = body.to_vec();
        let duration_estimate = Self::estimate_duration_secs(audio.len());

        Ok(SynthesizedAudio {
            audio,
            duration_estimate,
        })
    }

    /// JSONエラー封筒を anyhow エラーに変換する
    fn envelope_error(body: &[u8]) -> anyhow::Error {
        match serde_json::from_slice::<TtsErrorEnvelope>(body) {
            Ok(envelope) => {
                anyhow::anyhow!("TTS合成エラー: code={} {}", envelope.code, envelope.message)
            }
            Err(_) => anyhow::anyhow!(
                "TTS合成エラー: 不明なJSONレスポンス: {}",
                String::from_utf8_lossy(body)
            ),
        }
    }
}

#[async_trait]
impl SynthesizeBackend for TtsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        log::debug!(
            "TTS合成: voice={} spd={} pit={} ({} 文字)",
            request.voice,
            request.speed,
            request.pitch,
            request.text.chars().count()
        );
        self.request_synthesis(request).await
    }
}

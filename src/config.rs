use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub kws: KwsConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// ディレクトリスキャン設定
///
/// # デフォルト値
///
/// - `audio_dir`: "./call_cases" (解析対象ディレクトリ)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
}

/// Whisper API (音声文字起こし) 設定
///
/// OpenAI互換の audio/transcriptions エンドポイントを想定する。
///
/// # デフォルト値
///
/// - `endpoint`: OpenAI公式エンドポイント
/// - `model`: "whisper-1"
/// - `language`: "ja"
/// - `timeout_seconds`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhisperConfig {
    /// APIキー。空のままだとクライアント生成時にエラーになる
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_whisper_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    /// 言語コード（"ja", "zh" など）。省略可能
    pub language: Option<String>,
    /// 認識を金融語彙に寄せるための初期プロンプト
    #[serde(default = "default_initial_prompt")]
    pub initial_prompt: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 詐欺分類 (チャット補完API) 設定
///
/// OpenAI互換の chat/completions エンドポイントを想定する。
/// base_url を差し替えれば DeepSeek などの互換サービスも使える。
///
/// # デフォルト値
///
/// - `base_url`: "https://api.deepseek.com/v1"
/// - `model`: "deepseek-chat"
/// - `temperature`: 0.0 (分類タスクのため再現性を優先)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// APIキー。空のままだとクライアント生成時にエラーになる
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// TTS (テストデータ生成) 設定
///
/// テキストと音声パラメータを渡すと音声バイト列を返すHTTP
/// エンドポイントを想定する。正常時は音声、エラー時はJSONの
/// エラー封筒が返るタイプのAPI。
///
/// # デフォルト値
///
/// - `voices`: 代表的な音色IDのプール
/// - `speed_min..=speed_max`: 4..=7
/// - `pitch_min..=pitch_max`: 4..=6
/// - `timeout_seconds`: 60 秒 (1件あたりの合成待ち上限)
/// - `pause_ms`: 1000 ms (リクエスト間の待機)
/// - `max_items`: 300 件
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub endpoint: String,
    /// アクセストークン。空のままだとクライアント生成時にエラーになる
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_voices")]
    pub voices: Vec<u32>,
    #[serde(default = "default_speed_min")]
    pub speed_min: u32,
    #[serde(default = "default_speed_max")]
    pub speed_max: u32,
    #[serde(default = "default_pitch_min")]
    pub pitch_min: u32,
    #[serde(default = "default_pitch_max")]
    pub pitch_max: u32,
    #[serde(default = "default_volume")]
    pub volume: u32,
    #[serde(default = "default_tts_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

/// キーワードスポッティング (Porcupine) 設定
///
/// # デフォルト値
///
/// - `sensitivity`: 0.5
/// - `vad_threshold_db`: -40.0 dB (フレームを音声とみなす閾値)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KwsConfig {
    /// Picovoiceのアクセスキー。空のままだとエンジン生成時にエラーになる
    #[serde(default)]
    pub access_key: String,
    /// キーワードモデル (.ppn) のパス。keyword_names と同数・同順
    #[serde(default)]
    pub keyword_paths: Vec<String>,
    /// レポート表示用のキーワード名
    #[serde(default = "default_keyword_names")]
    pub keyword_names: Vec<String>,
    /// 言語パラメータファイル (.pv) のパス。省略時は英語モデル
    pub model_path: Option<String>,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
}

/// VAD (Voice Activity Detection) 設定
///
/// # デフォルト値
///
/// - `threshold_db`: -40.0 dB
/// - `hangover_frames`: 15 フレーム (512サンプル/フレーム @16kHz で約480ms)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VadConfig {
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f32,
    #[serde(default = "default_hangover_frames")]
    pub hangover_frames: u32,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `report_path`: "./scam_report.txt"
/// - `info_file`: "./tts_audio_info.json"
/// - `detection_log`: "./detection_result_with_vad.txt"
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_report_path")]
    pub report_path: String,
    #[serde(default = "default_info_file")]
    pub info_file: String,
    #[serde(default = "default_detection_log")]
    pub detection_log: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_audio_dir() -> String {
    "./call_cases".to_string()
}

fn default_whisper_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_initial_prompt() -> String {
    // 金融・送金・認証コードなどの語彙が出やすい通話である旨のヒント
    "これは金融、振込、送金、認証コード、銀行、口座などの語が含まれる可能性のある通話です。".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_classifier_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_classifier_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.0 // 分類と構造化出力には0温度が最も安定する
}

fn default_voices() -> Vec<u32> {
    // 標準男女声・アナウンサー調・感情音声などの混成プール
    vec![0, 1, 3, 4, 5, 106, 4100, 4176]
}

fn default_speed_min() -> u32 {
    4
}

fn default_speed_max() -> u32 {
    7
}

fn default_pitch_min() -> u32 {
    4
}

fn default_pitch_max() -> u32 {
    6
}

fn default_volume() -> u32 {
    5
}

fn default_tts_timeout_seconds() -> u64 {
    60
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_max_items() -> usize {
    300
}

fn default_keyword_names() -> Vec<String> {
    vec!["認証コード".to_string()]
}

fn default_sensitivity() -> f32 {
    0.5
}

fn default_threshold_db() -> f32 {
    -40.0
}

fn default_hangover_frames() -> u32 {
    15
}

fn default_report_path() -> String {
    "./scam_report.txt".to_string()
}

fn default_info_file() -> String {
    "./tts_audio_info.json".to_string()
}

fn default_detection_log() -> String {
    "./detection_result_with_vad.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            whisper: WhisperConfig::default(),
            classifier: ClassifierConfig::default(),
            tts: TtsConfig::default(),
            kws: KwsConfig::default(),
            vad: VadConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_whisper_endpoint(),
            model: default_whisper_model(),
            language: Some("ja".to_string()),
            initial_prompt: default_initial_prompt(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_classifier_base_url(),
            model: default_classifier_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            voices: default_voices(),
            speed_min: default_speed_min(),
            speed_max: default_speed_max(),
            pitch_min: default_pitch_min(),
            pitch_max: default_pitch_max(),
            volume: default_volume(),
            timeout_seconds: default_tts_timeout_seconds(),
            pause_ms: default_pause_ms(),
            max_items: default_max_items(),
        }
    }
}

impl Default for KwsConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            keyword_paths: Vec::new(),
            keyword_names: default_keyword_names(),
            model_path: None,
            sensitivity: default_sensitivity(),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
            hangover_frames: default_hangover_frames(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
            info_file: default_info_file(),
            detection_log: default_detection_log(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use sagicall::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// デフォルト値を持つ設定ファイルを生成する。
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.whisper.model, "whisper-1");
        assert_eq!(config.whisper.language.as_deref(), Some("ja"));
        assert_eq!(config.classifier.model, "deepseek-chat");
        assert_eq!(config.classifier.temperature, 0.0);
        assert_eq!(config.tts.timeout_seconds, 60);
        assert_eq!(config.tts.max_items, 300);
        assert_eq!(config.vad.threshold_db, -40.0);
        assert_eq!(config.kws.sensitivity, 0.5);
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        // デフォルト設定を書き込み
        Config::write_default(path).unwrap();

        // 読み込み
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.whisper.model, "whisper-1");
        assert_eq!(config.classifier.base_url, "https://api.deepseek.com/v1");
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[scan]
audio_dir = "/data/calls"

[whisper]
api_key = "sk-test"
model = "whisper-1"
language = "zh"
timeout_seconds = 45

[classifier]
api_key = "sk-test2"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
temperature = 0.2

[tts]
endpoint = "https://tts.example.com/v1/synthesize"
token = "tok"
voices = [0, 1]
speed_min = 5
speed_max = 5

[kws]
access_key = "pv-key"
keyword_paths = ["./認証コード_ja.ppn"]
keyword_names = ["認証コード"]
sensitivity = 0.7

[vad]
threshold_db = -30.0
hangover_frames = 8

[output]
report_path = "/tmp/report.txt"
log_level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.scan.audio_dir, "/data/calls");
        assert_eq!(config.whisper.api_key, "sk-test");
        assert_eq!(config.whisper.language.as_deref(), Some("zh"));
        assert_eq!(config.whisper.timeout_seconds, 45);
        assert_eq!(config.classifier.model, "gpt-4o-mini");
        assert_eq!(config.classifier.temperature, 0.2);
        assert_eq!(config.tts.voices, vec![0, 1]);
        assert_eq!(config.tts.speed_min, 5);
        assert_eq!(config.kws.keyword_names, vec!["認証コード"]);
        assert_eq!(config.kws.sensitivity, 0.7);
        assert_eq!(config.vad.threshold_db, -30.0);
        assert_eq!(config.vad.hangover_frames, 8);
        assert_eq!(config.output.report_path, "/tmp/report.txt");
        assert_eq!(config.output.log_level, "debug");
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        // デフォルト設定が返されることを確認
        assert_eq!(config.whisper.model, "whisper-1");
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[classifier]
api_key = "sk-partial"

[tts]
max_items = 50
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        // 指定した値
        assert_eq!(config.classifier.api_key, "sk-partial");
        assert_eq!(config.tts.max_items, 50);

        // デフォルト値
        assert_eq!(config.classifier.model, "deepseek-chat");
        assert_eq!(config.tts.pause_ms, 1000);
        assert_eq!(config.vad.threshold_db, -40.0);
    }
}

//! sagicall - 特殊詐欺電話の音声解析パイプライン
//!
//! このクレートは、通話音声の文字起こしとLLMによる詐欺判定、
//! 評価用テストデータのTTS合成、およびキーワードスポッティングを
//! 行う実験用パイプラインを提供します。
//!
//! # 主な機能
//!
//! - **音声解析** (`sagicall-analyze`): ディレクトリ内の通話音声を
//!   Whisper APIで文字起こしし、チャット補完APIで詐欺判定。
//!   リスクレベル別の総括レポートと性能評価（混同行列・F1など）を出力
//! - **テストデータ生成** (`sagicall-tts`): ラベル付きテキストコーパスから
//!   音色・語速・音調をランダム化した評価用音声を合成
//! - **キーワード検出** (`sagicall-kws`): 合成音声に対してVADゲート付きの
//!   キーワードスポッティングを実行し、検出ログを出力
//!
//! # アーキテクチャ
//!
//! ```text
//! [Audio Files] → [Scanner] → [WhisperClient] → [ScamClassifier]
//!                                                      ↓
//!                                             [AnalysisRecord (×N)]
//!                                                      ↓
//!                                          ┌───────────┴───────────┐
//!                                          │                       │
//!                                      [Report]               [Metrics]
//!
//! [Corpus JSON] → [TtsClient] → [WAV Files] → [FrameVad] → [KeywordEngine]
//!                                                                ↓
//!                                                         [DetectionLog]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use sagicall::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod analyzer;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod kws;
pub mod metrics;
pub mod report;
pub mod scanner;
pub mod tts;
pub mod types;
pub mod vad;
pub mod whisper_api;

use crate::config::KwsConfig;
use crate::types::SampleI16;
use crate::vad::FrameVad;
use anyhow::{Context, Result};
use porcupine::{Porcupine, PorcupineBuilder};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// WAVフォーマット検証エラー
///
/// キーワードエンジンは モノラル / 16-bit / 既定サンプリングレート の
/// PCMしか受け付けない。該当しないファイルはこのエラーで
/// そのファイルだけを打ち切る（フレーム数は0のまま）。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("モノラルではありません (チャンネル数: {0})")]
    NotMono(u16),

    #[error("16-bit PCM ではありません (ビット幅: {0})")]
    Not16Bit(u16),

    #[error("サンプリングレートが {expected} Hz ではありません (実際: {actual} Hz)")]
    SampleRateMismatch { expected: u32, actual: u32 },
}

/// ファイルスキャン時のエラー
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("WAV形式エラー: {0}")]
    Format(#[from] FormatError),

    #[error("WAVファイルの読み込みに失敗: {0}")]
    Wav(#[from] hound::Error),

    #[error("キーワードエンジンの処理に失敗: {0}")]
    Engine(String),
}

/// フレーム集計
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// VADが音声と判定したフレーム数
    pub speech_frames: usize,
    /// 処理した総フレーム数（末尾の端数フレームは含まない）
    pub total_frames: usize,
}

/// 1ファイルのスキャン結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// キーワードを検出（最初の一致で打ち切り）
    Match {
        /// 一致したキーワード名
        keyword: String,
        stats: FrameStats,
    },
    /// 最後までスキャンしたが一致なし
    NoMatch { stats: FrameStats },
}

/// キーワードスポッティングエンジンの共通トレイト
///
/// ベンダーSDKとの接続面。固定長のPCMフレームを渡すと、
/// 検出したキーワードのインデックスを返す。
pub trait KeywordEngine {
    /// 1フレームのサンプル数
    fn frame_length(&self) -> usize;

    /// 要求するサンプリングレート (Hz)
    fn sample_rate(&self) -> u32;

    /// 1フレームを処理し、検出したキーワードのインデックスを返す
    fn process(&mut self, frame: &[SampleI16]) -> Result<Option<usize>>;
}

/// Porcupine によるキーワードスポッティングエンジン
///
/// エンジンのネイティブリソースは `Porcupine` のドロップ時に
/// 解放されるため、エラー経路を含むすべての脱出経路で
/// 解放が保証される。
pub struct PorcupineEngine {
    engine: Porcupine,
}

impl PorcupineEngine {
    /// エンジンを初期化する
    ///
    /// # Errors
    ///
    /// アクセスキー未設定、キーワード定義の不整合、または
    /// ネイティブエンジンの初期化失敗でエラーを返す。
    /// これは致命的初期化エラーであり、呼び出し側は実行全体を
    /// 中止する。
    pub fn new(config: &KwsConfig) -> Result<Self> {
        if config.access_key.is_empty() {
            anyhow::bail!("Porcupineのアクセスキーが設定されていません");
        }
        if config.keyword_paths.is_empty() {
            anyhow::bail!("キーワードモデル (.ppn) が1つも設定されていません");
        }
        if config.keyword_paths.len() != config.keyword_names.len() {
            anyhow::bail!(
                "keyword_paths ({}) と keyword_names ({}) の数が一致しません",
                config.keyword_paths.len(),
                config.keyword_names.len()
            );
        }

        let sensitivities = vec![config.sensitivity; config.keyword_paths.len()];

        let init_result = match config.model_path {
            Some(ref model_path) => PorcupineBuilder::new_with_keyword_paths(
                config.access_key.as_str(),
                &config.keyword_paths,
            )
            .sensitivities(&sensitivities)
            .model_path(model_path)
            .init(),
            None => PorcupineBuilder::new_with_keyword_paths(
                config.access_key.as_str(),
                &config.keyword_paths,
            )
            .sensitivities(&sensitivities)
            .init(),
        };

        let engine = init_result
            .map_err(|e| anyhow::anyhow!("Porcupineエンジンの初期化に失敗: {:?}", e))?;

        log::info!(
            "Porcupineエンジンを初期化 (キーワード: {}, フレーム長: {}, サンプリングレート: {} Hz)",
            config.keyword_names.join(", "),
            engine.frame_length(),
            engine.sample_rate()
        );

        Ok(Self { engine })
    }
}

impl KeywordEngine for PorcupineEngine {
    fn frame_length(&self) -> usize {
        self.engine.frame_length() as usize
    }

    fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    fn process(&mut self, frame: &[SampleI16]) -> Result<Option<usize>> {
        let index = self
            .engine
            .process(frame)
            .map_err(|e| anyhow::anyhow!("Porcupine process失敗: {:?}", e))?;
        if index >= 0 {
            Ok(Some(index as usize))
        } else {
            Ok(None)
        }
    }
}

/// WAVヘッダを検証する
fn validate_format(spec: &hound::WavSpec, expected_sample_rate: u32) -> Result<(), FormatError> {
    if spec.channels != 1 {
        return Err(FormatError::NotMono(spec.channels));
    }
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(FormatError::Not16Bit(spec.bits_per_sample));
    }
    if spec.sample_rate != expected_sample_rate {
        return Err(FormatError::SampleRateMismatch {
            expected: expected_sample_rate,
            actual: spec.sample_rate,
        });
    }
    Ok(())
}

/// WAVファイル1件をスキャンする
///
/// フォーマット検証の後、固定長フレームを順に処理する。
/// 各フレームはまずVADにかけ、音声と判定されたフレームに限り
/// キーワードエンジンへ渡す。最初の一致で打ち切って返す。
/// ファイル末尾のフレーム長に満たない端数は処理しない。
///
/// VADの状態はファイル間で持ち越さない（冒頭でリセットする）。
pub fn scan_wav_file(
    path: &Path,
    engine: &mut dyn KeywordEngine,
    vad: &mut FrameVad,
    keyword_names: &[String],
) -> Result<ScanOutcome, ScanError> {
    let mut reader = hound::WavReader::open(path)?;
    validate_format(&reader.spec(), engine.sample_rate())?;

    vad.reset();

    let frame_length = engine.frame_length();
    let samples: Vec<SampleI16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;

    let mut stats = FrameStats::default();

    for frame in samples.chunks_exact(frame_length) {
        stats.total_frames += 1;

        if !vad.process_frame(frame) {
            continue;
        }
        stats.speech_frames += 1;

        let hit = engine
            .process(frame)
            .map_err(|e| ScanError::Engine(format!("{:#}", e)))?;

        if let Some(index) = hit {
            let keyword = keyword_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("keyword{}", index));
            return Ok(ScanOutcome::Match { keyword, stats });
        }
    }

    Ok(ScanOutcome::NoMatch { stats })
}

/// ディレクトリ名から期待キーワードを決める
///
/// ディレクトリ名に含まれる最初のキーワード名を期待値とする
/// （生成器が「キーワード名入りディレクトリ」を作る規約に対応）。
pub fn expected_keyword_for_dir<'a>(dir_name: &str, keyword_names: &'a [String]) -> Option<&'a str> {
    keyword_names
        .iter()
        .find(|name| dir_name.contains(name.as_str()))
        .map(|s| s.as_str())
}

/// ディレクトリ内のWAVファイルをファイル名昇順で列挙する
pub fn list_wav_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("ディレクトリの読み取りに失敗: {:?}", dir))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// スキャン全体の集計
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScanSummary {
    pub total_files: usize,
    pub correct_detections: usize,
}

impl ScanSummary {
    /// 正解率 (%)。ファイルが0件なら0
    pub fn accuracy_percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.correct_detections as f64 / self.total_files as f64 * 100.0
    }
}

/// 検出結果のテキストログ
///
/// ファイルごとのVAD情報と検出結果を逐次書き込み、最後に
/// 統計ブロックを追記するプレーンテキストのログ。
pub struct DetectionLog {
    writer: BufWriter<File>,
    summary: ScanSummary,
}

impl DetectionLog {
    /// ログファイルを作成してヘッダを書き込む
    pub fn create<P: AsRef<Path>>(
        path: P,
        keyword_names: &[String],
        vad_threshold_db: f32,
    ) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("検出ログの作成に失敗: {:?}", path.as_ref()))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "# キーワード検出ログ (VADゲート付き)")?;
        writeln!(
            writer,
            "# 開始時刻: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(writer, "# 監視キーワード: {}", keyword_names.join(", "))?;
        writeln!(writer, "# VAD閾値: {} dB", vad_threshold_db)?;

        Ok(Self {
            writer,
            summary: ScanSummary::default(),
        })
    }

    /// ディレクトリブロックの見出しを書く
    pub fn begin_dir(&mut self, dir: &Path, expected_keyword: Option<&str>) -> Result<()> {
        writeln!(self.writer)?;
        match expected_keyword {
            Some(keyword) => writeln!(
                self.writer,
                "== スキャン対象: {:?} (期待キーワード: '{}') ==",
                dir, keyword
            )?,
            None => writeln!(self.writer, "== スキャン対象: {:?} (期待キーワードなし) ==", dir)?,
        }
        writeln!(self.writer, "{}", "=".repeat(50))?;
        Ok(())
    }

    /// 1ファイル分の結果を書き込む
    ///
    /// フォーマットエラーや読み込み失敗もログに残し、
    /// フレーム数は0として扱う。
    pub fn record(
        &mut self,
        filename: &str,
        outcome: &Result<ScanOutcome, ScanError>,
        expected_keyword: Option<&str>,
    ) -> Result<()> {
        self.summary.total_files += 1;

        writeln!(self.writer, "ファイル: {}", filename)?;

        match outcome {
            Ok(ScanOutcome::Match { keyword, stats }) => {
                writeln!(
                    self.writer,
                    "  VAD: {} / {} フレームを音声と判定",
                    stats.speech_frames, stats.total_frames
                )?;
                writeln!(self.writer, "  検出結果: 命中 '{}'", keyword)?;
                match expected_keyword {
                    Some(expected) if expected == keyword => {
                        self.summary.correct_detections += 1;
                        writeln!(self.writer, "  評価: 正解")?;
                    }
                    Some(expected) => {
                        writeln!(self.writer, "  評価: 不正解 (期待は '{}')", expected)?;
                    }
                    None => {}
                }
            }
            Ok(ScanOutcome::NoMatch { stats }) => {
                writeln!(
                    self.writer,
                    "  VAD: {} / {} フレームを音声と判定",
                    stats.speech_frames, stats.total_frames
                )?;
                writeln!(self.writer, "  検出結果: 未命中")?;
            }
            Err(e) => {
                writeln!(self.writer, "  VAD: 0 / 0 フレームを音声と判定")?;
                writeln!(self.writer, "  検出結果: エラー ({})", e)?;
            }
        }

        Ok(())
    }

    /// 統計ブロックを書いてログを閉じる
    pub fn finalize(mut self) -> Result<ScanSummary> {
        writeln!(self.writer)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "統計結果:")?;
        writeln!(self.writer, "  総ファイル数: {}", self.summary.total_files)?;
        writeln!(
            self.writer,
            "  正解検出数: {}",
            self.summary.correct_detections
        )?;
        writeln!(
            self.writer,
            "  正解率: {:.2}%",
            self.summary.accuracy_percent()
        )?;
        self.writer.flush().context("検出ログのフラッシュに失敗")?;
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VadConfig;
    use tempfile::TempDir;

    const FRAME_LENGTH: usize = 512;
    const SAMPLE_RATE: u32 = 16000;

    /// マーカーサンプル (30000) を含む音声フレームで命中を返すモック
    struct MockEngine {
        process_calls: usize,
    }

    impl MockEngine {
        fn new() -> Self {
            Self { process_calls: 0 }
        }
    }

    impl KeywordEngine for MockEngine {
        fn frame_length(&self) -> usize {
            FRAME_LENGTH
        }

        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }

        fn process(&mut self, frame: &[SampleI16]) -> Result<Option<usize>> {
            self.process_calls += 1;
            if frame.contains(&30000) {
                Ok(Some(0))
            } else {
                Ok(None)
            }
        }
    }

    fn vad() -> FrameVad {
        FrameVad::new(&VadConfig {
            threshold_db: -40.0,
            hangover_frames: 0,
        })
    }

    fn keyword_names() -> Vec<String> {
        vec!["認証コード".to_string()]
    }

    /// テスト用WAVを書き出す
    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn mono16(sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn voice_frame() -> Vec<i16> {
        (0..FRAME_LENGTH)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .collect()
    }

    fn marker_frame() -> Vec<i16> {
        let mut frame = voice_frame();
        frame[10] = 30000;
        frame
    }

    #[test]
    fn test_wrong_sample_rate_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad_rate.wav");
        write_wav(&path, mono16(8000), &voice_frame());

        let mut engine = MockEngine::new();
        let result = scan_wav_file(&path, &mut engine, &mut vad(), &keyword_names());

        match result {
            Err(ScanError::Format(FormatError::SampleRateMismatch { expected, actual })) => {
                assert_eq!(expected, 16000);
                assert_eq!(actual, 8000);
            }
            other => panic!("SampleRateMismatch を期待したが {:?}", other.err()),
        }
        // フォーマットエラー時はエンジンに一切フレームを渡さない
        assert_eq!(engine.process_calls, 0);
    }

    #[test]
    fn test_stereo_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            ..mono16(SAMPLE_RATE)
        };
        // ステレオなので2チャンネルぶん書く
        let samples: Vec<i16> = voice_frame().iter().flat_map(|&s| [s, s]).collect();
        write_wav(&path, spec, &samples);

        let mut engine = MockEngine::new();
        let result = scan_wav_file(&path, &mut engine, &mut vad(), &keyword_names());
        assert!(matches!(
            result,
            Err(ScanError::Format(FormatError::NotMono(2)))
        ));
    }

    #[test]
    fn test_silence_frames_skip_engine() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gated.wav");

        // 無音2フレーム + 音声1フレーム
        let mut samples = vec![0i16; FRAME_LENGTH * 2];
        samples.extend(voice_frame());
        write_wav(&path, mono16(SAMPLE_RATE), &samples);

        let mut engine = MockEngine::new();
        let result = scan_wav_file(&path, &mut engine, &mut vad(), &keyword_names()).unwrap();

        match result {
            ScanOutcome::NoMatch { stats } => {
                assert_eq!(stats.total_frames, 3);
                assert_eq!(stats.speech_frames, 1);
            }
            other => panic!("NoMatch を期待したが {:?}", other),
        }
        // エンジンは音声フレームにしか呼ばれない
        assert_eq!(engine.process_calls, 1);
    }

    #[test]
    fn test_first_match_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("match.wav");

        // 音声1 + マーカー入り1 + 音声2（マーカー後は処理されない）
        let mut samples = voice_frame();
        samples.extend(marker_frame());
        samples.extend(voice_frame());
        samples.extend(voice_frame());
        write_wav(&path, mono16(SAMPLE_RATE), &samples);

        let mut engine = MockEngine::new();
        let result = scan_wav_file(&path, &mut engine, &mut vad(), &keyword_names()).unwrap();

        match result {
            ScanOutcome::Match { keyword, stats } => {
                assert_eq!(keyword, "認証コード");
                // 一致したフレームまでしかカウントしない
                assert_eq!(stats.total_frames, 2);
                assert_eq!(stats.speech_frames, 2);
            }
            other => panic!("Match を期待したが {:?}", other),
        }
        assert_eq!(engine.process_calls, 2);
    }

    #[test]
    fn test_trailing_partial_frame_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.wav");

        // 1フレーム + 半端な100サンプル
        let mut samples = voice_frame();
        samples.extend(vec![5000i16; 100]);
        write_wav(&path, mono16(SAMPLE_RATE), &samples);

        let mut engine = MockEngine::new();
        let result = scan_wav_file(&path, &mut engine, &mut vad(), &keyword_names()).unwrap();

        match result {
            ScanOutcome::NoMatch { stats } => {
                assert_eq!(stats.total_frames, 1);
            }
            other => panic!("NoMatch を期待したが {:?}", other),
        }
    }

    #[test]
    fn test_expected_keyword_for_dir() {
        let names = vec!["認証コード".to_string(), "振込".to_string()];
        assert_eq!(
            expected_keyword_for_dir("generated_audio_認証コード", &names),
            Some("認証コード")
        );
        assert_eq!(
            expected_keyword_for_dir("tts_振込_v2", &names),
            Some("振込")
        );
        assert_eq!(expected_keyword_for_dir("unrelated_dir", &names), None);
    }

    #[test]
    fn test_list_wav_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::File::create(dir.join("b.wav")).unwrap();
        std::fs::File::create(dir.join("a.WAV")).unwrap();
        std::fs::File::create(dir.join("c.mp3")).unwrap();

        let files = list_wav_files(dir).unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.wav"]);
    }

    #[test]
    fn test_detection_log_summary() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("result.txt");

        let names = keyword_names();
        let mut log = DetectionLog::create(&log_path, &names, -40.0).unwrap();
        log.begin_dir(Path::new("generated_audio_認証コード"), Some("認証コード"))
            .unwrap();

        let hit = Ok(ScanOutcome::Match {
            keyword: "認証コード".to_string(),
            stats: FrameStats {
                speech_frames: 3,
                total_frames: 10,
            },
        });
        let miss = Ok(ScanOutcome::NoMatch {
            stats: FrameStats {
                speech_frames: 0,
                total_frames: 10,
            },
        });
        let error: Result<ScanOutcome, ScanError> = Err(ScanError::Format(
            FormatError::SampleRateMismatch {
                expected: 16000,
                actual: 44100,
            },
        ));

        log.record("hit.wav", &hit, Some("認証コード")).unwrap();
        log.record("miss.wav", &miss, Some("認証コード")).unwrap();
        log.record("bad.wav", &error, Some("認証コード")).unwrap();

        let summary = log.finalize().unwrap();
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.correct_detections, 1);
        assert!((summary.accuracy_percent() - 33.33).abs() < 0.01);

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("命中 '認証コード'"));
        assert!(content.contains("評価: 正解"));
        assert!(content.contains("検出結果: 未命中"));
        assert!(content.contains("サンプリングレートが 16000 Hz ではありません"));
        assert!(content.contains("総ファイル数: 3"));
    }

    #[test]
    fn test_summary_accuracy_with_zero_files() {
        let summary = ScanSummary::default();
        assert_eq!(summary.accuracy_percent(), 0.0);
    }
}

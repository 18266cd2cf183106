use crate::config::VadConfig;
use crate::types::SampleI16;

/// フレーム単位の音声区間検出器
///
/// RMS (Root Mean Square) ベースのシンプルなVAD実装。
/// 固定長フレームごとに音声パワーを評価し、閾値を超えたフレームを
/// 音声と判定する。閾値を下回ってもハングオーバー期間（フレーム数）
/// の間は音声継続とみなし、語中の短い無音で検出が途切れるのを防ぐ。
///
/// # アルゴリズム
///
/// 1. フレーム内の各サンプルを正規化 (-1.0 ~ 1.0)
/// 2. RMS (二乗平均平方根) を計算
/// 3. デシベル (dB) に変換: `20 * log10(rms)`
/// 4. 閾値と比較して音声/無音を判定
/// 5. ハングオーバー機構により急激な変化を抑制
///
/// ファイルをまたいで状態を持ち越してはならないため、
/// ファイルごとに `reset` するか新しいインスタンスを使う。
///
/// # Examples
///
/// ```
/// # use sagicall::vad::FrameVad;
/// # use sagicall::config::VadConfig;
/// let config = VadConfig {
///     threshold_db: -40.0,
///     hangover_frames: 2,
/// };
/// let mut vad = FrameVad::new(&config);
///
/// // 無音フレーム
/// let silence = vec![0i16; 512];
/// assert!(!vad.process_frame(&silence));
///
/// // 音声フレーム
/// let voice: Vec<i16> = (0..512)
///     .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
///     .collect();
/// assert!(vad.process_frame(&voice));
/// ```
pub struct FrameVad {
    /// 音声判定の閾値 (dB)
    threshold_db: f32,

    /// ハングオーバー期間 (フレーム数)
    hangover_frames: u32,

    /// ハングオーバーの残りフレーム数（0なら無音状態）
    hangover_remaining: u32,
}

impl FrameVad {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            threshold_db: config.threshold_db,
            hangover_frames: config.hangover_frames,
            hangover_remaining: 0,
        }
    }

    /// 1フレームを処理して音声フレームかどうかを判定
    ///
    /// # Returns
    /// * `true` - 音声フレーム（ハングオーバー中を含む）
    /// * `false` - 無音フレーム
    pub fn process_frame(&mut self, frame: &[SampleI16]) -> bool {
        if frame.is_empty() {
            return false;
        }

        let db = Self::frame_level_db(frame);

        if db > self.threshold_db {
            if self.hangover_remaining == 0 {
                log::debug!("VAD: 音声開始検出 (RMS: {:.2} dB)", db);
            }
            self.hangover_remaining = self.hangover_frames;
            return true;
        }

        if self.hangover_remaining > 0 {
            self.hangover_remaining -= 1;
            if self.hangover_remaining == 0 {
                log::debug!("VAD: 音声終了検出 (RMS: {:.2} dB)", db);
            }
            return true;
        }

        false
    }

    /// フレームの音声レベルをdBで返す
    ///
    /// 完全な無音 (RMS = 0) は -100.0 dB とする。
    pub fn frame_level_db(frame: &[SampleI16]) -> f32 {
        let rms = Self::calculate_rms(frame);
        if rms <= 0.0 {
            return -100.0;
        }
        20.0 * rms.log10()
    }

    /// RMS (Root Mean Square) を計算
    fn calculate_rms(frame: &[SampleI16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }

        let sum_of_squares: f64 = frame
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();

        let mean_square = sum_of_squares / frame.len() as f64;
        mean_square.sqrt() as f32
    }

    /// 状態を初期化する（次のファイルの処理前に呼ぶ）
    pub fn reset(&mut self) {
        self.hangover_remaining = 0;
    }

    /// 音声区間中かどうか
    pub fn is_voice(&self) -> bool {
        self.hangover_remaining > 0
    }
}

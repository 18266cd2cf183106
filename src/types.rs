use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 解析対象の音声ファイル
///
/// ディレクトリスキャン時に生成される。生成後は変更されない。
///
/// # Examples
///
/// ```
/// # use sagicall::types::AudioItem;
/// # use std::path::PathBuf;
/// let item = AudioItem {
///     filename: "scam_001_voice0_spd5_pit5.wav".to_string(),
///     path: PathBuf::from("/data/calls/scam_001_voice0_spd5_pit5.wav"),
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioItem {
    /// ファイル名（拡張子込み）
    pub filename: String,

    /// 絶対パス
    pub path: PathBuf,
}

/// 合法性チェックの結果
///
/// 詐欺判定の前段として、通話が正規の業務連絡に見られる特徴を
/// 持つかどうかを3項目で評価する。JSONのキー名はLLMとの
/// ワイヤ契約なので変更してはならない。
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct LegitimacyChecks {
    /// 公式チャネル（公式アプリ・窓口など）への誘導があるか
    pub official_channel_guidance: bool,

    /// 無害な操作であることの明言（費用なし・返金は元経路など）があるか
    pub harmless_action_statement: bool,

    /// 情報の同期・通知が主目的で、機密情報の聞き出しがないか
    pub is_information_sync: bool,
}

impl LegitimacyChecks {
    /// 3項目すべてが不成立かどうか
    pub fn all_negative(&self) -> bool {
        !self.official_channel_guidance
            && !self.harmless_action_statement
            && !self.is_information_sync
    }
}

/// リスクレベル
///
/// LLMの出力で許容される値は4種類のみ。これ以外の文字列は
/// デシリアライズエラーとして扱い、レコードを解析失敗にする。
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// 高リスク
    High,
    /// 中リスク
    Medium,
    /// 低リスク
    Low,
    /// リスクなし
    None,
}

impl RiskLevel {
    /// レポート表示用のラベル
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::High => "高リスク",
            RiskLevel::Medium => "中リスク",
            RiskLevel::Low => "低リスク",
            RiskLevel::None => "リスクなし",
        }
    }
}

/// 最終評価
///
/// `scam_type` は指示テンプレートが例示のみ与える自由記述のため
/// 文字列のまま保持する。`risk_level` は閉集合で検証される。
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Assessment {
    /// 詐欺と判定したか
    pub is_scam: bool,

    /// リスクレベル
    pub risk_level: RiskLevel,

    /// 詐欺の類型（「還付金詐欺」「カスタマーサポート詐称」など）
    pub scam_type: String,

    /// 判定理由。合法性チェックの結果に言及することが契約上要求される
    pub reasoning: String,
}

/// LLMが返す構造化解析結果
///
/// 合法性チェックを先に評価し、その後に最終評価を行う
/// 2段ゲート構造。この構造のJSONをそのままパースする。
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScamAnalysis {
    /// 合法性チェック
    pub legitimacy_checks: LegitimacyChecks,

    /// 最終評価
    pub final_assessment: Assessment,
}

/// 1ファイル分の解析の帰結
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisOutcome {
    /// LLM解析が完了した
    Analyzed(ScamAnalysis),

    /// 文字起こしまたはLLM解析に失敗した
    ///
    /// 失敗してもレコード自体は集計に残る。リトライは行わない。
    Failed {
        /// 失敗理由（ログおよびレポートに表示）
        reason: String,
    },
}

/// 解析レコード
///
/// AudioItem 1件につき必ず1件生成される。生成後は変更されず、
/// スキャン順のまま集計・レポートに渡される。
#[derive(Clone, Debug)]
pub struct AnalysisRecord {
    /// 対象ファイル
    pub item: AudioItem,

    /// 文字起こし結果（失敗時は空文字列のことがある）
    pub transcription: String,

    /// 解析の帰結
    pub outcome: AnalysisOutcome,
}

impl AnalysisRecord {
    /// 詐欺と予測されたかどうか
    ///
    /// 解析失敗レコードは「詐欺でない」と同じ扱いになる。
    pub fn is_predicted_scam(&self) -> bool {
        match &self.outcome {
            AnalysisOutcome::Analyzed(analysis) => analysis.final_assessment.is_scam,
            AnalysisOutcome::Failed { .. } => false,
        }
    }

    /// 解析失敗レコードを生成するヘルパ
    pub fn failed(item: AudioItem, transcription: String, reason: impl Into<String>) -> Self {
        Self {
            item,
            transcription,
            outcome: AnalysisOutcome::Failed {
                reason: reason.into(),
            },
        }
    }
}

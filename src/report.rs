use crate::types::{AnalysisOutcome, AnalysisRecord, RiskLevel};
use std::fmt::Write;

/// 分析失敗バケットの表示ラベル
const FAILED_LABEL: &str = "分析失敗";

/// レポートのバケット（リスクレベル4種 + 分析失敗）
///
/// バケットの並び順は固定で、各バケット内は入力順を保つ。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Risk(RiskLevel),
    Failed,
}

impl Bucket {
    fn label(&self) -> &'static str {
        match self {
            Bucket::Risk(level) => level.label(),
            Bucket::Failed => FAILED_LABEL,
        }
    }
}

/// レコードが属するバケットを決める
fn bucket_for(record: &AnalysisRecord) -> Bucket {
    match &record.outcome {
        AnalysisOutcome::Analyzed(analysis) => Bucket::Risk(analysis.final_assessment.risk_level),
        AnalysisOutcome::Failed { .. } => Bucket::Failed,
    }
}

/// 総括レポートを描画する
///
/// レコード列を5つの固定バケット（高/中/低/リスクなし/分析失敗）に
/// 振り分け、バケットごとに1ブロックずつ描画する。同じ入力列に
/// 対しては常に同じ文字列を返す（タイムスタンプ等は含めない）。
pub fn render_summary_report(records: &[AnalysisRecord]) -> String {
    let buckets = [
        Bucket::Risk(RiskLevel::High),
        Bucket::Risk(RiskLevel::Medium),
        Bucket::Risk(RiskLevel::Low),
        Bucket::Risk(RiskLevel::None),
        Bucket::Failed,
    ];

    let mut out = String::new();
    let line = "=".repeat(80);
    let separator = "-".repeat(80);

    writeln!(out, "{}", line).ok();
    writeln!(out, "           LLM 特殊詐欺分析 総括レポート").ok();
    writeln!(out, "{}", line).ok();
    writeln!(out, "合計 {} 件の音声ファイルを解析した。", records.len()).ok();

    for bucket in buckets {
        let members: Vec<&AnalysisRecord> = records
            .iter()
            .filter(|r| bucket_for(r) == bucket)
            .collect();
        if members.is_empty() {
            continue;
        }

        writeln!(out).ok();
        writeln!(out, "【{}】 ({}件)", bucket.label(), members.len()).ok();

        for record in members {
            writeln!(out).ok();
            writeln!(out, "  ファイル名: {}", record.item.filename).ok();
            writeln!(out, "    文字起こし: \"{}\"", record.transcription).ok();

            match &record.outcome {
                AnalysisOutcome::Analyzed(analysis) => {
                    let checks = &analysis.legitimacy_checks;
                    let assessment = &analysis.final_assessment;
                    writeln!(out, "    合法性チェック:").ok();
                    writeln!(
                        out,
                        "      - 公式チャネルへの誘導: {}",
                        checks.official_channel_guidance
                    )
                    .ok();
                    writeln!(
                        out,
                        "      - 無害な操作の明言:     {}",
                        checks.harmless_action_statement
                    )
                    .ok();
                    writeln!(
                        out,
                        "      - 情報同期が主目的:     {}",
                        checks.is_information_sync
                    )
                    .ok();
                    writeln!(out, "    最終評価:").ok();
                    writeln!(out, "      - 詐欺類型: {}", assessment.scam_type).ok();
                    writeln!(out, "      - 判定理由: {}", assessment.reasoning).ok();
                }
                AnalysisOutcome::Failed { reason } => {
                    writeln!(out, "    [分析失敗] {}", reason).ok();
                }
            }
        }
        writeln!(out, "{}", separator).ok();
    }

    writeln!(out).ok();
    writeln!(out, "レポート終了。").ok();
    out
}

use crate::types::AnalysisRecord;
use std::fmt::Write;

/// 正解ラベル（アイテムごとの「真に詐欺か」）
///
/// 以前の実装は「スキャン順の先頭K件が詐欺」という位置依存の
/// 規約だけを持っていたが、入力順が変わると黙って評価が壊れる。
/// そのため正解はアイテムごとの明示的なラベル列として持ち、
/// 位置規約は互換用のコンストラクタの1つに格下げしている。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroundTruth {
    labels: Vec<bool>,
}

impl GroundTruth {
    /// 明示的なラベル列から生成
    pub fn new(labels: Vec<bool>) -> Self {
        Self { labels }
    }

    /// 「先頭K件が詐欺」という位置規約から生成（互換用）
    ///
    /// K が総数を超える場合は総数に丸めて警告を出す。
    pub fn leading_scams(scam_count: usize, total: usize) -> Self {
        if scam_count > total {
            log::warn!(
                "詐欺サンプル数 {} が総数 {} を超えています。総数に丸めます",
                scam_count,
                total
            );
        }
        let k = scam_count.min(total);
        let labels = (0..total).map(|i| i < k).collect();
        Self { labels }
    }

    /// ラベル入りファイル名から生成
    ///
    /// TTS生成器が出力する `"{label}_{id}_..."` 形式のファイル名を
    /// 前提に、先頭セグメントをラベルとして読む。`scam`/`1` が
    /// 陽性、`normal`/`0` が陰性。1件でもラベルを読めないファイルが
    /// あれば評価不能として None を返す。
    pub fn from_filenames<I, S>(filenames: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels = Vec::new();
        for name in filenames {
            let name = name.as_ref();
            let prefix = name.split_once('_').map(|(p, _)| p)?;
            let label = match prefix {
                "scam" | "1" => true,
                "normal" | "0" => false,
                _ => return None,
            };
            labels.push(label);
        }
        Some(Self { labels })
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 陽性（詐欺）ラベルの数
    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }
}

/// 混同行列のカウント
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    /// 検出成功（真に詐欺で、詐欺と予測）
    pub true_positive: usize,
    /// 誤報（正常なのに詐欺と予測）
    pub false_positive: usize,
    /// 正常判定成功
    pub true_negative: usize,
    /// 見逃し（詐欺なのに正常と予測）
    pub false_negative: usize,
}

impl ConfusionCounts {
    /// 正解ラベルと予測の突き合わせ
    ///
    /// 両者は同じ長さ・同じ順序であること。長さが食い違う場合は
    /// 短い方までで打ち切り、警告を出す（黙って壊れるよりまし）。
    pub fn tally(truth: &[bool], predicted: &[bool]) -> Self {
        if truth.len() != predicted.len() {
            log::warn!(
                "正解ラベル数 {} と予測数 {} が一致しません",
                truth.len(),
                predicted.len()
            );
        }

        let mut counts = ConfusionCounts::default();
        for (&is_true_scam, &is_predicted_scam) in truth.iter().zip(predicted.iter()) {
            match (is_true_scam, is_predicted_scam) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        counts
    }

    /// 4カウントの合計（= 評価対象アイテム数）
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// 主要性能指標
///
/// ゼロ除算になるケース（分母0）はすべて 0.0 と定義する。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl PerformanceMetrics {
    pub fn from_counts(counts: &ConfusionCounts) -> Self {
        let total = counts.total();
        let tp = counts.true_positive as f64;
        let fp = counts.false_positive as f64;
        let tn = counts.true_negative as f64;
        let fn_ = counts.false_negative as f64;

        let accuracy = if total > 0 {
            (tp + tn) / total as f64
        } else {
            0.0
        };
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
        }
    }
}

/// レコード列から予測ベクタを取り出す
///
/// 解析失敗レコードは「詐欺でない」と同じ予測として扱う。
pub fn predictions(records: &[AnalysisRecord]) -> Vec<bool> {
    records.iter().map(|r| r.is_predicted_scam()).collect()
}

/// 性能評価ブロックを描画する
pub fn render_metrics_report(truth: &GroundTruth, counts: &ConfusionCounts) -> String {
    let metrics = PerformanceMetrics::from_counts(counts);
    let total = truth.len();
    let positives = truth.positive_count();

    let mut out = String::new();
    let line = "=".repeat(80);
    let separator = "-".repeat(40);

    writeln!(out, "{}", line).ok();
    writeln!(out, "                 モデル性能評価").ok();
    writeln!(out, "{}", line).ok();
    writeln!(out, "テストセット情報:").ok();
    writeln!(out, "  - 総サンプル数: {}", total).ok();
    writeln!(out, "  - 真の詐欺サンプル数 (Positive): {}", positives).ok();
    writeln!(out, "  - 真の正常サンプル数 (Negative): {}", total - positives).ok();
    writeln!(out, "{}", separator).ok();
    writeln!(out, "混同行列 (Confusion Matrix):").ok();
    writeln!(out, "  - 検出成功 (TP): {}", counts.true_positive).ok();
    writeln!(out, "  - 誤報     (FP): {}", counts.false_positive).ok();
    writeln!(out, "  - 正常判定 (TN): {}", counts.true_negative).ok();
    writeln!(out, "  - 見逃し   (FN): {}", counts.false_negative).ok();
    writeln!(out, "{}", separator).ok();
    writeln!(out, "主要性能指標:").ok();
    writeln!(out, "  - 正解率  (Accuracy):  {:.2}%", metrics.accuracy * 100.0).ok();
    writeln!(out, "  - 適合率  (Precision): {:.2}%", metrics.precision * 100.0).ok();
    writeln!(out, "  - 再現率  (Recall):    {:.2}%", metrics.recall * 100.0).ok();
    writeln!(out, "  - F1スコア (F1-Score): {:.2}", metrics.f1_score).ok();
    writeln!(out, "{}", line).ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_example_k2() {
        // 先頭2件が真の詐欺、予測が [true, false, true, false] のとき
        // TP=1 (index0), FN=1 (index1), FP=1 (index2), TN=1 (index3)
        let truth = GroundTruth::leading_scams(2, 4);
        let predicted = vec![true, false, true, false];

        let counts = ConfusionCounts::tally(truth.labels(), &predicted);
        assert_eq!(counts.true_positive, 1);
        assert_eq!(counts.false_negative, 1);
        assert_eq!(counts.false_positive, 1);
        assert_eq!(counts.true_negative, 1);
    }

    #[test]
    fn test_counts_sum_to_total_for_any_k() {
        let total = 7;
        let predicted: Vec<bool> = (0..total).map(|i| i % 3 == 0).collect();

        for k in 0..=total {
            let truth = GroundTruth::leading_scams(k, total);
            let counts = ConfusionCounts::tally(truth.labels(), &predicted);
            assert_eq!(counts.total(), total, "K={} で合計が総数と不一致", k);
        }
    }

    #[test]
    fn test_empty_input_yields_zero_metrics() {
        let truth = GroundTruth::leading_scams(0, 0);
        let counts = ConfusionCounts::tally(truth.labels(), &[]);
        let metrics = PerformanceMetrics::from_counts(&counts);

        // ゼロ除算エラーにならず、すべて0
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
    }

    #[test]
    fn test_zero_division_guards() {
        // 予測がすべて false → precision の分母が0
        let truth = GroundTruth::leading_scams(2, 4);
        let predicted = vec![false, false, false, false];
        let counts = ConfusionCounts::tally(truth.labels(), &predicted);
        let metrics = PerformanceMetrics::from_counts(&counts);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
        assert_eq!(metrics.accuracy, 0.5); // TN=2

        // 陽性サンプルなし → recall の分母が0
        let truth = GroundTruth::leading_scams(0, 3);
        let predicted = vec![false, true, false];
        let counts = ConfusionCounts::tally(truth.labels(), &predicted);
        let metrics = PerformanceMetrics::from_counts(&counts);
        assert_eq!(metrics.recall, 0.0);
    }

    #[test]
    fn test_perfect_prediction() {
        let truth = GroundTruth::leading_scams(2, 4);
        let predicted = vec![true, true, false, false];
        let counts = ConfusionCounts::tally(truth.labels(), &predicted);
        let metrics = PerformanceMetrics::from_counts(&counts);

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert!((metrics.f1_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_leading_scams_clamps_k() {
        let truth = GroundTruth::leading_scams(10, 3);
        assert_eq!(truth.labels(), &[true, true, true]);
        assert_eq!(truth.positive_count(), 3);
    }

    #[test]
    fn test_from_filenames() {
        let names = vec![
            "scam_001_voice0_spd5_pit5.wav",
            "normal_002_voice1_spd4_pit6.wav",
            "1_003_voice3_spd6_pit4.wav",
            "0_004_voice5_spd7_pit5.wav",
        ];
        let truth = GroundTruth::from_filenames(&names).unwrap();
        assert_eq!(truth.labels(), &[true, false, true, false]);

        // ラベルを読めないファイルが混ざると評価不能
        let bad = vec!["scam_001.wav", "recording.wav"];
        assert!(GroundTruth::from_filenames(&bad).is_none());

        let unknown_label = vec!["maybe_001.wav"];
        assert!(GroundTruth::from_filenames(&unknown_label).is_none());
    }

    #[test]
    fn test_render_metrics_report() {
        let truth = GroundTruth::leading_scams(2, 4);
        let predicted = vec![true, false, true, false];
        let counts = ConfusionCounts::tally(truth.labels(), &predicted);

        let report = render_metrics_report(&truth, &counts);
        assert!(report.contains("総サンプル数: 4"));
        assert!(report.contains("検出成功 (TP): 1"));
        assert!(report.contains("見逃し   (FN): 1"));
        assert!(report.contains("正解率  (Accuracy):  50.00%"));
    }
}

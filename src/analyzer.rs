use crate::backend::{ClassifyBackend, TranscribeBackend};
use crate::types::{AnalysisOutcome, AnalysisRecord, AudioItem};

/// ディレクトリスキャン結果を順番に解析する
///
/// 1件ずつ「文字起こし → LLM解析」を完了させてから次へ進む
/// 逐次パイプライン。個々の失敗（通信エラー、不正なレスポンス、
/// 空の文字起こし）はその場でログに残し、解析失敗レコードに
/// 変換して処理を続行する。リトライは行わない。
///
/// # 不変条件
///
/// 戻り値のレコード数は常に入力アイテム数と一致する。
/// 失敗したファイルも黙って落とさず、失敗レコードとして残る。
pub async fn analyze_directory(
    items: Vec<AudioItem>,
    transcriber: &dyn TranscribeBackend,
    classifier: &dyn ClassifyBackend,
) -> Vec<AnalysisRecord> {
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        log::info!("-> 処理中: {}", item.filename);
        records.push(analyze_item(item, transcriber, classifier).await);
    }

    records
}

/// 1ファイル分の解析
async fn analyze_item(
    item: AudioItem,
    transcriber: &dyn TranscribeBackend,
    classifier: &dyn ClassifyBackend,
) -> AnalysisRecord {
    let transcription = match transcriber.transcribe_file(&item.path).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("{}: 文字起こし失敗: {:#}", item.filename, e);
            return AnalysisRecord::failed(item, String::new(), format!("文字起こし失敗: {:#}", e));
        }
    };

    if transcription.is_empty() {
        log::warn!("{}: 文字起こし結果が空", item.filename);
        return AnalysisRecord::failed(item, transcription, "文字起こし結果が空");
    }

    log::info!("   文字起こし: \"{}\"", transcription);

    match classifier.classify(&transcription).await {
        Ok(analysis) => {
            log::info!(
                "   [LLM判定] リスク: {}, 類型: {}",
                analysis.final_assessment.risk_level.label(),
                analysis.final_assessment.scam_type
            );
            AnalysisRecord {
                item,
                transcription,
                outcome: AnalysisOutcome::Analyzed(analysis),
            }
        }
        Err(e) => {
            log::error!("{}: LLM解析失敗: {:#}", item.filename, e);
            AnalysisRecord::failed(item, transcription, format!("LLM解析失敗: {:#}", e))
        }
    }
}

use crate::config::TtsConfig;
use crate::tts::{SynthesisRequest, SynthesizeBackend};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// ラベル付きテキストコーパスの1エントリ
///
/// JSON配列として読み込む。`label` はそのまま出力ファイル名の
/// 先頭セグメントになり、後段の評価 (`metrics::GroundTruth`)
/// が正解ラベルとして読む。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CorpusEntry {
    pub id: u64,
    pub text: String,
    /// "scam" / "normal"（または "1" / "0"）
    pub label: String,
}

/// 1件分の合成メタデータ（情報ファイルに書き出すJSONの要素）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SynthesisRecord {
    pub id: u64,
    pub label: String,
    pub filename: String,
    pub path: String,
    pub voice: u32,
    pub speed: u32,
    pub pitch: u32,
    pub duration_secs: f64,
    pub file_size: usize,
}

/// コーパスファイル (JSON配列) を読み込む
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<CorpusEntry>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("コーパスファイルの読み込みに失敗: {:?}", path.as_ref()))?;
    let entries: Vec<CorpusEntry> =
        serde_json::from_str(&content).with_context(|| "コーパスファイルのパースに失敗")?;
    Ok(entries)
}

/// 出力ファイル名を組み立てる
///
/// `"{label}_{id}_voice{v}_spd{s}_pit{p}.wav"` 形式。ラベルと合成
/// パラメータをファイル名に埋め込み、後からの追跡と評価を可能にする。
pub fn output_filename(entry: &CorpusEntry, voice: u32, speed: u32, pitch: u32) -> String {
    format!(
        "{}_{}_voice{}_spd{}_pit{}.wav",
        entry.label, entry.id, voice, speed, pitch
    )
}

/// コーパス全体を合成する
///
/// 1件ずつ「パラメータ決定 → 合成 → 書き出し」を行う逐次処理。
/// 既存ファイルはスキップし、個々の失敗はログに残して続行する。
/// リクエスト間には `pause_ms` の待機を入れてサービス側の
/// レート制限を避ける。
///
/// # Errors
///
/// 出力ディレクトリを作成できない、または音色プールが空の場合に
/// エラーを返す。個々のアイテムの合成失敗はエラーにしない。
pub async fn synthesize_corpus(
    entries: &[CorpusEntry],
    backend: &dyn SynthesizeBackend,
    config: &TtsConfig,
    output_dir: &Path,
) -> Result<Vec<SynthesisRecord>> {
    if config.voices.is_empty() {
        anyhow::bail!("音色プールが空です");
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", output_dir))?;

    let total = entries.len().min(config.max_items);
    if entries.len() > config.max_items {
        log::info!(
            "コーパス {} 件のうち先頭 {} 件のみ処理します",
            entries.len(),
            config.max_items
        );
    }

    let mut records = Vec::new();

    for (i, entry) in entries.iter().take(total).enumerate() {
        log::info!("進捗: {}/{}", i + 1, total);

        // 乱数ハンドルは await をまたいで保持しない
        let (voice, speed, pitch) = {
            let mut rng = rand::thread_rng();
            let voice = *config
                .voices
                .choose(&mut rng)
                .unwrap_or(&config.voices[0]);
            let speed = rng.gen_range(config.speed_min..=config.speed_max);
            let pitch = rng.gen_range(config.pitch_min..=config.pitch_max);
            (voice, speed, pitch)
        };

        let filename = output_filename(entry, voice, speed, pitch);
        let path = output_dir.join(&filename);

        if path.exists() {
            log::info!("{} は既に存在するためスキップ", filename);
            continue;
        }

        let request = SynthesisRequest {
            text: entry.text.clone(),
            voice,
            speed,
            pitch,
            volume: config.volume,
            format: "wav",
        };

        match backend.synthesize(&request).await {
            Ok(synthesized) => {
                if let Err(e) = fs::write(&path, &synthesized.audio) {
                    log::error!("{} の書き出しに失敗: {:#}", filename, e);
                } else {
                    log::info!(
                        "{} を生成 ({:.1}秒, {:.1}KB)",
                        filename,
                        synthesized.duration_estimate,
                        synthesized.audio.len() as f64 / 1024.0
                    );
                    records.push(SynthesisRecord {
                        id: entry.id,
                        label: entry.label.clone(),
                        filename,
                        path: path.display().to_string(),
                        voice,
                        speed,
                        pitch,
                        duration_secs: synthesized.duration_estimate,
                        file_size: synthesized.audio.len(),
                    });
                }
            }
            Err(e) => {
                log::error!("ID {} の合成に失敗: {:#}", entry.id, e);
            }
        }

        // リクエスト間の待機（最後の1件の後は待たない）
        if config.pause_ms > 0 && i + 1 < total {
            tokio::time::sleep(std::time::Duration::from_millis(config.pause_ms)).await;
        }
    }

    Ok(records)
}

/// 合成メタデータをJSON配列としてファイルに書き出す
pub fn write_info_file<P: AsRef<Path>>(records: &[SynthesisRecord], path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(records)
        .context("合成メタデータのシリアライズに失敗")?;
    fs::write(path.as_ref(), content)
        .with_context(|| format!("情報ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
    log::info!("合成メタデータを保存: {:?}", path.as_ref());
    Ok(())
}

use crate::types::AudioItem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 解析対象として受け付ける拡張子（小文字比較）
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "m4a", "flac", "ogg"];

/// ディレクトリ内のサポート対象音声ファイルを列挙する
///
/// ファイル名の昇順でソートした `AudioItem` の列を返す。
/// 後段の集計・評価はこのスキャン順を前提にしているため、
/// 順序は決定的でなければならない。
///
/// # Errors
///
/// ディレクトリが存在しない、または読み取れない場合にエラーを返す。
/// 音声ファイルが1件もない場合はエラーではなく空の列を返す。
pub fn scan_audio_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<AudioItem>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("音声ディレクトリの読み取りに失敗: {:?}", dir))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("ディレクトリエントリの取得に失敗: {:?}", dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !is_supported(&path) {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                // 非UTF-8ファイル名はレポートに載せられないためスキップ
                log::warn!("UTF-8でないファイル名をスキップ: {:?}", path);
                continue;
            }
        };

        items.push(AudioItem { filename, path });
    }

    items.sort_by(|a, b| a.filename.cmp(&b.filename));

    log::info!("{:?} から {} 件の音声ファイルを検出", dir, items.len());
    Ok(items)
}

/// 拡張子がサポート対象かどうか
fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

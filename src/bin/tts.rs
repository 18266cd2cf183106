use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use sagicall::config::Config;
use sagicall::corpus::{load_corpus, synthesize_corpus, write_info_file};
use sagicall::tts::TtsClient;
use std::path::PathBuf;

/// ラベル付きテキストコーパスから評価用音声を合成する
#[derive(Parser, Debug)]
#[command(name = "sagicall-tts")]
#[command(about = "ラベル付きコーパス (JSON) からTTSで評価用音声を生成する")]
struct Args {
    /// ラベル付きテキストコーパス (JSON配列: {id, text, label})
    corpus_file: PathBuf,

    /// 音声の出力ディレクトリ
    #[arg(short = 'o', long, default_value = "./generated_audio")]
    output_dir: PathBuf,

    /// 合成メタデータJSONの出力先（省略時は設定ファイルの値）
    #[arg(long)]
    info_file: Option<PathBuf>,

    /// 音色IDを1つに固定する（省略時は設定のプールからランダム）
    #[arg(long)]
    voice: Option<u32>,

    /// デバッグログを有効にする
    #[arg(long)]
    debug: bool,

    /// 設定ファイルのパス
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// デフォルト設定ファイルを生成して終了
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ロガーを初期化（--debug でデバッグログを有効化）
    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    // 設定ファイル生成モード
    if args.generate_config {
        Config::write_default(&args.config)?;
        println!("設定ファイルを生成しました: {:?}", args.config);
        return Ok(());
    }

    let config = Config::load_or_default(&args.config)?;

    log::info!("sagicall-tts を起動します");
    log::info!("コーパス: {:?}", args.corpus_file);
    log::info!("出力ディレクトリ: {:?}", args.output_dir);

    // 音色固定オプション
    let mut tts_config = config.tts.clone();
    if let Some(voice) = args.voice {
        log::info!("音色を {} に固定します", voice);
        tts_config.voices = vec![voice];
    }

    // クライアントの構築（失敗したら実行全体を中止）
    let client = TtsClient::new(&tts_config).context("TTSクライアントの初期化に失敗")?;

    let entries = load_corpus(&args.corpus_file)?;
    log::info!("コーパスを読み込み: {} 件", entries.len());

    let start = std::time::Instant::now();
    let records = synthesize_corpus(&entries, &client, &tts_config, &args.output_dir).await?;

    let info_path = args
        .info_file
        .unwrap_or_else(|| PathBuf::from(&config.output.info_file));
    write_info_file(&records, &info_path)?;

    // 生成統計
    if records.is_empty() {
        log::warn!("1件も音声を生成できませんでした");
    } else {
        let total_duration: f64 = records.iter().map(|r| r.duration_secs).sum();
        let total_size: usize = records.iter().map(|r| r.file_size).sum();
        log::info!(
            "生成完了: {} 件 (総時長 {:.1} 秒, 平均 {:.1} 秒, 合計 {:.1} MB)",
            records.len(),
            total_duration,
            total_duration / records.len() as f64,
            total_size as f64 / 1024.0 / 1024.0
        );
    }

    log::info!("総所要時間: {:.2} 秒", start.elapsed().as_secs_f64());

    Ok(())
}

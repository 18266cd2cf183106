use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use sagicall::config::Config;
use sagicall::kws::{
    expected_keyword_for_dir, list_wav_files, scan_wav_file, DetectionLog, PorcupineEngine,
};
use sagicall::vad::FrameVad;
use std::path::PathBuf;

/// 合成音声ディレクトリに対してVADゲート付きキーワード検出を実行する
#[derive(Parser, Debug)]
#[command(name = "sagicall-kws")]
#[command(about = "WAVディレクトリをVADゲート付きでキーワードスキャンし、検出ログを出力する")]
struct Args {
    /// スキャン対象のWAVディレクトリ（複数指定可）
    #[arg(required = true)]
    wav_dirs: Vec<PathBuf>,

    /// 検出ログの出力先（省略時は設定ファイルの値）
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// 設定ファイルのパス
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// デフォルト設定ファイルを生成して終了
    #[arg(long)]
    generate_config: bool,
}

fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    // 設定ファイル生成モード
    if args.generate_config {
        Config::write_default(&args.config)?;
        println!("設定ファイルを生成しました: {:?}", args.config);
        return Ok(());
    }

    let config = Config::load_or_default(&args.config)?;

    log::info!("sagicall-kws を起動します");

    // エンジンの初期化（失敗したら実行全体を中止）。
    // ネイティブリソースはドロップ時に解放される。
    let mut engine = PorcupineEngine::new(&config.kws).context("キーワードエンジンの初期化に失敗")?;
    let mut vad = FrameVad::new(&config.vad);

    let log_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.detection_log));
    let mut detection_log = DetectionLog::create(
        &log_path,
        &config.kws.keyword_names,
        config.vad.threshold_db,
    )?;

    for dir in &args.wav_dirs {
        if !dir.is_dir() {
            log::warn!("ディレクトリが存在しません: {:?}", dir);
            continue;
        }

        let dir_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let expected = expected_keyword_for_dir(dir_name, &config.kws.keyword_names);

        match expected {
            Some(keyword) => log::info!("処理中: {:?} (期待キーワード: '{}')", dir, keyword),
            None => log::info!("処理中: {:?} (期待キーワードなし)", dir),
        }
        detection_log.begin_dir(dir, expected)?;

        for path in list_wav_files(dir)? {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            log::info!("解析中: {}", filename);

            // ファイル単位のエラー（形式不正・読み込み失敗）はログに
            // 残して次のファイルへ進む
            let outcome = scan_wav_file(&path, &mut engine, &mut vad, &config.kws.keyword_names);
            if let Err(ref e) = outcome {
                log::warn!("{}: {}", filename, e);
            }
            detection_log.record(&filename, &outcome, expected)?;
        }
    }

    let summary = detection_log.finalize()?;
    log::info!(
        "スキャン完了: 総ファイル数 {}, 正解検出数 {}, 正解率 {:.2}%",
        summary.total_files,
        summary.correct_detections,
        summary.accuracy_percent()
    );
    log::info!("検出ログを保存: {:?}", log_path);

    Ok(())
}

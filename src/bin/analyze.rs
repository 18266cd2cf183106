use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use sagicall::analyzer::analyze_directory;
use sagicall::classifier::ScamClassifier;
use sagicall::config::Config;
use sagicall::metrics::{predictions, render_metrics_report, ConfusionCounts, GroundTruth};
use sagicall::report::render_summary_report;
use sagicall::scanner::scan_audio_dir;
use sagicall::whisper_api::WhisperClient;
use std::path::PathBuf;

/// 通話音声の文字起こしとLLM詐欺判定を行い、総括レポートと性能評価を出力する
#[derive(Parser, Debug)]
#[command(name = "sagicall-analyze")]
#[command(about = "通話音声を文字起こしし、LLMで詐欺判定して総括レポートを出力する")]
struct Args {
    /// 解析対象の音声ディレクトリ（省略時は設定ファイルの値）
    audio_dir: Option<PathBuf>,

    /// 設定ファイルのパス
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// スキャン順の先頭K件を真の詐欺サンプルとみなす（位置規約・互換用）
    #[arg(long, value_name = "K")]
    scam_count: Option<usize>,

    /// ファイル名の先頭ラベル (scam_/normal_) から正解を読む
    #[arg(long)]
    labels_from_filenames: bool,

    /// レポートの出力先（省略時は設定ファイルの値）
    #[arg(short = 'o', long)]
    report_file: Option<PathBuf>,

    /// デフォルト設定ファイルを生成して終了
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
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

    log::info!("sagicall-analyze を起動します");

    // クライアントの構築と疎通確認（失敗したら実行全体を中止）
    let whisper = WhisperClient::new(&config.whisper).context("Whisperクライアントの初期化に失敗")?;
    let classifier =
        ScamClassifier::new(&config.classifier).context("分類器クライアントの初期化に失敗")?;
    classifier.check_connection().await?;

    let audio_dir = args
        .audio_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.scan.audio_dir));

    let items = scan_audio_dir(&audio_dir)?;
    if items.is_empty() {
        log::warn!("{:?} にサポート対象の音声ファイルがありません", audio_dir);
    }

    let start = std::time::Instant::now();
    let records = analyze_directory(items, &whisper, &classifier).await;
    let elapsed = start.elapsed();

    // 総括レポート
    let mut output = render_summary_report(&records);

    // 性能評価（正解ラベルを決められる場合のみ）
    let truth = resolve_ground_truth(&args, &records);
    if let Some(truth) = truth {
        let counts = ConfusionCounts::tally(truth.labels(), &predictions(&records));
        output.push('\n');
        output.push_str(&render_metrics_report(&truth, &counts));
    } else {
        log::info!("正解ラベルが指定されていないため、性能評価はスキップします");
    }

    println!("{}", output);

    let report_path = args
        .report_file
        .unwrap_or_else(|| PathBuf::from(&config.output.report_path));
    std::fs::write(&report_path, &output)
        .with_context(|| format!("レポートの書き込みに失敗: {:?}", report_path))?;
    log::info!("レポートを保存: {:?}", report_path);

    log::info!("総所要時間: {:.2} 秒", elapsed.as_secs_f64());

    Ok(())
}

/// CLI指定から正解ラベルを組み立てる
///
/// `--scam-count` が最優先。`--labels-from-filenames` は
/// 全ファイルのラベルを読めた場合のみ有効で、読めないファイルが
/// あれば警告して評価をスキップする。
fn resolve_ground_truth(
    args: &Args,
    records: &[sagicall::types::AnalysisRecord],
) -> Option<GroundTruth> {
    if let Some(k) = args.scam_count {
        return Some(GroundTruth::leading_scams(k, records.len()));
    }

    if args.labels_from_filenames {
        let truth = GroundTruth::from_filenames(records.iter().map(|r| r.item.filename.as_str()));
        if truth.is_none() {
            log::warn!("ラベルを読めないファイル名があるため、性能評価をスキップします");
        }
        return truth;
    }

    None
}

use crate::backend::ClassifyBackend;
use crate::config::ClassifierConfig;
use crate::types::ScamAnalysis;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 詐欺分類の指示テンプレート
///
/// 判定ロジックの中核。モデルにはまず3項目の【合法性チェック】を
/// 評価させ、すべての項目がおおむね不成立で、かつ明確な詐欺の
/// 兆候がある場合にのみ is_scam = true を許可する2段ゲート。
/// 誤報（正常通話の詐欺判定）を抑えるための順序付けであり、
/// モデルがこの指示に従うことが前提の方針である。
///
/// 出力はJSONオブジェクトのみ。risk_level は4値の閉集合で、
/// これ以外を返した場合はパース段階で解析失敗になる。
const SYSTEM_PROMPT: &str = r#"あなたは極めて厳密で論理を重視する「通話定性分析官」であり、特殊詐欺対策を専門とする。正常な通話を詐欺と誤報することは利用者への重大な迷惑であり、全力で避けなければならない。

あなたの任務は、一方の話者の発話テキストを分析することである。詐欺かどうかを判定する前に、必ず【合法性チェック】を行うこと。

【合法性チェック】
正規の公的機関やカスタマーサポートの通話には、通常は以下の特徴が1つ以上含まれる。テキストが該当するか確認すること。
1. 公式チャネルへの誘導 (official_channel_guidance): 公式アプリ・公式サイト・窓口など公式の経路での手続きを明確に案内しているか。（例:「詳細は公式アプリでご確認ください」「お近くの窓口でお手続きください」）
2. 無害な操作の明言 (harmless_action_statement): 費用が発生しない、振込を求めない、返金は元の経路に戻る、などを明言しているか。（例:「本件で費用は一切発生しません」「料金は元の決済方法に返金されます」）
3. 情報同期が主目的 (is_information_sync): 内容が連絡・通知・確認であり、暗証番号・認証コード・口座情報などの機密情報を聞き出していないか。

上記の合法性の特徴に一切該当せず、かつ明確な詐欺の意図（個人のSNSアカウントへの誘導、「安全な口座」への振込指示、画面共有への誘導など）が同時に見られる場合に限り、詐欺と判定してよい。

出力は厳密なJSONオブジェクトのみとし、JSON以外の文字を一切含めてはならない。
JSONオブジェクトの構造は次の通り:
{
  "legitimacy_checks": {
    "official_channel_guidance": boolean,
    "harmless_action_statement": boolean,
    "is_information_sync": boolean
  },
  "final_assessment": {
    "is_scam": boolean,
    "risk_level": "string",
    "scam_type": "string",
    "reasoning": "string"
  }
}

フィールドの説明:
- legitimacy_checks: 合法性チェックの結果。
  - official_channel_guidance: 公式チャネルへ誘導していれば true。
  - harmless_action_statement: 操作が無害であると明言していれば true。
  - is_information_sync: 情報の同期・通知が主目的であれば true。
- final_assessment: 最終評価。
  - is_scam: 上記3項目の大部分が false で、かつ明確な詐欺行為が存在する場合のみ true。
  - risk_level: リスクレベル。必ず ["high", "medium", "low", "none"] のいずれかのみ。
  - scam_type: 詐欺の類型。例:「還付金詐欺」「カスタマーサポート詐称」「警察・検察の詐称」「認証コードの聞き出し」「投資・ロマンス詐欺」「不明」「不適用」。
  - reasoning: 判定理由の詳細。必ず【合法性チェック】の結果に言及して説明すること。"#;

/// チャット補完リクエスト
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// チャット補完レスポンス（必要なフィールドのみ）
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// LLM詐欺分類クライアント
///
/// OpenAI互換の chat/completions エンドポイントに文字起こし
/// テキストを送り、構造化された詐欺解析結果を受け取る。
/// base_url の差し替えで DeepSeek などの互換サービスにも接続できる。
pub struct ScamClassifier {
    config: ClassifierConfig,
    client: reqwest::Client,
}

impl ScamClassifier {
    /// クライアントを生成する
    ///
    /// # Errors
    ///
    /// APIキーが未設定、またはHTTPクライアントの構築に失敗した
    /// 場合にエラーを返す（致命的初期化エラー）。
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!("分類器のAPIキーが設定されていません");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("分類器HTTPクライアント作成失敗")?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// 接続確認
    ///
    /// モデル一覧エンドポイントを叩いて認証と疎通を確認する。
    /// 失敗した場合、呼び出し側は実行全体を中止する。
    pub async fn check_connection(&self) -> Result<()> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .context("分類器サービスへの接続に失敗")?;

        if !response.status().is_success() {
            anyhow::bail!("分類器サービスの接続確認に失敗: {}", response.status());
        }

        log::info!("分類器サービスへの接続を確認 ({})", self.config.base_url);
        Ok(())
    }

    /// モデル出力の文字列を厳密にパースする
    ///
    /// JSON以外の文字列、欠損フィールド、閉集合外の risk_level は
    /// すべてエラー（= 解析失敗レコード行き）。
    fn parse_analysis(content: &str) -> Result<ScamAnalysis> {
        serde_json::from_str::<ScamAnalysis>(content.trim())
            .context("分類結果のJSONパースに失敗")
    }

    async fn request_classification(&self, transcript: &str) -> Result<ScamAnalysis> {
        let user_prompt = format!(
            "設定された「通話定性分析官」の役割と分析枠組みに厳密に従い、以下の発話テキストに対して【合法性チェック】と最終評価を行い、要求されたJSON形式のみで結果を返してください。\n\n--- 発話テキスト ---\n\"{}\"\n--- 終了 ---",
            transcript
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .context("分類器APIリクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("分類器APIエラー: {} - {}", status, error_text);
        }

        let chat_response: ChatResponse = response
            .json::<ChatResponse>()
            .await
            .context("分類器APIレスポンスパース失敗")?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .context("分類器APIレスポンスに choices がありません")?;

        Self::parse_analysis(content)
    }
}

#[async_trait]
impl ClassifyBackend for ScamClassifier {
    async fn classify(&self, transcript: &str) -> Result<ScamAnalysis> {
        log::debug!("LLM解析を実行中 ({} 文字)", transcript.chars().count());
        self.request_classification(transcript).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;

    #[test]
    fn test_new_requires_api_key() {
        let config = ClassifierConfig::default();
        assert!(ScamClassifier::new(&config).is_err());

        let config = ClassifierConfig {
            api_key: "sk-test".to_string(),
            ..ClassifierConfig::default()
        };
        assert!(ScamClassifier::new(&config).is_ok());
    }

    #[test]
    fn test_system_prompt_declares_contract() {
        // 合法性チェック3項目と risk_level の閉集合がテンプレートに
        // 含まれていること（ワイヤ契約の明文化）
        assert!(SYSTEM_PROMPT.contains("official_channel_guidance"));
        assert!(SYSTEM_PROMPT.contains("harmless_action_statement"));
        assert!(SYSTEM_PROMPT.contains("is_information_sync"));
        assert!(SYSTEM_PROMPT.contains(r#"["high", "medium", "low", "none"]"#));
        // 合法性チェックが詐欺判定より先に要求されている
        let check_pos = SYSTEM_PROMPT.find("【合法性チェック】").unwrap();
        let verdict_pos = SYSTEM_PROMPT.find("is_scam").unwrap();
        assert!(check_pos < verdict_pos);
    }

    #[test]
    fn test_parse_valid_analysis() {
        let content = r#"
        {
            "legitimacy_checks": {
                "official_channel_guidance": false,
                "harmless_action_statement": false,
                "is_information_sync": false
            },
            "final_assessment": {
                "is_scam": true,
                "risk_level": "high",
                "scam_type": "還付金詐欺",
                "reasoning": "合法性チェックは3項目とも不成立であり、ATMでの操作を指示している。"
            }
        }
        "#;

        let analysis = ScamClassifier::parse_analysis(content).unwrap();
        assert!(analysis.final_assessment.is_scam);
        assert_eq!(analysis.final_assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        // JSON以外の前置きが付いた出力は契約違反として弾く
        let content = "以下が解析結果です: {\"legitimacy_checks\": {}}";
        assert!(ScamClassifier::parse_analysis(content).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_risk_level() {
        let content = r#"
        {
            "legitimacy_checks": {
                "official_channel_guidance": false,
                "harmless_action_statement": false,
                "is_information_sync": false
            },
            "final_assessment": {
                "is_scam": true,
                "risk_level": "超高リスク",
                "scam_type": "不明",
                "reasoning": "..."
            }
        }
        "#;
        assert!(ScamClassifier::parse_analysis(content).is_err());
    }
}

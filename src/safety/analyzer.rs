use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::schema::{SafetyContext, SafetyNarration};

const NARRATION_TOOL_NAME: &str = "SafetyNarration";

#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("safety provider request failed: {0}")]
    Http(String),
    #[error("safety provider blocked the prompt: {0}")]
    Blocked(String),
    #[error("safety provider finished without a function call: {0}")]
    NoFunctionCall(String),
    #[error("safety provider response violated the narration schema: {0}")]
    Schema(String),
}

#[async_trait]
pub trait SafetyAnalyzer: Send + Sync {
    async fn analyze(&self, context: &SafetyContext) -> Result<SafetyNarration, SafetyError>;
}

/// Gemini generateContent 封装，强制走 SafetyNarration 函数调用
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    fn request_payload(context: &SafetyContext) -> Value {
        let prompt = format!(
            "You are GuardianSense-LLM, a highly intelligent and proactive child safety \
             analysis system. Analyze the provided child's location and context data, \
             identify the safety implications of each signal (crime score, unfamiliar \
             area, crowd density) and synthesize the overall risk level. Generate a \
             safety narration using the '{NARRATION_TOOL_NAME}' tool. Output ONLY valid \
             JSON conforming exactly to the schema; no markdown, comments, or extra keys. \
             'recommended_action' must be an array of clear, distinct steps. \
             Here is the child's current context: {}",
            serde_json::to_string(context).unwrap_or_default()
        );

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{
                "functionDeclarations": [{
                    "name": NARRATION_TOOL_NAME,
                    "description": "Generates a parent-readable safety/action narration JSON based on location and context.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "narrative_alert": { "type": "string" },
                            "risk_level": { "type": "string", "enum": ["low", "medium", "high"] },
                            "recommended_action": { "type": "array", "items": { "type": "string" } },
                            "nearest_exit": { "type": "string" }
                        },
                        "required": ["narrative_alert", "risk_level", "recommended_action"]
                    }
                }]
            }],
            "generationConfig": { "temperature": 0.4 }
        })
    }
}

/// 从 generateContent 响应中提取并校验函数调用参数
pub fn narration_from_response(body: &Value) -> Result<SafetyNarration, SafetyError> {
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(SafetyError::Blocked(reason.to_string()));
    }

    let call = body.pointer("/candidates/0/content/parts/0/functionCall");
    let Some(call) = call else {
        let reason = body
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(SafetyError::NoFunctionCall(reason.to_string()));
    };

    let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
    if name != NARRATION_TOOL_NAME {
        return Err(SafetyError::NoFunctionCall(format!(
            "unexpected function: {name}"
        )));
    }

    let args = call.get("args").cloned().unwrap_or(Value::Null);
    serde_json::from_value(args).map_err(|e| SafetyError::Schema(e.to_string()))
}

#[async_trait]
impl SafetyAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, context: &SafetyContext) -> Result<SafetyNarration, SafetyError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_payload(context))
            .send()
            .await
            .map_err(|e| SafetyError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SafetyError::Http(format!(
                "status {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SafetyError::Http(e.to_string()))?;

        narration_from_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::schema::RiskLevel;

    fn function_call_body(name: &str, args: Value) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "functionCall": { "name": name, "args": args } }] }
            }]
        })
    }

    #[test]
    fn extracts_valid_function_call() {
        let body = function_call_body(
            NARRATION_TOOL_NAME,
            json!({
                "narrative_alert": "High crime score near an unfamiliar market",
                "risk_level": "high",
                "recommended_action": ["Call Child", "Contact Authorities"]
            }),
        );
        let narration = narration_from_response(&body).unwrap();
        assert_eq!(narration.risk_level, RiskLevel::High);
        assert_eq!(narration.recommended_action.len(), 2);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(
            narration_from_response(&body),
            Err(SafetyError::Blocked(_))
        ));
    }

    #[test]
    fn missing_function_call_reports_finish_reason() {
        let body = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        match narration_from_response(&body) {
            Err(SafetyError::NoFunctionCall(reason)) => assert_eq!(reason, "MAX_TOKENS"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn wrong_function_name_is_rejected() {
        let body = function_call_body("SomethingElse", json!({}));
        assert!(matches!(
            narration_from_response(&body),
            Err(SafetyError::NoFunctionCall(_))
        ));
    }

    #[test]
    fn schema_violation_is_recoverable_error() {
        let body = function_call_body(
            NARRATION_TOOL_NAME,
            json!({ "narrative_alert": "x", "risk_level": "severe", "recommended_action": [] }),
        );
        assert!(matches!(
            narration_from_response(&body),
            Err(SafetyError::Schema(_))
        ));
    }
}

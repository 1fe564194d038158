use serde_json::{Value, json};

use crate::domain::value_objects::analysis::ResultSchema;

pub const STOCK_BROADCAST_PROMPT: &str = r#"You are an expert investor who is about to commit your entire net worth.
Analyze this stock market broadcast with extreme care and a critical eye.
This is not a casual recommendation: you must decide whether to put everything on it.

Using only information from the video, analyze the following in detail:

1. Stock name (stock_name): the stock the video mainly discusses.
2. Investment thesis (investment_thesis): the strongest reason the presenter gives
   for buying or selling (earnings improvement, new technology, chart pattern, flows, ...).
3. Key risks and counter-arguments (mentioned_risk): risk factors or rebuttals mentioned
   in the video. If no risk is mentioned at all, say "No risks mentioned".
4. Credibility score (credibility_score): from 1 to 10, how far the claims rest on
   objective data (financial statements, statistics, filings) rather than subjective
   predictions or emotion. 1 = highly subjective, 10 = highly objective.
5. Final decision (final_decision): betting your entire net worth, would you "buy",
   "sell", or "hold" (wait and see) right now?
6. Reason for decision (decision_reason): a clear, concise reason for the decision
   in at most three lines.

Base the answer only on the video. Do not use outside knowledge."#;

pub const NO_RISK_MENTIONED: &str = "No risks mentioned";
pub const DEFAULT_CREDIBILITY_SCORE: u8 = 5;

/// Fields the stock broadcast analysis must produce.
pub fn stock_broadcast_schema() -> ResultSchema {
    ResultSchema::new()
        .required("stock_name")
        .required("investment_thesis")
        .required("final_decision")
        .required("decision_reason")
        .optional("mentioned_risk")
        .optional("credibility_score")
        .with_default("mentioned_risk", json!(NO_RISK_MENTIONED))
        .with_default("credibility_score", json!(DEFAULT_CREDIBILITY_SCORE))
}

/// Vertex AI `responseSchema` matching [`stock_broadcast_schema`].
pub fn stock_broadcast_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "stock_name": { "type": "STRING" },
            "investment_thesis": { "type": "STRING" },
            "mentioned_risk": { "type": "STRING" },
            "credibility_score": { "type": "NUMBER" },
            "final_decision": { "type": "STRING", "enum": ["buy", "sell", "hold"] },
            "decision_reason": { "type": "STRING" }
        },
        "required": ["stock_name", "investment_thesis", "final_decision", "decision_reason"]
    })
}

//! Response interpretation
//!
//! Model output is free-form text that usually, but not always, contains a JSON object,
//! optionally wrapped in a ```json fence. Extraction is best effort: anything that does
//! not decode becomes a `{"raw_response": ...}` fallback instead of an error.

use crate::error::{AgentError, Result};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::warn;

pub const RAW_RESPONSE_KEY: &str = "raw_response";

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Question ids come back as numbers or strings depending on the model's mood.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionRef {
    Number(i64),
    Text(String),
}

impl Default for QuestionRef {
    fn default() -> Self {
        QuestionRef::Text(String::new())
    }
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionRef::Number(n) => write!(f, "{}", n),
            QuestionRef::Text(s) => write!(f, "{}", s),
        }
    }
}

// Only `required.tables` and `sql` are load-bearing. Everything else is informational
// and decoded with `lenient`, so a null or mistyped value never rejects the reply.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredTables {
    pub tables: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient")]
    pub dependencies: Vec<QuestionRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    #[serde(default, deserialize_with = "lenient")]
    pub question_id: QuestionRef,
    #[serde(default, deserialize_with = "lenient")]
    pub question: String,
    pub required: RequiredTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub results: Vec<QuestionAnalysis>,
    #[serde(default, deserialize_with = "lenient")]
    pub execution_order: Vec<QuestionRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSql {
    #[serde(default, deserialize_with = "lenient")]
    pub question_id: QuestionRef,
    #[serde(default, deserialize_with = "lenient")]
    pub question: String,
    #[serde(deserialize_with = "string_or_seq")]
    pub sql: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    pub results: Vec<QuestionSql>,
    #[serde(default, deserialize_with = "lenient")]
    pub analysis: String,
}

/// Decode `T`, or fall back to `T::default()` when the value is null or of another type.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Outcome of reading a model response as `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply<T> {
    Parsed(T),
    /// No JSON could be decoded; carries the trimmed response text.
    Unparsed(String),
}

impl<T> ModelReply<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            ModelReply::Parsed(value) => Some(value),
            ModelReply::Unparsed(_) => None,
        }
    }
}

/// Best-effort JSON extraction. Never fails: undecodable input yields
/// `{"raw_response": <trimmed input>}`.
pub fn extract_json(raw: &str) -> Value {
    let cleaned = raw.trim();

    let start = match cleaned.find(FENCE_OPEN) {
        Some(i) => Some(i + FENCE_OPEN.len()),
        None => cleaned.find('{'),
    };

    let Some(start) = start else {
        warn!("No JSON content found in model response");
        warn!("Raw response: {}", cleaned);
        return fallback(cleaned);
    };

    let end = cleaned[start..]
        .find(FENCE_CLOSE)
        .map(|i| start + i)
        .unwrap_or(cleaned.len());
    let content = cleaned[start..end].trim();

    match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!("Extracted content is not valid JSON: {}", e);
            warn!("Extracted content: {}", content);
            warn!("Raw response: {}", cleaned);
            fallback(cleaned)
        }
    }
}

fn fallback(cleaned: &str) -> Value {
    json!({ RAW_RESPONSE_KEY: cleaned })
}

/// The fallback text if `value` is a `raw_response` sentinel.
pub fn raw_response(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(RAW_RESPONSE_KEY)?.as_str()
}

/// Extract JSON and decode it as `T`. A fallback sentinel is `Unparsed`; a decoded
/// object without the keys `T` requires is an error.
pub fn interpret<T: DeserializeOwned>(raw: &str) -> Result<ModelReply<T>> {
    let value = extract_json(raw);
    if let Some(text) = raw_response(&value) {
        return Ok(ModelReply::Unparsed(text.to_string()));
    }
    if value.get("results").is_none() {
        return Err(AgentError::MissingKey("results".to_string()));
    }
    serde_json::from_value(value)
        .map(ModelReply::Parsed)
        .map_err(|e| AgentError::InvalidResponse(e.to_string()))
}

/// Flattened `results[*].required.tables`, duplicates removed.
pub fn extract_required_tables(analysis: &AnalysisResult) -> Vec<String> {
    analysis
        .results
        .iter()
        .flat_map(|r| r.required.tables.iter().cloned())
        .unique()
        .collect()
}

/// Same as [`extract_required_tables`] over an untyped response.
pub fn extract_required_tables_from_value(value: &Value) -> Result<Vec<String>> {
    let results = value
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| AgentError::MissingKey("results".to_string()))?;

    let mut tables = Vec::new();
    for item in results {
        let names = item
            .get("required")
            .and_then(|r| r.get("tables"))
            .and_then(|t| t.as_array())
            .ok_or_else(|| AgentError::MissingKey("required.tables".to_string()))?;
        tables.extend(names.iter().filter_map(|n| n.as_str()).map(str::to_string));
    }
    Ok(tables.into_iter().unique().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn analysis_json() -> Value {
        json!({
            "results": [
                {"question_id": 1, "question": "q1",
                 "required": {"tables": ["db.t1", "db.t2"], "reason": "r", "dependencies": []}},
                {"question_id": 2, "question": "q2",
                 "required": {"tables": ["db.t1"], "reason": "r", "dependencies": [1]}}
            ],
            "execution_order": [1, 2],
            "analysis": "a"
        })
    }

    #[test]
    fn test_fenced_json_extracted() {
        let expected = analysis_json();
        let raw = format!("好的，结果如下：\n```json\n{}\n```\n以上。", expected);
        assert_eq!(extract_json(&raw), expected);
    }

    #[test]
    fn test_bare_object_extracted() {
        assert_eq!(extract_json("  {\"a\": [1, 2]}  "), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_no_json_falls_back_to_trimmed_text() {
        let value = extract_json("  sorry, I cannot help  ");
        assert_eq!(value, json!({"raw_response": "sorry, I cannot help"}));
    }

    #[test]
    fn test_invalid_fenced_body_falls_back_to_full_text() {
        let raw = "prefix ```json\n{\"a\": }\n``` suffix";
        assert_eq!(extract_json(raw), json!({"raw_response": raw}));
    }

    #[test]
    fn test_unclosed_fence_reads_to_end() {
        assert_eq!(extract_json("```json\n{\"a\": 1}"), json!({"a": 1}));
    }

    #[test]
    fn test_interpret_unparsed() {
        let reply: ModelReply<AnalysisResult> = interpret("no json here").unwrap();
        assert_eq!(reply, ModelReply::Unparsed("no json here".to_string()));
    }

    #[test]
    fn test_interpret_missing_results_key() {
        let err = interpret::<SqlResult>("{\"analysis\": \"x\"}").unwrap_err();
        assert!(matches!(err, AgentError::MissingKey(k) if k == "results"));
    }

    #[test]
    fn test_interpret_sql_accepts_single_string() {
        let raw = r#"{"results": [{"question_id": "1", "question": "q", "sql": "SELECT 1", "reason": ""}]}"#;
        let reply: SqlResult = interpret(raw).unwrap().parsed().unwrap();
        assert_eq!(reply.results[0].sql, vec!["SELECT 1".to_string()]);
        assert_eq!(reply.results[0].question_id, QuestionRef::Text("1".to_string()));
    }

    #[test]
    fn test_analysis_tolerates_null_secondary_fields() {
        let raw = r#"{"results": [{"question_id": 1, "question": null,
            "required": {"tables": ["db.t1"], "reason": null, "dependencies": null}}],
            "execution_order": null, "analysis": null}"#;
        let reply: AnalysisResult = interpret(raw).unwrap().parsed().unwrap();
        assert_eq!(reply.results[0].required.tables, vec!["db.t1".to_string()]);
        assert_eq!(reply.results[0].required.reason, "");
        assert!(reply.results[0].required.dependencies.is_empty());
        assert_eq!(reply.analysis, "");
        assert_eq!(extract_required_tables(&reply), vec!["db.t1".to_string()]);
    }

    #[test]
    fn test_analysis_tolerates_mistyped_secondary_fields() {
        let raw = r#"{"results": [{"question_id": {"n": 1},
            "required": {"tables": ["db.t1"], "reason": 3, "dependencies": "问题1"}}],
            "analysis": ["a", "b"]}"#;
        let reply: AnalysisResult = interpret(raw).unwrap().parsed().unwrap();
        assert_eq!(reply.results[0].question_id, QuestionRef::default());
        assert!(reply.results[0].required.dependencies.is_empty());
        assert_eq!(reply.analysis, "");
    }

    #[test]
    fn test_sql_tolerates_null_secondary_fields() {
        let raw = r#"{"results": [{"question_id": null, "question": "q",
            "sql": ["SELECT 1"], "reason": null}], "analysis": null}"#;
        let reply: SqlResult = interpret(raw).unwrap().parsed().unwrap();
        assert_eq!(reply.results[0].sql, vec!["SELECT 1".to_string()]);
        assert_eq!(reply.results[0].reason, "");
        assert_eq!(reply.analysis, "");
    }

    #[test]
    fn test_missing_tables_still_rejected() {
        let raw = r#"{"results": [{"question_id": 1, "required": {"reason": "r"}}]}"#;
        assert!(matches!(
            interpret::<AnalysisResult>(raw),
            Err(AgentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_required_tables_deduplicated() {
        let analysis: AnalysisResult = serde_json::from_value(analysis_json()).unwrap();
        let tables: HashSet<_> = extract_required_tables(&analysis).into_iter().collect();
        let expected: HashSet<_> = ["db.t1", "db.t2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tables, expected);
    }

    #[test]
    fn test_required_tables_from_value() {
        let tables: HashSet<_> = extract_required_tables_from_value(&analysis_json())
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(tables.len(), 2);

        let sentinel = extract_json("garbage");
        assert!(matches!(
            extract_required_tables_from_value(&sentinel),
            Err(AgentError::MissingKey(_))
        ));
    }
}

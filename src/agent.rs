//! Financial question-answering agent
//!
//! A strict four-stage pipeline per call, with no retries and no checkpointing:
//!
//! 1. analysis request -> model -> [`AnalysisResult`]
//! 2. required tables from the analysis
//! 3. SQL request with table details -> model -> [`SqlResult`]
//! 4. every statement, in order, against the query service
//!
//! A response that cannot be read as JSON stops the pipeline with
//! [`AgentError::UnparsedResponse`]. A statement the query service rejects is recorded
//! and the loop moves on to the next one.

use crate::agent_prompts::{
    build_analysis_request, build_sql_request, render_analysis, render_database_info,
    render_table_details,
};
use crate::catalog::Catalog;
use crate::error::{AgentError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::questions::Team;
use crate::query_service::QueryService;
use crate::response::{extract_required_tables, interpret, AnalysisResult, ModelReply, QuestionRef, SqlResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementOutcome {
    pub question_id: QuestionRef,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatementOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceReport {
    pub analysis: AnalysisResult,
    pub required_tables: Vec<String>,
    pub sql: SqlResult,
    pub executions: Vec<StatementOutcome>,
}

pub struct FinancialAgent<'a> {
    catalog: &'a Catalog,
    model: &'a dyn ChatModel,
    query_service: &'a dyn QueryService,
}

impl<'a> FinancialAgent<'a> {
    pub fn new(
        catalog: &'a Catalog,
        model: &'a dyn ChatModel,
        query_service: &'a dyn QueryService,
    ) -> Self {
        Self {
            catalog,
            model,
            query_service,
        }
    }

    pub async fn infer_team(&self, team: &Team) -> Result<InferenceReport> {
        info!("Answering team {} ({} questions)", team.id, team.questions.len());
        self.infer(&team.to_prompt_text()?).await
    }

    pub async fn infer(&self, questions: &str) -> Result<InferenceReport> {
        let analysis = self.analyze(questions).await?;

        let required_tables = extract_required_tables(&analysis);
        info!("Required tables: {:?}", required_tables);

        let sql = self.generate_sql(&analysis, &required_tables).await?;
        let executions = self.execute_sql(&sql).await?;

        Ok(InferenceReport {
            analysis,
            required_tables,
            sql,
            executions,
        })
    }

    /// Stage 1.
    pub async fn analyze(&self, questions: &str) -> Result<AnalysisResult> {
        let database_info = render_database_info(&self.catalog.database_summary())?;
        let messages = build_analysis_request(questions, &database_info);
        self.ask("analysis", &messages).await
    }

    /// Stage 3.
    pub async fn generate_sql(
        &self,
        analysis: &AnalysisResult,
        required_tables: &[String],
    ) -> Result<SqlResult> {
        let details = self.catalog.table_details(required_tables);
        let messages = build_sql_request(&render_analysis(analysis)?, &render_table_details(&details)?);
        self.ask("sql", &messages).await
    }

    /// Stage 4.
    pub async fn execute_sql(&self, sql: &SqlResult) -> Result<Vec<StatementOutcome>> {
        let mut outcomes = Vec::new();

        for item in &sql.results {
            for statement in &item.sql {
                match self.catalog.execute_query(self.query_service, statement).await {
                    Ok(response) => {
                        info!("Question {}: {}", item.question_id, response);
                        outcomes.push(StatementOutcome {
                            question_id: item.question_id.clone(),
                            sql: statement.clone(),
                            response: Some(response),
                            error: None,
                        });
                    }
                    Err(e @ AgentError::QueryRejected { .. }) => {
                        warn!("Question {}: statement failed: {}", item.question_id, e);
                        outcomes.push(StatementOutcome {
                            question_id: item.question_id.clone(),
                            sql: statement.clone(),
                            response: None,
                            error: Some(e.to_string()),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(outcomes)
    }

    async fn ask<T: DeserializeOwned>(&self, stage: &str, messages: &[ChatMessage]) -> Result<T> {
        let raw = self.model.complete(messages).await?;
        debug!("{} stage response: {}", stage, raw);

        match interpret(&raw)? {
            ModelReply::Parsed(value) => Ok(value),
            ModelReply::Unparsed(raw) => Err(AgentError::UnparsedResponse {
                stage: stage.to_string(),
                raw,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Table;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        replies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    struct RejectingService;

    #[async_trait]
    impl QueryService for RejectingService {
        async fn execute(&self, sql: &str, _limit: u32) -> Result<serde_json::Value> {
            if sql.contains("bad") {
                Err(AgentError::QueryRejected {
                    status: 400,
                    body: "syntax error".to_string(),
                })
            } else {
                Ok(serde_json::json!({"data": []}))
            }
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert_table(Table {
            database_name_native: "库".to_string(),
            database_name_foreign: "db".to_string(),
            table_name_foreign: "t1".to_string(),
            table_name_native: "表".to_string(),
            description: "d".to_string(),
            columns: vec![],
        });
        catalog
    }

    #[tokio::test]
    async fn test_rejected_statement_does_not_stop_loop() {
        let catalog = catalog();
        let model = ScriptedModel {
            replies: Mutex::new(vec![]),
        };
        let agent = FinancialAgent::new(&catalog, &model, &RejectingService);

        let sql: SqlResult = serde_json::from_value(serde_json::json!({
            "results": [{"question_id": 1, "question": "q", "sql": ["bad sql", "SELECT 1"], "reason": ""}]
        }))
        .unwrap();

        let outcomes = agent.execute_sql(&sql).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_unparsed_analysis_stops_pipeline() {
        let catalog = catalog();
        let model = ScriptedModel {
            replies: Mutex::new(vec!["I don't know".to_string()]),
        };
        let agent = FinancialAgent::new(&catalog, &model, &RejectingService);

        let err = agent.infer("{}").await.unwrap_err();
        assert!(matches!(err, AgentError::UnparsedResponse { ref stage, .. } if stage == "analysis"));
    }
}

//! # finsql-agent
//!
//! Answers teams of natural-language financial questions by asking an LLM which
//! database tables each question needs, asking it again for SQL over those tables,
//! and running the SQL on a remote query service.
//!
//! ```rust,ignore
//! use finsql_agent::*;
//!
//! let config = AgentConfig::default();
//! let catalog = Catalog::load(&config.data.data_dict, &config.data.schema)?;
//! let bank = QuestionBank::from_path(&config.data.questions)?;
//! let model = LlmClient::new(&config.llm)?;
//! let service = HttpQueryService::new(&config.query)?;
//!
//! let agent = FinancialAgent::new(&catalog, &model, &service);
//! let report = agent.infer_team(bank.team(0).unwrap()).await?;
//! ```

pub mod agent;
pub mod agent_prompts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod llm;
pub mod query_service;
pub mod questions;
pub mod response;

pub use agent::{FinancialAgent, InferenceReport, StatementOutcome};
pub use catalog::{Catalog, Column, Table, TableDetail, TableSummary};
pub use config::{AgentConfig, DataPaths, LlmConfig, QueryServiceConfig};
pub use error::{AgentError, Result};
pub use llm::{ChatMessage, ChatModel, LlmClient};
pub use query_service::{HttpQueryService, QueryService, QUERY_ROW_LIMIT};
pub use questions::{Question, QuestionBank, Team};
pub use response::{
    extract_json, extract_required_tables, interpret, AnalysisResult, ModelReply, SqlResult,
};

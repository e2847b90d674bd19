//! Runtime configuration passed explicitly into the clients and the agent.

use std::path::PathBuf;

pub const DEFAULT_LLM_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_LLM_MODEL: &str = "glm-4";
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_TOP_P: f32 = 0.7;
pub const DEFAULT_QUERY_URL: &str = "https://comm.chatglm.cn/finglm2/api/query";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    pub url: String,
    pub token: Option<String>,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_QUERY_URL.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub data_dict: PathBuf,
    pub schema: PathBuf,
    pub questions: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dict: PathBuf::from("data/data_dict.xlsx"),
            schema: PathBuf::from("data/all_tables_schema.txt"),
            questions: PathBuf::from("data/question.json"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub query: QueryServiceConfig,
    pub data: DataPaths,
}

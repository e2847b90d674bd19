use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Schema file error: {0}")]
    SchemaFile(String),

    #[error("Question bank error: {0}")]
    QuestionBank(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Query service rejected statement ({status}): {body}")]
    QueryRejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing key '{0}' in model response")]
    MissingKey(String),

    #[error("Model response does not match the expected shape: {0}")]
    InvalidResponse(String),

    #[error("Model response for {stage} stage could not be parsed as JSON")]
    UnparsedResponse { stage: String, raw: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

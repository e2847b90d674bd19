use finsql_agent::{
    AgentConfig, Catalog, DataPaths, FinancialAgent, HttpQueryService, LlmClient, LlmConfig,
    QueryServiceConfig, QuestionBank,
};

use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finsql")]
#[command(about = "Answer financial questions with LLM-generated SQL")]
#[command(version)]
struct Args {
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct DataArgs {
    /// Data dictionary spreadsheet (.xlsx or .csv)
    #[arg(long, env = "DATA_DICT_PATH", default_value = "data/data_dict.xlsx", global = true)]
    data_dict: PathBuf,

    /// Fixed-width table schema dump
    #[arg(long, env = "SCHEMA_PATH", default_value = "data/all_tables_schema.txt", global = true)]
    schema: PathBuf,

    /// Question bank JSON
    #[arg(long, env = "QUESTION_PATH", default_value = "data/question.json", global = true)]
    questions: PathBuf,
}

#[derive(ClapArgs)]
struct LlmArgs {
    /// LLM API key
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = finsql_agent::config::DEFAULT_LLM_BASE_URL)]
    base_url: String,

    /// Model name
    #[arg(long, env = "LLM_MODEL", default_value = finsql_agent::config::DEFAULT_LLM_MODEL)]
    model: String,

    #[arg(long, default_value_t = finsql_agent::config::DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, default_value_t = finsql_agent::config::DEFAULT_TOP_P)]
    top_p: f32,
}

#[derive(ClapArgs)]
struct QueryArgs {
    /// Query service endpoint
    #[arg(long, env = "QUERY_API_URL", default_value = finsql_agent::config::DEFAULT_QUERY_URL)]
    query_url: String,

    /// Query service bearer token
    #[arg(long, env = "QUERY_API_TOKEN", hide_env_values = true)]
    query_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one team of questions
    Run {
        /// Team id (defaults to the first team)
        #[arg(long, conflicts_with = "index")]
        team: Option<String>,

        /// Team position in the question bank
        #[arg(long)]
        index: Option<usize>,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show the catalog summary, or column details for the given tables
    Tables {
        /// Qualified table names (<database>.<table>)
        names: Vec<String>,
    },
    /// Execute one SQL statement on the query service
    Query {
        sql: String,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Write the submission document
    Export {
        /// Output path
        #[arg(default_value = "submit.json")]
        output: PathBuf,
    },
}

impl From<DataArgs> for DataPaths {
    fn from(args: DataArgs) -> Self {
        Self {
            data_dict: args.data_dict,
            schema: args.schema,
            questions: args.questions,
        }
    }
}

impl From<LlmArgs> for LlmConfig {
    fn from(args: LlmArgs) -> Self {
        Self {
            api_key: args.api_key,
            base_url: args.base_url,
            model: args.model,
            temperature: args.temperature,
            top_p: args.top_p,
        }
    }
}

impl From<QueryArgs> for QueryServiceConfig {
    fn from(args: QueryArgs) -> Self {
        Self {
            url: args.query_url,
            token: args.query_token,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let data = DataPaths::from(args.data);

    match args.command {
        Commands::Run {
            team,
            index,
            llm,
            query,
        } => {
            let config = AgentConfig {
                llm: llm.into(),
                query: query.into(),
                data,
            };
            run(config, team, index).await
        }
        Commands::Tables { names } => show_tables(&data, &names),
        Commands::Query { sql, query } => run_query(&data, query.into(), &sql).await,
        Commands::Export { output } => {
            let bank = QuestionBank::from_path(&data.questions)?;
            bank.export_submission(&output)?;
            println!("Submission written to {}", output.display());
            Ok(())
        }
    }
}

async fn run(config: AgentConfig, team: Option<String>, index: Option<usize>) -> Result<()> {
    let catalog = Catalog::load(&config.data.data_dict, &config.data.schema)?;
    let bank = QuestionBank::from_path(&config.data.questions)?;

    let team = match team {
        Some(tid) => bank
            .get_team(&tid)
            .ok_or_else(|| anyhow!("Team '{}' not found", tid))?,
        None => {
            let index = index.unwrap_or(0);
            bank.team(index)
                .ok_or_else(|| anyhow!("No team at index {} ({} teams)", index, bank.len()))?
        }
    };

    let model = LlmClient::new(&config.llm)?;
    let service = HttpQueryService::new(&config.query)?;
    info!("Using model {}", model.model());

    let agent = FinancialAgent::new(&catalog, &model, &service);
    let report = agent.infer_team(team).await?;

    println!("\n{}", "=".repeat(80));
    println!(" Team {}: {} statements executed", team.id, report.executions.len());
    println!("{}", "=".repeat(80));

    for outcome in &report.executions {
        println!("\n[{}] {}", outcome.question_id, outcome.sql);
        match (&outcome.response, &outcome.error) {
            (Some(response), _) => println!("{}", serde_json::to_string_pretty(response)?),
            (None, Some(error)) => println!("Error: {}", error),
            (None, None) => {}
        }
    }

    Ok(())
}

fn show_tables(data: &DataPaths, names: &[String]) -> Result<()> {
    let catalog = Catalog::load(&data.data_dict, &data.schema)?;

    let output = if names.is_empty() {
        serde_json::to_string_pretty(&catalog.database_summary())?
    } else {
        serde_json::to_string_pretty(&catalog.table_details(names))?
    };
    println!("{}", output);
    Ok(())
}

async fn run_query(data: &DataPaths, query: QueryServiceConfig, sql: &str) -> Result<()> {
    let catalog = Catalog::load(&data.data_dict, &data.schema)?;
    let service = HttpQueryService::new(&query)?;

    let response = catalog.execute_query(&service, sql).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

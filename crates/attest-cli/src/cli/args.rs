use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "attest",
    version,
    about = "Check natural-language content against plain-English criteria with an LLM judge"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate one piece of content against one criterion
    Check(CheckArgs),
    Version,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Plain-English criterion the content must meet
    pub criterion: String,

    /// Content to evaluate; omit when reading from --stdin
    pub content: Option<String>,

    /// Backend model as provider/model
    #[arg(long, default_value = attest_core::model::DEFAULT_MODEL)]
    pub model: String,

    /// API key; ${VAR} placeholders expand from the environment
    #[arg(long, env = "ATTEST_API_KEY")]
    pub api_key: Option<String>,

    /// Custom endpoint base URL
    #[arg(long, env = "ATTEST_API_BASE")]
    pub api_base: Option<String>,

    /// Sampling temperature forwarded to the backend
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Completion token cap forwarded to the backend
    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Replace the built-in evaluator instruction
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Read content from standard input
    #[arg(long, conflicts_with = "content")]
    pub stdin: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

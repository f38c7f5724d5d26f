use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable records with indented facts
    Terminal,
    /// Merged records as pretty-printed JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "linemap")]
#[command(about = "Line-by-line Python behavior explainer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Python file to analyze
    pub path: PathBuf,

    /// Entry routine to invoke under the line tracer
    #[arg(long)]
    pub entry: Option<String>,

    /// Positional argument for the entry routine, as a JSON value (repeatable)
    #[arg(long = "arg")]
    pub args: Vec<String>,

    /// Keyword argument for the entry routine, as KEY=JSON (repeatable)
    #[arg(long = "kwarg")]
    pub kwargs: Vec<String>,

    /// Text served to input() inside the traced call, one line per read
    #[arg(long, default_value = "")]
    pub stdin: String,

    /// Render the merged records through the local LLM backend
    #[arg(long)]
    pub llm: bool,

    /// Output format for the merged records
    #[arg(short, long, value_enum, default_value = "terminal")]
    pub format: OutputFormat,
}

use anyhow::{Context, Result};
use clap::Parser;
use linemap::cli::{Cli, OutputFormat};
use linemap::config::BackendConfig;
use linemap::llm::{self, OllamaBackend};
use linemap::trace::TraceRequest;
use linemap::LineRecord;
use serde_json::{Map, Value};

fn main() -> Result<()> {
    env_logger::init();
    // resolve the backend availability flag up front, before any analysis
    log::debug!("llm backend available: {}", OllamaBackend::available());
    let cli = Cli::parse();

    let request = build_request(&cli)?;
    let (mut records, captured) = linemap::explain_file(&cli.path, &request)?;

    match cli.format {
        OutputFormat::Terminal => print_records(&records, &captured),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
    }

    if cli.llm {
        let backend = OllamaBackend::new(BackendConfig::from_env())?;
        llm::apply_precheck_flags(&mut records);
        let response = llm::render_explanations(&records, &backend, backend.retries())?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

fn build_request(cli: &Cli) -> Result<TraceRequest> {
    let args = cli.args.iter().map(|raw| parse_json_value(raw)).collect();
    let mut kwargs = Map::new();
    for raw in &cli.kwargs {
        let (key, value) = raw
            .split_once('=')
            .with_context(|| format!("--kwarg must be KEY=VALUE, got '{raw}'"))?;
        kwargs.insert(key.to_string(), parse_json_value(value));
    }
    Ok(TraceRequest {
        entry: cli.entry.clone(),
        args,
        kwargs,
        stdin: cli.stdin.clone(),
    })
}

// Values that fail to parse as JSON pass through as strings.
fn parse_json_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_records(records: &[LineRecord], captured: &str) {
    for record in records {
        println!("[L{}] {}", record.line, record.code);
        for fact in &record.facts {
            println!("   - {fact}");
        }
    }
    if !captured.trim().is_empty() {
        println!("\n--- program output ---");
        println!("{}", captured.trim());
    }
}

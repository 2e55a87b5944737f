//! A terminal front end for the playground.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use insight_agent::core::{DEFAULT_MAX_TOKENS, Fragment, ReActOutput};
use insight_agent::llama_stack::{LlamaStackBackend, LlamaStackConfigBuilder};
use insight_agent::backend::{SamplingStrategy, ToolChoice};
use insight_agent::{Playground, PlaygroundSettings, split_prompts};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[derive(Parser, Debug)]
#[command(
    name = "insight-agent",
    version,
    about = "Chat with a tool-using agent on a Llama Stack server"
)]
struct Cli {
    #[arg(long, env = "LLAMA_STACK_HOST", default_value = "localhost")]
    host: String,
    #[arg(long, env = "LLAMA_STACK_PORT", default_value_t = 8321)]
    port: u16,
    #[arg(long, env = "LLAMA_STACK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Generation model, defaults to the first one available.
    #[arg(long)]
    model: Option<String>,
    /// Tool group identifier or label. Defaults to all connectors.
    #[arg(long = "tool-group")]
    tool_groups: Vec<String>,
    /// Knowledge source for retrieval.
    #[arg(long = "vector-db")]
    vector_dbs: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    #[arg(long, requires = "top_p")]
    temperature: Option<f64>,
    #[arg(long, requires = "temperature")]
    top_p: Option<f64>,
    #[arg(long, value_enum, default_value_t = ToolChoiceArg::Auto)]
    tool_choice: ToolChoiceArg,
    /// Bounds the inference steps of one turn.
    #[arg(long)]
    max_infer_iters: Option<u32>,
    /// Makes the agent answer with structured reasoning steps.
    #[arg(long)]
    react: bool,
    /// Sends the prompt and exits, can be repeated.
    #[arg(long = "prompt")]
    prompts: Vec<String>,
    /// Lists the catalog of the server and exits.
    #[arg(long)]
    list: bool,
    #[arg(long, env = "TAVILY_SEARCH_API_KEY", hide_env_values = true)]
    tavily_search_api_key: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ToolChoiceArg {
    Auto,
    Required,
    None,
}

impl From<ToolChoiceArg> for ToolChoice {
    fn from(arg: ToolChoiceArg) -> Self {
        match arg {
            ToolChoiceArg::Auto => ToolChoice::Auto,
            ToolChoiceArg::Required => ToolChoice::Required,
            ToolChoiceArg::None => ToolChoice::None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config =
        LlamaStackConfigBuilder::with_host_port(&cli.host, cli.port);
    if let Some(api_key) = &cli.api_key {
        config = config.with_api_key(api_key.as_str());
    }
    if let Some(api_key) = &cli.tavily_search_api_key {
        config = config
            .with_provider_data("tavily_search_api_key", api_key.as_str());
    }
    let backend = LlamaStackBackend::new(config.build());

    let mut playground = match Playground::load(backend).await {
        Ok(playground) => playground,
        Err(err) => {
            eprintln!("failed to reach the server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.list {
        return list_catalog(&playground).await;
    }

    let Some(settings) = settings_from(&cli, &playground) else {
        return ExitCode::FAILURE;
    };
    playground.reconfigure(settings);

    match playground.active_tools().await {
        Ok(tools) => println!("Active tools: 🛠 {}", tools.len()),
        Err(err) => warn!("cannot list active tools: {err}"),
    }
    println!("{}🤖 {}", BAR_CHAR.bright_cyan(), playground.greeting());

    if !cli.prompts.is_empty() {
        for text in &cli.prompts {
            for prompt in split_prompts(text) {
                println!("> {prompt}");
                if !chat(&mut playground, prompt, cli.react).await {
                    return ExitCode::FAILURE;
                }
            }
        }
        return ExitCode::SUCCESS;
    }

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        chat(&mut playground, line, cli.react).await;
    }
    ExitCode::SUCCESS
}

fn settings_from(
    cli: &Cli,
    playground: &Playground<LlamaStackBackend>,
) -> Option<PlaygroundSettings> {
    let defaults = playground.settings();
    let mut tool_groups = vec![];
    for arg in &cli.tool_groups {
        let groups = playground.tool_groups();
        let Some(group) = groups.find(arg).or_else(|| groups.find_by_label(arg))
        else {
            eprintln!("unknown tool group: {arg}");
            return None;
        };
        tool_groups.push(group.identifier().to_owned());
    }
    if tool_groups.is_empty() {
        tool_groups = defaults.tool_groups.clone();
    }

    let strategy = match (cli.temperature, cli.top_p) {
        (Some(temperature), Some(top_p)) => {
            SamplingStrategy::TopP { temperature, top_p }
        }
        _ => SamplingStrategy::Greedy,
    };

    Some(PlaygroundSettings {
        model: cli.model.clone(),
        tool_groups,
        vector_dbs: cli.vector_dbs.clone(),
        strategy,
        max_tokens: cli.max_tokens,
        instructions: include_str!("./instructions.md").to_owned(),
        tool_choice: cli.tool_choice.into(),
        max_infer_iters: cli.max_infer_iters,
        react: cli.react,
    })
}

async fn list_catalog(playground: &Playground<LlamaStackBackend>) -> ExitCode {
    println!("{}", "Models".bold());
    for model in playground.models() {
        println!("  {model}");
    }

    let groups = playground.tool_groups();
    for (title, descriptors) in [
        ("Connectors", groups.connectors()),
        ("Builtin tools", groups.builtins()),
    ] {
        println!("{}", title.bold());
        for descriptor in descriptors {
            println!(
                "  {} {}",
                descriptor.label(),
                descriptor.identifier().dimmed()
            );
        }
    }

    println!("{}", "Knowledge sources".bold());
    match playground.vector_dbs().await {
        Ok(vector_dbs) => {
            for vector_db in vector_dbs {
                println!("  {}", vector_db.identifier);
            }
        }
        Err(err) => {
            eprintln!("failed to list knowledge sources: {err}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

/// Sends one message and prints the answer as it arrives.
///
/// With `react`, the final answer of the reasoning step is printed again
/// on its own.
async fn chat(
    playground: &mut Playground<LlamaStackBackend>,
    message: &str,
    react: bool,
) -> bool {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut started = false;
    let result = playground
        .send_message(message, |fragment| {
            // Finish the progress bar before printing anything else.
            if !started {
                progress_bar.finish_and_clear();
                print!("{}🤖 ", BAR_CHAR.bright_cyan());
                started = true;
            }
            match fragment {
                Fragment::Text(text) => print!("{}", text.bright_white()),
                Fragment::ToolMarker => print!("{}", fragment.bright_yellow()),
                Fragment::Error(_) => print!("{}", fragment.bright_red()),
            }
            std::io::stdout().flush().ok();
        })
        .await;
    progress_bar.finish_and_clear();
    if started {
        println!();
    }

    match result {
        Ok(answer) => {
            if react {
                match ReActOutput::parse(&answer).and_then(|o| o.answer) {
                    Some(answer) => {
                        println!("{}✅ {}", BAR_CHAR.bright_green(), answer)
                    }
                    None => debug!("no final answer in this step"),
                }
            }
            true
        }
        Err(err) => {
            eprintln!("{}{}", BAR_CHAR.bright_red(), err);
            false
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

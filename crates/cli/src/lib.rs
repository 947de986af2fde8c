use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nutrikid_advisor::plan::{generate_plan, PlanRequest};
use nutrikid_advisor::{
    analyze_intake, answer_question, AdvisorConfig, AdvisorContext, AnalysisRequest, Audience,
    QaRequest,
};
use nutrikid_nutrition::{assess_risk, detect_deficiencies, NutrientRisk, RiskAssessment};
use nutrikid_retrieval::EmbeddingMode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

mod http_api;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "nutrikid")]
#[command(about = "Pediatric nutrition Q&A, diet screening and gated plan generation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Config file (default: ./nutrikid.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Embedding model directory (overrides NUTRIKID_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Vector index JSON (overrides NUTRIKID_INDEX_PATH)
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,

    /// Documents JSON (overrides NUTRIKID_DOCUMENTS_PATH)
    #[arg(long, global = true)]
    documents_path: Option<PathBuf>,

    /// Base URL of the chat-completion API (overrides NUTRIKID_GENERATION_URL)
    #[arg(long, global = true)]
    generation_url: Option<String>,

    /// Generation timeout in seconds (overrides NUTRIKID_GENERATION_TIMEOUT_SECS)
    #[arg(long, global = true)]
    generation_timeout_secs: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EmbedMode {
    Fast,
    Stub,
}

impl From<EmbedMode> for EmbeddingMode {
    fn from(mode: EmbedMode) -> Self {
        match mode {
            EmbedMode::Fast => Self::Fast,
            EmbedMode::Stub => Self::Stub,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AudienceArg {
    Parent,
    Kid,
}

impl From<AudienceArg> for Audience {
    fn from(audience: AudienceArg) -> Self {
        match audience {
            AudienceArg::Parent => Self::Parent,
            AudienceArg::Kid => Self::Kid,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a nutrition question from the reference corpus
    Ask(AskArgs),

    /// Generate a gated multi-day diet plan from a plan request
    Plan(PlanArgs),

    /// Run deficiency detection and the risk gate without generating
    Assess(InputArgs),

    /// Analyse one day of meals
    Analyze(InputArgs),

    /// Serve the HTTP API
    #[command(name = "serve-http")]
    ServeHttp(ServeArgs),
}

#[derive(Args)]
struct AskArgs {
    /// The question
    question: String,

    #[arg(long, default_value = "5 years")]
    age: String,

    #[arg(long, default_value = "Unknown")]
    weight: String,

    #[arg(long, default_value = "None")]
    conditions: String,

    #[arg(long, default_value = "None")]
    prescription: String,

    #[arg(long, value_enum, default_value = "parent")]
    audience: AudienceArg,
}

#[derive(Args)]
struct InputArgs {
    /// Request JSON file, or `-` for stdin
    #[arg(long, short, default_value = "-")]
    input: String,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Include the orchestrator state trace in the output
    #[arg(long)]
    trace: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

/// Output of `nutrikid assess`.
#[derive(Debug, Serialize)]
struct AssessmentOutput {
    deficiencies: Vec<NutrientRisk>,
    assessment: RiskAssessment,
}

pub async fn main_entry() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ORT is extremely noisy outside verbose mode.
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    match dotenv {
        Ok(path) => log::info!("Loaded environment from {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => log::warn!("Failed to load .env file: {err}"),
    }

    let config = load_config(&cli)?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Ask(args) => run_ask(args, &config, pretty).await?,
        Commands::Plan(args) => run_plan(args, &config, pretty).await?,
        Commands::Assess(args) => run_assess(&args, pretty)?,
        Commands::Analyze(args) => run_analyze(&args, &config, pretty).await?,
        Commands::ServeHttp(args) => serve_http(args, &config).await?,
    }
    Ok(())
}

/// Defaults, config file and environment, then command-line flags on top.
fn load_config(cli: &Cli) -> Result<AdvisorConfig> {
    let mut config =
        AdvisorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(mode) = cli.embed_mode {
        config.retrieval.embedding_mode = mode.into();
    }
    if let Some(dir) = &cli.model_dir {
        config.retrieval.model_dir.clone_from(dir);
    }
    if let Some(path) = &cli.index_path {
        config.retrieval.index_path.clone_from(path);
    }
    if let Some(path) = &cli.documents_path {
        config.retrieval.documents_path.clone_from(path);
    }
    if let Some(url) = &cli.generation_url {
        config.generation.base_url.clone_from(url);
    }
    if let Some(secs) = cli.generation_timeout_secs {
        config.generation.timeout_secs = secs;
    }
    Ok(config)
}

fn read_input(input: &str) -> Result<String> {
    let raw = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read JSON from stdin")?;
        buffer
    } else {
        fs::read_to_string(Path::new(input))
            .with_context(|| format!("Failed to read JSON from {input}"))?
    };
    if raw.trim().is_empty() {
        anyhow::bail!("Request is empty. Provide --input <file> or pipe JSON via stdin.");
    }
    Ok(raw)
}

fn parse_input<T: DeserializeOwned>(args: &InputArgs) -> Result<T> {
    let raw = read_input(&args.input)?;
    serde_json::from_str(&raw).context("Invalid JSON request")
}

async fn run_ask(args: AskArgs, config: &AdvisorConfig, pretty: bool) -> Result<()> {
    let ctx = AdvisorContext::from_config(config).await?;
    let request = QaRequest {
        question: args.question,
        age: args.age,
        weight: args.weight,
        conditions: args.conditions,
        prescription: args.prescription,
        audience: args.audience.into(),
    };
    let answer = answer_question(&ctx, &request).await;
    print_json(&answer, pretty)
}

async fn run_plan(args: PlanArgs, config: &AdvisorConfig, pretty: bool) -> Result<()> {
    let request: PlanRequest = parse_input(&args.input)?;
    let ctx = AdvisorContext::generation_only(config)?;
    let outcome = generate_plan(&ctx, &request).await?;
    if args.trace {
        print_json(&outcome, pretty)
    } else {
        print_json(&outcome.response, pretty)
    }
}

fn run_assess(args: &InputArgs, pretty: bool) -> Result<()> {
    let request: PlanRequest = parse_input(args)?;
    let profile = &request.child_profile;
    let deficiencies = detect_deficiencies(&request.meal_logs, profile.age);
    let assessment = assess_risk(
        profile,
        &deficiencies,
        request.doctor_notes.as_deref().unwrap_or_default(),
    );
    print_json(
        &AssessmentOutput {
            deficiencies,
            assessment,
        },
        pretty,
    )
}

async fn run_analyze(args: &InputArgs, config: &AdvisorConfig, pretty: bool) -> Result<()> {
    let request: AnalysisRequest = parse_input(args)?;
    let ctx = AdvisorContext::generation_only(config)?;
    let report = analyze_intake(&ctx, &request).await;
    print_json(&report, pretty)
}

async fn serve_http(args: ServeArgs, config: &AdvisorConfig) -> Result<()> {
    let ctx = AdvisorContext::from_config(config).await?;
    let app = http_api::router(std::sync::Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    print_stdout(&format!("Serving NutriKid API: {base_url}"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    print_stdout(&format!(
        "Try: curl -X POST {base_url}/ask -H 'Content-Type: application/json' -d '{{\"question\":\"Iron rich snacks?\"}}'"
    ))?;
    axum::serve(listener, app).await?;
    Ok(())
}

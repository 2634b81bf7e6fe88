use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rubric_core::cache::{key, CacheStore};
use rubric_core::config::Settings;
use rubric_core::engine::{Evaluator, Runner};
use rubric_core::model::SelectionMethod;
use rubric_core::planner::DimensionPlanner;
use rubric_core::providers::llm::openai::{OpenAiClient, OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use rubric_core::providers::llm::ChatClient;
use rubric_core::providers::replay::ReplayClient;
use rubric_core::scorer::ParallelScorer;

#[derive(Parser)]
#[command(
    name = "rubric",
    version,
    about = "Pointwise quality evaluation of deep research reports"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    Run(RunArgs),
    Cache(CacheArgs),
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone)]
struct RunArgs {
    #[arg(long, default_value = "rubric.yaml")]
    config: PathBuf,

    /// data directory (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// models to evaluate (overrides config; default: all with data)
    #[arg(long, value_delimiter = ',')]
    models: Vec<String>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// judge model identifier (overrides config)
    #[arg(long, env = "RUBRIC_JUDGE_MODEL")]
    judge_model: Option<String>,

    /// judge provider: openai|openrouter|replay (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// canned responses for --provider replay
    #[arg(long)]
    replay_file: Option<PathBuf>,

    #[arg(long)]
    max_queries: Option<usize>,

    /// explicit query ids, comma separated
    #[arg(long, value_delimiter = ',')]
    query_ids: Vec<u64>,

    /// selection method when --max-queries is set: first|random
    #[arg(long)]
    selection: Option<String>,

    #[arg(long)]
    seed: Option<u64>,

    /// outer worker pool size (concurrent queries)
    #[arg(long)]
    query_workers: Option<usize>,

    #[arg(long)]
    output: Option<PathBuf>,

    /// load data and validate configuration, then stop
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
struct CacheArgs {
    #[command(subcommand)]
    cmd: CacheSub,
    #[arg(long, default_value = "rubric.yaml")]
    config: PathBuf,
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheSub {
    /// per-namespace entry counts
    Stats,
    /// drop every cached namespace (the only invalidation path)
    Clear,
}

#[derive(Parser, Clone)]
struct InitArgs {
    #[arg(long, default_value = "rubric.yaml")]
    config: PathBuf,
}

mod exit_codes {
    pub const OK: i32 = 0;
    pub const RUN_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Cache(args) => cmd_cache(args),
        Command::Init(args) => cmd_init(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let mut settings = Settings::load(&args.config).map_err(|e| anyhow::anyhow!(e))?;
    apply_overrides(&mut settings, &args)?;
    settings
        .evaluation
        .validate()
        .map_err(|e| anyhow::anyhow!(e))?;

    let queries = rubric_core::loader::load_queries(&settings.data_dir)?;
    let model_results = rubric_core::loader::load_model_results(&settings.data_dir)?;
    eprintln!(
        "loaded {} queries, {} model result sets",
        queries.len(),
        model_results.len()
    );

    let available: Vec<String> = model_results.keys().cloned().collect();
    let target_models: Vec<String> = if settings.target_models.is_empty() {
        available.clone()
    } else {
        settings
            .target_models
            .iter()
            .filter(|m| available.contains(m))
            .cloned()
            .collect()
    };
    if target_models.is_empty() {
        anyhow::bail!("no target models with data (available: {:?})", available);
    }

    let cache = CacheStore::new(&settings.evaluation.cache_dir);

    if args.dry_run {
        eprintln!("dry run: configuration and data loading ok");
        for ns in key::ALL_NAMESPACES {
            eprintln!("cache {}: {} items", ns, cache.size(ns));
        }
        return Ok(exit_codes::OK);
    }

    let client = build_client(&settings, &args)?;
    let planner = DimensionPlanner::new(
        client.clone(),
        cache.clone(),
        settings.evaluation.max_attempts,
    );
    let scorer = ParallelScorer::new(
        client,
        cache.clone(),
        settings.evaluation.dimension_workers,
        settings.evaluation.max_attempts,
    );
    let runner = Runner::new(
        queries,
        model_results,
        planner,
        scorer,
        cache,
        settings.evaluation.query_workers,
    );

    let results = match runner
        .evaluate_all_queries(&target_models, &settings.query_selection)
        .await
    {
        Ok(results) => results,
        Err(e) => {
            eprintln!("evaluation failed: {e:?}");
            return Ok(exit_codes::RUN_FAILED);
        }
    };

    if settings.output.print_results {
        rubric_core::report::console::print_results(&results);
    }
    rubric_core::report::json::write_results(&results, &settings.output.results_file)?;
    eprintln!("results saved to {}", settings.output.results_file.display());

    for (ns, size) in runner.cache_statistics() {
        eprintln!("cache {}: {} items", ns, size);
    }

    Ok(exit_codes::OK)
}

fn apply_overrides(settings: &mut Settings, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(data_dir) = &args.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if !args.models.is_empty() {
        settings.target_models = args.models.clone();
    }
    if let Some(cache_dir) = &args.cache_dir {
        settings.evaluation.cache_dir = cache_dir.clone();
    }
    if let Some(model) = &args.judge_model {
        settings.judge.model = model.clone();
    }
    if let Some(provider) = &args.provider {
        settings.judge.provider = provider.clone();
    }
    if let Some(workers) = args.query_workers {
        settings.evaluation.query_workers = workers;
    }
    if let Some(output) = &args.output {
        settings.output.results_file = output.clone();
    }
    if args.max_queries.is_some() {
        settings.query_selection.max_queries = args.max_queries;
    }
    if !args.query_ids.is_empty() {
        settings.query_selection.query_ids = Some(args.query_ids.clone());
    }
    if let Some(selection) = &args.selection {
        settings.query_selection.method = parse_selection(selection)?;
    }
    if let Some(seed) = args.seed {
        settings.query_selection.seed = seed;
    }
    Ok(())
}

fn parse_selection(raw: &str) -> anyhow::Result<SelectionMethod> {
    match raw {
        "first" => Ok(SelectionMethod::First),
        "random" => Ok(SelectionMethod::Random),
        other => anyhow::bail!("unknown selection method '{}' (expected first|random)", other),
    }
}

fn build_client(settings: &Settings, args: &RunArgs) -> anyhow::Result<Arc<dyn ChatClient>> {
    match settings.judge.provider.as_str() {
        "replay" => {
            let path = args
                .replay_file
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--provider replay requires --replay-file"))?;
            Ok(Arc::new(ReplayClient::from_path(path)?))
        }
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
            Ok(Arc::new(OpenAiClient::new(
                settings.judge.model.clone(),
                api_key,
                OPENAI_BASE_URL.to_string(),
                settings.judge.temperature,
                settings.judge.max_tokens,
            )))
        }
        "openrouter" => {
            let api_key = std::env::var("OPENROUTER_KEY")
                .map_err(|_| anyhow::anyhow!("OPENROUTER_KEY is not set"))?;
            Ok(Arc::new(OpenAiClient::new(
                settings.judge.model.clone(),
                api_key,
                OPENROUTER_BASE_URL.to_string(),
                settings.judge.temperature,
                settings.judge.max_tokens,
            )))
        }
        other => anyhow::bail!(
            "unsupported provider '{}' (expected openai|openrouter|replay)",
            other
        ),
    }
}

fn cmd_cache(args: CacheArgs) -> anyhow::Result<i32> {
    let cache_dir = match &args.cache_dir {
        Some(dir) => dir.clone(),
        None => {
            let settings = Settings::load(&args.config).map_err(|e| anyhow::anyhow!(e))?;
            settings.evaluation.cache_dir
        }
    };
    let cache = CacheStore::new(&cache_dir);

    match args.cmd {
        CacheSub::Stats => {
            for ns in key::ALL_NAMESPACES {
                println!("{}: {} items", ns, cache.size(ns));
            }
        }
        CacheSub::Clear => {
            for ns in key::ALL_NAMESPACES {
                cache.clear(ns);
            }
            eprintln!("all caches cleared in {}", cache_dir.display());
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
        return Ok(exit_codes::OK);
    }
    if let Some(parent) = args.config.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&args.config, SAMPLE_CONFIG)?;
    eprintln!("created {}", args.config.display());
    Ok(exit_codes::OK)
}

const SAMPLE_CONFIG: &str = r#"# rubric run settings
data_dir: data/arena

# models to evaluate; empty means every model found under method_results/
target_models: []

judge:
  model: gpt-5-mini
  provider: openai      # openai | openrouter | replay
  temperature: 0.1
  max_tokens: 8192

evaluation:
  cache_dir: outputs/cache
  query_workers: 1      # outer pool (concurrent queries)
  dimension_workers: 4  # inner pool (dimensions per report)
  concurrency_ceiling: 16
  max_attempts: 3

query_selection:
  # query_ids: [1, 2, 3]
  # max_queries: 10
  method: first         # first | random
  seed: 42

output:
  results_file: outputs/pointwise_results.json
  print_results: true
"#;

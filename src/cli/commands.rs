//! CLI command definitions for revival-scout.
//!
//! Every command wires the same stack: a GitHub source behind the
//! rate-limited client, a SQLite store and the scoring engine.

use crate::github::{GitHubClient, QuotaCategory, RepositorySource, SearchFilters};
use crate::pipeline::{PipelineConfig, PipelineOrchestrator};
use crate::ratelimit::{RateLimitCache, RateLimitedClient};
use crate::scheduler::{validate_repository, AnalysisDepth, Job, JobService, JobSettings};
use crate::scoring::{ScoringEngine, ScoringInput};
use crate::storage::{JobStore, RepositoryQuery, RepositoryStore, SqliteStore};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default SQLite database path.
const DEFAULT_DB_PATH: &str = "./revival-scout.db";

/// Default owner recorded on jobs started from the command line.
const DEFAULT_OWNER: &str = "cli";

/// Find abandoned GitHub repositories worth reviving.
#[derive(Parser)]
#[command(name = "revival-scout")]
#[command(about = "Discover GitHub repositories and score their revival potential")]
#[command(version)]
#[command(
    long_about = "revival-scout searches GitHub for repositories matching a set of filters, collects their signals through a rate-limited client and scores how promising a revival would be.\n\nExample usage:\n  revival-scout run --language rust --min-stars 500 --pushed-before 2023-01-01 --depth detailed"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Start a collection job and follow it to completion.
    Run(RunArgs),

    /// Score a single repository without starting a job.
    Score(ScoreArgs),

    /// Show the current rate-limit state of every quota category.
    Quota(QuotaArgs),

    /// List stored jobs for an owner.
    Jobs(JobsArgs),
}

/// Options shared by every command that talks to GitHub.
#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    /// GitHub token (falls back to GITHUB_TOKEN / GITHUB_PERSONAL_ACCESS_TOKEN).
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Alternative API root, e.g. a GitHub Enterprise instance.
    #[arg(long)]
    pub api_url: Option<String>,

    /// YAML file with pipeline overrides.
    #[arg(short = 'c', long)]
    pub config: Option<String>,
}

/// Arguments for `revival-scout run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Job name.
    #[arg(short = 'n', long, default_value = "revival scan")]
    pub name: String,

    /// Owner the job is recorded under.
    #[arg(long, default_value = DEFAULT_OWNER)]
    pub owner: String,

    /// Free-text keywords.
    #[arg(short = 'k', long)]
    pub keywords: Option<String>,

    /// Primary language.
    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub min_stars: Option<u64>,

    #[arg(long)]
    pub max_stars: Option<u64>,

    #[arg(long)]
    pub min_forks: Option<u64>,

    /// Only repositories last pushed before this date (YYYY-MM-DD).
    #[arg(long)]
    pub pushed_before: Option<NaiveDate>,

    /// Only repositories last pushed after this date (YYYY-MM-DD).
    #[arg(long)]
    pub pushed_after: Option<NaiveDate>,

    /// Comma-separated topics.
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// SPDX license key.
    #[arg(long)]
    pub license: Option<String>,

    /// Maximum number of repositories to accept.
    #[arg(short = 'm', long, default_value = "100")]
    pub max_results: u32,

    /// Collection depth.
    #[arg(short = 'd', long, value_enum, default_value_t = AnalysisDepth::Detailed)]
    pub depth: AnalysisDepth,

    #[arg(long)]
    pub include_archived: bool,

    #[arg(long)]
    pub include_forks: bool,

    /// Number of top repositories to print.
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// SQLite database path.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: String,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Output JSON to stdout instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for `revival-scout score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Repository as owner/name.
    pub repository: String,

    /// Which signal groups to fetch before scoring.
    #[arg(short = 'd', long, value_enum, default_value_t = AnalysisDepth::Comprehensive)]
    pub depth: AnalysisDepth,

    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for `revival-scout quota`.
#[derive(Parser, Debug)]
pub struct QuotaArgs {
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for `revival-scout jobs`.
#[derive(Parser, Debug)]
pub struct JobsArgs {
    #[arg(long, default_value = DEFAULT_OWNER)]
    pub owner: String,

    #[arg(long, default_value = "20")]
    pub limit: usize,

    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: String,

    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_job_command(args).await,
        Commands::Score(args) => run_score_command(args).await,
        Commands::Quota(args) => run_quota_command(args).await,
        Commands::Jobs(args) => run_jobs_command(args).await,
    }
}

fn load_config(source: &SourceArgs) -> anyhow::Result<PipelineConfig> {
    let config = match source.config.as_deref() {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::from_env()?,
    };
    Ok(config)
}

fn build_client(source: &SourceArgs, config: &PipelineConfig) -> Arc<RateLimitedClient> {
    let mut github = match source.token.clone() {
        Some(token) => GitHubClient::new(Some(token)),
        None => GitHubClient::from_env(),
    };
    if let Some(url) = source.api_url.as_deref() {
        github = github.with_base_url(url);
    }
    if !github.has_token() {
        warn!("No GitHub token configured; unauthenticated quotas are very low");
    }

    let source: Arc<dyn RepositorySource> = Arc::new(github);
    let cache = Arc::new(RateLimitCache::new(config.quota_cache_ttl));
    Arc::new(RateLimitedClient::new(source, cache).with_config(config.client_config()))
}

// ============================================================================
// run
// ============================================================================

#[derive(Serialize)]
struct RankedRepository {
    full_name: String,
    html_url: String,
    potential_score: f64,
    tier: String,
    recommendation: String,
    reasoning: Vec<String>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    job: &'a Job,
    top: &'a [RankedRepository],
}

async fn run_job_command(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args.source)?;
    if args.metrics {
        crate::metrics::init_metrics()?;
    }

    let filters = SearchFilters {
        keywords: args.keywords.clone(),
        language: args.language.clone(),
        min_stars: args.min_stars,
        max_stars: args.max_stars,
        min_forks: args.min_forks,
        pushed_before: args.pushed_before,
        pushed_after: args.pushed_after,
        topics: args.topics.clone(),
        license: args.license.clone(),
    };
    let settings = JobSettings::default()
        .with_max_results(args.max_results)
        .with_depth(args.depth)
        .with_include_archived(args.include_archived)
        .with_include_forks(args.include_forks);

    let store = Arc::new(SqliteStore::open(&args.db).await?);
    let client = build_client(&args.source, &config);
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        client,
        store.clone(),
        store.clone(),
        Arc::new(ScoringEngine::default()),
        config,
    ));
    let service = Arc::new(JobService::new(orchestrator));

    let job_id = service
        .start_job(&args.owner, &args.name, filters, settings)
        .await?;
    info!(job_id = %job_id, db = %args.db, "Job started");
    if !args.json {
        println!("Started job {} ({})", job_id, args.name);
    }

    let interrupt = {
        let service = Arc::clone(&service);
        let owner = args.owner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(job_id = %job_id, "Interrupted, cancelling job");
                if let Err(e) = service.cancel_job(job_id, &owner).await {
                    warn!(job_id = %job_id, error = %e, "Cancellation failed");
                }
            }
        })
    };
    let job = service.wait_for(job_id).await?;
    interrupt.abort();
    service.shutdown().await;

    let query = RepositoryQuery::new()
        .with_ids(job.results.repository_ids.clone())
        .with_limit(args.top);
    let top: Vec<RankedRepository> = store
        .find_repositories(&query)
        .await?
        .into_iter()
        .map(|record| {
            let revival = record.revival();
            RankedRepository {
                full_name: record.full_name().to_string(),
                html_url: record.signal().html_url.clone(),
                potential_score: revival.potential_score,
                tier: revival.tier.to_string(),
                recommendation: revival.recommendation.to_string(),
                reasoning: revival.reasoning.clone(),
            }
        })
        .collect();

    if args.json {
        let output = RunOutput { job: &job, top: &top };
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        print_job_summary(&job);
        if !top.is_empty() {
            println!("  Top repositories:");
            for (rank, repo) in top.iter().enumerate() {
                println!(
                    "    {:>2}. {:<40} {:>5.1}  {}",
                    rank + 1,
                    repo.full_name,
                    repo.potential_score,
                    repo.tier
                );
            }
        }
    }

    if args.metrics {
        println!("{}", crate::metrics::export_metrics());
    }

    if let Some(error) = job.error.as_deref() {
        anyhow::bail!("job {} failed: {}", job.id, error);
    }
    Ok(())
}

fn print_job_summary(job: &Job) {
    let marker = match job.status() {
        crate::scheduler::JobStatus::Completed => "✓",
        crate::scheduler::JobStatus::Cancelled => "■",
        _ => "✗",
    };
    println!("{} Job {} {}", marker, job.id, job.status());
    println!(
        "  Repositories: {} found, {} collected, {} analyzed, {} high potential, {} errors",
        job.results.found,
        job.results.collected,
        job.results.analyzed,
        job.results.high_potential,
        job.results.errors
    );
    if let (Some(started), Some(completed)) = (job.started_at, job.completed_at) {
        let elapsed = (completed - started).to_std().unwrap_or(Duration::ZERO);
        println!("  Duration: {:.1}s", elapsed.as_secs_f64());
    }
}

// ============================================================================
// score
// ============================================================================

async fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    validate_repository(&args.repository).map_err(|e| anyhow::anyhow!(e))?;
    let config = load_config(&args.source)?;
    let client = build_client(&args.source, &config);

    let query = format!("repo:{}", args.repository);
    let page = client.search(&query, 1, 1).await?;
    let signal = page
        .items
        .into_iter()
        .find(|item| item.full_name.eq_ignore_ascii_case(&args.repository))
        .ok_or_else(|| anyhow::anyhow!("repository {} not found", args.repository))?;
    let (owner, name) = signal
        .owner_and_name()
        .map(|(o, n)| (o.to_string(), n.to_string()))
        .ok_or_else(|| anyhow::anyhow!("malformed repository name {}", signal.full_name))?;

    let metrics = client.metrics(&owner, &name).await?;
    let activity = if args.depth.fetches_activity() {
        Some(client.activity(&owner, &name).await?)
    } else {
        None
    };
    let quality = if args.depth.fetches_quality() {
        Some(client.quality(&owner, &name).await?)
    } else {
        None
    };

    let mut input = ScoringInput::new(&signal, Utc::now()).with_metrics(&metrics);
    if let Some(activity) = activity.as_ref() {
        input = input.with_activity(activity);
    }
    if let Some(quality) = quality.as_ref() {
        input = input.with_quality(quality);
    }
    let assessment = ScoringEngine::default().assess(&input);

    if args.json {
        let json_output = serde_json::to_string_pretty(&assessment)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{} ({} depth)", signal.full_name, args.depth);
    println!(
        "  Revival potential: {:.1} [{}] -> {}",
        assessment.potential_score, assessment.tier, assessment.recommendation
    );
    println!(
        "  Confidence: {:.0}% (multiplier {:.2})",
        assessment.confidence, assessment.confidence_multiplier
    );
    println!(
        "  Code quality: {:.1}{}",
        assessment.code_quality.overall,
        if assessment.code_quality.estimated {
            " (estimated)"
        } else {
            ""
        }
    );
    println!("  Business: {:.1}", assessment.business.overall);
    for line in &assessment.reasoning {
        println!("  - {}", line);
    }
    Ok(())
}

// ============================================================================
// quota
// ============================================================================

#[derive(Serialize)]
struct QuotaRow {
    category: QuotaCategory,
    limit: u32,
    remaining: u32,
    reset_at: String,
}

async fn run_quota_command(args: QuotaArgs) -> anyhow::Result<()> {
    let config = load_config(&args.source)?;
    let client = build_client(&args.source, &config);
    let snapshot = client.refresh_rate_limits().await?;

    let rows: Vec<QuotaRow> = QuotaCategory::ALL
        .iter()
        .filter_map(|category| {
            snapshot.get(category).map(|info| QuotaRow {
                category: *category,
                limit: info.limit,
                remaining: info.remaining,
                reset_at: info.reset_at.to_rfc3339(),
            })
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!(
                "{:<8} {:>5}/{:<5} resets {}",
                row.category, row.remaining, row.limit, row.reset_at
            );
        }
    }
    Ok(())
}

// ============================================================================
// jobs
// ============================================================================

async fn run_jobs_command(args: JobsArgs) -> anyhow::Result<()> {
    let store = SqliteStore::open(&args.db).await?;
    let jobs = store.list_jobs(&args.owner, args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs for {}", args.owner);
        return Ok(());
    }
    for job in &jobs {
        println!(
            "{}  {:<10} {:>5.1}%  {:<24} found={} analyzed={} high={}",
            job.id,
            job.status(),
            job.progress.percentage,
            job.name,
            job.results.found,
            job.results.analyzed,
            job.results.high_potential
        );
    }
    Ok(())
}

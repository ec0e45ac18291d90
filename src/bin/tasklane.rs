//! tasklane CLI: operator interface to the task dispatcher.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tasklane::config::secrets::ExposeSecret;
use tasklane::config::{Config, ExecutorSettings};
use tasklane::db::Db;
use tasklane::dispatcher::{DispatchOptions, Dispatcher};
use tasklane::engine::{TaskExecutor, Worker, WorkerConfig};
use tasklane::external::HttpService;
use tasklane::ledger::{CompletionLedger, InMemoryLedger, RedisLedger};
use tasklane::model::{Task, TaskId};
use tasklane::queue::{InMemoryQueue, PgmqQueue, TaskQueue};
use tasklane::telemetry::{TelemetryConfig, init_telemetry};
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tasklane", about = "Two-lane task dispatch with retries and deadlines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run workers for the short and long task queues
    Serve {
        /// TOML file with an [executor] table; overrides environment values
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Maximum concurrent task executions
        #[arg(long, default_value_t = 8)]
        max_concurrent: usize,
        /// Use an in-process queue and ledger instead of Postgres and Redis.
        /// Tasks are read as JSON lines from --tasks (or stdin).
        #[arg(long)]
        in_memory: bool,
        /// JSON-lines submission file for --in-memory; `-` reads stdin
        #[arg(long, requires = "in_memory", default_value = "-")]
        tasks: String,
    },
    /// Submit a task
    Submit {
        /// Task id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
        /// Priority (lower = served first)
        #[arg(long, default_value_t = 1)]
        priority: i32,
        /// Queue on the long-running lane (no deadline)
        #[arg(long)]
        long: bool,
    },
    /// Show whether a task id is recorded as completed
    Status {
        /// Task id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            settings,
            max_concurrent,
            in_memory,
            tasks,
        } => {
            let tasks = in_memory.then_some(tasks);
            cmd_serve(settings, max_concurrent, tasks).await
        }
        Command::Submit {
            id,
            payload,
            priority,
            long,
        } => cmd_submit(id, payload, priority, long).await,
        Command::Status { id } => cmd_status(id).await,
    }
}

/// Run the worker. `tasks` is the submission source for an in-process run;
/// `None` means pgmq and Redis.
async fn cmd_serve(
    settings: Option<PathBuf>,
    max_concurrent: usize,
    tasks: Option<String>,
) -> anyhow::Result<()> {
    let config = if tasks.is_some() {
        Config::from_env_in_memory()?
    } else {
        Config::from_env()?
    };

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "tasklane".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let executor_settings = match settings {
        Some(path) => ExecutorSettings::load_from_file(&path)?,
        None => config.executor.clone(),
    };

    let (queue, ledger): (Arc<dyn TaskQueue>, Arc<dyn CompletionLedger>) = if tasks.is_some() {
        (Arc::new(InMemoryQueue::new()), Arc::new(InMemoryLedger::new()))
    } else {
        let stores = config.stores()?;
        (
            Arc::new(pgmq_queue(&config).await?),
            Arc::new(RedisLedger::connect(stores.redis_url.expose_secret()).await?),
        )
    };

    let service = Arc::new(HttpService::new(config.external_api_url.clone()));
    let executor = Arc::new(TaskExecutor::new(ledger, service, executor_settings)?);
    let active = executor.settings();
    info!(
        max_retries = active.max_retries,
        base_backoff_ms = active.base_backoff_delay.as_millis() as u64,
        task_timeout_ms = active.task_timeout.as_millis() as u64,
        "executor configured"
    );

    if let Some(source) = tasks {
        let dispatcher = Dispatcher::new(Arc::clone(&queue));
        tokio::spawn(async move {
            let fed = if source == "-" {
                dispatcher
                    .submit_lines(BufReader::new(tokio::io::stdin()))
                    .await
            } else {
                match tokio::fs::File::open(&source).await {
                    Ok(file) => dispatcher.submit_lines(BufReader::new(file)).await,
                    Err(e) => Err(e.into()),
                }
            };
            match fed {
                Ok(queued) => info!(queued, source = %source, "submissions loaded"),
                Err(e) => error!(source = %source, "failed to load submissions: {e}"),
            }
        });
    }

    let worker = Worker::new(
        queue,
        executor,
        WorkerConfig {
            max_concurrent,
            ..WorkerConfig::default()
        },
    );

    let w = worker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        w.shutdown();
    });

    worker.run().await?;
    Ok(())
}

async fn cmd_submit(
    id: Option<String>,
    payload: Option<String>,
    priority: i32,
    long: bool,
) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let payload: serde_json::Value = match payload {
        Some(json) => serde_json::from_str(&json)?,
        None => serde_json::json!({}),
    };
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let task = Task::new(id, payload);

    let options = if long {
        DispatchOptions::long()
    } else {
        DispatchOptions::short()
    }
    .priority(priority);

    let dispatcher = Dispatcher::new(Arc::new(pgmq_queue(&config).await?));
    dispatcher.submit(&task, options).await?;

    println!(
        "Queued: {} (class: {}, priority: {})",
        task.id, options.class, options.priority
    );
    Ok(())
}

async fn cmd_status(id: String) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let ledger = RedisLedger::connect(config.stores()?.redis_url.expose_secret()).await?;

    let id = TaskId::new(id);
    if ledger.is_completed(&id).await? {
        println!("{id}: completed");
    } else {
        println!("{id}: not completed");
    }
    Ok(())
}

async fn pgmq_queue(config: &Config) -> anyhow::Result<PgmqQueue> {
    let db = Db::connect(config.stores()?.database_url.expose_secret()).await?;
    let queue = PgmqQueue::new(Arc::new(db));
    queue.create_queues().await?;
    Ok(queue)
}

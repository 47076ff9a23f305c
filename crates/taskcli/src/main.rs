// crates/taskcli/src/main.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use taskconditions::{ConditionalParameterParser, StaticSeriesLookup};
use taskcore::{
    BrokerError, BrokerRecord, IggyStatusPublisher, IggyStatusPublisherConfig, InMemoryBroker,
    Message, MessagePublisher, StatusUpdate, TaskStatus, WorkflowInstance,
};
use taskruntime::{ManagerConfig, RunnerRegistry, TaskManager};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "Task dispatch and condition evaluation CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available runner types
    Runners,

    /// Resolve and evaluate a branching condition against a workflow instance
    Evaluate {
        /// Condition, e.g. "{{ context.executions.task['a'].'score' }} > 0.5"
        #[arg(short, long)]
        condition: String,

        /// Path to workflow instance JSON file
        #[arg(short, long)]
        instance: PathBuf,

        /// Path to series attribute JSON file ({"<key>": ["v1", "v2"]})
        #[arg(short, long)]
        series: Option<PathBuf>,
    },

    /// Run the task manager over a file of inbound messages
    Serve {
        /// Path to a JSON lines file of messages
        #[arg(short, long)]
        messages: PathBuf,

        /// Path to task manager config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also publish status updates to an Iggy server
        #[arg(long)]
        iggy: Option<String>,

        /// Delay before a requeued message is delivered again
        #[arg(long, default_value_t = 500)]
        requeue_delay_ms: u64,

        /// Exit after this many seconds without broker activity
        #[arg(long, default_value_t = 5)]
        idle_secs: u64,
    },

    /// Validate a task manager config file
    CheckConfig {
        /// Path to config JSON file
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Runners => {
            list_runners();
        }

        Commands::Evaluate {
            condition,
            instance,
            series,
        } => {
            evaluate(&condition, &instance, series.as_deref()).await?;
        }

        Commands::Serve {
            messages,
            config,
            iggy,
            requeue_delay_ms,
            idle_secs,
        } => {
            serve(
                &messages,
                config.as_deref(),
                iggy,
                Duration::from_millis(requeue_delay_ms),
                Duration::from_secs(idle_secs),
            )
            .await?;
        }

        Commands::CheckConfig { file } => {
            check_config(&file)?;
        }
    }

    Ok(())
}

fn builtin_registry() -> RunnerRegistry {
    let mut registry = RunnerRegistry::new();
    taskrunners::register_all(&mut registry);
    registry
}

fn list_runners() {
    println!("📦 Available Runner Types:");
    println!();

    let registry = builtin_registry();
    for runner_type in registry.list_runner_types() {
        if let Some(metadata) = registry.get_metadata(&runner_type) {
            println!("  • {} ({})", runner_type, metadata.category);
            println!("    {}", metadata.description);
            for arg in &metadata.arguments {
                let marker = if arg.required { "required" } else { "optional" };
                println!("      - {} [{}]: {}", arg.name, marker, arg.description);
            }
        } else {
            println!("  • {}", runner_type);
        }
    }
}

async fn evaluate(condition: &str, instance: &Path, series: Option<&Path>) -> Result<()> {
    let instance_json = std::fs::read_to_string(instance)
        .with_context(|| format!("reading instance {}", instance.display()))?;
    let instance: WorkflowInstance = serde_json::from_str(&instance_json)?;

    let lookup = match series {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading series attributes {}", path.display()))?;
            serde_json::from_str::<StaticSeriesLookup>(&raw)?
        }
        None => StaticSeriesLookup::new(),
    };
    let parser = ConditionalParameterParser::new(Arc::new(lookup));

    println!("🔍 Condition: {}", condition);
    match parser.resolve_parameters(condition, &instance).await {
        Ok(resolved) => println!("   Resolved:  {}", resolved),
        Err(e) => println!("   Resolution failed: {}", e),
    }

    let result = parser.try_parse(condition, &instance).await;
    println!("{} Result: {}", if result { "✅" } else { "❌" }, result);
    Ok(())
}

fn check_config(file: &Path) -> Result<()> {
    println!("🔍 Validating config: {}", file.display());

    let config = ManagerConfig::from_json_file(file)?;
    let registry = builtin_registry();

    println!("✅ Config is valid:");
    println!("   Max concurrent jobs: {}", config.max_concurrent_jobs);
    println!("   Task update topic: {}", config.task_update_topic);
    println!("   Application id: {}", config.application_id);
    if let Some(capacity) = config.queue_capacity {
        println!("   Queue capacity: {}", capacity);
    }

    let mut plugins: Vec<_> = config.plugins.iter().collect();
    plugins.sort();
    for (selector, runner_type) in plugins {
        if registry.get_metadata(runner_type).is_some() {
            println!("   Plugin {} -> {}", selector, runner_type);
        } else {
            println!("   ⚠️  Plugin {} -> {} (no such runner type)", selector, runner_type);
        }
    }

    Ok(())
}

/// Publishes to Iggy and mirrors every message into the local broker
struct MirroredPublisher {
    primary: IggyStatusPublisher,
    mirror: Arc<InMemoryBroker>,
}

#[async_trait]
impl MessagePublisher for MirroredPublisher {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BrokerError> {
        let result = self.primary.publish(topic, message.clone()).await;
        self.mirror.publish(topic, message).await?;
        result
    }
}

fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading messages {}", path.display()))?;
    let mut messages = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let message: Message = serde_json::from_str(line)
            .with_context(|| format!("{}:{} is not a message", path.display(), index + 1))?;
        messages.push(message);
    }
    Ok(messages)
}

async fn serve(
    messages: &Path,
    config: Option<&Path>,
    iggy: Option<String>,
    requeue_delay: Duration,
    idle: Duration,
) -> Result<()> {
    let config = match config {
        Some(path) => ManagerConfig::from_json_file(path)?,
        None => ManagerConfig::default(),
    };
    let messages = read_messages(messages)?;
    println!("🚀 Loaded {} messages", messages.len());

    let registry = builtin_registry().with_aliases(&config.plugins);
    let update_topic = config.task_update_topic.clone();

    let (redelivery_tx, mut redelivery_rx) = mpsc::unbounded_channel();
    let broker = Arc::new(InMemoryBroker::default().with_redelivery(redelivery_tx));

    let publisher: Arc<dyn MessagePublisher> = match iggy {
        Some(connection_string) => {
            let iggy_config = IggyStatusPublisherConfig {
                connection_string,
                topic_name: config.task_update_topic.clone(),
                ..Default::default()
            };
            Arc::new(MirroredPublisher {
                primary: IggyStatusPublisher::connect(iggy_config).await?,
                mirror: broker.clone(),
            })
        }
        None => broker.clone(),
    };

    let token = CancellationToken::new();
    let manager = Arc::new(
        TaskManager::new(config, Arc::new(registry), publisher, broker.clone()).with_cancellation(&token),
    );

    let mut records = broker.subscribe();
    let handle = manager.start();

    let requeue_manager = manager.clone();
    let requeue_token = token.clone();
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = requeue_token.cancelled() => break,
                message = redelivery_rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            tokio::time::sleep(requeue_delay).await;
            tracing::debug!("Redelivering message {}", message.message_id);
            if requeue_manager.queue_task(message).is_err() {
                break;
            }
        }
    });

    for message in messages {
        manager.queue_task(message)?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("🛑 Interrupted");
                break;
            }
            record = tokio::time::timeout(idle, records.recv()) => match record {
                Ok(Ok(record)) => print_record(&record),
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!("Skipped {} broker records", skipped);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_) => {
                    println!("💤 Idle for {}s, shutting down", idle.as_secs());
                    break;
                }
            },
        }
    }

    manager.stop().await;
    token.cancel();
    handle.await?;

    println!();
    println!("📊 Summary:");
    println!("   Status updates: {}", broker.status_updates(&update_topic).len());
    println!("   Acknowledged: {}", broker.acknowledged().len());
    println!("   Rejected: {}", broker.rejected().len());
    println!("   Still in flight: {}", manager.in_flight().await);

    Ok(())
}

fn print_record(record: &BrokerRecord) {
    match record {
        BrokerRecord::Published { topic, message } => match message.body_as::<StatusUpdate>() {
            Ok(update) => {
                let icon = match update.status {
                    TaskStatus::Accepted => "⏳",
                    TaskStatus::Succeeded => "✅",
                    _ => "❌",
                };
                print!(
                    "  {} [{}] task {} ({}) -> {}",
                    icon, topic, update.task_id, update.execution_id, update.status
                );
                match update.message {
                    Some(text) => println!(" {}: {}", update.reason, text),
                    None => println!(),
                }
            }
            Err(_) => println!("  📨 [{}] {}", topic, message.message_id),
        },
        BrokerRecord::Acknowledged { message_id } => {
            tracing::debug!("Acknowledged {}", message_id);
        }
        BrokerRecord::Rejected { message_id, requeue } => {
            if *requeue {
                println!("  🔁 Requeued {}", message_id);
            } else {
                println!("  ❌ Rejected {}", message_id);
            }
        }
    }
}

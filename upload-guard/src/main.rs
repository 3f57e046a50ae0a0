mod out;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use upload_guard::clients::aws::{self, DynamoMetadataStore, S3ObjectStore, SnsNotifier, StepFunctionsEngine};
use upload_guard::clients::memory::{MemoryMetadataStore, MemoryNotifier, MemoryObjectStore, MemoryWorkflowEngine};
use upload_guard::clients::{MetadataStore, Notifier, ObjectStore, WorkflowEngine};
use upload_guard::config::{ProcessorConfig, StarterConfig};
use upload_guard::{CorrelationId, Orchestrator, Pipeline};

#[derive(Parser)]
#[command(name = "upload-guard", version, about = "Encryption-at-rest checks for new S3 uploads")]
struct Cli {
    /// Use in-memory stand-ins instead of AWS
    #[arg(long, global = true)]
    mock: bool,

    /// AWS region, overriding the default provider chain
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an S3 notification and start the workflow for it
    Start {
        /// Notification JSON file, `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,
        #[arg(long)]
        correlation_id: Option<String>,
    },
    /// Workflow task: check encryption, record metadata, send alerts
    Process {
        /// `{bucket, key, correlationId}` JSON file, `-` for stdin
        #[arg(long, default_value = "-")]
        input: PathBuf,
    },
    /// Run a notification through the whole pipeline in-process
    Run {
        #[arg(long, default_value = "-")]
        event: PathBuf,
        #[arg(long)]
        correlation_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Start { event, correlation_id } => {
            let config = StarterConfig::from_env()?;
            let engine: Arc<dyn WorkflowEngine> = if cli.mock {
                Arc::new(MemoryWorkflowEngine::new())
            } else {
                Arc::new(StepFunctionsEngine::new(&aws::load_config(cli.region).await))
            };
            let payload = out::read_document(&event).await?;
            let outcome = Orchestrator::new(config, engine)
                .handle_notification(&payload, CorrelationId::from_supplied(correlation_id.as_deref()))
                .await?;
            out::emit_stdout(&outcome)
        }
        Command::Process { input } => {
            let pipeline = build_pipeline(cli.mock, cli.region).await?;
            let payload = out::read_document(&input).await?;
            let result = pipeline.handle_task(&payload).await?;
            out::emit_stdout(&result)
        }
        Command::Run { event, correlation_id } => {
            let pipeline = build_pipeline(cli.mock, cli.region).await?;
            let payload = out::read_document(&event).await?;
            let outcome = pipeline
                .handle_notification(&payload, CorrelationId::from_supplied(correlation_id.as_deref()))
                .await?;
            out::emit_stdout(&outcome)
        }
    }
}

async fn build_pipeline(mock: bool, region: Option<String>) -> Result<Pipeline> {
    let config = ProcessorConfig::from_env()?;
    let (objects, metadata, notifier): (Arc<dyn ObjectStore>, Arc<dyn MetadataStore>, Arc<dyn Notifier>) = if mock {
        (
            Arc::new(MemoryObjectStore::new().assume_existing(Some("AES256"))),
            Arc::new(MemoryMetadataStore::encrypted()),
            Arc::new(MemoryNotifier::new()),
        )
    } else {
        let conf = aws::load_config(region).await;
        (
            Arc::new(S3ObjectStore::new(&conf)),
            Arc::new(DynamoMetadataStore::new(&conf)),
            Arc::new(SnsNotifier::new(&conf)),
        )
    };
    Ok(Pipeline::new(&config, objects, metadata, notifier))
}

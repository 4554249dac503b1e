//! Command Handlers
//!
//! Handler functions for CLI commands.

use crate::commands::{outbox::OutboxCommands, tracker::TrackerCommands, Cli, Commands, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output::{self, TrackerStatus};
use intake_core::{fixtures, normalize, validate_graph, IntakeGraph, RawAllocation, UserId};
use intake_executor::{
    ActivityLogger, DatastoreActivitySink, OrchestratorConfig, OutboxActivitySink,
    SubmissionOrchestrator, SubmissionRequest, SubmissionTracker,
};
use intake_store::{
    Datastore, IdentityProvider, KvStore, MemoryDatastore, RestConfig, RestDatastore,
    SessionIdentity, SledKvStore,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Validate {
            file,
            normalize_occupancy,
        } => handle_validate(file, *normalize_occupancy, cli.format),
        Commands::Normalize { file } => handle_normalize(file, cli.format),
        Commands::Sample { request } => handle_sample(*request, cli.format),
        Commands::Submit {
            file,
            user,
            memory,
            normalize_occupancy,
        } => handle_submit(&cli, file, user.as_deref(), *memory, *normalize_occupancy).await,
        Commands::Resume { user, memory } => handle_resume(&cli, user, *memory).await,
        Commands::Tracker(cmd) => handle_tracker(&cli, cmd).await,
        Commands::Outbox(cmd) => handle_outbox(&cli, cmd).await,
    }
}

fn read_json(path: &Path) -> CliResult<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Rewrite every property's `occupancy` into canonical allocations
pub fn normalize_graph_occupancy(graph: &mut Value) -> CliResult<()> {
    let Some(properties) = graph.get_mut("properties").and_then(Value::as_array_mut) else {
        return Ok(());
    };
    for property in properties {
        let raw = RawAllocation::from_json(property.get("occupancy").unwrap_or(&Value::Null));
        let normalized = serde_json::to_value(normalize(raw))?;
        if let Some(object) = property.as_object_mut() {
            object.insert("occupancy".to_string(), normalized);
        }
    }
    Ok(())
}

/// Accept either a bare graph or a submission request
fn load_graph(path: &Path, normalize_occupancy: bool) -> CliResult<IntakeGraph> {
    let mut value = read_json(path)?;
    if let Some(graph) = value.get("graph").cloned() {
        value = graph;
    }
    if normalize_occupancy {
        normalize_graph_occupancy(&mut value)?;
    }
    Ok(serde_json::from_value(value)?)
}

fn load_request(path: &Path, normalize_occupancy: bool) -> CliResult<SubmissionRequest> {
    let mut value = read_json(path)?;
    if normalize_occupancy {
        if let Some(graph) = value.get_mut("graph") {
            normalize_graph_occupancy(graph)?;
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn open_state(cli: &Cli) -> CliResult<Arc<SledKvStore>> {
    std::fs::create_dir_all(&cli.state_dir)?;
    Ok(Arc::new(SledKvStore::open(&cli.state_dir)?))
}

fn rest_datastore(cli: &Cli) -> CliResult<Arc<RestDatastore>> {
    let url = cli
        .datastore_url
        .clone()
        .ok_or_else(|| CliError::config("datastore URL is required (--datastore-url or --memory)"))?;
    let key = cli
        .api_key
        .clone()
        .ok_or_else(|| CliError::config("datastore API key is required (--api-key)"))?;

    let mut config = RestConfig::new(url, key);
    if let Some(token) = &cli.access_token {
        config = config.with_access_token(token.clone());
    }
    Ok(Arc::new(RestDatastore::new(config)?))
}

fn build_orchestrator(cli: &Cli, memory: bool) -> CliResult<SubmissionOrchestrator> {
    let datastore: Arc<dyn Datastore>;
    let identity: Arc<dyn IdentityProvider>;
    if memory {
        datastore = Arc::new(MemoryDatastore::new());
        identity = Arc::new(SessionIdentity::anonymous());
    } else {
        let rest = rest_datastore(cli)?;
        datastore = rest.clone();
        identity = rest;
    }
    let kv: Arc<dyn KvStore> = open_state(cli)?;

    let audit = ActivityLogger::new(Arc::new(DatastoreActivitySink::new(datastore.clone())))
        .with_fallback(Arc::new(OutboxActivitySink::new(kv.clone())));
    let config = OrchestratorConfig::from_env();
    info!(
        memory,
        concurrency = config.entity_write_concurrency,
        state_dir = %cli.state_dir.display(),
        "Orchestrator ready"
    );
    Ok(SubmissionOrchestrator::new(datastore, identity, kv, audit, config))
}

/// Handle graph validation
fn handle_validate(file: &Path, normalize_occupancy: bool, format: OutputFormat) -> CliResult<()> {
    let graph = load_graph(file, normalize_occupancy)?;
    let report = validate_graph(&graph)?;
    output::print_report(&report, format);
    Ok(())
}

/// Handle occupancy normalization
fn handle_normalize(file: &Path, format: OutputFormat) -> CliResult<()> {
    let raw = RawAllocation::from_json(&read_json(file)?);
    output::print_allocations(&normalize(raw), format);
    Ok(())
}

/// Handle sample output
fn handle_sample(request: bool, format: OutputFormat) -> CliResult<()> {
    let graph = fixtures::two_owners_one_rental();
    if request {
        let request = SubmissionRequest::new(graph, fixtures::contact());
        output::print_output(&request, format);
    } else {
        output::print_output(&graph, format);
    }
    Ok(())
}

/// Handle submission
async fn handle_submit(
    cli: &Cli,
    file: &Path,
    user: Option<&str>,
    memory: bool,
    normalize_occupancy: bool,
) -> CliResult<()> {
    let mut request = load_request(file, normalize_occupancy)?;
    if let Some(user) = user {
        request.user_id = Some(UserId::new(user));
    }

    let orchestrator = build_orchestrator(cli, memory)?;
    let result = orchestrator.submit(request).await;
    orchestrator.audit().flush().await;

    output::print_outcome(&result?, cli.format);
    Ok(())
}

/// Handle resuming a pending snapshot
async fn handle_resume(cli: &Cli, user: &str, memory: bool) -> CliResult<()> {
    let orchestrator = build_orchestrator(cli, memory)?;
    let result = orchestrator.resume_pending(&UserId::new(user)).await;
    orchestrator.audit().flush().await;

    match result? {
        Some(outcome) => output::print_outcome(&outcome, cli.format),
        None => output::print_info(&format!("No pending submission for {}", user)),
    }
    Ok(())
}

/// Handle tracker commands
async fn handle_tracker(cli: &Cli, cmd: &TrackerCommands) -> CliResult<()> {
    let kv: Arc<dyn KvStore> = open_state(cli)?;
    let config = OrchestratorConfig::from_env();
    let tracker = SubmissionTracker::new(kv.clone(), config.tracker);
    let pending = intake_executor::PendingStore::new(kv);

    match cmd {
        TrackerCommands::Status { user } => {
            let user = UserId::new(user.as_str());
            let status = TrackerStatus {
                user_id: user.to_string(),
                state: tracker.state(&user).await?,
                remembered_submission: tracker
                    .remembered_submission(&user)
                    .await?
                    .map(|id| id.to_string()),
                force_retry: tracker.force_retry_requested(&user).await?,
                pending_snapshot: pending.load(&user).await?.is_some(),
                in_flight_total: tracker.in_flight_count().await?,
            };
            output::print_tracker_status(&status, cli.format);
        }
        TrackerCommands::Clear {
            user,
            pending: drop_pending,
        } => {
            let user = UserId::new(user.as_str());
            tracker.release(&user).await?;
            tracker.clear_completed(&user).await?;
            tracker.clear_force_retry(&user).await?;
            if *drop_pending {
                pending.clear(&user).await?;
            }
            output::print_success(&format!("Tracker cleared for {}", user));
        }
    }
    Ok(())
}

/// Handle outbox commands
async fn handle_outbox(cli: &Cli, cmd: &OutboxCommands) -> CliResult<()> {
    let outbox = OutboxActivitySink::new(open_state(cli)?);
    match cmd {
        OutboxCommands::List => {
            output::print_activity(&outbox.pending().await?, cli.format);
        }
        OutboxCommands::Replay => {
            let datastore = rest_datastore(cli)?;
            let sent = outbox.replay(datastore.as_ref()).await?;
            output::print_success(&format!("Replayed {} activity rows", sent));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_graph_occupancy() {
        let mut graph = json!({
            "properties": [
                { "occupancy": ["long_term_rent", "personal_use"] },
                { "occupancy": "short_term_rent" },
                {}
            ]
        });
        normalize_graph_occupancy(&mut graph).unwrap();

        let first = &graph["properties"][0]["occupancy"];
        assert_eq!(first[0]["status"], "personal_use");
        assert_eq!(first[0]["months"], 6);
        assert_eq!(first[1]["status"], "long_term_rent");

        assert_eq!(graph["properties"][1]["occupancy"][0]["months"], 12);
        assert_eq!(graph["properties"][2]["occupancy"][0]["status"], "personal_use");
    }

    #[test]
    fn test_load_graph_accepts_request_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        let request = SubmissionRequest::new(fixtures::two_owners_one_rental(), fixtures::contact());
        std::fs::write(&path, serde_json::to_string(&request).unwrap()).unwrap();

        let graph = load_graph(&path, false).unwrap();
        assert_eq!(graph, fixtures::two_owners_one_rental());
        assert_eq!(load_request(&path, false).unwrap(), request);
    }

    #[test]
    fn test_rest_datastore_requires_url() {
        let cli = <Cli as clap::Parser>::try_parse_from(["intake", "outbox", "replay"]).unwrap();
        if cli.datastore_url.is_none() {
            assert!(matches!(rest_datastore(&cli), Err(CliError::ConfigError { .. })));
        }
    }

    #[tokio::test]
    async fn test_memory_submit_then_tracker_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        let request = SubmissionRequest::new(fixtures::two_owners_one_rental(), fixtures::contact())
            .with_user(UserId::new("u1"));
        std::fs::write(&path, serde_json::to_string(&request).unwrap()).unwrap();

        let state_dir = dir.path().join("state");
        let state = state_dir.to_str().unwrap();
        let file = path.to_str().unwrap();
        let cli = <Cli as clap::Parser>::try_parse_from([
            "intake", "--state-dir", state, "--format", "json", "submit", file, "--memory",
        ])
        .unwrap();
        run(cli).await.unwrap();

        let kv: Arc<dyn KvStore> = Arc::new(SledKvStore::open(&state_dir).unwrap());
        let tracker = SubmissionTracker::new(kv, Default::default());
        assert!(tracker
            .remembered_submission(&UserId::new("u1"))
            .await
            .unwrap()
            .is_some());
    }
}

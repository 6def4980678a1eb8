//! CLI command implementations
//!
//! Both commands load the same inputs: configuration, model, data and
//! query description. `run` sends the query through the whole pipeline;
//! `explain` stops after rewriting.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::backend::{MemoryExecutor, MemorySourcer, MemoryStore};
use crate::config::EngineConfig;
use crate::core::{QueryPipeline, QuerySpec, RequestContext};
use crate::observability::{log_event, Event, Logger};
use crate::schema::SchemaLoader;

use super::args::{Command, QueryArgs};
use super::errors::{CliError, CliResult};
use super::io::read_json_file;

/// Loaded command inputs
pub struct Session {
    pub config: EngineConfig,
    pub pipeline: QueryPipeline,
    pub description: QuerySpec,
    pub context: RequestContext,
}

/// Dispatch a parsed command, returning the response data
pub async fn run_command(command: Command) -> CliResult<Value> {
    match command {
        Command::Run(args) => execute(&args).await,
        Command::Explain(args) => explain(&args),
    }
}

/// Load every input named by `args` and assemble the pipeline
pub fn load_session(args: &QueryArgs) -> CliResult<Session> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Logger::set_min_severity(config.severity());
    log_event(
        Event::ConfigLoaded,
        &[
            ("api_root", config.api_root.as_str()),
            ("default_policy", config.default_policy.as_str()),
            ("max_depth", config.max_depth.to_string().as_str()),
        ],
    );

    let model = Arc::new(SchemaLoader::load_file(&args.model)?);
    log_event(
        Event::ModelLoaded,
        &[
            ("elements", model.elements().count().to_string().as_str()),
            ("namespace", model.namespace()),
        ],
    );

    let data: Value = read_json_file(&args.data)?;
    let store = Arc::new(
        MemoryStore::from_json(&data).map_err(|e| CliError::input_error(e.to_string()))?,
    );
    let description: QuerySpec = read_json_file(&args.query)?;

    let hooks = config.hook_registry(MemorySourcer::new(store.clone()));
    let pipeline = QueryPipeline::builder(model, hooks, Arc::new(MemoryExecutor::new(store)))
        .with_max_depth(config.max_depth)
        .build();

    Ok(Session {
        config,
        pipeline,
        description,
        context: request_context(args),
    })
}

fn request_context(args: &QueryArgs) -> RequestContext {
    if args.service_role {
        RequestContext::service_role()
    } else if let Some(user) = args.user {
        RequestContext::for_user(user)
    } else {
        RequestContext::anonymous()
    }
}

/// Execute the query and return its result
pub async fn execute(args: &QueryArgs) -> CliResult<Value> {
    let session = load_session(args)?;
    let request = session
        .description
        .to_request(
            session.pipeline.model(),
            session.context,
            Some(session.config.api_root.as_str()),
        )
        .map_err(|e| CliError::input_error(format!("{}: {}", e.code(), e)))?;

    // Ctrl-C cancels the request at its next boundary
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    let result = session.pipeline.execute(request, &cancel).await;
    watcher.abort();

    Ok(result?.to_json())
}

/// Rewrite the query and describe the outcome without executing it
pub fn explain(args: &QueryArgs) -> CliResult<Value> {
    let session = load_session(args)?;
    let query = session
        .description
        .to_expr(session.pipeline.model(), Some(session.config.api_root.as_str()))
        .map_err(|e| CliError::input_error(format!("{}: {}", e.code(), e)))?;

    let outcome = session.pipeline.rewrite(&query, &session.context)?;
    log_event(
        Event::ExplainComplete,
        &[
            (
                "collection",
                outcome.originating_collection.as_deref().unwrap_or(""),
            ),
            ("sourcing_calls", outcome.sourcing_calls.to_string().as_str()),
        ],
    );

    Ok(json!({
        "query": query.to_string(),
        "rewritten": outcome.query.to_string(),
        "type": outcome.query.ty().to_string(),
        "collection": outcome.originating_collection,
        "sourcing_calls": outcome.sourcing_calls,
        "total_count": session.description.total_count,
    }))
}

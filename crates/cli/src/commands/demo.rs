//! `runwire demo` — A scripted agent run with a nested tool run.
//!
//! Registers a handful of observers on the agent, runs the script, then
//! prints every dispatched event and which observers fired for it.

use runwire_config::AppConfig;
use runwire_core::matcher::AnyEvent;
use runwire_core::{
    CallbackError, EmitterOptions, Instance, ListenerOptions, Matcher, RunContext, RunInstance,
    Selector, create_event_matcher, create_internal_event_matcher_with_root,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

/// One dispatched event as seen by the catch-all stream.
#[derive(Debug, Clone)]
pub struct SeenEvent {
    pub path: String,
    pub internal: bool,
    pub run_id: Option<String>,
    pub parent_run_id: Option<String>,
}

/// Outcome of [`simulate`].
#[derive(Debug, Default)]
pub struct DemoReport {
    pub events: Vec<SeenEvent>,
    /// `(observer label, event path)` in dispatch order.
    pub hits: Vec<(String, String)>,
    pub agent_run_id: String,
}

/// Run the script and collect what the observers saw.
pub fn simulate(options: EmitterOptions) -> Result<DemoReport, CallbackError> {
    let root = options.root_namespace.clone();
    let agent = Instance::with_options(["agent"], options)?;
    let tool = Instance::nested(&agent, ["tool"])?;

    let (_, mut feed) = agent.emitter().stream(
        Selector::custom(AnyEvent),
        ListenerOptions::default(),
    )?;

    let outer = RunContext::start(&agent)?;
    let run_id = outer.run_id().to_string();

    let agent_updates = create_event_matcher("update", &agent, None)?;
    let agent_started = create_internal_event_matcher_with_root(&root, "start", &agent, None)?;
    let tool_results = create_event_matcher("result", &tool, Some(&run_id))?;
    let tool_finished =
        create_internal_event_matcher_with_root(&root, "finish", &tool, Some(&run_id))?;
    let observers: [(&str, Arc<dyn Matcher>); 4] = [
        ("agent updates", Arc::new(agent_updates)),
        ("agent run started", Arc::new(agent_started)),
        ("tool results in agent run", Arc::new(tool_results)),
        ("tool run finished", Arc::new(tool_finished)),
    ];

    let hits = Arc::new(Mutex::new(Vec::new()));
    for (label, matcher) in observers {
        let sink = Arc::clone(&hits);
        let label = label.to_string();
        agent.emitter().on(Selector::Custom(matcher), move |_, meta| {
            sink.lock()
                .map_err(|_| "hit log poisoned")?
                .push((label.clone(), meta.path.clone()));
            Ok(())
        })?;
    }

    outer.run(|ctx| {
        ctx.emitter().emit("update", json!({ "step": "thinking" }))?;
        ctx.child(&tool)?
            .run(|tool_run| tool_run.emitter().emit("result", json!({ "value": 42 })))?;
        ctx.emitter().emit("update", json!({ "step": "answered" }))?;
        Ok::<_, CallbackError>("42")
    })?;

    let mut events = Vec::new();
    while let Ok(event) = feed.try_recv() {
        events.push(SeenEvent {
            path: event.meta.path.clone(),
            internal: event.meta.is_internal(),
            run_id: event.meta.trace.as_ref().map(|t| t.run_id.clone()),
            parent_run_id: event.meta.trace.as_ref().and_then(|t| t.parent_run_id.clone()),
        });
    }

    let hits = hits.lock().map_err(|_| "hit log poisoned")?.clone();
    Ok(DemoReport {
        events,
        hits,
        agent_run_id: run_id,
    })
}

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(config.emitter_options()).map_err(|e| format!("Demo failed: {e}"))?;
    info!(events = report.events.len(), hits = report.hits.len(), "Demo finished");

    println!("Agent run {}", short(&report.agent_run_id));
    println!();
    println!("  Events:");
    for event in &report.events {
        println!(
            "    {:<28} {:<9} run={} parent={}",
            event.path,
            if event.internal { "internal" } else { "" },
            event.run_id.as_deref().map(short).unwrap_or("-"),
            event.parent_run_id.as_deref().map(short).unwrap_or("-"),
        );
    }
    println!();
    println!("  Observers fired:");
    for (label, path) in &report.hits {
        println!("    {label:<28} <- {path}");
    }

    Ok(())
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

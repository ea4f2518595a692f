//! afb Replay - run a feedback scenario on a virtual clock
//!
//! Reads a JSON scenario, feeds it to an engine backed by an in-memory
//! document and prints every live region write, toast change and focus
//! outcome with its virtual timestamp.

use std::collections::{BTreeMap, HashMap};

use afb_core::{
    Clock, FeedbackConfig, FeedbackEngine, FeedbackOptions, FeedbackType, ManualClock,
    ProgressHandle, ProgressOptions, Signal,
};
use afb_dom::{Document, MotionPreference};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
    #[serde(default)]
    config: Option<FeedbackConfig>,
    #[serde(default)]
    reduced_motion: bool,
    /// Elements appended to the body before the first step
    #[serde(default)]
    elements: Vec<ElementSpec>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ElementSpec {
    tag: String,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Notify {
        message: String,
        #[serde(rename = "type")]
        feedback_type: FeedbackType,
        #[serde(default)]
        options: FeedbackOptions,
    },
    /// Milliseconds of virtual time
    Advance(u64),
    Dismiss(String),
    DismissAll,
    Config(FeedbackConfig),
    /// Start (or restart) a progress operation
    Progress {
        id: String,
        message: String,
        #[serde(default)]
        options: ProgressOptions,
    },
    ProgressUpdate {
        id: String,
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    ProgressComplete {
        id: String,
        #[serde(default)]
        message: Option<String>,
    },
    ProgressFail {
        id: String,
        #[serde(default)]
        message: Option<String>,
    },
    ProgressDismiss(String),
}

fn build_document(elements: &[ElementSpec], reduced_motion: bool) -> Result<Document> {
    let mut doc = Document::new();
    if reduced_motion {
        doc.set_motion_preference(MotionPreference::Reduce);
    }
    let body = doc.body();
    for spec in elements {
        let node = doc.create_element(&spec.tag);
        for (name, value) in &spec.attrs {
            doc.set_attribute(node, name, value)?;
        }
        if let Some(text) = &spec.text {
            doc.set_text_content(node, text)?;
        }
        doc.append_child(body, node)?;
    }
    Ok(doc)
}

fn describe(signal: &Signal) -> Option<String> {
    let line = match signal {
        Signal::RegionWritten { politeness, content } => {
            format!("{:<10}{}", politeness.as_str(), content.escape_debug())
        }
        Signal::Deduped { report, .. } => format!("{:<10}{}", "deduped", report.message),
        Signal::Replaced { event, previous, .. } => format!(
            "{:<10}{} ({} -> {})",
            "replaced", event.id, previous.feedback_type, event.feedback_type
        ),
        Signal::FocusMoved { target, element_name, .. } => {
            let name = element_name.as_deref().unwrap_or("(unnamed)");
            format!("{:<10}{target} {name}", "focus")
        }
        Signal::VisualShown { event, .. } => format!("{:<10}+ {}", "visual", event.id),
        Signal::VisualDismissed { id, reason } => {
            format!("{:<10}- {id} ({})", "visual", reason.as_str())
        }
        Signal::ConfigChanged { changed_keys } => {
            format!("{:<10}{}", "config", changed_keys.join(", "))
        }
        Signal::Announced { .. } => return None,
    };
    Some(line)
}

fn operation<'a>(
    operations: &'a HashMap<String, ProgressHandle>,
    id: &str,
    index: usize,
) -> Result<&'a ProgressHandle> {
    match operations.get(id) {
        Some(handle) => Ok(handle),
        None => bail!("step {index}: no progress operation {id:?}"),
    }
}

fn replay(scenario: Scenario) -> Result<FeedbackEngine<ManualClock>> {
    let Scenario { config, reduced_motion, elements, steps } = scenario;
    let document = build_document(&elements, reduced_motion)?;

    let clock = ManualClock::new();
    let mut engine = FeedbackEngine::with_clock(Some(document), clock.clone());
    if let Some(config) = config {
        engine = engine.with_config(config)?;
    }

    let log_clock = clock.clone();
    engine.signals().on_any(move |signal| {
        if let Some(line) = describe(signal) {
            println!("{:>7}ms  {line}", log_clock.now_ms());
        }
    });

    let mut operations: HashMap<String, ProgressHandle> = HashMap::new();
    for (index, step) in steps.into_iter().enumerate() {
        tracing::debug!(step = index, ?step, "replaying");
        match step {
            Step::Notify { message, feedback_type, options } => {
                options.validate().with_context(|| format!("step {index}"))?;
                let event = engine.notify(message, feedback_type, options);
                if let Some(reason) = &event.focus.blocked_reason {
                    println!("{:>7}ms  {:<10}{reason}", clock.now_ms(), "no-focus");
                }
            }
            Step::Advance(ms) => {
                engine.advance(ms);
            }
            Step::Dismiss(id) => {
                if !engine.dismiss(&id) {
                    tracing::warn!(id = %id, "nothing to dismiss");
                }
            }
            Step::DismissAll => {
                engine.dismiss_all();
            }
            Step::Config(config) => {
                engine.set_config(config).with_context(|| format!("step {index}"))?;
            }
            Step::Progress { id, message, options } => {
                let handle = engine
                    .progress(id.clone(), message, options)
                    .with_context(|| format!("step {index}"))?;
                operations.insert(id, handle);
            }
            Step::ProgressUpdate { id, value, message } => {
                let handle = operation(&operations, &id, index)?;
                let updated = match message {
                    Some(message) => handle.update_message(&mut engine, value, message),
                    None => handle.update(&mut engine, value),
                };
                if !updated {
                    tracing::warn!(id = %id, "progress already finished");
                }
            }
            Step::ProgressComplete { id, message } => {
                let handle = operation(&operations, &id, index)?;
                if handle.complete(&mut engine, message.as_deref()).is_none() {
                    tracing::warn!(id = %id, "progress already finished");
                }
            }
            Step::ProgressFail { id, message } => {
                let handle = operation(&operations, &id, index)?;
                if handle.fail(&mut engine, message.as_deref()).is_none() {
                    tracing::warn!(id = %id, "progress already finished");
                }
            }
            Step::ProgressDismiss(id) => {
                let handle = operation(&operations, &id, index)?;
                if !handle.dismiss(&mut engine) {
                    tracing::warn!(id = %id, "progress already forgotten");
                }
            }
        }
    }
    engine.run_until_idle();
    Ok(engine)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: afb-replay <scenario.json> [--journal]");
    };
    let show_journal = args.any(|arg| arg == "--journal");

    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let scenario: Scenario =
        serde_json::from_str(&json).with_context(|| format!("parsing {path}"))?;
    let engine = replay(scenario)?;

    let stats = engine.journal().stats();
    tracing::info!(
        total = stats.total,
        deduped = stats.deduped,
        replaced = stats.replaced,
        "replay finished"
    );
    if show_journal {
        println!("{}", engine.journal().export_json()?);
    }
    Ok(())
}

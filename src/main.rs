//! Console presentation adapter for onboarding flows.
//!
//! Renders the active step as text and maps typed commands onto the
//! controller, the same way an overlay UI maps button clicks.

use anyhow::Context;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use onboard_flow::{
    AppResult, EngineConfig, FlowController, FlowDefinition, FlowStore, Placement, StepDefinition, StepKind,
    StepView, Transition, Variant,
};
use sysinfo::System;

const LOG_TARGET_STARTUP: &str = "onboard_flow::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to `<config_dir>/onboard-flow/logs/`, one file per day.
/// Debug builds also log to stderr.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("onboard-flow").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "onboard-flow.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting onboard-flow v{} on ({})", version, std::env::consts::ARCH);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

/// Flows registered when no flow file is given
fn builtin_flows() -> Vec<FlowDefinition> {
    vec![FlowDefinition::new("welcome-tour", "Welcome Tour")
        .variant(Variant::A)
        .dismiss_on_overlay_click(true)
        .step(
            StepDefinition::new("welcome", StepKind::Modal, "Welcome!", "Let us show you around.").skippable(true),
        )
        .step(
            StepDefinition::new(
                "create-project",
                StepKind::Tooltip,
                "Create Your First Project",
                "Click here to create a new project.",
            )
            .target("#create-button")
            .position(Placement::Bottom)
            .on_enter(|| {
                tracing::info!("Highlighting create button");
                Ok(())
            }),
        )
        .step(
            StepDefinition::new(
                "explore-features",
                StepKind::Spotlight,
                "Explore Features",
                "Check out everything else on offer.",
            )
            .target(".feature-grid")
            .position(Placement::Top),
        )
        .on_complete(|| {
            println!("🎉 Tour completed! You're all set!");
            Ok(())
        })]
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Start { flow_id: String, variant: Option<Variant> },
    Next,
    Prev,
    Skip,
    Complete,
    Dismiss,
    GoTo(String),
    Action(usize),
    Reset,
    Show,
    Flows,
    Progress(String),
    Analytics(Option<String>),
    Stats(String),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(Command::Show);
    };
    let arg = parts.next().map(str::to_string);

    let required = |name: &str| arg.clone().ok_or_else(|| format!("usage: {verb} <{name}>"));

    let command = match verb {
        "start" => {
            let flow_id = required("flow")?;
            let variant = match parts.next() {
                Some("random") => Some(Variant::random()),
                Some(v) => Some(v.parse::<Variant>()?),
                None => None,
            };
            Command::Start { flow_id, variant }
        }
        "next" | "n" => Command::Next,
        "prev" | "p" | "back" => Command::Prev,
        "skip" => Command::Skip,
        "complete" | "done" => Command::Complete,
        "dismiss" => Command::Dismiss,
        "goto" => Command::GoTo(required("step")?),
        "action" => {
            let index = required("index")?;
            let index = index.parse::<usize>().map_err(|e| format!("bad action index {index:?}: {e}"))?;
            Command::Action(index)
        }
        "reset" => Command::Reset,
        "show" => Command::Show,
        "flows" => Command::Flows,
        "progress" => Command::Progress(required("flow")?),
        "analytics" => Command::Analytics(arg.clone()),
        "stats" => Command::Stats(required("flow")?),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(command)
}

fn print_help() {
    println!("Commands:");
    println!("  start <flow> [A|B|random]   start or resume a flow");
    println!("  next | prev | skip | complete | dismiss");
    println!("  goto <step>                 jump to a step");
    println!("  action <index>              trigger a step action");
    println!("  reset                       discard the active flow's progress");
    println!("  show | flows | progress <flow> | analytics [flow] | stats <flow>");
    println!("  quit");
}

fn render(view: &StepView) {
    let Some(step) = view.step() else {
        println!("[{}] (no steps)", view.definition.id);
        return;
    };

    let kind = match step.kind {
        StepKind::Tooltip => "tooltip",
        StepKind::Modal => "modal",
        StepKind::Checklist => "checklist",
        StepKind::Spotlight => "spotlight",
    };

    println!();
    println!("┌ {} · step {}/{} · {}", view.definition.name, view.number(), view.total(), kind);
    println!("│ {}", step.title);
    println!("│ {}", step.content);
    if let Some(target) = &step.target {
        let position = step.position.map(|p| format!(" ({:?})", p)).unwrap_or_default();
        println!("│ → {}{}", target, position);
    }
    for (index, action) in step.actions.iter().enumerate() {
        println!("│ [{}] {}", index, action.label);
    }

    let mut hints = Vec::new();
    if view.can_go_back() {
        hints.push("prev");
    }
    hints.push(if view.is_last() { "next (finish)" } else { "next" });
    if view.can_skip() {
        hints.push("skip");
    }
    if view.dismiss_on_overlay() {
        hints.push("dismiss");
    }
    println!("└ {} · {:.0}% done", hints.join(" | "), view.fraction_complete() * 100.0);
}

fn report(transition: &Transition) {
    match transition {
        Transition::Ignored => println!("(nothing to do)"),
        Transition::Completed => println!("✓ Flow completed"),
        Transition::Skipped => println!("✓ Flow skipped"),
        Transition::Reset => println!("✓ Progress reset"),
        Transition::Moved { .. } | Transition::Custom => {}
    }
}

fn execute(controller: &mut FlowController, command: Command) -> AppResult<bool> {
    let transition = match command {
        Command::Start { flow_id, variant } => Some(controller.start(&flow_id, variant)),
        Command::Next => Some(controller.next()?),
        Command::Prev => Some(controller.prev()?),
        Command::Skip => Some(controller.skip()?),
        Command::Complete => Some(controller.complete()?),
        Command::Dismiss => Some(controller.dismiss()?),
        Command::GoTo(step_id) => Some(controller.go_to_step(&step_id)),
        Command::Action(index) => Some(controller.trigger_action(index)?),
        Command::Reset => Some(controller.reset()),
        Command::Show => None,
        Command::Flows => {
            for id in controller.store().flow_ids() {
                println!("  {}", id);
            }
            return Ok(true);
        }
        Command::Progress(flow_id) => {
            match controller.store().progress(&flow_id) {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No progress for {}", flow_id),
            }
            return Ok(true);
        }
        Command::Analytics(flow_id) => {
            for event in controller.store().analytics(flow_id.as_deref()) {
                println!("  {} {}", event.timestamp.format("%H:%M:%S"), event.description());
            }
            return Ok(true);
        }
        Command::Stats(flow_id) => {
            let summary = controller.store().summary(&flow_id);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            match summary.ab.winning_variant() {
                Some(variant) => println!("Leading variant: {}", variant),
                None => println!("No leading variant"),
            }
            return Ok(true);
        }
        Command::Help => {
            print_help();
            return Ok(true);
        }
        Command::Quit => return Ok(false),
    };

    if let Some(transition) = &transition {
        report(transition);
    }
    match controller.current_view() {
        Some(view) => render(&view),
        None => println!("(no active flow)"),
    }
    Ok(true)
}

struct Args {
    config: Option<PathBuf>,
    flows: Option<PathBuf>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        flows: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().context("--config needs a path")?.into()),
            "--flows" => args.flows = Some(iter.next().context("--flows needs a path")?.into()),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let args = parse_args()?;

    let config_path = match args.config {
        Some(path) => path,
        None => EngineConfig::default_path()?,
    };
    let config = EngineConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let flows = match &args.flows {
        Some(path) => FlowDefinition::load_all(path)?,
        None => builtin_flows(),
    };

    let store = Arc::new(FlowStore::open(&config).context("opening flow store")?);
    for flow in flows {
        store.register_flow(flow);
    }
    if !store.is_persistent() {
        println!("Note: progress is not persisted in this session");
    }

    let mut controller = FlowController::new(Arc::clone(&store), &config);

    println!("onboard-flow v{}. Type `help` for commands.", env!("CARGO_PKG_VERSION"));
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("reading stdin")?;

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match execute(&mut controller, command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!("{:#}", e);
                println!("✗ {:#}", e);
            }
        }
    }

    store.close();
    Ok(())
}

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use reword::capture::{CaptureEngine, CaptureTimings};
use reword::config::{ConfigStore, CredentialStore};
use reword::control::Trigger;
use reword::desktop::Desktop;
use reword::modes::ModeBook;
use reword::orchestrator::{CycleOutcome, Orchestrator, RevertOutcome};
use reword::prompt::render_knowledge;
use reword::selection::{CandidatePicker, SelectionRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Load .env from the binary's directory first, then dotenvy's CWD search.
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
        && dir.join(".env").exists()
    {
        dotenvy::from_path(dir.join(".env")).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    tracing::info!("reword starting");

    let store = ConfigStore::from_env();
    let config = store.load();
    if !store.path().exists()
        && let Err(e) = store.save(&config)
    {
        tracing::warn!(path = %store.path().display(), "failed to write default config: {e}");
    }

    let credentials = Arc::new(CredentialStore::from_env());
    let engine = CaptureEngine::new(Desktop::x11(), CaptureTimings::from(&config.timing));
    let (picker, mut pick_requests) = CandidatePicker::channel(1);
    let orchestrator = Arc::new(Orchestrator::new(
        engine,
        picker,
        credentials,
        ModeBook::or_builtin(config.modes.clone()),
    ));

    // Unconfigured is not fatal: cycles report it until the config is fixed.
    let _ = orchestrator.configure(config.provider.clone());
    orchestrator.set_candidate_count(config.versions.candidate_count());
    orchestrator.set_knowledge(render_knowledge(
        &config.knowledge.abbreviations,
        &config.knowledge.names,
    ));
    orchestrator.set_error_hold(config.timing.error_hold());

    if let Some(mode) = orchestrator.current_mode() {
        eprintln!("mode: {}", mode.name);
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<SelectionRequest> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(request) = pick_requests.recv() => {
                eprintln!("choose a version (pick <n> / cancel):");
                for (i, candidate) in request.candidates.iter().enumerate() {
                    eprintln!("  [{}] {}", i + 1, candidate);
                }
                if let Some(stale) = pending.replace(request) {
                    stale.cancel();
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("failed to read stdin: {e}");
                        break;
                    }
                };
                let Some(trigger) = Trigger::parse(&line) else {
                    if !line.trim().is_empty() {
                        eprintln!("unknown command: {}", line.trim());
                    }
                    continue;
                };
                match trigger {
                    Trigger::Reformat => {
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            match orchestrator.reformat().await {
                                Ok(CycleOutcome::Replaced { .. }) => eprintln!("Text reformatted!"),
                                Ok(CycleOutcome::Cancelled) => eprintln!("Cancelled"),
                                Ok(CycleOutcome::Busy) => {}
                                Err(e) => eprintln!("{}", e.user_message()),
                            }
                        });
                    }
                    Trigger::Revert => {
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            match orchestrator.revert().await {
                                Ok(RevertOutcome::Reverted) => eprintln!("Reverted to original"),
                                Ok(RevertOutcome::Busy) => {}
                                Err(e) => eprintln!("{}", e.user_message()),
                            }
                        });
                    }
                    Trigger::CycleMode => {
                        if let Some(mode) = orchestrator.cycle_mode() {
                            eprintln!("mode: {}", mode.name);
                        }
                    }
                    Trigger::SwitchMode(id) => match orchestrator.switch_mode(&id) {
                        Some(mode) => eprintln!("mode: {}", mode.name),
                        None => eprintln!("unknown mode: {id}"),
                    },
                    Trigger::Pick(n) => match pending.take() {
                        Some(request) => {
                            if let Err(request) = request.choose(n - 1) {
                                eprintln!("no version {n}");
                                pending = Some(request);
                            }
                        }
                        None => eprintln!("nothing to pick"),
                    },
                    Trigger::Cancel => {
                        if let Some(request) = pending.take() {
                            request.cancel();
                        }
                    }
                    Trigger::Quit => break,
                }
            }
        }
    }

    if let Some(request) = pending.take() {
        request.cancel();
    }
    tracing::info!("reword shutting down");
    Ok(())
}

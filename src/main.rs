mod backup;
mod cache;
mod config;
mod cycle;
mod db;
mod ipc;
mod metrics;
mod normalize;
mod records;
mod reports;
mod repo;

use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// stdout carries responses only; every log line goes to stderr.
fn init_tracing(cfg: &config::Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing init failed: {e}");
    }
}

fn main() {
    let cfg = config::Config::from_env();
    init_tracing(&cfg);

    let mut state = ipc::AppState::new(cfg.clone());
    if let Some(path) = cfg.workspace.as_ref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), error = %e, "failed to open configured workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "practicasd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let started = Instant::now();
        let id = req.id.clone();
        let method = req.method.clone();
        let resp = ipc::handle_request(&mut state, req);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match resp.get("error").and_then(|e| e.get("code")).and_then(|c| c.as_str()) {
            Some(code) => tracing::warn!(%id, %method, code, elapsed_ms, "request failed"),
            None => tracing::debug!(%id, %method, elapsed_ms, "request handled"),
        }

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}

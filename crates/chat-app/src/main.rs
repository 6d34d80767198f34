//! Terminal chat over the configured backend.
//!
//! Usage: `chat [config.toml] [--modality text|image|csv] [--attach PATH|URL]`
//! Type a message per line; `/quit` ends the session.

use std::path::Path;

use chat_app::{init_logging, App};
use chat_core::TurnRequest;
use chat_types::{
    artifact::ArtifactSource,
    config::AppConfig,
    session::Modality,
    ChatError, Result,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

struct Args {
    config: Option<String>,
    modality: Modality,
    attach: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        modality: Modality::Text,
        attach: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--modality" => {
                let value = it.next().unwrap_or_default();
                args.modality = match value.as_str() {
                    "text" => Modality::Text,
                    "image" => Modality::Image,
                    "csv" => Modality::Csv,
                    other => return Err(ChatError::InvalidInput(format!("unknown modality {:?}", other))),
                };
            }
            "--attach" => args.attach = it.next(),
            _ => args.config = Some(arg),
        }
    }
    Ok(args)
}

async fn attachment(spec: &str) -> Result<ArtifactSource> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return Ok(ArtifactSource::url(spec));
    }
    let data = tokio::fs::read(spec)
        .await
        .map_err(|e| ChatError::InvalidInput(format!("{}: {}", spec, e)))?;
    let filename = Path::new(spec)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| spec.to_string());
    Ok(ArtifactSource::bytes(filename, data))
}

/// Turn progress goes to the debug log; draining keeps the bus from filling.
fn log_events(app: &App) {
    for event in app.events().drain() {
        log::debug!("{:?}", event);
    }
}

async fn run() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .with_env_overrides();

    let app = App::init(config).await?;
    let orchestrator = app.orchestrator();
    let cancel = CancellationToken::new();

    let mut session_id = None;
    if let Some(spec) = &args.attach {
        let request = TurnRequest::start(args.modality).attachment(attachment(spec).await?);
        let transcript = orchestrator.run_turn(request, &cancel).await;
        log_events(&app);
        let transcript = transcript?;
        println!("assistant> {}", transcript.reply);
        session_id = Some(transcript.session_id);
    }
    let session_id = match session_id {
        Some(id) => id,
        None => orchestrator.start_session(args.modality, None).await?.id,
    };
    println!("session {} ({})", session_id, args.modality);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        let outcome = orchestrator.continue_session(&session_id, line).await;
        log_events(&app);
        match outcome {
            Ok(transcript) => println!("assistant> {}", transcript.reply),
            Err(e) => {
                log::debug!("turn failed: {}", e);
                println!("error> {}", e.user_message());
            }
        }
    }

    app.teardown().await
}

#[tokio::main]
async fn main() {
    init_logging("warn");
    if let Err(e) = run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

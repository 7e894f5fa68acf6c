// src/cli/session.rs — Interactive avatar session REPL

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::LocalStore;
use crate::cli::SessionArgs;
use crate::infra::config::Config;
use crate::knowledge::extractor::{GatewayExtractor, UploadedFile};
use crate::knowledge::{ExtractionStatus, KnowledgeKind, KnowledgeResolver, UploadOutcome};
use crate::provider::heygen::HeygenProvider;
use crate::session::coordinator::CoordinatorOptions;
use crate::session::{
    ChatMode, GatewayCredentialSource, SessionCoordinator, SessionState, SessionView,
};

const HELP: &str = "\
  Type a line to have the avatar say it.
  /interrupt   stop the avatar mid-sentence
  /voice       switch to voice chat
  /text        switch to text chat
  /status      show session state
  /end         end the session";

/// Resolve the knowledge source named on the command line.
async fn resolve_knowledge(
    resolver: &KnowledgeResolver,
    args: &SessionArgs,
) -> anyhow::Result<()> {
    let source = &args.source;
    if let Some(ref url) = source.url {
        resolver.select(KnowledgeKind::Url);
        resolver.set_input(url);
    } else if let Some(ref text) = source.text {
        resolver.select(KnowledgeKind::Text);
        resolver.set_input(text);
    } else if let Some((kind, path)) = source
        .pdf
        .as_ref()
        .map(|p| (KnowledgeKind::Pdf, p))
        .or_else(|| source.doc.as_ref().map(|p| (KnowledgeKind::Doc, p)))
    {
        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .zip(kind.document_kind())
            .is_some_and(|(ext, doc)| doc.accepts_extension(ext));
        if !accepted {
            anyhow::bail!("{} is not a {} file", path.display(), kind);
        }
        resolver.select(kind);
        let file = UploadedFile::from_path(path).await?;
        eprintln!("{}: {}", file.name, ExtractionStatus::Pending.label());
        let outcome = resolver.upload(file).await?;
        if let Some(line) = resolver.upload_status_line() {
            eprintln!("{line}");
        }
        if let UploadOutcome::Applied(ExtractionStatus::Failed(reason)) = outcome {
            anyhow::bail!(reason);
        }
    }
    Ok(())
}

/// Print view changes to stderr until the channel closes.
async fn render_view(mut rx: watch::Receiver<SessionView>) {
    let mut last = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        if view.loading_message != last.loading_message {
            if let Some(ref msg) = view.loading_message {
                eprintln!("  {msg}");
            }
        }
        if view.state != last.state {
            eprintln!("[{}]", view.state);
            if let (SessionState::Streaming, Some(stream)) = (view.state, view.stream.as_ref()) {
                eprintln!("  stream: {} ({})", stream.url, stream.session_id);
            }
        }
        if view.chat_mode != last.chat_mode {
            eprintln!("  chat mode: {}", view.chat_mode);
        }
        if view.avatar_talking != last.avatar_talking {
            eprintln!("  {}", if view.avatar_talking { "avatar speaking..." } else { "avatar idle" });
        }
        if view.user_talking != last.user_talking && view.user_talking {
            eprintln!("  listening...");
        }
        if view.error != last.error {
            if let Some(ref err) = view.error {
                eprintln!("  error: {err}");
            }
        }
        last = view;
    }
}

fn print_status(view: &SessionView) {
    eprintln!("  State: {}", view.state);
    eprintln!("  Chat mode: {}", view.chat_mode);
    eprintln!(
        "  Avatar talking: {} | User talking: {}",
        view.avatar_talking, view.user_talking
    );
}

async fn handle_command(coordinator: &SessionCoordinator, cmd: &str) -> bool {
    match cmd {
        "/end" | "/quit" | "/exit" => return false,
        "/interrupt" => coordinator.interrupt().await,
        "/voice" | "/text" => {
            let mode = if cmd == "/voice" {
                ChatMode::Voice
            } else {
                ChatMode::Text
            };
            if !coordinator.view().voice_toggle_enabled() {
                eprintln!("  Can't switch modes right now.");
            } else if let Err(e) = coordinator.set_chat_mode(mode).await {
                eprintln!("  Failed to switch to {mode} mode: {e}");
            }
        }
        "/status" => print_status(&coordinator.view()),
        "/help" => eprintln!("{HELP}"),
        other => eprintln!("  Unknown command: {other} (try /help)"),
    }
    true
}

/// One line typed at the prompt: typing opens the listening window, the
/// talk task runs, sending closes the window.
async fn say(coordinator: SessionCoordinator, line: String) {
    coordinator.set_input_text(&line).await;
    if let Err(e) = coordinator.speak(&line).await {
        if e.is_user_visible() {
            eprintln!("  {e}");
        } else {
            tracing::debug!("Speak skipped: {}", e);
        }
    }
    coordinator.set_input_text("").await;
}

/// The talk task behind the prompt. A talk resolves only when the avatar
/// finishes, so it runs on its own task and `/interrupt` stays reachable.
#[derive(Default)]
struct Speech(Option<JoinHandle<()>>);

impl Speech {
    fn is_running(&self) -> bool {
        self.0.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start saying `line` unless a previous line is still being spoken.
    fn start(&mut self, coordinator: &SessionCoordinator, line: &str) -> bool {
        if self.is_running() {
            return false;
        }
        self.0 = Some(tokio::spawn(say(coordinator.clone(), line.to_string())));
        true
    }

    fn abort(self) {
        if let Some(task) = self.0 {
            task.abort();
        }
    }
}

pub async fn run_session(config: &Config, args: SessionArgs) -> anyhow::Result<()> {
    let store = Arc::new(LocalStore::open_default()?);
    let gateway = &config.gateway.public_url;

    let resolver = KnowledgeResolver::new(
        Arc::new(GatewayExtractor::new(gateway)),
        store.clone(),
        config.session.extraction_timeout(),
    );
    resolve_knowledge(&resolver, &args).await?;

    let avatar = match args.avatar {
        Some(a) => a,
        None => store.take_selected_avatar()?.unwrap_or_default(),
    };
    let mut session_config = resolver
        .session_config()?
        .with_defaults(&config.session)
        .with_avatar(&avatar);
    if let Some(ref language) = args.language {
        session_config = session_config.with_language(language);
    }

    let coordinator = SessionCoordinator::new(
        Arc::new(GatewayCredentialSource::new(gateway)),
        Arc::new(HeygenProvider::new(&config.provider)),
        CoordinatorOptions::from_defaults(&config.session),
    );
    let renderer = tokio::spawn(render_view(coordinator.subscribe_view()));

    if let Err(e) = coordinator.start_session(session_config).await {
        renderer.abort();
        return Err(e.into());
    }

    let mut rx = coordinator.subscribe_view();
    let ready = rx
        .wait_for(|v| v.state != SessionState::Starting)
        .await
        .map(|v| v.is_streaming())
        .unwrap_or(false);
    if !ready {
        coordinator.end_session().await;
        renderer.abort();
        anyhow::bail!("Avatar stream did not come up");
    }

    eprintln!("{HELP}\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut speech = Speech::default();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
            _ = rx.wait_for(|v| v.state == SessionState::Ended) => {
                eprintln!("  Stream disconnected.");
                None
            }
        };
        let Some(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('/') {
            if !handle_command(&coordinator, trimmed).await {
                break;
            }
            continue;
        }

        if !speech.start(&coordinator, trimmed) {
            eprintln!("  Still speaking. Use /interrupt to cut in.");
        }
    }

    coordinator.shutdown().await;
    speech.abort();
    renderer.abort();
    Ok(())
}

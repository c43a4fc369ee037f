//! `colloquy chat` — Interactive or single-message chat mode.

use std::io::Write as _;
use std::sync::Arc;

use colloquy_config::AppConfig;
use colloquy_context::{InMemorySessionStore, Session, SessionStore};
use colloquy_core::{AllowAllPolicy, EngineEvent, TruncateSummarizer, Turn};
use colloquy_dispatch::Dispatcher;
use colloquy_engine::Orchestrator;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    message: Option<String>,
    backend: Option<String>,
    model: Option<String>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(backend) = backend {
        config.default_backend = backend;
    }
    if let Some(model) = model {
        config.default_model = model;
    }
    if yes {
        config.commands.auto_approve = true;
    }

    // Check for API key early — give a clear error
    if needs_api_key(&config) && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    COLLOQUY_API_KEY     (generic)");
        eprintln!("    OPENROUTER_API_KEY   (for OpenRouter)");
        eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  Local backends (ollama, vllm) need no key:");
        eprintln!("    colloquy chat --backend ollama --model llama3.1");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    // File commands are rooted here; it must exist before the first call.
    let workspace = config.workspace_dir();
    std::fs::create_dir_all(&workspace)?;

    let router = colloquy_providers::build_from_config(&config);
    let backend = router
        .default_backend()
        .ok_or_else(|| format!("No backend named '{}' configured", config.default_backend))?;

    let registry = colloquy_plugins::default_registry(
        &workspace,
        config.commands.allowed_shell_commands.clone(),
    );
    let command_names = registry.names().join(", ");

    let mut dispatcher = Dispatcher::new(registry);
    if config.commands.auto_approve {
        dispatcher = dispatcher.with_policy(Arc::new(AllowAllPolicy));
    }

    let mut orchestrator = Orchestrator::new(backend, dispatcher)
        .with_model(&config.default_model)
        .with_temperature(config.session.temperature)
        .with_max_tokens(config.session.max_tokens)
        .with_context_budget(config.session.context_budget)
        .with_round_limit(config.session.round_limit);
    if let Some(persona) = &config.session.persona {
        orchestrator = orchestrator.with_persona(persona);
    }

    match message {
        Some(message) => single_message(&orchestrator, message).await,
        None => interactive(&orchestrator, &config, &command_names).await,
    }
}

/// Local backends run without keys; everything else wants one.
fn needs_api_key(config: &AppConfig) -> bool {
    let name = config.default_backend.as_str();
    if let Some(backend) = config.backends.get(name)
        && let Some(url) = &backend.base_url
    {
        return !(url.contains("//localhost") || url.contains("//127.0.0.1"));
    }
    !matches!(name, "ollama" | "vllm")
}

async fn single_message(
    orchestrator: &Orchestrator,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::new();
    let completed = run_once(orchestrator, &mut session, Turn::user(message)).await?;
    if !completed {
        // The reason was already printed from the Aborted event.
        return Err("request aborted".into());
    }
    Ok(())
}

async fn interactive(
    orchestrator: &Orchestrator,
    config: &AppConfig,
    command_names: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemorySessionStore::new();
    let mut session = Session::new();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         Colloquy — Interactive Chat          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Backend:    {}", config.default_backend);
    println!("  Model:      {}", config.default_model);
    println!("  Commands:   {command_names}");
    println!("  Workspace:  {}", config.workspace_dir().display());
    println!(
        "  Approval:   {}",
        if config.commands.auto_approve {
            "auto-approve (all commands run)"
        } else {
            "read-only (pass --yes to run side-effecting commands)"
        }
    );
    println!();
    println!("  Type your message and press Enter. Ctrl+C cancels a running request.");
    println!("  '/new' starts a fresh session, '/sessions' lists stored ones,");
    println!("  '/compact' summarizes older turns to free up context.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let stdin = io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF (Ctrl+D)
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        if line == "/new" {
            store.upsert(session.clone()).await;
            session = Session::new();
            println!("  (started a new session)");
            continue;
        }
        if line == "/sessions" {
            let mut stored = store.list().await;
            if !session.all_turns().is_empty() {
                stored.push((session.id.clone(), session.title.clone()));
            }
            if stored.is_empty() {
                println!("  (no sessions yet)");
            }
            for (id, title) in stored {
                println!("  {id} — {}", title.as_deref().unwrap_or("(untitled)"));
            }
            continue;
        }
        if line == "/compact" {
            let summarizer = TruncateSummarizer::default();
            let summarized = session
                .compact(config.session.context_budget / 2, &summarizer)
                .await;
            if summarized == 0 {
                println!("  (nothing to compact)");
            } else {
                println!("  📝 Summarized {summarized} older turns.");
            }
            continue;
        }

        println!();
        run_once(orchestrator, &mut session, Turn::user(line)).await?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

/// Drive one request to its terminal event, printing as it streams.
/// Ctrl+C cancels the request without killing the process. Returns whether
/// the request completed (false = aborted, already reported).
async fn run_once(
    orchestrator: &Orchestrator,
    session: &mut Session,
    turn: Turn,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            render_event(&event);
        }
    });

    let result = {
        let run = orchestrator.run(session, turn, &tx, &cancel);
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => break result,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!();
                    eprintln!("  [cancelling]");
                    cancel.cancel();
                }
            }
        }
    };

    drop(tx);
    printer.await?;
    println!();

    Ok(result.is_ok())
}

fn render_event(event: &EngineEvent) {
    match event {
        EngineEvent::AnswerDelta { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        EngineEvent::CommandStarted { name, .. } => {
            println!();
            println!("  [{name}] running...");
        }
        EngineEvent::CommandFinished { name, result } => {
            if result.is_success() {
                println!("  [{name}] done ({}ms)", result.duration_ms);
            } else {
                println!("  [{name}] failed: {}", first_line(&result.output));
            }
        }
        EngineEvent::Completed { .. } => {}
        EngineEvent::Aborted { message, .. } => {
            println!();
            eprintln!("  [aborted] {message}");
        }
    }
}

/// First line only — command failures can be paragraphs.
fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

mod bootstrap;
mod config;

use bootstrap::Components;
use clap::{Parser, Subcommand};
use config::YojanaConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use yojana_gateway::{AppState, AuthConfig, GatewayServer, RateLimiter};
use yojana_memory::{load_corpus, VectorStore};

#[derive(Parser)]
#[command(name = "yojana", about = "Yojana - government welfare scheme assistant")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "yojana.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the corpus if needed, then start the REST gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Build the scheme index
    Index {
        /// Re-check every document even when the index is populated
        #[arg(long)]
        force: bool,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Continue an existing session
        #[arg(long)]
        session: Option<Uuid>,
    },
    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions, newest first
    List,
    /// Print a session's messages
    Show { id: Uuid },
    /// Delete a session and its messages
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = YojanaConfig::load(&cli.config).await?;
    config.apply_env(|key| std::env::var(key).ok());

    let components = Components::open(&config).await?;

    match cli.command {
        Commands::Serve { host, port } => serve(config, components, host, port).await?,
        Commands::Index { force } => {
            let report = if force {
                let documents = load_corpus(&config.corpus.path).await?;
                let report = components.indexer().index(&documents).await?;
                components.vectors.compact().await?;
                report
            } else {
                components.ensure_indexed(&config).await?
            };
            if report.skipped {
                println!(
                    "Index already populated with {} schemes (use --force to re-check).",
                    report.total
                );
            } else {
                println!(
                    "Indexed {} schemes: {} embedded, {} unchanged.",
                    report.total, report.embedded, report.unchanged
                );
            }
        }
        Commands::Ask { question, session } => {
            components.ensure_indexed(&config).await?;
            let pipeline = components.pipeline(&config);
            let reply = pipeline.answer(session, &question).await?;
            println!("{}", reply.answer);
            if !reply.sources.is_empty() {
                println!("\nSources:");
                for source in &reply.sources {
                    println!("  - {source}");
                }
            }
            println!("\nSession: {}", reply.session_id);
        }
        Commands::Sessions { action } => match action {
            SessionAction::List => {
                let sessions = components.sessions.list_sessions().await?;
                if sessions.is_empty() {
                    println!("No sessions.");
                }
                for s in &sessions {
                    println!("{}  {}  {}", s.id, s.created_at.to_rfc3339(), s.title);
                }
            }
            SessionAction::Show { id } => {
                for turn in components.sessions.get_turns(id).await? {
                    println!(
                        "[{}] {} ({}):\n{}\n",
                        turn.seq,
                        turn.role,
                        turn.timestamp.to_rfc3339(),
                        turn.content
                    );
                }
            }
            SessionAction::Delete { id } => {
                components.sessions.delete_session(id).await?;
                println!("Deleted session {id}");
            }
        },
    }

    Ok(())
}

async fn serve(
    config: YojanaConfig,
    components: Components,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let report = components.ensure_indexed(&config).await?;
    info!(
        documents = components.vectors.count().await?,
        embedded = report.embedded,
        "Scheme index ready"
    );

    let rate_limiter = Arc::new(RateLimiter::new(
        config.security.max_burst,
        config.security.max_requests_per_second,
    ));
    let auth_config = AuthConfig::new(config.security.api_keys.clone());
    if auth_config.is_enabled() {
        info!(keys = config.security.api_keys.len(), "API key auth enabled");
    } else {
        warn!("API key auth disabled");
    }

    let limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let dropped = limiter.prune().await;
            if dropped > 0 {
                debug!(dropped, "Pruned idle rate limit buckets");
            }
        }
    });

    let pipeline = Arc::new(components.pipeline(&config));
    let state = Arc::new(AppState::new(pipeline, components.vectors.clone()));
    let app = GatewayServer::build_with_middleware(
        state,
        Some(rate_limiter),
        auth_config,
        &config.server.cors_origins,
    );

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Yojana gateway listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await?;
    Ok(())
}

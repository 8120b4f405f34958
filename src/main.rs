use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rental_scout::compose::{Composer, Enhancer, OpenAiEnhancer, TemplateComposer};
use rental_scout::config::{self, AppConfig};
use rental_scout::contact::{BrowserSubmitter, HumanPacing, Submitter};
use rental_scout::mode::{ActionMode, ActionModeController};
use rental_scout::notify::{CommandListener, LogNotifier, Notifier, TelegramClient, TelegramNotifier};
use rental_scout::ratelimit::RateLimiter;
use rental_scout::scheduler::{Collaborators, Scheduler, SchedulerSettings};
use rental_scout::sources::Is24Source;
use rental_scout::store::{load_profiles, FileStore, Store};
use rental_scout::telemetry;

#[derive(Debug, Parser)]
#[command(name = "rental-scout", about = "Watches rental listings and reacts to new matches")]
struct Cli {
    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Search profile file, overriding SCOUT_PROFILES_PATH.
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Initial action mode (off, preview, on), overriding SCOUT_INITIAL_MODE.
    #[arg(long)]
    mode: Option<ActionMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_app_config().context("Failed to load configuration")?;
    if let Some(path) = cli.profiles {
        cfg.profiles_path = path;
    }
    if let Some(mode) = cli.mode {
        cfg.initial_mode = mode;
    }
    telemetry::init(&cfg.log_level)?;

    info!("🏠 Rental Scout starting");

    let store = Arc::new(match &cfg.store_path {
        Some(path) => FileStore::open(path).await?,
        None => FileStore::in_memory(),
    });
    let profiles = load_profiles(&cfg.profiles_path).await?;
    store.replace_profiles(profiles).await?;
    let active = store.active_profiles().await?.len();
    info!(active, path = %cfg.profiles_path.display(), "search profiles loaded");

    let telegram = match &cfg.telegram {
        Some(t) => Some(Arc::new(TelegramClient::new(
            &t.api_base,
            t.bot_token.clone(),
            t.chat_id,
        )?)),
        None => None,
    };
    let notifier: Arc<dyn Notifier> = match &telegram {
        Some(client) => Arc::new(TelegramNotifier::new(Arc::clone(client))),
        None => {
            warn!("Telegram not configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let mode = ActionModeController::new(cfg.initial_mode);
    let collab = build_collaborators(&cfg, Arc::clone(&store) as Arc<dyn Store>, notifier)?;
    let contact_available = collab.submitter.is_some();
    let settings = SchedulerSettings {
        poll_interval: cfg.poll_interval,
        fetch_details: cfg.fetch_details,
        quiet_hours: cfg.quiet_hours,
    };
    let notifier = Arc::clone(&collab.notifier);
    let scheduler = Arc::new(Scheduler::new(settings, collab, mode.clone()));

    if cli.once {
        let result = scheduler.poll().await?;
        info!(?result, "single cycle finished");
        return Ok(());
    }

    let startup = format!(
        "🏠 <b>Rental Scout gestartet</b>\n\nModus: {}\nAktive Suchprofile: {}\nIntervall: {} s",
        mode.current(),
        active,
        cfg.poll_interval.as_secs()
    );
    if let Err(e) = notifier.notify_text(&startup).await {
        warn!(error = %e, "failed to send startup message");
    }

    let cancel = CancellationToken::new();
    let listener = telegram.map(|client| {
        let listener = CommandListener::new(
            client,
            mode.clone(),
            Arc::clone(&store) as Arc<dyn Store>,
            cfg.poll_interval,
            contact_available,
        );
        tokio::spawn(listener.run(cancel.clone()))
    });

    scheduler.start();
    shutdown_signal().await;
    info!("shutdown requested");

    cancel.cancel();
    scheduler.stop().await;
    if let Some(handle) = listener {
        if let Err(e) = handle.await {
            warn!(error = %e, "command listener ended abnormally");
        }
    }
    info!("👋 Rental Scout stopped");
    Ok(())
}

fn build_collaborators(
    cfg: &AppConfig,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
) -> Result<Collaborators> {
    let source = Arc::new(Is24Source::new(
        &cfg.source_base_url,
        cfg.is24_cookie.clone(),
        cfg.request_timeout,
    )?);

    let composer: Arc<dyn Composer> = Arc::new(match &cfg.message_template {
        Some(path) => TemplateComposer::from_file(path, cfg.applicant.clone())?,
        None => TemplateComposer::with_default_template(cfg.applicant.clone()),
    });

    let enhancer = match &cfg.openai {
        Some(ai) => {
            info!(model = %ai.model, "AI message enhancement enabled");
            Some(Arc::new(OpenAiEnhancer::new(&ai.api_base, ai.api_key.clone(), ai.model.clone())?)
                as Arc<dyn Enhancer>)
        }
        None => None,
    };

    let submitter = if cfg.contact_enabled {
        Some(Arc::new(BrowserSubmitter::new(
            cfg.source_base_url.clone(),
            cfg.chrome_path.clone(),
            cfg.is24_cookie.clone(),
            cfg.applicant.clone(),
        )
        .with_pacing(HumanPacing {
            type_delay: cfg.type_delay,
            action_delay: cfg.action_delay,
        })) as Arc<dyn Submitter>)
    } else {
        info!("contact submission disabled");
        None
    };

    Ok(Collaborators {
        source,
        store,
        notifier,
        composer,
        enhancer,
        submitter,
        rate_limiter: Arc::new(RateLimiter::new(
            cfg.max_requests_per_minute,
            cfg.min_delay,
            cfg.max_delay,
        )),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

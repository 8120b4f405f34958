//! Operator commands received over Telegram.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mode::{ActionMode, ActionModeController, ModeChange};
use crate::notify::telegram::TelegramClient;
use crate::store::Store;

const LONG_POLL_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub const HELP: &str = "🏠 <b>Rental Scout Befehle</b>

/status - Aktueller Status
/contact_on - Automatische Kontaktanfragen aktivieren
/preview_on - Vorschau-Modus (Nachrichten nur an dich)
/contact_off - Nur beobachten (kein Kontakt)
/stats - Statistiken anzeigen
/help - Diese Hilfe";

/// A recognised chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Stats,
    SetMode(ActionMode),
    Unknown,
}

impl Command {
    /// Parses `/name[@bot] [args]`; returns `None` for non-command text.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        Some(match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Self::Help,
            "status" => Self::Status,
            "stats" => Self::Stats,
            "contact_on" => Self::SetMode(ActionMode::On),
            "contact_off" => Self::SetMode(ActionMode::Off),
            "preview_on" => Self::SetMode(ActionMode::Preview),
            _ => Self::Unknown,
        })
    }
}

fn mode_label(mode: ActionMode) -> &'static str {
    match mode {
        ActionMode::Off => "⏸ Beobachtungsmodus",
        ActionMode::Preview => "🧪 Vorschau-Modus",
        ActionMode::On => "✅ Auto-Kontakt aktiv",
    }
}

/// Answers operator commands and switches the action mode.
pub struct CommandListener {
    client: Arc<TelegramClient>,
    mode: ActionModeController,
    store: Arc<dyn Store>,
    poll_interval: Duration,
    contact_available: bool,
}

impl CommandListener {
    pub fn new(
        client: Arc<TelegramClient>,
        mode: ActionModeController,
        store: Arc<dyn Store>,
        poll_interval: Duration,
        contact_available: bool,
    ) -> Self {
        Self {
            client,
            mode,
            store,
            poll_interval,
            contact_available,
        }
    }

    /// Reply text for `command`, applying any mode change.
    pub async fn handle(&self, command: Command) -> String {
        match command {
            Command::Help => HELP.to_string(),
            Command::Status => self.status().await,
            Command::Stats => match self.store.stats().await {
                Ok(stats) => format!(
                    "📊 <b>Statistiken</b>\n\nGefunden: {}\nGemeldet: {}\nKontaktiert: {}\nFehlgeschlagene Anfragen: {}",
                    stats.total, stats.notified, stats.contacted, stats.failed_attempts
                ),
                Err(e) => {
                    warn!(error = %e, "failed to load stats");
                    "Statistiken nicht verfügbar.".to_string()
                }
            },
            Command::SetMode(mode) => {
                let mut reply = match self.mode.set(mode) {
                    ModeChange::Unchanged(_) => {
                        format!("Modus unverändert: {}", mode_label(mode))
                    }
                    ModeChange::Changed { .. } => format!("Modus gewechselt: {}", mode_label(mode)),
                };
                if mode == ActionMode::On && !self.contact_available {
                    reply.push_str(
                        "\n\n⚠️ Kontaktanfragen sind deaktiviert, es wird nichts gesendet.",
                    );
                }
                reply
            }
            Command::Unknown => "Unbekannter Befehl. Nutze /help für eine Übersicht.".to_string(),
        }
    }

    async fn status(&self) -> String {
        let profiles = match self.store.active_profiles().await {
            Ok(profiles) => profiles.len().to_string(),
            Err(_) => "?".to_string(),
        };
        format!(
            "🏠 <b>Status</b>\n\n<b>Modus:</b> {}\n<b>Aktive Suchprofile:</b> {}\n<b>Intervall:</b> {} s\n\nNutze /contact_on, /preview_on oder /contact_off um den Modus zu wechseln.",
            mode_label(self.mode.current()),
            profiles,
            self.poll_interval.as_secs()
        )
    }

    /// Long-polls for commands until `cancel` fires. Messages from other
    /// chats are ignored.
    pub async fn run(self, cancel: CancellationToken) {
        info!("command listener started");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                _ = cancel.cancelled() => break,
                updates = self.client.get_updates(offset, LONG_POLL_SECS) => updates,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "failed to fetch telegram updates");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                if message.chat.id != self.client.chat_id() {
                    debug!(chat_id = message.chat.id, "ignoring message from foreign chat");
                    continue;
                }
                let Some(command) = message.text.as_deref().and_then(Command::parse) else {
                    continue;
                };

                debug!(?command, "handling command");
                let reply = self.handle(command).await;
                if let Err(e) = self.client.send_html(&reply, None).await {
                    warn!(error = %e, "failed to answer command");
                }
            }
        }
        info!("command listener stopped");
    }
}

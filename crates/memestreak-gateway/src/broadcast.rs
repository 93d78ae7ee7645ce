use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::sync::watch;
use tokio::time::{Instant, interval_at};
use tracing::{error, info, warn};

use memestreak_db::{AccountStore, StoreError};

use crate::dispatcher::Dispatcher;

pub const PROMO_TEXTS: [&str; 8] = [
    "🤣 New memes just dropped… ready to laugh again?",
    "😂 Need a quick laugh break? I’ve got fresh memes for you!",
    "🔥 Your MemeStreak is hungry… go feed it with new memes!",
    "😈 I bet today’s memes will make you snort-laugh. Prove me wrong.",
    "📲 Scroll less, laugh more. New memes waiting for you!",
    "🤯 Some memes are SO dumb they’re genius. Go see for yourself.",
    "🙃 Bored? I have memes. You know what to do.",
    "😹 Warning: today’s memes may cause uncontrollable giggles.",
];

const PROMO_FOOTER: &str = "Tap below to open MemeStreak Hub 👇";

#[derive(Debug, Clone, Copy)]
pub struct BroadcastSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Gap between two sends, to stay under the platform's rate limits.
    pub pace: Duration,
}

impl Default for BroadcastSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(15),
            interval: Duration::from_secs(48 * 60 * 60),
            pace: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub blocked: usize,
    pub failed: usize,
}

fn promo_text() -> String {
    let line = PROMO_TEXTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(PROMO_TEXTS[0]);
    format!("{line}\n\n{PROMO_FOOTER}")
}

impl Dispatcher {
    /// Sends one promo with the site button to every reachable account.
    /// Delivery failures are counted and skipped.
    pub async fn broadcast_promo(&self, pace: Duration) -> Result<BroadcastReport, StoreError> {
        let chat_ids = self.inner.store.reachable_chat_ids().await?;
        if chat_ids.is_empty() {
            info!("No users to send the promo to");
            return Ok(BroadcastReport::default());
        }

        info!("Running promo broadcast to {} chats", chat_ids.len());
        let mut report = BroadcastReport::default();
        for (i, chat_id) in chat_ids.into_iter().enumerate() {
            if i > 0 && !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }

            match self.send_site_button(chat_id, &promo_text()).await {
                Ok(()) => report.sent += 1,
                Err(e) if e.is_blocked() => {
                    info!("User {} blocked the bot, skipping", chat_id);
                    report.blocked += 1;
                }
                Err(e) => {
                    warn!("Promo to {} failed: {}", chat_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Promo broadcast finished: {} sent, {} blocked, {} failed",
            report.sent, report.blocked, report.failed
        );
        Ok(report)
    }
}

/// Runs `broadcast_promo` after `initial_delay`, then every `interval`,
/// until `shutdown` flips.
pub async fn run_broadcast_loop(
    dispatcher: Dispatcher,
    schedule: BroadcastSchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = schedule.interval.max(Duration::from_secs(1));
    let mut ticker = interval_at(Instant::now() + schedule.initial_delay, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        if let Err(e) = dispatcher.broadcast_promo(schedule.pace).await {
            error!("Promo broadcast aborted: {}", e);
        }
    }

    info!("Broadcast loop stopped");
}

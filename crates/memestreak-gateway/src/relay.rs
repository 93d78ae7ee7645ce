//! Meme relay between paired accounts, and reactions on relayed memes.

use chrono::Utc;
use tracing::{debug, error, info};

use memestreak_db::{AccountStore, ReactionStore};
use memestreak_telegram::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, User,
};
use memestreak_telegram::{Media, MediaKind, SendOptions};
use memestreak_types::callback::{CallbackData, CallbackError};
use memestreak_types::models::{Account, Reaction};

use crate::dispatcher::Dispatcher;
use crate::error::BotError;
use crate::texts;

/// The relayable file in a message. Photos use the largest size.
pub fn media_of(msg: &Message) -> Option<Media> {
    if let Some(largest) = msg.photo.last() {
        return Some(Media {
            kind: MediaKind::Photo,
            file_id: largest.file_id.clone(),
        });
    }
    if let Some(video) = &msg.video {
        return Some(Media {
            kind: MediaKind::Video,
            file_id: video.file_id.clone(),
        });
    }
    msg.document.as_ref().map(|doc| Media {
        kind: MediaKind::Document,
        file_id: doc.file_id.clone(),
    })
}

pub fn reaction_keyboard(sender_uid: &str) -> Result<InlineKeyboardMarkup, CallbackError> {
    let row = texts::REACTION_SYMBOLS
        .iter()
        .map(|symbol| {
            let data = CallbackData::react(*symbol, sender_uid).encode()?;
            Ok(InlineKeyboardButton::callback(*symbol, data))
        })
        .collect::<Result<Vec<_>, CallbackError>>()?;
    Ok(InlineKeyboardMarkup {
        inline_keyboard: vec![row],
    })
}

/// Stored first name, then the platform profile, then `Someone`.
fn sender_name<'a>(account: &'a Account, from: &'a User) -> &'a str {
    account
        .first_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(from.first_name.as_deref().filter(|s| !s.is_empty()))
        .or(from.username.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or(texts::ANONYMOUS)
}

impl Dispatcher {
    /// Forwards `media` to the pending send target, then bumps both streaks.
    /// Without a pending target the message is ignored.
    pub(crate) async fn relay_media(
        &self,
        from: &User,
        chat_id: i64,
        media: Media,
    ) -> Result<(), BotError> {
        let session = self.inner.sessions.load(from.id).await?;
        let Some(friend_uid) = session.send_target.clone() else {
            debug!("Media from {} with no send target, ignoring", from.id);
            return Ok(());
        };

        let sender = self.account_for(from).await?;
        let receiver_chat = self
            .inner
            .store
            .account_by_uid(&friend_uid)
            .await?
            .and_then(|friend| friend.chat_id);
        let Some(receiver_chat) = receiver_chat else {
            self.reply(chat_id, texts::RECEIVER_MISSING).await;
            return self.forget_send_target(from.id, session).await;
        };

        let caption = texts::meme_caption(sender_name(&sender, from));
        let keyboard = reaction_keyboard(&sender.uid)?;
        self.inner
            .messenger
            .send_media(receiver_chat, &media, &caption, Some(keyboard))
            .await?;

        let outcome = self
            .inner
            .ledger
            .record_activity(&sender.uid, &friend_uid, Utc::now())
            .await;
        debug!("Activity {} -> {}: {:?}", sender.uid, friend_uid, outcome);

        self.reply(chat_id, texts::MEME_SENT).await;
        self.forget_send_target(from.id, session).await
    }

    /// Logs the reaction, tells the meme's sender, and acknowledges the press.
    pub(crate) async fn react(
        &self,
        query: &CallbackQuery,
        symbol: &str,
        original_sender_uid: &str,
    ) -> Result<(), BotError> {
        let reactor = self.account_for(&query.from).await?;

        let reaction = Reaction {
            reactor_uid: reactor.uid.clone(),
            original_sender_uid: original_sender_uid.to_string(),
            message_ref: query
                .message
                .as_ref()
                .map(|m| m.message_id.to_string())
                .unwrap_or_default(),
            symbol: symbol.to_string(),
        };
        if let Err(e) = self.inner.store.append_reaction(&reaction).await {
            error!("Saving reaction from {} failed: {}", reactor.uid, e);
        }

        match self.inner.store.account_by_uid(original_sender_uid).await {
            Ok(Some(Account {
                chat_id: Some(sender_chat),
                ..
            })) => {
                let notice = texts::reaction_notice(reactor.display_name(texts::ANONYMOUS), symbol);
                match self
                    .inner
                    .messenger
                    .send_text(sender_chat, &notice, SendOptions::default())
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_blocked() => {
                        info!("{} blocked the bot, reaction notice skipped", original_sender_uid)
                    }
                    Err(e) => error!("Reaction notice to {} failed: {}", original_sender_uid, e),
                }
            }
            Ok(_) => debug!("Reaction target {} has no chat", original_sender_uid),
            Err(e) => error!("Reaction target lookup {} failed: {}", original_sender_uid, e),
        }

        self.answer(&query.id, Some(&texts::reaction_ack(symbol))).await;
        Ok(())
    }
}

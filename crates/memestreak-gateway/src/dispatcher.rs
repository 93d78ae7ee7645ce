use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use memestreak_db::Store;
use memestreak_ledger::{PairError, PairingLedger};
use memestreak_telegram::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};
use memestreak_telegram::{Messenger, SendOptions};
use memestreak_types::callback::CallbackData;
use memestreak_types::models::Account;
use memestreak_types::session::{Mode, Session};

use crate::accounts::{ensure_account, profile_of};
use crate::command::{Command, is_command};
use crate::error::BotError;
use crate::relay::media_of;
use crate::sessions::Sessions;
use crate::texts;

/// Shortest text accepted as a friend uid in the add-friend flow.
const MIN_UID_LEN: usize = 4;

pub struct BotSettings {
    pub site_url: String,
    pub session_ttl: Duration,
}

/// Routes platform updates to the bot's flows. Cheap to clone; every
/// update task gets its own handle.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<DispatcherInner>,
}

pub(crate) struct DispatcherInner {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ledger: PairingLedger<dyn Store>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) sessions: Sessions,
    pub(crate) site_url: String,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, messenger: Arc<dyn Messenger>, settings: BotSettings) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                ledger: PairingLedger::new(store.clone()),
                sessions: Sessions::new(store.clone(), settings.session_ttl),
                store,
                messenger,
                site_url: settings.site_url,
            }),
        }
    }

    pub async fn handle_update(&self, update: Update) {
        debug!("Update {}", update.update_id);
        if let Some(query) = update.callback_query {
            self.handle_callback(query).await;
        } else if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, msg: Message) {
        let Some(from) = msg.from.as_ref() else {
            return;
        };
        if from.is_bot {
            return;
        }
        let chat_id = msg.chat.id;

        if let Some(text) = msg.text.as_deref() {
            if let Some(command) = Command::parse(text) {
                self.run_command(command, from, chat_id).await;
            } else if is_command(text) {
                debug!("Ignoring unknown command from {}", from.id);
            } else if let Err(e) = self.handle_text(from, chat_id, text).await {
                error!("Text handler for {} failed: {}", from.id, e);
                self.reply(chat_id, texts::GENERIC_FAILURE).await;
            }
            return;
        }

        if let Some(media) = media_of(&msg) {
            if let Err(e) = self.relay_media(from, chat_id, media).await {
                error!("Meme relay for {} failed: {}", from.id, e);
                self.reply(chat_id, texts::RELAY_FAILED).await;
            }
        }
    }

    async fn run_command(&self, command: Command, from: &User, chat_id: i64) {
        let result = match command {
            Command::Start => self.start(from, chat_id).await,
            Command::MyUid => self.my_uid(from, chat_id).await,
            Command::AddFriend => self.add_friend(from, chat_id).await,
            Command::Friends => self.friends(from, chat_id).await,
            Command::SendMeme => self.send_meme(from, chat_id).await,
            Command::OpenSite => self.send_site_button(chat_id, texts::OPEN_SITE).await,
        };

        if let Err(e) = result {
            error!("/{} for {} failed: {}", command.name(), from.id, e);
            self.reply(chat_id, command.apology()).await;
        }
    }

    pub(crate) async fn account_for(&self, user: &User) -> Result<Account, BotError> {
        ensure_account(self.inner.store.as_ref(), profile_of(user)).await
    }

    async fn start(&self, from: &User, chat_id: i64) -> Result<(), BotError> {
        let account = self.account_for(from).await?;
        self.inner.sessions.clear(from.id).await?;
        self.inner
            .messenger
            .send_text(chat_id, &texts::welcome(&account.uid), SendOptions::markdown())
            .await?;
        Ok(())
    }

    async fn my_uid(&self, from: &User, chat_id: i64) -> Result<(), BotError> {
        let account = self.account_for(from).await?;
        self.inner
            .messenger
            .send_text(chat_id, &texts::your_uid(&account.uid), SendOptions::markdown())
            .await?;
        Ok(())
    }

    async fn add_friend(&self, from: &User, chat_id: i64) -> Result<(), BotError> {
        let account = self.account_for(from).await?;
        let mut session = self.inner.sessions.load(from.id).await?;
        session.mode = Some(Mode::AddFriend { my_uid: account.uid });
        self.inner.sessions.save(from.id, session).await?;

        self.inner
            .messenger
            .send_text(chat_id, texts::ADD_FRIEND_PROMPT, SendOptions::markdown())
            .await?;
        Ok(())
    }

    async fn friends(&self, from: &User, chat_id: i64) -> Result<(), BotError> {
        let account = self.account_for(from).await?;
        let friends = self.inner.ledger.friends_of(&account.uid).await?;

        if friends.is_empty() {
            self.inner
                .messenger
                .send_text(chat_id, texts::NO_FRIENDS, SendOptions::default())
                .await?;
            return Ok(());
        }

        self.inner
            .messenger
            .send_text(chat_id, &texts::friend_list(&friends), SendOptions::markdown())
            .await?;
        Ok(())
    }

    async fn send_meme(&self, from: &User, chat_id: i64) -> Result<(), BotError> {
        let account = self.account_for(from).await?;
        let friends = self.inner.ledger.friends_of(&account.uid).await?;

        if friends.is_empty() {
            self.inner
                .messenger
                .send_text(chat_id, texts::NO_FRIENDS_TO_SEND, SendOptions::default())
                .await?;
            return Ok(());
        }

        let mut rows = Vec::with_capacity(friends.len());
        for friend in &friends {
            let data = CallbackData::pick_friend(friend.friend_uid.as_str()).encode()?;
            rows.push(vec![InlineKeyboardButton::callback(texts::picker_label(friend), data)]);
        }

        let mut session = self.inner.sessions.load(from.id).await?;
        session.mode = Some(Mode::SendMemeSelect { my_uid: account.uid });
        self.inner.sessions.save(from.id, session).await?;

        self.inner
            .messenger
            .send_text(
                chat_id,
                texts::PICK_FRIEND,
                SendOptions::default().with_markup(InlineKeyboardMarkup {
                    inline_keyboard: rows,
                }),
            )
            .await?;
        Ok(())
    }

    /// Plain text only matters while an add-friend prompt is pending.
    async fn handle_text(&self, from: &User, chat_id: i64, text: &str) -> Result<(), BotError> {
        let mut session = self.inner.sessions.load(from.id).await?;
        let Some(Mode::AddFriend { my_uid }) = session.mode.clone() else {
            return Ok(());
        };

        session.mode = None;
        self.inner.sessions.save(from.id, session).await?;

        let friend_uid = text.trim();
        if friend_uid.chars().count() < MIN_UID_LEN {
            self.reply(chat_id, texts::INVALID_UID).await;
            return Ok(());
        }

        let reply = match self.inner.ledger.pair(&my_uid, friend_uid).await {
            Ok(()) => {
                info!("{} added {} as a friend", my_uid, friend_uid);
                texts::FRIEND_ADDED
            }
            Err(PairError::SelfPairing) => texts::SELF_PAIRING,
            Err(PairError::FriendNotFound) => texts::FRIEND_NOT_FOUND,
            Err(PairError::Store(e)) => {
                error!("Pairing {} with {} failed: {}", my_uid, friend_uid, e);
                texts::PAIR_FAILED
            }
        };
        self.reply(chat_id, reply).await;
        Ok(())
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        let data = query.data.as_deref().unwrap_or_default();
        let chat_id = query
            .message
            .as_ref()
            .map_or(query.from.id, |m| m.chat.id);

        let result = match CallbackData::decode(data) {
            Ok(CallbackData::PickFriend { friend_uid }) => {
                self.pick_friend(&query, chat_id, friend_uid).await
            }
            Ok(CallbackData::React { symbol, sender_uid }) => {
                self.react(&query, &symbol, &sender_uid).await
            }
            Err(e) => {
                warn!("Unreadable callback payload {:?}: {}", data, e);
                self.answer(&query.id, None).await;
                return;
            }
        };

        if let Err(e) = result {
            error!("Callback from {} failed: {}", query.from.id, e);
            self.answer(&query.id, Some(texts::GENERIC_FAILURE)).await;
        }
    }

    async fn pick_friend(
        &self,
        query: &CallbackQuery,
        chat_id: i64,
        friend_uid: String,
    ) -> Result<(), BotError> {
        let key = query.from.id;
        let mut session = self.inner.sessions.load(key).await?;
        session.send_target = Some(friend_uid.clone());
        session.mode = Some(Mode::SendMemeWaitMedia { friend_uid });
        self.inner.sessions.save(key, session).await?;

        self.answer(&query.id, None).await;
        self.inner
            .messenger
            .send_text(chat_id, texts::FRIEND_SELECTED, SendOptions::markdown())
            .await?;
        Ok(())
    }

    pub(crate) async fn send_site_button(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton::url(
                texts::SITE_BUTTON,
                self.inner.site_url.as_str(),
            )]],
        };
        self.inner
            .messenger
            .send_text(chat_id, text, SendOptions::markdown().with_markup(markup))
            .await?;
        Ok(())
    }

    /// Best-effort plain reply. Failures are logged, never propagated.
    pub(crate) async fn reply(&self, chat_id: i64, text: &str) {
        match self
            .inner
            .messenger
            .send_text(chat_id, text, SendOptions::default())
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_blocked() => info!("Chat {} blocked the bot, reply dropped", chat_id),
            Err(e) => error!("Reply to {} failed: {}", chat_id, e),
        }
    }

    pub(crate) async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.inner.messenger.answer_callback(callback_id, text).await {
            warn!("Answering callback {} failed: {}", callback_id, e);
        }
    }

    pub(crate) async fn forget_send_target(&self, key: i64, mut session: Session) -> Result<(), BotError> {
        session.send_target = None;
        if matches!(session.mode, Some(Mode::SendMemeWaitMedia { .. })) {
            session.mode = None;
        }
        self.inner.sessions.save(key, session).await?;
        Ok(())
    }
}

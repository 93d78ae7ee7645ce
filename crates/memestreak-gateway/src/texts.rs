//! User-facing bot copy.

use memestreak_types::models::FriendEntry;

pub const GENERIC_FAILURE: &str = "❌ Something went wrong.";

pub const SITE_BUTTON: &str = "Open MemeStreak Hub 🌐";
pub const OPEN_SITE: &str = "🌐 Tap below to open *MemeStreak Hub* and explore fresh memes:";

pub const ADD_FRIEND_PROMPT: &str = "👥 Send me your friend's UID (like `MS123456`) to add them.";
pub const INVALID_UID: &str = "❌ That UID looks invalid. Use /addfriend again.";
pub const SELF_PAIRING: &str = "🙃 You cannot add yourself.";
pub const FRIEND_NOT_FOUND: &str = "❌ No user found with that UID.";
pub const PAIR_FAILED: &str = "❌ Could not add friend. Please try again.";
pub const FRIEND_ADDED: &str =
    "✅ Friend added!\nNow you both can use /sendmeme to keep your MemeStreak alive 🔥";

pub const NO_FRIENDS: &str = "👀 You have no friends yet.\nUse /addfriend and share your UID with them.";
pub const NO_FRIENDS_TO_SEND: &str = "👀 You have no friends to send memes to.\nUse /addfriend first.";
pub const PICK_FRIEND: &str = "📤 Who do you want to send a meme to?\nTap a friend:";
pub const FRIEND_SELECTED: &str =
    "✅ Friend selected!\nNow send a *photo/video/document* – that meme will be forwarded.";

pub const MEME_SENT: &str = "✅ Meme sent! Streak updated (max +1 per day if both keep sending). 🔥";
pub const RECEIVER_MISSING: &str = "❌ Could not find your friend. Try /sendmeme again.";
pub const RELAY_FAILED: &str = "❌ Something went wrong while sending your meme.";

/// Offered under every relayed meme.
pub const REACTION_SYMBOLS: [&str; 5] = ["😂", "🤣", "😐", "😭", "❤️"];

/// Name used when an account has neither a first name nor a username.
pub const ANONYMOUS: &str = "Someone";

/// Escapes the characters legacy Markdown treats as entity markers, so user
/// names can't break message parsing.
pub fn escape_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn welcome(uid: &str) -> String {
    format!(
        "🔥 *Welcome to MemeStreak!* \n\n\
         Your UID: *{uid}*\n\n\
         Share memes every day to keep your streak alive! 🔥\n\n\
         Commands:\n\
         • /myuid – Show your UID\n\
         • /addfriend – Add a friend using their UID\n\
         • /friends – See your friend list & streaks\n\
         • /sendmeme – Send a meme to a friend\n\
         • /opensite – Open MemeStreak Hub"
    )
}

pub fn your_uid(uid: &str) -> String {
    format!("🔑 Your UID: *{uid}*")
}

pub fn friend_list(friends: &[FriendEntry]) -> String {
    let mut text = String::from("👥 *Your friends & streaks:*\n\n");
    for friend in friends {
        text.push_str(&format!(
            "• {} – 🔥 {}\n",
            escape_markdown(&friend.name),
            friend.streak
        ));
    }
    text
}

pub fn picker_label(friend: &FriendEntry) -> String {
    format!("{} (🔥 {})", friend.name, friend.streak)
}

pub fn meme_caption(sender_name: &str) -> String {
    format!("📨 Meme from {sender_name}")
}

pub fn reaction_notice(reactor_name: &str, symbol: &str) -> String {
    format!("{reactor_name} reacted {symbol} to your meme 😄")
}

pub fn reaction_ack(symbol: &str) -> String {
    format!("You reacted {symbol}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_list_escapes_names() {
        let friends = vec![
            FriendEntry {
                friend_uid: "MS100002".into(),
                name: "meme_lord".into(),
                streak: 4,
            },
            FriendEntry {
                friend_uid: "MS100003".into(),
                name: "MS100003".into(),
                streak: 0,
            },
        ];
        let text = friend_list(&friends);
        assert!(text.starts_with("👥 *Your friends & streaks:*"));
        assert!(text.contains("• meme\\_lord – 🔥 4\n"));
        assert!(text.contains("• MS100003 – 🔥 0\n"));
    }

    #[test]
    fn welcome_mentions_uid_and_commands() {
        let text = welcome("MS123456");
        assert!(text.contains("Your UID: *MS123456*"));
        assert!(text.contains("/sendmeme"));
    }
}

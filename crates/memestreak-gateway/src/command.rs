/// Slash commands the bot answers. Anything else starting with `/` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    MyUid,
    AddFriend,
    Friends,
    SendMeme,
    OpenSite,
}

impl Command {
    /// Parses the leading `/command` of a message. A `@botname` suffix is
    /// accepted and trailing arguments are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let head = text.split_whitespace().next()?;
        let name = head.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name {
            "start" => Some(Self::Start),
            "myuid" => Some(Self::MyUid),
            "addfriend" => Some(Self::AddFriend),
            "friends" => Some(Self::Friends),
            "sendmeme" => Some(Self::SendMeme),
            "opensite" | "site" => Some(Self::OpenSite),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MyUid => "myuid",
            Self::AddFriend => "addfriend",
            Self::Friends => "friends",
            Self::SendMeme => "sendmeme",
            Self::OpenSite => "opensite",
        }
    }

    /// Sent to the user when the command fails.
    pub fn apology(self) -> &'static str {
        match self {
            Self::Start => "❌ Something went wrong.",
            Self::MyUid => "❌ Could not get your UID.",
            Self::AddFriend => "❌ Could not start add-friend flow.",
            Self::Friends => "❌ Could not load your friends.",
            Self::SendMeme => "❌ Could not start meme sending flow.",
            Self::OpenSite => "❌ Could not open MemeStreak Hub.",
        }
    }
}

/// True for any text that looks like a command, known or not.
pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

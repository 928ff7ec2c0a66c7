use lookup_core::{Tier, UserId};
use teloxide::types::BotCommand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    MyId,
    Help,
    Owner,
    AddSudo(Vec<String>),
    RmSudo(Vec<String>),
    SudoList,
    Ban(Vec<String>),
    Unban(Vec<String>),
    BanList,
    AddPremium(Vec<String>),
    RmPremium(Vec<String>),
    PremiumList,
    Stats,
    MyStats,
    History,
    Limit,
    /// Everything after the command word, line breaks included.
    Broadcast(String),
    Maintenance,
}

impl Command {
    fn all() -> Vec<BotCommand> {
        [
            ("start", "Start the bot"),
            ("help", "Show help"),
            ("mystats", "Your lookup statistics"),
            ("history", "Your recent lookups"),
            ("limit", "Check your daily limit"),
            ("myid", "Show your Telegram id"),
        ]
        .into_iter()
        .map(|(command, description)| BotCommand {
            command: command.to_string(),
            description: description.to_string(),
        })
        .collect()
    }

    /// Commands advertised in the Telegram client menu.
    #[must_use]
    pub fn bot_commands() -> Vec<BotCommand> {
        Self::all()
    }

    /// Parse `/command[@bot] args...`. Returns `None` for plain text and
    /// for commands addressed to another bot or not known here.
    #[must_use]
    pub fn parse_from_text(text: &str, bot_name: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, tail) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(head, tail)| (head, tail.trim()));

        // Remove bot mention if present (e.g., "/start@my_bot")
        let name = match head.split_once('@') {
            Some((name, mention)) => {
                if !bot_name.is_empty() && !mention.eq_ignore_ascii_case(bot_name) {
                    return None;
                }
                name
            }
            None => head,
        };
        let args = || -> Vec<String> { tail.split_whitespace().map(str::to_string).collect() };

        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "myid" => Some(Self::MyId),
            "help" => Some(Self::Help),
            "owner" => Some(Self::Owner),
            "addsudo" => Some(Self::AddSudo(args())),
            "rmsudo" => Some(Self::RmSudo(args())),
            "sudolist" => Some(Self::SudoList),
            "ban" => Some(Self::Ban(args())),
            "unban" => Some(Self::Unban(args())),
            "banlist" => Some(Self::BanList),
            "addpremium" => Some(Self::AddPremium(args())),
            "rmpremium" => Some(Self::RmPremium(args())),
            "premiumlist" => Some(Self::PremiumList),
            "stats" => Some(Self::Stats),
            "mystats" => Some(Self::MyStats),
            "history" => Some(Self::History),
            "limit" => Some(Self::Limit),
            "broadcast" => Some(Self::Broadcast(tail.to_string())),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }

    /// Name used in logs and usage hints.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MyId => "myid",
            Self::Help => "help",
            Self::Owner => "owner",
            Self::AddSudo(_) => "addsudo",
            Self::RmSudo(_) => "rmsudo",
            Self::SudoList => "sudolist",
            Self::Ban(_) => "ban",
            Self::Unban(_) => "unban",
            Self::BanList => "banlist",
            Self::AddPremium(_) => "addpremium",
            Self::RmPremium(_) => "rmpremium",
            Self::PremiumList => "premiumlist",
            Self::Stats => "stats",
            Self::MyStats => "mystats",
            Self::History => "history",
            Self::Limit => "limit",
            Self::Broadcast(_) => "broadcast",
            Self::Maintenance => "maintenance",
        }
    }

    /// Whether only the owner may run this command.
    #[must_use]
    pub const fn owner_only(&self) -> bool {
        matches!(
            self,
            Self::Owner
                | Self::AddSudo(_)
                | Self::RmSudo(_)
                | Self::SudoList
                | Self::Ban(_)
                | Self::Unban(_)
                | Self::BanList
                | Self::AddPremium(_)
                | Self::RmPremium(_)
                | Self::PremiumList
                | Self::Stats
                | Self::Broadcast(_)
                | Self::Maintenance
        )
    }
}

/// Inline keyboard button payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callback {
    Help,
    MyStats,
    History,
    NewSearch,
    PremiumCancel,
    Premium { user: UserId, days: i64, tier: Tier },
}

impl Callback {
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "help" => return Some(Self::Help),
            "mystats" => return Some(Self::MyStats),
            "history" => return Some(Self::History),
            "new" => return Some(Self::NewSearch),
            "premium:cancel" => return Some(Self::PremiumCancel),
            _ => {}
        }

        let mut parts = data.strip_prefix("premium:")?.split(':');
        let user = UserId::parse_numeric(parts.next()?).ok()?;
        let days = parts.next()?.parse().ok()?;
        let tier = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::Premium { user, days, tier })
    }

    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::Help => "help".to_string(),
            Self::MyStats => "mystats".to_string(),
            Self::History => "history".to_string(),
            Self::NewSearch => "new".to_string(),
            Self::PremiumCancel => "premium:cancel".to_string(),
            Self::Premium { user, days, tier } => format!("premium:{user}:{days}:{tier}"),
        }
    }
}

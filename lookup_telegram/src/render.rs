//! HTML message formatting for Telegram replies.

use chrono::{DateTime, Utc};
use lookup_core::{
    BotStats, DecisionReason, EntitlementDecision, ExtractedRecord, HistoryEntry, Role, Standing,
    Subscription, UserId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Telegram rejects messages above 4096 characters; keep some slack.
pub const MAX_MESSAGE_CHARS: usize = 4000;
const RAW_TEXT_CHARS: usize = 3500;
const CUT_MARK: &str = "\n…";
const CODE_CLOSE: &str = "</code>";
const SEPARATOR: &str = "◈ ━━━━━━ ⸙ ━━━━━━ ◈";
const HISTORY_SHOWN: usize = 10;
const HISTORY_QUERY_CHARS: usize = 15;

/// Bold small caps, e.g. "Hello" -> "ʜᴇʟʟᴏ".
#[must_use]
pub fn stylize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'a' => 'ᴀ',
            'b' => 'ʙ',
            'c' => 'ᴄ',
            'd' => 'ᴅ',
            'e' => 'ᴇ',
            'f' => 'ғ',
            'g' => 'ɢ',
            'h' => 'ʜ',
            'i' => 'ɪ',
            'j' => 'ᴊ',
            'k' => 'ᴋ',
            'l' => 'ʟ',
            'm' => 'ᴍ',
            'n' => 'ɴ',
            'o' => 'ᴏ',
            'p' => 'ᴘ',
            'q' => 'ǫ',
            'r' => 'ʀ',
            't' => 'ᴛ',
            'u' => 'ᴜ',
            'v' => 'ᴠ',
            'w' => 'ᴡ',
            'y' => 'ʏ',
            'z' => 'ᴢ',
            other => other,
        })
        .collect()
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Boxed panel with a stylized title.
#[must_use]
pub fn panel(title: &str, content: &str) -> String {
    format!(
        "╭───────────────────╮\n│ <b>{}</b> │\n╰───────────────────╯\n\n{content}",
        stylize(title)
    )
}

/// Escape `text`, stopping before the escaped form exceeds `max` chars.
/// Entities are never split. Also reports whether anything was left out.
fn escape_within(text: &str, max: usize) -> (String, bool) {
    let mut out = String::new();
    let mut used = 0;
    let mut buf = [0; 4];
    for c in text.chars() {
        let piece = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            _ => &*c.encode_utf8(&mut buf),
        };
        let cost = piece.chars().count();
        if used + cost > max {
            return (out, true);
        }
        out.push_str(piece);
        used += cost;
    }
    (out, false)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(i, _)| &text[..i])
}

/// Link to a user's profile showing `name`.
#[must_use]
pub fn user_mention(user: &UserId, name: &str) -> String {
    format!(
        r#"<a href="tg://openmessage?user_id={user}">{}</a>"#,
        escape_html(name)
    )
}

/// Owner attribution appended to most replies.
#[derive(Debug, Clone)]
pub struct Signature {
    pub owner: Option<UserId>,
    pub owner_name: String,
}

impl Signature {
    #[must_use]
    pub fn owner_line(&self) -> String {
        let name = stylize(&self.owner_name);
        let name = match &self.owner {
            Some(owner) => format!(r#"<a href="tg://openmessage?user_id={owner}">{name}</a>"#),
            None => name,
        };
        format!("👑 {}: {name}", stylize("Owner"))
    }

    #[must_use]
    pub fn footer(&self) -> String {
        format!("\n{SEPARATOR}\n{}", self.owner_line())
    }

    /// URL of the owner's profile, for "contact owner" buttons.
    #[must_use]
    pub fn owner_url(&self) -> Option<url::Url> {
        let owner = self.owner.as_ref()?;
        url::Url::parse(&format!("tg://openmessage?user_id={owner}")).ok()
    }
}

/// One record, cut at a field boundary (or inside a value) so that it stays
/// within `budget` chars. Returns whether the record was cut.
fn record_block(record: &ExtractedRecord, budget: usize) -> (String, bool) {
    let mut block = format!(
        "╭───────────────────╮\n│🔍 <b>{}</b> #{}│\n╰───────────────────╯\n",
        stylize("User Information"),
        record.ordinal
    );
    let mut used = block.chars().count();
    for field in &record.fields {
        let label = if field.known {
            field.label.clone()
        } else {
            format!("📝 {}", stylize(&field.label))
        };
        let open = format!("\n{label}: <code>");
        let fixed = open.chars().count() + CODE_CLOSE.len() + CUT_MARK.chars().count();
        let (value, cut) = escape_within(&field.value, budget.saturating_sub(used + fixed));
        if value.is_empty() {
            block.push_str(CUT_MARK);
            return (block, true);
        }
        used += open.chars().count() + value.chars().count() + CODE_CLOSE.len();
        let _ = write!(block, "{open}{value}{CODE_CLOSE}");
        if cut {
            block.push_str(CUT_MARK);
            return (block, true);
        }
    }
    (block, false)
}

/// Render extracted records in source order, followed by the signature.
///
/// Records that would push the message past [`MAX_MESSAGE_CHARS`] are
/// summarized as a count instead. A first record too large on its own is
/// cut down to fit.
#[must_use]
pub fn format_records(
    records: &[ExtractedRecord],
    requested_by: Option<&str>,
    signature: &Signature,
) -> String {
    let mut tail = format!("\n\n{SEPARATOR}");
    if let Some(by) = requested_by {
        let _ = write!(tail, "\n👤 {}: {by}", stylize("By"));
    }
    let _ = write!(tail, "\n{}", signature.owner_line());

    let budget = MAX_MESSAGE_CHARS.saturating_sub(tail.chars().count() + 40);
    let mut body = String::new();
    let mut used = 0;
    let mut shown = 0;
    for record in records {
        let (block, cut) = record_block(record, budget.saturating_sub(used + 2));
        if cut && shown > 0 {
            break;
        }
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&block);
        used += block.chars().count() + 2;
        shown += 1;
        if cut {
            break;
        }
    }
    if shown < records.len() {
        let _ = write!(body, "\n\n<i>… {} more record(s)</i>", records.len() - shown);
    }

    body + &tail
}

/// Page text that had no recognizable structure.
#[must_use]
pub fn format_raw(text: &str) -> String {
    let (shown, cut) = escape_within(text.trim(), RAW_TEXT_CHARS);
    if cut {
        shown + CUT_MARK
    } else {
        shown
    }
}

#[must_use]
pub fn no_data(query: &str) -> String {
    panel(
        "⚠️ No Data",
        &format!("No info for <code>{}</code>", escape_html(query)),
    )
}

#[must_use]
pub fn processing() -> String {
    panel("⏳ Processing", "<i>Fetching data... Please wait.</i>")
}

#[must_use]
pub fn internal_error() -> String {
    panel("❌ Error", "Something went wrong. Please try again later.")
}

/// Header prepended to the copy of a lookup sent to the log chat.
#[must_use]
pub fn log_header(query: &str, mention: &str, user: &UserId) -> String {
    format!(
        "🔍 <b>Query:</b> <code>{}</code>\n👤 <b>By:</b> {mention} (<code>{user}</code>)\n\n",
        escape_html(query)
    )
}

/// A distinct message for each denial reason.
#[must_use]
pub fn denial(decision: &EntitlementDecision, signature: &Signature) -> String {
    match decision.reason {
        DecisionReason::MaintenanceMode => panel("🔧 Maintenance", "Try again later."),
        DecisionReason::Banned => panel("🚫 Banned", "You are banned."),
        DecisionReason::Unauthorized => panel(
            "🚫 Access Denied",
            &format!(
                "⚠️ Not authorized!\n📩 Contact owner for access.{}",
                signature.footer()
            ),
        ),
        DecisionReason::QuotaExceeded => panel(
            "⏳ Limit Reached",
            &format!(
                "Daily limit ({}) exceeded.\nTry again tomorrow.",
                decision.ceiling
            ),
        ),
        DecisionReason::Allowed => processing(),
    }
}

#[must_use]
pub const fn tier_label(standing: &Standing) -> &'static str {
    match (standing.role, standing.subscription) {
        (Role::Owner, _) => "👑 Owner",
        (_, Some(_)) => "⭐ Premium",
        (Role::Delegate, None) => "🔓 Sudo",
        (Role::Regular, None) => "🔒 None",
    }
}

#[must_use]
pub fn welcome(first_name: &str, standing: &Standing, signature: &Signature) -> String {
    panel(
        "🔐 Premium Access",
        &format!(
            "✨ <b>Welcome back, {}!</b>\n\n🎫 <b>Tier:</b> {}\n📊 <b>Daily Limit:</b> {}/{}\n\n🔍 <i>Send any mobile number to fetch info.</i>\n{}",
            escape_html(first_name),
            tier_label(standing),
            standing.used_today,
            standing.ceiling,
            signature.footer()
        ),
    )
}

#[must_use]
pub fn not_authorized(signature: &Signature) -> String {
    panel(
        "🚫 Access Denied",
        &format!(
            "⚠️ <b>You are not authorized!</b>\n\n📩 Contact the owner for access.\n{}",
            signature.footer()
        ),
    )
}

const USER_COMMANDS: &str = "<b>📋 Commands:</b>\n• /start - Welcome\n• /help - This menu\n• /mystats - Your stats\n• /history - Lookup history\n• /limit - Check daily limit\n\n<b>🔍 Usage:</b>\nSend any number to lookup.";

#[must_use]
pub fn help(is_owner: bool, authorized: bool, signature: &Signature) -> String {
    let content = if is_owner {
        format!("<b>👑 Owner Commands:</b>\n• /owner - View all owner commands\n\n{USER_COMMANDS}")
    } else if authorized {
        USER_COMMANDS.to_string()
    } else {
        "⚠️ You are not authorized!".to_string()
    };
    panel("📖 Help Menu", &(content + &signature.footer()))
}

#[must_use]
pub fn owner_panel() -> String {
    panel(
        "👑 Owner Panel",
        "<b>👑 Owner Commands:</b>

<b>🔐 Sudo Management:</b>
• /addsudo [id] - Add sudo user
• /rmsudo [id] - Remove sudo
• /sudolist - View all sudos

<b>🚫 Ban Management:</b>
• /ban [id] - Ban user
• /unban [id] - Unban user
• /banlist - View banned

<b>⭐ Premium Management:</b>
• /addpremium [id] [days]
• /rmpremium [id] - Remove premium
• /premiumlist - View premium users

<b>📊 Analytics:</b>
• /stats - Bot statistics

<b>⚙️ Admin Tools:</b>
• /broadcast [msg] - Broadcast to all
• /maintenance - Toggle maintenance",
    )
}

#[must_use]
pub fn my_id(user: &UserId, owner: Option<&UserId>) -> String {
    let configured = owner.map_or_else(|| "(not set)".to_string(), ToString::to_string);
    let is_owner = if owner == Some(user) {
        "✅ YES"
    } else {
        "❌ NO"
    };
    panel(
        "🆔 Your Info",
        &format!(
            "👤 <b>Your ID:</b> <code>{user}</code>\n🔧 <b>Owner ID:</b> <code>{configured}</code>\n✅ <b>Is Owner:</b> {is_owner}"
        ),
    )
}

/// Panel listing a set of user ids, or `empty` when there are none.
#[must_use]
pub fn id_list(title: &str, users: &BTreeSet<UserId>, empty: &str) -> String {
    let content = if users.is_empty() {
        format!("<i>{empty}</i>")
    } else {
        let lines: Vec<String> = users
            .iter()
            .map(|id| format!("  • <code>{id}</code>"))
            .collect();
        format!("<b>Total:</b> {}\n\n{}", users.len(), lines.join("\n"))
    };
    panel(title, &content)
}

#[must_use]
pub fn id_panel(title: &str, user: &UserId) -> String {
    panel(title, &format!("👤 <b>ID:</b> <code>{user}</code>"))
}

#[must_use]
pub fn subscription_list(
    subscriptions: &BTreeMap<UserId, Subscription>,
    now: DateTime<Utc>,
) -> String {
    let content = if subscriptions.is_empty() {
        "<i>No premium users.</i>".to_string()
    } else {
        let lines: Vec<String> = subscriptions
            .iter()
            .map(|(id, sub)| {
                let expired = if sub.is_active_at(now) {
                    ""
                } else {
                    " (expired)"
                };
                format!(
                    "  • <code>{id}</code> [{}] exp: {}{expired}",
                    sub.tier,
                    sub.expires_at.format("%Y-%m-%d")
                )
            })
            .collect();
        format!(
            "<b>Total:</b> {}\n\n{}",
            subscriptions.len(),
            lines.join("\n")
        )
    };
    panel("⭐ Premium List", &content)
}

#[must_use]
pub fn stats(stats: &BotStats) -> String {
    panel(
        "📊 Bot Statistics",
        &format!(
            "<b>📈 Overview:</b>
  • Total Users: {}
  • Sudo Users: {}
  • Premium: {}
  • Banned: {}

<b>🔍 Lookups:</b>
  • Total: {}
  • Today: {}
  • Success: {}
  • Failed: {}",
            stats.known_users,
            stats.delegates,
            stats.subscriptions,
            stats.banned,
            stats.total_lookups,
            stats.today_lookups,
            stats.successful,
            stats.failed
        ),
    )
}

#[must_use]
pub fn my_stats(standing: &Standing) -> String {
    panel(
        "📊 My Stats",
        &format!(
            "<b>Your Statistics:</b>\n\n🎫 <b>Tier:</b> {}\n📊 <b>Total Lookups:</b> {}\n📅 <b>Today:</b> {}/{}",
            standing.label(),
            standing.lifetime,
            standing.used_today,
            standing.ceiling
        ),
    )
}

#[must_use]
pub fn limit(standing: &Standing) -> String {
    panel(
        "📊 Daily Limit",
        &format!(
            "📊 <b>Daily:</b> {}/{}\n⏳ <b>Remaining:</b> {}\n🔄 <b>Resets:</b> Midnight",
            standing.used_today,
            standing.ceiling,
            standing.remaining()
        ),
    )
}

/// The most recent lookups, newest last.
#[must_use]
pub fn history(entries: &[HistoryEntry]) -> String {
    let content = if entries.is_empty() {
        "<i>No history yet.</i>".to_string()
    } else {
        let start = entries.len().saturating_sub(HISTORY_SHOWN);
        entries[start..]
            .iter()
            .map(|entry| {
                format!(
                    "  • <code>{}</code> ({})",
                    escape_html(truncate_chars(&entry.query, HISTORY_QUERY_CHARS)),
                    entry.time.format("%Y-%m-%d")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    panel("📜 Lookup History", &content)
}

#[must_use]
pub fn maintenance(enabled: bool) -> String {
    let status = if enabled { "ON 🔴" } else { "OFF 🟢" };
    panel("🔧 Maintenance Mode", &format!("Status: {status}"))
}

#[must_use]
pub fn broadcast_done(sent: usize, failed: usize) -> String {
    panel(
        "✅ Broadcast Complete",
        &format!("✅ Sent: {sent}\n❌ Failed: {failed}"),
    )
}

use lookup_core::{Tier, UserId};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::command::Callback;
use crate::render::Signature;

fn button(text: &str, callback: &Callback) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, callback.data())
}

pub fn start_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📖 ʜᴇʟᴘ & ɢᴜɪᴅᴇ", &Callback::Help),
            button("🖥️ ᴍʏ sᴛᴀᴛs", &Callback::MyStats),
        ],
        vec![button("📜 sᴇᴀʀᴄʜ ʜɪsᴛᴏʀʏ", &Callback::History)],
    ])
}

pub fn after_lookup() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("🔄 New Search", &Callback::NewSearch),
        button("📜 Search History", &Callback::History),
    ]])
}

pub fn contact_owner(signature: &Signature) -> Option<InlineKeyboardMarkup> {
    let url = signature.owner_url()?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url("👑 ᴄᴏɴᴛᴀᴄᴛ ᴏᴡɴᴇʀ", url),
    ]]))
}

/// Tier picker shown by `/addpremium`.
pub fn tier_selection(user: &UserId, days: i64) -> InlineKeyboardMarkup {
    let tier_button = |tier: Tier| {
        let label = format!(
            "{} {} ({}/day)",
            tier.emoji(),
            tier.as_str().to_uppercase(),
            tier.daily_limit()
        );
        button(
            &label,
            &Callback::Premium {
                user: user.clone(),
                days,
                tier,
            },
        )
    };
    InlineKeyboardMarkup::new(vec![
        vec![tier_button(Tier::Basic), tier_button(Tier::Pro)],
        vec![tier_button(Tier::Vip)],
        vec![button("❌ Cancel", &Callback::PremiumCancel)],
    ])
}

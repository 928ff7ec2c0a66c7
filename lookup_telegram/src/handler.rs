use crate::command::{Callback, Command};
use crate::keyboard;
use crate::render::{self, escape_html, panel};
use crate::{Result, TelegramBot};
use chrono::Utc;
use lookup_core::admin::DEFAULT_SUBSCRIPTION_DAYS;
use lookup_core::{
    DecisionReason, EntitlementDecision, LookupOutcome, MIN_QUERY_CHARS, Payload, SetChange,
    UserId,
};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode, User,
};
use tokio::time::sleep;
use tracing::{error, info, warn};

async fn send_html(
    bot: &TelegramBot,
    chat: ChatId,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let request = bot.bot.send_message(chat, text).parse_mode(ParseMode::Html);
    Ok(match markup {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    })
}

async fn reply(bot: &TelegramBot, chat: ChatId, text: String) -> Result<()> {
    send_html(bot, chat, text, None).await?;
    Ok(())
}

async fn edit_html(
    bot: &TelegramBot,
    chat: ChatId,
    message: MessageId,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let request = bot
        .bot
        .edit_message_text(chat, message, text)
        .parse_mode(ParseMode::Html);
    match markup {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}

/// Direct message to a user. Best-effort: the caller's action already
/// succeeded, so failures are only logged.
async fn notify(bot: &TelegramBot, user: &UserId, text: String) {
    let Some(chat) = TelegramBot::chat_of(user) else {
        warn!("Cannot message non-numeric user id {user}");
        return;
    };
    if let Err(e) = bot
        .bot
        .send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!("Failed to notify {user}: {e}");
    }
}

/// Copy a lookup result to the log chat, if one is configured. Best-effort.
async fn forward_to_log(bot: &TelegramBot, header: String, body: &str) {
    let Some(chat) = bot.log_chat() else {
        return;
    };
    if let Err(e) = bot
        .bot
        .send_message(chat, header + body)
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!("Log error: {e}");
    }
}

fn display_name(user: &User) -> &str {
    user.username.as_deref().unwrap_or("unknown")
}

/// Target of an admin command: the author of the replied-to message, or
/// else the first argument. Also returns the arguments left over.
fn resolve_target<'a>(msg: &Message, args: &'a [String]) -> (Option<UserId>, &'a [String]) {
    if let Some(author) = msg.reply_to_message().and_then(|m| m.from.as_ref()) {
        return (Some(UserId::from(author.id.0)), args);
    }
    match args.split_first() {
        Some((first, rest)) => (UserId::parse_numeric(first).ok(), rest),
        None => (None, args),
    }
}

fn usage(command: &str) -> String {
    format!("⚠️ Usage: /{command} [user_id]")
}

/// Handle any message (commands or lookup queries)
pub async fn handle_message(bot: TelegramBot, msg: Message) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let caller = UserId::from(user.id.0);
    let username = display_name(user);

    let result = match Command::parse_from_text(text, bot.username()) {
        Some(cmd) => {
            info!("[@{username}] Command: /{}", cmd.name());
            handle_command(&bot, &msg, user, &caller, cmd).await
        }
        // Unknown commands and commands for other bots.
        None if text.trim_start().starts_with('/') => return Ok(()),
        None => handle_lookup(&bot, msg.chat.id, user, &caller, text).await,
    };

    if let Err(e) = result {
        error!("[@{username}] {e}");
        reply(&bot, msg.chat.id, render::internal_error()).await?;
    }
    Ok(())
}

/// Handle bot commands
async fn handle_command(
    bot: &TelegramBot,
    msg: &Message,
    user: &User,
    caller: &UserId,
    cmd: Command,
) -> Result<()> {
    if cmd.owner_only() {
        // Owner commands are silently ignored for everyone else.
        if bot.is_owner(caller) {
            handle_owner_command(bot, msg, cmd).await?;
        }
        return Ok(());
    }

    let chat = msg.chat.id;
    match cmd {
        Command::Start => start(bot, chat, user, caller).await?,
        Command::MyId => reply(bot, chat, render::my_id(caller, bot.engine().owner())).await?,
        Command::Help => {
            let standing = bot.engine().standing(caller).await?;
            let text = render::help(
                bot.is_owner(caller),
                standing.is_authorized(),
                bot.signature(),
            );
            reply(bot, chat, text).await?;
        }
        Command::MyStats => {
            let standing = bot.engine().standing(caller).await?;
            if standing.is_authorized() {
                reply(bot, chat, render::my_stats(&standing)).await?;
            }
        }
        Command::History => {
            let standing = bot.engine().standing(caller).await?;
            if standing.is_authorized() {
                let history = bot.engine().history(caller).await?;
                reply(bot, chat, render::history(&history)).await?;
            }
        }
        Command::Limit => {
            let standing = bot.engine().standing(caller).await?;
            reply(bot, chat, render::limit(&standing)).await?;
        }
        owner_command => {
            warn!("/{} reached the user command path", owner_command.name());
        }
    }
    Ok(())
}

async fn handle_owner_command(bot: &TelegramBot, msg: &Message, cmd: Command) -> Result<()> {
    let chat = msg.chat.id;
    let name = cmd.name();
    let admin = bot.admin();

    match cmd {
        Command::Owner => reply(bot, chat, render::owner_panel()).await?,
        Command::AddSudo(args) => {
            let (Some(target), _) = resolve_target(msg, &args) else {
                return reply(bot, chat, usage(name)).await;
            };
            match admin.add_delegate(&target).await? {
                SetChange::Unchanged => {
                    let text = format!("ℹ️ User <code>{target}</code> is already sudo.");
                    reply(bot, chat, text).await?;
                }
                SetChange::Changed => {
                    reply(bot, chat, render::id_panel("✅ Sudo Added", &target)).await?;
                    let dm = panel(
                        "🎉 Congratulations",
                        &format!(
                            "You've been granted sudo access!\n\nSend /start to begin.{}",
                            bot.signature().footer()
                        ),
                    );
                    notify(bot, &target, dm).await;
                }
            }
        }
        Command::RmSudo(args) => {
            let (Some(target), _) = resolve_target(msg, &args) else {
                return reply(bot, chat, usage(name)).await;
            };
            admin.remove_delegate(&target).await?;
            reply(bot, chat, render::id_panel("🗑️ Sudo Removed", &target)).await?;
        }
        Command::SudoList => {
            let users = admin.delegates().await?;
            let text = render::id_list("📋 Sudo List", &users, "No sudo users.");
            reply(bot, chat, text).await?;
        }
        Command::Ban(args) => {
            let (Some(target), _) = resolve_target(msg, &args) else {
                return reply(bot, chat, usage(name)).await;
            };
            admin.ban(&target).await?;
            reply(bot, chat, render::id_panel("🚫 User Banned", &target)).await?;
        }
        Command::Unban(args) => {
            let (Some(target), _) = resolve_target(msg, &args) else {
                return reply(bot, chat, usage(name)).await;
            };
            admin.unban(&target).await?;
            reply(bot, chat, render::id_panel("✅ User Unbanned", &target)).await?;
        }
        Command::BanList => {
            let users = admin.banned().await?;
            let text = render::id_list("🚫 Ban List", &users, "No banned users.");
            reply(bot, chat, text).await?;
        }
        Command::AddPremium(args) => add_premium(bot, msg, &args).await?,
        Command::RmPremium(args) => {
            let (Some(target), _) = resolve_target(msg, &args) else {
                return reply(bot, chat, usage(name)).await;
            };
            admin.revoke_subscription(&target).await?;
            reply(bot, chat, render::id_panel("🗑️ Premium Removed", &target)).await?;
        }
        Command::PremiumList => {
            let subscriptions = admin.subscriptions().await?;
            reply(bot, chat, render::subscription_list(&subscriptions, Utc::now())).await?;
        }
        Command::Stats => {
            let stats = admin.stats().await?;
            reply(bot, chat, render::stats(&stats)).await?;
        }
        Command::Broadcast(message) => broadcast(bot, chat, &message).await?,
        Command::Maintenance => {
            let enabled = admin.toggle_maintenance().await?;
            reply(bot, chat, render::maintenance(enabled)).await?;
        }
        user_command => {
            warn!("/{} reached the owner command path", user_command.name());
        }
    }

    Ok(())
}

async fn start(bot: &TelegramBot, chat: ChatId, user: &User, caller: &UserId) -> Result<()> {
    bot.admin().register_user(caller).await?;

    if bot.admin().maintenance().await? && !bot.is_owner(caller) {
        let text = panel(
            "🔧 Maintenance",
            "Bot is under maintenance. Please try again later.",
        );
        return reply(bot, chat, text).await;
    }

    let standing = bot.engine().standing(caller).await?;
    if standing.banned {
        let text = panel("🚫 Banned", "You are banned from using this bot.");
        return reply(bot, chat, text).await;
    }

    let signature = bot.signature();
    if standing.is_authorized() {
        let text = render::welcome(&user.first_name, &standing, signature);
        send_html(bot, chat, text, Some(keyboard::start_menu())).await?;
    } else {
        let text = render::not_authorized(signature);
        send_html(bot, chat, text, keyboard::contact_owner(signature)).await?;
    }
    Ok(())
}

async fn add_premium(bot: &TelegramBot, msg: &Message, args: &[String]) -> Result<()> {
    const USAGE: &str = "⚠️ Usage: /addpremium [user_id] [days]\nOr reply to a user's message";
    let chat = msg.chat.id;

    let (Some(target), rest) = resolve_target(msg, args) else {
        return reply(bot, chat, USAGE.to_string()).await;
    };
    let days = match rest.first().map(|d| d.parse::<i64>()) {
        None => DEFAULT_SUBSCRIPTION_DAYS,
        Some(Ok(days)) if days > 0 => days,
        Some(_) => return reply(bot, chat, USAGE.to_string()).await,
    };

    let content = format!(
        "👤 <b>User ID:</b> <code>{target}</code>\n⏰ <b>Duration:</b> {days} days\n\n<b>Select Premium Tier:</b>"
    );
    send_html(
        bot,
        chat,
        panel("⭐ Add Premium", &content),
        Some(keyboard::tier_selection(&target, days)),
    )
    .await?;
    Ok(())
}

async fn broadcast(bot: &TelegramBot, chat: ChatId, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return reply(bot, chat, "⚠️ Usage: /broadcast [message]".to_string()).await;
    }

    let users = bot.admin().known_users().await?;
    let status = send_html(bot, chat, "📤 Broadcasting...".to_string(), None).await?;
    let text = panel(
        "📢 Broadcast",
        &format!("{}{}", escape_html(message), bot.signature().footer()),
    );

    let mut sent = 0;
    let mut failed = 0;
    for user in &users {
        let delivered = match TelegramBot::chat_of(user) {
            Some(target) => bot
                .bot
                .send_message(target, text.clone())
                .parse_mode(ParseMode::Html)
                .await
                .inspect_err(|e| warn!("Broadcast to {user} failed: {e}"))
                .is_ok(),
            None => false,
        };
        if delivered {
            sent += 1;
        } else {
            failed += 1;
        }
        sleep(bot.broadcast_delay()).await;
    }

    info!("Broadcast finished: {sent} sent, {failed} failed");
    edit_html(bot, chat, status.id, render::broadcast_done(sent, failed), None).await
}

fn denial_markup(bot: &TelegramBot, decision: &EntitlementDecision) -> Option<InlineKeyboardMarkup> {
    if decision.reason == DecisionReason::Unauthorized {
        keyboard::contact_owner(bot.signature())
    } else {
        None
    }
}

/// Route a plain text message through the lookup service.
async fn handle_lookup(
    bot: &TelegramBot,
    chat: ChatId,
    user: &User,
    caller: &UserId,
    text: &str,
) -> Result<()> {
    let username = display_name(user);
    if text.trim().chars().count() < MIN_QUERY_CHARS {
        return Ok(());
    }

    bot.admin().register_user(caller).await?;
    let maintenance = bot.admin().maintenance().await?;

    // Deny up front so denials never show a placeholder.
    let decision = bot.engine().authorize(caller, maintenance).await?;
    if !decision.allowed {
        info!("[@{username}] Lookup denied: {:?}", decision.reason);
        let text = render::denial(&decision, bot.signature());
        send_html(bot, chat, text, denial_markup(bot, &decision)).await?;
        return Ok(());
    }

    let placeholder = send_html(bot, chat, render::processing(), None).await?;
    let outcome = match bot
        .service()
        .handle_lookup_request(caller, text, maintenance)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[@{username}] Lookup failed: {e}");
            return edit_html(bot, chat, placeholder.id, render::internal_error(), None).await;
        }
    };

    match outcome {
        LookupOutcome::Ignored => {
            if let Err(e) = bot.bot.delete_message(chat, placeholder.id).await {
                warn!("Failed to remove placeholder: {e}");
            }
        }
        LookupOutcome::Denied(decision) => {
            let text = render::denial(&decision, bot.signature());
            edit_html(bot, chat, placeholder.id, text, denial_markup(bot, &decision)).await?;
        }
        LookupOutcome::Completed { query, payload, .. } => {
            let mention = render::user_mention(caller, &user.first_name);
            let body = match payload {
                Payload::Records(records) => {
                    render::format_records(&records, Some(&mention), bot.signature())
                }
                Payload::RawText(raw) => render::format_raw(&raw),
                Payload::NoData => {
                    let text = render::no_data(&query);
                    return edit_html(bot, chat, placeholder.id, text, None).await;
                }
            };
            edit_html(
                bot,
                chat,
                placeholder.id,
                body.clone(),
                Some(keyboard::after_lookup()),
            )
            .await?;
            forward_to_log(bot, render::log_header(&query, &mention, caller), &body).await;
        }
    }
    Ok(())
}

/// Handle inline keyboard presses
pub async fn handle_callback(bot: TelegramBot, query: CallbackQuery) -> Result<()> {
    let caller = UserId::from(query.from.id.0);
    let username = display_name(&query.from);

    let callback = query.data.as_deref().and_then(Callback::parse);
    let (Some(callback), Some(message)) = (callback, query.message.as_ref()) else {
        bot.bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    info!("[@{username}] Callback: {}", callback.data());

    if matches!(callback, Callback::Premium { .. }) && !bot.is_owner(&caller) {
        bot.bot
            .answer_callback_query(query.id.clone())
            .text("❌ Only owner can do this!")
            .show_alert(true)
            .await?;
        return Ok(());
    }
    bot.bot.answer_callback_query(query.id.clone()).await?;

    let chat = message.chat().id;
    let message_id = message.id();
    if let Err(e) = run_callback(&bot, &caller, chat, message_id, callback).await {
        error!("[@{username}] {e}");
        edit_html(&bot, chat, message_id, render::internal_error(), None).await?;
    }
    Ok(())
}

async fn run_callback(
    bot: &TelegramBot,
    caller: &UserId,
    chat: ChatId,
    message: MessageId,
    callback: Callback,
) -> Result<()> {
    let text = match callback {
        Callback::Help => {
            let standing = bot.engine().standing(caller).await?;
            render::help(
                bot.is_owner(caller),
                standing.is_authorized(),
                bot.signature(),
            )
        }
        Callback::MyStats => render::my_stats(&bot.engine().standing(caller).await?),
        Callback::History => render::history(&bot.engine().history(caller).await?),
        Callback::NewSearch => panel("🔍 New Search", "Send any number to lookup."),
        Callback::PremiumCancel => panel("❌ Cancelled", "Premium operation cancelled."),
        Callback::Premium { user, days, tier } => {
            let subscription = bot.admin().grant_subscription(&user, days, tier).await?;
            let limit = tier.daily_limit();
            let tier_name = tier.as_str().to_uppercase();
            let emoji = tier.emoji();

            let dm = panel(
                "🎉 Premium Activated",
                &format!(
                    "You've got {emoji} {tier_name} premium for {days} days!\n\n📊 Daily Limit: {limit}/day{}",
                    bot.signature().footer()
                ),
            );
            notify(bot, &user, dm).await;

            panel(
                "⭐ Premium Added",
                &format!(
                    "✅ <b>Premium Activated!</b>\n\n👤 <b>User ID:</b> <code>{user}</code>\n{emoji} <b>Tier:</b> {tier_name}\n📊 <b>Daily Limit:</b> {limit}/day\n⏰ <b>Duration:</b> {days} days\n📅 <b>Expires:</b> {}",
                    subscription.expires_at.format("%Y-%m-%d")
                ),
            )
        }
    };
    edit_html(bot, chat, message, text, None).await
}

use crate::bot::callbacks::{CallbackAction, ItemRef};
use crate::bot::resilient::{edit_or_send, send_document_resilient, send_message_resilient};
use crate::bot::state::State;
use crate::bot::views::{self, CategoryEntry, EpisodeEntry, ItemEntry};
use crate::bot::RateLimitNoticeCache;
use anyhow::{anyhow, Result};
use iptv_curator_core::aggregator::Lookup;
use iptv_curator_core::config::PlaylistConfig;
use iptv_curator_core::selection::ContentKind;
use iptv_curator_core::upstream::models::{UNNAMED_CHANNEL, UNNAMED_MOVIE, UNNAMED_SERIES};
use iptv_curator_core::utils::{paginate, PAGE_SIZE};
use iptv_curator_core::AppContext;
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, MessageId},
    utils::command::BotCommands,
};
use tracing::{error, info, warn};

/// Dialogue handle shared by every handler
pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

const UNNAMED_CATEGORY: &str = "Unnamed category";

/// Telegram user who sent a message.
///
/// The dispatcher only routes messages that have one; channel posts and
/// other sender-less updates are dropped before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender(pub i64);

impl Sender {
    /// Sender of `msg`, if Telegram reported one.
    #[must_use]
    pub fn of(msg: &Message) -> Option<Self> {
        msg.from.as_ref().map(|u| Self(u.id.0.cast_signed()))
    }
}

/// Parse the id of a target group. Group and supergroup ids are negative.
#[must_use]
pub fn parse_group_id(text: &str) -> Option<ChatId> {
    let text = text.trim();
    if !text.starts_with('-') {
        return None;
    }
    text.parse::<i64>().ok().map(ChatId)
}

/// User ID of the one who pressed a button.
#[must_use]
pub fn callback_user_id(q: &CallbackQuery) -> i64 {
    q.from.id.0.cast_signed()
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message or the main menu
    #[command(description = "Start the bot.")]
    Start,
    /// Show the selection summary
    #[command(description = "Show your selection.")]
    Stats,
    /// Owner statistics
    #[command(description = "Owner statistics.")]
    Admin,
}

async fn update_dialogue(dialogue: &BotDialogue, state: State) -> Result<()> {
    dialogue
        .update(state)
        .await
        .map_err(|e| anyhow!(e.to_string()))
}

async fn current_state(dialogue: &BotDialogue) -> Result<State> {
    dialogue
        .get_or_default()
        .await
        .map_err(|e| anyhow!(e.to_string()))
}

/// Handle `/start`: greet newcomers, show the menu to users with a playlist.
///
/// A pending category label prompt is abandoned.
///
/// # Errors
///
/// Returns an error if the dialogue cannot be updated or the message fails to send.
pub async fn start(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<()> {
    info!(user_id, "/start");

    let state = current_state(&dialogue).await?;
    match state.config().cloned() {
        Some(config) => {
            update_dialogue(&dialogue, State::Ready { config: config.clone() }).await?;
            send_message_resilient(
                &bot,
                msg.chat.id,
                &views::main_menu_text(&config),
                Some(views::main_menu_keyboard(ctx.is_owner(user_id))),
            )
            .await?;
        }
        None => {
            send_message_resilient(&bot, msg.chat.id, views::WELCOME, None).await?;
        }
    }
    Ok(())
}

/// Handle `/stats`: the caller's selection counts.
///
/// # Errors
///
/// Returns an error if the message fails to send.
pub async fn stats(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
) -> Result<()> {
    let stats = ctx.selections.stats(user_id);
    send_message_resilient(&bot, msg.chat.id, &views::selection_stats_text(&stats), None).await?;
    Ok(())
}

/// Handle `/admin`: global statistics, owner only.
///
/// # Errors
///
/// Returns an error if the message fails to send.
pub async fn admin(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
) -> Result<()> {
    if !ctx.is_owner(user_id) {
        warn!(user_id, "Non-owner tried /admin");
        send_message_resilient(&bot, msg.chat.id, views::ADMIN_ONLY, None).await?;
        return Ok(());
    }
    let (text, keyboard) = views::admin_view(&ctx.stats().await);
    send_message_resilient(&bot, msg.chat.id, &text, Some(keyboard)).await?;
    Ok(())
}

/// Handle free text outside the label prompt: a playlist URL or a hint.
///
/// # Errors
///
/// Returns an error if the dialogue cannot be updated or a message fails to send.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let text = msg.text().unwrap_or_default().trim();

    if !text.starts_with("http") {
        send_message_resilient(&bot, chat_id, views::SEND_PLAYLIST_HINT, None).await?;
        return Ok(());
    }

    let Some(config) = PlaylistConfig::from_playlist_url(text) else {
        info!(user_id, "Rejected malformed playlist URL");
        send_message_resilient(&bot, chat_id, views::INVALID_PLAYLIST_URL, None).await?;
        return Ok(());
    };

    let status = send_message_resilient(&bot, chat_id, views::TESTING_CONNECTION, None).await?;
    if !ctx.client.test_connection(&config).await {
        info!(user_id, host = config.display_host(), "Connection test failed");
        edit_or_send(
            &bot,
            chat_id,
            status.id,
            views::CONNECTION_FAILED,
            InlineKeyboardMarkup::default(),
        )
        .await?;
        return Ok(());
    }

    info!(user_id, host = config.display_host(), "Playlist accepted");
    edit_or_send(
        &bot,
        chat_id,
        status.id,
        &views::main_menu_text(&config),
        views::main_menu_keyboard(ctx.is_owner(user_id)),
    )
    .await?;
    update_dialogue(&dialogue, State::Ready { config }).await
}

/// Handle the custom label of a full-category add and run the add.
///
/// # Errors
///
/// Returns an error if the dialogue cannot be updated or a message fails to send.
pub async fn handle_category_label(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
    (config, kind, category_id): (PlaylistConfig, ContentKind, String),
) -> Result<()> {
    let chat_id = msg.chat.id;
    let label = msg.text().unwrap_or_default().trim().to_string();

    if label.is_empty() {
        send_message_resilient(&bot, chat_id, views::EMPTY_LABEL, None).await?;
        return Ok(());
    }

    let status = send_message_resilient(&bot, chat_id, views::ADDING_CATEGORY, None).await?;
    let text = match ctx
        .aggregator
        .try_add_full_category(user_id, &config, kind, &category_id, &label)
        .await
    {
        Ok(added) => views::category_added_text(added, &label),
        Err(e) => {
            warn!(user_id, category_id = %category_id, "Full category add failed: {e}");
            views::SERVER_UNAVAILABLE.to_string()
        }
    };

    update_dialogue(&dialogue, State::Ready { config }).await?;
    edit_or_send(
        &bot,
        chat_id,
        status.id,
        &text,
        views::main_menu_keyboard(ctx.is_owner(user_id)),
    )
    .await
}

/// Handle the target group of an owner broadcast and post the item card.
///
/// An invalid id keeps the prompt open; any other outcome returns to the
/// menu.
///
/// # Errors
///
/// Returns an error if the dialogue cannot be updated or the owner's reply fails to send.
pub async fn handle_group_id(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
    (config, item_ref): (PlaylistConfig, ItemRef),
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(group_id) = parse_group_id(msg.text().unwrap_or_default()) else {
        send_message_resilient(&bot, chat_id, views::INVALID_GROUP_ID, None).await?;
        return Ok(());
    };

    let text = match lookup(&ctx, &config, &item_ref).await {
        Lookup::Found(item) => {
            let card = views::share_card(&config, item_ref.kind(), &item);
            match send_message_resilient(&bot, group_id, &card, None).await {
                Ok(_) => {
                    info!(
                        user_id,
                        group_id = group_id.0,
                        item = %item_ref,
                        "Item sent to group"
                    );
                    views::share_sent_text(group_id.0, &item.name)
                }
                Err(e) => {
                    warn!(user_id, group_id = group_id.0, "Group broadcast failed: {e}");
                    views::SHARE_FAILED.to_string()
                }
            }
        }
        Lookup::NotFound => views::ITEM_NOT_FOUND.to_string(),
        Lookup::Unavailable => views::SERVER_UNAVAILABLE.to_string(),
    };

    update_dialogue(&dialogue, State::Ready { config }).await?;
    send_message_resilient(
        &bot,
        chat_id,
        &text,
        Some(views::main_menu_keyboard(ctx.is_owner(user_id))),
    )
    .await?;
    Ok(())
}

async fn lookup(ctx: &AppContext, config: &PlaylistConfig, item_ref: &ItemRef) -> Lookup {
    match item_ref {
        ItemRef::Stream { kind, stream_id } => {
            ctx.aggregator.lookup_stream(config, *kind, stream_id).await
        }
        ItemRef::Episode {
            series_id,
            episode_id,
        } => {
            ctx.aggregator
                .lookup_episode(config, series_id, episode_id)
                .await
        }
    }
}

/// Tell a throttled user to slow down, at most once per cooldown.
///
/// # Errors
///
/// Returns an error if the notice fails to send.
pub async fn notify_rate_limited(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    notices: &RateLimitNoticeCache,
) -> Result<()> {
    if notices.should_send(user_id).await {
        send_message_resilient(bot, chat_id, views::RATE_LIMITED, None).await?;
        notices.mark_sent(user_id).await;
    }
    Ok(())
}

/// Everything a callback action needs to reply in place
struct CallbackScope<'a> {
    bot: &'a Bot,
    ctx: &'a AppContext,
    dialogue: &'a BotDialogue,
    chat_id: ChatId,
    msg_id: MessageId,
    user_id: i64,
}

/// Toast shown when the callback query is answered
type Toast = Option<String>;

impl CallbackScope<'_> {
    async fn show(&self, (text, keyboard): (String, InlineKeyboardMarkup)) -> Result<()> {
        edit_or_send(self.bot, self.chat_id, self.msg_id, &text, keyboard).await
    }
}

/// Handle an inline keyboard press.
///
/// # Errors
///
/// Returns an error if the dialogue cannot be read or the reply fails to send.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<()> {
    let user_id = callback_user_id(&q);
    let parsed = q.data.as_deref().map(str::parse::<CallbackAction>);
    let (Some(Ok(action)), Some(message)) = (parsed, q.message.as_ref()) else {
        warn!(user_id, data = ?q.data, "Ignoring unusable callback");
        answer(&bot, &q, None).await;
        return Ok(());
    };

    if action.is_admin() && !ctx.is_owner(user_id) {
        warn!(user_id, %action, "Non-owner pressed an admin button");
        answer(&bot, &q, Some(views::ADMIN_ONLY.to_string())).await;
        return Ok(());
    }

    info!(user_id, %action, "Callback");
    let state = current_state(&dialogue).await?;
    let scope = CallbackScope {
        bot: &bot,
        ctx: &ctx,
        dialogue: &dialogue,
        chat_id: message.chat().id,
        msg_id: message.id(),
        user_id,
    };

    let result = dispatch(&scope, action, state.config()).await;
    let toast = match result {
        Ok(toast) => toast,
        Err(e) => {
            answer(&bot, &q, None).await;
            return Err(e);
        }
    };
    answer(&bot, &q, toast).await;
    Ok(())
}

/// Answer a callback query so the client stops its spinner.
pub async fn answer(bot: &Bot, q: &CallbackQuery, toast: Toast) {
    let mut req = bot.answer_callback_query(q.id.clone());
    if let Some(text) = toast {
        req = req.text(text);
    }
    if let Err(e) = req.await {
        warn!("Failed to answer callback query: {e}");
    }
}

async fn dispatch(
    scope: &CallbackScope<'_>,
    action: CallbackAction,
    config: Option<&PlaylistConfig>,
) -> Result<Toast> {
    match action {
        CallbackAction::PageInfo => Ok(None),
        CallbackAction::Selections => show_selections(scope, None).await,
        CallbackAction::ClearSelections => {
            scope.ctx.selections.clear(scope.user_id, None);
            info!(user_id = scope.user_id, "Selections cleared");
            show_selections(scope, Some(views::SELECTIONS_CLEARED.to_string())).await
        }
        CallbackAction::ClearBucket(kind) => {
            scope.ctx.selections.clear(scope.user_id, Some(kind));
            info!(user_id = scope.user_id, kind = kind.as_str(), "Bucket cleared");
            show_selections(scope, Some(views::SELECTIONS_CLEARED.to_string())).await
        }
        CallbackAction::AdminStats => {
            scope.show(views::admin_view(&scope.ctx.stats().await)).await?;
            Ok(None)
        }
        CallbackAction::AdminClearCache => {
            let removed = scope.ctx.clear_cache().await;
            scope.show(views::admin_view(&scope.ctx.stats().await)).await?;
            Ok(Some(format!("🧹 Removed {removed} cached responses")))
        }
        other => match config {
            Some(config) => dispatch_browsing(scope, other, config).await,
            None => Ok(Some(views::NO_PLAYLIST.to_string())),
        },
    }
}

async fn dispatch_browsing(
    scope: &CallbackScope<'_>,
    action: CallbackAction,
    config: &PlaylistConfig,
) -> Result<Toast> {
    let ctx = scope.ctx;
    match action {
        CallbackAction::MainMenu => {
            scope
                .show((
                    views::main_menu_text(config),
                    views::main_menu_keyboard(ctx.is_owner(scope.user_id)),
                ))
                .await?;
            Ok(None)
        }
        CallbackAction::Categories { kind, page } => {
            show_categories(scope, config, kind, page).await
        }
        CallbackAction::CategoryItems {
            kind,
            category_id,
            page,
        } => show_category_items(scope, config, kind, Some(category_id.as_str()), page).await,
        CallbackAction::AllItems { kind, page } => {
            show_category_items(scope, config, kind, None, page).await
        }
        CallbackAction::Details(item_ref) => show_details(scope, config, &item_ref).await,
        CallbackAction::Share(item) => {
            update_dialogue(
                scope.dialogue,
                State::AwaitingGroupId {
                    config: config.clone(),
                    item,
                },
            )
            .await?;
            send_message_resilient(scope.bot, scope.chat_id, views::GROUP_ID_PROMPT, None).await?;
            Ok(None)
        }
        CallbackAction::SeriesEpisodes { series_id, page } => {
            show_episodes(scope, config, &series_id, page).await
        }
        CallbackAction::AddItem { kind, stream_id } => {
            let outcome = ctx
                .aggregator
                .add_stream(scope.user_id, config, kind, &stream_id)
                .await;
            Ok(Some(views::add_outcome_text(outcome).to_string()))
        }
        CallbackAction::AddEpisode {
            series_id,
            episode_id,
        } => {
            let outcome = ctx
                .aggregator
                .add_episode(scope.user_id, config, &series_id, &episode_id)
                .await;
            Ok(Some(views::add_outcome_text(outcome).to_string()))
        }
        CallbackAction::AddFullCategory { kind, category_id } => {
            ask_category_label(scope, config, kind, category_id).await
        }
        CallbackAction::GenerateM3u => deliver_playlist(scope, config).await,
        CallbackAction::AccountInfo => {
            let summary = ctx.client.account_summary(config).await;
            scope.show(views::account_view(&summary)).await?;
            Ok(None)
        }
        CallbackAction::PageInfo
        | CallbackAction::Selections
        | CallbackAction::ClearSelections
        | CallbackAction::ClearBucket(_)
        | CallbackAction::AdminStats
        | CallbackAction::AdminClearCache => Ok(None),
    }
}

async fn show_selections(scope: &CallbackScope<'_>, toast: Toast) -> Result<Toast> {
    let stats = scope.ctx.selections.stats(scope.user_id);
    scope.show(views::selections_view(&stats)).await?;
    Ok(toast)
}

async fn show_categories(
    scope: &CallbackScope<'_>,
    config: &PlaylistConfig,
    kind: ContentKind,
    page: usize,
) -> Result<Toast> {
    let Some(categories) = scope.ctx.client.categories(config, kind).await else {
        return Ok(Some(views::SERVER_UNAVAILABLE.to_string()));
    };
    let entries: Vec<CategoryEntry> = categories
        .iter()
        .filter_map(|c| {
            Some(CategoryEntry {
                id: c.category_id.clone()?,
                name: c.name_or(UNNAMED_CATEGORY).to_string(),
            })
        })
        .collect();
    scope
        .show(views::categories_view(kind, &paginate(&entries, page, PAGE_SIZE)))
        .await?;
    Ok(None)
}

async fn category_entries(
    ctx: &AppContext,
    config: &PlaylistConfig,
    kind: ContentKind,
    category_id: Option<&str>,
) -> Option<Vec<ItemEntry>> {
    let entries: Vec<ItemEntry> = match kind {
        ContentKind::Series => ctx
            .client
            .series_list(config, category_id)
            .await?
            .iter()
            .map(|s| ItemEntry {
                id: s.item_id(),
                name: s.title(),
            })
            .collect(),
        ContentKind::Channels | ContentKind::Movies => {
            let placeholder = if kind == ContentKind::Channels {
                UNNAMED_CHANNEL
            } else {
                UNNAMED_MOVIE
            };
            ctx.client
                .streams(config, kind, category_id)
                .await?
                .iter()
                .map(|s| ItemEntry {
                    id: s.item_id(),
                    name: s.name_or(placeholder),
                })
                .collect()
        }
    };
    Some(entries.into_iter().filter(|e| !e.id.is_empty()).collect())
}

async fn show_category_items(
    scope: &CallbackScope<'_>,
    config: &PlaylistConfig,
    kind: ContentKind,
    category_id: Option<&str>,
    page: usize,
) -> Result<Toast> {
    let Some(entries) = category_entries(scope.ctx, config, kind, category_id).await else {
        return Ok(Some(views::SERVER_UNAVAILABLE.to_string()));
    };
    let category_name = match category_id {
        Some(id) => scope
            .ctx
            .client
            .category_name(config, kind, id)
            .await
            .unwrap_or_else(|| kind.default_label().to_string()),
        None => format!("All {}", kind.as_str()),
    };
    scope
        .show(views::category_items_view(
            kind,
            category_id,
            &category_name,
            &paginate(&entries, page, PAGE_SIZE),
        ))
        .await?;
    Ok(None)
}

async fn show_details(
    scope: &CallbackScope<'_>,
    config: &PlaylistConfig,
    item_ref: &ItemRef,
) -> Result<Toast> {
    match lookup(scope.ctx, config, item_ref).await {
        Lookup::Found(item) => {
            let is_owner = scope.ctx.is_owner(scope.user_id);
            scope
                .show(views::details_view(config, item_ref, &item, is_owner))
                .await?;
            Ok(None)
        }
        Lookup::NotFound => Ok(Some(views::ITEM_NOT_FOUND.to_string())),
        Lookup::Unavailable => Ok(Some(views::SERVER_UNAVAILABLE.to_string())),
    }
}

async fn show_episodes(
    scope: &CallbackScope<'_>,
    config: &PlaylistConfig,
    series_id: &str,
    page: usize,
) -> Result<Toast> {
    let Some(info) = scope.ctx.client.series_info(config, series_id).await else {
        return Ok(Some(views::SERVER_UNAVAILABLE.to_string()));
    };
    let series_name = info
        .info
        .as_ref()
        .and_then(|d| d.name.clone())
        .unwrap_or_else(|| UNNAMED_SERIES.to_string());
    let entries: Vec<EpisodeEntry> = info
        .all_episodes()
        .into_iter()
        .map(|(season, episode)| EpisodeEntry {
            id: episode.item_id(),
            season,
            number: episode.number(),
            title: episode.title(),
        })
        .filter(|e| !e.id.is_empty())
        .collect();
    scope
        .show(views::episodes_view(
            series_id,
            &series_name,
            &paginate(&entries, page, PAGE_SIZE),
        ))
        .await?;
    Ok(None)
}

async fn ask_category_label(
    scope: &CallbackScope<'_>,
    config: &PlaylistConfig,
    kind: ContentKind,
    category_id: String,
) -> Result<Toast> {
    let suggestion = scope
        .ctx
        .client
        .category_name(config, kind, &category_id)
        .await;
    update_dialogue(
        scope.dialogue,
        State::AwaitingCategoryLabel {
            config: config.clone(),
            kind,
            category_id,
        },
    )
    .await?;
    send_message_resilient(
        scope.bot,
        scope.chat_id,
        &views::category_label_prompt(kind, suggestion.as_deref()),
        None,
    )
    .await?;
    Ok(None)
}

async fn deliver_playlist(scope: &CallbackScope<'_>, config: &PlaylistConfig) -> Result<Toast> {
    let exporter = &scope.ctx.exporter;
    let path = match exporter.try_export(scope.user_id, config).await {
        Ok(Some(path)) => path,
        Ok(None) => return Ok(Some(views::NOTHING_SELECTED.to_string())),
        Err(e) => {
            error!(user_id = scope.user_id, "Playlist export failed: {e}");
            return Ok(Some("❌ Could not generate the playlist".to_string()));
        }
    };

    let sent =
        send_document_resilient(scope.bot, scope.chat_id, &path, views::PLAYLIST_CAPTION).await;
    exporter.discard(&path).await;
    sent?;
    info!(user_id = scope.user_id, "Playlist delivered");
    Ok(None)
}

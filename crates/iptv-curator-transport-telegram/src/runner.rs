use crate::bot::callbacks::ItemRef;
use crate::bot::handlers::{self, callback_user_id, BotDialogue, Command, Sender};
use crate::bot::state::State;
use crate::bot::RateLimitNoticeCache;
use crate::config::{
    get_rate_limit_notice_cache_max_size, get_rate_limit_notice_cooldown, BotSettings,
};
use iptv_curator_core::config::PlaylistConfig;
use iptv_curator_core::selection::ContentKind;
use iptv_curator_core::AppContext;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let ctx = Arc::new(AppContext::new(settings.core.as_ref().clone()));
    info!(
        export_dir = %ctx.exporter.dir().display(),
        owner_configured = settings.core.owner().is_some(),
        "Curator context initialized."
    );

    let shutdown = CancellationToken::new();
    let cleanup = ctx.spawn_cleanup(shutdown.clone());

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let bot_state = init_bot_state();
    let notice_cache = init_notice_cache();
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx, bot_state, notice_cache])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(e) = cleanup.await {
        error!("Export cleanup task ended abnormally: {}", e);
    }
    info!("Bot stopped.");
}

fn init_bot_state() -> Arc<InMemStorage<State>> {
    InMemStorage::<State>::new()
}

fn init_notice_cache() -> Arc<RateLimitNoticeCache> {
    let cooldown = get_rate_limit_notice_cooldown();
    let max_size = get_rate_limit_notice_cache_max_size();

    info!(
        "Initializing RateLimitNoticeCache (cooldown: {}s, max_size: {})",
        cooldown, max_size
    );

    Arc::new(RateLimitNoticeCache::new(cooldown, max_size))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .branch(
                    dptree::filter(|q: CallbackQuery, ctx: Arc<AppContext>| {
                        !ctx.rate_limiter.allow(callback_user_id(&q))
                    })
                    .endpoint(handle_rate_limited_callback),
                )
                .branch(
                    dptree::entry()
                        .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                        .endpoint(handle_callback),
                ),
        )
        .branch(
            Update::filter_message()
                // Channel posts and other updates without a sender are ignored
                .filter_map(|msg: Message| Sender::of(&msg))
                .branch(
                    dptree::filter(|sender: Sender, ctx: Arc<AppContext>| {
                        !ctx.rate_limiter.allow(sender.0)
                    })
                    .endpoint(handle_rate_limited_message),
                )
                .branch(
                    dptree::entry()
                        .enter_dialogue::<Message, InMemStorage<State>, State>()
                        .branch(
                            dptree::entry()
                                .filter_command::<Command>()
                                .endpoint(handle_command),
                        )
                        .branch(
                            dptree::case![State::AwaitingCategoryLabel {
                                config,
                                kind,
                                category_id
                            }]
                            .endpoint(handle_category_label),
                        )
                        .branch(
                            dptree::case![State::AwaitingGroupId { config, item }]
                                .endpoint(handle_group_id),
                        )
                        .branch(
                            dptree::filter(|msg: Message| msg.text().is_some())
                                .endpoint(handle_text),
                        ),
                ),
        )
}

async fn handle_rate_limited_message(
    bot: Bot,
    msg: Message,
    Sender(user_id): Sender,
    notices: Arc<RateLimitNoticeCache>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::notify_rate_limited(&bot, msg.chat.id, user_id, &notices).await {
        error!("Failed to send rate limit notice to {}: {}", user_id, e);
    }
    respond(())
}

async fn handle_rate_limited_callback(
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    handlers::answer(&bot, &q, Some(crate::bot::views::RATE_LIMITED.to_string())).await;
    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    sender: Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg, sender, ctx, dialogue).await,
        Command::Stats => handlers::stats(bot, msg, sender, ctx).await,
        Command::Admin => handlers::admin(bot, msg, sender, ctx).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    sender: Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, sender, ctx, dialogue).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_category_label(
    bot: Bot,
    msg: Message,
    sender: Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
    pending: (PlaylistConfig, ContentKind, String),
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_category_label(bot, msg, sender, ctx, dialogue, pending).await
    {
        error!("Category label handler error: {}", e);
    }
    respond(())
}

async fn handle_group_id(
    bot: Bot,
    msg: Message,
    sender: Sender,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
    pending: (PlaylistConfig, ItemRef),
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_group_id(bot, msg, sender, ctx, dialogue, pending).await {
        error!("Group id handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = Box::pin(handlers::handle_callback(bot, q, ctx, dialogue)).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}

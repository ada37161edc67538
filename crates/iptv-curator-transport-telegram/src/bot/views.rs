//! View layer for bot UI components
//!
//! Message texts (HTML parse mode) and inline keyboards. Provider-supplied
//! strings are escaped before they reach a message.

use crate::bot::callbacks::{CallbackAction, ItemRef};
use html_escape::encode_text;
use iptv_curator_core::aggregator::AddOutcome;
use iptv_curator_core::config::PlaylistConfig;
use iptv_curator_core::playlist::stream_url;
use iptv_curator_core::selection::{ContentKind, SelectionItem, SelectionStats};
use iptv_curator_core::upstream::models::AccountSummary;
use iptv_curator_core::utils::{truncate_str, Page};
use iptv_curator_core::GlobalStats;
use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Longest label shown on an item button
const BUTTON_LABEL_MAX_CHARS: usize = 40;

/// Greeting asking for a playlist URL
pub const WELCOME: &str = "📺 <b>IPTV playlist curator</b>\n\n\
Send me your playlist URL to get started, for example:\n\
<code>http://host:8080/get.php?username=USER&amp;password=PASS</code>";
/// Shown when text is neither a URL nor expected input
pub const SEND_PLAYLIST_HINT: &str = "Send a playlist URL starting with http to begin.";
/// Shown while testing submitted credentials
pub const TESTING_CONNECTION: &str = "⏳ Testing connection...";
/// Shown when the URL cannot be parsed
pub const INVALID_PLAYLIST_URL: &str =
    "❌ Invalid playlist URL. It must contain both username and password.";
/// Shown when the provider rejects the credentials
pub const CONNECTION_FAILED: &str =
    "❌ Could not connect with these credentials. Check the URL and try again.";
/// Shown when a button needs a playlist first
pub const NO_PLAYLIST: &str = "Send your playlist URL first.";
/// Shown when the provider did not answer
pub const SERVER_UNAVAILABLE: &str = "⚠️ The server is unavailable right now. Try again later.";
/// Shown to throttled users
pub const RATE_LIMITED: &str = "⏳ Too many requests. Wait a minute and try again.";
/// Shown when a non-owner tries an admin action
pub const ADMIN_ONLY: &str = "⛔️ Only the owner can do this.";
/// Toast when the export has nothing to write
pub const NOTHING_SELECTED: &str = "Your selection is empty.";
/// Shown while a full category is being fetched
pub const ADDING_CATEGORY: &str = "⏳ Adding the whole category, this can take a while...";
/// Shown when the custom label is blank
pub const EMPTY_LABEL: &str = "The name cannot be empty. Send the group name to use.";
/// Toast after clearing selections
pub const SELECTIONS_CLEARED: &str = "🗑 Selection cleared";
/// Caption of the exported file
pub const PLAYLIST_CAPTION: &str = "✅ Your playlist is ready.";
/// Shown when the provider listing lacks the item
pub const ITEM_NOT_FOUND: &str = "❌ Item not found";
/// Owner prompt for the target group of a broadcast
pub const GROUP_ID_PROMPT: &str = "📤 Send the id of the group that should receive this item, \
for example <code>-1001234567890</code>.\n\nThe bot must be a member of that group.";
/// Shown when the group id is not a negative number
pub const INVALID_GROUP_ID: &str =
    "❌ Invalid group id. Group ids start with <code>-</code>, for example <code>-1001234567890</code>.";
/// Shown when the group rejected the card
pub const SHARE_FAILED: &str =
    "❌ Could not send to that group. Check that the bot is a member and may post there.";

fn button(text: impl Into<String>, action: &CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn back_to_menu() -> Vec<InlineKeyboardButton> {
    vec![button("🏠 Main menu", &CallbackAction::MainMenu)]
}

/// Emoji and plural title of a content kind.
#[must_use]
pub const fn kind_title(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Channels => "📡 Channels",
        ContentKind::Movies => "🎬 Movies",
        ContentKind::Series => "📺 Series",
    }
}

/// Main menu text for an accepted playlist.
#[must_use]
pub fn main_menu_text(config: &PlaylistConfig) -> String {
    format!(
        "✅ Connected to <code>{}</code> as <b>{}</b>\n\nChoose what to browse:",
        encode_text(config.display_host()),
        encode_text(&config.username)
    )
}

/// Main menu keyboard; the owner also sees the admin row.
#[must_use]
pub fn main_menu_keyboard(is_owner: bool) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = ContentKind::ALL
        .iter()
        .map(|&kind| vec![button(kind_title(kind), &CallbackAction::Categories { kind, page: 0 })])
        .collect();
    rows.push(vec![
        button("⭐ My selection", &CallbackAction::Selections),
        button("ℹ️ Account", &CallbackAction::AccountInfo),
    ]);
    if is_owner {
        rows.push(vec![button("🛠 Admin", &CallbackAction::AdminStats)]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Previous / page counter / next row, or nothing for a single page.
fn nav_row<T>(
    page: &Page<'_, T>,
    to_page: impl Fn(usize) -> CallbackAction,
) -> Option<Vec<InlineKeyboardButton>> {
    if page.total_pages <= 1 {
        return None;
    }
    let mut row = Vec::with_capacity(3);
    if page.has_prev() {
        row.push(button("◀️", &to_page(page.index - 1)));
    }
    row.push(button(
        format!("{}/{}", page.index + 1, page.total_pages),
        &CallbackAction::PageInfo,
    ));
    if page.has_next() {
        row.push(button("▶️", &to_page(page.index + 1)));
    }
    Some(row)
}

/// A category entry prepared for display
pub struct CategoryEntry {
    /// Provider category id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Category list of one kind.
#[must_use]
pub fn categories_view(
    kind: ContentKind,
    page: &Page<'_, CategoryEntry>,
) -> (String, InlineKeyboardMarkup) {
    let text = format!("{}\n\nPick a category:", kind_title(kind));
    let mut rows = vec![vec![button(
        format!("📋 All {}", kind.as_str()),
        &CallbackAction::AllItems { kind, page: 0 },
    )]];
    rows.extend(page.items.iter().map(|c| {
        vec![button(
            truncate_str(&c.name, BUTTON_LABEL_MAX_CHARS),
            &CallbackAction::CategoryItems {
                kind,
                category_id: c.id.clone(),
                page: 0,
            },
        )]
    }));
    if let Some(nav) = nav_row(page, |p| CallbackAction::Categories { kind, page: p }) {
        rows.push(nav);
    }
    rows.push(back_to_menu());
    (text, InlineKeyboardMarkup::new(rows))
}

/// An item (channel, movie or series) prepared for display
pub struct ItemEntry {
    /// Provider id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Items of one category, or of every category when `category_id` is
/// `None`. Series open their episode list; other kinds open their details.
#[must_use]
pub fn category_items_view(
    kind: ContentKind,
    category_id: Option<&str>,
    category_name: &str,
    page: &Page<'_, ItemEntry>,
) -> (String, InlineKeyboardMarkup) {
    let hint = match kind {
        ContentKind::Series => "Tap a series to see its episodes.",
        ContentKind::Channels | ContentKind::Movies => "Tap an item to see its details.",
    };
    let text = format!(
        "{} › <b>{}</b>\n\n{hint}",
        kind_title(kind),
        encode_text(category_name)
    );

    let mut rows = Vec::new();
    if let Some(category_id) = category_id {
        rows.push(vec![button(
            "➕ Add the whole category",
            &CallbackAction::AddFullCategory {
                kind,
                category_id: category_id.to_string(),
            },
        )]);
    }
    rows.extend(page.items.iter().map(|item| {
        let label = truncate_str(&item.name, BUTTON_LABEL_MAX_CHARS);
        let (prefix, action) = match kind {
            ContentKind::Series => (
                "📂",
                CallbackAction::SeriesEpisodes {
                    series_id: item.id.clone(),
                    page: 0,
                },
            ),
            ContentKind::Channels | ContentKind::Movies => (
                "▶️",
                CallbackAction::Details(ItemRef::Stream {
                    kind,
                    stream_id: item.id.clone(),
                }),
            ),
        };
        vec![button(format!("{prefix} {label}"), &action)]
    }));
    let to_page = |p| match category_id {
        Some(category_id) => CallbackAction::CategoryItems {
            kind,
            category_id: category_id.to_string(),
            page: p,
        },
        None => CallbackAction::AllItems { kind, page: p },
    };
    if let Some(nav) = nav_row(page, to_page) {
        rows.push(nav);
    }
    rows.push(vec![
        button("⬅️ Categories", &CallbackAction::Categories { kind, page: 0 }),
        button("🏠 Main menu", &CallbackAction::MainMenu),
    ]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// An episode prepared for display
pub struct EpisodeEntry {
    /// Provider episode id
    pub id: String,
    /// Season number
    pub season: String,
    /// Episode number
    pub number: String,
    /// Episode title
    pub title: String,
}

/// Episode list of one series.
#[must_use]
pub fn episodes_view(
    series_id: &str,
    series_name: &str,
    page: &Page<'_, EpisodeEntry>,
) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "📺 <b>{}</b>\n\nTap an episode to see its details.",
        encode_text(series_name)
    );
    let mut rows: Vec<Vec<InlineKeyboardButton>> = page
        .items
        .iter()
        .map(|e| {
            let label = truncate_str(
                format!("S{}E{} - {}", e.season, e.number, e.title),
                BUTTON_LABEL_MAX_CHARS,
            );
            vec![button(
                format!("▶️ {label}"),
                &CallbackAction::Details(ItemRef::Episode {
                    series_id: series_id.to_string(),
                    episode_id: e.id.clone(),
                }),
            )]
        })
        .collect();
    if let Some(nav) = nav_row(page, |p| CallbackAction::SeriesEpisodes {
        series_id: series_id.to_string(),
        page: p,
    }) {
        rows.push(nav);
    }
    rows.push(vec![
        button(
            "⬅️ Series",
            &CallbackAction::Categories {
                kind: ContentKind::Series,
                page: 0,
            },
        ),
        button("🏠 Main menu", &CallbackAction::MainMenu),
    ]);
    (text, InlineKeyboardMarkup::new(rows))
}

fn item_lines(config: &PlaylistConfig, kind: ContentKind, item: &SelectionItem) -> String {
    format!(
        "{} <b>{}</b>\n\nCategory: {}\n\n🔗 <code>{}</code>",
        kind_title(kind),
        encode_text(&item.name),
        encode_text(&item.category),
        encode_text(&stream_url(config, kind, item))
    )
}

/// One item with its stream URL. The owner also gets the broadcast button.
#[must_use]
pub fn details_view(
    config: &PlaylistConfig,
    item_ref: &ItemRef,
    item: &SelectionItem,
    is_owner: bool,
) -> (String, InlineKeyboardMarkup) {
    let kind = item_ref.kind();
    let text = format!(
        "{}\n\nID: <code>{}</code>\nServer: <code>{}</code>",
        item_lines(config, kind, item),
        encode_text(&item.id),
        encode_text(config.display_host())
    );

    let mut rows = vec![vec![button("➕ Add to selection", &item_ref.add_action())]];
    if is_owner {
        rows.push(vec![button(
            "📤 Send to a group",
            &CallbackAction::Share(item_ref.clone()),
        )]);
    }
    let back = match item_ref {
        ItemRef::Stream { kind, .. } => {
            button("⬅️ Categories", &CallbackAction::Categories { kind: *kind, page: 0 })
        }
        ItemRef::Episode { series_id, .. } => button(
            "⬅️ Episodes",
            &CallbackAction::SeriesEpisodes {
                series_id: series_id.clone(),
                page: 0,
            },
        ),
    };
    rows.push(vec![back, button("🏠 Main menu", &CallbackAction::MainMenu)]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Card posted to a group by the owner.
#[must_use]
pub fn share_card(config: &PlaylistConfig, kind: ContentKind, item: &SelectionItem) -> String {
    format!("{}\n\n📲 Open the link in your IPTV player.", item_lines(config, kind, item))
}

/// Confirmation sent to the owner after a broadcast.
#[must_use]
pub fn share_sent_text(group_id: i64, item_name: &str) -> String {
    format!(
        "✅ Sent <b>{}</b> to group <code>{group_id}</code>.",
        encode_text(item_name)
    )
}

/// Toast for a single-item add.
#[must_use]
pub const fn add_outcome_text(outcome: AddOutcome) -> &'static str {
    match outcome {
        AddOutcome::Added => "✅ Added to your selection",
        AddOutcome::AlreadyPresent => "Already in your selection",
        AddOutcome::NotFound => ITEM_NOT_FOUND,
        AddOutcome::Unavailable => "⚠️ Server unavailable",
    }
}

/// Prompt for the label of a full-category add.
#[must_use]
pub fn category_label_prompt(kind: ContentKind, suggestion: Option<&str>) -> String {
    let mut text = format!(
        "✏️ {} › Send the group name to use for every item of this category.",
        kind_title(kind)
    );
    if let Some(name) = suggestion {
        text.push_str(&format!(
            "\n\nProvider name: <code>{}</code>",
            encode_text(name)
        ));
    }
    text
}

/// Result of a full-category add.
#[must_use]
pub fn category_added_text(added: usize, label: &str) -> String {
    if added == 0 {
        format!(
            "No new items were added to <b>{}</b>.",
            encode_text(label)
        )
    } else {
        format!(
            "✅ Added <b>{added}</b> items to <b>{}</b>.",
            encode_text(label)
        )
    }
}

/// Selection summary with export and clear buttons.
#[must_use]
pub fn selections_view(stats: &SelectionStats) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "⭐ <b>Your selection</b>\n\n\
         📡 Channels: {}\n🎬 Movies: {}\n📺 Episodes: {}\n\n<b>Total: {}</b>",
        stats.channels, stats.movies, stats.series, stats.total
    );
    let mut rows = Vec::new();
    if stats.total > 0 {
        rows.push(vec![button("📥 Generate M3U", &CallbackAction::GenerateM3u)]);
        rows.push(
            ContentKind::ALL
                .iter()
                .map(|&kind| button(format!("🗑 {}", kind.as_str()), &CallbackAction::ClearBucket(kind)))
                .collect(),
        );
        rows.push(vec![button("🗑 Clear all", &CallbackAction::ClearSelections)]);
    }
    rows.push(back_to_menu());
    (text, InlineKeyboardMarkup::new(rows))
}

/// Plain selection summary for the `/stats` command.
#[must_use]
pub fn selection_stats_text(stats: &SelectionStats) -> String {
    selections_view(stats).0
}

/// Provider account summary.
#[must_use]
pub fn account_view(summary: &AccountSummary) -> (String, InlineKeyboardMarkup) {
    let badge = if summary.is_active() { "🟢" } else { "🟡" };
    let text = format!(
        "ℹ️ <b>Account</b>\n\n\
         Server: <code>{}</code>\nUser: <b>{}</b>\nStatus: {badge} {}\nExpires: {}\n\
         Connections: {}/{}\n\n\
         📡 Channels: {}\n🎬 Movies: {}\n📺 Series: {}",
        encode_text(&summary.server),
        encode_text(&summary.username),
        encode_text(&summary.status),
        encode_text(&summary.exp_date),
        encode_text(&summary.active_cons),
        encode_text(&summary.max_connections),
        encode_text(&summary.available_channels),
        encode_text(&summary.available_movies),
        encode_text(&summary.available_series),
    );
    (text, InlineKeyboardMarkup::new(vec![back_to_menu()]))
}

/// `1d 2h 3m` style duration.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {}s", secs % 60)
    }
}

/// Owner statistics with the cache flush button.
#[must_use]
pub fn admin_view(stats: &GlobalStats) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "🛠 <b>Admin</b>\n\n\
         Requests: {}\nCache hits: {} ({:.1}%)\nCached responses: {}\n\
         Active users: {}\nSelected items: {}\nUptime: {}",
        stats.total_requests,
        stats.cache_hits,
        stats.hit_rate(),
        stats.cache_size,
        stats.active_users,
        stats.selections,
        format_uptime(stats.uptime),
    );
    let rows = vec![
        vec![
            button("🔄 Refresh", &CallbackAction::AdminStats),
            button("🧹 Clear cache", &CallbackAction::AdminClearCache),
        ],
        back_to_menu(),
    ];
    (text, InlineKeyboardMarkup::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptv_curator_core::utils::{paginate, PAGE_SIZE};

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        use teloxide::types::InlineKeyboardButtonKind;
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_admin_row_only_for_owner() {
        assert!(callbacks(&main_menu_keyboard(true)).contains(&"admin:stats".to_string()));
        assert!(!callbacks(&main_menu_keyboard(false)).contains(&"admin:stats".to_string()));
    }

    #[test]
    fn test_category_items_navigation() {
        let items: Vec<ItemEntry> = (0..20)
            .map(|i| ItemEntry {
                id: i.to_string(),
                name: format!("Channel {i}"),
            })
            .collect();
        let page = paginate(&items, 1, PAGE_SIZE);
        let (_, markup) = category_items_view(ContentKind::Channels, Some("7"), "News", &page);
        let data = callbacks(&markup);

        assert_eq!(data[0], "addcat:channels:7");
        assert!(data.contains(&"info:channels:8".to_string()));
        assert!(data.contains(&"list:channels:7:0".to_string()));
        assert!(data.contains(&"list:channels:7:2".to_string()));
        assert!(data.contains(&"noop".to_string()));
    }

    #[test]
    fn test_series_items_open_episodes() {
        let items = vec![ItemEntry {
            id: "77".to_string(),
            name: "Dark".to_string(),
        }];
        let page = paginate(&items, 0, PAGE_SIZE);
        let (_, markup) = category_items_view(ContentKind::Series, Some("3"), "Drama", &page);
        assert!(callbacks(&markup).contains(&"eps:77:0".to_string()));
    }

    #[test]
    fn test_all_items_listing() {
        let categories = vec![CategoryEntry {
            id: "3".to_string(),
            name: "Drama".to_string(),
        }];
        let (_, markup) = categories_view(ContentKind::Movies, &paginate(&categories, 0, PAGE_SIZE));
        assert_eq!(callbacks(&markup)[0], "all:movies:0");

        let items: Vec<ItemEntry> = (0..20)
            .map(|i| ItemEntry {
                id: i.to_string(),
                name: format!("Movie {i}"),
            })
            .collect();
        let page = paginate(&items, 0, PAGE_SIZE);
        let (_, markup) = category_items_view(ContentKind::Movies, None, "Movies", &page);
        let data = callbacks(&markup);
        assert!(!data.iter().any(|d| d.starts_with("addcat:")));
        assert_eq!(data[0], "info:movies:0");
        assert!(data.contains(&"all:movies:1".to_string()));
    }

    fn heat() -> SelectionItem {
        SelectionItem {
            id: "9".to_string(),
            name: "Heat".to_string(),
            logo: String::new(),
            container: "mkv".to_string(),
            category: "Crime & Drama".to_string(),
            episode: None,
        }
    }

    #[test]
    fn test_details_show_stream_url() {
        let config = PlaylistConfig::new("http://x.tv:8080", "u1", "p1");
        let item_ref = ItemRef::Stream {
            kind: ContentKind::Movies,
            stream_id: "9".to_string(),
        };
        let (text, markup) = details_view(&config, &item_ref, &heat(), false);

        assert!(text.contains("http://x.tv:8080/movie/u1/p1/9.mkv"), "{text}");
        assert!(text.contains("Crime &amp; Drama"));
        let data = callbacks(&markup);
        assert_eq!(data[0], "add:movies:9");
        assert!(!data.iter().any(|d| d.starts_with("share:")));

        let (_, markup) = details_view(&config, &item_ref, &heat(), true);
        assert!(callbacks(&markup).contains(&"share:movies:9".to_string()));
    }

    #[test]
    fn test_episode_details_add_episode() {
        let config = PlaylistConfig::new("http://x.tv", "u1", "p1");
        let item_ref = ItemRef::Episode {
            series_id: "77".to_string(),
            episode_id: "e21".to_string(),
        };
        let episode = SelectionItem {
            id: "e21".to_string(),
            ..heat()
        };
        let (text, markup) = details_view(&config, &item_ref, &episode, false);
        assert!(text.contains("http://x.tv/series/u1/p1/e21.mkv"), "{text}");
        let data = callbacks(&markup);
        assert_eq!(data[0], "adde:77:e21");
        assert!(data.contains(&"eps:77:0".to_string()));
    }

    #[test]
    fn test_share_card_carries_stream_url() {
        let config = PlaylistConfig::new("http://x.tv", "u1", "p1");
        let card = share_card(&config, ContentKind::Channels, &SelectionItem {
            container: "ts".to_string(),
            ..heat()
        });
        assert!(card.contains("<b>Heat</b>"));
        assert!(card.contains("http://x.tv/live/u1/p1/9.ts"));
    }

    #[test]
    fn test_provider_strings_are_escaped() {
        let text = category_label_prompt(ContentKind::Movies, Some("<Action & Adventure>"));
        assert!(text.contains("&lt;Action &amp; Adventure&gt;"));
    }

    #[test]
    fn test_empty_selection_hides_export() {
        let (_, markup) = selections_view(&SelectionStats::default());
        assert_eq!(callbacks(&markup), vec!["menu".to_string()]);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(59)), "0m 59s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 120)), "3h 2m");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1h 1m");
    }
}

//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Sends are retried on transient network failures using exponential backoff
//! with jitter. Edits that cannot be applied fall back to a fresh message.

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use anyhow::Result;
use iptv_curator_core::utils::truncate_str;
use std::path::Path;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, Message, MessageId, ParseMode};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Telegram rejects texts above 4096 characters
const MAX_TEXT_CHARS: usize = 4000;

/// Retry a Telegram API operation with exponential backoff.
///
/// # Errors
///
/// Returns the last error once every attempt has failed.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

fn clamp_text(text: &str) -> String {
    if text.chars().count() > MAX_TEXT_CHARS {
        format!("{}...", truncate_str(text, MAX_TEXT_CHARS))
    } else {
        text.to_string()
    }
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = clamp_text(text);
    retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Replace the text and keyboard of a bot message.
///
/// Falls back to sending a new message when the original cannot be edited
/// (too old, deleted, or not a text message). An unchanged message is not
/// an error.
///
/// # Errors
///
/// Returns an error only if the fallback send fails as well.
pub async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    let text = clamp_text(text);
    let edited = retry_telegram_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("message is not modified") {
                    Ok(true)
                } else if err_msg.contains("message to edit not found")
                    || err_msg.contains("message can't be edited")
                    || err_msg.contains("there is no text in the message to edit")
                {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!("Telegram edit error: {e}"))
                }
            }
        }
    })
    .await;

    match edited {
        Ok(true) => Ok(()),
        Ok(false) => {
            debug!("Message cannot be edited, sending a new one");
            send_message_resilient(bot, chat_id, &text, Some(keyboard))
                .await
                .map(|_| ())
        }
        Err(e) => {
            debug!("Edit failed, sending a new message instead: {e}");
            send_message_resilient(bot, chat_id, &text, Some(keyboard))
                .await
                .map(|_| ())
        }
    }
}

/// Upload a file as a document with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_document_resilient(
    bot: &Bot,
    chat_id: ChatId,
    path: &Path,
    caption: &str,
) -> Result<Message> {
    retry_telegram_operation(|| async {
        bot.send_document(chat_id, InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram document upload error: {e}"))
    })
    .await
}

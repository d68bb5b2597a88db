use std::time::Duration;

use crate::utils::truncate_text;

/// Core error type for the sticker bot.
///
/// Adapter crates map their specific errors into this type so the command
/// router can turn every failure into one user-facing reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("media too large: {size} bytes (limit {limit})")]
    MediaTooLarge { size: u64, limit: u64 },

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("sticker too large: {size} bytes (limit {limit})")]
    StickerTooLarge { size: u64, limit: u64 },

    #[error("rate limit exceeded, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("{0} is not configured")]
    Unconfigured(String),

    #[error("external error: {0}")]
    External(String),

    #[error("command only works in groups")]
    GroupOnly,

    #[error("not authorized")]
    NotAuthorized,
}

impl Error {
    /// Text shown to the chat when a command fails with this error.
    pub fn user_message(&self) -> String {
        match self {
            Error::MediaTooLarge { limit, .. } => {
                format!("Media is too large (max {} MB).", limit / (1024 * 1024))
            }
            Error::TranscodeFailed(cause) => {
                format!("Could not convert the media: {}", truncate_text(cause, 200))
            }
            Error::StickerTooLarge { size, limit } => format!(
                "The sticker came out too big ({} KB, max {} KB). Try a shorter or smaller clip.",
                size / 1024,
                limit / 1024
            ),
            Error::RateLimited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                let unit = if secs == 1 { "second" } else { "seconds" };
                format!("Too many commands. Please wait {secs} {unit}.")
            }
            Error::Unconfigured(what) => format!("{what} is not configured on this bot."),
            Error::External(cause) => format!("Service error: {}", truncate_text(cause, 200)),
            Error::GroupOnly => "This command only works in groups.".to_string(),
            Error::NotAuthorized => "Only the bot owner can use this command.".to_string(),
            Error::InvalidIdentity(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                "Internal error while processing the command.".to_string()
            }
        }
    }

    /// Expected refusals are not failures of the bot itself.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Error::GroupOnly | Error::NotAuthorized | Error::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

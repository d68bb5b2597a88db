use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{MediaRef, MessagingCapabilities, OutgoingPayload, Participant},
    Result,
};

/// Incrementally downloaded attachment bytes.
pub type MediaStream = BoxStream<'static, Result<Bytes>>;

/// Cross-transport port.
///
/// Telegram is the shipped implementation; the shape only asks for what the
/// command core needs so other transports can sit behind the same interface.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// The bot's own session id, exactly as the transport reports it.
    fn self_id(&self) -> UserId;

    async fn send(
        &self,
        chat_id: &ChatId,
        payload: OutgoingPayload,
        reply_to: Option<&MessageRef>,
    ) -> Result<MessageRef>;

    async fn fetch_group_roster(&self, chat_id: &ChatId) -> Result<Vec<Participant>>;

    async fn fetch_media(&self, media: &MediaRef) -> Result<MediaStream>;
}

use async_trait::async_trait;

use super::{CommandContext, CommandHandler};
use crate::{
    domain::{CanonicalId, UserId},
    errors::Error,
    messaging::types::OutgoingPayload,
    security::is_owner,
    Result,
};

const DEFAULT_HEADER: &str = "📢 Attention, everyone!";

/// Display handle for a mention: the canonical user part when it parses.
fn mention_label(id: &UserId) -> String {
    CanonicalId::parse(&id.0)
        .map(|c| c.user().to_string())
        .unwrap_or_else(|_| id.0.clone())
}

fn render_broadcast(header: &str, members: &[UserId]) -> String {
    let mut out = String::from(header);
    out.push('\n');
    for m in members {
        out.push('\n');
        out.push('@');
        out.push_str(&mention_label(m));
    }
    out
}

/// `!todos [message]`: mention every group member. Owner only.
pub struct MentionAllHandler;

#[async_trait]
impl CommandHandler for MentionAllHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        if !ctx.msg.is_group() {
            return Err(Error::GroupOnly);
        }
        if !is_owner(ctx.sender(), ctx.services.settings.owner.as_ref()) {
            return Err(Error::NotAuthorized);
        }

        let roster = ctx.services.groups.roster(ctx.chat_id()).await?;
        let members: Vec<UserId> = roster.participants.into_iter().map(|p| p.id).collect();

        let header = if ctx.args.is_empty() {
            DEFAULT_HEADER
        } else {
            ctx.args
        };
        tracing::info!(chat = %ctx.chat_id(), members = members.len(), "mentioning all members");

        ctx.reply(OutgoingPayload::Text {
            text: render_broadcast(header, &members),
            mentions: members,
        })
        .await?;
        Ok(())
    }
}

use async_trait::async_trait;

use super::{CommandContext, CommandHandler};
use crate::Result;

/// `!menu`: the command list, rendered once when the table is built.
pub struct MenuHandler {
    text: String,
}

impl MenuHandler {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

#[async_trait]
impl CommandHandler for MenuHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        ctx.reply_text(self.text.clone()).await?;
        Ok(())
    }
}

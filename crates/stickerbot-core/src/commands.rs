//! Command parsing, the command table, and the dispatch boundary.
//!
//! Every inbound message passes through [`CommandRouter::dispatch`]. Messages
//! that are not a known `!command` are ignored silently. Known commands are
//! rate limited per sender, then handed to their handler; whatever the
//! handler returns, the chat gets exactly one reply.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use tokio::sync::Mutex;

use crate::{
    config::Config,
    errors::Error,
    handlers::{
        broadcast::MentionAllHandler,
        menu::MenuHandler,
        sticker::{GifStickerHandler, StickerHandler},
        tts::SpeakHandler,
        vision::{OcrHandler, TranslateImageHandler},
        BotServices, CommandContext, CommandHandler,
    },
    messaging::types::{InboundMessage, OutgoingPayload},
    security::RateLimiter,
    utils::{AuditEvent, AuditLogger},
    Result,
};

pub const COMMAND_PREFIX: char = '!';
const ERROR_PREFIX: &str = "❌ ";
const RATE_LIMIT_PREFIX: &str = "⏳ ";
const PRUNE_EVERY: u64 = 256;

// ============== Parsing ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    /// Lowercased command token without the prefix.
    pub name: String,
    /// Remaining text, trimmed.
    pub args: &'a str,
}

/// `!Word rest of text` -> (`word`, `rest of text`).
pub fn parse_command(body: &str) -> Option<ParsedCommand<'_>> {
    let rest = body.trim_start().strip_prefix(COMMAND_PREFIX)?;
    let (token, args) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(ParsedCommand {
        name: token.to_lowercase(),
        args,
    })
}

// ============== Table ==============

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub summary: &'static str,
}

pub struct Command {
    pub info: CommandInfo,
    pub handler: Arc<dyn CommandHandler>,
}

const MENU: CommandInfo = CommandInfo {
    name: "menu",
    aliases: &["help", "ajuda"],
    usage: "!menu",
    summary: "show this list",
};

const STICKER: CommandInfo = CommandInfo {
    name: "sticker",
    aliases: &["fig", "s"],
    usage: "!sticker [cover|contain]",
    summary: "turn an image or video into a sticker",
};

const GIF_STICKER: CommandInfo = CommandInfo {
    name: "gifsticker",
    aliases: &["gif"],
    usage: "!gifsticker [cover|contain]",
    summary: "turn a video or GIF into an animated sticker",
};

const OCR: CommandInfo = CommandInfo {
    name: "ocr",
    aliases: &[],
    usage: "!ocr",
    summary: "read the text in an image",
};

const IMGTR: CommandInfo = CommandInfo {
    name: "imgtr",
    aliases: &[],
    usage: "!imgtr [lang]",
    summary: "read and translate the text in an image",
};

const TODOS: CommandInfo = CommandInfo {
    name: "todos",
    aliases: &["everyone"],
    usage: "!todos [message]",
    summary: "mention every group member (owner only)",
};

const TTS: CommandInfo = CommandInfo {
    name: "tts",
    aliases: &[],
    usage: "!tts [lang] <text>",
    summary: "speak text as audio",
};

/// Menu text listing every command with its aliases.
pub fn render_menu(infos: &[CommandInfo]) -> String {
    let mut out = String::from("🤖 Commands\n");
    for info in infos {
        out.push('\n');
        out.push_str(info.usage);
        out.push_str(": ");
        out.push_str(info.summary);
        if !info.aliases.is_empty() {
            let aliases: Vec<String> = info
                .aliases
                .iter()
                .map(|a| format!("{COMMAND_PREFIX}{a}"))
                .collect();
            out.push_str(&format!(" (also {})", aliases.join(", ")));
        }
    }
    out.push_str("\n\nReply to a message with a command to use its media.");
    out
}

/// Name and alias lookup, built once at startup.
pub struct CommandTable {
    commands: Vec<Command>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    pub fn new(commands: Vec<Command>) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, cmd) in commands.iter().enumerate() {
            let names = std::iter::once(cmd.info.name).chain(cmd.info.aliases.iter().copied());
            for name in names {
                if index.insert(name.to_lowercase(), i).is_some() {
                    return Err(Error::Config(format!("duplicate command name: {name}")));
                }
            }
        }
        Ok(Self { commands, index })
    }

    /// The full command set.
    pub fn standard() -> Result<Self> {
        let others: Vec<(CommandInfo, Arc<dyn CommandHandler>)> = vec![
            (STICKER, Arc::new(StickerHandler) as Arc<dyn CommandHandler>),
            (GIF_STICKER, Arc::new(GifStickerHandler) as Arc<dyn CommandHandler>),
            (OCR, Arc::new(OcrHandler) as Arc<dyn CommandHandler>),
            (IMGTR, Arc::new(TranslateImageHandler) as Arc<dyn CommandHandler>),
            (TODOS, Arc::new(MentionAllHandler) as Arc<dyn CommandHandler>),
            (TTS, Arc::new(SpeakHandler) as Arc<dyn CommandHandler>),
        ];

        let mut infos = vec![MENU];
        infos.extend(others.iter().map(|(info, _)| *info));
        let menu: Arc<dyn CommandHandler> = Arc::new(MenuHandler::new(render_menu(&infos)));

        let commands = std::iter::once((MENU, menu))
            .chain(others)
            .map(|(info, handler)| Command { info, handler })
            .collect();
        Self::new(commands)
    }

    pub fn resolve(&self, name: &str) -> Option<&Command> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.commands[i])
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

// ============== Router ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command, or an unknown one.
    Ignored,
    RateLimited,
    Handled,
    /// The handler failed and the user got an error reply.
    Failed,
}

pub struct CommandRouter {
    table: CommandTable,
    services: Arc<BotServices>,
    limiter: Mutex<RateLimiter>,
    audit: Option<AuditLogger>,
    dispatched: AtomicU64,
}

impl CommandRouter {
    pub fn new(table: CommandTable, services: Arc<BotServices>, limiter: RateLimiter) -> Self {
        Self {
            table,
            services,
            limiter: Mutex::new(limiter),
            audit: None,
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn from_config(cfg: &Config, services: Arc<BotServices>) -> Result<Self> {
        let limiter = RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        );
        let mut router = Self::new(CommandTable::standard()?, services, limiter);
        if let Some(path) = &cfg.audit_log_path {
            router = router.with_audit(AuditLogger::new(path.clone(), cfg.audit_log_json));
        }
        Ok(router)
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(a) = &self.audit {
            a.record(event);
        }
    }

    async fn check_rate(&self, msg: &InboundMessage) -> Result<()> {
        let mut limiter = self.limiter.lock().await;
        if self.dispatched.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            limiter.prune_at(Instant::now());
        }
        limiter.check(&msg.sender)
    }

    /// Best-effort reply; a failed send is logged and otherwise dropped.
    async fn reply_text(&self, msg: &InboundMessage, text: String) {
        let res = self
            .services
            .messenger
            .send(msg.chat_id(), OutgoingPayload::text(text), Some(&msg.id))
            .await;
        if let Err(e) = res {
            tracing::warn!(chat = %msg.chat_id(), error = %e, "failed to send reply");
        }
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> DispatchOutcome {
        let Some(parsed) = parse_command(&msg.body) else {
            return DispatchOutcome::Ignored;
        };
        let Some(cmd) = self.table.resolve(&parsed.name) else {
            tracing::debug!(token = %parsed.name, "unknown command ignored");
            return DispatchOutcome::Ignored;
        };
        let name = cmd.info.name;
        let user = msg.sender.to_string();
        let chat = msg.chat_id().to_string();

        if let Err(e) = self.check_rate(msg).await {
            tracing::info!(command = name, user = %user, "rate limited");
            if let Error::RateLimited { retry_after } = &e {
                self.audit(AuditEvent::rate_limit(
                    &user,
                    &chat,
                    name,
                    retry_after.as_secs_f64(),
                ));
            }
            self.reply_text(msg, format!("{RATE_LIMIT_PREFIX}{}", e.user_message()))
                .await;
            return DispatchOutcome::RateLimited;
        }

        self.audit(AuditEvent::command(&user, &chat, name, parsed.args));
        tracing::info!(command = name, user = %user, chat = %chat, "command");

        let ctx = CommandContext {
            services: &self.services,
            msg,
            command: name,
            args: parsed.args,
        };
        let started = Instant::now();
        match cmd.handler.handle(&ctx).await {
            Ok(()) => {
                tracing::debug!(
                    command = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "command done"
                );
                DispatchOutcome::Handled
            }
            Err(e) => {
                if e.is_refusal() {
                    tracing::info!(command = name, user = %user, reason = %e, "command refused");
                } else {
                    tracing::error!(command = name, user = %user, chat = %chat, error = %e, "command failed");
                }
                self.audit(AuditEvent::error(&user, &chat, name, &e.to_string()));
                self.reply_text(msg, format!("{ERROR_PREFIX}{}", e.user_message()))
                    .await;
                DispatchOutcome::Failed
            }
        }
    }
}

//! In-memory fakes shared by the unit tests.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    groups::GroupDirectory,
    handlers::{BotServices, HandlerSettings},
    media::TempFiles,
    messaging::{
        port::{MediaStream, MessagingPort},
        types::{
            AnimatedStickerFormat, Attachment, ChatKind, InboundMessage, MediaKind, MediaRef,
            MessagingCapabilities, OutgoingPayload, Participant,
        },
    },
    ports::{SpeechSynthesizer, VisionClient},
    sticker::StickerTranscoder,
    Result,
};

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub payload: OutgoingPayload,
    pub reply_to: Option<MessageRef>,
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<u64>,
    self_id: Mutex<String>,
    sends: Mutex<Vec<SentMessage>>,
    roster: Mutex<Vec<Participant>>,
    roster_fails: Mutex<bool>,
    roster_fetches: AtomicUsize,
    media: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    media_fetches: AtomicUsize,
    animated_stickers: Mutex<Option<AnimatedStickerFormat>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            self_id: Mutex::new("bot".to_string()),
            animated_stickers: Mutex::new(Some(AnimatedStickerFormat::WebP)),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m.payload {
                OutgoingPayload::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn roster_fetches(&self) -> usize {
        self.roster_fetches.load(Ordering::SeqCst)
    }

    pub fn media_fetches(&self) -> usize {
        self.media_fetches.load(Ordering::SeqCst)
    }

    pub fn put_media(&self, id: &str, bytes: Vec<u8>) {
        self.put_media_chunks(id, vec![bytes]);
    }

    pub fn put_media_chunks(&self, id: &str, chunks: Vec<Vec<u8>>) {
        self.media.lock().unwrap().insert(id.to_string(), chunks);
    }

    pub fn set_roster(&self, participants: Vec<Participant>) {
        *self.roster.lock().unwrap() = participants;
    }

    pub fn set_self_id(&self, id: &str) {
        *self.self_id.lock().unwrap() = id.to_string();
    }

    pub fn fail_roster(&self, fail: bool) {
        *self.roster_fails.lock().unwrap() = fail;
    }

    pub fn set_animated_stickers(&self, format: Option<AnimatedStickerFormat>) {
        *self.animated_stickers.lock().unwrap() = format;
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            animated_stickers: *self.animated_stickers.lock().unwrap(),
            max_message_len: 4096,
        }
    }

    fn self_id(&self) -> UserId {
        UserId(self.self_id.lock().unwrap().clone())
    }

    async fn send(
        &self,
        chat_id: &ChatId,
        payload: OutgoingPayload,
        reply_to: Option<&MessageRef>,
    ) -> Result<MessageRef> {
        let id = {
            let mut guard = self.next_id.lock().unwrap();
            let id = *guard;
            *guard += 1;
            id
        };
        self.sends.lock().unwrap().push(SentMessage {
            chat_id: chat_id.clone(),
            payload,
            reply_to: reply_to.cloned(),
        });
        Ok(MessageRef {
            chat_id: chat_id.clone(),
            message_id: MessageId(format!("out-{id}")),
        })
    }

    async fn fetch_group_roster(&self, _group: &ChatId) -> Result<Vec<Participant>> {
        self.roster_fetches.fetch_add(1, Ordering::SeqCst);
        if *self.roster_fails.lock().unwrap() {
            return Err(Error::External("roster unavailable".to_string()));
        }
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<MediaStream> {
        self.media_fetches.fetch_add(1, Ordering::SeqCst);
        let chunks = self
            .media
            .lock()
            .unwrap()
            .get(&media.0)
            .cloned()
            .ok_or_else(|| Error::External(format!("unknown media {}", media.0)))?;
        let items: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

/// Private-chat message `m1` from user `u1` in chat `c1`.
pub fn inbound(body: &str) -> InboundMessage {
    InboundMessage {
        id: MessageRef {
            chat_id: ChatId("c1".to_string()),
            message_id: MessageId("m1".to_string()),
        },
        chat_kind: ChatKind::Private,
        sender: UserId("u1".to_string()),
        body: body.to_string(),
        attachments: Vec::new(),
        quoted: Vec::new(),
    }
}

pub fn group_inbound(body: &str, sender: &str) -> InboundMessage {
    let mut msg = inbound(body);
    msg.chat_kind = ChatKind::Group;
    msg.id.chat_id = ChatId("g1".to_string());
    msg.sender = UserId(sender.to_string());
    msg
}

pub fn attachment(kind: MediaKind, id: &str) -> Attachment {
    Attachment {
        kind,
        media: MediaRef(id.to_string()),
        mime_type: None,
        declared_size: None,
    }
}

/// Small valid PNG for handler tests.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Vision client returning a canned answer and recording instructions.
#[derive(Default)]
pub struct FakeVision {
    pub answer: String,
    pub fail: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeVision {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VisionClient for FakeVision {
    async fn extract_text(&self, _image: &[u8], mime_type: &str, instruction: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((mime_type.to_string(), instruction.to_string()));
        if self.fail {
            return Err(Error::External("vision backend down".to_string()));
        }
        Ok(self.answer.clone())
    }
}

/// Speech synthesizer writing a fixed payload to the requested path.
///
/// Knows `en`, `es` and `pt` (with `pt-BR` folded into `pt`).
#[derive(Default)]
pub struct FakeSpeech {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    fn resolve_lang(&self, lang: &str) -> Option<String> {
        match lang.to_ascii_lowercase().as_str() {
            "en" | "es" | "pt" => Some(lang.to_ascii_lowercase()),
            "pt-br" => Some("pt".to_string()),
            _ => None,
        }
    }

    async fn synthesize(&self, text: &str, lang: &str, out: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), lang.to_string()));
        tokio::fs::write(out, b"ID3fake-mp3").await?;
        Ok(())
    }
}

/// Services wired to fakes, with a private scratch directory per test.
pub fn services(messenger: Arc<FakeMessenger>) -> BotServices {
    services_with_ffmpeg(messenger, "ffmpeg")
}

pub fn services_with_ffmpeg(messenger: Arc<FakeMessenger>, ffmpeg: &str) -> BotServices {
    let temp = TempFiles::new(std::env::temp_dir().join(format!(
        "stickerbot-test-{}-{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    )))
    .unwrap();
    BotServices {
        groups: GroupDirectory::new(messenger.clone()),
        transcoder: StickerTranscoder::new(ffmpeg, Duration::from_secs(60), temp.clone()),
        temp,
        messenger,
        vision: None,
        speech: None,
        settings: HandlerSettings {
            owner: None,
            default_translate_lang: "pt".to_string(),
            default_tts_lang: "pt".to_string(),
            collaborator_timeout: Duration::from_secs(5),
        },
    }
}

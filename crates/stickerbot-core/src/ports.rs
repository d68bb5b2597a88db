use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Hexagonal port for the AI text-extraction / translation backend.
///
/// The image travels as raw bytes; adapters pick their own wire encoding
/// (the OpenAI adapter sends a base64 data URL).
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn extract_text(&self, image: &[u8], mime_type: &str, instruction: &str)
        -> Result<String>;
}

/// Hexagonal port for speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Canonical spelling of `lang` if this synthesizer can speak it.
    fn resolve_lang(&self, lang: &str) -> Option<String>;

    /// Synthesize `text` spoken in `lang` into an audio file at `out`.
    async fn synthesize(&self, text: &str, lang: &str, out: &Path) -> Result<()>;

    /// Mime type of the files written by [`SpeechSynthesizer::synthesize`].
    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }
}

//! Speech synthesis adapter driving the `gtts-cli` command line tool.
//!
//! Invocation: `gtts-cli --lang <lang> --output <file> -`, with the text fed on
//! stdin so user text can never be read as a flag.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use stickerbot_core::{errors::Error, ports::SpeechSynthesizer, utils::truncate_text, Result};

const STDERR_PREVIEW_CHARS: usize = 300;

/// Languages `gtts-cli --all` lists.
pub const GTTS_LANGUAGES: &[&str] = &[
    "af", "am", "ar", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "es", "et",
    "eu", "fi", "fr", "fr-CA", "gl", "gu", "ha", "hi", "hr", "hu", "id", "is", "it", "iw", "ja",
    "jw", "km", "kn", "ko", "la", "lt", "lv", "ml", "mr", "ms", "my", "ne", "nl", "no", "pa",
    "pl", "pt", "pt-PT", "ro", "ru", "si", "sk", "sq", "sr", "su", "sv", "sw", "ta", "te", "th",
    "tl", "tr", "uk", "ur", "vi", "yue", "zh", "zh-CN", "zh-TW",
];

/// Regional spellings gTTS folds into a listed language.
const GTTS_ALIASES: &[(&str, &str)] = &[
    ("en-us", "en"),
    ("en-gb", "en"),
    ("en-au", "en"),
    ("en-ca", "en"),
    ("en-in", "en"),
    ("es-es", "es"),
    ("es-us", "es"),
    ("es-mx", "es"),
    ("fr-fr", "fr"),
    ("pt-br", "pt"),
];

/// Canonical gTTS code for `lang`, compared case-insensitively.
pub fn gtts_language(lang: &str) -> Option<&'static str> {
    GTTS_LANGUAGES
        .iter()
        .copied()
        .find(|l| l.eq_ignore_ascii_case(lang))
        .or_else(|| {
            GTTS_ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(lang))
                .map(|(_, code)| *code)
        })
}

#[derive(Clone, Debug)]
pub struct GttsCli {
    program: PathBuf,
    timeout: Duration,
}

impl GttsCli {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, text: &str, lang: &str, out: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(gtts_args(lang, out))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::External(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A CLI that exits early closes the pipe; its exit status tells why.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "tts cli failed");
            return Err(Error::External(format!(
                "speech synthesis failed ({}): {}",
                output.status,
                truncate_text(stderr.trim(), STDERR_PREVIEW_CHARS)
            )));
        }
        Ok(())
    }
}

pub fn gtts_args(lang: &str, out: &Path) -> Vec<OsString> {
    vec![
        OsString::from("--lang"),
        OsString::from(lang),
        OsString::from("--output"),
        out.as_os_str().to_owned(),
        OsString::from("-"),
    ]
}

#[async_trait]
impl SpeechSynthesizer for GttsCli {
    fn resolve_lang(&self, lang: &str) -> Option<String> {
        gtts_language(lang).map(str::to_string)
    }

    async fn synthesize(&self, text: &str, lang: &str, out: &Path) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.run(text, lang, out)).await {
            Ok(r) => r,
            // Dropping the run future kills the child.
            Err(_) => Err(Error::External(format!(
                "speech synthesis timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

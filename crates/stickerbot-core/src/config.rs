use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::CanonicalId, errors::Error, Result};

/// Typed configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,
    pub owner_id: Option<CanonicalId>,

    // Vision (OCR / image translation)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub vision_model: String,

    // External tools
    pub ffmpeg_path: PathBuf,
    pub tts_cli_path: PathBuf,
    pub transcode_timeout: Duration,
    pub collaborator_timeout: Duration,
    pub temp_dir: PathBuf,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Command defaults
    pub default_translate_lang: String,
    pub default_tts_lang: String,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,

    // Keep-alive HTTP endpoint; disabled when unset.
    pub port: Option<u16>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        fs::create_dir_all(&cfg.temp_dir)?;
        Ok(cfg)
    }

    /// Build from any key/value source. Does not touch the filesystem.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);
        let env_u64 = |key: &str| env_str(key).and_then(|s| s.trim().parse::<u64>().ok());
        let env_bool = |key: &str| env_str(key).map(|s| parse_bool(&s));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let owner_id = match env_str("BOT_OWNER_ID") {
            Some(raw) => Some(CanonicalId::parse(&raw).map_err(|_| {
                Error::Config(format!("BOT_OWNER_ID is not a valid identity: {raw:?}"))
            })?),
            None => None,
        };

        let openai_api_key = env_str("OPENAI_API_KEY");
        let openai_base_url = env_str("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let vision_model = env_str("VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let ffmpeg_path = env_str("FFMPEG_PATH")
            .map(PathBuf::from)
            .or_else(|| which_in_path("ffmpeg"))
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let tts_cli_path = env_str("TTS_CLI_PATH")
            .map(PathBuf::from)
            .or_else(|| which_in_path("gtts-cli"))
            .unwrap_or_else(|| PathBuf::from("gtts-cli"));

        let transcode_timeout =
            Duration::from_secs(env_u64("TRANSCODE_TIMEOUT_SECS").unwrap_or(60).max(1));
        let collaborator_timeout =
            Duration::from_secs(env_u64("COLLABORATOR_TIMEOUT_SECS").unwrap_or(30).max(1));
        let temp_dir = PathBuf::from(
            env_str("TEMP_DIR").unwrap_or_else(|| "/tmp/stickerbot".to_string()),
        );

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u64("RATE_LIMIT_REQUESTS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(5)
            .max(1);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60).max(1));

        let default_translate_lang =
            env_str("DEFAULT_TRANSLATE_LANG").unwrap_or_else(|| "pt".to_string());
        let default_tts_lang = env_str("DEFAULT_TTS_LANG").unwrap_or_else(|| "pt".to_string());

        let audit_log_path = env_str("AUDIT_LOG_PATH").map(PathBuf::from);
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        let port = match env_str("PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| {
                Error::Config(format!("PORT must be a port number, got {raw:?}"))
            })?),
            None => None,
        };

        Ok(Self {
            telegram_bot_token,
            owner_id,
            openai_api_key,
            openai_base_url,
            vision_model,
            ffmpeg_path,
            tts_cli_path,
            transcode_timeout,
            collaborator_timeout,
            temp_dir,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            default_translate_lang,
            default_tts_lang,
            audit_log_path,
            audit_log_json,
            port,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(load(&[]), Err(Error::Config(_))));
        assert!(matches!(
            load(&[("TELEGRAM_BOT_TOKEN", "   ")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn defaults() {
        let cfg = load(&[("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        assert!(cfg.owner_id.is_none());
        assert!(cfg.openai_api_key.is_none());
        assert_eq!(cfg.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.vision_model, "gpt-4o-mini");
        assert_eq!(cfg.transcode_timeout, Duration::from_secs(60));
        assert_eq!(cfg.collaborator_timeout, Duration::from_secs(30));
        assert_eq!(cfg.temp_dir, PathBuf::from("/tmp/stickerbot"));
        assert!(cfg.rate_limit_enabled);
        assert_eq!(cfg.rate_limit_requests, 5);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(60));
        assert_eq!(cfg.default_translate_lang, "pt");
        assert_eq!(cfg.default_tts_lang, "pt");
        assert!(cfg.audit_log_path.is_none());
        assert!(cfg.port.is_none());
    }

    #[test]
    fn overrides() {
        let cfg = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("BOT_OWNER_ID", "@SomeOwner"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ("RATE_LIMIT_ENABLED", "off"),
            ("RATE_LIMIT_REQUESTS", "3"),
            ("RATE_LIMIT_WINDOW", "10"),
            ("TRANSCODE_TIMEOUT_SECS", "0"),
            ("AUDIT_LOG_PATH", "/tmp/audit.log"),
            ("AUDIT_LOG_JSON", "yes"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.owner_id.unwrap().user(), "someowner");
        assert_eq!(cfg.openai_base_url, "http://localhost:8080/v1");
        assert!(!cfg.rate_limit_enabled);
        assert_eq!(cfg.rate_limit_requests, 3);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(10));
        assert_eq!(cfg.transcode_timeout, Duration::from_secs(1));
        assert_eq!(cfg.audit_log_path, Some(PathBuf::from("/tmp/audit.log")));
        assert!(cfg.audit_log_json);
        assert_eq!(cfg.port, Some(8080));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(load(&[("TELEGRAM_BOT_TOKEN", "t"), ("PORT", "http")]).is_err());
        assert!(load(&[("TELEGRAM_BOT_TOKEN", "t"), ("BOT_OWNER_ID", "two words")]).is_err());
    }
}

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::quran::{Page, Reciter, Surah};

pub const ALQURAN_API_BASE: &str = "https://api.alquran.cloud/v1";

/// Text edition used for page content.
pub const DEFAULT_PAGE_EDITION: &str = "quran-uthmani";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Every resource on this API is wrapped in the same envelope.
#[derive(Debug, Clone, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    status: String,
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct AudioSurah {
    #[serde(default)]
    ayahs: Vec<AudioVerse>,
}

#[derive(Debug, Clone, Deserialize)]
struct AudioVerse {
    #[serde(default)]
    audio: String,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("alquran client user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        let base = config
            .base_url
            .unwrap_or_else(|| ALQURAN_API_BASE.to_string());
        Url::parse(&base).with_context(|| format!("alquran: invalid base url {}", base))?;

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches one page of scripture text in the given edition.
    pub fn page(&self, number: u16, edition: &str) -> Result<Page> {
        let path = format!("/page/{}/{}", number, edition);
        self.get_enveloped(&path)
            .with_context(|| format!("alquran: fetch page {}", number))
    }

    pub fn surahs(&self) -> Result<Vec<Surah>> {
        self.get_enveloped("/surah")
            .context("alquran: fetch surah list")
    }

    /// Lists the audio editions, which stand in for reciters here.
    pub fn audio_editions(&self) -> Result<Vec<Reciter>> {
        self.get_enveloped("/edition/format/audio")
            .context("alquran: fetch audio editions")
    }

    /// Resolves a recitation URL as the first verse's audio of the surah in
    /// the given audio edition.
    pub fn surah_audio(&self, surah_number: u16, edition_id: &str) -> Result<String> {
        let path = format!("/surah/{}/{}", surah_number, edition_id);
        let surah: AudioSurah = self
            .get_enveloped(&path)
            .with_context(|| format!("alquran: fetch audio for surah {}", surah_number))?;
        first_verse_audio(&surah).ok_or_else(|| {
            anyhow::anyhow!(
                "alquran: no verse audio for surah {} in edition {}",
                surah_number,
                edition_id
            )
        })
    }

    fn get_enveloped<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()?;
        let envelope: Envelope<T> = response.json()?;
        if envelope.code != 200 {
            bail!("alquran: {} returned {} {}", path, envelope.code, envelope.status);
        }
        Ok(envelope.data)
    }
}

fn first_verse_audio(surah: &AudioSurah) -> Option<String> {
    surah
        .ayahs
        .first()
        .map(|verse| verse.audio.clone())
        .filter(|audio| !audio.trim().is_empty())
}

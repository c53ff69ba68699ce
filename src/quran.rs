use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

pub const QURAN_API_BASE: &str = "https://quranapi.pages.dev/api";

/// Arabic display names for the reciters the primary API is known to serve.
/// Identifiers whose English name is missing here keep `name: None`; no
/// substitute is invented at this layer.
static RECITER_ARABIC_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Nasser Al Qatami", "ناصر القطامي"),
        ("Abu Bakr Al Shatri", "عبدالباسط عبدالصمد "),
        ("Mishary Rashid Al Afasy", "مشاري العفاسي"),
        ("Yasser Al Dosari", "ياسر الدوسري"),
        ("Hani Ar Rifai", "هاني الرفاعي"),
    ])
});

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Revelation classification of a surah.
///
/// The mapping is asymmetric on purpose: only an exact Meccan token counts,
/// every other value (Medinan, empty, unexpected) lands in `Medinan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevelationPlace {
    Meccan,
    #[serde(other)]
    Medinan,
}

impl RevelationPlace {
    /// Normalizes the primary API's `revelationPlace` token, which encodes
    /// the Meccan case only as the literal string "Mecca".
    pub fn from_source_token(token: &str) -> Self {
        if token == "Mecca" {
            RevelationPlace::Meccan
        } else {
            RevelationPlace::Medinan
        }
    }

    pub fn arabic_label(&self) -> &'static str {
        match self {
            RevelationPlace::Meccan => "مكية",
            RevelationPlace::Medinan => "مدنية",
        }
    }
}

impl fmt::Display for RevelationPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RevelationPlace::Meccan => "Meccan",
            RevelationPlace::Medinan => "Medinan",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surah {
    pub number: u16,
    pub name: String,
    #[serde(rename = "englishName")]
    pub english_name: String,
    #[serde(rename = "englishNameTranslation", default)]
    pub english_name_translation: String,
    #[serde(rename = "numberOfAyahs", default)]
    pub number_of_ayahs: u32,
    #[serde(rename = "revelationType", default = "default_revelation")]
    pub revelation_type: RevelationPlace,
}

fn default_revelation() -> RevelationPlace {
    RevelationPlace::Medinan
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    pub number: u32,
    pub text: String,
    #[serde(rename = "numberInSurah")]
    pub number_in_surah: u32,
    #[serde(default)]
    pub juz: u32,
    #[serde(default)]
    pub manzil: u32,
    #[serde(default)]
    pub page: u16,
    #[serde(default)]
    pub ruku: u32,
    #[serde(rename = "hizbQuarter", default)]
    pub hizb_quarter: u32,
    #[serde(default, deserialize_with = "sajda_flag")]
    pub sajda: bool,
}

// The fallback API encodes sajda as `false` or as a detail object.
fn sajda_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::Null => false,
        _ => true,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub number: u16,
    pub ayahs: Vec<Verse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reciter {
    pub identifier: String,
    /// Localized (Arabic) display name; absent when the English name is not
    /// in the fixed lookup table.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "englishName", default)]
    pub english_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub format: String,
}

impl Reciter {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.english_name,
        }
    }
}

/// Raw surah entry as served by the primary API's bulk document.
#[derive(Debug, Clone, Deserialize)]
struct SurahEntry {
    #[serde(rename = "surahName", default)]
    surah_name: String,
    #[serde(rename = "surahNameArabic", default)]
    surah_name_arabic: String,
    #[serde(rename = "surahNameTranslation", default)]
    surah_name_translation: String,
    #[serde(rename = "totalAyah", default)]
    total_ayah: u32,
    #[serde(rename = "revelationPlace", default)]
    revelation_place: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AudioEntry {
    #[serde(rename = "originalUrl", default)]
    original_url: String,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("quran client user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        let base = config
            .base_url
            .unwrap_or_else(|| QURAN_API_BASE.to_string());
        Url::parse(&base).with_context(|| format!("quran: invalid base url {}", base))?;

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the full surah list from the bulk document.
    pub fn surahs(&self) -> Result<Vec<Surah>> {
        let url = format!("{}/surah.json", self.base_url);
        let entries: Vec<SurahEntry> = self
            .get_json(&url)
            .context("quran: fetch surah list")?;
        Ok(surahs_from_entries(entries))
    }

    /// Fetches the reciter catalogue, an identifier-to-English-name map.
    pub fn reciters(&self) -> Result<Vec<Reciter>> {
        let url = format!("{}/reciters.json", self.base_url);
        let map: HashMap<String, String> = self
            .get_json(&url)
            .context("quran: fetch reciter list")?;
        Ok(reciters_from_map(map))
    }

    /// Resolves the recitation URL for one surah from the per-surah audio
    /// map, keyed by reciter identifier.
    pub fn surah_audio(&self, surah_number: u16, reciter_id: &str) -> Result<String> {
        let url = format!("{}/audio/{}.json", self.base_url, surah_number);
        let map: HashMap<String, AudioEntry> = self
            .get_json(&url)
            .with_context(|| format!("quran: fetch audio map for surah {}", surah_number))?;
        let entry = map.get(reciter_id).ok_or_else(|| {
            anyhow!(
                "quran: reciter {} has no audio for surah {}",
                reciter_id,
                surah_number
            )
        })?;
        if entry.original_url.trim().is_empty() {
            bail!(
                "quran: empty audio url for reciter {} surah {}",
                reciter_id,
                surah_number
            );
        }
        Ok(entry.original_url.clone())
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

/// The bulk document is an ordered array: element i is surah i+1. The surah
/// number is positional; nothing inside the payload is consulted for it.
fn surahs_from_entries(entries: Vec<SurahEntry>) -> Vec<Surah> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Surah {
            number: (index + 1) as u16,
            name: entry.surah_name_arabic,
            english_name: entry.surah_name,
            english_name_translation: entry.surah_name_translation,
            number_of_ayahs: entry.total_ayah,
            revelation_type: RevelationPlace::from_source_token(&entry.revelation_place),
        })
        .collect()
}

fn reciters_from_map(map: HashMap<String, String>) -> Vec<Reciter> {
    let mut reciters: Vec<Reciter> = map
        .into_iter()
        .map(|(identifier, english_name)| Reciter {
            identifier,
            name: RECITER_ARABIC_NAMES
                .get(english_name.as_str())
                .map(|arabic| arabic.to_string()),
            english_name,
            language: "ar".to_string(),
            format: "audio".to_string(),
        })
        .collect();
    // The payload is a JSON object with no order guarantee; sort by numeric
    // identifier for a stable listing.
    reciters.sort_by(|a, b| {
        match (a.identifier.parse::<u32>(), b.identifier.parse::<u32>()) {
            (Ok(left), Ok(right)) => left.cmp(&right),
            _ => a.identifier.cmp(&b.identifier),
        }
    });
    reciters
}

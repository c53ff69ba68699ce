use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::alquran;
use crate::quran::{self, Page, Reciter, RevelationPlace, Surah, Verse};

pub trait SurahService: Send + Sync {
    fn list_surahs(&self) -> Result<Vec<Surah>>;
}

pub trait PageService: Send + Sync {
    fn load_page(&self, number: u16) -> Result<Page>;
}

pub trait ReciterService: Send + Sync {
    fn list_reciters(&self) -> Result<Vec<Reciter>>;
}

pub trait AudioService: Send + Sync {
    /// Total: always yields a playable URL, degrading to the direct-download
    /// templates when every source fails.
    fn resolve_audio_url(&self, surah_number: u16, reciter_id: &str) -> String;
}

/// Runs each attempt once, in order, returning the first success or the
/// last failure. No retries, no backoff.
pub fn try_in_order<T>(attempts: Vec<Box<dyn FnOnce() -> Result<T> + '_>>) -> Result<T> {
    let mut last_err = None;
    for attempt in attempts {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no sources configured")))
}

/// Direct-download recitation URLs used when both APIs fail. The first
/// template carries the chapter number as-is; the mirror templates require
/// it zero-padded to 3 digits.
pub fn direct_audio_urls(surah_number: u16) -> [String; 3] {
    let padded = format!("{:03}", surah_number);
    [
        format!(
            "https://api.quran.com/api/v4/chapter_recitations/1/{}.mp3",
            surah_number
        ),
        format!(
            "https://download.quranicaudio.com/quran/mishary_rashid_alafasy/{}.mp3",
            padded
        ),
        format!(
            "https://download.quranicaudio.com/quran/maher_almuaiqly/{}.mp3",
            padded
        ),
    ]
}

pub struct TieredSurahService {
    primary: Arc<quran::Client>,
    fallback: Arc<alquran::Client>,
}

impl TieredSurahService {
    pub fn new(primary: Arc<quran::Client>, fallback: Arc<alquran::Client>) -> Self {
        Self { primary, fallback }
    }
}

impl SurahService for TieredSurahService {
    fn list_surahs(&self) -> Result<Vec<Surah>> {
        try_in_order(vec![
            Box::new(|| self.primary.surahs()),
            Box::new(|| self.fallback.surahs()),
        ])
    }
}

/// Page content has a single source; the bulk documents have no pages
/// endpoint.
pub struct AlQuranPageService {
    client: Arc<alquran::Client>,
    edition: String,
}

impl AlQuranPageService {
    pub fn new(client: Arc<alquran::Client>, edition: String) -> Self {
        let edition = if edition.trim().is_empty() {
            alquran::DEFAULT_PAGE_EDITION.to_string()
        } else {
            edition
        };
        Self { client, edition }
    }
}

impl PageService for AlQuranPageService {
    fn load_page(&self, number: u16) -> Result<Page> {
        self.client.page(number, &self.edition)
    }
}

pub struct TieredReciterService {
    primary: Arc<quran::Client>,
    fallback: Arc<alquran::Client>,
}

impl TieredReciterService {
    pub fn new(primary: Arc<quran::Client>, fallback: Arc<alquran::Client>) -> Self {
        Self { primary, fallback }
    }
}

impl ReciterService for TieredReciterService {
    fn list_reciters(&self) -> Result<Vec<Reciter>> {
        try_in_order(vec![
            Box::new(|| self.primary.reciters()),
            Box::new(|| self.fallback.audio_editions()),
        ])
    }
}

pub struct TieredAudioService {
    primary: Arc<quran::Client>,
    fallback: Arc<alquran::Client>,
}

impl TieredAudioService {
    pub fn new(primary: Arc<quran::Client>, fallback: Arc<alquran::Client>) -> Self {
        Self { primary, fallback }
    }
}

impl AudioService for TieredAudioService {
    fn resolve_audio_url(&self, surah_number: u16, reciter_id: &str) -> String {
        let resolved = try_in_order(vec![
            Box::new(|| self.primary.surah_audio(surah_number, reciter_id)),
            Box::new(|| self.fallback.surah_audio(surah_number, reciter_id)),
        ]);
        match resolved {
            Ok(url) => url,
            Err(_) => {
                let [first, _, _] = direct_audio_urls(surah_number);
                first
            }
        }
    }
}

#[derive(Default)]
pub struct MockSurahService;

impl SurahService for MockSurahService {
    fn list_surahs(&self) -> Result<Vec<Surah>> {
        Ok(vec![
            Surah {
                number: 1,
                name: "الفاتحة".into(),
                english_name: "Al-Faatiha".into(),
                english_name_translation: "The Opening".into(),
                number_of_ayahs: 7,
                revelation_type: RevelationPlace::Meccan,
            },
            Surah {
                number: 2,
                name: "البقرة".into(),
                english_name: "Al-Baqara".into(),
                english_name_translation: "The Cow".into(),
                number_of_ayahs: 286,
                revelation_type: RevelationPlace::Medinan,
            },
            Surah {
                number: 3,
                name: "آل عمران".into(),
                english_name: "Aal-i-Imraan".into(),
                english_name_translation: "The Family of Imraan".into(),
                number_of_ayahs: 200,
                revelation_type: RevelationPlace::Medinan,
            },
        ])
    }
}

#[derive(Default)]
pub struct MockPageService;

impl PageService for MockPageService {
    fn load_page(&self, number: u16) -> Result<Page> {
        Ok(Page {
            number,
            ayahs: vec![Verse {
                number: u32::from(number),
                text: "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ".into(),
                number_in_surah: 1,
                juz: 1,
                manzil: 1,
                page: number,
                ruku: 1,
                hizb_quarter: 1,
                sajda: false,
            }],
        })
    }
}

#[derive(Default)]
pub struct MockReciterService;

impl ReciterService for MockReciterService {
    fn list_reciters(&self) -> Result<Vec<Reciter>> {
        Ok(vec![Reciter {
            identifier: "1".into(),
            name: Some("مشاري العفاسي".into()),
            english_name: "Mishary Rashid Al Afasy".into(),
            language: "ar".into(),
            format: "audio".into(),
        }])
    }
}

#[derive(Default)]
pub struct MockAudioService;

impl AudioService for MockAudioService {
    fn resolve_audio_url(&self, surah_number: u16, _reciter_id: &str) -> String {
        let [first, _, _] = direct_audio_urls(surah_number);
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn try_in_order_returns_first_success() {
        let second_ran = Cell::new(false);
        let result: Result<i32> = try_in_order(vec![
            Box::new(|| Ok(7)),
            Box::new(|| {
                second_ran.set(true);
                Ok(8)
            }),
        ]);
        assert_eq!(result.unwrap(), 7);
        assert!(!second_ran.get(), "later tiers must not run after a success");
    }

    #[test]
    fn try_in_order_falls_through_to_later_tiers() {
        let result: Result<i32> = try_in_order(vec![
            Box::new(|| Err(anyhow!("primary down"))),
            Box::new(|| Ok(42)),
        ]);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn try_in_order_surfaces_the_last_failure() {
        let result: Result<i32> = try_in_order(vec![
            Box::new(|| Err(anyhow!("primary down"))),
            Box::new(|| Err(anyhow!("fallback down"))),
        ]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("fallback down"));
    }

    #[test]
    fn direct_urls_pad_where_the_template_requires_it() {
        let [api, afasy, almuaiqly] = direct_audio_urls(5);
        assert_eq!(
            api,
            "https://api.quran.com/api/v4/chapter_recitations/1/5.mp3"
        );
        assert_eq!(
            afasy,
            "https://download.quranicaudio.com/quran/mishary_rashid_alafasy/005.mp3"
        );
        assert_eq!(
            almuaiqly,
            "https://download.quranicaudio.com/quran/maher_almuaiqly/005.mp3"
        );

        let [_, padded, _] = direct_audio_urls(114);
        assert!(padded.ends_with("/114.mp3"));
    }

    // Both tiers point at a closed local port, so each attempt fails fast
    // and resolution must degrade to the first direct template.
    #[test]
    fn audio_resolution_degrades_to_direct_urls() {
        let primary = Arc::new(
            quran::Client::new(quran::ClientConfig {
                user_agent: "noor-tui-test/0.1".into(),
                base_url: Some("http://127.0.0.1:9".into()),
                timeout: Some(Duration::from_millis(250)),
                http_client: None,
            })
            .unwrap(),
        );
        let fallback = Arc::new(
            alquran::Client::new(alquran::ClientConfig {
                user_agent: "noor-tui-test/0.1".into(),
                base_url: Some("http://127.0.0.1:9".into()),
                timeout: Some(Duration::from_millis(250)),
                http_client: None,
            })
            .unwrap(),
        );
        let service = TieredAudioService::new(primary, fallback);
        assert_eq!(
            service.resolve_audio_url(5, "x"),
            "https://api.quran.com/api/v4/chapter_recitations/1/5.mp3"
        );
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::alquran;
use crate::config;
use crate::data::{self, AudioService, PageService, ReciterService, SurahService};
use crate::nav;
use crate::player;
use crate::prefs;
use crate::quran;
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let store = prefs::Store::open(prefs::Options::default()).context("open preference store")?;
    let preferences = store.load().context("load preferences")?;

    let user_agent = if cfg.api.user_agent.trim().is_empty() {
        format!("noor-tui/{}", crate::VERSION)
    } else {
        cfg.api.user_agent.clone()
    };

    let primary = quran::Client::new(quran::ClientConfig {
        user_agent: user_agent.clone(),
        base_url: Some(cfg.api.primary_url.clone()),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .ok()
    .map(Arc::new);

    let fallback = alquran::Client::new(alquran::ClientConfig {
        user_agent,
        base_url: Some(cfg.api.fallback_url.clone()),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .ok()
    .map(Arc::new);

    let page_service: Option<Arc<dyn PageService>> = fallback.clone().map(|client| {
        Arc::new(data::AlQuranPageService::new(
            client,
            cfg.api.page_edition.clone(),
        )) as Arc<dyn PageService>
    });
    let surah_service: Option<Arc<dyn SurahService>> = match (primary.clone(), fallback.clone()) {
        (Some(primary), Some(fallback)) => {
            Some(Arc::new(data::TieredSurahService::new(primary, fallback)))
        }
        _ => None,
    };
    let reciter_service: Option<Arc<dyn ReciterService>> = match (primary.clone(), fallback.clone())
    {
        (Some(primary), Some(fallback)) => {
            Some(Arc::new(data::TieredReciterService::new(primary, fallback)))
        }
        _ => None,
    };
    let audio_service: Option<Arc<dyn AudioService>> = match (primary, fallback) {
        (Some(primary), Some(fallback)) => {
            Some(Arc::new(data::TieredAudioService::new(primary, fallback)))
        }
        _ => None,
    };

    let status_message = if surah_service.is_some() && page_service.is_some() {
        "Browsing the mushaf. j/k to move, Enter to open a surah, a to play, q to quit.".to_string()
    } else {
        "Failed to initialize the API clients. Check your network configuration.".to_string()
    };

    let route = nav::Route {
        page: preferences.last_page,
        surah: None,
    };

    let options = ui::Options {
        status_message,
        theme: cfg.ui.theme.clone(),
        route,
        preferences,
        surah_service,
        page_service,
        reciter_service,
        audio_service,
        store: store.clone(),
        player: player::Player::new(cfg.player.audio_command.clone(), cfg.player.audio_detach),
    };

    let mut model = ui::Model::new(options);
    model.run()?;
    drop(model);

    store.close().context("close preference store")?;
    Ok(())
}

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthChar;

use crate::data::{AudioService, PageService, ReciterService, SurahService};
use crate::mushaf;
use crate::nav;
use crate::player;
use crate::prefs;
use crate::quran::{Page, Reciter, Surah};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Surahs,
    Page,
    Reciters,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Pane::Surahs => Pane::Page,
            Pane::Page => Pane::Reciters,
            Pane::Reciters => Pane::Surahs,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Surahs => Pane::Reciters,
            Pane::Page => Pane::Surahs,
            Pane::Reciters => Pane::Page,
        }
    }
}

enum AsyncResponse {
    Surahs(Result<Vec<Surah>>),
    Page { number: u16, result: Result<Page> },
    Reciters(Result<Vec<Reciter>>),
    Audio { surah_name: String, url: String },
}

pub struct Options {
    pub status_message: String,
    pub theme: String,
    pub route: nav::Route,
    pub preferences: prefs::Preferences,
    pub surah_service: Option<Arc<dyn SurahService>>,
    pub page_service: Option<Arc<dyn PageService>>,
    pub reciter_service: Option<Arc<dyn ReciterService>>,
    pub audio_service: Option<Arc<dyn AudioService>>,
    pub store: prefs::Store,
    pub player: player::Player,
}

pub struct Model {
    status_message: String,
    theme_name: String,
    nav: nav::Navigator,
    surahs: Vec<Surah>,
    reciters: Vec<Reciter>,
    page: Option<Page>,
    loading_page: bool,
    reading_mode: bool,
    dark_mode: bool,
    focused_pane: Pane,
    selected_surah: usize,
    selected_reciter: usize,
    active_reciter: Option<usize>,
    now_playing: Option<String>,
    surah_filter: String,
    reciter_filter: String,
    search_input: Option<String>,
    goto_input: Option<String>,
    content_scroll: u16,
    surah_service: Option<Arc<dyn SurahService>>,
    page_service: Option<Arc<dyn PageService>>,
    reciter_service: Option<Arc<dyn ReciterService>>,
    audio_service: Option<Arc<dyn AudioService>>,
    store: prefs::Store,
    player: player::Player,
    matcher: SkimMatcherV2,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            status_message: opts.status_message,
            theme_name: opts.theme,
            nav: nav::Navigator::new(opts.route),
            surahs: Vec::new(),
            reciters: Vec::new(),
            page: None,
            loading_page: false,
            reading_mode: opts.preferences.reading_mode,
            dark_mode: opts.preferences.dark_mode,
            focused_pane: Pane::Surahs,
            selected_surah: 0,
            selected_reciter: 0,
            active_reciter: None,
            now_playing: None,
            surah_filter: String::new(),
            reciter_filter: String::new(),
            search_input: None,
            goto_input: None,
            content_scroll: 0,
            surah_service: opts.surah_service,
            page_service: opts.page_service,
            reciter_service: opts.reciter_service,
            audio_service: opts.audio_service,
            store: opts.store,
            player: opts.player,
            matcher: SkimMatcherV2::default(),
            response_tx,
            response_rx,
            needs_redraw: true,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("create terminal")?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().ok();
        execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        self.queue_initial_fetches();
        loop {
            if self.needs_redraw {
                terminal.draw(|frame| self.view(frame))?;
                self.needs_redraw = false;
            }
            if event::poll(Duration::from_millis(100)).context("poll terminal events")? {
                match event::read().context("read terminal event")? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Resize(..) => self.mark_dirty(),
                    _ => {}
                }
            }
            self.drain_responses();
        }
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn queue_initial_fetches(&mut self) {
        self.request_surahs();
        self.request_reciters();
        let page = self.nav.page_number();
        self.request_page(page);
    }

    // --- input -----------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(true);
        }

        if self.goto_input.is_some() {
            self.handle_goto_key(key.code);
            return Ok(false);
        }
        if self.search_input.is_some() {
            self.handle_search_key(key.code);
            return Ok(false);
        }
        if self.reading_mode {
            return Ok(self.handle_reading_key(key.code));
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('h') | KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.previous();
                self.mark_dirty();
            }
            KeyCode::Char('l') | KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
                self.mark_dirty();
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter => self.activate_selection(),
            KeyCode::Left => {
                let page = self.nav.page_number();
                self.go_to_page(i64::from(page) - 1);
            }
            KeyCode::Right => {
                let page = self.nav.page_number();
                self.go_to_page(i64::from(page) + 1);
            }
            KeyCode::Char('g') => {
                self.goto_input = Some(String::new());
                self.mark_dirty();
            }
            KeyCode::Char('/') => {
                self.search_input = Some(self.active_filter().to_string());
                self.mark_dirty();
            }
            KeyCode::Char('r') => self.toggle_reading_mode(),
            KeyCode::Char('d') => self.toggle_dark_mode(),
            KeyCode::Char('a') | KeyCode::Char(' ') => self.play_selected_surah(),
            KeyCode::Char(']') => self.play_adjacent_surah(1),
            KeyCode::Char('[') => self.play_adjacent_surah(-1),
            KeyCode::Char('s') => {
                self.player.stop();
                if self.now_playing.take().is_some() {
                    self.status_message = "Playback stopped.".to_string();
                }
                self.mark_dirty();
            }
            KeyCode::Esc => {
                if self.nav.surah_marker().is_some() {
                    self.nav.clear_surah();
                    self.status_message = "Showing all surahs.".to_string();
                    self.mark_dirty();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_reading_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') | KeyCode::Esc => self.toggle_reading_mode(),
            KeyCode::Left => {
                let page = self.nav.page_number();
                self.go_to_page(i64::from(page) - 1);
            }
            KeyCode::Right => {
                let page = self.nav.page_number();
                self.go_to_page(i64::from(page) + 1);
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_content(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_content(-1),
            KeyCode::Char('d') => self.toggle_dark_mode(),
            _ => {}
        }
        false
    }

    fn handle_goto_key(&mut self, code: KeyCode) {
        let Some(buffer) = self.goto_input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                if buffer.len() < 4 {
                    buffer.push(ch);
                }
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Enter => {
                let target = buffer.parse::<i64>().unwrap_or(0);
                self.goto_input = None;
                self.go_to_page(target);
            }
            KeyCode::Esc => {
                self.goto_input = None;
            }
            _ => {}
        }
        self.mark_dirty();
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        let Some(buffer) = self.search_input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(ch) => {
                buffer.push(ch);
                let filter = buffer.clone();
                self.set_active_filter(filter);
            }
            KeyCode::Backspace => {
                buffer.pop();
                let filter = buffer.clone();
                self.set_active_filter(filter);
            }
            KeyCode::Enter => {
                self.search_input = None;
            }
            KeyCode::Esc => {
                self.search_input = None;
                self.set_active_filter(String::new());
            }
            _ => {}
        }
        self.mark_dirty();
    }

    fn active_filter(&self) -> &str {
        match self.focused_pane {
            Pane::Reciters => &self.reciter_filter,
            _ => &self.surah_filter,
        }
    }

    fn set_active_filter(&mut self, filter: String) {
        match self.focused_pane {
            Pane::Reciters => {
                self.reciter_filter = filter;
                self.selected_reciter = 0;
            }
            _ => {
                self.surah_filter = filter;
                self.selected_surah = 0;
            }
        }
        self.mark_dirty();
    }

    fn move_selection(&mut self, delta: i64) {
        match self.focused_pane {
            Pane::Surahs => {
                let len = self.filtered_surah_indices().len();
                self.selected_surah = step_index(self.selected_surah, delta, len);
            }
            Pane::Reciters => {
                let len = self.filtered_reciter_indices().len();
                self.selected_reciter = step_index(self.selected_reciter, delta, len);
            }
            Pane::Page => self.scroll_content(delta),
        }
        self.mark_dirty();
    }

    fn scroll_content(&mut self, delta: i64) {
        let next = i64::from(self.content_scroll) + delta;
        self.content_scroll = next.clamp(0, u16::MAX as i64) as u16;
        self.mark_dirty();
    }

    fn activate_selection(&mut self) {
        match self.focused_pane {
            Pane::Surahs => self.select_surah_at(self.selected_surah),
            Pane::Reciters => self.activate_reciter_at(self.selected_reciter),
            Pane::Page => {}
        }
    }

    // --- navigation ------------------------------------------------------

    /// Accepted targets update the route and trigger exactly one page
    /// fetch; anything outside 1..=604 is silently ignored.
    fn go_to_page(&mut self, target: i64) {
        if let Some(page) = self.nav.go_to_page(target) {
            self.content_scroll = 0;
            self.status_message = format!("Page {} of {}.", page, mushaf::PAGE_COUNT);
            self.request_page(page);
            self.persist_preferences();
            self.mark_dirty();
        }
    }

    fn select_surah_at(&mut self, position: usize) {
        let indices = self.filtered_surah_indices();
        let Some(&index) = indices.get(position) else {
            return;
        };
        let surah = self.surahs[index].clone();
        let fetch = self.nav.select_surah(&surah);
        self.status_message = format!(
            "{} — page {}.",
            surah.name,
            mushaf::start_page_of(i64::from(surah.number))
        );
        if let Some(page) = fetch {
            self.content_scroll = 0;
            self.request_page(page);
        }
        self.persist_preferences();
        self.mark_dirty();
    }

    fn activate_reciter_at(&mut self, position: usize) {
        let indices = self.filtered_reciter_indices();
        let Some(&index) = indices.get(position) else {
            return;
        };
        self.active_reciter = Some(index);
        let reciter = &self.reciters[index];
        self.status_message = format!("Reciter: {}.", reciter.display_name());
        self.mark_dirty();
    }

    // --- playback --------------------------------------------------------

    fn play_selected_surah(&mut self) {
        let indices = self.filtered_surah_indices();
        let Some(&index) = indices.get(self.selected_surah) else {
            self.status_message = "No surah selected.".to_string();
            self.mark_dirty();
            return;
        };
        let surah = self.surahs[index].clone();
        self.play_surah(&surah);
    }

    fn play_adjacent_surah(&mut self, delta: i64) {
        let Some(current) = self
            .now_playing_number()
            .or_else(|| self.selected_surah_number())
        else {
            return;
        };
        let target = i64::from(current) + delta;
        if !(1..=i64::from(mushaf::SURAH_COUNT)).contains(&target) {
            return;
        }
        let Some(surah) = self
            .surahs
            .iter()
            .find(|surah| i64::from(surah.number) == target)
            .cloned()
        else {
            return;
        };
        self.play_surah(&surah);
    }

    fn play_surah(&mut self, surah: &Surah) {
        let Some(service) = self.audio_service.clone() else {
            self.status_message = "Audio service unavailable.".to_string();
            self.mark_dirty();
            return;
        };
        let Some(reciter_id) = self.active_reciter_id() else {
            self.status_message = "Select a reciter first (Enter on the reciter pane).".to_string();
            self.mark_dirty();
            return;
        };

        self.status_message = format!("Preparing recitation of {}…", surah.name);
        self.now_playing = Some(format!("{} ({})", surah.name, surah.number));
        self.mark_dirty();

        let tx = self.response_tx.clone();
        let surah_number = surah.number;
        let surah_name = surah.name.clone();
        thread::spawn(move || {
            let url = service.resolve_audio_url(surah_number, &reciter_id);
            let _ = tx.send(AsyncResponse::Audio { surah_name, url });
        });
    }

    fn active_reciter_id(&self) -> Option<String> {
        let index = self.active_reciter?;
        self.reciters
            .get(index)
            .map(|reciter| reciter.identifier.clone())
    }

    fn now_playing_number(&self) -> Option<u16> {
        let label = self.now_playing.as_ref()?;
        let digits = label.rsplit('(').next()?.trim_end_matches(')');
        digits.parse().ok()
    }

    fn selected_surah_number(&self) -> Option<u16> {
        let indices = self.filtered_surah_indices();
        let index = *indices.get(self.selected_surah)?;
        self.surahs.get(index).map(|surah| surah.number)
    }

    // --- preferences -----------------------------------------------------

    fn toggle_reading_mode(&mut self) {
        self.reading_mode = !self.reading_mode;
        self.status_message = if self.reading_mode {
            "Reading mode on.".to_string()
        } else {
            "Reading mode off.".to_string()
        };
        self.persist_preferences();
        self.mark_dirty();
    }

    fn toggle_dark_mode(&mut self) {
        self.dark_mode = !self.dark_mode;
        self.status_message = if self.dark_mode {
            "Dark mode on.".to_string()
        } else {
            "Dark mode off.".to_string()
        };
        self.persist_preferences();
        self.mark_dirty();
    }

    /// One write per state change; failures surface on the status bar and
    /// never interrupt navigation.
    fn persist_preferences(&mut self) {
        let prefs = prefs::Preferences {
            last_page: self.nav.page_number(),
            reading_mode: self.reading_mode,
            dark_mode: self.dark_mode,
        };
        if let Err(err) = self.store.save(&prefs) {
            self.status_message = format!("Failed to save preferences: {err}");
        }
    }

    // --- async requests --------------------------------------------------

    fn request_surahs(&mut self) {
        let Some(service) = self.surah_service.clone() else {
            return;
        };
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.list_surahs();
            let _ = tx.send(AsyncResponse::Surahs(result));
        });
    }

    fn request_reciters(&mut self) {
        let Some(service) = self.reciter_service.clone() else {
            return;
        };
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.list_reciters();
            let _ = tx.send(AsyncResponse::Reciters(result));
        });
    }

    fn request_page(&mut self, number: u16) {
        let Some(service) = self.page_service.clone() else {
            self.page = None;
            self.status_message = "Page service unavailable.".to_string();
            return;
        };
        self.loading_page = true;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.load_page(number);
            let _ = tx.send(AsyncResponse::Page { number, result });
        });
    }

    fn drain_responses(&mut self) {
        while let Ok(response) = self.response_rx.try_recv() {
            self.apply_response(response);
        }
    }

    fn apply_response(&mut self, response: AsyncResponse) {
        match response {
            AsyncResponse::Surahs(Ok(surahs)) => {
                self.surahs = surahs;
                self.selected_surah = 0;
            }
            AsyncResponse::Surahs(Err(err)) => {
                self.status_message = format!("Failed to load surahs: {err}");
            }
            AsyncResponse::Reciters(Ok(reciters)) => {
                self.reciters = reciters;
                self.selected_reciter = 0;
                if self.active_reciter.is_none() && !self.reciters.is_empty() {
                    self.active_reciter = Some(0);
                }
            }
            AsyncResponse::Reciters(Err(err)) => {
                self.status_message = format!("Failed to load reciters: {err}");
            }
            // Page responses land in arrival order. There is no request
            // token, so a slow response for an older page can overwrite a
            // newer one.
            AsyncResponse::Page { number, result } => {
                self.loading_page = false;
                match result {
                    Ok(page) => {
                        self.page = Some(page);
                    }
                    Err(err) => {
                        // A failed fetch clears the pane; stale text is
                        // never kept on screen.
                        self.page = None;
                        self.status_message = format!("Failed to load page {number}: {err}");
                    }
                }
            }
            AsyncResponse::Audio { surah_name, url } => {
                player::debug_log(format!("ui: resolved audio url {url}"));
                match self.player.play(&url) {
                    Ok(()) => {
                        self.status_message = format!("Playing {surah_name}.");
                    }
                    Err(err) => {
                        self.now_playing = None;
                        self.status_message = format!("Failed to start player: {err}");
                    }
                }
            }
        }
        self.mark_dirty();
    }

    // --- filtering -------------------------------------------------------

    fn filtered_surah_indices(&self) -> Vec<usize> {
        if self.surah_filter.is_empty() {
            return (0..self.surahs.len()).collect();
        }
        self.surahs
            .iter()
            .enumerate()
            .filter(|(_, surah)| {
                let haystack = format!(
                    "{} {} {} {}",
                    surah.number, surah.name, surah.english_name, surah.english_name_translation
                );
                self.matcher
                    .fuzzy_match(&haystack, &self.surah_filter)
                    .is_some()
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn filtered_reciter_indices(&self) -> Vec<usize> {
        if self.reciter_filter.is_empty() {
            return (0..self.reciters.len()).collect();
        }
        self.reciters
            .iter()
            .enumerate()
            .filter(|(_, reciter)| {
                let haystack = format!(
                    "{} {} {}",
                    reciter.identifier,
                    reciter.display_name(),
                    reciter.english_name
                );
                self.matcher
                    .fuzzy_match(&haystack, &self.reciter_filter)
                    .is_some()
            })
            .map(|(index, _)| index)
            .collect()
    }

    // --- drawing ---------------------------------------------------------

    fn view(&mut self, frame: &mut Frame) {
        if self.reading_mode {
            self.view_reading(frame);
        } else {
            self.view_browse(frame);
        }
    }

    fn view_browse(&mut self, frame: &mut Frame) {
        let theme = self.theme();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0], &theme);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(32),
                Constraint::Percentage(40),
                Constraint::Percentage(28),
            ])
            .split(chunks[1]);

        self.render_surah_list(frame, body[0], &theme);
        self.render_page(frame, body[1], &theme, false);
        self.render_reciter_list(frame, body[2], &theme);
        self.render_status(frame, chunks[2], &theme);
    }

    fn view_reading(&mut self, frame: &mut Frame) {
        let theme = self.theme();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(frame.size());

        self.render_page(frame, chunks[0], &theme, true);

        let hint = Paragraph::new(Line::from(vec![Span::styled(
            "←/→ pages  j/k scroll  r exit reading mode  q quit",
            Style::default().fg(theme.dim),
        )]))
        .alignment(Alignment::Center);
        frame.render_widget(hint, chunks[1]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let page = self.nav.page_number();
        let juz = self
            .page
            .as_ref()
            .and_then(|page| page.ayahs.first())
            .map(|verse| verse.juz)
            .unwrap_or(0);
        let mut right = format!("Page {} / {}", page, mushaf::PAGE_COUNT);
        if juz > 0 {
            right.push_str(&format!("  •  Juz {}", juz));
        }
        if let Some(marker) = self.nav.surah_marker() {
            right.push_str(&format!("  •  Surah {}", marker));
        }

        let title = Line::from(vec![
            Span::styled(
                " نــور ",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("Noor — Quran reader", Style::default().fg(theme.text)),
        ]);
        let header = Paragraph::new(vec![title, Line::from(Span::styled(right, Style::default().fg(theme.dim)))])
            .block(
                Block::default()
                    .borders(Borders::BOTTOM)
                    .border_style(Style::default().fg(theme.dim)),
            );
        frame.render_widget(header, area);
    }

    fn render_surah_list(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let indices = self.filtered_surah_indices();
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = indices
            .iter()
            .map(|&index| {
                let surah = &self.surahs[index];
                let row = format!(
                    "{:>3}. {}  {} • {} آية • {}",
                    surah.number,
                    surah.name,
                    surah.english_name,
                    surah.number_of_ayahs,
                    surah.revelation_type.arabic_label()
                );
                ListItem::new(truncate_to_width(&row, width))
            })
            .collect();

        let title = if self.surah_filter.is_empty() {
            "Surahs".to_string()
        } else {
            format!("Surahs /{}", self.surah_filter)
        };
        let list = List::new(items)
            .block(self.pane_block(&title, Pane::Surahs, theme))
            .style(Style::default().fg(theme.text))
            .highlight_style(theme.highlight)
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if !indices.is_empty() {
            state.select(Some(self.selected_surah.min(indices.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_reciter_list(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let indices = self.filtered_reciter_indices();
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = indices
            .iter()
            .map(|&index| {
                let reciter = &self.reciters[index];
                let marker = if self.active_reciter == Some(index) {
                    "● "
                } else {
                    "  "
                };
                let row = format!("{}{}  {}", marker, reciter.display_name(), reciter.english_name);
                ListItem::new(truncate_to_width(&row, width))
            })
            .collect();

        let title = if self.reciter_filter.is_empty() {
            "Reciters".to_string()
        } else {
            format!("Reciters /{}", self.reciter_filter)
        };
        let list = List::new(items)
            .block(self.pane_block(&title, Pane::Reciters, theme))
            .style(Style::default().fg(theme.text))
            .highlight_style(theme.highlight)
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if !indices.is_empty() {
            state.select(Some(self.selected_reciter.min(indices.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_page(&mut self, frame: &mut Frame, area: Rect, theme: &Theme, reading: bool) {
        let page_number = self.nav.page_number();
        let title = format!("الصفحة {}", page_number);
        let block = if reading {
            Block::default()
                .borders(Borders::ALL)
                .title(title.clone())
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(theme.accent))
        } else {
            self.pane_block(&title, Pane::Page, theme)
        };

        let inner_width = area.width.saturating_sub(4).max(8) as usize;
        let wrap_width = if reading {
            inner_width.min(80)
        } else {
            inner_width
        };
        let body = match (&self.page, self.loading_page) {
            (Some(page), _) => page_text(page),
            (None, true) => "…".to_string(),
            (None, false) => String::new(),
        };
        let lines: Vec<Line> = textwrap::wrap(&body, wrap_width)
            .into_iter()
            .map(|row| Line::from(row.into_owned()))
            .collect();

        let content_height = area.height.saturating_sub(2);
        let max_scroll = (lines.len() as u16).saturating_sub(content_height);
        if self.content_scroll > max_scroll {
            self.content_scroll = max_scroll;
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .style(Style::default().fg(theme.text))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .scroll((self.content_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let width = area.width.saturating_sub(2) as usize;
        let line = if let Some(buffer) = &self.goto_input {
            Line::from(vec![
                Span::styled("Go to page: ", Style::default().fg(theme.accent)),
                Span::styled(buffer.clone(), Style::default().fg(theme.text)),
                Span::styled("▏", Style::default().fg(theme.dim)),
            ])
        } else if let Some(buffer) = &self.search_input {
            Line::from(vec![
                Span::styled("Search: ", Style::default().fg(theme.accent)),
                Span::styled(buffer.clone(), Style::default().fg(theme.text)),
                Span::styled("▏", Style::default().fg(theme.dim)),
            ])
        } else {
            let mut text = self.status_message.clone();
            if let Some(playing) = &self.now_playing {
                text.push_str(&format!("  ♪ {}", playing));
            }
            Line::from(Span::styled(
                truncate_to_width(&text, width),
                Style::default().fg(theme.text),
            ))
        };

        let status = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(theme.dim)),
        );
        frame.render_widget(status, area);
    }

    fn pane_block(&self, title: &str, pane: Pane, theme: &Theme) -> Block<'static> {
        let border = if self.focused_pane == pane {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.dim)
        };
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(border)
    }

    fn theme(&self) -> Theme {
        let accent = if self.theme_name == "default" {
            Color::Yellow
        } else {
            Color::Cyan
        };
        if self.dark_mode {
            Theme {
                text: Color::Gray,
                dim: Color::DarkGray,
                accent,
                highlight: Style::default()
                    .fg(Color::Black)
                    .bg(accent)
                    .add_modifier(Modifier::BOLD),
            }
        } else {
            Theme {
                text: Color::White,
                dim: Color::DarkGray,
                accent,
                highlight: Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD),
            }
        }
    }
}

struct Theme {
    text: Color,
    dim: Color,
    accent: Color,
    highlight: Style,
}

fn step_index(current: usize, delta: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + delta;
    next.clamp(0, len as i64 - 1) as usize
}

/// Joins verse texts with their in-surah numbers in ornamental brackets.
fn page_text(page: &Page) -> String {
    page.ayahs
        .iter()
        .map(|verse| format!("{} ﴿{}﴾", verse.text, verse.number_in_surah))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_to_width(text: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max {
            out.push('…');
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockAudioService, MockPageService, MockReciterService, MockSurahService};
    use anyhow::anyhow;
    use tempfile::TempDir;

    fn test_model() -> (Model, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = prefs::Store::open(prefs::Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap();
        let options = Options {
            status_message: String::new(),
            theme: "default".into(),
            route: nav::Route::default(),
            preferences: prefs::Preferences::default(),
            surah_service: Some(Arc::new(MockSurahService)),
            page_service: Some(Arc::new(MockPageService)),
            reciter_service: Some(Arc::new(MockReciterService)),
            audio_service: Some(Arc::new(MockAudioService)),
            store,
            player: player::Player::new(vec!["true".into()], true),
        };
        (Model::new(options), dir)
    }

    fn load_mock_lists(model: &mut Model) {
        model.apply_response(AsyncResponse::Surahs(MockSurahService.list_surahs()));
        model.apply_response(AsyncResponse::Reciters(MockReciterService.list_reciters()));
    }

    #[test]
    fn out_of_bounds_page_targets_are_ignored() {
        let (mut model, _dir) = test_model();
        model.go_to_page(0);
        model.go_to_page(605);
        model.go_to_page(-4);
        assert_eq!(model.nav.page_number(), 1);
    }

    #[test]
    fn accepted_page_changes_fetch_and_persist() {
        let (mut model, _dir) = test_model();
        model.go_to_page(50);
        assert_eq!(model.nav.page_number(), 50);

        let response = model
            .response_rx
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        model.apply_response(response);
        assert_eq!(model.page.as_ref().unwrap().number, 50);

        assert_eq!(model.store.load().unwrap().last_page, 50);
    }

    #[test]
    fn selecting_a_surah_moves_marker_and_page_together() {
        let (mut model, _dir) = test_model();
        load_mock_lists(&mut model);
        model.select_surah_at(2);
        assert_eq!(model.nav.page_number(), 50);
        assert_eq!(model.nav.surah_marker(), Some("3"));
    }

    #[test]
    fn failed_page_fetch_clears_content() {
        let (mut model, _dir) = test_model();
        model.apply_response(AsyncResponse::Page {
            number: 2,
            result: MockPageService.load_page(2),
        });
        assert!(model.page.is_some());

        model.apply_response(AsyncResponse::Page {
            number: 3,
            result: Err(anyhow!("boom")),
        });
        assert!(model.page.is_none());
        assert!(model.status_message.contains("Failed to load page 3"));
    }

    #[test]
    fn page_responses_apply_in_arrival_order() {
        let (mut model, _dir) = test_model();
        model.apply_response(AsyncResponse::Page {
            number: 9,
            result: MockPageService.load_page(9),
        });
        // A slow response for an older page arriving late still wins.
        model.apply_response(AsyncResponse::Page {
            number: 4,
            result: MockPageService.load_page(4),
        });
        assert_eq!(model.page.as_ref().unwrap().number, 4);
    }

    #[test]
    fn goto_input_commits_on_enter() {
        let (mut model, _dir) = test_model();
        model
            .handle_key(KeyEvent::new(KeyCode::Char('g'), KeyModifiers::NONE))
            .unwrap();
        for ch in ['1', '0', '6'] {
            model
                .handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))
                .unwrap();
        }
        model
            .handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
            .unwrap();
        assert_eq!(model.nav.page_number(), 106);
        assert!(model.goto_input.is_none());
    }

    #[test]
    fn toggles_persist_to_the_store() {
        let (mut model, _dir) = test_model();
        model.toggle_reading_mode();
        model.toggle_dark_mode();
        let prefs = model.store.load().unwrap();
        assert!(prefs.reading_mode);
        assert!(prefs.dark_mode);

        model.toggle_dark_mode();
        assert!(!model.store.load().unwrap().dark_mode);
    }

    #[test]
    fn search_filters_the_surah_list() {
        let (mut model, _dir) = test_model();
        load_mock_lists(&mut model);
        assert_eq!(model.filtered_surah_indices().len(), 3);

        model.surah_filter = "Baqara".to_string();
        let indices = model.filtered_surah_indices();
        assert_eq!(indices, vec![1]);
    }

    #[test]
    fn first_reciter_becomes_active_by_default() {
        let (mut model, _dir) = test_model();
        load_mock_lists(&mut model);
        assert_eq!(model.active_reciter, Some(0));
        assert_eq!(model.active_reciter_id().as_deref(), Some("1"));
    }

    #[test]
    fn page_text_appends_verse_numbers() {
        let page = MockPageService.load_page(1).unwrap();
        let text = page_text(&page);
        assert!(text.contains('﴿'));
        assert!(text.ends_with("﴿1﴾"));
    }
}

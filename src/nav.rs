use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::mushaf;
use crate::quran::Surah;

/// Characters escaped inside query values.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'&')
    .add(b'=')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'?');

/// Navigation state. The route is the single source of truth for the
/// current page and the optional selected-surah marker; nothing else holds
/// a copy of either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub page: u16,
    pub surah: Option<String>,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            page: 1,
            surah: None,
        }
    }
}

impl Route {
    /// Parses `page=..&surah=..` query state. A missing, unparseable, or
    /// out-of-bounds page value silently becomes page 1; it is never an
    /// error.
    pub fn parse(query: &str) -> Self {
        let mut route = Route::default();
        for pair in query.trim_start_matches('?').split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let raw = parts.next().unwrap_or_default();
            let value = percent_decode_str(raw)
                .decode_utf8()
                .map(|decoded| decoded.into_owned())
                .unwrap_or_default();
            match key {
                "page" => {
                    if let Ok(page) = value.parse::<i64>() {
                        if mushaf::is_valid_page(page) {
                            route.page = page as u16;
                        }
                    }
                }
                "surah" => {
                    if !value.is_empty() {
                        route.surah = Some(value);
                    }
                }
                _ => {}
            }
        }
        route
    }

    pub fn to_query(&self) -> String {
        let mut query = String::new();
        if let Some(surah) = &self.surah {
            query.push_str("surah=");
            query.extend(utf8_percent_encode(surah, QUERY_VALUE));
            query.push('&');
        }
        query.push_str("page=");
        query.push_str(&self.page.to_string());
        query
    }
}

pub struct Navigator {
    route: Route,
}

impl Navigator {
    pub fn new(route: Route) -> Self {
        Self { route }
    }

    pub fn from_query(query: &str) -> Self {
        Self::new(Route::parse(query))
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn page_number(&self) -> u16 {
        self.route.page
    }

    pub fn surah_marker(&self) -> Option<&str> {
        self.route.surah.as_deref()
    }

    /// Moves to `target`. Targets outside 1..=604 are ignored, not errors.
    /// Returns the page to fetch, only when the page number changed —
    /// every accepted change triggers exactly one fetch downstream.
    pub fn go_to_page(&mut self, target: i64) -> Option<u16> {
        if !mushaf::is_valid_page(target) {
            return None;
        }
        let target = target as u16;
        if target == self.route.page {
            return None;
        }
        self.route.page = target;
        Some(target)
    }

    /// Selects a surah: marker and page move together in one transition.
    pub fn select_surah(&mut self, surah: &Surah) -> Option<u16> {
        let start = mushaf::start_page_of(i64::from(surah.number));
        self.route.surah = Some(surah.number.to_string());
        if start == self.route.page {
            return None;
        }
        self.route.page = start;
        Some(start)
    }

    /// Drops the surah marker, leaving the page untouched.
    pub fn clear_surah(&mut self) {
        self.route.surah = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quran::RevelationPlace;

    fn surah(number: u16) -> Surah {
        Surah {
            number,
            name: String::new(),
            english_name: String::new(),
            english_name_translation: String::new(),
            number_of_ayahs: 0,
            revelation_type: RevelationPlace::Medinan,
        }
    }

    #[test]
    fn parse_defaults_to_page_one() {
        assert_eq!(Route::parse("").page, 1);
        assert_eq!(Route::parse("page=").page, 1);
        assert_eq!(Route::parse("page=abc").page, 1);
        assert_eq!(Route::parse("page=0").page, 1);
        assert_eq!(Route::parse("page=605").page, 1);
        assert_eq!(Route::parse("surah=2").page, 1);
    }

    #[test]
    fn parse_reads_both_params() {
        let route = Route::parse("?surah=3&page=50");
        assert_eq!(route.page, 50);
        assert_eq!(route.surah.as_deref(), Some("3"));
    }

    #[test]
    fn query_round_trips() {
        let route = Route {
            page: 50,
            surah: Some("3".into()),
        };
        assert_eq!(Route::parse(&route.to_query()), route);

        let bare = Route {
            page: 7,
            surah: None,
        };
        assert_eq!(bare.to_query(), "page=7");
        assert_eq!(Route::parse(&bare.to_query()), bare);
    }

    #[test]
    fn go_to_page_ignores_out_of_bounds_targets() {
        let mut nav = Navigator::new(Route::default());
        assert_eq!(nav.go_to_page(0), None);
        assert_eq!(nav.go_to_page(-1), None);
        assert_eq!(nav.go_to_page(605), None);
        assert_eq!(nav.page_number(), 1);
    }

    #[test]
    fn go_to_page_reports_only_real_changes() {
        let mut nav = Navigator::new(Route::default());
        assert_eq!(nav.go_to_page(50), Some(50));
        assert_eq!(nav.page_number(), 50);
        assert_eq!(nav.go_to_page(50), None);
    }

    #[test]
    fn select_surah_sets_marker_and_page_together() {
        let mut nav = Navigator::new(Route::default());
        let fetch = nav.select_surah(&surah(3));
        assert_eq!(fetch, Some(50));
        assert_eq!(nav.page_number(), 50);
        assert_eq!(nav.surah_marker(), Some("3"));
    }

    #[test]
    fn select_surah_on_its_start_page_sets_marker_without_a_fetch() {
        let mut nav = Navigator::new(Route {
            page: 50,
            surah: None,
        });
        assert_eq!(nav.select_surah(&surah(3)), None);
        assert_eq!(nav.surah_marker(), Some("3"));
        assert_eq!(nav.page_number(), 50);
    }

    #[test]
    fn clear_surah_keeps_the_page() {
        let mut nav = Navigator::from_query("surah=3&page=50");
        nav.clear_surah();
        assert_eq!(nav.surah_marker(), None);
        assert_eq!(nav.page_number(), 50);
    }
}

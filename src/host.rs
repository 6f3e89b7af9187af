// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Navigation host for the session manager.
//!
//! The session manager never touches a window or a terminal directly; it
//! reads the current location and asks the host to navigate, to rewrite the
//! visible URL without a history entry, or to reload.

use std::sync::Mutex;
use url::Url;

/// The page location and history the session manager drives.
pub trait Navigator: Send + Sync {
    /// URL currently shown, including any fragment.
    fn current_url(&self) -> Url;

    /// Replace the visible URL without creating a navigation entry.
    fn replace_url(&self, url: &Url);

    /// Full navigation away from the application.
    fn navigate(&self, url: &Url);

    /// Discard all in-memory state and start the application again.
    fn reload(&self);
}

/// Origin (`scheme://host[:port]`) of a URL, as used for `redirect_uri`.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[derive(Debug)]
struct History {
    current: Url,
    navigations: Vec<Url>,
    replacements: usize,
    reloads: usize,
}

/// In-memory navigator that records what it was asked to do.
#[derive(Debug)]
pub struct RecordingNavigator {
    history: Mutex<History>,
}

impl RecordingNavigator {
    pub fn new(start: Url) -> Self {
        Self {
            history: Mutex::new(History {
                current: start,
                navigations: Vec::new(),
                replacements: 0,
                reloads: 0,
            }),
        }
    }

    /// Parse `start` and build a navigator positioned there.
    pub fn at(start: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(start)?))
    }

    fn history(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the identity provider sending the browser back to `url`.
    pub fn land_on(&self, url: Url) {
        self.history().current = url;
    }

    pub fn navigations(&self) -> Vec<Url> {
        self.history().navigations.clone()
    }

    pub fn replacements(&self) -> usize {
        self.history().replacements
    }

    pub fn reloads(&self) -> usize {
        self.history().reloads
    }
}

impl Navigator for RecordingNavigator {
    fn current_url(&self) -> Url {
        self.history().current.clone()
    }

    fn replace_url(&self, url: &Url) {
        let mut history = self.history();
        history.current = url.clone();
        history.replacements += 1;
    }

    fn navigate(&self, url: &Url) {
        let mut history = self.history();
        history.navigations.push(url.clone());
        history.current = url.clone();
    }

    fn reload(&self) {
        self.history().reloads += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_drops_path_query_and_fragment() {
        let url = Url::parse("https://awards.example.com:8443/ballot?x=1#frag").unwrap();
        assert_eq!(origin_of(&url), "https://awards.example.com:8443");

        let url = Url::parse("http://localhost:5173/").unwrap();
        assert_eq!(origin_of(&url), "http://localhost:5173");
    }

    #[test]
    fn test_recording_navigator_tracks_replacements() {
        let nav = RecordingNavigator::at("http://localhost:5173/#access_token=x").unwrap();
        let mut clean = nav.current_url();
        clean.set_fragment(None);
        nav.replace_url(&clean);

        assert_eq!(nav.current_url().as_str(), "http://localhost:5173/");
        assert_eq!(nav.replacements(), 1);
        assert!(nav.navigations().is_empty());
    }
}

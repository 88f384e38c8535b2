use serde::Serialize;
use std::fmt;

/// Pages of the funnel the presentation layer can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    #[serde(rename = "/")]
    Home,
    #[serde(rename = "/eligibility")]
    Eligibility,
    #[serde(rename = "/apply")]
    Application,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Eligibility => "/eligibility",
            Route::Application => "/apply",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Result of a step's entry guard.
///
/// The step never navigates by itself; the caller renders `Ready` or
/// follows `Redirect`.
#[derive(Debug)]
pub enum Entry<T> {
    Ready(T),
    Redirect(Route),
}

impl<T> Entry<T> {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Entry::Redirect(_))
    }
}

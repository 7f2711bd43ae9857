//! Verified-session context and page navigation seam
//!
//! The identifier of the last successfully verified subject gates access to
//! the exam page. It lives in an explicit [`SessionContext`] owned by the
//! caller rather than in ambient storage.

/// Pages the navigation layer can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Enrollment and verification page
    Enrollment,
    /// Gated page, only reachable after verification
    Exam,
}

/// Page transitions, implemented by the UI shell.
pub trait Navigator: Send + Sync {
    fn navigate(&self, page: Page);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Verification required first")]
    NotVerified,
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    identifier: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully verified identifier.
    pub fn establish(&mut self, identifier: impl Into<String>) {
        self.identifier = Some(identifier.into());
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Identifier for a gated page load.
    pub fn require_verified(&self) -> Result<&str, SessionError> {
        self.identifier().ok_or(SessionError::NotVerified)
    }
}

/// Gate a page load: returns the verified identifier, or sends the user back
/// to enrollment.
pub fn enter_gated<'a>(session: &'a SessionContext, navigator: &dyn Navigator) -> Option<&'a str> {
    match session.require_verified() {
        Ok(identifier) => Some(identifier),
        Err(e) => {
            log::warn!("Gated page refused: {}", e);
            navigator.navigate(Page::Enrollment);
            None
        }
    }
}

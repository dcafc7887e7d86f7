use crate::client::OsfTransport;
use crate::error::MirrorError;

/// Outcome of probing a file's download link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anonymous download works; the link itself is the download URL.
    Public(String),
    /// Gated, but the token unlocked a real download location.
    PrivateResolved(String),
    /// Gated and the token was refused. The file cannot be mirrored.
    PrivateDenied,
}

impl Access {
    pub fn download_url(&self) -> Option<&str> {
        match self {
            Access::Public(url) | Access::PrivateResolved(url) => Some(url),
            Access::PrivateDenied => None,
        }
    }
}

/// OSF serves public and private files from the same download endpoint; only the redirect
/// target of a live request tells them apart.
#[derive(Debug, Clone, Copy)]
pub struct AccessResolver<'a, T> {
    transport: T,
    login_url: &'a str,
}

impl<'a, T: OsfTransport> AccessResolver<'a, T> {
    pub fn new(transport: T, login_url: &'a str) -> Self {
        Self {
            transport,
            login_url,
        }
    }

    pub fn resolve(&self, download_link: &str) -> Result<Access, MirrorError> {
        let anonymous = self.transport.redirect_target(download_link, false)?;
        if !self.is_login(anonymous.as_deref()) {
            return Ok(Access::Public(download_link.to_string()));
        }

        let authorized = self.transport.redirect_target(download_link, true)?;
        if self.is_login(authorized.as_deref()) {
            return Ok(Access::PrivateDenied);
        }
        Ok(Access::PrivateResolved(
            authorized.unwrap_or_else(|| download_link.to_string()),
        ))
    }

    fn is_login(&self, target: Option<&str>) -> bool {
        target
            .map(|location| location.contains(self.login_url))
            .unwrap_or(false)
    }
}

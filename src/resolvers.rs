//! Reading document bytes for a given URL.
//!
//! Resolvers are plugins selected at runtime: every candidate declares
//! whether it can read a URL, candidates are sorted by `order`, and each is
//! tried until one succeeds. The built-in filesystem and HTTP resolvers are
//! gated behind the `resolve-file` and `resolve-http` features.
use std::sync::Arc;

use crate::{error::BoxError, Error, FileInfo};

/// Trait for reading raw document bytes from a location.
pub trait Resolve: Send + Sync {
    /// Position of this resolver among all candidates; lower runs first.
    fn order(&self) -> i32 {
        100
    }
    /// Whether this resolver can read the given location.
    fn can_read(&self, file: &FileInfo) -> bool;
    /// Read the document bytes.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped with the offending URL by the registry.
    fn read(&self, file: &FileInfo) -> Result<Vec<u8>, BoxError>;
}

/// Try all matching resolvers in `order`; first successful read wins.
pub(crate) fn read_file(resolvers: &[Arc<dyn Resolve>], file: &FileInfo) -> Result<Vec<u8>, Error> {
    let mut candidates: Vec<&Arc<dyn Resolve>> = resolvers
        .iter()
        .filter(|resolver| resolver.can_read(file))
        .collect();
    candidates.sort_by_key(|resolver| resolver.order());
    if candidates.is_empty() {
        return Err(Error::unmatched_resolver(file.url().as_str()));
    }
    let mut last_error = None;
    for resolver in candidates {
        match resolver.read(file) {
            Ok(data) => return Ok(data),
            Err(error) => last_error = Some(Error::resolver(file.url().as_str(), error)),
        }
    }
    Err(last_error.expect("At least one candidate was tried"))
}

/// Reads `file:` URLs from the local filesystem.
#[cfg(feature = "resolve-file")]
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    pub order: i32,
}

#[cfg(feature = "resolve-file")]
impl Default for FileSystemResolver {
    fn default() -> Self {
        Self { order: 100 }
    }
}

#[cfg(feature = "resolve-file")]
impl Resolve for FileSystemResolver {
    fn order(&self) -> i32 {
        self.order
    }
    fn can_read(&self, file: &FileInfo) -> bool {
        file.url().scheme() == "file"
    }
    fn read(&self, file: &FileInfo) -> Result<Vec<u8>, BoxError> {
        let path = file
            .url()
            .to_file_path()
            .map_err(|()| format!("'{}' is not a local file path", file.url()))?;
        Ok(std::fs::read(path)?)
    }
}

/// Fetches `http(s):` URLs with a GET request, following redirects manually
/// so the chain can be bounded and reported.
#[cfg(feature = "resolve-http")]
#[derive(Debug, Clone)]
pub struct HttpResolver {
    pub order: i32,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    pub timeout: std::time::Duration,
    /// Maximum number of redirects to follow before failing.
    pub redirects: u32,
    /// Browser-style credentials flag, passed through for agents that
    /// understand it; the native client has no equivalent.
    pub with_credentials: bool,
}

#[cfg(feature = "resolve-http")]
impl Default for HttpResolver {
    fn default() -> Self {
        Self {
            order: 200,
            headers: Vec::new(),
            timeout: std::time::Duration::from_secs(60),
            redirects: 5,
            with_credentials: false,
        }
    }
}

#[cfg(feature = "resolve-http")]
impl Resolve for HttpResolver {
    fn order(&self) -> i32 {
        self.order
    }
    fn can_read(&self, file: &FileInfo) -> bool {
        matches!(file.url().scheme(), "http" | "https")
    }
    fn read(&self, file: &FileInfo) -> Result<Vec<u8>, BoxError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.timeout)
            .build()?;
        let mut current = file.url().clone();
        let mut chain = vec![current.to_string()];
        loop {
            let mut request = client.get(current.as_str());
            for (name, value) in &self.headers {
                request = request.header(name, value);
            }
            let response = request.send()?;
            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .ok_or_else(|| format!("HTTP {status} from {current} without a Location header"))?
                    .to_str()?;
                let next = crate::uri::resolve_against(&current, location)?;
                chain.push(next.to_string());
                if chain.len() - 1 > self.redirects as usize {
                    return Err(format!(
                        "Exceeded maximum of {} redirects: {}",
                        self.redirects,
                        chain.join(" -> ")
                    )
                    .into());
                }
                tracing::debug!(from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }
            if status.as_u16() >= 400 {
                return Err(format!("HTTP {status} while fetching {current}").into());
            }
            return Ok(response.bytes()?.to_vec());
        }
    }
}

//! Normalization of location strings into absolute URLs.
//!
//! Accepted inputs are filesystem paths (POSIX, Windows drive-letter, UNC),
//! `file:` URLs, `http(s):` URLs, and bare `#` fragments. Relative inputs are
//! joined against a current working directory expressed as a `file:` URL
//! ending in `/`.
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::Error;

/// Scheme classification of a document location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathType {
    File,
    Http,
    Https,
}

/// Fallback base when no working directory is available (e.g. values parsed
/// from memory without an explicit base URL).
pub(crate) static DEFAULT_ROOT_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("file:///").expect("Invalid URL"));

// Characters escaped when a raw filesystem path is embedded into a `file:`
// URL. `%` is deliberately absent: pre-encoded input is preserved as-is.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Turn a location string into an absolute, normalized URL.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the input cannot be represented as an
/// absolute URL.
pub fn parse(input: &str, cwd: &Url) -> Result<Url, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(cwd.clone());
    }
    if input.starts_with('#') {
        return cwd
            .join(input)
            .map_err(|error| Error::invalid_url(input, error));
    }
    if is_http(input) || has_scheme(input, "file") {
        return Url::parse(input).map_err(|error| Error::invalid_url(input, error));
    }
    // Filesystem path. `#` separates an optional fragment, exactly as in
    // URLs, so a pointer can be attached to a plain path.
    let (path, fragment) = match input.find('#') {
        Some(idx) => (&input[..idx], Some(&input[idx + 1..])),
        None => (input, None),
    };
    let mut url = if is_windows_drive_path(path) {
        let path = path.replace('\\', "/");
        let url = format!("file:///{}", utf8_percent_encode(&path, PATH_ESCAPE));
        Url::parse(&url).map_err(|error| Error::invalid_url(input, error))?
    } else if let Some(unc) = path.strip_prefix(r"\\") {
        let unc = unc.replace('\\', "/");
        let (host, rest) = unc.split_once('/').unwrap_or((unc.as_str(), ""));
        let url = format!("file://{}/{}", host, utf8_percent_encode(rest, PATH_ESCAPE));
        Url::parse(&url).map_err(|error| Error::invalid_url(input, error))?
    } else if path.starts_with('/') {
        let url = format!("file://{}", utf8_percent_encode(path, PATH_ESCAPE));
        Url::parse(&url).map_err(|error| Error::invalid_url(input, error))?
    } else {
        let encoded = utf8_percent_encode(path, PATH_ESCAPE).to_string();
        cwd.join(&encoded)
            .map_err(|error| Error::invalid_url(input, error))?
    };
    if let Some(fragment) = fragment {
        url.set_fragment(Some(fragment));
    }
    Ok(url)
}

/// RFC 3986 reference resolution against a base URL.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the reference is not a valid URL
/// reference.
pub fn resolve_against(base: &Url, reference: &str) -> Result<Url, Error> {
    base.join(reference)
        .map_err(|error| Error::invalid_url(reference, error))
}

/// The `#…` tail of a location string, or `#` if it has none.
#[must_use]
pub fn get_hash(input: &str) -> &str {
    match input.find('#') {
        Some(idx) => &input[idx..],
        None => "#",
    }
}

/// Everything before the `#` of a location string.
#[must_use]
pub fn strip_hash(input: &str) -> &str {
    match input.find('#') {
        Some(idx) => &input[..idx],
        None => input,
    }
}

/// The lowercased extension of the last path segment, including the dot.
#[must_use]
pub fn get_extension(input: &str) -> String {
    let path = strip_hash(input);
    let path = match path.find('?') {
        Some(idx) => &path[..idx],
        None => path,
    };
    let segment = path
        .rsplit(|ch| ch == '/' || ch == '\\')
        .next()
        .unwrap_or(path);
    match segment.rfind('.') {
        Some(idx) if idx > 0 => segment[idx..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Whether the location is an `http://` or `https://` URL.
#[must_use]
pub fn is_http(input: &str) -> bool {
    has_scheme(input, "http") || has_scheme(input, "https")
}

/// Whether the location is a filesystem path (no scheme, a drive-letter or
/// UNC path, or a `file:` URL).
#[must_use]
pub fn is_file_system_path(input: &str) -> bool {
    if input.starts_with('#') || is_http(input) {
        return false;
    }
    if has_scheme(input, "file") || is_windows_drive_path(input) || input.starts_with(r"\\") {
        return true;
    }
    // Any other explicit `scheme://` is not a local path.
    scheme_of(input).is_none()
}

/// Classify an absolute URL by scheme. Anything that is not `http(s)` reads
/// through the filesystem resolver.
#[must_use]
pub fn path_type(url: &Url) -> PathType {
    match url.scheme() {
        "http" => PathType::Http,
        "https" => PathType::Https,
        _ => PathType::File,
    }
}

/// The process working directory as a `file:` URL ending in `/`.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined or is not
/// representable as a URL.
pub fn cwd() -> Result<Url, Error> {
    let dir = std::env::current_dir().map_err(Error::current_dir)?;
    Url::from_directory_path(&dir).map_err(|()| Error::unrepresentable_path(dir.display().to_string()))
}

/// Split a URL into its fragment-free document URL and the raw fragment.
pub(crate) fn split_fragment(url: &Url) -> (Url, String) {
    let fragment = url.fragment().unwrap_or("").to_string();
    let mut url = url.clone();
    url.set_fragment(None);
    (url, fragment)
}

fn is_windows_drive_path(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

fn has_scheme(input: &str, scheme: &str) -> bool {
    input.len() > scheme.len()
        && input.as_bytes()[scheme.len()] == b':'
        && input[..scheme.len()].eq_ignore_ascii_case(scheme)
}

// A scheme is only recognized when followed by `//`, so that Windows drive
// letters are not mistaken for one-letter schemes.
fn scheme_of(input: &str) -> Option<&str> {
    let (scheme, rest) = input.split_once(':')?;
    if !rest.starts_with("//") || scheme.is_empty() {
        return None;
    }
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

use url::Url;

use crate::uri;

/// Location metadata handed to resolvers and parsers.
///
/// The document bytes produced by a resolver travel next to this descriptor
/// rather than inside it, so the descriptor stays cheap to share between
/// registry candidates.
#[derive(Debug, Clone)]
pub struct FileInfo {
    url: Url,
    extension: String,
}

impl FileInfo {
    pub(crate) fn new(url: Url) -> FileInfo {
        let extension = uri::get_extension(url.path());
        FileInfo { url, extension }
    }
    /// Absolute, fragment-free URL of the document.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
    /// Lowercased extension of the last path segment, including the dot, or
    /// an empty string.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::FileInfo;

    #[test]
    fn test_extension_from_url() {
        let url = Url::parse("http://example.com/specs/Schema.JSON?v=1").expect("Invalid URL");
        let file = FileInfo::new(url);
        assert_eq!(file.extension(), ".json");
        let url = Url::parse("file:///specs/Makefile").expect("Invalid URL");
        assert_eq!(FileInfo::new(url).extension(), "");
    }
}

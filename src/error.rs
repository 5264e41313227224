use core::fmt;

/// Failures reported by resolver and parser plugins.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while resolving, dereferencing, or bundling documents.
#[derive(Debug)]
pub enum Error {
    /// A resolver matched the URL but failed to read it.
    Resolver { url: String, source: BoxError },
    /// No resolver declared that it can read the URL.
    UnmatchedResolver { url: String },
    /// A parser failed to turn the document bytes into a value.
    Parser { url: String, source: BoxError },
    /// No parser was available for the document.
    UnmatchedParser { url: String },
    /// A JSON Pointer leads to a part of a document that does not exist.
    MissingPointer { url: String, pointer: String },
    /// A syntactically invalid JSON Pointer was encountered.
    InvalidPointer { pointer: String },
    /// A circular reference was found while circular references are rejected.
    CircularReference { pointer: String },
    /// A location string could not be turned into an absolute URL.
    InvalidUrl {
        input: String,
        source: Option<url::ParseError>,
    },
    /// The process working directory could not be determined.
    CurrentDir { source: std::io::Error },
}

impl Error {
    pub(crate) fn resolver(url: impl Into<String>, source: impl Into<BoxError>) -> Error {
        Error::Resolver {
            url: url.into(),
            source: source.into(),
        }
    }
    pub(crate) fn unmatched_resolver(url: impl Into<String>) -> Error {
        Error::UnmatchedResolver { url: url.into() }
    }
    pub(crate) fn parser(url: impl Into<String>, source: impl Into<BoxError>) -> Error {
        Error::Parser {
            url: url.into(),
            source: source.into(),
        }
    }
    pub(crate) fn unmatched_parser(url: impl Into<String>) -> Error {
        Error::UnmatchedParser { url: url.into() }
    }
    pub(crate) fn missing_pointer(url: impl Into<String>, pointer: impl Into<String>) -> Error {
        Error::MissingPointer {
            url: url.into(),
            pointer: pointer.into(),
        }
    }
    pub(crate) fn invalid_pointer(pointer: impl Into<String>) -> Error {
        Error::InvalidPointer {
            pointer: pointer.into(),
        }
    }
    pub(crate) fn circular_reference(pointer: impl Into<String>) -> Error {
        Error::CircularReference {
            pointer: pointer.into(),
        }
    }
    pub(crate) fn invalid_url(input: impl Into<String>, source: url::ParseError) -> Error {
        Error::InvalidUrl {
            input: input.into(),
            source: Some(source),
        }
    }
    pub(crate) fn unrepresentable_path(input: impl Into<String>) -> Error {
        Error::InvalidUrl {
            input: input.into(),
            source: None,
        }
    }
    pub(crate) fn current_dir(source: std::io::Error) -> Error {
        Error::CurrentDir { source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Resolver { url, source } => {
                f.write_fmt(format_args!("Failed to read '{url}': {source}"))
            }
            Error::UnmatchedResolver { url } => {
                f.write_fmt(format_args!("No resolver can read '{url}'"))
            }
            Error::Parser { url, source } => {
                f.write_fmt(format_args!("Failed to parse '{url}': {source}"))
            }
            Error::UnmatchedParser { url } => {
                f.write_fmt(format_args!("No parser can process '{url}'"))
            }
            Error::MissingPointer { url, pointer } => {
                if url.is_empty() {
                    f.write_fmt(format_args!("Pointer '{pointer}' does not exist"))
                } else {
                    f.write_fmt(format_args!("Pointer '{pointer}' does not exist in '{url}'"))
                }
            }
            Error::InvalidPointer { pointer } => {
                f.write_fmt(format_args!("Invalid JSON Pointer '{pointer}'"))
            }
            Error::CircularReference { pointer } => f.write_fmt(format_args!(
                "Circular reference detected at '{pointer}' while circular references are not allowed"
            )),
            Error::InvalidUrl { input, source } => {
                if let Some(source) = source {
                    f.write_fmt(format_args!("Invalid URL '{input}': {source}"))
                } else {
                    f.write_fmt(format_args!("'{input}' cannot be represented as a URL"))
                }
            }
            Error::CurrentDir { .. } => {
                f.write_str("Failed to determine the current working directory")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Resolver { source, .. } | Error::Parser { source, .. } => Some(&**source),
            Error::InvalidUrl { source, .. } => source
                .as_ref()
                .map(|source| source as &(dyn std::error::Error + 'static)),
            Error::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::Error;

    #[test]
    fn test_display_carries_context() {
        let error = Error::missing_pointer("file:///schemas/root.yaml", "/definitions/name");
        assert_eq!(
            error.to_string(),
            "Pointer '/definitions/name' does not exist in 'file:///schemas/root.yaml'"
        );
        let error = Error::unmatched_resolver("ftp://example.com/schema.json");
        assert_eq!(
            error.to_string(),
            "No resolver can read 'ftp://example.com/schema.json'"
        );
    }

    #[test]
    fn test_source_chain() {
        let error = Error::parser("file:///a.yaml", "unexpected end of input");
        assert_eq!(
            error.to_string(),
            "Failed to parse 'file:///a.yaml': unexpected end of input"
        );
        assert!(error.source().is_some());
        assert!(Error::invalid_pointer("a/b").source().is_none());
    }
}

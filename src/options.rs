//! Configuration for parse, resolve, dereference, and bundle operations.
use std::sync::Arc;

use serde_json::Value;
use url::Url;

#[cfg(feature = "resolve-http")]
use crate::resolvers::HttpResolver;
#[cfg(feature = "resolve-file")]
use crate::resolvers::FileSystemResolver;
use crate::{
    bundle, crawl,
    crawl::Source,
    dereference,
    dereference::{CircularPolicy, Dereferenced},
    parsers::{BinaryParser, Parse, TextParser, YamlParser},
    resolvers::Resolve,
    Catalog, Error,
};

/// Options for a single top-level operation.
///
/// Built fluent-style starting from [`crate::options()`]:
///
/// ```rust
/// use refbundle::CircularPolicy;
///
/// let options = refbundle::options()
///     .external(false)
///     .circular(CircularPolicy::Ignore);
/// ```
pub struct Options {
    pub(crate) cwd: Option<Url>,
    pub(crate) external: bool,
    pub(crate) continue_on_error: bool,
    pub(crate) circular: CircularPolicy,
    #[cfg(feature = "resolve-file")]
    file_resolver: Option<FileSystemResolver>,
    #[cfg(feature = "resolve-http")]
    http_resolver: Option<HttpResolver>,
    custom_resolvers: Vec<Arc<dyn Resolve>>,
    yaml_parser: Option<YamlParser>,
    text_parser: Option<TextParser>,
    binary_parser: Option<BinaryParser>,
    custom_parsers: Vec<Arc<dyn Parse>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cwd: None,
            external: true,
            continue_on_error: false,
            circular: CircularPolicy::Share,
            #[cfg(feature = "resolve-file")]
            file_resolver: Some(FileSystemResolver::default()),
            #[cfg(feature = "resolve-http")]
            http_resolver: Some(HttpResolver::default()),
            custom_resolvers: Vec::new(),
            yaml_parser: Some(YamlParser::default()),
            text_parser: Some(TextParser::default()),
            binary_parser: Some(BinaryParser::default()),
            custom_parsers: Vec::new(),
        }
    }
}

impl Options {
    /// Base `file:` URL (ending in `/`) against which relative locations are
    /// resolved. Defaults to the process working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: Url) -> Self {
        self.cwd = Some(cwd);
        self
    }
    /// Whether references into other documents are resolved at all. With
    /// `false`, only the root document is read and external `$ref`s are
    /// left untouched.
    #[must_use]
    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }
    /// Attach read/parse failures to catalog entries and keep going instead
    /// of failing fast. A failing root document is always fatal.
    #[must_use]
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
    /// How the dereferencer treats circular references.
    #[must_use]
    pub fn circular(mut self, circular: CircularPolicy) -> Self {
        self.circular = circular;
        self
    }
    /// Register a custom resolver next to the built-in ones.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.custom_resolvers.push(resolver);
        self
    }
    /// Register a custom parser next to the built-in ones.
    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn Parse>) -> Self {
        self.custom_parsers.push(parser);
        self
    }
    /// Replace or disable the built-in filesystem resolver.
    #[cfg(feature = "resolve-file")]
    #[must_use]
    pub fn file_resolver(mut self, resolver: Option<FileSystemResolver>) -> Self {
        self.file_resolver = resolver;
        self
    }
    /// Replace or disable the built-in HTTP resolver.
    #[cfg(feature = "resolve-http")]
    #[must_use]
    pub fn http_resolver(mut self, resolver: Option<HttpResolver>) -> Self {
        self.http_resolver = resolver;
        self
    }
    /// Replace or disable the built-in YAML/JSON parser.
    #[must_use]
    pub fn yaml_parser(mut self, parser: Option<YamlParser>) -> Self {
        self.yaml_parser = parser;
        self
    }
    /// Replace or disable the built-in text parser.
    #[must_use]
    pub fn text_parser(mut self, parser: Option<TextParser>) -> Self {
        self.text_parser = parser;
        self
    }
    /// Replace or disable the built-in binary parser.
    #[must_use]
    pub fn binary_parser(mut self, parser: Option<BinaryParser>) -> Self {
        self.binary_parser = parser;
        self
    }
    /// Append a header to every HTTP request.
    #[cfg(feature = "resolve-http")]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(http) = &mut self.http_resolver {
            http.headers.push((name.into(), value.into()));
        }
        self
    }
    /// Timeout for a single HTTP read.
    #[cfg(feature = "resolve-http")]
    #[must_use]
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        if let Some(http) = &mut self.http_resolver {
            http.timeout = timeout;
        }
        self
    }
    /// Maximum number of HTTP redirects to follow.
    #[cfg(feature = "resolve-http")]
    #[must_use]
    pub fn redirects(mut self, redirects: u32) -> Self {
        if let Some(http) = &mut self.http_resolver {
            http.redirects = redirects;
        }
        self
    }
    /// Browser-style credentials flag for HTTP reads.
    #[cfg(feature = "resolve-http")]
    #[must_use]
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        if let Some(http) = &mut self.http_resolver {
            http.with_credentials = with_credentials;
        }
        self
    }
    /// Zero-byte document policy for all built-in parsers.
    #[must_use]
    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        if let Some(yaml) = &mut self.yaml_parser {
            yaml.allow_empty = allow_empty;
        }
        if let Some(text) = &mut self.text_parser {
            text.allow_empty = allow_empty;
        }
        if let Some(binary) = &mut self.binary_parser {
            binary.allow_empty = allow_empty;
        }
        self
    }

    /// Parse the root document and return its value, `$ref`s intact.
    ///
    /// # Errors
    ///
    /// Fails when the root document cannot be located, read, or parsed.
    pub fn parse(&self, location: &str) -> Result<Value, Error> {
        let (catalog, url) = crawl::load_root(self, Source::Location(location))?;
        Ok(catalog.get(&url).expect("Root is always present").value().clone())
    }
    /// Like [`Options::parse`], for an already-parsed value with a base URL.
    ///
    /// # Errors
    ///
    /// Fails when the base URL is invalid.
    pub fn parse_value(&self, base: &str, value: Value) -> Result<Value, Error> {
        let (catalog, url) = crawl::load_root(self, Source::Value { base, value })?;
        Ok(catalog.get(&url).expect("Root is always present").value().clone())
    }
    /// Resolve the root document and everything it transitively references.
    ///
    /// # Errors
    ///
    /// Fails when a referenced document cannot be read or parsed, unless
    /// `continue_on_error` is set.
    pub fn resolve(&self, location: &str) -> Result<Catalog, Error> {
        let (catalog, _) = crawl::load(self, Source::Location(location))?;
        Ok(catalog)
    }
    /// Like [`Options::resolve`], for an already-parsed value.
    ///
    /// # Errors
    ///
    /// See [`Options::resolve`].
    pub fn resolve_value(&self, base: &str, value: Value) -> Result<Catalog, Error> {
        let (catalog, _) = crawl::load(self, Source::Value { base, value })?;
        Ok(catalog)
    }
    /// Resolve, then replace every `$ref` node by the target it points to.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable documents or pointers, and on circular
    /// references under [`CircularPolicy::Reject`].
    pub fn dereference(&self, location: &str) -> Result<Dereferenced, Error> {
        let (catalog, url) = crawl::load(self, Source::Location(location))?;
        dereference::dereference(catalog, &url, self)
    }
    /// Like [`Options::dereference`], for an already-parsed value.
    ///
    /// # Errors
    ///
    /// See [`Options::dereference`].
    pub fn dereference_value(&self, base: &str, value: Value) -> Result<Dereferenced, Error> {
        let (catalog, url) = crawl::load(self, Source::Value { base, value })?;
        dereference::dereference(catalog, &url, self)
    }
    /// Resolve, then inline every external target into the root and rewrite
    /// `$ref` values to local pointers.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable documents or pointers.
    pub fn bundle(&self, location: &str) -> Result<Value, Error> {
        let (catalog, url) = crawl::load(self, Source::Location(location))?;
        bundle::bundle(&catalog, &url, self)
    }
    /// Like [`Options::bundle`], for an already-parsed value.
    ///
    /// # Errors
    ///
    /// See [`Options::bundle`].
    pub fn bundle_value(&self, base: &str, value: Value) -> Result<Value, Error> {
        let (catalog, url) = crawl::load(self, Source::Value { base, value })?;
        bundle::bundle(&catalog, &url, self)
    }

    pub(crate) fn resolvers(&self) -> Vec<Arc<dyn Resolve>> {
        let mut resolvers: Vec<Arc<dyn Resolve>> = self.custom_resolvers.clone();
        #[cfg(feature = "resolve-file")]
        if let Some(file) = &self.file_resolver {
            resolvers.push(Arc::new(file.clone()));
        }
        #[cfg(feature = "resolve-http")]
        if let Some(http) = &self.http_resolver {
            resolvers.push(Arc::new(http.clone()));
        }
        resolvers
    }
    pub(crate) fn parsers(&self) -> Vec<Arc<dyn Parse>> {
        let mut parsers: Vec<Arc<dyn Parse>> = self.custom_parsers.clone();
        if let Some(yaml) = &self.yaml_parser {
            parsers.push(Arc::new(yaml.clone()));
        }
        if let Some(text) = &self.text_parser {
            parsers.push(Arc::new(text.clone()));
        }
        if let Some(binary) = &self.binary_parser {
            parsers.push(Arc::new(binary.clone()));
        }
        parsers
    }
}

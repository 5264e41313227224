//! The catalog of resolved documents, keyed by canonical (fragment-free)
//! URL in discovery order.
use ahash::AHashSet;
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

use crate::{pointer, uri, uri::PathType, Error};

/// Lifecycle of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Discovered but not yet read.
    Pending,
    /// Read, parsed, and crawled.
    Resolved,
    /// Reading or parsing failed; see [`Document::error`].
    Errored,
}

/// A single document tracked by the catalog.
#[derive(Debug)]
pub struct Document {
    url: Url,
    path_type: PathType,
    value: Value,
    status: DocumentStatus,
    error: Option<Error>,
}

impl Document {
    /// Absolute canonical URL of this document.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
    #[must_use]
    pub fn path_type(&self) -> PathType {
        self.path_type
    }
    /// Parsed contents; `Null` until the document is resolved.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
    #[must_use]
    pub fn status(&self) -> DocumentStatus {
        self.status
    }
    /// The read or parse failure, when [`DocumentStatus::Errored`].
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
    /// Value at an RFC 6901 pointer within this document. Nested `$ref`s
    /// are not followed; see `dereference` for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPointer`] when the path does not exist and
    /// [`Error::InvalidPointer`] on a malformed pointer.
    pub fn pointer(&self, ptr: &str) -> Result<&Value, Error> {
        let tokens = pointer::parse(ptr)?;
        pointer::get(&self.value, &tokens, self.url.as_str(), ptr)
    }
}

/// All documents reachable from the root, plus circularity bookkeeping
/// written by the dereferencer.
#[derive(Debug, Default)]
pub struct Catalog {
    docs: IndexMap<Url, Document>,
    circular: bool,
    circular_refs: Vec<String>,
}

impl Catalog {
    pub(crate) fn new() -> Catalog {
        Catalog::default()
    }
    /// Whether the catalog has an entry for the given canonical URL.
    #[must_use]
    pub fn exists(&self, url: &Url) -> bool {
        self.docs.contains_key(url)
    }
    /// Look up a document by its canonical URL.
    #[must_use]
    pub fn get(&self, url: &Url) -> Option<&Document> {
        self.docs.get(url)
    }
    /// All catalog URLs, in discovery order.
    pub fn paths(&self) -> impl Iterator<Item = &Url> {
        self.docs.keys()
    }
    /// Catalog URLs restricted to the given path types.
    pub fn paths_of(&self, kinds: &[PathType]) -> impl Iterator<Item = &Url> + '_ {
        self.values_of(kinds).map(Document::url)
    }
    /// All documents, in discovery order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }
    /// Documents restricted to the given path types.
    pub fn values_of(&self, kinds: &[PathType]) -> impl Iterator<Item = &Document> + '_ {
        let kinds = kinds.to_vec();
        self.docs
            .values()
            .filter(move |doc| kinds.contains(&doc.path_type))
    }
    /// Documents that failed to read or parse under `continue_on_error`.
    pub fn errors(&self) -> impl Iterator<Item = &Document> {
        self.docs
            .values()
            .filter(|doc| doc.status == DocumentStatus::Errored)
    }
    /// Whether the last dereference over this catalog found circular
    /// references.
    #[must_use]
    pub fn circular(&self) -> bool {
        self.circular
    }
    /// Pointers of the `$ref` nodes that formed circular chains during the
    /// last dereference.
    #[must_use]
    pub fn circular_refs(&self) -> &[String] {
        &self.circular_refs
    }

    pub(crate) fn insert_pending(&mut self, url: Url) {
        let path_type = uri::path_type(&url);
        self.docs.insert(
            url.clone(),
            Document {
                url,
                path_type,
                value: Value::Null,
                status: DocumentStatus::Pending,
                error: None,
            },
        );
    }
    pub(crate) fn mark_resolved(&mut self, url: &Url, value: Value) {
        let doc = self.docs.get_mut(url).expect("Entry was inserted first");
        doc.value = value;
        doc.status = DocumentStatus::Resolved;
    }
    pub(crate) fn mark_errored(&mut self, url: &Url, error: Error) {
        let doc = self.docs.get_mut(url).expect("Entry was inserted first");
        doc.status = DocumentStatus::Errored;
        doc.error = Some(error);
    }
    pub(crate) fn set_circular_refs(&mut self, circular_refs: Vec<String>) {
        self.circular = !circular_refs.is_empty();
        self.circular_refs = circular_refs;
    }
    pub(crate) fn is_resolved(&self, url: &Url) -> bool {
        self.get(url)
            .map(|doc| doc.status == DocumentStatus::Resolved)
            .unwrap_or(false)
    }

    /// Walk already-parsed JSON Pointer tokens into a document, following
    /// nested `$ref` values encountered mid-path through the catalog.
    /// Returns the canonical location of the resolved value (the URL of the
    /// document it physically lives in plus its pointer within that
    /// document), next to the value itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPointer`] when the path (or a document it
    /// hops through) does not exist and [`Error::InvalidPointer`] on
    /// malformed pointers.
    pub(crate) fn resolve<'a>(
        &'a self,
        url: &Url,
        tokens: &[String],
    ) -> Result<(Url, String, &'a Value), Error> {
        let joined = pointer::join(tokens);
        let ptr = joined.as_str();
        let mut current_url = url.clone();
        let mut tokens: std::collections::VecDeque<String> = tokens.to_vec().into();
        // Guards interior `$ref`-chain loops; terminal refs are returned
        // as-is, so plain circular documents never trip this.
        let mut seen: AHashSet<(String, String)> = AHashSet::new();
        'documents: loop {
            let doc = self
                .get(&current_url)
                .filter(|doc| doc.status == DocumentStatus::Resolved)
                .ok_or_else(|| Error::missing_pointer(current_url.as_str(), ptr))?;
            let mut value = doc.value();
            let mut consumed = Vec::new();
            loop {
                if tokens.is_empty() {
                    return Ok((current_url, pointer::join(&consumed), value));
                }
                if let Some(reference) = ref_string(value) {
                    let target = uri::resolve_against(&current_url, reference)?;
                    let (next_url, fragment) = uri::split_fragment(&target);
                    let mut next_tokens: std::collections::VecDeque<String> =
                        pointer::parse(&fragment)?.into();
                    next_tokens.extend(tokens.drain(..));
                    let key = (
                        next_url.as_str().to_string(),
                        pointer::join(next_tokens.make_contiguous()),
                    );
                    if !seen.insert(key) {
                        return Err(Error::missing_pointer(current_url.as_str(), ptr));
                    }
                    tokens = next_tokens;
                    current_url = next_url;
                    continue 'documents;
                }
                let token = tokens.pop_front().expect("Checked non-empty");
                value = pointer::step(value, &token, current_url.as_str(), ptr)?;
                consumed.push(token);
            }
        }
    }
}

/// The `$ref` string of a ref node, if the value is one.
pub(crate) fn ref_string(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;

    use super::{Catalog, DocumentStatus};
    use crate::{uri::PathType, Error};

    fn url(s: &str) -> Url {
        Url::parse(s).expect("Invalid URL")
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let root = url("file:///specs/root.yaml");
        catalog.insert_pending(root.clone());
        catalog.mark_resolved(
            &root,
            json!({
                "foo": {"$ref": "other.yaml#/definitions"},
                "local": {"items": [{"x": 1}]}
            }),
        );
        let other = url("file:///specs/other.yaml");
        catalog.insert_pending(other.clone());
        catalog.mark_resolved(
            &other,
            json!({"definitions": {"name": {"type": "string"}}}),
        );
        catalog
    }

    #[test]
    fn test_paths_in_discovery_order() {
        let catalog = catalog();
        let paths: Vec<&str> = catalog.paths().map(Url::as_str).collect();
        assert_eq!(
            paths,
            ["file:///specs/root.yaml", "file:///specs/other.yaml"]
        );
        assert!(catalog.exists(&url("file:///specs/other.yaml")));
        assert_eq!(catalog.paths_of(&[PathType::Http]).count(), 0);
        assert_eq!(catalog.paths_of(&[PathType::File]).count(), 2);
    }

    #[test]
    fn test_values_filtered_by_path_type() {
        let mut catalog = catalog();
        let remote = url("http://example.com/remote.yaml");
        catalog.insert_pending(remote.clone());
        catalog.mark_resolved(&remote, json!({"type": "string"}));

        assert_eq!(catalog.documents().count(), 3);
        let remote_docs: Vec<&str> = catalog
            .values_of(&[PathType::Http, PathType::Https])
            .map(|doc| doc.url().as_str())
            .collect();
        assert_eq!(remote_docs, ["http://example.com/remote.yaml"]);
        assert_eq!(
            catalog
                .values_of(&[PathType::Http])
                .next()
                .expect("One remote document")
                .value(),
            &json!({"type": "string"})
        );
        assert_eq!(catalog.values_of(&[PathType::File]).count(), 2);
    }

    fn tokens(ptr: &str) -> Vec<String> {
        crate::pointer::parse(ptr).expect("Invalid pointer")
    }

    #[test]
    fn test_resolve_plain_pointer() {
        let catalog = catalog();
        let (owner, canonical, value) = catalog
            .resolve(&url("file:///specs/root.yaml"), &tokens("/local/items/0/x"))
            .expect("Should resolve");
        assert_eq!(owner.as_str(), "file:///specs/root.yaml");
        assert_eq!(canonical, "/local/items/0/x");
        assert_eq!(value, &json!(1));
    }

    #[test]
    fn test_resolve_through_nested_ref() {
        // `/foo` is a ref node; stepping *through* it must consult the
        // catalog and continue inside the target document.
        let catalog = catalog();
        let (owner, canonical, value) = catalog
            .resolve(&url("file:///specs/root.yaml"), &tokens("/foo/name/type"))
            .expect("Should resolve");
        assert_eq!(owner.as_str(), "file:///specs/other.yaml");
        assert_eq!(canonical, "/definitions/name/type");
        assert_eq!(value, &json!("string"));
    }

    #[test]
    fn test_resolve_terminal_ref_returned_as_is() {
        let catalog = catalog();
        let (_, _, value) = catalog
            .resolve(&url("file:///specs/root.yaml"), &tokens("/foo"))
            .expect("Should resolve");
        assert_eq!(value, &json!({"$ref": "other.yaml#/definitions"}));
    }

    #[test]
    fn test_document_pointer() {
        let catalog = catalog();
        let doc = catalog
            .get(&url("file:///specs/root.yaml"))
            .expect("Should exist");
        assert_eq!(
            doc.pointer("/local/items/0/x").expect("Should resolve"),
            &json!(1)
        );
        // Plain pointer access does not follow the nested ref.
        assert!(doc.pointer("/foo/name").is_err());
    }

    #[test]
    fn test_resolve_missing() {
        let catalog = catalog();
        let error = catalog
            .resolve(&url("file:///specs/root.yaml"), &tokens("/nope"))
            .expect_err("Should fail");
        assert!(matches!(error, Error::MissingPointer { .. }));
    }

    #[test]
    fn test_errored_entry() {
        let mut catalog = Catalog::new();
        let root = url("file:///specs/root.yaml");
        catalog.insert_pending(root.clone());
        catalog.mark_errored(&root, Error::unmatched_resolver(root.as_str()));
        assert_eq!(
            catalog.get(&root).expect("Should exist").status(),
            DocumentStatus::Errored
        );
        assert_eq!(catalog.errors().count(), 1);
        assert!(!catalog.is_resolved(&root));
    }
}

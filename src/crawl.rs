//! Discovery of transitively referenced documents.
//!
//! Starting from the root, parsed values are walked for `$ref` strings;
//! every undiscovered target document is read through the resolver
//! registry, parsed through the parser registry, and queued for its own
//! walk, until the catalog reaches a fixpoint. Entries are deduplicated by
//! canonical URL, so each document is read at most once.
use std::{
    collections::VecDeque,
    hash::{Hash, Hasher},
    sync::Arc,
};

use ahash::{AHashSet, AHasher};
use serde_json::Value;
use url::Url;

use crate::{
    catalog, parsers, parsers::Parse, resolvers, resolvers::Resolve, uri, Catalog, Error, FileInfo,
    Options,
};

/// Input of a top-level operation: a location string, or an in-memory value
/// with a base URL.
pub(crate) enum Source<'a> {
    Location(&'a str),
    Value { base: &'a str, value: Value },
}

/// Load only the root document. Used by `parse`.
pub(crate) fn load_root(options: &Options, source: Source) -> Result<(Catalog, Url), Error> {
    let mut catalog = Catalog::new();
    let url = insert_root(&mut catalog, options, source)?;
    Ok((catalog, url))
}

/// Load the root document and crawl it to fixpoint.
pub(crate) fn load(options: &Options, source: Source) -> Result<(Catalog, Url), Error> {
    let mut catalog = Catalog::new();
    let url = insert_root(&mut catalog, options, source)?;
    crawl(&mut catalog, &url, options)?;
    Ok((catalog, url))
}

fn insert_root(catalog: &mut Catalog, options: &Options, source: Source) -> Result<Url, Error> {
    let cwd = match &options.cwd {
        Some(cwd) => cwd.clone(),
        None => uri::cwd().unwrap_or_else(|_| uri::DEFAULT_ROOT_URL.clone()),
    };
    match source {
        Source::Location(location) => {
            let url = uri::parse(location, &cwd)?;
            let (url, _) = uri::split_fragment(&url);
            catalog.insert_pending(url.clone());
            // A root that cannot be read is fatal even with `continue_on_error`.
            let value = read_document(&options.resolvers(), &options.parsers(), &url)?;
            catalog.mark_resolved(&url, value);
            Ok(url)
        }
        Source::Value { base, value } => {
            let url = uri::parse(base, &cwd)?;
            let (url, _) = uri::split_fragment(&url);
            catalog.insert_pending(url.clone());
            catalog.mark_resolved(&url, value);
            Ok(url)
        }
    }
}

fn crawl(catalog: &mut Catalog, root: &Url, options: &Options) -> Result<(), Error> {
    if !options.external {
        return Ok(());
    }
    let resolvers = options.resolvers();
    let parsers = options.parsers();
    let mut queue: VecDeque<Url> = VecDeque::from([root.clone()]);
    let mut seen = AHashSet::new();
    while let Some(doc_url) = queue.pop_front() {
        let mut targets = Vec::new();
        {
            let doc = catalog.get(&doc_url).expect("Queued documents exist");
            collect_refs(doc.value(), &doc_url, &mut seen, &mut targets, options)?;
        }
        for target in targets {
            if catalog.exists(&target) {
                continue;
            }
            catalog.insert_pending(target.clone());
            match read_document(&resolvers, &parsers, &target) {
                Ok(value) => {
                    catalog.mark_resolved(&target, value);
                    queue.push_back(target);
                }
                Err(error) if options.continue_on_error => {
                    tracing::warn!(url = %target, %error, "failed to resolve document");
                    catalog.mark_errored(&target, error);
                }
                Err(error) => return Err(error),
            }
        }
    }
    Ok(())
}

fn read_document(
    resolvers: &[Arc<dyn Resolve>],
    parsers: &[Arc<dyn Parse>],
    url: &Url,
) -> Result<Value, Error> {
    let file = FileInfo::new(url.clone());
    let data = resolvers::read_file(resolvers, &file)?;
    let value = parsers::parse_bytes(parsers, &file, &data)?;
    tracing::debug!(url = %url, bytes = data.len(), "resolved document");
    Ok(value)
}

// Depth-first ref discovery. Sibling keys next to `$ref` are inert per JSON
// Reference and are not traversed.
fn collect_refs(
    value: &Value,
    base: &Url,
    seen: &mut AHashSet<u64>,
    targets: &mut Vec<Url>,
    options: &Options,
) -> Result<(), Error> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = catalog::ref_string(value) {
                let mut hasher = AHasher::default();
                (base.as_str(), reference).hash(&mut hasher);
                if !seen.insert(hasher.finish()) {
                    return Ok(());
                }
                match uri::resolve_against(base, reference) {
                    Ok(target) => {
                        let (doc_url, _) = uri::split_fragment(&target);
                        targets.push(doc_url);
                    }
                    Err(error) if options.continue_on_error => {
                        tracing::warn!(reference, %error, "skipping unresolvable reference");
                    }
                    Err(error) => return Err(error),
                }
                return Ok(());
            }
            for member in map.values() {
                collect_refs(member, base, seen, targets, options)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, base, seen, targets, options)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;

    use super::{load, load_root, Source};
    use crate::Options;

    fn options_with_cwd() -> Options {
        Options::default().cwd(Url::parse("file:///specs/").expect("Invalid URL"))
    }

    #[test]
    fn test_load_root_does_not_crawl() {
        let options = options_with_cwd();
        let value = json!({"foo": {"$ref": "missing.yaml"}});
        let (catalog, url) = load_root(&options, Source::Value {
            base: "root.yaml",
            value,
        })
        .expect("Should load");
        assert_eq!(url.as_str(), "file:///specs/root.yaml");
        assert_eq!(catalog.paths().count(), 1);
    }

    #[test]
    fn test_internal_refs_reach_fixpoint_without_reads() {
        let options = options_with_cwd();
        let value = json!({
            "properties": {"name": {"$ref": "#/definitions/name"}},
            "definitions": {"name": {"type": "string"}}
        });
        let (catalog, _) = load(&options, Source::Value {
            base: "root.yaml",
            value,
        })
        .expect("Should load");
        assert_eq!(catalog.paths().count(), 1);
    }

    #[test]
    fn test_external_disabled_skips_discovery() {
        let options = options_with_cwd().external(false);
        let value = json!({"foo": {"$ref": "other.yaml"}});
        let (catalog, _) = load(&options, Source::Value {
            base: "root.yaml",
            value,
        })
        .expect("Should load");
        assert_eq!(catalog.paths().count(), 1);
    }

    #[test]
    fn test_missing_external_document_fails() {
        let options = options_with_cwd();
        let value = json!({"foo": {"$ref": "file:///definitely/missing.yaml"}});
        let result = load(&options, Source::Value {
            base: "root.yaml",
            value,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_continue_on_error_records_entry() {
        let options = options_with_cwd().continue_on_error(true);
        let value = json!({"foo": {"$ref": "file:///definitely/missing.yaml"}});
        let (catalog, _) = load(&options, Source::Value {
            base: "root.yaml",
            value,
        })
        .expect("Should load");
        assert_eq!(catalog.paths().count(), 2);
        assert_eq!(catalog.errors().count(), 1);
    }
}

//! Inlining external targets into a single self-contained document.
//!
//! Every `$ref` whose target lives outside the root document is grafted
//! under `definitions/<name>` (once per target) and the `$ref` value is
//! rewritten to the matching local pointer. Nothing is expanded in place,
//! so circular chains survive as ordinary local `$ref`s.
use ahash::{AHashMap, AHashSet};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::{pointer, uri, Catalog, Error, Options};

/// Bundle the root document of an already-crawled catalog.
pub(crate) fn bundle(catalog: &Catalog, root: &Url, options: &Options) -> Result<Value, Error> {
    let root_value = catalog
        .get(root)
        .expect("Root is always present")
        .value()
        .clone();
    let mut used_names = AHashSet::new();
    if let Some(definitions) = root_value.get("definitions").and_then(Value::as_object) {
        used_names.extend(definitions.keys().cloned());
    }
    let mut bundler = Bundler {
        catalog,
        root: root.clone(),
        external: options.external,
        continue_on_error: options.continue_on_error,
        inventory: AHashMap::new(),
        grafts: Vec::new(),
        used_names,
    };
    let mut out = bundler.rewrite(root_value, root)?;
    for (name, body) in bundler.grafts {
        let tokens = vec!["definitions".to_string(), name];
        pointer::set(&mut out, &tokens, body, "/definitions")?;
    }
    Ok(out)
}

struct Bundler<'a> {
    catalog: &'a Catalog,
    root: Url,
    external: bool,
    continue_on_error: bool,
    /// Canonical target position to the local pointer of its first inlining.
    inventory: AHashMap<(Url, String), String>,
    /// Bodies to graft under `definitions`, in discovery order.
    grafts: Vec<(String, Value)>,
    used_names: AHashSet<String>,
}

impl<'a> Bundler<'a> {
    fn rewrite(&mut self, value: Value, base: &Url) -> Result<Value, Error> {
        match value {
            Value::Object(mut map) => {
                let reference = map
                    .get("$ref")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(reference) = reference {
                    if let Some(rewritten) = self.rewrite_ref(&reference, base)? {
                        map.insert("$ref".to_string(), Value::String(rewritten));
                    }
                    // Siblings are inert next to `$ref`.
                    return Ok(Value::Object(map));
                }
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, member) in map {
                    let member = self.rewrite(member, base)?;
                    out.insert(key, member);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.rewrite(item, base)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        }
    }

    /// The replacement `$ref` value, or `None` to keep the original.
    fn rewrite_ref(&mut self, reference: &str, base: &Url) -> Result<Option<String>, Error> {
        let target = match uri::resolve_against(base, reference) {
            Ok(target) => target,
            Err(error) if self.continue_on_error => {
                tracing::warn!(reference, %error, "leaving unresolvable reference in place");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        let (doc_url, fragment) = uri::split_fragment(&target);
        let tokens = pointer::parse(&fragment)?;
        if doc_url == self.root {
            if reference.starts_with('#') {
                // Already internal to the root.
                return Ok(None);
            }
            return Ok(Some(format!("#{}", pointer::join(&tokens))));
        }
        if !self.catalog.is_resolved(&doc_url) {
            // External resolution disabled, or the document errored under
            // `continue_on_error`.
            if !self.external || self.continue_on_error {
                return Ok(None);
            }
            return Err(Error::missing_pointer(
                doc_url.as_str(),
                pointer::join(&tokens),
            ));
        }
        let catalog = self.catalog;
        let (owner, canonical, value) = match catalog.resolve(&doc_url, &tokens) {
            Ok(resolved) => resolved,
            Err(error) if self.continue_on_error => {
                tracing::warn!(reference, %error, "leaving unresolvable reference in place");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        if owner == self.root {
            // A chain of refs that lands back inside the root document.
            return Ok(Some(format!("#{canonical}")));
        }
        let key = (owner.clone(), canonical.clone());
        if let Some(local) = self.inventory.get(&key) {
            return Ok(Some(local.clone()));
        }
        if !canonical.is_empty() {
            // The target sits inside a document that is already inlined
            // wholesale; point into the existing body instead of grafting a
            // duplicate.
            if let Some(local) = self.inventory.get(&(owner.clone(), String::new())) {
                return Ok(Some(format!("{local}{canonical}")));
            }
        }
        let name = self.pick_name(&owner, &canonical);
        let local = format!("#/definitions/{}", pointer::escape(&name));
        self.inventory.insert(key, local.clone());
        tracing::debug!(url = %owner, pointer = %canonical, name, "inlining external target");
        // Reserve the slot before recursing so circular chains terminate at
        // the inventory lookup above.
        let idx = self.grafts.len();
        self.grafts.push((name, Value::Null));
        let body = self.rewrite(value.clone(), &owner)?;
        self.grafts[idx].1 = body;
        Ok(Some(local))
    }

    fn pick_name(&mut self, owner: &Url, canonical: &str) -> String {
        let base_name = if canonical.is_empty() {
            let segment = owner.path().rsplit('/').next().unwrap_or("");
            let stem = match segment.rfind('.') {
                Some(idx) if idx > 0 => &segment[..idx],
                _ => segment,
            };
            percent_decode_str(stem).decode_utf8_lossy().into_owned()
        } else {
            pointer::parse(canonical)
                .ok()
                .and_then(|tokens| tokens.last().cloned())
                .unwrap_or_default()
        };
        let base_name = if base_name.is_empty() {
            "def".to_string()
        } else {
            base_name
        };
        let mut name = base_name.clone();
        let mut n = 2;
        while !self.used_names.insert(name.clone()) {
            name = format!("{base_name}_{n}");
            n += 1;
        }
        name
    }
}

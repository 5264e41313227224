//! Replacing `$ref` nodes by the targets they point to.
//!
//! The output is an arena of nodes keyed by integer ids rather than a plain
//! value tree: every document position is built exactly once, so two
//! references to the same target resolve to the same id, sharing stays
//! observable, and a circular chain becomes a back-edge id instead of an
//! infinite expansion.
use ahash::{AHashMap, AHashSet};
use serde_json::Value;
use url::Url;

use crate::{catalog, pointer, uri, Catalog, Error, Options};

/// How the dereferencer treats a `$ref` whose target is currently being
/// expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircularPolicy {
    /// Emit a back-edge to the in-progress node, producing a cyclic graph.
    #[default]
    Share,
    /// Fail the whole operation with [`Error::CircularReference`].
    Reject,
    /// Leave the `$ref` node unchanged in the output.
    Ignore,
}

/// Identifier of a node in a [`Dereferenced`] arena.
///
/// Identity comparisons between positions in the output are id comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// A single node of the dereferenced tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<NodeId>),
    /// Members in document order.
    Object(Vec<(String, NodeId)>),
}

/// The dereferenced output: an arena, the root id, and the catalog the
/// operation ran against (carrying the circularity flags).
#[derive(Debug)]
pub struct Dereferenced {
    nodes: Vec<Node>,
    root: NodeId,
    catalog: Catalog,
}

impl Dereferenced {
    /// Id of the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }
    /// The catalog of documents that fed this tree.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
    /// Whether any circular reference was found.
    #[must_use]
    pub fn circular(&self) -> bool {
        self.catalog.circular()
    }
    /// Pointers of the `$ref` nodes that formed circular chains.
    #[must_use]
    pub fn circular_refs(&self) -> &[String] {
        self.catalog.circular_refs()
    }
    /// Navigate a JSON Pointer through the arena.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPointer`] when the path does not exist.
    pub fn id_at(&self, ptr: &str) -> Result<NodeId, Error> {
        let tokens = pointer::parse(ptr)?;
        let mut id = self.root;
        for token in &tokens {
            id = match self.node(id) {
                Node::Object(members) => members
                    .iter()
                    .find(|(key, _)| key == token)
                    .map(|(_, member)| *member)
                    .ok_or_else(|| Error::missing_pointer("", ptr))?,
                Node::Array(items) => {
                    let idx =
                        pointer::parse_index(token).ok_or_else(|| Error::invalid_pointer(ptr))?;
                    *items.get(idx).ok_or_else(|| Error::missing_pointer("", ptr))?
                }
                _ => return Err(Error::missing_pointer("", ptr)),
            };
        }
        Ok(id)
    }
    /// Rebuild a plain value tree. Shared sub-trees are expanded by value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircularReference`] when a back-edge is reachable
    /// from the root; cyclic graphs have no finite value form.
    pub fn to_value(&self) -> Result<Value, Error> {
        let mut on_path = AHashSet::new();
        let mut path = String::new();
        self.value_of(self.root, &mut on_path, &mut path)
    }

    fn value_of(
        &self,
        id: NodeId,
        on_path: &mut AHashSet<NodeId>,
        path: &mut String,
    ) -> Result<Value, Error> {
        if !on_path.insert(id) {
            return Err(Error::circular_reference(format!("#{path}")));
        }
        let value = match self.node(id) {
            Node::Null => Value::Null,
            Node::Bool(value) => Value::Bool(*value),
            Node::Number(value) => Value::Number(value.clone()),
            Node::String(value) => Value::String(value.clone()),
            Node::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let len = path.len();
                    path.push('/');
                    path.push_str(&idx.to_string());
                    out.push(self.value_of(*item, on_path, path)?);
                    path.truncate(len);
                }
                Value::Array(out)
            }
            Node::Object(members) => {
                let mut out = serde_json::Map::with_capacity(members.len());
                for (key, member) in members {
                    let len = path.len();
                    path.push('/');
                    path.push_str(&pointer::escape(key));
                    out.insert(key.clone(), self.value_of(*member, on_path, path)?);
                    path.truncate(len);
                }
                Value::Object(out)
            }
        };
        on_path.remove(&id);
        Ok(value)
    }
}

/// Dereference the root document of an already-crawled catalog.
pub(crate) fn dereference(
    mut catalog: Catalog,
    root: &Url,
    options: &Options,
) -> Result<Dereferenced, Error> {
    let (nodes, root_id, circular_refs) = {
        let mut builder = Builder {
            catalog: &catalog,
            policy: options.circular,
            external: options.external,
            continue_on_error: options.continue_on_error,
            nodes: Vec::new(),
            done: AHashMap::new(),
            in_progress: AHashSet::new(),
            ref_in_progress: AHashSet::new(),
            circular_refs: Vec::new(),
        };
        let root_doc = catalog.get(root).expect("Root is always present");
        let mut source = String::new();
        let mut out = String::new();
        let root_id = builder.build(root_doc.value(), root, &mut source, &mut out)?;
        (builder.nodes, root_id, builder.circular_refs)
    };
    catalog.set_circular_refs(circular_refs);
    Ok(Dereferenced {
        nodes,
        root: root_id,
        catalog,
    })
}

struct Builder<'a> {
    catalog: &'a Catalog,
    policy: CircularPolicy,
    external: bool,
    continue_on_error: bool,
    nodes: Vec<Node>,
    /// Node built (or being built) for each canonical document position.
    done: AHashMap<(Url, String), NodeId>,
    /// Positions currently on the traversal stack.
    in_progress: AHashSet<(Url, String)>,
    /// Ref-node positions whose expansion has started; guards `$ref` chains
    /// that never reach a concrete value.
    ref_in_progress: AHashSet<(Url, String)>,
    circular_refs: Vec<String>,
}

impl<'a> Builder<'a> {
    /// Build the node for the value at canonical position `(base, source)`,
    /// with `out` tracking the position in the output tree for circularity
    /// records.
    fn build(
        &mut self,
        value: &'a Value,
        base: &Url,
        source: &mut String,
        out: &mut String,
    ) -> Result<NodeId, Error> {
        if catalog::ref_string(value).is_some() {
            let key = (base.clone(), source.clone());
            if let Some(&id) = self.done.get(&key) {
                return Ok(id);
            }
            if !self.ref_in_progress.insert(key.clone()) {
                // A chain of `$ref`s that loops back onto itself resolves
                // to nothing concrete.
                self.circular_refs.push(format!("#{out}"));
                return match self.policy {
                    CircularPolicy::Share => Ok(self.alloc(Node::Null)),
                    CircularPolicy::Ignore => Ok(self.intern(value)),
                    CircularPolicy::Reject => Err(Error::circular_reference(format!("#{out}"))),
                };
            }
            let id = self.expand_ref(value, base, out)?;
            self.ref_in_progress.remove(&key);
            // The replaced position aliases its target.
            self.done.entry(key).or_insert(id);
            return Ok(id);
        }
        let key = (base.clone(), source.clone());
        if let Some(&id) = self.done.get(&key) {
            return Ok(id);
        }
        match value {
            Value::Null => Ok(self.alloc_leaf(key, Node::Null)),
            Value::Bool(value) => Ok(self.alloc_leaf(key, Node::Bool(*value))),
            Value::Number(value) => Ok(self.alloc_leaf(key, Node::Number(value.clone()))),
            Value::String(value) => Ok(self.alloc_leaf(key, Node::String(value.clone()))),
            Value::Array(items) => {
                // The slot is allocated before the children so that a ref
                // back into this position becomes a back-edge.
                let id = self.alloc(Node::Null);
                self.done.insert(key.clone(), id);
                self.in_progress.insert(key.clone());
                let mut ids = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let token = idx.to_string();
                    let (source_len, out_len) = (source.len(), out.len());
                    source.push('/');
                    source.push_str(&token);
                    out.push('/');
                    out.push_str(&token);
                    ids.push(self.build(item, base, source, out)?);
                    source.truncate(source_len);
                    out.truncate(out_len);
                }
                self.nodes[id.0 as usize] = Node::Array(ids);
                self.in_progress.remove(&key);
                Ok(id)
            }
            Value::Object(map) => {
                let id = self.alloc(Node::Null);
                self.done.insert(key.clone(), id);
                self.in_progress.insert(key.clone());
                let mut members = Vec::with_capacity(map.len());
                for (member_key, member) in map {
                    let token = pointer::escape(member_key);
                    let (source_len, out_len) = (source.len(), out.len());
                    source.push('/');
                    source.push_str(&token);
                    out.push('/');
                    out.push_str(&token);
                    let member_id = self.build(member, base, source, out)?;
                    source.truncate(source_len);
                    out.truncate(out_len);
                    members.push((member_key.clone(), member_id));
                }
                self.nodes[id.0 as usize] = Node::Object(members);
                self.in_progress.remove(&key);
                Ok(id)
            }
        }
    }

    fn expand_ref(&mut self, node: &'a Value, base: &Url, out: &mut String) -> Result<NodeId, Error> {
        let reference = catalog::ref_string(node).expect("Checked by the caller");
        let target = match uri::resolve_against(base, reference) {
            Ok(target) => target,
            Err(error) if self.continue_on_error => {
                tracing::warn!(reference, %error, "leaving unresolvable reference in place");
                return Ok(self.intern(node));
            }
            Err(error) => return Err(error),
        };
        let (doc_url, fragment) = uri::split_fragment(&target);
        let tokens = pointer::parse(&fragment)?;
        if !self.catalog.is_resolved(&doc_url) {
            // External resolution disabled, or the document errored under
            // `continue_on_error`: the ref node stays as-is.
            if !self.external || self.continue_on_error {
                return Ok(self.intern(node));
            }
            return Err(Error::missing_pointer(doc_url.as_str(), pointer::join(&tokens)));
        }
        let catalog = self.catalog;
        let (owner_url, canonical, target_value) = match catalog.resolve(&doc_url, &tokens) {
            Ok(resolved) => resolved,
            Err(error) if self.continue_on_error => {
                tracing::warn!(url = %doc_url, reference, %error, "leaving unresolvable reference in place");
                return Ok(self.intern(node));
            }
            Err(error) => return Err(error),
        };
        let key = (owner_url, canonical);
        if self.in_progress.contains(&key) {
            self.circular_refs.push(format!("#{out}"));
            return match self.policy {
                CircularPolicy::Share => Ok(self.done[&key]),
                CircularPolicy::Ignore => Ok(self.intern(node)),
                CircularPolicy::Reject => Err(Error::circular_reference(format!("#{out}"))),
            };
        }
        if let Some(&id) = self.done.get(&key) {
            return Ok(id);
        }
        let (owner_url, mut canonical) = key;
        self.build(target_value, &owner_url, &mut canonical, out)
    }

    // Convert a value verbatim, without ref expansion.
    fn intern(&mut self, value: &Value) -> NodeId {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(value) => Node::Bool(*value),
            Value::Number(value) => Node::Number(value.clone()),
            Value::String(value) => Node::String(value.clone()),
            Value::Array(items) => {
                let ids = items.iter().map(|item| self.intern(item)).collect();
                Node::Array(ids)
            }
            Value::Object(map) => {
                let members = map
                    .iter()
                    .map(|(key, member)| (key.clone(), self.intern(member)))
                    .collect();
                Node::Object(members)
            }
        };
        self.alloc(node)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("Arena overflow"));
        self.nodes.push(node);
        id
    }

    fn alloc_leaf(&mut self, key: (Url, String), node: Node) -> NodeId {
        let id = self.alloc(node);
        self.done.insert(key, id);
        id
    }
}

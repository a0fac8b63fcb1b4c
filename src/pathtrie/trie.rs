use std::collections::HashMap;
use std::fmt;

/// Separator used by [`PathTrie::new`]
pub const DEFAULT_PATH_SEPARATOR: &str = "/";

/// Returns `true` when `segment` is a path parameter placeholder such as `{id}`
///
/// The placeholder must have a non-empty name between the braces.
#[inline]
#[must_use]
pub fn is_path_param(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Node in the path trie
///
/// Each node represents one segment of a stored template. A node carries a value only when
/// some template ends at it; intermediate nodes may become terminal later without losing
/// their children.
#[derive(Clone)]
pub struct TrieNode<V> {
    children: HashMap<String, TrieNode<V>>,
    /// Segment this node represents, e.g. `bar` for `/v1/foo/bar`
    name: String,
    /// Template from the root up to and including this node, e.g. `/v1/foo/bar`
    full_path: String,
    /// Number of parameter segments in `full_path`
    param_segment_count: usize,
    value: Option<V>,
}

impl<V> TrieNode<V> {
    fn new(name: &str, full_path: String, param_segment_count: usize) -> Self {
        Self {
            children: HashMap::new(),
            name: name.to_string(),
            full_path,
            param_segment_count,
            value: None,
        }
    }

    /// Segment name of this node
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template this node terminates
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Number of parameterized segments between the root and this node (inclusive)
    #[must_use]
    pub fn param_segment_count(&self) -> usize {
        self.param_segment_count
    }

    /// Value stored at this node, if a template terminates here
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    fn matches_segment(&self, segment: &str, is_param: fn(&str) -> bool) -> bool {
        is_param(&self.name) || self.name == segment
    }
}

impl<V: fmt::Debug> fmt::Debug for TrieNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieNode")
            .field("full_path", &self.full_path)
            .field("param_segment_count", &self.param_segment_count)
            .field("value", &self.value)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Templated path index
///
/// Maps path templates to values of type `V` and resolves concrete paths to the most specific
/// matching template. See the [module documentation](crate::pathtrie) for the matching rules.
#[derive(Clone)]
pub struct PathTrie<V> {
    root: HashMap<String, TrieNode<V>>,
    separator: String,
    is_param: fn(&str) -> bool,
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for PathTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathTrie")
            .field("separator", &self.separator)
            .field("templates", &self.templates())
            .finish()
    }
}

impl<V> PathTrie<V> {
    /// Create an empty trie using `/` as the separator
    #[must_use]
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_PATH_SEPARATOR)
    }

    /// Create an empty trie with a caller-supplied separator
    #[must_use]
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            root: HashMap::new(),
            separator: separator.into(),
            is_param: is_path_param,
        }
    }

    /// Replace the predicate that decides whether a stored segment is a parameter
    ///
    /// Both matching and specificity counting depend on it, so it should be set before any
    /// template is inserted.
    #[must_use]
    pub fn with_param_predicate(mut self, is_param: fn(&str) -> bool) -> Self {
        self.is_param = is_param;
        self
    }

    /// Separator this trie splits paths on
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Insert `value` at `template`, overwriting any existing value
    ///
    /// Returns `true` if the template had no value before, `false` if one was overwritten.
    pub fn insert(&mut self, template: &str, value: V) -> bool {
        self.insert_merge(template, value, |existing, new| *existing = new)
    }

    /// Insert `value` at `template`, combining it with an existing value via `merge`
    ///
    /// `merge` receives the stored value mutably and the new value by move, and must leave the
    /// combined result in place. The return value reports whether a value existed before,
    /// independent of what `merge` produces.
    pub fn insert_merge<F>(&mut self, template: &str, value: V, merge: F) -> bool
    where
        F: FnOnce(&mut V, V),
    {
        let segments: Vec<&str> = template.split(self.separator.as_str()).collect();
        let is_param = self.is_param;
        let separator = self.separator.as_str();

        let mut level = &mut self.root;
        let mut param_count = 0;
        let mut node: Option<&mut TrieNode<V>> = None;

        for (idx, segment) in segments.iter().enumerate() {
            if is_param(segment) {
                param_count += 1;
            }
            let current = level.entry((*segment).to_string()).or_insert_with(|| {
                TrieNode::new(segment, segments[..=idx].join(separator), param_count)
            });
            if idx + 1 == segments.len() {
                node = Some(current);
                break;
            }
            level = &mut current.children;
        }

        // `split` always yields at least one segment
        let Some(node) = node else {
            return false;
        };

        match node.value.as_mut() {
            Some(existing) => {
                merge(existing, value);
                false
            }
            None => {
                node.value = Some(value);
                true
            }
        }
    }

    /// Value of the template that best matches `path`
    #[must_use]
    pub fn get_value(&self, path: &str) -> Option<&V> {
        self.get_node(path).and_then(TrieNode::value)
    }

    /// Template and value that best match `path`
    #[must_use]
    pub fn get_path_and_value(&self, path: &str) -> Option<(&str, &V)> {
        let node = self.get_node(path)?;
        node.value().map(|v| (node.full_path(), v))
    }

    /// Terminal node of the template that best matches `path`
    #[must_use]
    pub fn get_node(&self, path: &str) -> Option<&TrieNode<V>> {
        let segments: Vec<&str> = path.split(self.separator.as_str()).collect();
        let mut candidates = Vec::new();
        collect_matches(&self.root, &segments, self.is_param, &mut candidates);

        match candidates.len() {
            0 => None,
            1 => candidates.pop(),
            _ => most_specific(candidates, path),
        }
    }

    /// `true` when no template has been inserted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of templates holding a value
    #[must_use]
    pub fn len(&self) -> usize {
        fn count<V>(level: &HashMap<String, TrieNode<V>>) -> usize {
            level
                .values()
                .map(|n| usize::from(n.value.is_some()) + count(&n.children))
                .sum()
        }
        count(&self.root)
    }

    /// All stored templates, sorted
    #[must_use]
    pub fn templates(&self) -> Vec<&str> {
        fn walk<'a, V>(level: &'a HashMap<String, TrieNode<V>>, out: &mut Vec<&'a str>) {
            for node in level.values() {
                if node.value.is_some() {
                    out.push(node.full_path.as_str());
                }
                walk(&node.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out.sort_unstable();
        out
    }
}

/// Recursively collect every value-holding node whose template matches `segments`
fn collect_matches<'a, V>(
    level: &'a HashMap<String, TrieNode<V>>,
    segments: &[&str],
    is_param: fn(&str) -> bool,
    out: &mut Vec<&'a TrieNode<V>>,
) {
    let Some((segment, remaining)) = segments.split_first() else {
        return;
    };

    for node in level.values() {
        if !node.matches_segment(segment, is_param) {
            continue;
        }
        if remaining.is_empty() {
            if node.value.is_some() {
                out.push(node);
            }
        } else {
            collect_matches(&node.children, remaining, is_param, out);
        }
    }
}

/// Pick the exact match if present, else the fewest parameter segments, else the smallest
/// template lexically
fn most_specific<'a, V>(candidates: Vec<&'a TrieNode<V>>, path: &str) -> Option<&'a TrieNode<V>> {
    if let Some(exact) = candidates.iter().copied().find(|n| n.full_path == path) {
        return Some(exact);
    }
    candidates.into_iter().min_by(|a, b| {
        a.param_segment_count
            .cmp(&b.param_segment_count)
            .then_with(|| a.full_path.cmp(&b.full_path))
    })
}

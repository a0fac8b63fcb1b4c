//! # Path Trie Module
//!
//! The path trie indexes path templates (e.g. `/users/{id}`) and resolves concrete request
//! paths (e.g. `/users/42`) back to the template that describes them.
//!
//! ## Overview
//!
//! Templates are split into segments on a separator (`/` by default) and stored one node per
//! segment. A stored segment matches a queried segment when they are equal, or when the stored
//! segment is a path parameter placeholder such as `{id}`.
//!
//! Because a literal node and a parameter node can be siblings, more than one template can
//! match the same concrete path:
//!
//! ```text
//! /users/{id}      matches /users/42 and /users/admin
//! /users/admin     matches /users/admin only
//! ```
//!
//! Resolution explores every matching branch and then picks:
//!
//! 1. the template that is literally equal to the queried path, if any;
//! 2. otherwise the template with the fewest parameter segments;
//! 3. ties on parameter count resolve to the lexically smallest template.
//!
//! ## Example
//!
//! ```rust
//! use speculator::pathtrie::PathTrie;
//!
//! let mut trie = PathTrie::new();
//! trie.insert("/users/{id}", "byId");
//! trie.insert("/users/admin", "adminHandler");
//!
//! assert_eq!(trie.get_path_and_value("/users/admin"), Some(("/users/admin", &"adminHandler")));
//! assert_eq!(trie.get_path_and_value("/users/42"), Some(("/users/{id}", &"byId")));
//! assert!(trie.get_value("/posts/42").is_none());
//! ```
//!
//! ## Performance
//!
//! - Insert: O(k) where k is the number of segments
//! - Lookup: every matching sibling is explored, so the worst case grows with the number of
//!   ambiguous branches per depth. In practice there is at most one literal and one parameter
//!   child per depth.
//!
//! The trie holds no internal synchronization. Callers that share one across threads must
//! guard it, as [`crate::spec::Spec`] does.

mod trie;

pub use trie::{is_path_param, PathTrie, TrieNode, DEFAULT_PATH_SEPARATOR};

#![allow(clippy::unwrap_used, clippy::expect_used)]

use speculator::pathtrie::{PathTrie, TrieNode};
use speculator::spec::{HttpMethod, MethodSet};

fn methods(list: &[HttpMethod]) -> MethodSet {
    list.iter().copied().collect()
}

#[test]
fn test_users_admin_routing() {
    let mut trie = PathTrie::new();
    trie.insert("/users/{id}", "byId");
    trie.insert("/users/admin", "adminHandler");

    assert_eq!(
        trie.get_path_and_value("/users/admin"),
        Some(("/users/admin", &"adminHandler"))
    );
    assert_eq!(trie.get_path_and_value("/users/42"), Some(("/users/{id}", &"byId")));
}

#[test]
fn test_method_sets_accumulate_per_template() {
    let mut trie: PathTrie<MethodSet> = PathTrie::new();
    let merge = |existing: &mut MethodSet, new: MethodSet| existing.extend(new);

    assert!(trie.insert_merge("/pets/{petId}", methods(&[HttpMethod::Get]), merge));
    assert!(!trie.insert_merge("/pets/{petId}", methods(&[HttpMethod::Delete]), merge));
    assert!(trie.insert_merge("/pets", methods(&[HttpMethod::Post]), merge));

    assert_eq!(
        trie.get_value("/pets/7"),
        Some(&methods(&[HttpMethod::Get, HttpMethod::Delete]))
    );
    assert_eq!(trie.len(), 2);
    assert_eq!(trie.templates(), vec!["/pets", "/pets/{petId}"]);
}

#[test]
fn test_specificity_across_overlapping_templates() {
    let mut trie = PathTrie::new();
    trie.insert("/orgs/{org}/repos/{repo}", "generic");
    trie.insert("/orgs/{org}/repos/main", "main-repo");
    trie.insert("/orgs/acme/repos/{repo}", "acme");
    trie.insert("/orgs/acme/repos/main", "acme-main");

    assert_eq!(trie.get_value("/orgs/acme/repos/main"), Some(&"acme-main"));
    assert_eq!(trie.get_value("/orgs/acme/repos/web"), Some(&"acme"));
    assert_eq!(trie.get_value("/orgs/other/repos/main"), Some(&"main-repo"));
    assert_eq!(trie.get_value("/orgs/other/repos/web"), Some(&"generic"));

    let node: &TrieNode<&str> = trie.get_node("/orgs/other/repos/web").unwrap();
    assert_eq!(node.full_path(), "/orgs/{org}/repos/{repo}");
    assert_eq!(node.param_segment_count(), 2);
    assert_eq!(node.name(), "{repo}");
}

#[test]
fn test_equal_specificity_ties_break_lexically() {
    let mut trie = PathTrie::new();
    trie.insert("/x/{b}/lit", "second");
    trie.insert("/x/lit/{a}", "first");

    // both templates have one parameter; the lexically smaller one wins
    assert_eq!(
        trie.get_path_and_value("/x/lit/lit"),
        Some(("/x/lit/{a}", &"first"))
    );
}

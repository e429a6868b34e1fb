//! Per-query resolution of a bulk fetch result.
//!
//! After a generation's bulk fetch succeeds, every caller runs a resolver to
//! pick its own answer out of the shared result. Absence is a normal outcome:
//! the standard resolvers return `Ok(None)` when nothing matches.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ResolveError;

/// Extracts one query's result from a bulk fetch result.
pub trait Resolver<T, Q, R>: Send + Sync + 'static {
    fn resolve(&self, data: &T, query: &Q) -> Result<R, ResolveError>;
}

impl<T, Q, R, F> Resolver<T, Q, R> for F
where
    F: Fn(&T, &Q) -> Result<R, ResolveError> + Send + Sync + 'static,
{
    fn resolve(&self, data: &T, query: &Q) -> Result<R, ResolveError> {
        self(data, query)
    }
}

/// Matches items by a key extracted from each item.
///
/// The bulk result is a list of items; the first item whose key equals the
/// query is returned.
///
/// ```ignore
/// let resolver = key_resolver(|user: &User| user.id);
/// ```
pub fn key_resolver<T, Q, K>(
    key: K,
) -> impl Fn(&Vec<T>, &Q) -> Result<Option<T>, ResolveError> + Send + Sync + 'static
where
    T: Clone + 'static,
    Q: PartialEq + 'static,
    K: Fn(&T) -> Q + Send + Sync + 'static,
{
    move |items: &Vec<T>, query: &Q| Ok(items.iter().find(|item| key(*item) == *query).cloned())
}

/// Looks the query up in a map keyed by query.
pub fn indexed_resolver<Q, V>(
) -> impl Fn(&HashMap<Q, V>, &Q) -> Result<Option<V>, ResolveError> + Send + Sync + 'static
where
    Q: Eq + Hash + 'static,
    V: Clone + 'static,
{
    |index: &HashMap<Q, V>, query: &Q| Ok(index.get(query).cloned())
}

/// Returns every item accepted by `matches` for the query.
pub fn filter_resolver<T, Q, P>(
    matches: P,
) -> impl Fn(&Vec<T>, &Q) -> Result<Vec<T>, ResolveError> + Send + Sync + 'static
where
    T: Clone + 'static,
    Q: 'static,
    P: Fn(&T, &Q) -> bool + Send + Sync + 'static,
{
    move |items: &Vec<T>, query: &Q| {
        Ok(items
            .iter()
            .filter(|item| matches(*item, query))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: u32,
        name: &'static str,
    }

    fn users() -> Vec<User> {
        vec![
            User { id: 1, name: "Bob" },
            User { id: 2, name: "Alice" },
        ]
    }

    #[test]
    fn test_key_resolver_finds_matching_item() {
        let resolver = key_resolver(|user: &User| user.id);

        let found = resolver.resolve(&users(), &2).unwrap();

        assert_eq!(found, Some(User { id: 2, name: "Alice" }));
    }

    #[test]
    fn test_key_resolver_missing_item_is_none() {
        let resolver = key_resolver(|user: &User| user.id);

        assert_eq!(resolver.resolve(&users(), &100).unwrap(), None);
    }

    #[test]
    fn test_indexed_resolver_reads_map_entry() {
        let index: HashMap<u32, User> = users().into_iter().map(|u| (u.id, u)).collect();
        let resolver = indexed_resolver::<u32, User>();

        assert_eq!(resolver.resolve(&index, &1).unwrap().map(|u| u.name), Some("Bob"));
        assert_eq!(resolver.resolve(&index, &9).unwrap(), None);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Post {
        author_id: u32,
        title: &'static str,
    }

    #[test]
    fn test_filter_resolver_returns_all_matches() {
        let posts = vec![
            Post { author_id: 1, title: "Hello" },
            Post { author_id: 1, title: "World" },
            Post { author_id: 2, title: "Hello" },
        ];
        let resolver = filter_resolver(|post: &Post, author: &u32| post.author_id == *author);

        let found = resolver.resolve(&posts, &1).unwrap();

        assert_eq!(
            found.iter().map(|p| p.title).collect::<Vec<_>>(),
            vec!["Hello", "World"]
        );
        assert!(resolver.resolve(&posts, &3).unwrap().is_empty());
    }

    #[test]
    fn test_closure_resolver_can_fail() {
        let resolver = |_: &Vec<User>, query: &u32| -> Result<User, ResolveError> {
            Err(ResolveError::new(format!("no user {query}")))
        };

        let err = resolver.resolve(&users(), &5).unwrap_err();

        assert_eq!(err.message, "no user 5");
    }
}

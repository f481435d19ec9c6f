//! Cache key signatures.
//!
//! A key is the namespace followed by the JSON encoding of every parameter that
//! shapes the result. JSON string escaping keeps distinct parameter sets from
//! colliding, and normalization makes equivalent requests share an entry.

use std::fmt;

use serde::Serialize;

use crate::domain::types::{NameOrdering, PostStatus, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    PostList,
    CategoryList,
    CategoryPosts,
    PostDetail,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::PostList => "post_list",
            CacheNamespace::CategoryList => "category_list",
            CacheNamespace::CategoryPosts => "category_posts",
            CacheNamespace::PostDetail => "post_detail",
        }
    }
}

/// Parameters of a list query as they participate in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuerySignature {
    pub search: Option<String>,
    pub selectors: Vec<String>,
    pub parent: Option<String>,
    pub status: Option<PostStatus>,
    pub sorting: Option<SortKey>,
    pub ordering: Option<NameOrdering>,
    pub page: u32,
    pub page_size: u32,
}

impl QuerySignature {
    /// Canonical form: blank text dropped, search lower-cased (matching is
    /// case-insensitive), selectors trimmed, sorted and de-duplicated.
    pub fn normalized(mut self) -> Self {
        self.search = normalize_text(self.search).map(|search| search.to_lowercase());
        self.parent = normalize_text(self.parent);
        let mut selectors: Vec<String> = self
            .selectors
            .into_iter()
            .filter_map(|selector| normalize_text(Some(selector)))
            .collect();
        selectors.sort();
        selectors.dedup();
        self.selectors = selectors;
        self
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    encoded: String,
}

impl CacheKey {
    pub fn list(
        namespace: CacheNamespace,
        signature: QuerySignature,
    ) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_string(&signature.normalized())?;
        Ok(Self {
            namespace,
            encoded,
        })
    }

    pub fn post_detail(slug: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            namespace: CacheNamespace::PostDetail,
            encoded: serde_json::to_string(slug.trim())?,
        })
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(namespace: CacheNamespace, signature: QuerySignature) -> CacheKey {
        CacheKey::list(namespace, signature).expect("signature encodes")
    }

    fn detail(slug: &str) -> CacheKey {
        CacheKey::post_detail(slug).expect("slug encodes")
    }

    fn signature() -> QuerySignature {
        QuerySignature {
            search: Some("  Rust ".to_string()),
            selectors: vec![
                "tech".to_string(),
                " science".to_string(),
                "tech".to_string(),
                "".to_string(),
            ],
            status: Some(PostStatus::Published),
            sorting: Some(SortKey::MostViewed),
            ordering: Some(NameOrdering::Az),
            page: 2,
            page_size: 10,
            ..Default::default()
        }
    }

    #[test]
    fn list_key_encodes_normalized_signature() {
        let key = list(CacheNamespace::PostList, signature());
        insta::assert_snapshot!(
            key.to_string(),
            @r#"post_list:{"search":"rust","selectors":["science","tech"],"parent":null,"status":"published","sorting":"most_viewed","ordering":"az","page":2,"page_size":10}"#
        );
    }

    #[test]
    fn selector_order_and_duplicates_do_not_change_the_key() {
        let mut reordered = signature();
        reordered.selectors = vec!["science".to_string(), "tech".to_string()];
        assert_eq!(
            list(CacheNamespace::PostList, signature()),
            list(CacheNamespace::PostList, reordered)
        );
    }

    #[test]
    fn every_parameter_separates_keys() {
        let base = list(CacheNamespace::PostList, signature());
        let variants = [
            QuerySignature {
                page: 3,
                ..signature()
            },
            QuerySignature {
                sorting: Some(SortKey::Newest),
                ..signature()
            },
            QuerySignature {
                ordering: Some(NameOrdering::Za),
                ..signature()
            },
            QuerySignature {
                search: Some("go".to_string()),
                ..signature()
            },
            QuerySignature {
                selectors: vec!["tech".to_string()],
                ..signature()
            },
            QuerySignature {
                status: Some(PostStatus::Draft),
                ..signature()
            },
        ];
        for variant in variants {
            assert_ne!(base, list(CacheNamespace::PostList, variant));
        }
        assert_ne!(
            base,
            list(CacheNamespace::CategoryPosts, signature())
        );
    }

    #[test]
    fn delimiter_characters_cannot_forge_a_selector_list() {
        let joined = QuerySignature {
            selectors: vec!["a\",\"b".to_string()],
            ..Default::default()
        };
        let split = QuerySignature {
            selectors: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        assert_ne!(
            list(CacheNamespace::PostList, joined),
            list(CacheNamespace::PostList, split)
        );
    }

    #[test]
    fn detail_keys_are_per_slug() {
        assert_eq!(
            detail("hello").to_string(),
            r#"post_detail:"hello""#
        );
        assert_ne!(detail("a"), detail("b"));
    }

    #[test]
    fn blank_and_control_slugs_encode_to_distinct_keys() {
        assert_eq!(detail("   ").to_string(), "post_detail:\"\"");
        assert_eq!(detail("\u{0}").to_string(), r#"post_detail:"\u0000""#);
        assert_ne!(detail(""), detail("\u{0}"));
    }
}

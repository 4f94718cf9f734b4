//! Predictive search suggestion types.
//!
//! Mirrors the subset of `/search/suggest.json` the drawer's search box
//! renders: products, collections and query completions.

use serde::{Deserialize, Serialize};

/// Raw `/search/suggest.json` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuggestResponse {
    #[serde(default)]
    pub resources: SuggestResources,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuggestResources {
    #[serde(default)]
    pub results: SearchSuggestions,
}

/// Suggestions grouped by resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchSuggestions {
    #[serde(default)]
    pub products: Vec<ProductSuggestion>,
    #[serde(default)]
    pub collections: Vec<CollectionSuggestion>,
    #[serde(default)]
    pub queries: Vec<QuerySuggestion>,
}

impl SearchSuggestions {
    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.collections.is_empty() && self.queries.is_empty()
    }

    /// Total number of suggestions.
    pub fn len(&self) -> usize {
        self.products.len() + self.collections.len() + self.queries.len()
    }
}

/// A suggested product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSuggestion {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub vendor: Option<String>,
    /// Price as the storefront formats it (a decimal string such as "25.00").
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub image: Option<String>,
}

/// A suggested collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionSuggestion {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub url: String,
}

/// A suggested query completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySuggestion {
    pub text: String,
    #[serde(default)]
    pub styled_text: Option<String>,
    #[serde(default)]
    pub url: String,
}

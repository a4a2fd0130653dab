use serde::{Deserialize, Serialize};

use crate::catalog::TitleKind;

/// Keys under which the pipeline stages exchange data in the graph context.
pub mod session_keys {
    pub const REQUEST: &str = "request";
    pub const INTENT: &str = "intent";
    pub const CATALOG_QUERY: &str = "catalog_query";
    pub const NATIVE_ITEMS: &str = "native_items";
    pub const RECOMMENDATIONS: &str = "recommendations";
}

/// The downstream call chosen for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogQuery {
    TitleSearch { title_kind: TitleKind, query: String },
    TitleDiscover { title_kind: TitleKind, genre_ids: Vec<u32> },
    TrackSearch { query: String },
}

impl CatalogQuery {
    pub fn is_track_search(&self) -> bool {
        matches!(self, CatalogQuery::TrackSearch { .. })
    }
}

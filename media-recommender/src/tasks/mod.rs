// Recommendation pipeline tasks, one per stage
pub mod classify_intent;
pub mod normalize_results;
pub mod search_titles;
pub mod search_tracks;
pub mod select_provider;

// Shared modules
pub mod types;

pub use classify_intent::ClassifyIntentTask;
pub use normalize_results::NormalizeTask;
pub use search_titles::SearchTitlesTask;
pub use search_tracks::SearchTracksTask;
pub use select_provider::SelectProviderTask;

pub use types::{CatalogQuery, session_keys};

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{CatalogQuery, session_keys};
use crate::catalog::{TitleKind, genres};
use crate::config::GenrePolicy;
use crate::models::Intent;
use crate::workflow::Stage;

/// Classified → ProviderSelected.
pub struct SelectProviderTask {
    policy: GenrePolicy,
}

impl SelectProviderTask {
    pub fn new(policy: GenrePolicy) -> Self {
        Self { policy }
    }

    /// Songs go to track search. Movies and TV go to genre discovery only for
    /// genre intents under the discover policy with at least one known genre;
    /// everything else is a text search.
    pub fn select(&self, intent: &Intent) -> CatalogQuery {
        let Some(title_kind) = TitleKind::from_medium(intent.medium) else {
            return CatalogQuery::TrackSearch {
                query: intent.catalog_query(),
            };
        };

        if intent.is_genre && self.policy == GenrePolicy::Discover {
            let genre_ids = genres::genre_ids(title_kind, &intent.search_terms);
            if !genre_ids.is_empty() {
                return CatalogQuery::TitleDiscover {
                    title_kind,
                    genre_ids,
                };
            }
        }

        CatalogQuery::TitleSearch {
            title_kind,
            query: intent.catalog_query(),
        }
    }
}

#[async_trait]
impl Task for SelectProviderTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let intent: Intent = context.require(session_keys::INTENT).await?;
        let query = self.select(&intent);

        info!(
            task_id = %self.id(),
            stage = %Stage::ProviderSelected,
            policy = ?self.policy,
            query = ?query,
            "Provider selected"
        );
        context.set(session_keys::CATALOG_QUERY, query).await?;

        Ok(TaskResult::new(None, NextAction::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medium;

    fn intent(medium: Medium, terms: &[&str], is_genre: bool) -> Intent {
        Intent {
            medium,
            search_terms: terms.iter().map(|t| t.to_string()).collect(),
            is_genre,
        }
    }

    #[test]
    fn songs_use_track_search() {
        let query = SelectProviderTask::new(GenrePolicy::Discover)
            .select(&intent(Medium::Song, &["rock"], true));
        assert_eq!(
            query,
            CatalogQuery::TrackSearch {
                query: "rock".into()
            }
        );
    }

    #[test]
    fn genre_intent_discovers_under_discover_policy() {
        let query = SelectProviderTask::new(GenrePolicy::Discover)
            .select(&intent(Medium::Movie, &["Comedy", "Action"], true));
        assert_eq!(
            query,
            CatalogQuery::TitleDiscover {
                title_kind: TitleKind::Movie,
                genre_ids: vec![35, 28],
            }
        );
    }

    #[test]
    fn genre_intent_searches_under_search_policy() {
        let query = SelectProviderTask::new(GenrePolicy::Search)
            .select(&intent(Medium::Tv, &["Comedy", "Action"], true));
        assert_eq!(
            query,
            CatalogQuery::TitleSearch {
                title_kind: TitleKind::Tv,
                query: "Comedy Action".into(),
            }
        );
    }

    #[test]
    fn unknown_genres_fall_back_to_search() {
        let query = SelectProviderTask::new(GenrePolicy::Discover)
            .select(&intent(Medium::Movie, &["heist caper"], true));
        assert!(matches!(query, CatalogQuery::TitleSearch { .. }));
    }

    #[test]
    fn keyword_queries_are_truncated() {
        let query = SelectProviderTask::new(GenrePolicy::Discover).select(&intent(
            Medium::Movie,
            &["slow burn psychological horror", "set in winter"],
            false,
        ));
        assert_eq!(
            query,
            CatalogQuery::TitleSearch {
                title_kind: TitleKind::Movie,
                query: "slow burn psychological horror".into(),
            }
        );
    }
}

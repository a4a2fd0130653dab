//! Maps provider-native items onto [`Recommendation`].
//!
//! Every mapping is total: a missing native field becomes `None`, nothing
//! here can fail. Lists are cut to a per-medium bound before mapping and
//! keep their provider order.

use serde::{Deserialize, Serialize};

use crate::catalog::{SpotifyTrack, TmdbItem};
use crate::models::{Medium, Recommendation};

pub const MAX_TITLE_RESULTS: usize = 10;
pub const MAX_TRACK_RESULTS: usize = 8;

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
const TMDB_WEB_BASE: &str = "https://www.themoviedb.org";
const UNTITLED: &str = "Untitled";

/// Raw provider results, as fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "items", rename_all = "snake_case")]
pub enum NativeItems {
    Titles(Vec<TmdbItem>),
    Tracks(Vec<SpotifyTrack>),
}

impl NativeItems {
    pub fn len(&self) -> usize {
        match self {
            NativeItems::Titles(items) => items.len(),
            NativeItems::Tracks(items) => items.len(),
        }
    }
}

pub fn max_results(medium: Medium) -> usize {
    match medium {
        Medium::Movie | Medium::Tv => MAX_TITLE_RESULTS,
        Medium::Song => MAX_TRACK_RESULTS,
    }
}

pub fn normalize(medium: Medium, items: NativeItems) -> Vec<Recommendation> {
    let limit = max_results(medium);
    match items {
        NativeItems::Titles(items) => items
            .into_iter()
            .take(limit)
            .map(|item| title_to_recommendation(medium, item))
            .collect(),
        NativeItems::Tracks(items) => items
            .into_iter()
            .take(limit)
            .map(track_to_recommendation)
            .collect(),
    }
}

fn title_to_recommendation(medium: Medium, item: TmdbItem) -> Recommendation {
    let web_kind = if medium == Medium::Tv { "tv" } else { "movie" };
    Recommendation {
        id: item.id.map(|id| id.to_string()),
        title: item
            .title
            .or(item.name)
            .unwrap_or_else(|| UNTITLED.to_string()),
        overview: item.overview,
        artist: None,
        image_url: item
            .poster_path
            .map(|path| format!("{TMDB_IMAGE_BASE}{path}")),
        release_date: item.release_date.or(item.first_air_date),
        score: item.vote_average,
        external_url: item
            .id
            .map(|id| format!("{TMDB_WEB_BASE}/{web_kind}/{id}")),
    }
}

fn track_to_recommendation(track: SpotifyTrack) -> Recommendation {
    let artists = track
        .artists
        .into_iter()
        .filter_map(|artist| artist.name)
        .collect::<Vec<_>>();
    let (image_url, release_date) = match track.album {
        Some(album) => (
            album.images.into_iter().find_map(|image| image.url),
            album.release_date,
        ),
        None => (None, None),
    };

    Recommendation {
        id: track.id,
        title: track.name.unwrap_or_else(|| UNTITLED.to_string()),
        overview: None,
        artist: (!artists.is_empty()).then(|| artists.join(", ")),
        image_url,
        release_date,
        score: track.popularity,
        external_url: track.external_urls.and_then(|urls| urls.spotify),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spotify::{SpotifyAlbum, SpotifyArtist, SpotifyImage};

    fn titled(n: u64) -> TmdbItem {
        TmdbItem {
            id: Some(n),
            title: Some(format!("Film {n}")),
            ..Default::default()
        }
    }

    #[test]
    fn empty_title_item_maps_to_nulls() {
        let out = normalize(Medium::Movie, NativeItems::Titles(vec![TmdbItem::default()]));
        assert_eq!(
            out,
            vec![Recommendation {
                id: None,
                title: "Untitled".to_string(),
                overview: None,
                artist: None,
                image_url: None,
                release_date: None,
                score: None,
                external_url: None,
            }]
        );
    }

    #[test]
    fn empty_track_maps_to_nulls() {
        let out = normalize(Medium::Song, NativeItems::Tracks(vec![SpotifyTrack::default()]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].artist, None);
        assert_eq!(out[0].image_url, None);
        assert_eq!(out[0].external_url, None);
    }

    #[test]
    fn tv_falls_back_to_name_and_first_air_date() {
        let item = TmdbItem {
            id: Some(1396),
            name: Some("Breaking Bad".into()),
            first_air_date: Some("2008-01-20".into()),
            poster_path: Some("/bb.jpg".into()),
            vote_average: Some(8.9),
            ..Default::default()
        };
        let out = normalize(Medium::Tv, NativeItems::Titles(vec![item]));
        assert_eq!(out[0].title, "Breaking Bad");
        assert_eq!(out[0].release_date.as_deref(), Some("2008-01-20"));
        assert_eq!(
            out[0].image_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/bb.jpg")
        );
        assert_eq!(
            out[0].external_url.as_deref(),
            Some("https://www.themoviedb.org/tv/1396")
        );
    }

    #[test]
    fn titles_are_truncated_in_order() {
        let items = (1..=15).map(titled).collect();
        let out = normalize(Medium::Movie, NativeItems::Titles(items));
        assert_eq!(out.len(), MAX_TITLE_RESULTS);
        let ids: Vec<_> = out.iter().filter_map(|r| r.id.clone()).collect();
        let expected: Vec<_> = (1..=10).map(|n: u64| n.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn track_joins_artists_and_takes_first_image() {
        let track = SpotifyTrack {
            id: Some("t1".into()),
            name: Some("Under Pressure".into()),
            artists: vec![
                SpotifyArtist {
                    name: Some("Queen".into()),
                },
                SpotifyArtist { name: None },
                SpotifyArtist {
                    name: Some("David Bowie".into()),
                },
            ],
            album: Some(SpotifyAlbum {
                name: Some("Hot Space".into()),
                images: vec![
                    SpotifyImage {
                        url: Some("https://img/640".into()),
                    },
                    SpotifyImage {
                        url: Some("https://img/300".into()),
                    },
                ],
                release_date: Some("1982-05-21".into()),
            }),
            popularity: Some(80.0),
            external_urls: None,
        };
        let out = normalize(Medium::Song, NativeItems::Tracks(vec![track]));
        assert_eq!(out[0].artist.as_deref(), Some("Queen, David Bowie"));
        assert_eq!(out[0].image_url.as_deref(), Some("https://img/640"));
        assert_eq!(out[0].release_date.as_deref(), Some("1982-05-21"));
    }

    #[test]
    fn tracks_are_bounded() {
        let tracks = vec![SpotifyTrack::default(); 20];
        assert_eq!(
            normalize(Medium::Song, NativeItems::Tracks(tracks)).len(),
            MAX_TRACK_RESULTS
        );
    }
}

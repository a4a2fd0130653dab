//! Fixed genre name to TMDB genre id tables.

use super::TitleKind;

const MOVIE_GENRES: &[(&str, u32)] = &[
    ("action", 28),
    ("adventure", 12),
    ("animation", 16),
    ("comedy", 35),
    ("crime", 80),
    ("documentary", 99),
    ("drama", 18),
    ("family", 10751),
    ("fantasy", 14),
    ("history", 36),
    ("horror", 27),
    ("music", 10402),
    ("mystery", 9648),
    ("romance", 10749),
    ("science fiction", 878),
    ("sci-fi", 878),
    ("scifi", 878),
    ("tv movie", 10770),
    ("thriller", 53),
    ("war", 10752),
    ("western", 37),
];

const TV_GENRES: &[(&str, u32)] = &[
    ("action & adventure", 10759),
    ("action", 10759),
    ("adventure", 10759),
    ("animation", 16),
    ("comedy", 35),
    ("crime", 80),
    ("documentary", 99),
    ("drama", 18),
    ("family", 10751),
    ("kids", 10762),
    ("mystery", 9648),
    ("news", 10763),
    ("reality", 10764),
    ("sci-fi & fantasy", 10765),
    ("science fiction", 10765),
    ("sci-fi", 10765),
    ("scifi", 10765),
    ("fantasy", 10765),
    ("soap", 10766),
    ("talk", 10767),
    ("war & politics", 10768),
    ("war", 10768),
    ("politics", 10768),
    ("western", 37),
];

pub fn genre_id(kind: TitleKind, name: &str) -> Option<u32> {
    let table = match kind {
        TitleKind::Movie => MOVIE_GENRES,
        TitleKind::Tv => TV_GENRES,
    };
    let needle = name.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(genre, _)| *genre == needle)
        .map(|(_, id)| *id)
}

/// Maps names to ids in order, skipping unknown names and duplicates.
pub fn genre_ids<S: AsRef<str>>(kind: TitleKind, names: &[S]) -> Vec<u32> {
    let mut ids = Vec::new();
    for id in names.iter().filter_map(|n| genre_id(kind, n.as_ref())) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

//! Ordered track catalog.
//!
//! Owns track identity and playback order. Every mutation validates its whole input before
//! touching the stored sequence, so a rejected call leaves the catalog exactly as it was.

use std::collections::HashSet;

use playlist_types::{TrackItem, TrackRef};

use crate::error::{EngineError, Result};

/// A catalog entry: the host descriptor plus what the renderer learned about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub item: TrackItem,
    /// Reported by the renderer once the track has been loaded.
    pub duration: Option<f64>,
}

impl Track {
    fn new(item: TrackItem) -> Self {
        Self {
            item,
            duration: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.track_id
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    tracks: Vec<Track>,
}

/// Check the fields every track must carry.
pub fn validate_item(item: &TrackItem) -> Result<()> {
    if item.track_id.trim().is_empty() {
        return Err(EngineError::InvalidTrack("missing trackId".to_string()));
    }
    if item.asset_url.trim().is_empty() {
        return Err(EngineError::InvalidTrack(format!(
            "track {} has no assetUrl",
            item.track_id
        )));
    }
    Ok(())
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.item.track_id.clone()).collect()
    }

    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == track_id)
    }

    /// Resolve a removal reference. A valid index wins over the id.
    pub fn resolve(&self, target: &TrackRef) -> Option<usize> {
        if let Some(index) = target.track_index.filter(|i| *i < self.tracks.len()) {
            return Some(index);
        }
        target
            .track_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .and_then(|id| self.position_of(id))
    }

    /// Replace the whole sequence. Nothing changes if any entry is rejected.
    pub fn replace(&mut self, items: Vec<TrackItem>) -> Result<()> {
        self.validate_batch(&items, false)?;
        self.tracks = items.into_iter().map(Track::new).collect();
        Ok(())
    }

    /// Insert one item at `at` (or the end) and return its index.
    pub fn insert(&mut self, item: TrackItem, at: Option<usize>) -> Result<usize> {
        self.insert_all(vec![item], at)
    }

    /// Insert a batch, all or nothing, and return the index of its first entry.
    pub fn insert_all(&mut self, items: Vec<TrackItem>, at: Option<usize>) -> Result<usize> {
        let len = self.tracks.len();
        let at = match at {
            Some(index) if index > len => {
                return Err(EngineError::IndexOutOfRange { index, len });
            }
            Some(index) => index,
            None => len,
        };
        self.validate_batch(&items, true)?;
        let tail = self.tracks.split_off(at);
        self.tracks.extend(items.into_iter().map(Track::new));
        self.tracks.extend(tail);
        Ok(at)
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index < self.tracks.len() {
            Some(self.tracks.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Record a renderer-reported duration for the entry at `index`.
    pub fn set_duration(&mut self, index: usize, duration: f64) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.duration = Some(duration);
        }
    }

    fn validate_batch(&self, items: &[TrackItem], against_existing: bool) -> Result<()> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in items {
            validate_item(item)?;
            if !seen.insert(item.track_id.as_str()) {
                return Err(EngineError::DuplicateId(item.track_id.clone()));
            }
            if against_existing && self.position_of(&item.track_id).is_some() {
                return Err(EngineError::DuplicateId(item.track_id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> TrackItem {
        TrackItem::new(id, format!("file:///music/{id}.flac"))
    }

    fn catalog(ids: &[&str]) -> Catalog {
        let mut catalog = Catalog::default();
        catalog.replace(ids.iter().map(|id| item(id)).collect()).unwrap();
        catalog
    }

    #[test]
    fn replace_rejects_invalid_entry_without_changes() {
        let mut catalog = catalog(&["a", "b"]);
        let before = catalog.clone();

        let err = catalog
            .replace(vec![item("c"), TrackItem::new("", "file:///x.flac")])
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidTrack(_)));
        assert_eq!(catalog, before);
    }

    #[test]
    fn replace_rejects_missing_locator() {
        let mut catalog = Catalog::default();
        let err = catalog.replace(vec![TrackItem::new("a", "  ")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTrack(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn replace_rejects_duplicate_ids_in_list() {
        let mut catalog = Catalog::default();
        let err = catalog.replace(vec![item("a"), item("a")]).unwrap_err();
        assert_eq!(err, EngineError::DuplicateId("a".to_string()));
        assert!(catalog.is_empty());
    }

    #[test]
    fn insert_appends_or_places_at_index() {
        let mut catalog = catalog(&["a", "c"]);
        assert_eq!(catalog.insert(item("b"), Some(1)).unwrap(), 1);
        assert_eq!(catalog.insert(item("d"), None).unwrap(), 3);
        assert_eq!(catalog.ids(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn insert_duplicate_leaves_catalog_unchanged() {
        let mut catalog = catalog(&["a", "b"]);
        let before = catalog.clone();
        assert_eq!(
            catalog.insert(item("a"), None).unwrap_err(),
            EngineError::DuplicateId("a".to_string())
        );
        assert_eq!(catalog, before);
    }

    #[test]
    fn insert_past_end_is_out_of_range() {
        let mut catalog = catalog(&["a"]);
        assert_eq!(
            catalog.insert(item("b"), Some(3)).unwrap_err(),
            EngineError::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn insert_all_is_all_or_nothing() {
        let mut catalog = catalog(&["a"]);
        let err = catalog
            .insert_all(vec![item("b"), item("a"), item("c")], None)
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateId("a".to_string()));
        assert_eq!(catalog.ids(), vec!["a"]);

        assert_eq!(catalog.insert_all(vec![item("b"), item("c")], Some(0)).unwrap(), 0);
        assert_eq!(catalog.ids(), vec!["b", "c", "a"]);
    }

    #[test]
    fn resolve_prefers_valid_index_then_id() {
        let catalog = catalog(&["a", "b", "c"]);
        let both = TrackRef {
            track_id: Some("c".to_string()),
            track_index: Some(0),
        };
        assert_eq!(catalog.resolve(&both), Some(0));

        let stale_index = TrackRef {
            track_id: Some("c".to_string()),
            track_index: Some(9),
        };
        assert_eq!(catalog.resolve(&stale_index), Some(2));
        assert_eq!(catalog.resolve(&TrackRef::id("zzz")), None);
        assert_eq!(catalog.resolve(&TrackRef::default()), None);
    }

    #[test]
    fn set_duration_is_kept_on_track() {
        let mut catalog = catalog(&["a"]);
        catalog.set_duration(0, 12.5);
        catalog.set_duration(5, 1.0);
        assert_eq!(catalog.get(0).unwrap().duration, Some(12.5));
    }
}

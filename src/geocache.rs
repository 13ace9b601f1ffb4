use std::collections::HashMap;

/// Bounded LRU memo for reverse-geocode lookups.
///
/// Keyed on coordinates rounded to five decimal places (~1 meter), so
/// repeated submissions from the same spot reuse one cached address. The
/// cache is an explicit object handed to the submission path, never a
/// process-wide map, and it evicts the least recently used entry once full.
#[derive(Debug)]
pub struct GeoCache {
    capacity: usize,
    entries: HashMap<(i64, i64), CacheSlot>,
    tick: u64,
}

#[derive(Debug)]
struct CacheSlot {
    address: String,
    last_used: u64,
}

impl GeoCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, latitude: f64, longitude: f64) -> Option<String> {
        let key = Self::key(latitude, longitude)?;
        self.tick += 1;
        let tick = self.tick;
        let slot = self.entries.get_mut(&key)?;
        slot.last_used = tick;
        Some(slot.address.clone())
    }

    pub fn insert(&mut self, latitude: f64, longitude: f64, address: String) {
        let Some(key) = Self::key(latitude, longitude) else {
            return;
        };
        self.tick += 1;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CacheSlot {
                address,
                last_used: self.tick,
            },
        );
    }

    /// Memoized lookup: returns the cached address for these coordinates,
    /// or runs `lookup` once and caches its result. The lookup is whatever
    /// reverse-geocode collaborator the caller has on hand.
    pub fn resolve<F>(&mut self, latitude: f64, longitude: f64, lookup: F) -> Option<String>
    where
        F: FnOnce(f64, f64) -> Option<String>,
    {
        if let Some(hit) = self.get(latitude, longitude) {
            return Some(hit);
        }
        let address = lookup(latitude, longitude)?;
        self.insert(latitude, longitude, address.clone());
        Some(address)
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn key(latitude: f64, longitude: f64) -> Option<(i64, i64)> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        Some((
            (latitude * 100_000.0).round() as i64,
            (longitude * 100_000.0).round() as i64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_coordinates_share_one_entry() {
        let mut cache = GeoCache::new(4);
        cache.insert(14.599512, 120.984222, "Intramuros, Manila".to_string());
        // Same point within rounding distance.
        let hit = cache.get(14.599514, 120.984224);
        assert_eq!(hit.as_deref(), Some("Intramuros, Manila"));
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut cache = GeoCache::new(2);
        cache.insert(1.0, 1.0, "first".to_string());
        cache.insert(2.0, 2.0, "second".to_string());
        // Touch the first entry so the second becomes LRU.
        assert!(cache.get(1.0, 1.0).is_some());
        cache.insert(3.0, 3.0, "third".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(2.0, 2.0).is_none());
        assert!(cache.get(1.0, 1.0).is_some());
        assert!(cache.get(3.0, 3.0).is_some());
    }

    #[test]
    fn non_finite_coordinates_are_ignored() {
        let mut cache = GeoCache::new(2);
        cache.insert(f64::NAN, 1.0, "nowhere".to_string());
        assert!(cache.is_empty());
        assert!(cache.get(f64::INFINITY, 1.0).is_none());
    }

    #[test]
    fn resolve_runs_the_lookup_once_per_location() {
        let mut cache = GeoCache::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            let label = cache.resolve(14.5995, 120.9842, |_, _| {
                calls += 1;
                Some("Intramuros, Manila".to_string())
            });
            assert_eq!(label.as_deref(), Some("Intramuros, Manila"));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn reinserting_an_existing_key_does_not_evict() {
        let mut cache = GeoCache::new(2);
        cache.insert(1.0, 1.0, "first".to_string());
        cache.insert(2.0, 2.0, "second".to_string());
        cache.insert(1.0, 1.0, "first updated".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1.0, 1.0).as_deref(), Some("first updated"));
        assert!(cache.get(2.0, 2.0).is_some());
    }
}

//! An ordered container keyed by non-overlapping [`Region`]s, with the
//! fragmentation-aware operations the dependency engine's registration and
//! linking passes are built on.
//!
//! A [`RegionMap`] never holds two entries whose regions overlap. Callers
//! that need finer granularity than what's currently stored — e.g. a task
//! writes `[0, 64)` but the map holds a single entry covering `[0, 1024)` —
//! ask the map to [`fragment_intersecting`](RegionMap::fragment_intersecting)
//! first, which splits existing entries at the requested boundaries,
//! cloning their value into each half. This mirrors how the engine actually
//! reasons about overlapping accesses: a access that is only partially
//! superseded by a later one is split into sub-accesses that inherit the
//! original's state.

use region::Region;
use std::collections::{BTreeMap, BTreeSet};

struct Entry<V> {
    region: Region,
    value: V,
}

/// A map from non-overlapping [`Region`]s to values of type `V`.
pub struct RegionMap<V> {
    entries: BTreeMap<usize, Entry<V>>,
}

impl<V> Default for RegionMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RegionMap<V> {
    #[must_use]
    pub fn new() -> Self {
        RegionMap {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts `value` for `region`.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `region` overlaps any region already in
    /// the map. Callers that don't know whether `region` is already
    /// (partially) covered should go through
    /// [`process_intersecting_and_missing`](Self::process_intersecting_and_missing)
    /// instead.
    pub fn insert(&mut self, region: Region, value: V) {
        debug_assert!(
            !self.overlaps_any(region),
            "insert of {region:?} overlaps an existing entry"
        );
        if region.is_empty() {
            return;
        }
        self.entries.insert(region.start(), Entry { region, value });
    }

    /// Iterates over every stored `(region, &value)` pair in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Region, &V)> {
        self.entries.values().map(|e| (e.region, &e.value))
    }

    fn overlaps_any(&self, region: Region) -> bool {
        self.overlapping_keys(region).next().is_some()
    }

    /// Keys (map-internal start addresses) of every entry whose region
    /// intersects `region`, in address order.
    fn overlapping_keys(&self, region: Region) -> impl Iterator<Item = usize> + '_ {
        let floor = if region.is_empty() {
            None
        } else {
            self.entries
                .range(..region.start())
                .next_back()
                .filter(|(_, e)| e.region.intersects(region))
                .map(|(&k, _)| k)
        };
        let rest = self
            .entries
            .range(region.start()..)
            .take_while(move |(_, e)| e.region.start() < region.end())
            .filter(move |(_, e)| e.region.intersects(region))
            .map(|(&k, _)| k);
        floor.into_iter().chain(rest)
    }

    /// Splits every entry that straddles one of `region`'s boundaries so
    /// that, afterward, every stored entry is either fully inside or fully
    /// outside `region`. The split-off halves inherit the original entry's
    /// value via [`Clone`].
    ///
    /// No-op for any part of `region` not currently covered by an entry.
    pub fn fragment_intersecting(&mut self, region: Region)
    where
        V: Clone,
    {
        if region.is_empty() {
            return;
        }
        for key in self.overlapping_keys(region).collect::<Vec<_>>() {
            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            let overlap = entry.region.intersection(region);
            let (before, after) = entry.region.subtract(region);
            if !before.is_empty() {
                self.entries.insert(
                    before.start(),
                    Entry {
                        region: before,
                        value: entry.value.clone(),
                    },
                );
            }
            if !after.is_empty() {
                self.entries.insert(
                    after.start(),
                    Entry {
                        region: after,
                        value: entry.value.clone(),
                    },
                );
            }
            debug_assert!(!overlap.is_empty());
            self.entries.insert(
                overlap.start(),
                Entry {
                    region: overlap,
                    value: entry.value,
                },
            );
        }
    }

    /// Fragments at `region`'s boundaries, then calls `f` once for every
    /// entry now fully contained in `region`, in address order.
    pub fn process_intersecting<F>(&mut self, region: Region, mut f: F)
    where
        V: Clone,
        F: FnMut(Region, &mut V),
    {
        self.fragment_intersecting(region);
        for key in self.overlapping_keys(region).collect::<Vec<_>>() {
            if let Some(entry) = self.entries.get_mut(&key) {
                f(entry.region, &mut entry.value);
            }
        }
    }

    /// Like [`process_intersecting`](Self::process_intersecting), but also
    /// calls `f_missing` for every gap in `region` that isn't currently
    /// covered by any entry, and inserts whatever it returns.
    ///
    /// This is how the engine fills in a brand new access's region: parts
    /// already tracked (because an earlier access on the same address range
    /// is still live) are handed to `f_present`; untracked parts get a
    /// freshly created entry from `f_missing`.
    pub fn process_intersecting_and_missing<FPresent, FMissing>(
        &mut self,
        region: Region,
        mut f_present: FPresent,
        mut f_missing: FMissing,
    ) where
        V: Clone,
        FPresent: FnMut(Region, &mut V),
        FMissing: FnMut(Region) -> V,
    {
        if region.is_empty() {
            return;
        }
        self.fragment_intersecting(region);

        let mut cursor = region.start();
        for key in self.overlapping_keys(region).collect::<Vec<_>>() {
            let entry_region = self.entries[&key].region;
            if entry_region.start() > cursor {
                let gap = Region::from_bounds(cursor, entry_region.start());
                let value = f_missing(gap);
                self.entries.insert(gap.start(), Entry { region: gap, value });
            }
            f_present(entry_region, &mut self.entries.get_mut(&key).unwrap().value);
            cursor = entry_region.end();
        }
        if cursor < region.end() {
            let gap = Region::from_bounds(cursor, region.end());
            let value = f_missing(gap);
            self.entries.insert(gap.start(), Entry { region: gap, value });
        }
    }

    /// Fragments at `region`'s boundaries and fills every uncovered gap
    /// with a clone of `value`, leaving entries that already covered part
    /// of `region` untouched.
    pub fn fragment_by_intersection(&mut self, region: Region, value: V)
    where
        V: Clone,
    {
        self.process_intersecting_and_missing(region, |_, _| {}, |_gap| value.clone());
    }

    /// Like [`process_intersecting`](Self::process_intersecting), except
    /// `f` is handed a `&mut RegionMap<V>` and is free to insert new
    /// entries into `region` (e.g. while recursing into a predecessor's own
    /// bottom map). Entries inserted this way are themselves visited before
    /// the pass finishes, so newly discovered sub-ranges aren't skipped.
    ///
    /// `f` must not remove the entry it was called with from the map
    /// (taking its value and deciding whether to put it back is handled by
    /// this method); it may freely insert, remove, or fragment anything
    /// else.
    pub fn process_intersecting_with_recent_additions<F>(&mut self, region: Region, mut f: F)
    where
        V: Clone,
        F: FnMut(Region, &mut V, &mut RegionMap<V>),
    {
        if region.is_empty() {
            return;
        }
        self.fragment_intersecting(region);

        let mut visited = BTreeSet::new();
        loop {
            let Some(key) = self
                .overlapping_keys(region)
                .find(|k| !visited.contains(k))
            else {
                break;
            };
            visited.insert(key);
            let Some(mut entry) = self.entries.remove(&key) else {
                continue;
            };
            f(entry.region, &mut entry.value, self);
            if !entry.region.is_empty() {
                self.entries.insert(entry.region.start(), entry);
            }
        }
    }

    /// Removes the entry stored under exactly `region`, if any.
    ///
    /// Unlike the fragmenting operations above, this requires an exact
    /// match — it's used to remove a bottom-map entry whose region is
    /// already known precisely, not to carve a region out of whatever
    /// happens to be there.
    pub fn remove_exact(&mut self, region: Region) -> Option<V> {
        let entry = self.entries.get(&region.start())?;
        if entry.region != region {
            return None;
        }
        self.entries.remove(&region.start()).map(|e| e.value)
    }
}

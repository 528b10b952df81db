//! The table engine underneath [`HashMap`](crate::HashMap).
//!
//! A [`RawTable`] owns a contiguous run of groups — eight slots plus a
//! 64-bit control word each — and implements the probe loop, tombstone
//! policy, and growth policy over them. It does not hash anything itself:
//! callers pass in the 64-bit hash for every operation, plus a closure
//! that can re-hash keys when an insert has to rebuild the table. Feeding
//! hashes from different hash functions (or differently seeded ones) into
//! the same table will strand entries where no probe can find them.

mod bitmask;
mod group;

use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;

use alloc::boxed::Box;
use alloc::vec;

use self::bitmask::{BitMask, DELETED, EMPTY};
use self::group::Group;

/// FULL control bytes a group may carry before growth triggers: seven of
/// its eight slots. The spare eighth keeps probe chains terminable.
const GROUP_LOAD: usize = 7;

/// Number of groups allocated for a requested capacity of `hint` entries,
/// with headroom so the early inserts don't immediately rehash. A zero
/// hint is sized as if ten entries had been requested.
#[inline]
fn groups_for(hint: usize) -> usize {
    let n = if hint == 0 { 10 } else { hint };
    (n + GROUP_LOAD + 1) / GROUP_LOAD
}

/// The hash bits that pick a home group.
#[inline]
fn h1(hash: u64) -> u64 {
    hash >> 7
}

/// The low seven hash bits, stored verbatim as a FULL control byte.
#[inline]
fn h2(hash: u64) -> u8 {
    (hash & 0x7f) as u8
}

/// An open-addressed table of `(K, V)` pairs probed one group at a time.
///
/// The group holding a key is found by scanning forward (wrapping at the
/// end) from the key's home group until a control-byte tag match confirms
/// it or a group containing an EMPTY byte rules it out. Removals in
/// otherwise-unavailable groups leave DELETED bytes behind so that rule
/// stays sound.
pub struct RawTable<K, V> {
    groups: Box<[Group<K, V>]>,
    /// FULL control bytes, plus tombstones not yet subtracted. The live
    /// entry count is `used - tombstones`.
    used: usize,
    /// DELETED control bytes, as far as the counter knows; reusing a
    /// tombstone for an insert does not decrement it, so it can overstate
    /// until the next rehash reconciles both counters.
    tombstones: usize,
    /// `used` threshold beyond which an insert rebuilds the table. Always
    /// `GROUP_LOAD` times the number of groups.
    cap: usize,
}

impl<K, V> RawTable<K, V> {
    /// Allocates a table able to hold about `hint` entries before its
    /// first rehash. The table always has at least one group.
    pub fn with_capacity(hint: usize) -> Self {
        let ngroups = groups_for(hint);
        RawTable {
            groups: (0..ngroups).map(|_| Group::new()).collect(),
            used: 0,
            tombstones: 0,
            cap: ngroups * GROUP_LOAD,
        }
    }

    /// Number of live entries.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn len(&self) -> usize {
        self.used - self.tombstones
    }

    /// Whether the table holds no live entries.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `len` at which the next insert triggers a rehash. A multiple
    /// of seven by construction.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Walks the probe chain for `hash` and returns the `(group, slot)`
    /// coordinates of the entry `eq` accepts.
    #[cfg_attr(feature = "inline-more", inline)]
    fn locate(&self, hash: u64, mut eq: impl FnMut(&K) -> bool) -> Option<(usize, usize)> {
        let tag = h2(hash);
        let ngroups = self.groups.len();
        let mut g = (h1(hash) % ngroups as u64) as usize;
        loop {
            let group = &self.groups[g];
            for i in group.match_tag(tag) {
                // A matched byte is FULL, so the slot is initialized.
                if eq(&unsafe { group.slot(i) }.0) {
                    return Some((g, i));
                }
            }
            // An EMPTY byte here means no later group can hold the key:
            // an insert of it would have stopped by this group too.
            if group.mask_empty().any() {
                return None;
            }
            g += 1;
            if g == ngroups {
                g = 0;
            }
        }
    }

    /// Finds the entry for `hash` accepted by `eq`.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn find(&self, hash: u64, eq: impl FnMut(&K) -> bool) -> Option<&(K, V)> {
        self.locate(hash, eq)
            .map(|(g, i)| unsafe { self.groups[g].slot(i) })
    }

    /// Finds the entry for `hash` accepted by `eq`, mutably.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn find_mut(&mut self, hash: u64, eq: impl FnMut(&K) -> bool) -> Option<&mut (K, V)> {
        self.locate(hash, eq)
            .map(|(g, i)| unsafe { self.groups[g].slot_mut(i) })
    }

    /// Removes and returns the entry for `hash` accepted by `eq`.
    ///
    /// The freed control byte becomes EMPTY when its group still has an
    /// EMPTY byte (no probe chain continues past such a group), and a
    /// DELETED tombstone otherwise.
    pub fn remove(&mut self, hash: u64, eq: impl FnMut(&K) -> bool) -> Option<(K, V)> {
        let (g, i) = self.locate(hash, eq)?;
        let group = &mut self.groups[g];
        // The entry moves out first; byte `i` still reads FULL, so the
        // check below asks about the other seven slots.
        let pair = unsafe { group.read_slot(i) };
        if group.mask_empty().any() {
            group.set_ctrl(i, EMPTY);
            self.used -= 1;
        } else {
            group.set_ctrl(i, DELETED);
            self.tombstones += 1;
        }
        Some(pair)
    }

    /// Drops every entry and resets all control bytes to EMPTY. The group
    /// allocation and capacity are kept.
    pub fn clear(&mut self) {
        for group in self.groups.iter_mut() {
            group.clear();
        }
        self.used = 0;
        self.tombstones = 0;
    }

    /// Iterates over the entries in storage order.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn iter(&self) -> RawIter<'_, K, V> {
        RawIter {
            current: self.groups[0].mask_full(),
            groups: &self.groups,
            gi: 0,
            left: self.len(),
        }
    }

    /// Iterates over the entries in storage order, with mutable access to
    /// the values.
    #[cfg_attr(feature = "inline-more", inline)]
    pub fn iter_mut(&mut self) -> RawIterMut<'_, K, V> {
        RawIterMut {
            current: self.groups[0].mask_full(),
            groups: self.groups.as_mut_ptr(),
            gi: 0,
            left: self.len(),
            _marker: PhantomData,
        }
    }

    /// Marks slot `(g, i)` FULL with `tag` and stores `pair` in it.
    #[cfg_attr(feature = "inline-more", inline)]
    fn install(&mut self, g: usize, i: usize, tag: u8, pair: (K, V)) {
        // Writing over a DELETED byte leaves `tombstones` as is; the two
        // counters are reconciled at the next rehash.
        self.groups[g].write_slot(i, pair, tag);
        self.used += 1;
    }

    /// Finds the first EMPTY or DELETED slot on the probe chain for
    /// `hash`. Only correct while `used <= cap`, which guarantees such a
    /// slot exists.
    #[cfg_attr(feature = "inline-more", inline)]
    fn free_slot(&self, hash: u64) -> (usize, usize) {
        let ngroups = self.groups.len();
        let mut g = (h1(hash) % ngroups as u64) as usize;
        loop {
            if let Some(i) = self.groups[g].mask_empty_or_deleted().first() {
                return (g, i);
            }
            g += 1;
            if g == ngroups {
                g = 0;
            }
        }
    }

    /// Rebuilds the table and re-inserts every live entry.
    ///
    /// When at least half the capacity is tombstones the rebuild keeps
    /// the current size — the pressure came from deletions, not growth —
    /// and otherwise doubles it. Which groups entries land in changes
    /// either way, since the group count changes the `h1` reduction.
    #[cold]
    #[inline(never)]
    fn rehash(&mut self, hasher: &impl Fn(&K) -> u64) {
        let hint = if self.tombstones >= self.cap / 2 {
            self.cap
        } else {
            self.cap * 2
        };
        let ngroups = groups_for(hint);
        let old = mem::replace(
            &mut self.groups,
            (0..ngroups).map(|_| Group::new()).collect(),
        );
        self.cap = ngroups * GROUP_LOAD;
        self.used = 0;
        self.tombstones = 0;
        for mut group in old.into_vec() {
            for i in group.mask_full() {
                let pair = unsafe { group.read_slot(i) };
                // Hand the slot back before the group drops, or the pair
                // would drop twice.
                group.set_ctrl(i, EMPTY);
                let hash = hasher(&pair.0);
                let (g, slot) = self.free_slot(hash);
                self.install(g, slot, h2(hash), pair);
            }
        }
    }
}

impl<K: Eq, V> RawTable<K, V> {
    /// Inserts `key`/`value` under `hash`, returning the previous value
    /// if the key was already present.
    ///
    /// The probe scans for the key as far as a lookup would, remembering
    /// the first EMPTY or DELETED slot on the way; a miss installs the
    /// pair there, reusing a tombstone when one came first. `hasher` is
    /// only called if the insert pushes `used` past capacity and the
    /// table rebuilds.
    pub fn insert(&mut self, hash: u64, key: K, value: V, hasher: impl Fn(&K) -> u64) -> Option<V> {
        let tag = h2(hash);
        let ngroups = self.groups.len();
        let mut g = (h1(hash) % ngroups as u64) as usize;
        let mut target = None;
        loop {
            for i in self.groups[g].match_tag(tag) {
                let slot = unsafe { self.groups[g].slot_mut(i) };
                if slot.0 == key {
                    return Some(mem::replace(&mut slot.1, value));
                }
            }
            if target.is_none() {
                target = self.groups[g].mask_empty_or_deleted().first().map(|i| (g, i));
            }
            if self.groups[g].mask_empty().any() {
                break;
            }
            g += 1;
            if g == ngroups {
                g = 0;
            }
        }
        // The loop only breaks at a group containing an EMPTY byte, so a
        // target was recorded there at the latest.
        let (g, i) = match target {
            Some(t) => t,
            None => unreachable!("probe ended with no free slot"),
        };
        self.install(g, i, tag, (key, value));
        if self.used > self.cap {
            self.rehash(&hasher);
        }
        None
    }
}

impl<K, V> Default for RawTable<K, V> {
    fn default() -> Self {
        RawTable::with_capacity(0)
    }
}

impl<K: Clone, V: Clone> Clone for RawTable<K, V> {
    fn clone(&self) -> Self {
        RawTable {
            groups: self.groups.clone(),
            used: self.used,
            tombstones: self.tombstones,
            cap: self.cap,
        }
    }
}

impl<K, V> IntoIterator for RawTable<K, V> {
    type Item = (K, V);
    type IntoIter = RawIntoIter<K, V>;

    #[cfg_attr(feature = "inline-more", inline)]
    fn into_iter(self) -> RawIntoIter<K, V> {
        let left = self.len();
        RawIntoIter {
            groups: self.groups.into_vec().into_iter(),
            current: None,
            left,
        }
    }
}

/// Borrowing iterator over a table's entries.
pub struct RawIter<'a, K, V> {
    groups: &'a [Group<K, V>],
    current: BitMask,
    gi: usize,
    left: usize,
}

impl<'a, K, V> Iterator for RawIter<'a, K, V> {
    type Item = &'a (K, V);

    #[cfg_attr(feature = "inline-more", inline)]
    fn next(&mut self) -> Option<&'a (K, V)> {
        if self.left == 0 {
            return None;
        }
        loop {
            if let Some(i) = self.current.next() {
                self.left -= 1;
                let group: &'a Group<K, V> = &self.groups[self.gi];
                return Some(unsafe { group.slot(i) });
            }
            // `left > 0`, so a later group still has a FULL slot.
            self.gi += 1;
            self.current = self.groups[self.gi].mask_full();
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}

impl<K, V> Clone for RawIter<'_, K, V> {
    #[cfg_attr(feature = "inline-more", inline)]
    fn clone(&self) -> Self {
        RawIter {
            groups: self.groups,
            current: self.current,
            gi: self.gi,
            left: self.left,
        }
    }
}

impl<K, V> ExactSizeIterator for RawIter<'_, K, V> {}
impl<K, V> FusedIterator for RawIter<'_, K, V> {}

/// Borrowing iterator handing out shared keys and mutable values.
pub struct RawIterMut<'a, K, V> {
    groups: *mut Group<K, V>,
    current: BitMask,
    gi: usize,
    left: usize,
    _marker: PhantomData<&'a mut Group<K, V>>,
}

unsafe impl<K: Send, V: Send> Send for RawIterMut<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for RawIterMut<'_, K, V> {}

impl<'a, K, V> Iterator for RawIterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[cfg_attr(feature = "inline-more", inline)]
    fn next(&mut self) -> Option<(&'a K, &'a mut V)> {
        if self.left == 0 {
            return None;
        }
        loop {
            if let Some(i) = self.current.next() {
                self.left -= 1;
                // Each (group, slot) coordinate is produced once, so the
                // borrows handed out never alias.
                let group: &'a mut Group<K, V> = unsafe { &mut *self.groups.add(self.gi) };
                let slot = unsafe { group.slot_mut(i) };
                return Some((&slot.0, &mut slot.1));
            }
            self.gi += 1;
            self.current = unsafe { (*self.groups.add(self.gi)).mask_full() };
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}

impl<K, V> ExactSizeIterator for RawIterMut<'_, K, V> {}
impl<K, V> FusedIterator for RawIterMut<'_, K, V> {}

/// Owning iterator over a table's entries.
///
/// Entries not yet yielded when the iterator drops are dropped with it.
pub struct RawIntoIter<K, V> {
    groups: vec::IntoIter<Group<K, V>>,
    current: Option<(Group<K, V>, BitMask)>,
    left: usize,
}

impl<K, V> Iterator for RawIntoIter<K, V> {
    type Item = (K, V);

    #[cfg_attr(feature = "inline-more", inline)]
    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some((group, mask)) = &mut self.current {
                if let Some(i) = mask.next() {
                    let pair = unsafe { group.read_slot(i) };
                    // Keep the group's drop from double-freeing the slot.
                    group.set_ctrl(i, EMPTY);
                    self.left -= 1;
                    return Some(pair);
                }
            }
            let group = self.groups.next()?;
            let mask = group.mask_full();
            self.current = Some((group, mask));
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}

impl<K, V> ExactSizeIterator for RawIntoIter<K, V> {}
impl<K, V> FusedIterator for RawIntoIter<K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    // Hashes here are handcrafted: `tagged(g, t)` probes from group `g`
    // with tag `t`, given a table whose group count divides h1 evenly.
    fn tagged(group: u64, tag: u64) -> u64 {
        (group << 7) | tag
    }

    fn no_rehash(_: &u32) -> u64 {
        panic!("test expected no rehash");
    }

    #[test]
    fn groups_for_matches_the_sizing_rule() {
        assert_eq!(groups_for(0), 2); // sized as ten entries
        assert_eq!(groups_for(1), 1);
        assert_eq!(groups_for(6), 2);
        assert_eq!(groups_for(10), 2);
        assert_eq!(groups_for(13), 3);
        assert_eq!(groups_for(100), 15);
    }

    #[test]
    fn capacity_is_seven_per_group() {
        for hint in [0, 1, 10, 100, 1000] {
            let t: RawTable<u32, u32> = RawTable::with_capacity(hint);
            assert_eq!(t.capacity() % GROUP_LOAD, 0);
            assert_eq!(t.capacity(), groups_for(hint) * GROUP_LOAD);
        }
    }

    #[test]
    fn chain_survives_a_tombstone() {
        // Four groups (cap 28). Fill group 0 so key 8 overflows into
        // group 1, then tombstone one of group 0's entries.
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(20);
        for k in 0..9u32 {
            t.insert(tagged(0, k as u64), k, k * 10, no_rehash);
        }
        assert_eq!(t.len(), 9);

        t.remove(tagged(0, 3), |&k| k == 3).unwrap();
        assert_eq!(t.tombstones, 1, "full home group must tombstone");
        assert_eq!(t.len(), 8);

        // The overflowed key is still reachable through the tombstone.
        assert_eq!(t.find(tagged(0, 8), |&k| k == 8), Some(&(8, 80)));
    }

    #[test]
    fn insert_reuses_a_tombstone_without_duplicating() {
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(20);
        for k in 0..9u32 {
            t.insert(tagged(0, k as u64), k, k, no_rehash);
        }
        t.remove(tagged(0, 3), |&k| k == 3).unwrap();

        // Key 8 lives in group 1; re-inserting it must overwrite there,
        // not resurrect it in group 0's tombstone slot.
        assert_eq!(t.insert(tagged(0, 8), 8, 88, no_rehash), Some(8));
        assert_eq!(t.len(), 8);
        assert_eq!(t.find(tagged(0, 8), |&k| k == 8), Some(&(8, 88)));

        // A fresh key does take the tombstone slot.
        assert_eq!(t.insert(tagged(0, 3), 100, 100, no_rehash), None);
        assert_eq!(t.len(), 9);
        assert_eq!(t.find(tagged(0, 8), |&k| k == 8), Some(&(8, 88)));
    }

    #[test]
    fn remove_in_a_group_with_room_frees_the_byte() {
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(20);
        t.insert(tagged(2, 5), 1, 10, no_rehash);
        t.remove(tagged(2, 5), |&k| k == 1).unwrap();
        assert_eq!(t.tombstones, 0);
        assert_eq!(t.used, 0);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn probe_wraps_past_the_last_group() {
        // Two groups; start the chain in the final group so it wraps.
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(10);
        for k in 0..9u32 {
            t.insert(tagged(1, k as u64), k, k, no_rehash);
        }
        for k in 0..9u32 {
            assert_eq!(t.find(tagged(1, k as u64), |&c| c == k), Some(&(k, k)));
        }
    }

    #[test]
    fn rehash_fires_past_capacity_and_keeps_entries() {
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(10);
        assert_eq!(t.capacity(), 14);
        let hasher = |k: &u32| tagged(*k as u64, (*k % 127) as u64);
        for k in 0..15u32 {
            t.insert(hasher(&k), k, k + 1000, hasher);
        }
        assert!(t.capacity() > 14);
        assert_eq!(t.capacity() % GROUP_LOAD, 0);
        assert_eq!(t.len(), 15);
        for k in 0..15u32 {
            assert_eq!(t.find(hasher(&k), |&c| c == k), Some(&(k, k + 1000)));
        }
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(50);
        let cap = t.capacity();
        for k in 0..20u32 {
            t.insert(tagged(k as u64, 1), k, k, no_rehash);
        }
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(t.capacity(), cap);
        assert_eq!(t.find(tagged(4, 1), |&k| k == 4), None);
    }

    #[test]
    fn iterators_visit_each_entry_once() {
        let mut t: RawTable<u32, u32> = RawTable::with_capacity(30);
        for k in 0..20u32 {
            t.insert(tagged(k as u64, (k % 127) as u64), k, k, no_rehash);
        }

        let mut seen: Vec<u32> = t.iter().map(|&(k, _)| k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());

        for (_, v) in t.iter_mut() {
            *v += 1;
        }
        let mut owned: Vec<(u32, u32)> = t.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned, (0..20).map(|k| (k, k + 1)).collect::<Vec<_>>());
    }
}

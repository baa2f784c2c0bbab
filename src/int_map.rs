use std::cmp;
use std::fmt;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::mem;

use foldhash::fast::FixedState;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Sentinel key marking an empty array slot. The entry for key `0` lives in
/// `zero_value` instead, so the sentinel can never collide with a real key.
const EMPTY: i32 = 0;

/// Multipliers for the three non-identity hash functions. Distinct odd
/// constants decorrelate the four candidate slots, which is what keeps
/// eviction chains short at ordinary load factors.
const PRIME1: u32 = 0xbe1f14b1;
const PRIME2: u32 = 0xb4b82e39;
const PRIME3: u32 = 0xced1c241;

const DEFAULT_CAPACITY: usize = 51;
const DEFAULT_LOAD_FACTOR: f32 = 0.8;

/// Largest supported backing capacity. The hash functions fold a 32-bit
/// product down by `31 - log2(capacity)` bits, which stops making sense past
/// this point.
const MAX_CAPACITY: usize = 1 << 30;

/// Stash slots appended after the primary region: `max(3, ceil(ln cap) * 2)`.
fn stash_capacity_for(capacity: usize) -> usize {
    cmp::max(3, (capacity as f64).ln().ceil() as usize * 2)
}

/// Eviction budget per insert: `max(min(cap, 8), sqrt(cap) / 8)`.
fn push_iterations_for(capacity: usize) -> usize {
    cmp::max(cmp::min(capacity, 8), (capacity as f64).sqrt() as usize / 8)
}

/// An unordered map from `i32` keys to values, implemented as a cuckoo hash
/// table with four candidate slots per key, bounded random-walk eviction, and
/// a small stash for problematic keys.
///
/// `get`, `contains_key`, and `remove` probe at most four slots plus the
/// stash, so lookups run in O(1) with a small constant. `insert` is amortized
/// O(1); a colliding insert may displace other entries along a random walk
/// whose length is capped by a capacity-derived budget, spilling into the
/// stash when the budget runs out. No allocation is done except when the
/// table grows.
///
/// Key `0` doubles as the empty-slot sentinel in the backing arrays and is
/// therefore stored out of band; it behaves like any other key.
///
/// Eviction victims are chosen by an owned random number generator,
/// [`SmallRng`] unless another [`Rng`] is supplied through
/// [`with_rng`](IntMap::with_rng). Seeding that generator makes eviction
/// order, and with it the internal layout, fully reproducible.
///
/// The map is not thread-safe: callers needing concurrent access must add
/// their own synchronization. Iteration order is unspecified, except that the
/// zero-key entry is always yielded first.
///
/// # Examples
///
/// ```rust
/// use cuckoo_intmap::IntMap;
///
/// let mut sprites = IntMap::new();
/// sprites.insert(0, "player");
/// sprites.insert(17, "goblin");
///
/// assert_eq!(sprites.get(17), Some(&"goblin"));
/// assert_eq!(sprites.get(0), Some(&"player"));
/// assert_eq!(sprites.remove(17), Some("goblin"));
/// assert_eq!(sprites.len(), 1);
/// ```
#[derive(Clone)]
pub struct IntMap<V, R = SmallRng> {
    keys: Box<[i32]>,
    values: Box<[Option<V>]>,
    zero_value: Option<V>,

    size: usize,
    capacity: usize,
    stash_size: usize,

    load_factor: f32,
    threshold: usize,
    hash_shift: u32,
    mask: u32,
    stash_capacity: usize,
    push_iterations: usize,

    rng: R,
}

impl<V> IntMap<V> {
    /// Creates a new map with an initial capacity of 51 and a load factor of
    /// 0.8.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let map: IntMap<String> = IntMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new map with a load factor of 0.8, sized to hold
    /// `initial_capacity` entries before growing.
    ///
    /// # Panics
    ///
    /// Panics if the backing capacity derived from `initial_capacity` would
    /// exceed 2^30.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let map: IntMap<String> = IntMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(initial_capacity, DEFAULT_LOAD_FACTOR)
    }

    /// Creates a new map that holds `initial_capacity` entries before
    /// growing. The backing capacity is the next power of two of
    /// `initial_capacity / load_factor`.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not greater than zero, or if the derived
    /// backing capacity would exceed 2^30.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let map: IntMap<u64> = IntMap::with_capacity_and_load_factor(4, 0.8);
    /// assert_eq!(map.capacity(), 8);
    /// ```
    pub fn with_capacity_and_load_factor(initial_capacity: usize, load_factor: f32) -> Self {
        Self::with_rng(initial_capacity, load_factor, SmallRng::from_os_rng())
    }
}

impl<V> Default for IntMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, R> IntMap<V, R> {
    /// Returns the number of entries in the map, including the zero-key
    /// entry.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the size of the primary region of the backing arrays. Always
    /// a power of two.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a reference to the value for `key`, or `None` if `key` is not
    /// present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(1), Some(&"a"));
    /// assert_eq!(map.get(2), None);
    /// ```
    pub fn get(&self, key: i32) -> Option<&V> {
        if key == 0 {
            return self.zero_value.as_ref();
        }
        let index = self.find_slot(key)?;
        self.values[index].as_ref()
    }

    /// Returns a reference to the value for `key`, or `default` if `key` is
    /// not present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(3, 30);
    /// assert_eq!(*map.get_or(3, &-1), 30);
    /// assert_eq!(*map.get_or(9, &-1), -1);
    /// ```
    pub fn get_or<'a>(&'a self, key: i32, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    /// Returns a mutable reference to the value for `key`, or `None` if
    /// `key` is not present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(1, 10);
    /// if let Some(value) = map.get_mut(1) {
    ///     *value += 5;
    /// }
    /// assert_eq!(map.get(1), Some(&15));
    /// ```
    pub fn get_mut(&mut self, key: i32) -> Option<&mut V> {
        if key == 0 {
            return self.zero_value.as_mut();
        }
        let index = self.find_slot(key)?;
        self.values[index].as_mut()
    }

    /// Returns `true` if the map contains an entry for `key`.
    pub fn contains_key(&self, key: i32) -> bool {
        if key == 0 {
            return self.zero_value.is_some();
        }
        self.find_slot(key).is_some()
    }

    /// Removes the entry for `key`, returning its value if `key` was
    /// present. Removing an absent key is a no-op.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(1), Some("a"));
    /// assert_eq!(map.remove(1), None);
    /// assert!(!map.contains_key(1));
    /// ```
    pub fn remove(&mut self, key: i32) -> Option<V> {
        if key == 0 {
            let old = self.zero_value.take();
            if old.is_some() {
                self.size -= 1;
            }
            return old;
        }
        let index = self.find_slot(key)?;
        self.size -= 1;
        if index >= self.capacity {
            self.remove_stash_index(index)
        } else {
            self.keys[index] = EMPTY;
            self.values[index].take()
        }
    }

    /// Removes all entries, keeping the allocated capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(0, "zero");
    /// map.insert(9, "nine");
    /// map.clear();
    /// assert!(map.is_empty());
    /// ```
    pub fn clear(&mut self) {
        if self.size == 0 {
            return;
        }
        self.keys.fill(EMPTY);
        for value in self.values.iter_mut() {
            *value = None;
        }
        self.zero_value = None;
        self.size = 0;
        self.stash_size = 0;
    }

    /// Retains only the entries for which `pred` returns `true`.
    ///
    /// This is the removal-during-iteration primitive: rejected primary
    /// slots are cleared in place, and rejected stash slots are swap-removed
    /// so the stash stays dense for lookup scans. The zero-key entry, if
    /// present, is visited first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// for key in 1..=6 {
    ///     map.insert(key, key * 10);
    /// }
    /// map.retain(|key, _| key % 2 == 0);
    /// assert_eq!(map.len(), 3);
    /// assert!(map.contains_key(4));
    /// assert!(!map.contains_key(5));
    /// ```
    pub fn retain(&mut self, mut pred: impl FnMut(i32, &mut V) -> bool) {
        if let Some(value) = self.zero_value.as_mut() {
            if !pred(0, value) {
                self.zero_value = None;
                self.size -= 1;
            }
        }
        for index in 0..self.capacity {
            let key = self.keys[index];
            if key == EMPTY {
                continue;
            }
            let keep = match self.values[index].as_mut() {
                Some(value) => pred(key, value),
                None => continue,
            };
            if !keep {
                self.keys[index] = EMPTY;
                self.values[index] = None;
                self.size -= 1;
            }
        }
        let mut index = self.capacity;
        while index < self.capacity + self.stash_size {
            let keep = match self.values[index].as_mut() {
                Some(value) => pred(self.keys[index], value),
                None => true,
            };
            if keep {
                index += 1;
            } else {
                self.remove_stash_index(index);
                self.size -= 1;
            }
        }
    }

    /// Returns `true` if any value in the map equals `value`.
    ///
    /// Traverses the entire map and compares every value, which may be an
    /// expensive operation.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.find_key(value).is_some()
    }

    /// Returns `true` if any value in the map satisfies `pred`. See
    /// [`find_key_by`](IntMap::find_key_by).
    pub fn contains_value_by(&self, pred: impl FnMut(&V) -> bool) -> bool {
        self.find_key_by(pred).is_some()
    }

    /// Returns the key whose value equals `value`, or `None` if there is
    /// none. When several values match, which key is returned is
    /// unspecified.
    ///
    /// Traverses the entire map and compares every value, which may be an
    /// expensive operation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(0, "origin");
    /// map.insert(8, "cursor");
    /// assert_eq!(map.find_key(&"origin"), Some(0));
    /// assert_eq!(map.find_key(&"missing"), None);
    /// ```
    pub fn find_key(&self, value: &V) -> Option<i32>
    where
        V: PartialEq,
    {
        self.find_key_by(|candidate| candidate == value)
    }

    /// Returns the key of a value satisfying `pred`, or `None` if there is
    /// none.
    ///
    /// The predicate form supports comparison modes `PartialEq` cannot
    /// express; pass `|v| std::ptr::eq(v, target)` for identity comparison
    /// of shared references.
    pub fn find_key_by(&self, mut pred: impl FnMut(&V) -> bool) -> Option<i32> {
        if let Some(value) = self.zero_value.as_ref() {
            if pred(value) {
                return Some(0);
            }
        }
        for index in 0..self.capacity + self.stash_size {
            if let Some(value) = self.values[index].as_ref() {
                if pred(value) {
                    return Some(self.keys[index]);
                }
            }
        }
        None
    }

    /// Returns an iterator over the `(key, &value)` pairs of the map.
    ///
    /// The zero-key entry, if present, is yielded first; the remaining
    /// entries follow in arbitrary storage order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(1, "one");
    /// map.insert(2, "two");
    ///
    /// let mut total = 0;
    /// for (key, _) in map.iter() {
    ///     total += key;
    /// }
    /// assert_eq!(total, 3);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            zero: self.zero_value.as_ref(),
            keys: &self.keys,
            values: &self.values,
            index: 0,
            end: self.capacity + self.stash_size,
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator that removes and yields every entry. The map is
    /// empty once the iterator is exhausted or dropped; capacity is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// map.insert(1, "one");
    /// map.insert(2, "two");
    ///
    /// let drained: Vec<(i32, &str)> = map.drain().collect();
    /// assert_eq!(drained.len(), 2);
    /// assert!(map.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V, R> {
        let end = self.capacity + self.stash_size;
        Drain {
            map: self,
            index: 0,
            end,
        }
    }

    #[inline]
    fn hash2(&self, key: u32) -> usize {
        let h = key.wrapping_mul(PRIME1);
        ((h ^ (h >> self.hash_shift)) & self.mask) as usize
    }

    #[inline]
    fn hash3(&self, key: u32) -> usize {
        let h = key.wrapping_mul(PRIME2);
        ((h ^ (h >> self.hash_shift)) & self.mask) as usize
    }

    #[inline]
    fn hash4(&self, key: u32) -> usize {
        let h = key.wrapping_mul(PRIME3);
        ((h ^ (h >> self.hash_shift)) & self.mask) as usize
    }

    /// The four candidate slots for a nonzero key: identity placement plus
    /// the three multiplicative hashes.
    #[inline]
    fn candidate_slots(&self, key: i32) -> [usize; 4] {
        let h = key as u32;
        [
            (h & self.mask) as usize,
            self.hash2(h),
            self.hash3(h),
            self.hash4(h),
        ]
    }

    /// Locates the slot holding `key`, probing the four candidate slots and
    /// then scanning the stash. `key` must be nonzero.
    fn find_slot(&self, key: i32) -> Option<usize> {
        debug_assert_ne!(key, EMPTY);
        for index in self.candidate_slots(key) {
            if self.keys[index] == key {
                return Some(index);
            }
        }
        self.keys[self.capacity..self.capacity + self.stash_size]
            .iter()
            .position(|&stashed| stashed == key)
            .map(|offset| self.capacity + offset)
    }

    /// Swap-removes a stash slot, moving the last stash pair into its place
    /// so the stash stays dense and contiguous.
    fn remove_stash_index(&mut self, index: usize) -> Option<V> {
        self.stash_size -= 1;
        let last = self.capacity + self.stash_size;
        let value = self.values[index].take();
        if index < last {
            self.keys[index] = self.keys[last];
            self.values[index] = self.values[last].take();
        }
        self.keys[last] = EMPTY;
        value
    }
}

impl<V, R: Rng> IntMap<V, R> {
    /// Creates a new map that draws eviction decisions from `rng` instead of
    /// an OS-seeded [`SmallRng`]. A seeded generator makes eviction order
    /// reproducible, which pins down the internal layout for tests.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not greater than zero, or if the derived
    /// backing capacity would exceed 2^30.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    /// use rand::SeedableRng;
    /// use rand::rngs::SmallRng;
    ///
    /// let mut map = IntMap::with_rng(64, 0.8, SmallRng::seed_from_u64(7));
    /// map.insert(12, "npc");
    /// assert_eq!(map.get(12), Some(&"npc"));
    /// ```
    pub fn with_rng(initial_capacity: usize, load_factor: f32, rng: R) -> Self {
        assert!(load_factor > 0.0, "load_factor must be > 0: {load_factor}");
        let scaled = ((initial_capacity as f64) / (load_factor as f64)).ceil() as usize;
        assert!(
            scaled <= MAX_CAPACITY,
            "initial_capacity is too large: {initial_capacity}"
        );
        let capacity = scaled.next_power_of_two();
        let stash_capacity = stash_capacity_for(capacity);
        let total = capacity + stash_capacity;
        IntMap {
            keys: vec![EMPTY; total].into_boxed_slice(),
            values: (0..total).map(|_| None).collect(),
            zero_value: None,
            size: 0,
            capacity,
            stash_size: 0,
            load_factor,
            threshold: (capacity as f32 * load_factor) as usize,
            hash_shift: 31 - capacity.trailing_zeros(),
            mask: (capacity - 1) as u32,
            stash_capacity,
            push_iterations: push_iterations_for(capacity),
            rng,
        }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned. If it
    /// did, the value is overwritten in place and the old value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: i32, value: V) -> Option<V> {
        if key == 0 {
            let old = self.zero_value.replace(value);
            if old.is_none() {
                self.size += 1;
            }
            return old;
        }
        if let Some(index) = self.find_slot(key) {
            return self.values[index].replace(value);
        }
        self.insert_new(key, value);
        None
    }

    /// Copies every entry of `other` into this map, overwriting values for
    /// keys present in both.
    pub fn insert_all<R2>(&mut self, other: &IntMap<V, R2>)
    where
        V: Clone,
    {
        self.reserve(other.len());
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }

    /// Grows the table so that `additional` more entries fit without
    /// rehashing. Useful before a bulk load.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.size + additional;
        if needed >= self.threshold {
            let scaled = ((needed as f64) / (self.load_factor as f64)).ceil() as usize;
            self.resize(scaled.next_power_of_two());
        }
    }

    /// Reduces the backing arrays to hold `maximum_capacity` slots, or the
    /// next power of two above it. Does nothing if the arrays are already
    /// that small; if the map holds more than `maximum_capacity` entries,
    /// the live entry count is used instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::with_capacity(1_000);
    /// for key in 1..=20 {
    ///     map.insert(key, key);
    /// }
    /// map.shrink_to(0);
    /// assert_eq!(map.capacity(), 32);
    /// assert_eq!(map.len(), 20);
    /// ```
    pub fn shrink_to(&mut self, maximum_capacity: usize) {
        let maximum_capacity = cmp::max(maximum_capacity, self.size);
        if self.capacity <= maximum_capacity {
            return;
        }
        let shrunk = maximum_capacity.next_power_of_two();
        if shrunk < self.capacity {
            self.resize(shrunk);
        }
    }

    /// Clears the map, reducing the backing arrays to `maximum_capacity`
    /// slots (rounded up to a power of two) if they are larger.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cuckoo_intmap::IntMap;
    ///
    /// let mut map = IntMap::with_capacity(1_000);
    /// map.insert(1, "a");
    /// map.clear_to(16);
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 16);
    /// ```
    pub fn clear_to(&mut self, maximum_capacity: usize) {
        if self.capacity <= maximum_capacity {
            self.clear();
            return;
        }
        self.zero_value = None;
        self.size = 0;
        self.resize(maximum_capacity.next_power_of_two());
    }

    /// Places a key that is known to be absent. Used by `insert` after the
    /// existing-key probe, and by `resize`, which visits each key exactly
    /// once.
    fn insert_new(&mut self, key: i32, value: V) {
        debug_assert_ne!(key, EMPTY);
        let slots = self.candidate_slots(key);
        if let Some(&open) = slots.iter().find(|&&index| self.keys[index] == EMPTY) {
            self.keys[open] = key;
            self.values[open] = Some(value);
            self.grow_on_insert();
            return;
        }
        let occupants = slots.map(|index| self.keys[index]);
        self.push(key, value, slots, occupants);
    }

    /// The cuckoo random walk: evict a uniformly random occupant of the four
    /// candidate slots, install the incoming pair in its place, then keep
    /// walking with the evicted pair until an empty slot turns up or the
    /// iteration budget runs out. An exhausted walk spills the last evicted
    /// pair into the stash.
    fn push(
        &mut self,
        mut insert_key: i32,
        mut insert_value: V,
        mut slots: [usize; 4],
        mut occupants: [i32; 4],
    ) {
        for _ in 0..self.push_iterations {
            let victim = self.rng.random_range(0..4usize);
            let index = slots[victim];
            let evicted_key = occupants[victim];
            let evicted_value = self.values[index]
                .replace(insert_value)
                .expect("eviction candidate is occupied");
            self.keys[index] = insert_key;

            slots = self.candidate_slots(evicted_key);
            if let Some(&open) = slots.iter().find(|&&slot| self.keys[slot] == EMPTY) {
                self.keys[open] = evicted_key;
                self.values[open] = Some(evicted_value);
                self.grow_on_insert();
                return;
            }
            occupants = slots.map(|slot| self.keys[slot]);
            insert_key = evicted_key;
            insert_value = evicted_value;
        }
        self.push_stash(insert_key, insert_value);
    }

    /// Appends an evicted pair to the stash. If the stash is already full,
    /// doubles the table and re-runs the insert from scratch against the
    /// grown table, which strictly increases the number of empty slots and
    /// so guarantees progress.
    fn push_stash(&mut self, key: i32, value: V) {
        if self.stash_size == self.stash_capacity {
            let doubled = self.capacity << 1;
            self.resize(doubled);
            self.insert_new(key, value);
            return;
        }
        let index = self.capacity + self.stash_size;
        self.keys[index] = key;
        self.values[index] = Some(value);
        self.stash_size += 1;
        // Stash entries count toward `size`; the threshold check waits for
        // the next regular insert.
        self.size += 1;
    }

    /// Accounts for a newly placed array entry, doubling the table once the
    /// load threshold is crossed.
    fn grow_on_insert(&mut self) {
        self.size += 1;
        if self.size > self.threshold {
            let doubled = self.capacity << 1;
            self.resize(doubled);
        }
    }

    /// Rebuilds the table at `new_capacity`, recomputing every
    /// capacity-derived field together and re-inserting each live array
    /// entry. The zero-key entry lives outside the arrays and is untouched.
    fn resize(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity.is_power_of_two());
        let old_end = self.capacity + self.stash_size;

        self.capacity = new_capacity;
        self.threshold = (new_capacity as f32 * self.load_factor) as usize;
        self.mask = (new_capacity - 1) as u32;
        self.hash_shift = 31 - new_capacity.trailing_zeros();
        self.stash_capacity = stash_capacity_for(new_capacity);
        self.push_iterations = push_iterations_for(new_capacity);

        let total = new_capacity + self.stash_capacity;
        let old_keys = mem::replace(&mut self.keys, vec![EMPTY; total].into_boxed_slice());
        let mut old_values = mem::replace(&mut self.values, (0..total).map(|_| None).collect());

        let old_size = self.size;
        self.size = usize::from(self.zero_value.is_some());
        self.stash_size = 0;
        if old_size > 0 {
            let keys = old_keys[..old_end].iter();
            for (&key, value) in keys.zip(old_values[..old_end].iter_mut()) {
                if key != EMPTY {
                    if let Some(value) = value.take() {
                        self.insert_new(key, value);
                    }
                }
            }
        }
    }
}

impl<V: fmt::Debug, R> fmt::Debug for IntMap<V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(&key, value);
        }
        map.finish()
    }
}

impl<V: PartialEq, R, R2> PartialEq<IntMap<V, R2>> for IntMap<V, R> {
    fn eq(&self, other: &IntMap<V, R2>) -> bool {
        self.size == other.size && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<V: Eq, R> Eq for IntMap<V, R> {}

impl<V: Hash, R> Hash for IntMap<V, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Entries come out in arbitrary storage order, so fold them with a
        // commutative sum to stay layout-independent.
        let entry_hasher = FixedState::default();
        let mut digest = 0u64;
        for (key, value) in self.iter() {
            digest = digest.wrapping_add(entry_hasher.hash_one((key, value)));
        }
        state.write_usize(self.size);
        state.write_u64(digest);
    }
}

impl<V, R: Rng> Extend<(i32, V)> for IntMap<V, R> {
    fn extend<I: IntoIterator<Item = (i32, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower_bound, _) = iter.size_hint();
        self.reserve(lower_bound);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, V, R> IntoIterator for &'a IntMap<V, R> {
    type Item = (i32, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the `(key, &value)` pairs of an [`IntMap`].
pub struct Iter<'a, V> {
    zero: Option<&'a V>,
    keys: &'a [i32],
    values: &'a [Option<V>],
    index: usize,
    end: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (i32, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(value) = self.zero.take() {
            return Some((0, value));
        }
        while self.index < self.end {
            let index = self.index;
            self.index += 1;
            if let Some(value) = self.values[index].as_ref() {
                return Some((self.keys[index], value));
            }
        }
        None
    }
}

/// An iterator over the keys of an [`IntMap`].
pub struct Keys<'a, V> {
    inner: Iter<'a, V>,
}

impl<V> Iterator for Keys<'_, V> {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// An iterator over the values of an [`IntMap`].
pub struct Values<'a, V> {
    inner: Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}

/// A draining iterator over the `(key, value)` pairs of an [`IntMap`].
///
/// Dropping the iterator removes any entries it has not yet yielded.
pub struct Drain<'a, V, R = SmallRng> {
    map: &'a mut IntMap<V, R>,
    index: usize,
    end: usize,
}

impl<V, R> Iterator for Drain<'_, V, R> {
    type Item = (i32, V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(value) = self.map.zero_value.take() {
            self.map.size -= 1;
            return Some((0, value));
        }
        while self.index < self.end {
            let index = self.index;
            self.index += 1;
            if let Some(value) = self.map.values[index].take() {
                let key = self.map.keys[index];
                self.map.keys[index] = EMPTY;
                self.map.size -= 1;
                return Some((key, value));
            }
        }
        self.map.stash_size = 0;
        None
    }
}

impl<V, R> Drop for Drain<'_, V, R> {
    fn drop(&mut self) {
        for _ in self {}
    }
}

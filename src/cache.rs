use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
};

/// Maximum frequency limit for an entry in the cache.
const MAX_FREQUENCY_LIMIT: u8 = 3;

struct Entry<V> {
    value: V,
    freq: AtomicU8,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Entry {
            value,
            freq: AtomicU8::new(0),
        }
    }

    fn freq(&self) -> u8 {
        self.freq.load(Ordering::Relaxed)
    }
}

/// A bounded S3-FIFO cache.
///
/// New keys enter the small queue. Keys read more than once before reaching
/// the head of the small queue are promoted to the main queue; the others are
/// evicted and remembered in the ghost queue, so that a quick re-insert goes
/// straight to main. Reads only bump a saturating counter and can be served
/// through `&self`.
pub struct Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    capacity: usize,
    max_small_size: usize,
    /// new entries are added to this queue
    small: VecDeque<K>,
    /// entries that have been accessed at least twice are moved to this queue
    main: VecDeque<K>,
    /// keys evicted from small before being accessed twice
    ghost: VecDeque<K>,
    entries: HashMap<K, Entry<V>>,
    stats: Stats,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` values. A capacity of zero
    /// disables caching.
    pub fn new(capacity: usize) -> Self {
        Cache {
            capacity,
            max_small_size: (capacity / 10).max(1),
            small: VecDeque::new(),
            main: VecDeque::new(),
            ghost: VecDeque::new(),
            entries: HashMap::new(),
            stats: Stats::default(),
        }
    }

    /// Returns a reference to the value of the given key if it exists in the cache.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some(entry) => {
                let freq = (entry.freq() + 1).min(MAX_FREQUENCY_LIMIT);
                entry.freq.store(freq, Ordering::Relaxed);
                self.stats.hit();
                Some(&entry.value)
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    /// Inserts a value, evicting as needed. Replaces the value of a key that
    /// is already cached without changing its position.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            return;
        }

        while self.entries.len() >= self.capacity {
            self.evict();
        }

        let was_ghost = match self.ghost.iter().position(|k| *k == key) {
            Some(pos) => {
                self.ghost.remove(pos);
                true
            }
            None => false,
        };

        self.entries.insert(key.clone(), Entry::new(value));
        if was_ghost {
            self.main.push_back(key);
        } else {
            self.small.push_back(key);
        }
    }

    pub fn clear(&mut self) {
        self.small.clear();
        self.main.clear();
        self.ghost.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `(hits, misses)`.
    pub fn stats(&self) -> (usize, usize) {
        self.stats.get()
    }

    fn evict(&mut self) {
        if self.small.len() > self.max_small_size || self.main.is_empty() {
            self.evict_small();
        } else {
            self.evict_main();
        }
    }

    fn evict_small(&mut self) {
        while let Some(key) = self.small.pop_front() {
            let freq = self.entries.get(&key).map_or(0, Entry::freq);
            if freq > 1 {
                self.main.push_back(key);
            } else {
                self.entries.remove(&key);
                self.push_ghost(key);
                return;
            }
        }
        // every small entry was promoted
        self.evict_main();
    }

    fn evict_main(&mut self) {
        while let Some(key) = self.main.pop_front() {
            match self.entries.get(&key) {
                Some(entry) if entry.freq() > 0 => {
                    entry.freq.store(entry.freq() - 1, Ordering::Relaxed);
                    self.main.push_back(key);
                }
                _ => {
                    self.entries.remove(&key);
                    return;
                }
            }
        }
    }

    fn push_ghost(&mut self, key: K) {
        if self.ghost.len() >= self.capacity {
            self.ghost.pop_front();
        }
        self.ghost.push_back(key);
    }
}

#[derive(Default)]
struct Stats {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Stats {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

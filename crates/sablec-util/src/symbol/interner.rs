//! String interner implementation using DashMap for concurrent access.
//!
//! The table keeps two maps: string hash to symbol for interning, and symbol
//! index to string for O(1) retrieval. Hit/miss/collision counters are kept
//! for profiling.

use ahash::AHasher;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::LazyLock;

use super::{InternerStats, Symbol};

/// Global string table instance
///
/// Initialized on first use via `LazyLock`. The names the entailment solver
/// consults by literal (built-in class names, primitive type constructors,
/// dictionary field names) are pre-interned so they have stable indices.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.initialize_known_symbols();
    table
});

/// Thread-safe string table backed by DashMap
///
/// Strings are allocated on the heap and leaked (intentionally) to obtain
/// `'static` references. This is safe because the table lives for the whole
/// program and interned strings are never removed.
pub struct StringTable {
    /// Maps string hash to (string, symbol index) for fast interning
    map: DashMap<u64, (&'static str, u32)>,

    /// Maps symbol index back to its string for O(1) retrieval
    rev: DashMap<u32, &'static str>,

    /// Counter for the next index (atomic for lock-free increment)
    next_index: AtomicU32,

    /// Number of hash collisions encountered
    collisions: AtomicUsize,

    /// Number of cache hits (string already interned)
    hits: AtomicUsize,

    /// Number of cache misses (new string allocation)
    misses: AtomicUsize,
}

impl StringTable {
    #[inline]
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity(256),
            rev: DashMap::with_capacity(256),
            next_index: AtomicU32::new(0),
            collisions: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Pre-intern the names the type checker looks up by literal
    ///
    /// These are the solver-visible built-in class names, the primitive type
    /// constructors they mention, and the field names of synthesised
    /// dictionary records.
    fn initialize_known_symbols(&self) {
        let known_symbols = [
            // Built-in solver classes
            "Coercible", "IsSymbol", "SymbolCompare", "SymbolAppend", "SymbolCons",
            "Union", "Nub", "Lacks", "Cons", "RowToList", "Warn",
            // Primitive type constructors
            "Function", "Array", "Record",
            "LT", "EQ", "GT", "Nil",
            // Built-in module names
            "Prim", "Prim.Coerce", "Prim.Row", "Prim.RowList", "Prim.Symbol",
            "Sable.Symbol", "Sable.Ordering",
            // Dictionary term shapes
            "reflectSymbol", "_",
        ];

        for symbol in known_symbols {
            self.intern(symbol);
        }
    }

    /// Intern a string, returning its symbol
    ///
    /// Thread-safe; multiple threads can intern concurrently without
    /// blocking each other.
    pub fn intern(&self, string: &str) -> Symbol {
        let hash = Self::hash_string(string);

        // Fast path: check if string is already interned
        if let Some(entry) = self.map.get(&hash) {
            if entry.value().0 == string {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Symbol {
                    index: entry.value().1,
                };
            }
        }

        // Slow path: need to insert
        self.misses.fetch_add(1, Ordering::Relaxed);

        match self.map.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                // Hash collision - check if string matches
                if entry.get().0 == string {
                    return Symbol {
                        index: entry.get().1,
                    };
                }
                // Different string with the same hash
                self.handle_collision(string, hash)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
                let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
                entry.insert((interned, idx));
                self.rev.insert(idx, interned);
                Symbol { index: idx }
            }
        }
    }

    /// Handle hash collisions by probing with modified hashes
    ///
    /// Linear probing with a prime-based offset to find an empty slot or the
    /// existing entry for this string.
    fn handle_collision(&self, string: &str, original_hash: u64) -> Symbol {
        const MAX_PROBES: u64 = 32;
        const PROBE_PRIME: u64 = 0x9e3779b97f4a7c15; // Golden ratio constant

        for i in 1u64..=MAX_PROBES {
            let probe_hash = original_hash.wrapping_add(i.wrapping_mul(PROBE_PRIME));

            if let Some(entry) = self.map.get(&probe_hash) {
                if entry.value().0 == string {
                    return Symbol {
                        index: entry.value().1,
                    };
                }
            } else {
                self.collisions.fetch_add(1, Ordering::Relaxed);
                let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
                let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
                self.map.insert(probe_hash, (interned, idx));
                self.rev.insert(idx, interned);
                return Symbol { index: idx };
            }
        }

        // Probe budget exhausted; accept a potential overwrite of the probe
        // chain rather than looping further.
        self.collisions.fetch_add(1, Ordering::Relaxed);
        let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
        let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
        self.map.insert(original_hash, (interned, idx));
        self.rev.insert(idx, interned);
        Symbol { index: idx }
    }

    /// Get string by symbol
    ///
    /// O(1) via the reverse index.
    pub fn get(&self, symbol: Symbol) -> Option<&'static str> {
        self.rev.get(&symbol.index).map(|entry| *entry.value())
    }

    /// Compute hash of string using AHasher
    #[inline]
    fn hash_string(string: &str) -> u64 {
        let mut hasher = AHasher::default();
        string.hash(&mut hasher);
        hasher.finish()
    }

    /// Get statistics about the string table for profiling
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            count: self.map.len(),
            capacity: self.map.capacity(),
            collisions: self.collisions.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_intern_same_string() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("hello");
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_intern_different_strings() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("world");
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_get_string() {
        let symbol = STRING_TABLE.intern("test_string");
        assert_eq!(STRING_TABLE.get(symbol), Some("test_string"));
    }

    #[test]
    fn test_known_symbols_preinterned() {
        // The built-in class names must already be present
        let stats_before = STRING_TABLE.stats();
        let _ = STRING_TABLE.intern("Coercible");
        let _ = STRING_TABLE.intern("RowToList");
        let stats_after = STRING_TABLE.stats();
        assert_eq!(stats_before.count, stats_after.count);
    }

    #[test]
    fn test_concurrent_intern() {
        let handles: Vec<_> = (0..20)
            .map(|i| thread::spawn(move || STRING_TABLE.intern(&format!("thread_{}", i))))
            .collect();

        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                assert_ne!(symbols[i], symbols[j]);
            }
        }
    }

    #[test]
    fn test_concurrent_same_string() {
        let handles: Vec<_> = (0..10)
            .map(|_| thread::spawn(|| STRING_TABLE.intern("concurrent_same")))
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for symbol in &results[1..] {
            assert_eq!(results[0], *symbol);
        }
    }

    #[test]
    fn test_many_strings_roundtrip() {
        let mut symbols = Vec::new();
        for i in 0..1000 {
            symbols.push(STRING_TABLE.intern(&format!("roundtrip_{}", i)));
        }
        for (i, sym) in symbols.iter().enumerate() {
            let expected = format!("roundtrip_{}", i);
            assert_eq!(STRING_TABLE.get(*sym), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StringTable>();
    }
}

use super::value::Value;

const FNV_OFFSET: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// Grow once three quarters of the slots hold a key or a tombstone.
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

const MIN_CAPACITY: usize = 8;

/// FNV-1a over the key bytes. The same function hashes interned string
/// objects, so a string's stored hash can seed a dict probe directly.
pub fn hash_key(key: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug, Clone)]
enum Slot {
    Empty,
    /// A key lived here once. Probes must step over it, inserts may reuse it.
    Tombstone,
    Occupied { key: String, hash: u32, value: Value },
}

/// Open-addressed hash table with string keys and linear probing.
///
/// Deleted slots become tombstones so probe chains stay intact; tombstones
/// still count toward the load factor, and a rehash copies only live entries,
/// which is what eventually reclaims them. Iteration walks the slots in
/// bucket order, so two tables built by the same insert sequence iterate the
/// same way.
#[derive(Debug, Clone)]
pub struct Table {
    slots: Vec<Slot>,
    /// Occupied plus tombstones, for the load check.
    count: usize,
    /// Occupied only.
    live: usize,
}

impl Table {
    pub fn new() -> Table {
        Table { slots: Vec::new(), count: 0, live: 0 }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if self.live == 0 {
            return None;
        }
        let hash = hash_key(key);
        let mut index = hash as usize % self.slots.len();
        loop {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { key: k, hash: h, value } => {
                    if *h == hash && k == key {
                        return Some(*value);
                    }
                }
            }
            index = (index + 1) % self.slots.len();
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or overwrites. Returns `true` when the key was not present.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if (self.count + 1) * MAX_LOAD_DEN > self.slots.len() * MAX_LOAD_NUM {
            self.grow();
        }
        let hash = hash_key(key);
        let index = self.find_slot(key, hash);
        match &mut self.slots[index] {
            slot @ Slot::Empty => {
                *slot = Slot::Occupied { key: key.to_string(), hash, value };
                self.count += 1;
                self.live += 1;
                true
            }
            slot @ Slot::Tombstone => {
                // The tombstone already counts toward the load factor.
                *slot = Slot::Occupied { key: key.to_string(), hash, value };
                self.live += 1;
                true
            }
            Slot::Occupied { value: v, .. } => {
                *v = value;
                false
            }
        }
    }

    /// Returns `true` when the key was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.live == 0 {
            return false;
        }
        let hash = hash_key(key);
        let mut index = hash as usize % self.slots.len();
        loop {
            match &self.slots[index] {
                Slot::Empty => return false,
                Slot::Tombstone => {}
                Slot::Occupied { key: k, hash: h, .. } => {
                    if *h == hash && k == key {
                        self.slots[index] = Slot::Tombstone;
                        self.live -= 1;
                        return true;
                    }
                }
            }
            index = (index + 1) % self.slots.len();
        }
    }

    /// Live entries in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value, .. } => Some((key.as_str(), *value)),
            _ => None,
        })
    }

    /// First slot the key belongs in: its occupied slot if present,
    /// otherwise the first tombstone on the probe path, otherwise the
    /// terminating empty slot.
    fn find_slot(&self, key: &str, hash: u32) -> usize {
        let mut index = hash as usize % self.slots.len();
        let mut tombstone: Option<usize> = None;
        loop {
            match &self.slots[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied { key: k, hash: h, .. } => {
                    if *h == hash && k == key {
                        return index;
                    }
                }
            }
            index = (index + 1) % self.slots.len();
        }
    }

    fn grow(&mut self) {
        let capacity = (self.slots.len() * 2).max(MIN_CAPACITY);
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.count = 0;
        self.live = 0;
        for slot in old {
            if let Slot::Occupied { key, hash, value } = slot {
                let index = self.find_slot(&key, hash);
                self.slots[index] = Slot::Occupied { key, hash, value };
                self.count += 1;
                self.live += 1;
            }
        }
    }
}

impl Default for Table {
    fn default() -> Table {
        Table::new()
    }
}

use std::collections::HashMap;

use rand::Rng;

use crate::SlotKey;

/// An ordered membership list over arena keys, with O(1) insertion, O(1)
/// removal and in-place random reordering.
///
/// Sets keep one such list per object state (for example `free` and
/// `attached`), and moving an object between states is an unlink from one
/// list followed by a link into another. Iteration during a time step must
/// go through [`snapshot()`](ShuffleList::snapshot), which guarantees that
/// every object present at the start of the step is visited exactly once
/// even if it transfers to another list while being handled; objects linked
/// during the step are not visited before the next one.
#[derive(Default)]
pub struct ShuffleList {
    order: Vec<SlotKey>,
    position: HashMap<SlotKey, usize>,
}

impl ShuffleList {
    pub fn new() -> ShuffleList {
        ShuffleList { order: Vec::new(), position: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: SlotKey) -> bool {
        self.position.contains_key(&key)
    }

    /// Links `key` at the back of the list
    pub fn push(&mut self, key: SlotKey) {
        debug_assert!(!self.contains(key), "key linked twice");
        self.position.insert(key, self.order.len());
        self.order.push(key);
    }

    /// Unlinks `key`; returns false if it was not a member.
    ///
    /// The last element is swapped into the vacated position, so removal
    /// does not preserve order; order is randomized every step anyway.
    pub fn remove(&mut self, key: SlotKey) -> bool {
        let Some(pos) = self.position.remove(&key) else {
            return false;
        };
        self.order.swap_remove(pos);
        if pos < self.order.len() {
            self.position.insert(self.order[pos], pos);
        }
        return true;
    }

    /// Randomizes the iteration order (Fisher-Yates)
    pub fn mix<R: Rng>(&mut self, rng: &mut R) {
        let n = self.order.len();
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            self.order.swap(i, j);
        }
        for (pos, key) in self.order.iter().enumerate() {
            self.position.insert(*key, pos);
        }
    }

    /// Copies the current membership, to be iterated while the list mutates
    pub fn snapshot(&self) -> Vec<SlotKey> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.order.iter().copied()
    }

    pub fn first(&self) -> Option<SlotKey> {
        self.order.first().copied()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.position.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arena;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn link_unlink_transfer() {
        let mut arena = Arena::new();
        let keys: Vec<SlotKey> = (0..5).map(|i| arena.insert(i)).collect();
        let mut free = ShuffleList::new();
        let mut attached = ShuffleList::new();
        for k in &keys {
            free.push(*k);
        }
        // transfer two members
        assert!(free.remove(keys[1]));
        attached.push(keys[1]);
        assert!(free.remove(keys[3]));
        attached.push(keys[3]);
        assert_eq!(free.len() + attached.len(), 5);
        assert!(!free.contains(keys[1]));
        assert!(attached.contains(keys[3]));
        assert!(!free.remove(keys[1]));
    }

    #[test]
    fn mix_preserves_membership() {
        let mut arena = Arena::new();
        let keys: Vec<SlotKey> = (0..20).map(|i| arena.insert(i)).collect();
        let mut list = ShuffleList::new();
        for k in &keys {
            list.push(*k);
        }
        let mut rng = SmallRng::seed_from_u64(7);
        list.mix(&mut rng);
        assert_eq!(list.len(), 20);
        for k in &keys {
            assert!(list.contains(*k));
        }
        // positions stay consistent with order after mixing
        for (pos, key) in list.order.iter().enumerate() {
            assert_eq!(list.position[key], pos);
        }
    }

    #[test]
    fn snapshot_is_stable_under_transfer() {
        let mut arena = Arena::new();
        let keys: Vec<SlotKey> = (0..4).map(|i| arena.insert(i)).collect();
        let mut list = ShuffleList::new();
        for k in &keys {
            list.push(*k);
        }
        let snap = list.snapshot();
        // removing members mid-iteration does not disturb the snapshot
        for k in snap.iter() {
            list.remove(*k);
        }
        assert_eq!(snap.len(), 4);
        assert!(list.is_empty());
    }
}

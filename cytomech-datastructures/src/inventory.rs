use std::collections::BTreeMap;

use crate::SlotKey;

/// Serial number identifying an object within its class, unique and stable
/// for the lifetime of a simulation.
pub type Serial = u32;

/// Assigns serial numbers to objects and finds them back.
///
/// Serial numbers grow monotonically: a removed object's number is never
/// reissued, so references written to trajectory files stay unambiguous.
#[derive(Default)]
pub struct Inventory {
    by_serial: BTreeMap<Serial, SlotKey>,
    next_serial: Serial,
}

impl Inventory {
    pub fn new() -> Inventory {
        Inventory { by_serial: BTreeMap::new(), next_serial: 1 }
    }

    /// Records `key` under a fresh serial number, which is returned
    pub fn assign(&mut self, key: SlotKey) -> Serial {
        let n = self.next_serial;
        self.next_serial += 1;
        self.by_serial.insert(n, key);
        return n;
    }

    /// Records `key` under an explicit serial number, as needed when
    /// objects are reconstructed from a trajectory file.
    pub fn assign_serial(&mut self, serial: Serial, key: SlotKey) {
        self.by_serial.insert(serial, key);
        if serial >= self.next_serial {
            self.next_serial = serial + 1;
        }
    }

    /// Forgets a serial number; the number is not reused
    pub fn unassign(&mut self, serial: Serial) {
        self.by_serial.remove(&serial);
    }

    /// Finds the object registered under `serial`
    pub fn get(&self, serial: Serial) -> Option<SlotKey> {
        self.by_serial.get(&serial).copied()
    }

    /// The smallest assigned serial number
    pub fn first_assigned(&self) -> Option<Serial> {
        self.by_serial.keys().next().copied()
    }

    /// The largest assigned serial number
    pub fn last_assigned(&self) -> Option<Serial> {
        self.by_serial.keys().next_back().copied()
    }

    /// Number of registered objects
    pub fn count(&self) -> usize {
        self.by_serial.len()
    }

    pub fn clear(&mut self) {
        self.by_serial.clear();
        self.next_serial = 1;
    }

    /// Iterates over `(serial, key)` pairs in increasing serial order
    pub fn iter(&self) -> impl Iterator<Item = (Serial, SlotKey)> + '_ {
        self.by_serial.iter().map(|(s, k)| (*s, *k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arena;

    #[test]
    fn serials_are_monotonic_and_not_reused() {
        let mut arena = Arena::new();
        let mut inv = Inventory::new();
        let k1 = arena.insert(());
        let k2 = arena.insert(());
        let s1 = inv.assign(k1);
        let s2 = inv.assign(k2);
        assert!(s2 > s1);
        inv.unassign(s1);
        let s3 = inv.assign(arena.insert(()));
        assert!(s3 > s2);
        assert_eq!(inv.get(s1), None);
        assert_eq!(inv.get(s2), Some(k2));
        assert_eq!(inv.count(), 2);
    }

    #[test]
    fn explicit_assignment_moves_the_counter() {
        let mut arena = Arena::new();
        let mut inv = Inventory::new();
        inv.assign_serial(40, arena.insert(()));
        let s = inv.assign(arena.insert(()));
        assert_eq!(s, 41);
    }
}

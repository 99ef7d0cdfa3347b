use rand::Rng;

use cytomech_datastructures::{Arena, Inventory, Serial, SlotKey, ShuffleList};
use cytomech_numerical::Vec3;

use crate::Hand;

/// Two hands bridged by an elastic link, modeling a cross-linking motor.
pub struct CoupleObj {
    pub hand1: Hand,
    pub hand2: Hand,
    /// position of the complex while it diffuses
    pub pos: Vec3,
    pub prop: usize,
    pub serial: Serial,
}

impl CoupleObj {
    pub fn hand(&self, index: u8) -> &Hand {
        if index == 0 {
            &self.hand1
        } else {
            &self.hand2
        }
    }

    pub fn hand_mut(&mut self, index: u8) -> &mut Hand {
        if index == 0 {
            &mut self.hand1
        } else {
            &mut self.hand2
        }
    }

    pub fn bridging(&self) -> bool {
        self.hand1.attached() && self.hand2.attached()
    }
}

/// All couples, split in four state lists: both hands free, only the
/// first attached, only the second attached, and bridging.
#[derive(Default)]
pub struct CoupleSet {
    pub(crate) arena: Arena<CoupleObj>,
    pub(crate) inventory: Inventory,
    pub free: ShuffleList,
    pub attached1: ShuffleList,
    pub attached2: ShuffleList,
    pub bridging: ShuffleList,
}

impl CoupleSet {
    pub fn new() -> CoupleSet {
        CoupleSet::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn add(&mut self, prop: usize, pos: Vec3) -> SlotKey {
        let key = self.arena.insert(CoupleObj {
            hand1: Hand::new(),
            hand2: Hand::new(),
            pos,
            prop,
            serial: 0,
        });
        let serial = self.inventory.assign(key);
        self.arena.get_mut(key).unwrap().serial = serial;
        self.free.push(key);
        return key;
    }

    pub fn restore(&mut self, obj: CoupleObj) -> SlotKey {
        let serial = obj.serial;
        let (a1, a2) = (obj.hand1.attached(), obj.hand2.attached());
        let key = self.arena.insert(obj);
        self.inventory.assign_serial(serial, key);
        self.list_for(a1, a2).push(key);
        return key;
    }

    pub fn remove(&mut self, key: SlotKey) -> Option<CoupleObj> {
        let obj = self.arena.remove(key)?;
        debug_assert!(!obj.hand1.attached() && !obj.hand2.attached());
        self.inventory.unassign(obj.serial);
        for list in [&mut self.free, &mut self.attached1, &mut self.attached2, &mut self.bridging] {
            list.remove(key);
        }
        Some(obj)
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.inventory.clear();
        self.free.clear();
        self.attached1.clear();
        self.attached2.clear();
        self.bridging.clear();
    }

    pub fn get(&self, key: SlotKey) -> Option<&CoupleObj> {
        self.arena.get(key)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut CoupleObj> {
        self.arena.get_mut(key)
    }

    pub fn find_serial(&self, serial: Serial) -> Option<SlotKey> {
        self.inventory.get(serial)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &CoupleObj)> {
        self.arena.iter()
    }

    fn list_for(&mut self, a1: bool, a2: bool) -> &mut ShuffleList {
        match (a1, a2) {
            (false, false) => &mut self.free,
            (true, false) => &mut self.attached1,
            (false, true) => &mut self.attached2,
            (true, true) => &mut self.bridging,
        }
    }

    /// Relinks a couple into the state list matching its hands
    pub(crate) fn relink(&mut self, key: SlotKey) {
        let (a1, a2) = match self.arena.get(key) {
            Some(c) => (c.hand1.attached(), c.hand2.attached()),
            None => return,
        };
        for list in [&mut self.free, &mut self.attached1, &mut self.attached2, &mut self.bridging] {
            list.remove(key);
        }
        self.list_for(a1, a2).push(key);
    }

    pub fn mix<R: Rng>(&mut self, rng: &mut R) {
        self.free.mix(rng);
        self.attached1.mix(rng);
        self.attached2.mix(rng);
        self.bridging.mix(rng);
    }

    /// Checks that the four lists partition the inventory consistently
    /// with the hand states.
    pub fn bad(&self) -> bool {
        let total =
            self.free.len() + self.attached1.len() + self.attached2.len() + self.bridging.len();
        if total != self.arena.len() {
            return true;
        }
        for (key, c) in self.arena.iter() {
            let expected = match (c.hand1.attached(), c.hand2.attached()) {
                (false, false) => &self.free,
                (true, false) => &self.attached1,
                (false, true) => &self.attached2,
                (true, true) => &self.bridging,
            };
            if !expected.contains(key) {
                return true;
            }
        }
        return false;
    }
}

use rand::Rng;

use cytomech_datastructures::{Arena, Inventory, Serial, SlotKey, ShuffleList};
use cytomech_numerical::Vec3;

use crate::Hand;

/// One hand plus its base: a freely diffusing position, or an anchor on a
/// point of a solid (a "wrist").
pub struct SingleObj {
    pub hand: Hand,
    /// base position; for anchored singles, refreshed from the solid
    pub pos: Vec3,
    /// anchor on a solid point, if any
    pub anchor: Option<(SlotKey, usize)>,
    pub prop: usize,
    pub serial: Serial,
}

/// All singles of the simulation, split by attachment state.
#[derive(Default)]
pub struct SingleSet {
    pub(crate) arena: Arena<SingleObj>,
    pub(crate) inventory: Inventory,
    pub free: ShuffleList,
    pub attached: ShuffleList,
}

impl SingleSet {
    pub fn new() -> SingleSet {
        SingleSet::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn add(&mut self, prop: usize, pos: Vec3) -> SlotKey {
        let key = self.arena.insert(SingleObj {
            hand: Hand::new(),
            pos,
            anchor: None,
            prop,
            serial: 0,
        });
        let serial = self.inventory.assign(key);
        self.arena.get_mut(key).unwrap().serial = serial;
        self.free.push(key);
        return key;
    }

    /// Adds a single anchored on a point of a solid
    pub fn add_wrist(&mut self, prop: usize, solid: SlotKey, point: usize, pos: Vec3) -> SlotKey {
        let key = self.add(prop, pos);
        self.arena.get_mut(key).unwrap().anchor = Some((solid, point));
        return key;
    }

    pub fn restore(&mut self, obj: SingleObj) -> SlotKey {
        let serial = obj.serial;
        let attached = obj.hand.attached();
        let key = self.arena.insert(obj);
        self.inventory.assign_serial(serial, key);
        if attached {
            self.attached.push(key);
        } else {
            self.free.push(key);
        }
        return key;
    }

    /// Removes a single; it must be detached first
    pub fn remove(&mut self, key: SlotKey) -> Option<SingleObj> {
        let obj = self.arena.remove(key)?;
        debug_assert!(!obj.hand.attached());
        self.inventory.unassign(obj.serial);
        self.free.remove(key);
        self.attached.remove(key);
        Some(obj)
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.inventory.clear();
        self.free.clear();
        self.attached.clear();
    }

    pub fn get(&self, key: SlotKey) -> Option<&SingleObj> {
        self.arena.get(key)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut SingleObj> {
        self.arena.get_mut(key)
    }

    pub fn find_serial(&self, serial: Serial) -> Option<SlotKey> {
        self.inventory.get(serial)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &SingleObj)> {
        self.arena.iter()
    }

    /// Relinks a single into the state list matching its hand; called
    /// after every attachment or detachment.
    pub(crate) fn relink(&mut self, key: SlotKey) {
        let attached = match self.arena.get(key) {
            Some(s) => s.hand.attached(),
            None => return,
        };
        self.free.remove(key);
        self.attached.remove(key);
        if attached {
            self.attached.push(key);
        } else {
            self.free.push(key);
        }
    }

    pub fn mix<R: Rng>(&mut self, rng: &mut R) {
        self.free.mix(rng);
        self.attached.mix(rng);
    }

    /// Checks the list bookkeeping: every single sits in exactly the list
    /// of its state, and the two lists partition the inventory.
    pub fn bad(&self) -> bool {
        if self.free.len() + self.attached.len() != self.arena.len() {
            return true;
        }
        for (key, s) in self.arena.iter() {
            let ok = if s.hand.attached() {
                self.attached.contains(key) && !self.free.contains(key)
            } else {
                self.free.contains(key) && !self.attached.contains(key)
            };
            if !ok {
                return true;
            }
        }
        return false;
    }
}

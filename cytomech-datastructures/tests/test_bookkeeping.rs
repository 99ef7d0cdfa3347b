use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use cytomech_datastructures::{Arena, Inventory, ShuffleList, SlotKey};

/// Serial numbers stay unique and monotonically increasing through
/// arbitrary insert/remove churn, even as slots are reused.
#[test]
fn serials_survive_slot_reuse() {
    let mut rng = SmallRng::seed_from_u64(19);
    let mut arena: Arena<u32> = Arena::new();
    let mut inventory = Inventory::new();
    let mut live: Vec<(u32, SlotKey)> = Vec::new();
    let mut last_serial = 0;

    for step in 0..1000 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let key = arena.insert(step);
            let serial = inventory.assign(key);
            assert!(serial > last_serial, "serials must increase");
            last_serial = serial;
            live.push((serial, key));
        } else {
            let i = rng.gen_range(0..live.len());
            let (serial, key) = live.swap_remove(i);
            assert_eq!(inventory.get(serial), Some(key));
            arena.remove(key).unwrap();
            inventory.unassign(serial);
            assert_eq!(inventory.get(serial), None);
        }
    }
    assert_eq!(arena.len(), live.len());
    assert_eq!(inventory.count(), live.len());
    for (serial, key) in live {
        assert_eq!(inventory.get(serial), Some(key));
        assert!(arena.contains(key));
    }
}

/// Transfers between per-state lists conserve membership: every key is in
/// exactly one list at all times.
#[test]
fn list_transfers_conserve_membership() {
    let mut rng = SmallRng::seed_from_u64(23);
    let mut arena: Arena<()> = Arena::new();
    let keys: Vec<SlotKey> = (0..50).map(|_| arena.insert(())).collect();

    let mut lists = [ShuffleList::new(), ShuffleList::new(), ShuffleList::new()];
    for k in &keys {
        lists[0].push(*k);
    }
    for _ in 0..2000 {
        let from = rng.gen_range(0..3);
        let to = rng.gen_range(0..3);
        if from == to || lists[from].is_empty() {
            continue;
        }
        let snapshot = lists[from].snapshot();
        let k = snapshot[rng.gen_range(0..snapshot.len())];
        assert!(lists[from].remove(k));
        lists[to].push(k);

        let total: usize = lists.iter().map(|l| l.len()).sum();
        assert_eq!(total, keys.len());
        for key in &keys {
            let memberships = lists.iter().filter(|l| l.contains(*key)).count();
            assert_eq!(memberships, 1, "a key must live in exactly one list");
        }
        // occasional reshuffles must not disturb membership
        if rng.gen_bool(0.05) {
            lists[to].mix(&mut rng);
        }
    }
}

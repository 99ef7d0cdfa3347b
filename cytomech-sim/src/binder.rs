//! Coordinated state changes of binders and fibers.
//!
//! Attachment and detachment touch three parties at once: the hand, the
//! fiber's binder registry, and the per-state lists of the owning set.
//! These free functions keep the three consistent; they are the only place
//! where a hand changes state.

use cytomech_datastructures::SlotKey;

use crate::{BinderRef, CoupleSet, FiberSet, Properties, SingleSet};

/// Attaches the hand of a single to a fiber at the given abscissa
pub fn attach_single(singles: &mut SingleSet, fibers: &mut FiberSet, key: SlotKey, fiber: SlotKey, ab: f64) {
    let s = singles.get_mut(key).expect("attaching a dead single");
    s.hand.attach(fiber, ab);
    fibers.get_mut(fiber).expect("attaching to a dead fiber").binders.push(BinderRef::Single(key));
    singles.relink(key);
}

/// Detaches a single; its base keeps the position where the hand let go
pub fn detach_single(singles: &mut SingleSet, fibers: &mut FiberSet, key: SlotKey) {
    let s = singles.get_mut(key).expect("detaching a dead single");
    let (fib, ab) = s.hand.attachment().expect("detaching a free single");
    if let Some(fobj) = fibers.get_mut(fib) {
        if s.anchor.is_none() {
            s.pos = fobj.fiber.pos_at(ab);
        }
        fobj.binders.retain(|b| *b != BinderRef::Single(key));
    }
    s.hand.detach();
    singles.relink(key);
}

/// Attaches one hand of a couple to a fiber
pub fn attach_couple(couples: &mut CoupleSet, fibers: &mut FiberSet, key: SlotKey, hand: u8, fiber: SlotKey, ab: f64) {
    let c = couples.get_mut(key).expect("attaching a dead couple");
    c.hand_mut(hand).attach(fiber, ab);
    fibers.get_mut(fiber).expect("attaching to a dead fiber").binders.push(BinderRef::Couple(key, hand));
    couples.relink(key);
}

/// Detaches one hand of a couple
pub fn detach_couple(couples: &mut CoupleSet, fibers: &mut FiberSet, key: SlotKey, hand: u8) {
    let c = couples.get_mut(key).expect("detaching a dead couple");
    let (fib, ab) = c.hand(hand).attachment().expect("detaching a free hand");
    if let Some(fobj) = fibers.get_mut(fib) {
        // the complex stays where it was held
        c.pos = fobj.fiber.pos_at(ab);
        fobj.binders.retain(|b| *b != BinderRef::Couple(key, hand));
    }
    c.hand_mut(hand).detach();
    couples.relink(key);
}

fn binder_abscissa(singles: &SingleSet, couples: &CoupleSet, b: &BinderRef) -> Option<f64> {
    match b {
        BinderRef::Single(k) => singles.get(*k).map(|s| s.hand.abscissa()),
        BinderRef::Couple(k, h) => couples.get(*k).map(|c| c.hand(*h).abscissa()),
    }
}

/// Detaches every binder attached to a fiber, as required before the
/// fiber can be destroyed.
pub fn detach_all_binders(
    fibers: &mut FiberSet,
    singles: &mut SingleSet,
    couples: &mut CoupleSet,
    fiber: SlotKey,
) {
    let binders = match fibers.get(fiber) {
        Some(f) => f.binders.clone(),
        None => return,
    };
    for b in binders {
        match b {
            BinderRef::Single(k) => detach_single(singles, fibers, k),
            BinderRef::Couple(k, h) => detach_couple(couples, fibers, k, h),
        }
    }
}

/// Destroys a fiber, detaching its binders first
pub fn destroy_fiber(
    fibers: &mut FiberSet,
    singles: &mut SingleSet,
    couples: &mut CoupleSet,
    fiber: SlotKey,
) {
    detach_all_binders(fibers, singles, couples, fiber);
    fibers.remove(fiber);
}

/// Severs a fiber at the given abscissa. The distal piece becomes a new
/// fiber of the set; binders with an abscissa at or above the cut are
/// transferred to it with their abscissa unchanged. Returns the new key.
pub fn sever_fiber(
    fibers: &mut FiberSet,
    singles: &mut SingleSet,
    couples: &mut CoupleSet,
    fiber: SlotKey,
    ab: f64,
) -> Option<SlotKey> {
    let (distal, prop, tip_state) = {
        let fobj = fibers.get_mut(fiber)?;
        let distal = fobj.fiber.sever_at(ab)?;
        (distal, fobj.prop, fobj.tip_state)
    };
    let new_key = fibers.add(distal, prop);
    // the distal part carries the original plus end and its dynamic state
    fibers.get_mut(new_key).unwrap().tip_state = tip_state;

    let binders = fibers.get(fiber).unwrap().binders.clone();
    for b in binders {
        let Some(ab_b) = binder_abscissa(singles, couples, &b) else {
            continue;
        };
        if ab_b >= ab {
            fibers.get_mut(fiber).unwrap().binders.retain(|x| *x != b);
            match b {
                BinderRef::Single(k) => {
                    singles.get_mut(k).unwrap().hand.relocate(new_key);
                }
                BinderRef::Couple(k, h) => {
                    couples.get_mut(k).unwrap().hand_mut(h).relocate(new_key);
                }
            }
            fibers.get_mut(new_key).unwrap().binders.push(b);
        }
    }
    Some(new_key)
}

/// Joins the donor fiber onto the minus end of the receiver, transferring
/// the donor's binders with the abscissa shift of the merge, and removes
/// the donor from the set.
pub fn join_fibers(
    fibers: &mut FiberSet,
    singles: &mut SingleSet,
    couples: &mut CoupleSet,
    receiver: SlotKey,
    donor: SlotKey,
) {
    let shift = {
        let Some((r, d)) = fibers.arena.get_pair_mut(receiver, donor) else {
            return;
        };
        r.fiber.join(&d.fiber)
    };
    let moved = std::mem::take(&mut fibers.get_mut(donor).unwrap().binders);
    for b in moved {
        match b {
            BinderRef::Single(k) => {
                singles.get_mut(k).unwrap().hand.relocate_by(receiver, shift);
            }
            BinderRef::Couple(k, h) => {
                couples.get_mut(k).unwrap().hand_mut(h).relocate_by(receiver, shift);
            }
        }
        fibers.get_mut(receiver).unwrap().binders.push(b);
    }
    fibers.remove(donor);
}

/// Checks every binder of a fiber against the current abscissa range,
/// after the fiber has grown or shrunk. Out-of-range hands either detach,
/// or hold on to the end if their class says so.
pub fn check_binder_ranges(
    fibers: &mut FiberSet,
    singles: &mut SingleSet,
    couples: &mut CoupleSet,
    props: &Properties,
    fiber: SlotKey,
) {
    let (binders, ab_m, ab_p) = match fibers.get(fiber) {
        Some(f) => (f.binders.clone(), f.fiber.abscissa_m(), f.fiber.abscissa_p()),
        None => return,
    };
    for b in binders {
        let (ab, hand_prop) = match &b {
            BinderRef::Single(k) => {
                let s = singles.get(*k).unwrap();
                (s.hand.abscissa(), props.singles[s.prop].hand)
            }
            BinderRef::Couple(k, h) => {
                let c = couples.get(*k).unwrap();
                let cp = &props.couples[c.prop];
                (c.hand(*h).abscissa(), if *h == 0 { cp.hand1 } else { cp.hand2 })
            }
        };
        if ab >= ab_m && ab <= ab_p {
            continue;
        }
        if props.hands[hand_prop].hold_growing_end {
            let clamped = ab.clamp(ab_m, ab_p);
            match &b {
                BinderRef::Single(k) => singles.get_mut(*k).unwrap().hand.move_to(clamped),
                BinderRef::Couple(k, h) => couples.get_mut(*k).unwrap().hand_mut(*h).move_to(clamped),
            };
        } else {
            match b {
                BinderRef::Single(k) => detach_single(singles, fibers, k),
                BinderRef::Couple(k, h) => detach_couple(couples, fibers, k, h),
            }
        }
    }
}

//! Binary trajectory frames.
//!
//! A frame starts with a magic, a format identifier and the simulation
//! time, then one length-prefixed record list per class set, and a
//! sentinel tag. Each record is `[tag u8][property u16][serial u32]`
//! followed by the class payload, which carries the mutable mechanical
//! state only; property records are referenced by index so that files
//! stay portable across runs sharing the same catalog.
//!
//! Objects also expose an ASCII reference `XP:N[:M]` built from the same
//! three identifiers plus the optional mark.

use std::io::{Read, Write};

use cytomech_mech::{Bead, Fiber, Solid, Sphere};
use cytomech_numerical::Vec3;

use crate::binder;
use crate::{CoupleObj, Hand, SimError, Simul, SingleObj, TipState};

const MAGIC: &[u8; 4] = b"CYFR";
const FORMAT_ID: u16 = 3;

pub const TAG_FIBER: u8 = b'f';
pub const TAG_SOLID: u8 = b'd';
pub const TAG_BEAD: u8 = b'b';
pub const TAG_SPHERE: u8 = b'o';
pub const TAG_SINGLE: u8 = b's';
pub const TAG_COUPLE: u8 = b'c';
/// marks the end of a frame
pub const TAG_END: u8 = b'~';

/// ASCII reference of an object: class tag, property index, serial
/// number, and the mark when it is not zero.
pub fn reference(tag: u8, prop: usize, serial: u32, mark: i32) -> String {
    if mark != 0 {
        format!("{}{}:{}:{}", tag as char, prop, serial, mark)
    } else {
        format!("{}{}:{}", tag as char, prop, serial)
    }
}

// ---------- little-endian primitives

fn put_u8(w: &mut impl Write, v: u8) -> Result<(), SimError> {
    w.write_all(&[v])?;
    Ok(())
}

fn put_u16(w: &mut impl Write, v: u16) -> Result<(), SimError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn put_u32(w: &mut impl Write, v: u32) -> Result<(), SimError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn put_f64(w: &mut impl Write, v: f64) -> Result<(), SimError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn put_vec(w: &mut impl Write, v: &Vec3) -> Result<(), SimError> {
    put_f64(w, v.x)?;
    put_f64(w, v.y)?;
    put_f64(w, v.z)
}

fn get_bytes<const N: usize>(r: &mut impl Read) -> Result<[u8; N], SimError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|_| SimError::Input("truncated frame".to_string()))?;
    Ok(buf)
}

fn get_u8(r: &mut impl Read) -> Result<u8, SimError> {
    Ok(get_bytes::<1>(r)?[0])
}

fn get_u16(r: &mut impl Read) -> Result<u16, SimError> {
    Ok(u16::from_le_bytes(get_bytes(r)?))
}

fn get_u32(r: &mut impl Read) -> Result<u32, SimError> {
    Ok(u32::from_le_bytes(get_bytes(r)?))
}

fn get_f64(r: &mut impl Read) -> Result<f64, SimError> {
    Ok(f64::from_le_bytes(get_bytes(r)?))
}

fn get_vec(r: &mut impl Read) -> Result<Vec3, SimError> {
    Ok(Vec3::new(get_f64(r)?, get_f64(r)?, get_f64(r)?))
}

fn put_hand(w: &mut impl Write, hand: &Hand, fiber_serial: u32) -> Result<(), SimError> {
    if hand.attached() {
        put_u8(w, 1)?;
        put_u32(w, fiber_serial)?;
        put_f64(w, hand.abscissa())
    } else {
        put_u8(w, 0)
    }
}

/// Reads a hand as `(fiber serial, abscissa)`; the attachment itself is
/// re-established after the object is registered.
fn get_hand(r: &mut impl Read) -> Result<Option<(u32, f64)>, SimError> {
    if get_u8(r)? == 0 {
        return Ok(None);
    }
    Ok(Some((get_u32(r)?, get_f64(r)?)))
}

impl Simul {
    /// Writes the complete mutable state as one frame.
    pub fn write_frame(&self, w: &mut impl Write) -> Result<(), SimError> {
        w.write_all(MAGIC)?;
        put_u16(w, FORMAT_ID)?;
        put_f64(w, self.time())?;

        // ---------- fibers
        put_u32(w, self.fibers.len() as u32)?;
        for (_, fobj) in self.fibers.iter() {
            put_u8(w, TAG_FIBER)?;
            put_u16(w, fobj.prop as u16)?;
            put_u32(w, fobj.serial)?;
            let f = &fobj.fiber;
            put_f64(w, f.abscissa_m())?;
            put_f64(w, f.segmentation())?;
            put_u8(w, fobj.tip_state.to_byte())?;
            put_u32(w, f.nb_points() as u32)?;
            for p in 0..f.nb_points() {
                put_vec(w, &f.pos_point(p))?;
            }
            for s in 0..f.nb_segments() {
                put_f64(w, f.tension(s))?;
            }
        }

        // ---------- solids
        put_u32(w, self.solids.len() as u32)?;
        for (_, so) in self.solids.iter() {
            put_u8(w, TAG_SOLID)?;
            put_u16(w, so.prop as u16)?;
            put_u32(w, so.serial)?;
            let s = &so.solid;
            put_u32(w, s.nb_points() as u32)?;
            for p in 0..s.nb_points() {
                put_f64(w, s.radius(p))?;
                put_vec(w, &s.pos_point(p))?;
            }
        }

        // ---------- beads
        put_u32(w, self.beads.len() as u32)?;
        for (_, bo) in self.beads.iter() {
            put_u8(w, TAG_BEAD)?;
            put_u16(w, bo.prop as u16)?;
            put_u32(w, bo.serial)?;
            put_f64(w, bo.bead.radius())?;
            put_vec(w, &bo.bead.position())?;
        }

        // ---------- spheres
        put_u32(w, self.spheres.len() as u32)?;
        for (_, so) in self.spheres.iter() {
            put_u8(w, TAG_SPHERE)?;
            put_u16(w, so.prop as u16)?;
            put_u32(w, so.serial)?;
            put_f64(w, so.sphere.radius())?;
            for p in 0..4 {
                put_vec(w, &so.sphere.pos_point(p))?;
            }
        }

        // ---------- singles
        put_u32(w, self.singles.len() as u32)?;
        for (_, s) in self.singles.iter() {
            put_u8(w, TAG_SINGLE)?;
            put_u16(w, s.prop as u16)?;
            put_u32(w, s.serial)?;
            let fiber_serial = s
                .hand
                .fiber()
                .and_then(|k| self.fibers.get(k))
                .map(|f| f.serial)
                .unwrap_or(0);
            put_hand(w, &s.hand, fiber_serial)?;
            put_vec(w, &s.pos)?;
            match s.anchor {
                Some((solid, pt)) => {
                    put_u8(w, 1)?;
                    let serial = self.solids.get(solid).map(|s| s.serial).unwrap_or(0);
                    put_u32(w, serial)?;
                    put_u32(w, pt as u32)?;
                }
                None => put_u8(w, 0)?,
            }
        }

        // ---------- couples
        put_u32(w, self.couples.len() as u32)?;
        for (_, c) in self.couples.iter() {
            put_u8(w, TAG_COUPLE)?;
            put_u16(w, c.prop as u16)?;
            put_u32(w, c.serial)?;
            for hand in [&c.hand1, &c.hand2] {
                let fiber_serial = hand
                    .fiber()
                    .and_then(|k| self.fibers.get(k))
                    .map(|f| f.serial)
                    .unwrap_or(0);
                put_hand(w, hand, fiber_serial)?;
            }
            put_vec(w, &c.pos)?;
        }

        put_u8(w, TAG_END)?;
        Ok(())
    }

    /// Replaces the object state from one frame. The property catalog is
    /// not part of the frame and must match the one used for writing.
    pub fn read_frame(&mut self, r: &mut impl Read) -> Result<(), SimError> {
        let magic = get_bytes::<4>(r)?;
        if &magic != MAGIC {
            return Err(SimError::Input("not a trajectory frame".to_string()));
        }
        let format = get_u16(r)?;
        if format != FORMAT_ID {
            return Err(SimError::Input(format!("unknown frame format {}", format)));
        }
        let time = get_f64(r)?;

        self.fibers.clear();
        self.solids.clear();
        self.beads.clear();
        self.spheres.clear();
        self.singles.clear();
        self.couples.clear();
        self.set_time(time);

        let check_tag = |tag: u8, expected: u8| -> Result<(), SimError> {
            if tag != expected {
                return Err(SimError::Input(format!("unexpected record tag '{}'", tag as char)));
            }
            Ok(())
        };
        let check_prop = |prop: usize, nb: usize, kind: &str| -> Result<(), SimError> {
            if prop >= nb {
                return Err(SimError::Input(format!("undefined {} property {}", kind, prop)));
            }
            Ok(())
        };

        // ---------- fibers
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_FIBER)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.fibers.len(), "fiber")?;
            let serial = get_u32(r)?;
            let origin = get_f64(r)?;
            let segmentation = get_f64(r)?;
            let tip = TipState::from_byte(get_u8(r)?)
                .ok_or_else(|| SimError::Input("invalid tip state".to_string()))?;
            let np = get_u32(r)? as usize;
            if np < 2 {
                return Err(SimError::Input("fiber record with less than 2 points".to_string()));
            }
            let mut pts = Vec::with_capacity(np);
            for _ in 0..np {
                pts.push(get_vec(r)?);
            }
            let mut tensions = Vec::with_capacity(np - 1);
            for _ in 0..np - 1 {
                tensions.push(get_f64(r)?);
            }
            let target = self.props.fibers[prop].segmentation;
            let fiber = Fiber::from_points(target, segmentation, origin, &pts, &tensions)?;
            let key = self.fibers.restore(fiber, prop, serial);
            self.fibers.get_mut(key).unwrap().tip_state = tip;
        }

        // ---------- solids
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_SOLID)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.solids.len(), "solid")?;
            let serial = get_u32(r)?;
            let np = get_u32(r)? as usize;
            let mut solid = Solid::new();
            let mut coords = Vec::with_capacity(np);
            for _ in 0..np {
                let radius = get_f64(r)?;
                let pos = get_vec(r)?;
                solid.add_sphere(&pos, radius);
                coords.push(pos);
            }
            // the written configuration is both the shape and the state
            solid.fix_shape();
            for (p, pos) in coords.iter().enumerate() {
                solid.points_mut().set_point(p, pos);
            }
            self.solids.restore(solid, prop, serial);
        }

        // ---------- beads
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_BEAD)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.beads.len(), "bead")?;
            let serial = get_u32(r)?;
            let radius = get_f64(r)?;
            let pos = get_vec(r)?;
            self.beads.restore(Bead::new(&pos, radius), prop, serial);
        }

        // ---------- spheres
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_SPHERE)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.spheres.len(), "sphere")?;
            let serial = get_u32(r)?;
            let radius = get_f64(r)?;
            let center = get_vec(r)?;
            let mut sphere = Sphere::new(&center, radius);
            for p in 1..4 {
                let pos = get_vec(r)?;
                sphere.points_mut().set_point(p, &pos);
            }
            self.spheres.restore(sphere, prop, serial);
        }

        // ---------- singles
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_SINGLE)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.singles.len(), "single")?;
            let serial = get_u32(r)?;
            let attachment = get_hand(r)?;
            let pos = get_vec(r)?;
            let anchor = if get_u8(r)? != 0 {
                let solid_serial = get_u32(r)?;
                let pt = get_u32(r)? as usize;
                self.solids.find_serial(solid_serial).map(|k| (k, pt))
            } else {
                None
            };
            let key = self.singles.restore(SingleObj {
                hand: Hand::new(),
                pos,
                anchor,
                prop,
                serial,
            });
            if let Some((fiber_serial, ab)) = attachment {
                let fk = self.fibers.find_serial(fiber_serial).ok_or_else(|| {
                    SimError::Input(format!("single references unknown fiber {}", fiber_serial))
                })?;
                binder::attach_single(&mut self.singles, &mut self.fibers, key, fk, ab);
            }
        }

        // ---------- couples
        let nb = get_u32(r)?;
        for _ in 0..nb {
            check_tag(get_u8(r)?, TAG_COUPLE)?;
            let prop = get_u16(r)? as usize;
            check_prop(prop, self.props.couples.len(), "couple")?;
            let serial = get_u32(r)?;
            let a1 = get_hand(r)?;
            let a2 = get_hand(r)?;
            let pos = get_vec(r)?;
            let key = self.couples.restore(CoupleObj {
                hand1: Hand::new(),
                hand2: Hand::new(),
                pos,
                prop,
                serial,
            });
            for (hand, att) in [(0u8, a1), (1u8, a2)] {
                if let Some((fiber_serial, ab)) = att {
                    let fk = self.fibers.find_serial(fiber_serial).ok_or_else(|| {
                        SimError::Input(format!("couple references unknown fiber {}", fiber_serial))
                    })?;
                    binder::attach_couple(&mut self.couples, &mut self.fibers, key, hand, fk, ab);
                }
            }
        }

        let end = get_u8(r)?;
        if end != TAG_END {
            return Err(SimError::Input("missing end-of-frame sentinel".to_string()));
        }
        Ok(())
    }
}

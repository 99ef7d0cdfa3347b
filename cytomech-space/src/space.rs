use rand::Rng;

use cytomech_numerical::Vec3;

use crate::Modulo;

/// How an object is restricted relative to a confining surface.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Confinement {
    /// no confinement
    #[default]
    Off,
    /// every point pulled back when it exits the space
    Inside,
    /// as `Inside`, with a margin so the object's radius also fits
    AllInside,
    /// every point pushed out when it enters the space
    Outside,
    /// every point tied to its projection on the surface
    Surface,
    /// fibers only: the plus end tied to the surface
    PlusEnd,
    /// fibers only: the minus end tied to the surface
    MinusEnd,
}

/// A confining geometry.
///
/// Implementations are closed volumes (possibly periodic in some
/// directions); `project` returns the nearest point of the bounding surface.
pub trait Space {
    /// true if `pos` is inside the volume or on its edge
    fn inside(&self, pos: &Vec3) -> bool;

    fn outside(&self, pos: &Vec3) -> bool {
        !self.inside(pos)
    }

    /// true if a sphere of `radius` centered at `pos` fits entirely inside
    fn all_inside(&self, pos: &Vec3, radius: f64) -> bool {
        self.inside(pos) && self.distance_to_edge(pos) >= radius
    }

    /// true if a sphere of `radius` centered at `pos` lies entirely outside
    fn all_outside(&self, pos: &Vec3, radius: f64) -> bool {
        self.outside(pos) && self.distance_to_edge(pos) >= radius
    }

    /// The point of the surface closest to `pos`
    fn project(&self, pos: &Vec3) -> Vec3;

    /// Distance from `pos` to the surface, positive on both sides
    fn distance_to_edge(&self, pos: &Vec3) -> f64 {
        pos.distance(&self.project(pos))
    }

    /// A point drawn uniformly inside the volume
    fn random_place(&self, rng: &mut dyn rand::RngCore) -> Vec3;

    /// Axis-aligned box containing the volume (the periodic cell for
    /// periodic spaces); used to dimension the spatial grids.
    fn bounding_box(&self) -> (Vec3, Vec3);

    /// Periodic wrapping, for spaces that have one
    fn modulo(&self) -> Option<&Modulo> {
        None
    }

    /// Mirrors `pos` back inside across the surface, used for the diffusion
    /// of free binders; falls back to the projection when the mirror image
    /// also lands outside.
    fn bounce(&self, pos: &mut Vec3) {
        if self.outside(pos) {
            let p = self.project(pos);
            let mirrored = p * 2.0 - *pos;
            *pos = if self.inside(&mirrored) { mirrored } else { p };
        }
    }
}

/// A ball of given radius centered on the origin.
pub struct SphereSpace {
    radius: f64,
}

impl SphereSpace {
    pub fn new(radius: f64) -> SphereSpace {
        assert!(radius > 0.0);
        SphereSpace { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Space for SphereSpace {
    fn inside(&self, pos: &Vec3) -> bool {
        pos.length_squared() <= self.radius * self.radius
    }

    fn project(&self, pos: &Vec3) -> Vec3 {
        let n = pos.length();
        if n > 0.0 {
            return *pos * (self.radius / n);
        }
        // the center projects on an arbitrary surface point
        Vec3::new(self.radius, 0.0, 0.0)
    }

    fn distance_to_edge(&self, pos: &Vec3) -> f64 {
        (pos.length() - self.radius).abs()
    }

    fn random_place(&self, rng: &mut dyn rand::RngCore) -> Vec3 {
        loop {
            let p = Vec3::random_square(rng, self.radius);
            if p.length_squared() <= self.radius * self.radius {
                return p;
            }
        }
    }

    fn bounding_box(&self) -> (Vec3, Vec3) {
        let r = self.radius;
        (Vec3::new(-r, -r, -r), Vec3::new(r, r, r))
    }
}

/// A closed cylinder along the x axis, centered on the origin.
pub struct CylinderSpace {
    radius: f64,
    half_length: f64,
}

impl CylinderSpace {
    pub fn new(half_length: f64, radius: f64) -> CylinderSpace {
        assert!(radius > 0.0 && half_length > 0.0);
        CylinderSpace { radius, half_length }
    }
}

impl Space for CylinderSpace {
    fn inside(&self, pos: &Vec3) -> bool {
        pos.x.abs() <= self.half_length
            && pos.y * pos.y + pos.z * pos.z <= self.radius * self.radius
    }

    fn project(&self, pos: &Vec3) -> Vec3 {
        let r = (pos.y * pos.y + pos.z * pos.z).sqrt();
        let x = pos.x.clamp(-self.half_length, self.half_length);
        let radial = if r > 0.0 {
            Vec3::new(0.0, pos.y / r, pos.z / r)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };

        if pos.x.abs() <= self.half_length && r <= self.radius {
            // inside: the nearest boundary is either a cap or the side wall
            let to_cap = self.half_length - pos.x.abs();
            let to_side = self.radius - r;
            if to_cap < to_side {
                return Vec3::new(self.half_length.copysign(pos.x), pos.y, pos.z);
            }
            return Vec3::new(pos.x, radial.y * self.radius, radial.z * self.radius);
        }
        // outside: clamp into the cylinder footprint
        let rr = r.min(self.radius);
        Vec3::new(x, radial.y * rr, radial.z * rr)
    }

    fn random_place(&self, rng: &mut dyn rand::RngCore) -> Vec3 {
        loop {
            let y = rng.gen_range(-self.radius..self.radius);
            let z = rng.gen_range(-self.radius..self.radius);
            if y * y + z * z <= self.radius * self.radius {
                let x = rng.gen_range(-self.half_length..self.half_length);
                return Vec3::new(x, y, z);
            }
        }
    }

    fn bounding_box(&self) -> (Vec3, Vec3) {
        (
            Vec3::new(-self.half_length, -self.radius, -self.radius),
            Vec3::new(self.half_length, self.radius, self.radius),
        )
    }
}

/// A slab, periodic along x, bounded by flat walls in y and z.
pub struct StripSpace {
    half_y: f64,
    half_z: f64,
    modulo: Modulo,
}

impl StripSpace {
    /// # Arguments
    /// * `period_x` - full width of the periodic cell along x
    /// * `half_y`, `half_z` - half thickness of the slab walls
    pub fn new(period_x: f64, half_y: f64, half_z: f64) -> StripSpace {
        assert!(period_x > 0.0 && half_y > 0.0 && half_z > 0.0);
        StripSpace { half_y, half_z, modulo: Modulo::periodic_x(period_x) }
    }
}

impl Space for StripSpace {
    fn inside(&self, pos: &Vec3) -> bool {
        pos.y.abs() <= self.half_y && pos.z.abs() <= self.half_z
    }

    fn project(&self, pos: &Vec3) -> Vec3 {
        // the nearest wall is one of the four planes bounding y and z
        let dy = self.half_y - pos.y.abs();
        let dz = self.half_z - pos.z.abs();
        let mut p = *pos;
        if pos.y.abs() > self.half_y || pos.z.abs() > self.half_z {
            // outside: clamp the offending coordinates
            p.y = p.y.clamp(-self.half_y, self.half_y);
            p.z = p.z.clamp(-self.half_z, self.half_z);
            return p;
        }
        if dy < dz {
            p.y = self.half_y.copysign(pos.y);
        } else {
            p.z = self.half_z.copysign(pos.z);
        }
        return p;
    }

    fn random_place(&self, rng: &mut dyn rand::RngCore) -> Vec3 {
        let half_x = 0.5 * self.modulo.period(0);
        Vec3::new(
            rng.gen_range(-half_x..half_x),
            rng.gen_range(-self.half_y..self.half_y),
            rng.gen_range(-self.half_z..self.half_z),
        )
    }

    fn bounding_box(&self) -> (Vec3, Vec3) {
        let half_x = 0.5 * self.modulo.period(0);
        (
            Vec3::new(-half_x, -self.half_y, -self.half_z),
            Vec3::new(half_x, self.half_y, self.half_z),
        )
    }

    fn modulo(&self) -> Option<&Modulo> {
        Some(&self.modulo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn sphere_projection() {
        let s = SphereSpace::new(5.0);
        assert!(s.inside(&Vec3::new(3.0, 0.0, 0.0)));
        assert!(s.outside(&Vec3::new(6.0, 0.0, 0.0)));
        let p = s.project(&Vec3::new(10.0, 0.0, 0.0));
        assert!(p.distance(&Vec3::new(5.0, 0.0, 0.0)) < 1e-12);
        assert!((s.distance_to_edge(&Vec3::new(3.0, 0.0, 0.0)) - 2.0).abs() < 1e-12);
        assert!(s.all_inside(&Vec3::new(3.0, 0.0, 0.0), 1.5));
        assert!(!s.all_inside(&Vec3::new(3.0, 0.0, 0.0), 2.5));
    }

    #[test]
    fn random_places_are_inside() {
        let mut rng = SmallRng::seed_from_u64(11);
        let spaces: Vec<Box<dyn Space>> = vec![
            Box::new(SphereSpace::new(3.0)),
            Box::new(CylinderSpace::new(4.0, 1.5)),
            Box::new(StripSpace::new(10.0, 2.0, 2.0)),
        ];
        for s in spaces.iter() {
            for _ in 0..100 {
                let p = s.random_place(&mut rng);
                assert!(s.inside(&p));
            }
        }
    }

    #[test]
    fn strip_is_periodic_in_x() {
        let s = StripSpace::new(10.0, 2.0, 2.0);
        assert!(s.inside(&Vec3::new(1000.0, 0.0, 0.0)));
        let m = s.modulo().unwrap();
        let mut p = Vec3::new(7.0, 0.0, 0.0);
        m.fold(&mut p);
        assert!((p.x + 3.0).abs() < 1e-12);
    }

    #[test]
    fn bounce_returns_inside() {
        let s = SphereSpace::new(2.0);
        let mut p = Vec3::new(2.5, 0.0, 0.0);
        s.bounce(&mut p);
        assert!(s.inside(&p));
        assert!((p.x - 1.5).abs() < 1e-12);
    }
}

//! Per-class parameter records and the catalog that owns them.
//!
//! Each simulated object carries the index of its property record; records
//! are grouped by kind and addressed by `(kind, name)` or `(kind, index)`.
//! `Properties::complete()` validates all records against the global
//! parameters and derives the cached per-step quantities.

use cytomech_mech::FiberMechanics;
use cytomech_space::Confinement;

use crate::SimError;

/// Global parameters of the simulation.
#[derive(Clone, Debug)]
pub struct SimulProp {
    pub time_step: f64,
    /// thermal energy `kT`
    pub kt: f64,
    pub viscosity: f64,
    /// seed of the single pseudo-random generator
    pub seed: u64,
    /// residual target of the implicit solver
    pub tolerance: f64,
    pub max_iterations: usize,
    pub precondition: bool,
    /// enables the steric grid
    pub steric: bool,
    pub steric_stiffness_push: f64,
    pub steric_stiffness_pull: f64,
    /// cell size of the steric grid; zero lets the driver estimate it
    pub steric_max_range: f64,
    /// cell size of the binding grid; zero lets the driver estimate it
    pub binding_grid_step: f64,
}

impl Default for SimulProp {
    fn default() -> Self {
        SimulProp {
            time_step: 0.001,
            kt: 0.0042,
            viscosity: 1.0,
            seed: 1,
            tolerance: 0.05,
            max_iterations: 2000,
            precondition: true,
            steric: false,
            steric_stiffness_push: 100.0,
            steric_stiffness_pull: 0.0,
            steric_max_range: 0.0,
            binding_grid_step: 0.0,
        }
    }
}

impl SimulProp {
    pub fn complete(&self) -> Result<(), SimError> {
        if self.time_step <= 0.0 {
            return Err(SimError::conf("simul:time_step", "must be > 0"));
        }
        if self.viscosity <= 0.0 {
            return Err(SimError::conf("simul:viscosity", "must be > 0"));
        }
        if self.kt < 0.0 {
            return Err(SimError::conf("simul:kt", "must be >= 0"));
        }
        if self.tolerance <= 0.0 {
            return Err(SimError::conf("simul:tolerance", "must be > 0"));
        }
        Ok(())
    }
}

/// Parameters shared by one class of fibers.
#[derive(Clone, Debug)]
pub struct FiberProp {
    pub name: String,
    /// desired distance between model points
    pub segmentation: f64,
    /// bending elastic modulus (pN·µm²)
    pub rigidity: f64,
    /// effective viscosity; zero falls back to the global one
    pub viscosity: f64,
    /// compared bitwise with the hand's key to allow attachment
    pub binding_key: u32,
    /// [radius of the filament, length cutoff] for the drag formula
    pub hydrodynamic_radius: [f64; 2],
    /// use the near-wall drag formula, with this fluid height
    pub surface_effect: Option<f64>,
    pub confine: Confinement,
    pub confine_stiffness: f64,
    /// index of the confining space in the simulation
    pub confine_space: usize,
    pub steric: bool,
    pub steric_radius: f64,
    pub steric_range: f64,
    /// fibers shorter than this are deleted
    pub min_length: f64,
    /// sever at joints bent over 90 degrees (off by default)
    pub sever_kinked: bool,

    // ---------- dynamic instability of the plus end
    pub dynamic: bool,
    pub growing_speed: f64,
    /// force scale of the growth slow-down under load
    pub growing_force: f64,
    pub catastrophe_rate: f64,
    pub rescue_rate: f64,
    pub shrinking_speed: f64,
}

impl FiberProp {
    pub fn new(name: &str) -> FiberProp {
        FiberProp {
            name: name.to_string(),
            segmentation: 1.0,
            rigidity: 0.0,
            viscosity: 0.0,
            binding_key: !0,
            hydrodynamic_radius: [0.0125, 20.0],
            surface_effect: None,
            confine: Confinement::Off,
            confine_stiffness: 0.0,
            confine_space: 0,
            steric: false,
            steric_radius: 0.0,
            steric_range: 0.0,
            min_length: 0.01,
            sever_kinked: false,
            dynamic: false,
            growing_speed: 0.0,
            growing_force: f64::INFINITY,
            catastrophe_rate: 0.0,
            rescue_rate: 0.0,
            shrinking_speed: 0.0,
        }
    }

    /// The mechanical constants handed to the core for each step
    pub fn mechanics(&self, simul: &SimulProp) -> FiberMechanics {
        FiberMechanics {
            rigidity: self.rigidity,
            viscosity: if self.viscosity > 0.0 { self.viscosity } else { simul.viscosity },
            radius: self.hydrodynamic_radius[0],
            drag_length_cutoff: self.hydrodynamic_radius[1],
            surface_height: self.surface_effect,
        }
    }

    pub fn complete(&self, _simul: &SimulProp) -> Result<(), SimError> {
        let name = format!("fiber:{}", self.name);
        if self.segmentation <= 0.0 {
            return Err(SimError::conf(&name, "segmentation must be > 0"));
        }
        if self.rigidity < 0.0 {
            return Err(SimError::conf(&name, "rigidity must be >= 0"));
        }
        if self.hydrodynamic_radius[0] <= 0.0 {
            return Err(SimError::conf(&name, "hydrodynamic_radius[0] must be > 0"));
        }
        if self.steric && self.steric_radius <= 0.0 {
            return Err(SimError::conf(&name, "steric is enabled but steric_radius is not set"));
        }
        if self.confine != Confinement::Off && self.confine_stiffness < 0.0 {
            return Err(SimError::conf(&name, "confine_stiffness must be >= 0"));
        }
        if self.dynamic && self.growing_force <= 0.0 {
            return Err(SimError::conf(&name, "growing_force must be > 0"));
        }
        Ok(())
    }
}

/// Parameters of a solid class.
#[derive(Clone, Debug)]
pub struct SolidProp {
    pub name: String,
    pub viscosity: f64,
    pub confine: Confinement,
    pub confine_stiffness: f64,
    pub confine_space: usize,
    pub steric: bool,
    pub steric_range: f64,
}

impl SolidProp {
    pub fn new(name: &str) -> SolidProp {
        SolidProp {
            name: name.to_string(),
            viscosity: 0.0,
            confine: Confinement::Off,
            confine_stiffness: 0.0,
            confine_space: 0,
            steric: false,
            steric_range: 0.0,
        }
    }

    pub fn complete(&self, _simul: &SimulProp) -> Result<(), SimError> {
        Ok(())
    }
}

/// Parameters of a bead class.
pub type BeadProp = SolidProp;
/// Parameters of a sphere class.
pub type SphereProp = SolidProp;

/// Parameters of a hand class: how binders of this kind attach, move and
/// detach.
#[derive(Clone, Debug)]
pub struct HandProp {
    pub name: String,
    /// attachment rate per unit time when within range (1/s)
    pub binding_rate: f64,
    /// capture radius around the hand position
    pub binding_range: f64,
    /// bitwise key matched against the fiber's
    pub binding_key: u32,
    /// detachment rate at zero load (1/s)
    pub unbinding_rate: f64,
    /// force scale of load-dependent detachment; zero or infinite disables it
    pub unbinding_force: f64,
    /// when the abscissa passes a fiber end: hold at the end, or detach
    pub hold_growing_end: bool,
    /// unloaded motor speed, positive towards the plus end; zero for a
    /// passive binder
    pub speed: f64,
    /// force stalling the motor
    pub stall_force: f64,

    // ---------- derived at complete()
    pub(crate) binding_prob: f64,
    pub(crate) unbinding_rate_dt: f64,
}

impl HandProp {
    pub fn new(name: &str) -> HandProp {
        HandProp {
            name: name.to_string(),
            binding_rate: 0.0,
            binding_range: 0.0,
            binding_key: !0,
            unbinding_rate: 0.0,
            unbinding_force: 0.0,
            hold_growing_end: false,
            speed: 0.0,
            stall_force: 0.0,
            binding_prob: 0.0,
            unbinding_rate_dt: 0.0,
        }
    }

    pub fn complete(&mut self, simul: &SimulProp) -> Result<(), SimError> {
        let name = format!("hand:{}", self.name);
        if self.binding_rate < 0.0 || self.unbinding_rate < 0.0 {
            return Err(SimError::conf(&name, "rates must be >= 0"));
        }
        if self.binding_rate > 0.0 && self.binding_range <= 0.0 {
            return Err(SimError::conf(&name, "binding_rate is set but binding_range is not"));
        }
        if self.speed != 0.0 && self.stall_force <= 0.0 {
            return Err(SimError::conf(&name, "a motor needs stall_force > 0"));
        }
        self.binding_prob = self.binding_rate * simul.time_step;
        if self.binding_prob > 1.0 {
            return Err(SimError::conf(&name, "binding_rate * time_step exceeds 1"));
        }
        self.unbinding_rate_dt = self.unbinding_rate * simul.time_step;
        Ok(())
    }
}

/// Parameters of a single class: one hand plus a diffusing base or an
/// anchor on a solid.
#[derive(Clone, Debug)]
pub struct SingleProp {
    pub name: String,
    /// index of the hand class
    pub hand: usize,
    /// stiffness of the link between the base and the attached hand
    pub stiffness: f64,
    /// diffusion constant of the free base
    pub diffusion: f64,
    pub confine: Confinement,
    pub confine_space: usize,

    // ---------- derived at complete()
    pub(crate) diffusion_dt: f64,
}

impl SingleProp {
    pub fn new(name: &str, hand: usize) -> SingleProp {
        SingleProp {
            name: name.to_string(),
            hand,
            stiffness: 0.0,
            diffusion: 0.0,
            confine: Confinement::Off,
            confine_space: 0,
            diffusion_dt: 0.0,
        }
    }

    pub fn complete(&mut self, simul: &SimulProp, nb_hands: usize) -> Result<(), SimError> {
        let name = format!("single:{}", self.name);
        if self.hand >= nb_hands {
            return Err(SimError::conf(&name, "refers to an undefined hand class"));
        }
        if self.diffusion < 0.0 {
            return Err(SimError::conf(&name, "diffusion must be >= 0"));
        }
        // uniform steps of width √(6·D·dt) have the variance 2·D·dt per axis
        self.diffusion_dt = (6.0 * self.diffusion * simul.time_step).sqrt();
        Ok(())
    }
}

/// Parameters of a couple class: two hands bridged by a Hooke link.
#[derive(Clone, Debug)]
pub struct CoupleProp {
    pub name: String,
    pub hand1: usize,
    pub hand2: usize,
    /// stiffness of the bridging link
    pub stiffness: f64,
    /// resting length of the bridging link
    pub length: f64,
    pub diffusion: f64,
    pub confine: Confinement,
    pub confine_space: usize,

    // ---------- derived at complete()
    pub(crate) diffusion_dt: f64,
}

impl CoupleProp {
    pub fn new(name: &str, hand1: usize, hand2: usize) -> CoupleProp {
        CoupleProp {
            name: name.to_string(),
            hand1,
            hand2,
            stiffness: 0.0,
            length: 0.0,
            diffusion: 0.0,
            confine: Confinement::Off,
            confine_space: 0,
            diffusion_dt: 0.0,
        }
    }

    pub fn complete(&mut self, simul: &SimulProp, nb_hands: usize) -> Result<(), SimError> {
        let name = format!("couple:{}", self.name);
        if self.hand1 >= nb_hands || self.hand2 >= nb_hands {
            return Err(SimError::conf(&name, "refers to an undefined hand class"));
        }
        if self.stiffness < 0.0 || self.length < 0.0 {
            return Err(SimError::conf(&name, "stiffness and length must be >= 0"));
        }
        self.diffusion_dt = (6.0 * self.diffusion * simul.time_step).sqrt();
        Ok(())
    }
}

/// The read-mostly catalog of all parameter records, grouped by kind and
/// addressed by index within the kind.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    pub simul: SimulProp,
    pub fibers: Vec<FiberProp>,
    pub solids: Vec<SolidProp>,
    pub beads: Vec<BeadProp>,
    pub spheres: Vec<SphereProp>,
    pub hands: Vec<HandProp>,
    pub singles: Vec<SingleProp>,
    pub couples: Vec<CoupleProp>,
}

impl Properties {
    pub fn new(simul: SimulProp) -> Properties {
        Properties { simul, ..Default::default() }
    }

    pub fn add_fiber(&mut self, p: FiberProp) -> usize {
        self.fibers.push(p);
        self.fibers.len() - 1
    }

    pub fn add_solid(&mut self, p: SolidProp) -> usize {
        self.solids.push(p);
        self.solids.len() - 1
    }

    pub fn add_bead(&mut self, p: BeadProp) -> usize {
        self.beads.push(p);
        self.beads.len() - 1
    }

    pub fn add_sphere(&mut self, p: SphereProp) -> usize {
        self.spheres.push(p);
        self.spheres.len() - 1
    }

    pub fn add_hand(&mut self, p: HandProp) -> usize {
        self.hands.push(p);
        self.hands.len() - 1
    }

    pub fn add_single(&mut self, p: SingleProp) -> usize {
        self.singles.push(p);
        self.singles.len() - 1
    }

    pub fn add_couple(&mut self, p: CoupleProp) -> usize {
        self.couples.push(p);
        self.couples.len() - 1
    }

    /// Finds a record index by `(kind, name)`
    pub fn find(&self, kind: &str, name: &str) -> Option<usize> {
        match kind {
            "fiber" => self.fibers.iter().position(|p| p.name == name),
            "solid" => self.solids.iter().position(|p| p.name == name),
            "bead" => self.beads.iter().position(|p| p.name == name),
            "sphere" => self.spheres.iter().position(|p| p.name == name),
            "hand" => self.hands.iter().position(|p| p.name == name),
            "single" => self.singles.iter().position(|p| p.name == name),
            "couple" => self.couples.iter().position(|p| p.name == name),
            _ => None,
        }
    }

    /// All record names of one kind, in index order
    pub fn find_all(&self, kind: &str) -> Vec<String> {
        match kind {
            "fiber" => self.fibers.iter().map(|p| p.name.clone()).collect(),
            "solid" => self.solids.iter().map(|p| p.name.clone()).collect(),
            "bead" => self.beads.iter().map(|p| p.name.clone()).collect(),
            "sphere" => self.spheres.iter().map(|p| p.name.clone()).collect(),
            "hand" => self.hands.iter().map(|p| p.name.clone()).collect(),
            "single" => self.singles.iter().map(|p| p.name.clone()).collect(),
            "couple" => self.couples.iter().map(|p| p.name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Validates every record and derives the cached per-step quantities.
    /// Must be called before stepping, and again after any change.
    pub fn complete(&mut self) -> Result<(), SimError> {
        self.simul.complete()?;
        for p in self.fibers.iter() {
            p.complete(&self.simul)?;
        }
        for p in self.solids.iter().chain(self.beads.iter()).chain(self.spheres.iter()) {
            p.complete(&self.simul)?;
        }
        let nb_hands = self.hands.len();
        for p in self.hands.iter_mut() {
            p.complete(&self.simul)?;
        }
        for p in self.singles.iter_mut() {
            p.complete(&self.simul, nb_hands)?;
        }
        for p in self.couples.iter_mut() {
            p.complete(&self.simul, nb_hands)?;
        }
        Ok(())
    }

    /// The largest binding range over all hand classes, which sizes the
    /// binding grid and its painting radius.
    pub fn binding_range_max(&self) -> f64 {
        self.hands.iter().map(|h| h.binding_range).fold(0.0, f64::max)
    }
}

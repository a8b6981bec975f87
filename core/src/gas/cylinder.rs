use crate::error::{PlanError, Result};
use crate::gas::GasMix;

/// Maximum number of gases considered for automatic switching.
pub const MAX_GAS_MIXES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CylinderUse {
    OpenCircuit,
    Diluent,
}

/// A cylinder with its gas, size and projected pressure.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub gas: GasMix,
    /// Water volume (litres).
    pub size_l: f64,
    pub working_pressure_bar: f64,
    pub start_pressure_bar: f64,
    pub usage: CylinderUse,
    current_pressure_bar: f64,
}

impl Cylinder {
    /// Open-circuit cylinder filled to its working pressure.
    pub fn new(gas: GasMix, size_l: f64, working_pressure_bar: f64) -> Self {
        Self {
            gas,
            size_l,
            working_pressure_bar,
            start_pressure_bar: working_pressure_bar,
            usage: CylinderUse::OpenCircuit,
            current_pressure_bar: working_pressure_bar,
        }
    }

    pub fn with_start_pressure(mut self, start_pressure_bar: f64) -> Self {
        self.start_pressure_bar = start_pressure_bar;
        self.current_pressure_bar = start_pressure_bar;
        self
    }

    pub fn as_diluent(mut self) -> Self {
        self.usage = CylinderUse::Diluent;
        self
    }

    pub fn is_diluent(&self) -> bool {
        self.usage == CylinderUse::Diluent
    }

    pub fn current_pressure(&self) -> f64 {
        self.current_pressure_bar
    }

    /// Surface-equivalent gas content at the start pressure (litres).
    pub fn start_volume_l(&self) -> f64 {
        self.size_l * self.start_pressure_bar
    }

    pub fn remaining_volume_l(&self) -> f64 {
        self.size_l * self.current_pressure_bar
    }

    /// Draw `litres` of surface-equivalent gas. Pressure never drops below
    /// zero; the litres that could not be supplied are returned.
    pub fn consume(&mut self, litres: f64) -> f64 {
        let available = self.remaining_volume_l();
        if litres <= available {
            self.current_pressure_bar -= litres / self.size_l;
            0.0
        } else {
            self.current_pressure_bar = 0.0;
            litres - available
        }
    }

    pub fn restore(&mut self) {
        self.current_pressure_bar = self.start_pressure_bar;
    }

    fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: &str| PlanError::InvalidCylinder {
            index,
            reason: reason.to_string(),
        };
        if !(self.size_l.is_finite() && self.size_l > 0.0) {
            return Err(invalid("size must be positive"));
        }
        if !(self.working_pressure_bar.is_finite() && self.working_pressure_bar > 0.0) {
            return Err(invalid("working pressure must be positive"));
        }
        if !(self.start_pressure_bar.is_finite() && self.start_pressure_bar > 0.0) {
            return Err(invalid("start pressure must be positive"));
        }
        Ok(())
    }
}

/// The set of cylinders available to a plan, addressed by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GasRegistry {
    cylinders: Vec<Cylinder>,
}

impl GasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cylinder and return its index.
    pub fn add(&mut self, cylinder: Cylinder) -> usize {
        self.cylinders.push(cylinder);
        self.cylinders.len() - 1
    }

    pub fn get(&self, index: usize) -> Result<&Cylinder> {
        self.cylinders.get(index).ok_or(PlanError::GasNotFound(index))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Cylinder> {
        self.cylinders
            .get_mut(index)
            .ok_or(PlanError::GasNotFound(index))
    }

    pub fn len(&self) -> usize {
        self.cylinders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cylinders.is_empty()
    }

    pub fn cylinders(&self) -> &[Cylinder] {
        &self.cylinders
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Cylinder)> {
        self.cylinders.iter().enumerate()
    }

    pub fn restore_all(&mut self) {
        for cylinder in &mut self.cylinders {
            cylinder.restore();
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (index, cylinder) in self.iter() {
            cylinder.validate(index)?;
        }
        Ok(())
    }

    /// Open-circuit cylinders eligible for automatic gas switching.
    pub fn switchable(&self) -> impl Iterator<Item = (usize, &Cylinder)> {
        self.iter()
            .take(MAX_GAS_MIXES)
            .filter(|(_, c)| !c.is_diluent())
    }

    /// Best open-circuit gas at an ambient pressure: pO₂ within
    /// `[min_po2, max_po2]`, highest O₂, then lowest He, then lowest index.
    pub fn best_gas_at(&self, ambient_bar: f64, min_po2: f64, max_po2: f64) -> Option<usize> {
        let mut best: Option<(usize, &Cylinder)> = None;
        for (index, cylinder) in self.switchable() {
            let po2 = cylinder.gas.po2_at(ambient_bar);
            if po2 > max_po2 + 1e-9 || po2 < min_po2 - 1e-9 {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) => {
                    cylinder.gas.o2() > current.gas.o2() + 1e-9
                        || ((cylinder.gas.o2() - current.gas.o2()).abs() <= 1e-9
                            && cylinder.gas.he() < current.gas.he() - 1e-9)
                }
            };
            if better {
                best = Some((index, cylinder));
            }
        }
        best.map(|(index, _)| index)
    }
}

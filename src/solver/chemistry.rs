//! Species declarations and dissociation stoichiometry.
//!
//! The chemistry is fixed: sodium sulfate fed through inlet A, barium
//! chloride through inlet B, and a convection-only solid proxy tracking
//! precipitated barite. Resolving a parent-salt molality into per-ion
//! molalities preserves the declared molar ratios exactly and is checked for
//! charge balance at declaration time.

use indexmap::IndexMap;

use crate::solver::error::{ConfigError, Result};

/// How the solver transports a declared scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// Convection + diffusion; receives a Schmidt number.
    FullTransport,
    /// Convection only; no diffusive term, no Schmidt number, no reaction
    /// source wiring.
    ConvectionOnly,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::FullTransport => "full-transport",
            TransportMode::ConvectionOnly => "convection-only",
        }
    }
}

/// One transported scalar species, declared once per experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
    name: &'static str,
    molar_mass: f64,
    charge: Option<i32>,
    diffusivity: f64,
    transport: TransportMode,
}

impl Species {
    pub fn ion(name: &'static str, molar_mass: f64, charge: i32, diffusivity: f64) -> Self {
        Self {
            name,
            molar_mass,
            charge: Some(charge),
            diffusivity,
            transport: TransportMode::FullTransport,
        }
    }

    /// A solid-phase proxy scalar: carried by the flow but neither diffusing
    /// nor reacting through the source terms.
    pub fn solid_proxy(name: &'static str, molar_mass: f64) -> Self {
        Self {
            name,
            molar_mass,
            charge: None,
            diffusivity: 0.0,
            transport: TransportMode::ConvectionOnly,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    pub fn charge(&self) -> Option<i32> {
        self.charge
    }

    pub fn diffusivity(&self) -> f64 {
        self.diffusivity
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    pub fn is_convection_only(&self) -> bool {
        self.transport == TransportMode::ConvectionOnly
    }
}

/// Fixed constants of the barite system.
pub mod constants {
    /// kg/mol
    pub const MOLAR_MASS_WATER: f64 = 18.01528e-3;
    /// kg/mol
    pub const MOLAR_MASS_BARITE: f64 = 233.39e-3;
    /// kg/m^3
    pub const DENSITY_BARITE: f64 = 4480.0;

    /// Infinite-dilution diffusivities, m^2/s.
    pub const D_SO4_BASE: f64 = 1.06e-9;
    pub const D_NA: f64 = 1.334e-9;
    pub const D_BA_BASE: f64 = 0.847e-9;
    pub const D_CL: f64 = 2.032e-9;

    /// g/mol molar masses, SI.
    pub const MOLAR_MASS_SO4: f64 = 96.06e-3;
    pub const MOLAR_MASS_NA: f64 = 22.99e-3;
    pub const MOLAR_MASS_BA: f64 = 137.327e-3;
    pub const MOLAR_MASS_CL: f64 = 35.45e-3;
}

pub const SULFATE: &str = "mSO4_2-";
pub const SODIUM: &str = "mNa_1+";
pub const BARIUM: &str = "mBa_2+";
pub const CHLORIDE: &str = "mCl_1-";
pub const BARITE_SCALE: &str = "BariteScale";

/// The two ionic species of the non-reactive mixing study. The sulfate
/// diffusivity carries the study's 0.5x prefactor.
pub fn mixing_species() -> Vec<Species> {
    vec![
        Species::ion(SULFATE, constants::MOLAR_MASS_SO4, -2, 0.5 * constants::D_SO4_BASE),
        Species::ion(SODIUM, constants::MOLAR_MASS_NA, 1, constants::D_NA),
    ]
}

/// All five scalars of the reactive study, in the canonical index order
/// every concentration vector uses. The sulfate and barium diffusivities
/// carry the study's 2x prefactors.
pub fn reactive_species() -> Vec<Species> {
    vec![
        Species::ion(SULFATE, constants::MOLAR_MASS_SO4, -2, 2.0 * constants::D_SO4_BASE),
        Species::ion(SODIUM, constants::MOLAR_MASS_NA, 1, constants::D_NA),
        Species::ion(BARIUM, constants::MOLAR_MASS_BA, 2, 2.0 * constants::D_BA_BASE),
        Species::ion(CHLORIDE, constants::MOLAR_MASS_CL, -1, constants::D_CL),
        Species::solid_proxy(BARITE_SCALE, constants::MOLAR_MASS_BARITE),
    ]
}

/// Dissociation stoichiometry of one parent compound:
/// `A_xB_y -> x A + y B`, stored as species -> coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct Dissociation {
    parent: &'static str,
    coefficients: IndexMap<&'static str, f64>,
}

impl Dissociation {
    /// Declare a dissociation. Coefficients must be positive, the product
    /// list non-empty, and one formula unit must carry zero net ionic
    /// charge.
    pub fn new(parent: &'static str, products: &[(&Species, f64)]) -> Result<Self> {
        if products.is_empty() {
            return Err(ConfigError::invalid(
                parent,
                "dissociation has no products",
            ));
        }

        let mut coefficients = IndexMap::new();
        let mut net_charge = 0.0;
        for (species, coeff) in products {
            if !coeff.is_finite() || *coeff <= 0.0 {
                return Err(ConfigError::invalid(
                    parent,
                    format!(
                        "stoichiometric coefficient for {} must be > 0: {coeff}",
                        species.name()
                    ),
                ));
            }
            let charge = species.charge().ok_or_else(|| {
                ConfigError::invalid(
                    parent,
                    format!("{} is not an ionic species", species.name()),
                )
            })?;
            if coefficients.insert(species.name(), *coeff).is_some() {
                return Err(ConfigError::invalid(
                    parent,
                    format!("{} listed twice", species.name()),
                ));
            }
            net_charge += coeff * charge as f64;
        }

        if net_charge.abs() > 1e-12 {
            return Err(ConfigError::invalid(
                parent,
                format!("formula unit carries net charge {net_charge}"),
            ));
        }

        Ok(Self {
            parent,
            coefficients,
        })
    }

    /// 1 Na2SO4 -> 2 Na+ + 1 SO4^2-.
    pub fn sodium_sulfate(species: &[Species]) -> Result<Self> {
        let na = find(species, SODIUM)?;
        let so4 = find(species, SULFATE)?;
        Self::new("Na2SO4", &[(na, 2.0), (so4, 1.0)])
    }

    /// 1 BaCl2 -> 1 Ba^2+ + 2 Cl-.
    pub fn barium_chloride(species: &[Species]) -> Result<Self> {
        let ba = find(species, BARIUM)?;
        let cl = find(species, CHLORIDE)?;
        Self::new("BaCl2", &[(ba, 1.0), (cl, 2.0)])
    }

    pub fn parent(&self) -> &'static str {
        self.parent
    }

    pub fn coefficient(&self, species: &str) -> Option<f64> {
        self.coefficients.get(species).copied()
    }

    /// Per-species molalities from a parent molality:
    /// `c[s] = coeff[s] / coeff[reference] * parent`.
    pub fn resolve(
        &self,
        parent_concentration: f64,
        reference_species: &str,
    ) -> Result<IndexMap<&'static str, f64>> {
        if !parent_concentration.is_finite() || parent_concentration < 0.0 {
            return Err(ConfigError::invalid(
                self.parent,
                format!("parent concentration must be finite and >= 0: {parent_concentration}"),
            ));
        }
        let reference = self.coefficients.get(reference_species).ok_or_else(|| {
            ConfigError::invalid(
                self.parent,
                format!("reference species {reference_species} not among products"),
            )
        })?;

        Ok(self
            .coefficients
            .iter()
            .map(|(name, coeff)| (*name, coeff / reference * parent_concentration))
            .collect())
    }
}

fn find<'a>(species: &'a [Species], name: &str) -> Result<&'a Species> {
    species
        .iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ConfigError::invalid(name, "species not declared"))
}

/// Merge per-parent resolutions into one concentration vector ordered by the
/// canonical species list, zero-filling species no parent produces. A
/// resolved species missing from the canonical list is an error: index
/// positions between the species list and every emitted vector must never
/// drift.
pub fn inlet_vector(
    canonical: &[Species],
    resolutions: &[&IndexMap<&'static str, f64>],
) -> Result<Vec<f64>> {
    for resolution in resolutions {
        for name in resolution.keys() {
            if !canonical.iter().any(|s| s.name() == *name) {
                return Err(ConfigError::invalid(
                    *name,
                    "resolved species not in canonical list",
                ));
            }
        }
    }

    Ok(canonical
        .iter()
        .map(|species| {
            resolutions
                .iter()
                .filter_map(|r| r.get(species.name()))
                .sum()
        })
        .collect())
}

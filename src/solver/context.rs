//! Per-run experiment context.
//!
//! One `ExperimentContext` is derived per run from a flat parameter set and
//! owns everything downstream: derived scalars, the expression graph, the
//! run plan, and the session identity. Nothing here is shared across runs,
//! and every derivation failure is reported before a single solver call is
//! issued.

use crate::solver::chemistry::{
    self, constants, Dissociation, Species, BARIUM, SULFATE,
};
use crate::solver::error::{ConfigError, Result};
use crate::solver::graph::{ExprGraph, NodeKind};
use crate::solver::kinetics::{self, KineticParams};
use crate::solver::plan::{FreezeSettings, RunPlan, UnsteadySettings};
use crate::solver::scaling;
use crate::solver::session::Session;
use crate::solver::turbulence::TurbulenceModel;
use crate::solver::units::si;

/// Which of the two Couette-cell studies a run configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyKind {
    /// Non-reactive tracer mixing (sodium sulfate only).
    Mixing,
    /// Reactive barite precipitation (phi time series).
    Reactive,
}

impl StudyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StudyKind::Mixing => "mixing",
            StudyKind::Reactive => "phi-time-series",
        }
    }
}

/// Flat experiment inputs. Construct through the study presets, then adjust
/// fields as needed before deriving the context.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParams {
    pub study: StudyKind,
    /// Rotor diameter, m (rotor 1 = 80 mm, rotor 2 = 50 mm).
    pub rotor_diameter: f64,
    pub rpm: f64,
    /// kg/m^3
    pub density: f64,
    /// Pa s
    pub viscosity: f64,
    /// Total feed, mL/min, split over the two inlets.
    pub flow_rate_ml_min: f64,
    /// mol/kg solvent at inlet A.
    pub concentration_na2so4: f64,
    /// mol/kg solvent at inlet B (reactive study).
    pub concentration_bacl2: f64,
    pub turbulent_schmidt: f64,
    /// deg C (reactive study runs isothermal).
    pub temperature_c: f64,
    /// Relative mesh base size in stator-rotor gap units.
    pub mesh_scale: f64,
    pub target_mean_courant: f64,
    pub reference_rpm: f64,
    pub reference_mesh_scale: f64,
    pub reference_diameter: f64,
    pub turbulence: TurbulenceModel,
    /// Physical integration time, s.
    pub duration: f64,
    pub inner_iterations: u32,
}

impl ExperimentParams {
    /// Non-reactive mixing validation study.
    pub fn mixing_study(rpm: f64, flow_rate_ml_min: f64, concentration_na2so4: f64) -> Self {
        Self {
            study: StudyKind::Mixing,
            rotor_diameter: 80.0e-3,
            rpm,
            density: 997.561,
            viscosity: 8.8871e-4,
            flow_rate_ml_min,
            concentration_na2so4,
            concentration_bacl2: 0.0,
            turbulent_schmidt: 0.9,
            temperature_c: 25.0,
            mesh_scale: 5.0,
            target_mean_courant: 20.0,
            reference_rpm: 500.0,
            reference_mesh_scale: 20.0,
            reference_diameter: 80.0e-3,
            turbulence: TurbulenceModel::RansRst,
            duration: 100.0,
            inner_iterations: 1,
        }
    }

    /// Reactive barite precipitation study.
    pub fn phi_study(
        rotor_diameter: f64,
        rpm: f64,
        flow_rate_ml_min: f64,
        concentration_na2so4: f64,
        concentration_bacl2: f64,
    ) -> Self {
        Self {
            study: StudyKind::Reactive,
            rotor_diameter,
            rpm,
            density: 997.561,
            viscosity: 8.8871e-4,
            flow_rate_ml_min,
            concentration_na2so4,
            concentration_bacl2,
            turbulent_schmidt: 0.9,
            temperature_c: 25.0,
            mesh_scale: 20.0,
            target_mean_courant: 0.8,
            reference_rpm: 1000.0,
            reference_mesh_scale: 20.0,
            reference_diameter: 80.0e-3,
            turbulence: TurbulenceModel::RansRst,
            duration: 100_000.0,
            inner_iterations: 1,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rotor_diameter", self.rotor_diameter),
            ("rpm", self.rpm),
            ("density", self.density),
            ("viscosity", self.viscosity),
            ("flow_rate_ml_min", self.flow_rate_ml_min),
            ("turbulent_schmidt", self.turbulent_schmidt),
            ("mesh_scale", self.mesh_scale),
            ("target_mean_courant", self.target_mean_courant),
            ("reference_rpm", self.reference_rpm),
            ("reference_mesh_scale", self.reference_mesh_scale),
            ("reference_diameter", self.reference_diameter),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    format!("must be finite and > 0: {value}"),
                ));
            }
        }
        for (name, value) in [
            ("concentration_na2so4", self.concentration_na2so4),
            ("concentration_bacl2", self.concentration_bacl2),
            ("duration", self.duration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    format!("must be finite and >= 0: {value}"),
                ));
            }
        }
        if !self.temperature_c.is_finite() {
            return Err(ConfigError::invalid(
                "temperature_c",
                format!("not finite: {}", self.temperature_c),
            ));
        }
        Ok(())
    }
}

/// One per-species Schmidt-number assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchmidtAssignment {
    pub species: &'static str,
    pub value: f64,
}

/// Everything a run derives before emission. Immutable after `derive`,
/// except for the run-plan state machine the emitter walks.
#[derive(Debug, Clone)]
pub struct ExperimentContext {
    params: ExperimentParams,
    species: Vec<Species>,
    time_step: f64,
    courant_bounds: (f64, f64),
    mass_flow_per_inlet: f64,
    schmidt: Vec<SchmidtAssignment>,
    inlet_a: Vec<f64>,
    inlet_b: Vec<f64>,
    initial: Option<Vec<f64>>,
    graph: ExprGraph,
    plan: RunPlan,
    session: Session,
}

impl ExperimentContext {
    pub fn derive(params: ExperimentParams) -> Result<Self> {
        Self::derive_with_session(params, Session::new())
    }

    pub fn derive_with_session(params: ExperimentParams, session: Session) -> Result<Self> {
        params.validate()?;

        let species = match params.study {
            StudyKind::Mixing => chemistry::mixing_species(),
            StudyKind::Reactive => chemistry::reactive_species(),
        };

        let time_step = scaling::time_step(
            params.target_mean_courant,
            params.reference_rpm,
            params.rpm,
            params.mesh_scale,
            params.reference_mesh_scale,
            params.reference_diameter,
            params.rotor_diameter,
        )?;
        let courant_bounds = scaling::courant_bounds(params.target_mean_courant);
        let mass_flow_per_inlet =
            scaling::mass_flow_rate(params.flow_rate_ml_min, 2, params.density)?;

        let mut schmidt = Vec::new();
        for s in &species {
            if s.is_convection_only() {
                continue;
            }
            schmidt.push(SchmidtAssignment {
                species: s.name(),
                value: scaling::schmidt_number(params.viscosity, s.diffusivity(), params.density)?,
            });
        }

        let na2so4 = Dissociation::sodium_sulfate(&species)?;
        let inlet_a_resolution = na2so4.resolve(params.concentration_na2so4, SULFATE)?;
        let inlet_a = chemistry::inlet_vector(&species, &[&inlet_a_resolution])?;

        let inlet_b = match params.study {
            StudyKind::Mixing => vec![0.0; species.len()],
            StudyKind::Reactive => {
                let bacl2 = Dissociation::barium_chloride(&species)?;
                let resolution = bacl2.resolve(params.concentration_bacl2, BARIUM)?;
                chemistry::inlet_vector(&species, &[&resolution])?
            }
        };

        // The domain starts filled with the inlet-A salt; the barium side
        // starts clean.
        let initial = match params.study {
            StudyKind::Mixing => None,
            StudyKind::Reactive => Some(inlet_a.clone()),
        };

        let graph = build_graph(&params, &species)?;
        graph.validate()?;

        Ok(Self {
            params,
            species,
            time_step,
            courant_bounds,
            mass_flow_per_inlet,
            schmidt,
            inlet_a,
            inlet_b,
            initial,
            graph,
            plan: RunPlan::new(),
            session,
        })
    }

    pub fn params(&self) -> &ExperimentParams {
        &self.params
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_index(&self, name: &str) -> Result<usize> {
        self.species
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| ConfigError::invalid(name, "species not declared"))
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn courant_bounds(&self) -> (f64, f64) {
        self.courant_bounds
    }

    pub fn mass_flow_per_inlet(&self) -> f64 {
        self.mass_flow_per_inlet
    }

    pub fn schmidt(&self) -> &[SchmidtAssignment] {
        &self.schmidt
    }

    pub fn inlet_a(&self) -> &[f64] {
        &self.inlet_a
    }

    pub fn inlet_b(&self) -> &[f64] {
        &self.inlet_b
    }

    pub fn initial_concentrations(&self) -> Option<&[f64]> {
        self.initial.as_deref()
    }

    pub fn graph(&self) -> &ExprGraph {
        &self.graph
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut RunPlan {
        &mut self.plan
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_reactive(&self) -> bool {
        self.params.study == StudyKind::Reactive
    }

    pub fn unsteady_settings(&self) -> UnsteadySettings {
        UnsteadySettings {
            time_step: self.time_step,
            target_mean_courant: self.courant_bounds.0,
            target_max_courant: self.courant_bounds.1,
            second_order: true,
            inner_iterations: self.params.inner_iterations,
        }
    }

    pub fn freeze_settings(&self) -> FreezeSettings {
        FreezeSettings {
            turbulence: self.params.turbulence.turbulence_solver(),
        }
    }

    /// Persisted-state file name for this run.
    pub fn sim_name(&self) -> String {
        match self.params.study {
            StudyKind::Mixing => self.session.mixing_sim_name(self.params.turbulence),
            StudyKind::Reactive => self
                .session
                .phi_sim_name(self.params.rotor_diameter, self.params.rpm),
        }
    }
}

fn build_graph(params: &ExperimentParams, species: &[Species]) -> Result<ExprGraph> {
    let mut graph = ExprGraph::new();

    for s in species {
        graph.add_leaf(s.name(), si::MOLALITY, NodeKind::SpeciesConcentration)?;
    }

    if params.study == StudyKind::Mixing {
        return Ok(graph);
    }

    // Solver primitives the reactive definitions read.
    graph.add_leaf(kinetics::WALL_DISTANCE, si::LENGTH, NodeKind::SolverProvided)?;
    graph.add_leaf("Density", si::DENSITY, NodeKind::SolverProvided)?;
    graph.add_leaf("Volume", si::VOLUME, NodeKind::SolverProvided)?;
    graph.add_leaf(
        "UserPitzerSaturationIndex",
        si::DIMENSIONLESS,
        NodeKind::SolverProvided,
    )?;
    graph.add_leaf(
        kinetics::ACTIVITY_COEFFICIENT,
        si::DIMENSIONLESS,
        NodeKind::SolverProvided,
    )?;
    graph.add_leaf(
        "UserDebyeHuckelWallDeposition(Molality)",
        si::MOLALITY * si::INV_TIME,
        NodeKind::SolverProvided,
    )?;
    graph.add_leaf(
        "UserDebyeHuckelWallDeposition(MoleFraction)",
        si::INV_TIME,
        NodeKind::SolverProvided,
    )?;

    graph.add_constant("MolarMassWater", constants::MOLAR_MASS_WATER, si::MOLAR_MASS)?;
    graph.add_constant("MolarMassBarite", constants::MOLAR_MASS_BARITE, si::MOLAR_MASS)?;
    graph.add_constant("DensityBarite", constants::DENSITY_BARITE, si::DENSITY)?;

    // Molality bookkeeping and mole fractions.
    graph.add_expr(
        "mEtc_1-",
        "mEtc_1-",
        "${mCl_1-} + ${mNa_1+}",
        si::MOLALITY,
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "mEtc_2-",
        "mEtc_2-",
        "${mSO4_2-} + ${mBa_2+}",
        si::MOLALITY,
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "mTot",
        "mTot",
        "1.0 / ${MolarMassWater} + ${mEtc_1-} + ${mEtc_2-}",
        si::MOLALITY,
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "yEtc_1-",
        "yEtc_1-",
        "${mEtc_1-} / ${mTot}",
        si::DIMENSIONLESS,
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "yEtc_2-",
        "yEtc_2-",
        "${mEtc_2-} / ${mTot}",
        si::DIMENSIONLESS,
        NodeKind::SpeciesConcentration,
    )?;
    for s in species {
        let Some(suffix) = s.name().strip_prefix('m') else {
            continue;
        };
        graph.add_expr(
            format!("y{suffix}"),
            format!("y{suffix}"),
            &format!("${{{}}} / ${{mTot}}", s.name()),
            si::DIMENSIONLESS,
            NodeKind::SpeciesConcentration,
        )?;
    }

    // Saturation and the monitored ion product.
    graph.add_expr(
        kinetics::SATURATION_RATE,
        "Saturation Rate",
        "pow(10,${UserPitzerSaturationIndex})",
        si::DIMENSIONLESS,
        NodeKind::ScalingDerived,
    )?;
    graph.add_expr_declared(
        "ReactionParameter",
        "Reaction Parameter",
        "${mBa_2+} * ${mSO4_2-}",
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;

    // Wall-deposition bookkeeping.
    graph.add_expr(
        "dBaSO4dt",
        "dBaSO4dt",
        "${UserDebyeHuckelWallDeposition(Molality)} * ${Density}",
        si::MOLE.div_dim(si::VOLUME).mul_dim(si::INV_TIME),
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "dydt",
        "dydt",
        "-${UserDebyeHuckelWallDeposition(MoleFraction)} / ${Volume}",
        si::REACTIVITY,
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "dBadt",
        "dBadt",
        "-${dBaSO4dt}",
        si::MOLE.div_dim(si::VOLUME).mul_dim(si::INV_TIME),
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "dSO4dt",
        "dSO4dt",
        "-${dBaSO4dt}",
        si::MOLE.div_dim(si::VOLUME).mul_dim(si::INV_TIME),
        NodeKind::SpeciesConcentration,
    )?;
    graph.add_expr(
        "BariteVolumeFraction",
        "BariteVolumeFraction",
        "${BariteScale} * ${Density} * ${MolarMassBarite} / ${DensityBarite}",
        si::DIMENSIONLESS,
        NodeKind::SpeciesConcentration,
    )?;

    kinetics::enable_reaction_subgraph(&mut graph, &KineticParams::default())?;

    Ok(graph)
}

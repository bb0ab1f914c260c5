//! Capability surface of the external numerical solver.
//!
//! The derivation core never touches the solver's object model directly; it
//! issues calls through [`SolverBackend`]. The backend owns name resolution:
//! a boundary, region, or species index it does not know is surfaced as
//! [`ConfigError::ExternalCollaborator`] and aborts emission — configuration
//! calls are not idempotent against partial solver state, so nothing is
//! retried.
//!
//! [`RecordingBackend`] is the artifact-producing implementation: every call
//! becomes a serializable event, and the event stream plus a header is the
//! declarative configuration artifact handed to the actual solver driver.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::solver::chemistry::TransportMode;
use crate::solver::error::{ConfigError, Result};
use crate::solver::session::AutosavePolicy;
use crate::solver::units::Dim;

const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Opaque handle to a physics continuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContinuumHandle(pub u32);

/// Physics models the solver can enable or disable on a continuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    ThreeDimensional,
    Steady,
    ImplicitUnsteady,
    AdaptiveTimeStep,
    SegregatedFlow,
    SegregatedFluidIsothermal,
    PassiveScalar,
    Turbulent,
    RansTurbulence,
    KOmegaTurbulence,
    SstKOmega,
    KOmegaAllYPlusWall,
    GammaTransition,
    ReynoldsStressTurbulence,
    EbRsm,
    EbRsmAllYPlusWall,
    KEpsilonTurbulence,
    RkeTwoLayer,
    KeTwoLayerAllYPlusWall,
    LesTurbulence,
    WaleSgs,
    LesAllYPlusWall,
    Laminar,
}

/// Solvers that can be frozen once the flow field is converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverKind {
    SegregatedFlow,
    EbRsTurbulence,
    KOmegaTurbulence,
    KEpsilonTurbulence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    MassFlowAverage,
    VolumeAverage,
}

/// A boundary profile entry: either a constant or a reference to a named
/// expression the solver evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileValue {
    Constant(f64),
    Expression(String),
}

/// Declaration of one transported scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSpeciesDecl {
    pub name: String,
    pub transport: TransportMode,
    pub clip_both: bool,
    pub max_allowable: f64,
    pub use_ggdh: bool,
}

pub trait SolverBackend {
    fn get_or_create_continuum(&mut self, name: &str) -> Result<ContinuumHandle>;
    fn enable_model(&mut self, continuum: ContinuumHandle, model: ModelKind) -> Result<()>;
    fn disable_model(&mut self, continuum: ContinuumHandle, model: ModelKind) -> Result<()>;
    fn set_time_step(&mut self, continuum: ContinuumHandle, seconds: f64) -> Result<()>;
    fn set_adaptive_time_step(
        &mut self,
        continuum: ContinuumHandle,
        target_mean_cfl: f64,
        target_max_cfl: f64,
    ) -> Result<()>;
    fn set_second_order_time(&mut self, continuum: ContinuumHandle) -> Result<()>;
    fn set_inner_iterations(&mut self, count: u32) -> Result<()>;
    fn set_isothermal_temperature(&mut self, continuum: ContinuumHandle, celsius: f64)
        -> Result<()>;
    fn declare_scalar_species(&mut self, decl: &ScalarSpeciesDecl) -> Result<()>;
    fn set_schmidt_number(&mut self, species: &str, value: f64) -> Result<()>;
    fn set_turbulent_schmidt_number(&mut self, species: &str, value: f64) -> Result<()>;
    fn set_initial_concentration(&mut self, species_index: usize, value: f64) -> Result<()>;
    fn set_boundary_scalar_profile(
        &mut self,
        boundary: &str,
        species_index: usize,
        value: ProfileValue,
    ) -> Result<()>;
    fn set_mass_flow_rate(&mut self, boundary: &str, kg_per_s: f64) -> Result<()>;
    fn set_wall_flux(
        &mut self,
        boundary: &str,
        species_index: usize,
        flux_expr: &str,
        flux_derivative_expr: &str,
    ) -> Result<()>;
    fn set_volumetric_source(
        &mut self,
        region: &str,
        species_index: usize,
        source_expr: &str,
        source_derivative_expr: &str,
    ) -> Result<()>;
    fn create_derived_expression(
        &mut self,
        id: &str,
        display_name: &str,
        definition: &str,
        dim: Dim,
    ) -> Result<()>;
    fn create_monitor(
        &mut self,
        name: &str,
        target: &str,
        aggregation: Aggregation,
        part: &str,
    ) -> Result<()>;
    fn freeze_solver(&mut self, solver: SolverKind, frozen: bool) -> Result<()>;
    fn configure_autosave(&mut self, policy: &AutosavePolicy) -> Result<()>;
    fn initialize_solution(&mut self) -> Result<()>;
    fn advance_physical_time(&mut self, duration_seconds: f64) -> Result<()>;
    fn persist_state(&mut self, path: &str) -> Result<()>;
}

/// One recorded configuration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConfigEvent {
    ContinuumCreated {
        name: String,
    },
    ModelEnabled {
        continuum: String,
        model: ModelKind,
    },
    ModelDisabled {
        continuum: String,
        model: ModelKind,
    },
    TimeStepSet {
        seconds: f64,
    },
    AdaptiveTimeStepSet {
        target_mean_cfl: f64,
        target_max_cfl: f64,
    },
    SecondOrderTimeEnabled,
    InnerIterationsSet {
        count: u32,
    },
    IsothermalTemperatureSet {
        celsius: f64,
    },
    ScalarSpeciesDeclared {
        name: String,
        transport: String,
        clip_both: bool,
        max_allowable: f64,
        use_ggdh: bool,
    },
    SchmidtNumberSet {
        species: String,
        value: f64,
    },
    TurbulentSchmidtNumberSet {
        species: String,
        value: f64,
    },
    InitialConcentrationSet {
        species_index: usize,
        value: f64,
    },
    BoundaryScalarProfileSet {
        boundary: String,
        species_index: usize,
        value: ProfileValue,
    },
    MassFlowRateSet {
        boundary: String,
        kg_per_s: f64,
    },
    WallFluxSet {
        boundary: String,
        species_index: usize,
        flux: String,
        flux_derivative: String,
    },
    VolumetricSourceSet {
        region: String,
        species_index: usize,
        source: String,
        source_derivative: String,
    },
    DerivedExpressionCreated {
        id: String,
        name: String,
        definition: String,
        dimension: String,
    },
    MonitorCreated {
        name: String,
        target: String,
        aggregation: Aggregation,
        part: String,
    },
    SolverFrozen {
        solver: SolverKind,
        frozen: bool,
    },
    AutosaveConfigured {
        separator: String,
        format_width: u32,
        max_files: u32,
        trigger: String,
        every: u32,
    },
    SolutionInitialized,
    PhysicalTimeAdvanced {
        seconds: f64,
    },
    StatePersisted {
        path: String,
    },
}

/// Artifact header written ahead of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub study: String,
    pub uid: String,
}

impl ArtifactHeader {
    pub fn new(study: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            study: study.into(),
            uid: uid.into(),
        }
    }
}

/// Backend that records every call as an event, validating names and
/// indices against a declared topology the way the real solver would.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    boundaries: IndexSet<String>,
    regions: IndexSet<String>,
    continua: IndexMap<String, ContinuumHandle>,
    species: Vec<String>,
    expressions: IndexSet<String>,
    events: Vec<ConfigEvent>,
}

impl RecordingBackend {
    pub fn new(
        boundaries: impl IntoIterator<Item = impl Into<String>>,
        regions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            boundaries: boundaries.into_iter().map(Into::into).collect(),
            regions: regions.into_iter().map(Into::into).collect(),
            continua: IndexMap::new(),
            species: Vec::new(),
            expressions: IndexSet::new(),
            events: Vec::new(),
        }
    }

    /// The Couette-cell region topology both studies run against.
    pub fn couette_cell() -> Self {
        Self::new(
            ["InletA", "InletB", "OutletA", "OutletB", "Rotor", "Stator"],
            ["Fluid"],
        )
    }

    pub fn events(&self) -> &[ConfigEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ConfigEvent> {
        self.events
    }

    /// Render the artifact as one JSON object per line, header first.
    pub fn to_json_lines(&self, header: &ArtifactHeader) -> serde_json::Result<String> {
        let mut out = serde_json::to_string(header)?;
        out.push('\n');
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn continuum_name(&self, handle: ContinuumHandle) -> Result<String> {
        self.continua
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| ConfigError::ExternalCollaborator {
                call: "continuum lookup".to_string(),
                message: format!("unknown continuum handle {}", handle.0),
            })
    }

    fn check_boundary(&self, call: &str, boundary: &str) -> Result<()> {
        if self.boundaries.contains(boundary) {
            Ok(())
        } else {
            Err(ConfigError::ExternalCollaborator {
                call: call.to_string(),
                message: format!("unknown boundary '{boundary}'"),
            })
        }
    }

    fn check_region(&self, call: &str, region: &str) -> Result<()> {
        if self.regions.contains(region) {
            Ok(())
        } else {
            Err(ConfigError::ExternalCollaborator {
                call: call.to_string(),
                message: format!("unknown region '{region}'"),
            })
        }
    }

    fn check_species_index(&self, call: &str, index: usize) -> Result<()> {
        if index < self.species.len() {
            Ok(())
        } else {
            Err(ConfigError::ExternalCollaborator {
                call: call.to_string(),
                message: format!(
                    "scalar index {index} out of range ({} declared)",
                    self.species.len()
                ),
            })
        }
    }

    fn check_species_name(&self, call: &str, species: &str) -> Result<()> {
        if self.species.iter().any(|s| s == species) {
            Ok(())
        } else {
            Err(ConfigError::ExternalCollaborator {
                call: call.to_string(),
                message: format!("unknown scalar '{species}'"),
            })
        }
    }
}

impl SolverBackend for RecordingBackend {
    fn get_or_create_continuum(&mut self, name: &str) -> Result<ContinuumHandle> {
        if let Some(handle) = self.continua.get(name) {
            return Ok(*handle);
        }
        let handle = ContinuumHandle(self.continua.len() as u32);
        self.continua.insert(name.to_string(), handle);
        self.events.push(ConfigEvent::ContinuumCreated {
            name: name.to_string(),
        });
        Ok(handle)
    }

    fn enable_model(&mut self, continuum: ContinuumHandle, model: ModelKind) -> Result<()> {
        let continuum = self.continuum_name(continuum)?;
        self.events.push(ConfigEvent::ModelEnabled { continuum, model });
        Ok(())
    }

    fn disable_model(&mut self, continuum: ContinuumHandle, model: ModelKind) -> Result<()> {
        let continuum = self.continuum_name(continuum)?;
        self.events
            .push(ConfigEvent::ModelDisabled { continuum, model });
        Ok(())
    }

    fn set_time_step(&mut self, continuum: ContinuumHandle, seconds: f64) -> Result<()> {
        self.continuum_name(continuum)?;
        self.events.push(ConfigEvent::TimeStepSet { seconds });
        Ok(())
    }

    fn set_adaptive_time_step(
        &mut self,
        continuum: ContinuumHandle,
        target_mean_cfl: f64,
        target_max_cfl: f64,
    ) -> Result<()> {
        self.continuum_name(continuum)?;
        self.events.push(ConfigEvent::AdaptiveTimeStepSet {
            target_mean_cfl,
            target_max_cfl,
        });
        Ok(())
    }

    fn set_second_order_time(&mut self, continuum: ContinuumHandle) -> Result<()> {
        self.continuum_name(continuum)?;
        self.events.push(ConfigEvent::SecondOrderTimeEnabled);
        Ok(())
    }

    fn set_inner_iterations(&mut self, count: u32) -> Result<()> {
        self.events.push(ConfigEvent::InnerIterationsSet { count });
        Ok(())
    }

    fn set_isothermal_temperature(
        &mut self,
        continuum: ContinuumHandle,
        celsius: f64,
    ) -> Result<()> {
        self.continuum_name(continuum)?;
        self.events
            .push(ConfigEvent::IsothermalTemperatureSet { celsius });
        Ok(())
    }

    fn declare_scalar_species(&mut self, decl: &ScalarSpeciesDecl) -> Result<()> {
        if self.species.iter().any(|s| *s == decl.name) {
            return Err(ConfigError::ExternalCollaborator {
                call: "declare_scalar_species".to_string(),
                message: format!("scalar '{}' already declared", decl.name),
            });
        }
        self.species.push(decl.name.clone());
        self.events.push(ConfigEvent::ScalarSpeciesDeclared {
            name: decl.name.clone(),
            transport: decl.transport.as_str().to_string(),
            clip_both: decl.clip_both,
            max_allowable: decl.max_allowable,
            use_ggdh: decl.use_ggdh,
        });
        Ok(())
    }

    fn set_schmidt_number(&mut self, species: &str, value: f64) -> Result<()> {
        self.check_species_name("set_schmidt_number", species)?;
        self.events.push(ConfigEvent::SchmidtNumberSet {
            species: species.to_string(),
            value,
        });
        Ok(())
    }

    fn set_turbulent_schmidt_number(&mut self, species: &str, value: f64) -> Result<()> {
        self.check_species_name("set_turbulent_schmidt_number", species)?;
        self.events.push(ConfigEvent::TurbulentSchmidtNumberSet {
            species: species.to_string(),
            value,
        });
        Ok(())
    }

    fn set_initial_concentration(&mut self, species_index: usize, value: f64) -> Result<()> {
        self.check_species_index("set_initial_concentration", species_index)?;
        self.events.push(ConfigEvent::InitialConcentrationSet {
            species_index,
            value,
        });
        Ok(())
    }

    fn set_boundary_scalar_profile(
        &mut self,
        boundary: &str,
        species_index: usize,
        value: ProfileValue,
    ) -> Result<()> {
        self.check_boundary("set_boundary_scalar_profile", boundary)?;
        self.check_species_index("set_boundary_scalar_profile", species_index)?;
        self.events.push(ConfigEvent::BoundaryScalarProfileSet {
            boundary: boundary.to_string(),
            species_index,
            value,
        });
        Ok(())
    }

    fn set_mass_flow_rate(&mut self, boundary: &str, kg_per_s: f64) -> Result<()> {
        self.check_boundary("set_mass_flow_rate", boundary)?;
        self.events.push(ConfigEvent::MassFlowRateSet {
            boundary: boundary.to_string(),
            kg_per_s,
        });
        Ok(())
    }

    fn set_wall_flux(
        &mut self,
        boundary: &str,
        species_index: usize,
        flux_expr: &str,
        flux_derivative_expr: &str,
    ) -> Result<()> {
        self.check_boundary("set_wall_flux", boundary)?;
        self.check_species_index("set_wall_flux", species_index)?;
        self.events.push(ConfigEvent::WallFluxSet {
            boundary: boundary.to_string(),
            species_index,
            flux: flux_expr.to_string(),
            flux_derivative: flux_derivative_expr.to_string(),
        });
        Ok(())
    }

    fn set_volumetric_source(
        &mut self,
        region: &str,
        species_index: usize,
        source_expr: &str,
        source_derivative_expr: &str,
    ) -> Result<()> {
        self.check_region("set_volumetric_source", region)?;
        self.check_species_index("set_volumetric_source", species_index)?;
        self.events.push(ConfigEvent::VolumetricSourceSet {
            region: region.to_string(),
            species_index,
            source: source_expr.to_string(),
            source_derivative: source_derivative_expr.to_string(),
        });
        Ok(())
    }

    fn create_derived_expression(
        &mut self,
        id: &str,
        display_name: &str,
        definition: &str,
        dim: Dim,
    ) -> Result<()> {
        if !self.expressions.insert(id.to_string()) {
            return Err(ConfigError::ExternalCollaborator {
                call: "create_derived_expression".to_string(),
                message: format!("expression '{id}' already exists"),
            });
        }
        self.events.push(ConfigEvent::DerivedExpressionCreated {
            id: id.to_string(),
            name: display_name.to_string(),
            definition: definition.to_string(),
            dimension: dim.to_string(),
        });
        Ok(())
    }

    fn create_monitor(
        &mut self,
        name: &str,
        target: &str,
        aggregation: Aggregation,
        part: &str,
    ) -> Result<()> {
        if !self.boundaries.contains(part) && !self.regions.contains(part) {
            return Err(ConfigError::ExternalCollaborator {
                call: "create_monitor".to_string(),
                message: format!("unknown part '{part}'"),
            });
        }
        self.events.push(ConfigEvent::MonitorCreated {
            name: name.to_string(),
            target: target.to_string(),
            aggregation,
            part: part.to_string(),
        });
        Ok(())
    }

    fn freeze_solver(&mut self, solver: SolverKind, frozen: bool) -> Result<()> {
        self.events.push(ConfigEvent::SolverFrozen { solver, frozen });
        Ok(())
    }

    fn configure_autosave(&mut self, policy: &AutosavePolicy) -> Result<()> {
        let (trigger, every) = policy.trigger.describe();
        self.events.push(ConfigEvent::AutosaveConfigured {
            separator: policy.separator.to_string(),
            format_width: policy.format_width,
            max_files: policy.max_files,
            trigger: trigger.to_string(),
            every,
        });
        Ok(())
    }

    fn initialize_solution(&mut self) -> Result<()> {
        self.events.push(ConfigEvent::SolutionInitialized);
        Ok(())
    }

    fn advance_physical_time(&mut self, duration_seconds: f64) -> Result<()> {
        self.events.push(ConfigEvent::PhysicalTimeAdvanced {
            seconds: duration_seconds,
        });
        Ok(())
    }

    fn persist_state(&mut self, path: &str) -> Result<()> {
        self.events.push(ConfigEvent::StatePersisted {
            path: path.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuum_handles_are_reused_by_name() {
        let mut backend = RecordingBackend::couette_cell();
        let a = backend.get_or_create_continuum("Physics 1").unwrap();
        let b = backend.get_or_create_continuum("Physics 1").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            backend
                .events()
                .iter()
                .filter(|e| matches!(e, ConfigEvent::ContinuumCreated { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn unknown_boundary_is_surfaced_not_swallowed() {
        let mut backend = RecordingBackend::couette_cell();
        backend
            .declare_scalar_species(&ScalarSpeciesDecl {
                name: "mNa_1+".to_string(),
                transport: TransportMode::FullTransport,
                clip_both: true,
                max_allowable: 1.0,
                use_ggdh: false,
            })
            .unwrap();

        let err = backend
            .set_boundary_scalar_profile("InletZ", 0, ProfileValue::Constant(0.1))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ExternalCollaborator { .. }));
    }

    #[test]
    fn species_index_out_of_range_is_an_error() {
        let mut backend = RecordingBackend::couette_cell();
        let err = backend.set_initial_concentration(0, 0.1).unwrap_err();
        assert!(matches!(err, ConfigError::ExternalCollaborator { .. }));
    }

    #[test]
    fn json_lines_round_trip() {
        let mut backend = RecordingBackend::couette_cell();
        let c = backend.get_or_create_continuum("Physics 1").unwrap();
        backend.enable_model(c, ModelKind::ImplicitUnsteady).unwrap();
        backend.set_time_step(c, 0.02).unwrap();

        let header = ArtifactHeader::new("mixing", "ab12f");
        let text = backend.to_json_lines(&header).unwrap();
        let mut lines = text.lines();

        let parsed_header: ArtifactHeader =
            serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(parsed_header, header);

        let parsed: Vec<ConfigEvent> = lines
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, backend.events());
    }
}

//! Configuration emitter.
//!
//! Walks a derived [`ExperimentContext`] and issues the corresponding
//! backend calls in the order the solver needs them: continuum and physics
//! models, the steady-to-unsteady swap, species, transport properties,
//! derived expressions in topological order (a definition is always created
//! before anything references it), boundary wiring, monitors, persistence,
//! the freeze phase, and finally the timed integration. Pure translation:
//! every number was computed during derivation.

use crate::solver::backend::{
    Aggregation, ModelKind, ProfileValue, ScalarSpeciesDecl, SolverBackend, SolverKind,
};
use crate::solver::chemistry::{BARIUM, SULFATE};
use crate::solver::context::ExperimentContext;
use crate::solver::error::Result;
use crate::solver::kinetics;
use crate::solver::session::AutosavePolicy;

pub const CONTINUUM_NAME: &str = "Physics 1";
pub const REGION_FLUID: &str = "Fluid";
pub const BOUNDARY_INLET_A: &str = "InletA";
pub const BOUNDARY_INLET_B: &str = "InletB";
pub const BOUNDARY_OUTLET_A: &str = "OutletA";
pub const BOUNDARY_STATOR: &str = "Stator";

/// Report name for the mass-flow-averaged effluent concentration monitor.
pub fn outlet_report_name(scalar: &str) -> String {
    format!("Mass Flow Averaged Outlet Concentration of {scalar}")
}

/// Identifier under which the solver exposes that report's value to
/// expressions (presentation name with spaces stripped, `Report` appended).
pub fn outlet_report_reference(scalar: &str) -> String {
    format!("{}Report", outlet_report_name(scalar).replace(' ', ""))
}

/// Emit the whole study configuration, driving the run plan to completion.
pub fn emit_study(ctx: &mut ExperimentContext, backend: &mut dyn SolverBackend) -> Result<()> {
    let continuum = backend.get_or_create_continuum(CONTINUUM_NAME)?;
    backend.enable_model(continuum, ModelKind::ThreeDimensional)?;
    for model in ctx.params().turbulence.models_to_enable() {
        backend.enable_model(continuum, *model)?;
    }

    // Steady -> time-accurate conversion (idempotent at the plan level).
    let settings = ctx.unsteady_settings();
    if ctx.plan_mut().to_unsteady(settings)? {
        backend.disable_model(continuum, ModelKind::Steady)?;
        backend.enable_model(continuum, ModelKind::ImplicitUnsteady)?;
    }
    backend.set_time_step(continuum, settings.time_step)?;
    backend.enable_model(continuum, ModelKind::AdaptiveTimeStep)?;
    backend.set_adaptive_time_step(
        continuum,
        settings.target_mean_courant,
        settings.target_max_courant,
    )?;
    if settings.second_order {
        backend.set_second_order_time(continuum)?;
    }
    backend.set_inner_iterations(settings.inner_iterations)?;

    // Scalar species, in the canonical index order everything else uses.
    backend.enable_model(continuum, ModelKind::PassiveScalar)?;
    let ggdh = ctx.params().turbulence.uses_ggdh();
    for species in ctx.species() {
        backend.declare_scalar_species(&ScalarSpeciesDecl {
            name: species.name().to_string(),
            transport: species.transport(),
            clip_both: true,
            max_allowable: 1.0,
            use_ggdh: ggdh && !species.is_convection_only(),
        })?;
    }

    if ctx.is_reactive() {
        backend.enable_model(continuum, ModelKind::SegregatedFluidIsothermal)?;
        backend.set_isothermal_temperature(continuum, ctx.params().temperature_c)?;
    }

    for assignment in ctx.schmidt() {
        backend.set_schmidt_number(assignment.species, assignment.value)?;
    }
    for assignment in ctx.schmidt() {
        backend.set_turbulent_schmidt_number(assignment.species, ctx.params().turbulent_schmidt)?;
    }

    if let Some(initial) = ctx.initial_concentrations() {
        for (index, (species, value)) in ctx.species().iter().zip(initial).enumerate() {
            if species.is_convection_only() {
                continue;
            }
            backend.set_initial_concentration(index, *value)?;
        }
        backend.initialize_solution()?;
    }

    // Derived expressions, dependencies first.
    let order: Vec<String> = ctx
        .graph()
        .validate()?
        .into_iter()
        .map(str::to_string)
        .collect();
    for id in &order {
        let node = ctx.graph().node(id).expect("ordered node exists");
        if let Some(definition) = node.definition() {
            backend.create_derived_expression(
                node.id(),
                node.display_name(),
                &definition,
                node.dim(),
            )?;
        }
    }

    // Boundary wiring.
    backend.set_mass_flow_rate(BOUNDARY_INLET_A, ctx.mass_flow_per_inlet())?;
    backend.set_mass_flow_rate(BOUNDARY_INLET_B, ctx.mass_flow_per_inlet())?;
    for (index, value) in ctx.inlet_a().iter().enumerate() {
        backend.set_boundary_scalar_profile(
            BOUNDARY_INLET_A,
            index,
            ProfileValue::Constant(*value),
        )?;
    }
    for (index, value) in ctx.inlet_b().iter().enumerate() {
        backend.set_boundary_scalar_profile(
            BOUNDARY_INLET_B,
            index,
            ProfileValue::Constant(*value),
        )?;
    }

    if ctx.is_reactive() {
        // Reaction sources: wall kinetics on the stator, bulk kinetics in
        // the fluid volume. The convection-only solid proxy is deliberately
        // left out of both.
        let so4 = ctx.species_index(SULFATE)?;
        let ba = ctx.species_index(BARIUM)?;
        backend.set_wall_flux(
            BOUNDARY_STATOR,
            so4,
            kinetics::R_SO4_WALL,
            kinetics::DRDM_SO4_WALL,
        )?;
        backend.set_wall_flux(
            BOUNDARY_STATOR,
            ba,
            kinetics::R_BA_WALL,
            kinetics::DRDM_BA_WALL,
        )?;
        backend.set_volumetric_source(
            REGION_FLUID,
            so4,
            kinetics::R_SO4_BULK,
            kinetics::DRDM_SO4_BULK,
        )?;
        backend.set_volumetric_source(
            REGION_FLUID,
            ba,
            kinetics::R_BA_BULK,
            kinetics::DRDM_BA_BULK,
        )?;

        backend.create_monitor(
            "Average Reaction Parameter",
            "ReactionParameter",
            Aggregation::VolumeAverage,
            REGION_FLUID,
        )?;
        backend.create_monitor(
            "Average mSO4_2-",
            SULFATE,
            Aggregation::VolumeAverage,
            REGION_FLUID,
        )?;
        backend.create_monitor(
            "Average mBa_2+",
            BARIUM,
            Aggregation::VolumeAverage,
            REGION_FLUID,
        )?;
    }

    // Effluent tracking and the backflow profile that feeds the averaged
    // outlet concentration back to re-entering fluid.
    let mut effluent: Vec<String> = ctx
        .species()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    if ctx.is_reactive() {
        effluent.push(kinetics::SATURATION_RATE.to_string());
    }
    for scalar in &effluent {
        backend.create_monitor(
            &outlet_report_name(scalar),
            scalar,
            Aggregation::MassFlowAverage,
            BOUNDARY_OUTLET_A,
        )?;
    }
    for (index, species) in ctx.species().iter().enumerate() {
        backend.set_boundary_scalar_profile(
            BOUNDARY_OUTLET_A,
            index,
            ProfileValue::Expression(outlet_report_reference(species.name())),
        )?;
    }

    backend.configure_autosave(&AutosavePolicy::unsteady())?;
    let sim_name = ctx.sim_name();
    backend.persist_state(&ctx.session().results_path(&sim_name))?;

    // Freeze flow and turbulence; scalar transport keeps evolving.
    let freeze = ctx.freeze_settings();
    ctx.plan_mut().freeze(freeze)?;
    backend.freeze_solver(SolverKind::SegregatedFlow, true)?;
    if let Some(turbulence) = freeze.turbulence {
        backend.freeze_solver(turbulence, true)?;
    }

    // Timed integration, relative to current physical time.
    let duration = ctx.params().duration;
    ctx.plan_mut().integrate(duration)?;
    backend.advance_physical_time(duration)?;
    ctx.plan_mut().complete()?;

    Ok(())
}

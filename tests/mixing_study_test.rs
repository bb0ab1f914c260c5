//! End-to-end configuration of the non-reactive mixing study.

use mixplan::solver::backend::{
    ArtifactHeader, ConfigEvent, ModelKind, ProfileValue, RecordingBackend, SolverKind,
};
use mixplan::solver::context::{ExperimentContext, ExperimentParams};
use mixplan::solver::emit;
use mixplan::solver::session::Session;

fn emitted_mixing_run() -> (ExperimentContext, RecordingBackend) {
    let mut ctx = ExperimentContext::derive_with_session(
        ExperimentParams::mixing_study(500.0, 120.0, 0.1),
        Session::with_uid("ab12f"),
    )
    .unwrap();
    let mut backend = RecordingBackend::couette_cell();
    emit::emit_study(&mut ctx, &mut backend).unwrap();
    (ctx, backend)
}

#[test]
fn time_step_and_adaptive_bounds_match_the_scaling_law() {
    let (_, backend) = emitted_mixing_run();
    let events = backend.events();

    // 20 * 1e-3 * (500/500) * (5/20) * (80/80) = 5 ms.
    assert!(events.iter().any(|e| matches!(
        e,
        ConfigEvent::TimeStepSet { seconds } if (seconds - 5.0e-3).abs() < 1e-15
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ConfigEvent::AdaptiveTimeStepSet {
            target_mean_cfl,
            target_max_cfl,
        } if *target_mean_cfl == 20.0 && *target_max_cfl == 100.0
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, ConfigEvent::SecondOrderTimeEnabled)));
}

#[test]
fn steady_model_is_swapped_for_implicit_unsteady() {
    let (_, backend) = emitted_mixing_run();
    let events = backend.events();

    let disabled = events.iter().position(|e| {
        matches!(
            e,
            ConfigEvent::ModelDisabled {
                model: ModelKind::Steady,
                ..
            }
        )
    });
    let enabled = events.iter().position(|e| {
        matches!(
            e,
            ConfigEvent::ModelEnabled {
                model: ModelKind::ImplicitUnsteady,
                ..
            }
        )
    });
    assert!(disabled.unwrap() < enabled.unwrap());
}

#[test]
fn both_tracers_are_declared_with_ggdh_under_rst() {
    let (_, backend) = emitted_mixing_run();
    let declared: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::ScalarSpeciesDeclared { name, use_ggdh, .. } => {
                Some((name.clone(), *use_ggdh))
            }
            _ => None,
        })
        .collect();

    assert_eq!(
        declared,
        [
            ("mSO4_2-".to_string(), true),
            ("mNa_1+".to_string(), true)
        ]
    );
}

#[test]
fn schmidt_numbers_follow_viscosity_over_diffusivity_density() {
    let (_, backend) = emitted_mixing_run();
    let schmidt: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::SchmidtNumberSet { species, value } => {
                Some((species.clone(), *value))
            }
            _ => None,
        })
        .collect();

    assert_eq!(schmidt.len(), 2);
    // Mixing study halves the sulfate diffusivity: 0.5 * 1.06e-9.
    let (so4_name, so4) = &schmidt[0];
    assert_eq!(so4_name, "mSO4_2-");
    assert!((so4 - 8.8871e-4 / (0.53e-9 * 997.561)).abs() / so4 < 1e-12);

    let (na_name, na) = &schmidt[1];
    assert_eq!(na_name, "mNa_1+");
    assert!((na - 8.8871e-4 / (1.334e-9 * 997.561)).abs() / na < 1e-12);
}

#[test]
fn inlet_vectors_are_positional_and_stoichiometric() {
    let (_, backend) = emitted_mixing_run();
    let inlet_a: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::BoundaryScalarProfileSet {
                boundary,
                species_index,
                value: ProfileValue::Constant(v),
            } if boundary == "InletA" => Some((*species_index, *v)),
            _ => None,
        })
        .collect();

    // 0.1 mol/kg Na2SO4: index 0 = sulfate (1x), index 1 = sodium (2x).
    assert_eq!(inlet_a, [(0, 0.1), (1, 0.2)]);

    let inlet_b: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::BoundaryScalarProfileSet {
                boundary,
                species_index,
                value: ProfileValue::Constant(v),
            } if boundary == "InletB" => Some((*species_index, *v)),
            _ => None,
        })
        .collect();
    assert_eq!(inlet_b, [(0, 0.0), (1, 0.0)]);
}

#[test]
fn outlet_backflow_reads_the_averaged_outlet_reports() {
    let (_, backend) = emitted_mixing_run();
    let backflow: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::BoundaryScalarProfileSet {
                boundary,
                species_index,
                value: ProfileValue::Expression(reference),
            } if boundary == "OutletA" => Some((*species_index, reference.clone())),
            _ => None,
        })
        .collect();

    assert_eq!(backflow.len(), 2);
    assert_eq!(
        backflow[0],
        (
            0,
            "MassFlowAveragedOutletConcentrationofmSO4_2-Report".to_string()
        )
    );
    assert_eq!(
        backflow[1],
        (
            1,
            "MassFlowAveragedOutletConcentrationofmNa_1+Report".to_string()
        )
    );

    // The monitors those references resolve to exist and precede them.
    let monitor_at = backend
        .events()
        .iter()
        .position(|e| {
            matches!(
                e,
                ConfigEvent::MonitorCreated { name, .. }
                    if name == "Mass Flow Averaged Outlet Concentration of mSO4_2-"
            )
        })
        .unwrap();
    let backflow_at = backend
        .events()
        .iter()
        .position(|e| {
            matches!(
                e,
                ConfigEvent::BoundaryScalarProfileSet {
                    boundary,
                    value: ProfileValue::Expression(_),
                    ..
                } if boundary == "OutletA"
            )
        })
        .unwrap();
    assert!(monitor_at < backflow_at);
}

#[test]
fn no_reactive_machinery_leaks_into_the_mixing_study() {
    let (_, backend) = emitted_mixing_run();
    for event in backend.events() {
        assert!(
            !matches!(
                event,
                ConfigEvent::WallFluxSet { .. }
                    | ConfigEvent::VolumetricSourceSet { .. }
                    | ConfigEvent::DerivedExpressionCreated { .. }
                    | ConfigEvent::IsothermalTemperatureSet { .. }
                    | ConfigEvent::InitialConcentrationSet { .. }
            ),
            "unexpected reactive event: {event:?}"
        );
    }
}

#[test]
fn run_ends_frozen_then_advances_by_the_requested_duration() {
    let (_, backend) = emitted_mixing_run();
    let events = backend.events();

    let frozen: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConfigEvent::SolverFrozen { solver, frozen } => Some((*solver, *frozen)),
            _ => None,
        })
        .collect();
    assert_eq!(
        frozen,
        [
            (SolverKind::SegregatedFlow, true),
            (SolverKind::EbRsTurbulence, true)
        ]
    );

    assert!(matches!(
        events.last().unwrap(),
        ConfigEvent::PhysicalTimeAdvanced { seconds } if *seconds == 100.0
    ));
}

#[test]
fn persisted_state_lands_under_results_with_the_session_uid() {
    let (_, backend) = emitted_mixing_run();
    assert!(backend.events().iter().any(|e| matches!(
        e,
        ConfigEvent::StatePersisted { path }
            if path == "Results/Sim_RANS-RST_MIXING_RST_ab12f.sim"
    )));
}

#[test]
fn artifact_serializes_and_round_trips() {
    let (_, backend) = emitted_mixing_run();
    let header = ArtifactHeader::new("mixing", "ab12f");
    let text = backend.to_json_lines(&header).unwrap();

    let mut lines = text.lines();
    let parsed: ArtifactHeader = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(parsed.study, "mixing");

    let events: Vec<ConfigEvent> = lines
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), backend.events().len());
}

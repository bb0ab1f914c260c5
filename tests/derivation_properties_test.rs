//! Cross-cutting derivation properties.

use mixplan::solver::chemistry::{self, Dissociation};
use mixplan::solver::error::ConfigError;
use mixplan::solver::graph::{ExprGraph, NodeKind};
use mixplan::solver::plan::{FreezeSettings, RunPlan};
use mixplan::solver::scaling;
use mixplan::solver::units::si;

#[test]
fn time_step_monotonicity_over_a_parameter_sweep() {
    let dt = |rpm: f64, mesh: f64, diameter: f64| {
        scaling::time_step(20.0, 500.0, rpm, mesh, 20.0, 80.0e-3, diameter).unwrap()
    };

    let mut previous = f64::INFINITY;
    for rpm in [100.0, 250.0, 500.0, 1000.0, 2000.0] {
        let step = dt(rpm, 20.0, 80.0e-3);
        assert!(step < previous, "not decreasing in rpm at {rpm}");
        previous = step;
    }

    let mut previous = 0.0;
    for mesh in [1.0, 5.0, 10.0, 20.0, 40.0] {
        let step = dt(500.0, mesh, 80.0e-3);
        assert!(step > previous, "not increasing in mesh scale at {mesh}");
        previous = step;
    }

    let mut previous = f64::INFINITY;
    for diameter in [50.0e-3, 80.0e-3, 120.0e-3] {
        let step = dt(500.0, 20.0, diameter);
        assert!(step < previous, "not decreasing in diameter at {diameter}");
        previous = step;
    }
}

#[test]
fn reference_point_time_step_is_exact() {
    // targetCourant=20 at rpm 500 (ref 500), mesh 20 (ref 20), 80 mm
    // (ref 80 mm): exactly 20 * 1e-3.
    let dt = scaling::time_step(20.0, 500.0, 500.0, 20.0, 20.0, 80.0e-3, 80.0e-3).unwrap();
    assert_eq!(dt, 0.02);
}

#[test]
fn schmidt_scenario_closes() {
    let sc = scaling::schmidt_number(8.8871e-4, 1.06e-9, 1000.0).unwrap();
    assert!((sc - 838.4).abs() < 0.05, "got {sc}");
}

#[test]
fn one_to_two_salt_scenario_resolves_exactly() {
    // 0.1 mol/kg of a 1:2 salt, reference = anion.
    let species = chemistry::mixing_species();
    let salt = Dissociation::sodium_sulfate(&species).unwrap();
    let resolved = salt.resolve(0.1, chemistry::SULFATE).unwrap();
    assert_eq!(resolved[chemistry::SODIUM], 0.2);
    assert_eq!(resolved[chemistry::SULFATE], 0.1);
}

#[test]
fn stoichiometry_round_trip_over_many_concentrations() {
    let species = chemistry::reactive_species();
    let salts = [
        Dissociation::sodium_sulfate(&species).unwrap(),
        Dissociation::barium_chloride(&species).unwrap(),
    ];
    for salt in &salts {
        for parent in [0.0, 1e-6, 0.013, 0.1, 2.7] {
            let reference = if salt.parent() == "Na2SO4" {
                chemistry::SULFATE
            } else {
                chemistry::BARIUM
            };
            let resolved = salt.resolve(parent, reference).unwrap();
            for (name, value) in &resolved {
                let recovered = value / salt.coefficient(name).unwrap();
                assert!(
                    (recovered - parent).abs() <= 1e-12 * parent.max(1.0),
                    "{name} at {parent}"
                );
            }
        }
    }
}

#[test]
fn single_back_edge_turns_a_valid_graph_cyclic() {
    let mut graph = ExprGraph::new();
    graph
        .add_leaf("m", si::MOLALITY, NodeKind::SpeciesConcentration)
        .unwrap();
    graph
        .add_expr("a", "a", "${m} * 2", si::MOLALITY, NodeKind::ScalingDerived)
        .unwrap();
    graph
        .add_expr("b", "b", "${a} + ${m}", si::MOLALITY, NodeKind::ScalingDerived)
        .unwrap();
    assert!(graph.topological_order().is_ok());

    // The back-edge: a third node closing b -> c -> ... while a reads it is
    // not expressible post-hoc, so build the cyclic variant directly.
    let mut cyclic = ExprGraph::new();
    cyclic
        .add_expr("a", "a", "${b} * 2", si::DIMENSIONLESS, NodeKind::ScalingDerived)
        .unwrap();
    cyclic
        .add_expr("b", "b", "${a} + 1", si::DIMENSIONLESS, NodeKind::ScalingDerived)
        .unwrap();

    let err = cyclic.topological_order().unwrap_err();
    let ConfigError::CyclicDependency { cycle } = err else {
        panic!("expected CyclicDependency, got {err:?}");
    };
    assert_eq!(cycle.len(), 2);
    assert!(cycle.contains(&"a".to_string()));
    assert!(cycle.contains(&"b".to_string()));
}

#[test]
fn reactivity_plus_dimensionless_is_rejected() {
    let mut graph = ExprGraph::new();
    graph
        .add_leaf("rate", si::REACTIVITY, NodeKind::SolverProvided)
        .unwrap();
    graph
        .add_expr(
            "shifted",
            "shifted",
            "${rate} + pow(10,0)",
            si::REACTIVITY,
            NodeKind::ScalingDerived,
        )
        .unwrap();

    let err = graph.validate().unwrap_err();
    assert!(matches!(err, ConfigError::DimensionMismatch { .. }));
}

#[test]
fn run_plan_cannot_skip_the_unsteady_transition() {
    let mut plan = RunPlan::new();
    let err = plan.freeze(FreezeSettings { turbulence: None }).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidStateTransition {
            from: "steady-init",
            to: "flow-frozen",
        }
    ));
}

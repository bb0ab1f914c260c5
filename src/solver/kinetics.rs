//! Barite precipitation kinetics as a graph extension.
//!
//! The rate law is an empirical fit: the bulk rate constant is a quadratic
//! polynomial in the saturation rate, and the nucleation source only acts
//! where the solution is supersaturated (`max(0, SR-1)`). Reaction is split
//! into a **bulk** family, active where the wall distance exceeds the
//! boundary-layer threshold, and a **wall** family active inside it; the
//! `isBulk` indicator encodes that physical cutoff and the two families must
//! stay separate. Rates and their concentration derivatives carry the
//! reactivity dimension (m^-3 s^-1); the fit constants absorb the remaining
//! unit multiplicity, so the family is inserted under the declared-dimension
//! policy and pinned by tests rather than re-derived.

use crate::solver::chemistry::{BARIUM, SULFATE};
use crate::solver::error::{ConfigError, Result};
use crate::solver::graph::{ExprGraph, NodeKind};
use crate::solver::units::{si, Dim};

/// Saturation rate node id, `pow(10, saturation index)`.
pub const SATURATION_RATE: &str = "SR";
/// Activity-coefficient primitive computed by the solver-side Pitzer model.
pub const ACTIVITY_COEFFICIENT: &str = "UserPitzerActivityCoefficient";
/// Wall-distance primitive.
pub const WALL_DISTANCE: &str = "WallDistance";

pub const IS_BULK: &str = "isBulk";
pub const K_BULK: &str = "K_bulk";
pub const R_BULK: &str = "R_Bulk";
pub const R_BA_BULK: &str = "R_Ba_Bulk";
pub const R_SO4_BULK: &str = "R_SO4_Bulk";
pub const DRDM_BA_BULK: &str = "dRdmBa_Bulk";
pub const DRDM_SO4_BULK: &str = "dRdmSO4_Bulk";
pub const DRDM_BASO4_BULK: &str = "dRdmBaSO4_Bulk";
pub const R_WALL: &str = "R_Wall";
pub const R_BA_WALL: &str = "R_Ba_Wall";
pub const R_SO4_WALL: &str = "R_SO4_Wall";
pub const DRDM_BA_WALL: &str = "dRdmBa_Wall";
pub const DRDM_SO4_WALL: &str = "dRdmSO4_Wall";

/// Empirical kinetic fit, pinned as-is. The derivation of `r_fit_pa` /
/// `r_fit_pb` lives outside this codebase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KineticParams {
    pub r_fit_pa: f64,
    pub r_fit_pb: f64,
    /// Wall-rate constant.
    pub k1: f64,
    /// log10 of the barite solubility product.
    pub log10_ksp: f64,
    /// Bulk/wall cutoff on wall distance, meters.
    pub wall_threshold: f64,
}

impl Default for KineticParams {
    fn default() -> Self {
        Self {
            r_fit_pa: 1.03e-4,
            r_fit_pb: 0.00822,
            k1: 1.0,
            log10_ksp: -9.87,
            wall_threshold: 1e-4,
        }
    }
}

impl KineticParams {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("r_fit_pa", self.r_fit_pa),
            ("r_fit_pb", self.r_fit_pb),
            ("k1", self.k1),
            ("wall_threshold", self.wall_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    format!("must be finite and > 0: {value}"),
                ));
            }
        }
        if !self.log10_ksp.is_finite() {
            return Err(ConfigError::invalid(
                "log10_ksp",
                format!("not finite: {}", self.log10_ksp),
            ));
        }
        Ok(())
    }
}

fn require_upstream(graph: &ExprGraph, id: &str, dim: Dim) -> Result<()> {
    let node = graph.node(id).ok_or_else(|| ConfigError::UndefinedReference {
        node: R_BULK.to_string(),
        missing: id.to_string(),
    })?;
    if node.dim() != dim {
        return Err(ConfigError::DimensionMismatch {
            context: format!("kinetics upstream '{id}'"),
            expected: dim,
            found: node.dim(),
        });
    }
    Ok(())
}

/// Add the bulk/wall kinetics family to a graph already carrying the
/// saturation-rate and species-concentration nodes.
///
/// Idempotent: if the family is present the call is a no-op and returns
/// `false`. Returns `true` when the nodes were added.
pub fn enable_reaction_subgraph(graph: &mut ExprGraph, params: &KineticParams) -> Result<bool> {
    if graph.contains(R_BULK) {
        return Ok(false);
    }
    params.validate()?;

    require_upstream(graph, SATURATION_RATE, si::DIMENSIONLESS)?;
    require_upstream(graph, ACTIVITY_COEFFICIENT, si::DIMENSIONLESS)?;
    require_upstream(graph, WALL_DISTANCE, si::LENGTH)?;
    require_upstream(graph, BARIUM, si::MOLALITY)?;
    require_upstream(graph, SULFATE, si::MOLALITY)?;

    graph.add_constant("R_fit_pA", params.r_fit_pa, si::DIMENSIONLESS)?;
    graph.add_constant("R_fit_pB", params.r_fit_pb, si::DIMENSIONLESS)?;
    graph.add_constant("k1", params.k1, si::DIMENSIONLESS)?;

    graph.add_expr(
        IS_BULK,
        "isBulk",
        &format!("${{{WALL_DISTANCE}}} > {} ? 1 : 0", params.wall_threshold),
        si::DIMENSIONLESS,
        NodeKind::ReactionTerm,
    )?;

    graph.add_expr(
        K_BULK,
        "Bulk Reaction Rate Constant",
        &format!("${{R_fit_pA}}*pow(${{{SATURATION_RATE}}},2) + ${{R_fit_pB}} * ${{{SATURATION_RATE}}}"),
        si::DIMENSIONLESS,
        NodeKind::ReactionTerm,
    )?;

    graph.add_expr_declared(
        R_BULK,
        "Bulk Reaction Rate",
        &format!(
            "${{{K_BULK}}}*${{{BARIUM}}}*${{{SULFATE}}}*max(0,${{{SATURATION_RATE}}}-1)*${{{IS_BULK}}}"
        ),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        R_BA_BULK,
        "Bulk R_Ba",
        &format!("-${{{R_BULK}}}"),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        R_SO4_BULK,
        "Bulk R_SO4",
        &format!("-${{{R_BULK}}}"),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;

    graph.add_expr_declared(
        DRDM_BA_BULK,
        "Bulk dRdmBa",
        &derivative_definition(BARIUM, K_BULK, params.log10_ksp),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        DRDM_SO4_BULK,
        "Bulk dRdmSO4",
        &derivative_definition(SULFATE, K_BULK, params.log10_ksp),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        DRDM_BASO4_BULK,
        "Bulk dRdmBaSO4",
        &format!("${{{DRDM_SO4_BULK}}} + ${{{DRDM_BA_BULK}}}"),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;

    graph.add_expr_declared(
        R_WALL,
        "Wall Reaction Rate",
        &format!(
            "${{k1}}*${{{BARIUM}}}*${{{SULFATE}}}*max(0,${{{SATURATION_RATE}}}-1)*(1-${{{IS_BULK}}})"
        ),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        R_BA_WALL,
        "Wall R_Ba",
        &format!("-${{{R_WALL}}}"),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        R_SO4_WALL,
        "Wall R_SO4",
        &format!("-${{{R_WALL}}}"),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        DRDM_BA_WALL,
        "Wall dRdmBa",
        &derivative_definition(BARIUM, "k1", params.log10_ksp),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;
    graph.add_expr_declared(
        DRDM_SO4_WALL,
        "Wall dRdmSO4",
        &derivative_definition(SULFATE, "k1", params.log10_ksp),
        si::REACTIVITY,
        NodeKind::ReactionTerm,
    )?;

    Ok(true)
}

/// `-0.5 * m * K * gamma^2 / Ksp` with `Ksp = pow(10, log10_ksp)`.
fn derivative_definition(species: &str, rate_constant: &str, log10_ksp: f64) -> String {
    format!(
        "-0.5*${{{species}}}*${{{rate_constant}}}*pow(${{{ACTIVITY_COEFFICIENT}}},2)/pow(10,{log10_ksp})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::chemistry;
    use crate::solver::graph::NodeKind;

    fn reactive_graph() -> ExprGraph {
        let mut graph = ExprGraph::new();
        for species in chemistry::reactive_species() {
            graph
                .add_leaf(species.name(), si::MOLALITY, NodeKind::SpeciesConcentration)
                .unwrap();
        }
        graph
            .add_leaf(WALL_DISTANCE, si::LENGTH, NodeKind::SolverProvided)
            .unwrap();
        graph
            .add_leaf(
                "UserPitzerSaturationIndex",
                si::DIMENSIONLESS,
                NodeKind::SolverProvided,
            )
            .unwrap();
        graph
            .add_leaf(ACTIVITY_COEFFICIENT, si::DIMENSIONLESS, NodeKind::SolverProvided)
            .unwrap();
        graph
            .add_expr(
                SATURATION_RATE,
                "Saturation Rate",
                "pow(10,${UserPitzerSaturationIndex})",
                si::DIMENSIONLESS,
                NodeKind::ScalingDerived,
            )
            .unwrap();
        graph
    }

    #[test]
    fn subgraph_pins_the_original_definitions() {
        let mut graph = reactive_graph();
        assert!(enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap());

        let def = |id: &str| graph.node(id).unwrap().definition().unwrap();
        let pinned = |text: &str| crate::solver::expr::parse(text).unwrap();

        assert_eq!(
            pinned("${R_fit_pA}*pow(${SR},2) + ${R_fit_pB} * ${SR}"),
            *graph.node(K_BULK).unwrap().expr().unwrap(),
        );
        assert_eq!(
            pinned("${K_bulk}*${mBa_2+}*${mSO4_2-}*max(0,${SR}-1)*${isBulk}"),
            *graph.node(R_BULK).unwrap().expr().unwrap(),
        );
        assert_eq!(
            pinned("${WallDistance} > 0.0001 ? 1 : 0"),
            *graph.node(IS_BULK).unwrap().expr().unwrap(),
        );
        assert_eq!(
            pinned("-0.5*${mBa_2+}*${K_bulk}*pow(${UserPitzerActivityCoefficient},2)/pow(10,-9.87)"),
            *graph.node(DRDM_BA_BULK).unwrap().expr().unwrap(),
        );
        assert_eq!(
            pinned("${k1}*${mBa_2+}*${mSO4_2-}*max(0,${SR}-1)*(1-${isBulk})"),
            *graph.node(R_WALL).unwrap().expr().unwrap(),
        );
        assert_eq!(
            pinned("${dRdmSO4_Bulk} + ${dRdmBa_Bulk}"),
            *graph.node(DRDM_BASO4_BULK).unwrap().expr().unwrap(),
        );

        assert!(def(R_BA_BULK).contains("R_Bulk"));
        assert!(def(R_SO4_WALL).contains("R_Wall"));
    }

    #[test]
    fn rates_and_derivatives_share_the_reactivity_dimension() {
        let mut graph = reactive_graph();
        enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap();

        for id in [
            R_BULK,
            R_BA_BULK,
            R_SO4_BULK,
            DRDM_BA_BULK,
            DRDM_SO4_BULK,
            DRDM_BASO4_BULK,
            R_WALL,
            R_BA_WALL,
            R_SO4_WALL,
            DRDM_BA_WALL,
            DRDM_SO4_WALL,
        ] {
            assert_eq!(graph.node(id).unwrap().dim(), si::REACTIVITY, "{id}");
        }

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn enable_is_idempotent() {
        let mut graph = reactive_graph();
        assert!(enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap());
        let size = graph.len();
        assert!(!enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap());
        assert_eq!(graph.len(), size);
    }

    #[test]
    fn missing_saturation_rate_is_reported() {
        let mut graph = ExprGraph::new();
        for species in chemistry::reactive_species() {
            graph
                .add_leaf(species.name(), si::MOLALITY, NodeKind::SpeciesConcentration)
                .unwrap();
        }
        let err = enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UndefinedReference { ref missing, .. } if missing == SATURATION_RATE
        ));
    }

    #[test]
    fn upstream_dimension_is_checked() {
        let mut graph = reactive_graph();
        // Sabotage: wall distance with the wrong dimension.
        let mut bad = ExprGraph::new();
        for species in chemistry::reactive_species() {
            bad.add_leaf(species.name(), si::MOLALITY, NodeKind::SpeciesConcentration)
                .unwrap();
        }
        bad.add_leaf(WALL_DISTANCE, si::DIMENSIONLESS, NodeKind::SolverProvided)
            .unwrap();
        bad.add_leaf(
            "UserPitzerSaturationIndex",
            si::DIMENSIONLESS,
            NodeKind::SolverProvided,
        )
        .unwrap();
        bad.add_leaf(ACTIVITY_COEFFICIENT, si::DIMENSIONLESS, NodeKind::SolverProvided)
            .unwrap();
        bad.add_expr(
            SATURATION_RATE,
            "Saturation Rate",
            "pow(10,${UserPitzerSaturationIndex})",
            si::DIMENSIONLESS,
            NodeKind::ScalingDerived,
        )
        .unwrap();

        let err = enable_reaction_subgraph(&mut bad, &KineticParams::default()).unwrap_err();
        assert!(matches!(err, ConfigError::DimensionMismatch { .. }));

        // The healthy graph still accepts the subgraph afterwards.
        assert!(enable_reaction_subgraph(&mut graph, &KineticParams::default()).unwrap());
    }

    #[test]
    fn custom_threshold_lands_in_the_indicator() {
        let mut graph = reactive_graph();
        let params = KineticParams {
            wall_threshold: 2e-4,
            ..KineticParams::default()
        };
        enable_reaction_subgraph(&mut graph, &params).unwrap();
        assert!(graph
            .node(IS_BULK)
            .unwrap()
            .definition()
            .unwrap()
            .contains("0.0002"));
    }
}

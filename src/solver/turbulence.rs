//! Turbulence-model selection as a closed enumeration.
//!
//! Each variant knows the physics models it installs, the models that must
//! be torn down when leaving it, whether passive scalars ride the
//! generalized gradient diffusion hypothesis, and which solver the
//! flow-freeze phase stops.

use crate::solver::backend::{ModelKind, SolverKind};
use crate::solver::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurbulenceModel {
    RansKOmega,
    RansRst,
    RansKEpsilon,
    Les,
    Laminar,
}

impl TurbulenceModel {
    /// Parse the configuration selector string.
    pub fn from_selector(selector: &str) -> Result<Self> {
        match selector {
            "RANS-kOmega" => Ok(TurbulenceModel::RansKOmega),
            "RANS-RST" => Ok(TurbulenceModel::RansRst),
            "RANS-kEpsilon" => Ok(TurbulenceModel::RansKEpsilon),
            "LES" => Ok(TurbulenceModel::Les),
            "Laminar" => Ok(TurbulenceModel::Laminar),
            other => Err(ConfigError::invalid(
                "turbulence_model",
                format!("unknown selector '{other}'"),
            )),
        }
    }

    pub fn selector(self) -> &'static str {
        match self {
            TurbulenceModel::RansKOmega => "RANS-kOmega",
            TurbulenceModel::RansRst => "RANS-RST",
            TurbulenceModel::RansKEpsilon => "RANS-kEpsilon",
            TurbulenceModel::Les => "LES",
            TurbulenceModel::Laminar => "Laminar",
        }
    }

    /// Models installed while this variant is active; also what a swap into
    /// the variant enables.
    pub fn models_to_enable(self) -> &'static [ModelKind] {
        match self {
            TurbulenceModel::RansKOmega => &[
                ModelKind::Turbulent,
                ModelKind::RansTurbulence,
                ModelKind::KOmegaTurbulence,
                ModelKind::SstKOmega,
                ModelKind::KOmegaAllYPlusWall,
                ModelKind::GammaTransition,
            ],
            TurbulenceModel::RansRst => &[
                ModelKind::Turbulent,
                ModelKind::RansTurbulence,
                ModelKind::ReynoldsStressTurbulence,
                ModelKind::EbRsm,
                ModelKind::EbRsmAllYPlusWall,
            ],
            TurbulenceModel::RansKEpsilon => &[
                ModelKind::Turbulent,
                ModelKind::RansTurbulence,
                ModelKind::KEpsilonTurbulence,
                ModelKind::RkeTwoLayer,
                ModelKind::KeTwoLayerAllYPlusWall,
            ],
            TurbulenceModel::Les => &[
                ModelKind::Turbulent,
                ModelKind::LesTurbulence,
                ModelKind::WaleSgs,
                ModelKind::LesAllYPlusWall,
            ],
            TurbulenceModel::Laminar => &[ModelKind::Laminar],
        }
    }

    /// Models a swap out of this variant disables.
    pub fn models_to_disable(self) -> &'static [ModelKind] {
        match self {
            TurbulenceModel::RansKOmega => &[
                ModelKind::Turbulent,
                ModelKind::RansTurbulence,
                ModelKind::KOmegaTurbulence,
                ModelKind::SstKOmega,
                ModelKind::KOmegaAllYPlusWall,
                ModelKind::GammaTransition,
            ],
            TurbulenceModel::RansRst => &[
                ModelKind::RansTurbulence,
                ModelKind::ReynoldsStressTurbulence,
                ModelKind::EbRsm,
                ModelKind::EbRsmAllYPlusWall,
            ],
            TurbulenceModel::RansKEpsilon => &[
                ModelKind::RansTurbulence,
                ModelKind::KEpsilonTurbulence,
                ModelKind::RkeTwoLayer,
                ModelKind::KeTwoLayerAllYPlusWall,
            ],
            TurbulenceModel::Les => &[],
            TurbulenceModel::Laminar => &[ModelKind::Laminar],
        }
    }

    /// Reynolds-stress transport warrants GGDH scalar diffusion.
    pub fn uses_ggdh(self) -> bool {
        self == TurbulenceModel::RansRst
    }

    /// The turbulence solver frozen together with the flow solver, where
    /// the variant has one.
    pub fn turbulence_solver(self) -> Option<SolverKind> {
        match self {
            TurbulenceModel::RansKOmega => Some(SolverKind::KOmegaTurbulence),
            TurbulenceModel::RansRst => Some(SolverKind::EbRsTurbulence),
            TurbulenceModel::RansKEpsilon => Some(SolverKind::KEpsilonTurbulence),
            TurbulenceModel::Les | TurbulenceModel::Laminar => None,
        }
    }

    /// WALE subgrid constant, LES only.
    pub fn wale_cw(self) -> Option<f64> {
        match self {
            TurbulenceModel::Les => Some(0.325),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_round_trip() {
        for model in [
            TurbulenceModel::RansKOmega,
            TurbulenceModel::RansRst,
            TurbulenceModel::RansKEpsilon,
            TurbulenceModel::Les,
            TurbulenceModel::Laminar,
        ] {
            assert_eq!(TurbulenceModel::from_selector(model.selector()).unwrap(), model);
        }
    }

    #[test]
    fn unknown_selector_is_invalid_parameter() {
        let err = TurbulenceModel::from_selector("DNS").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn only_reynolds_stress_uses_ggdh() {
        assert!(TurbulenceModel::RansRst.uses_ggdh());
        assert!(!TurbulenceModel::RansKOmega.uses_ggdh());
        assert!(!TurbulenceModel::Les.uses_ggdh());
    }

    #[test]
    fn rst_freezes_the_ebrsm_solver() {
        assert_eq!(
            TurbulenceModel::RansRst.turbulence_solver(),
            Some(SolverKind::EbRsTurbulence)
        );
        assert_eq!(TurbulenceModel::Laminar.turbulence_solver(), None);
    }

    #[test]
    fn les_carries_the_wale_constant() {
        assert_eq!(TurbulenceModel::Les.wale_cw(), Some(0.325));
        assert_eq!(TurbulenceModel::RansRst.wale_cw(), None);
    }

    #[test]
    fn every_variant_installs_a_definite_model_set() {
        for model in [
            TurbulenceModel::RansKOmega,
            TurbulenceModel::RansRst,
            TurbulenceModel::RansKEpsilon,
            TurbulenceModel::Les,
            TurbulenceModel::Laminar,
        ] {
            assert!(!model.models_to_enable().is_empty());
        }
    }
}

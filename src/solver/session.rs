//! Run identity, persisted-state naming, and the autosave policy.

use rand::Rng;

use crate::solver::turbulence::TurbulenceModel;

/// When the solver writes intermediate state snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveTrigger {
    Iteration { every: u32 },
    TimeStep { every: u32 },
}

impl AutosaveTrigger {
    pub fn describe(&self) -> (&'static str, u32) {
        match self {
            AutosaveTrigger::Iteration { every } => ("iteration", *every),
            AutosaveTrigger::TimeStep { every } => ("time-step", *every),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosavePolicy {
    pub separator: &'static str,
    pub format_width: u32,
    pub max_files: u32,
    pub trigger: AutosaveTrigger,
}

impl AutosavePolicy {
    /// Steady runs snapshot by iteration count.
    pub fn steady() -> Self {
        Self {
            separator: "_At_",
            format_width: 6,
            max_files: 2,
            trigger: AutosaveTrigger::Iteration { every: 5000 },
        }
    }

    /// Time-accurate runs snapshot by time-step count.
    pub fn unsteady() -> Self {
        Self {
            trigger: AutosaveTrigger::TimeStep { every: 1000 },
            ..Self::steady()
        }
    }
}

const UID_LEN: usize = 5;

/// Identity of one experiment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    uid: String,
}

impl Session {
    /// Fresh session with a random 5-character hex uid.
    pub fn new() -> Self {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut rng = rand::thread_rng();
        let uid = (0..UID_LEN)
            .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
            .collect();
        Self { uid }
    }

    /// Fixed uid, for reproducible artifacts and tests.
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Persisted-state name of the non-reactive mixing study.
    pub fn mixing_sim_name(&self, model: TurbulenceModel) -> String {
        format!("Sim_{}_MIXING_RST_{}.sim", model.selector(), self.uid)
    }

    /// Persisted-state name of the reactive phi time-series study.
    pub fn phi_sim_name(&self, rotor_diameter_m: f64, rpm: f64) -> String {
        format!(
            "PhiTimeSeries_Rotor{:.0}mm_{:.0}RPM_Shear.sim",
            rotor_diameter_m * 1000.0,
            rpm
        )
    }

    /// Persisted states land under the results directory.
    pub fn results_path(&self, sim_name: &str) -> String {
        format!("Results/{sim_name}")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

//! Run-plan state machine.
//!
//! An experiment always walks the same phase sequence:
//! steady initialization -> unsteady transition -> flow/turbulence freeze ->
//! timed integration -> done. Phases are parameterized, never skipped; a
//! duration of zero is legal, omission is not. Transition violations are
//! configuration-time programming errors, not recoverable data failures.

use crate::solver::backend::SolverKind;
use crate::solver::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    SteadyInit,
    UnsteadyTransition,
    FlowFrozen,
    Integrating,
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::SteadyInit => "steady-init",
            RunPhase::UnsteadyTransition => "unsteady-transition",
            RunPhase::FlowFrozen => "flow-frozen",
            RunPhase::Integrating => "integrating",
            RunPhase::Done => "done",
        }
    }
}

/// Configuration delta applied by the steady -> unsteady conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnsteadySettings {
    pub time_step: f64,
    pub target_mean_courant: f64,
    pub target_max_courant: f64,
    pub second_order: bool,
    pub inner_iterations: u32,
}

/// What the freeze phase stops: always the flow solver, plus the active
/// turbulence solver where the model has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeSettings {
    pub turbulence: Option<SolverKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    phase: RunPhase,
    physical_time: f64,
    unsteady: Option<UnsteadySettings>,
    freeze: Option<FreezeSettings>,
    duration: Option<f64>,
}

impl RunPlan {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::SteadyInit,
            physical_time: 0.0,
            unsteady: None,
            freeze: None,
            duration: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn physical_time(&self) -> f64 {
        self.physical_time
    }

    pub fn unsteady(&self) -> Option<&UnsteadySettings> {
        self.unsteady.as_ref()
    }

    pub fn freeze_settings(&self) -> Option<&FreezeSettings> {
        self.freeze.as_ref()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn reject(&self, to: RunPhase) -> ConfigError {
        ConfigError::InvalidStateTransition {
            from: self.phase.as_str(),
            to: to.as_str(),
        }
    }

    /// Convert the steady formulation to a time-accurate one. Idempotent:
    /// converting an already-unsteady plan is a no-op and returns `false`.
    pub fn to_unsteady(&mut self, settings: UnsteadySettings) -> Result<bool> {
        match self.phase {
            RunPhase::SteadyInit => {
                if !settings.time_step.is_finite() || settings.time_step <= 0.0 {
                    return Err(ConfigError::invalid(
                        "time_step",
                        format!("must be finite and > 0: {}", settings.time_step),
                    ));
                }
                self.unsteady = Some(settings);
                self.phase = RunPhase::UnsteadyTransition;
                Ok(true)
            }
            RunPhase::UnsteadyTransition => Ok(false),
            _ => Err(self.reject(RunPhase::UnsteadyTransition)),
        }
    }

    /// Freeze flow (and turbulence) so only scalar transport keeps
    /// evolving; the mixing experiment is one-way coupled from here on.
    pub fn freeze(&mut self, settings: FreezeSettings) -> Result<()> {
        if self.phase != RunPhase::UnsteadyTransition {
            return Err(self.reject(RunPhase::FlowFrozen));
        }
        self.freeze = Some(settings);
        self.phase = RunPhase::FlowFrozen;
        Ok(())
    }

    /// Advance physical time by exactly `duration` seconds relative to the
    /// current physical time. Zero is legal.
    pub fn integrate(&mut self, duration: f64) -> Result<()> {
        if self.phase != RunPhase::FlowFrozen {
            return Err(self.reject(RunPhase::Integrating));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::invalid(
                "duration",
                format!("must be finite and >= 0: {duration}"),
            ));
        }
        self.duration = Some(duration);
        self.phase = RunPhase::Integrating;
        Ok(())
    }

    /// The requested duration has elapsed.
    pub fn complete(&mut self) -> Result<()> {
        if self.phase != RunPhase::Integrating {
            return Err(self.reject(RunPhase::Done));
        }
        self.physical_time += self.duration.unwrap_or(0.0);
        self.phase = RunPhase::Done;
        Ok(())
    }
}

impl Default for RunPlan {
    fn default() -> Self {
        Self::new()
    }
}

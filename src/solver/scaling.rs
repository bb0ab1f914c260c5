//! Scaling laws turning experiment parameters into derived scalars.
//!
//! All functions here are pure: no state survives a call, and every output
//! is validated before it is returned. The time-step law rescales a base
//! step that was tuned at reference operating conditions (500 or 1000 RPM
//! depending on the study, mesh scale 20, 80 mm rotor) so that the mean
//! convective Courant number stays at its target when speed, mesh
//! coarseness, or rotor size change.

use crate::solver::error::{ConfigError, Result};

/// Base time step per unit target Courant number at reference conditions.
const BASE_STEP_SECONDS: f64 = 1e-3;

/// Seconds per minute, for RPM and flow-rate conversions.
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Cubic meters per milliliter.
const M3_PER_ML: f64 = 1e-6;

fn require_positive(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(name, format!("not finite: {value}")));
    }
    if value <= 0.0 {
        return Err(ConfigError::invalid(name, format!("must be > 0: {value}")));
    }
    Ok(value)
}

/// Time step in seconds keeping the mean convective Courant number at
/// `target_mean_courant`.
///
/// `dt = target * 1e-3 * (ref_rpm / rpm) * (mesh_scale / ref_mesh_scale)
///      * (ref_diameter / diameter)`
///
/// Each ratio is dimensionless by construction; the step shrinks with faster
/// rotation and larger rotors (higher tip speed) and grows with coarser
/// meshes.
#[allow(clippy::too_many_arguments)]
pub fn time_step(
    target_mean_courant: f64,
    reference_rpm: f64,
    rpm: f64,
    mesh_scale: f64,
    reference_mesh_scale: f64,
    reference_diameter: f64,
    diameter: f64,
) -> Result<f64> {
    require_positive("target_mean_courant", target_mean_courant)?;
    require_positive("reference_rpm", reference_rpm)?;
    require_positive("rpm", rpm)?;
    require_positive("mesh_scale", mesh_scale)?;
    require_positive("reference_mesh_scale", reference_mesh_scale)?;
    require_positive("reference_diameter", reference_diameter)?;
    require_positive("diameter", diameter)?;

    Ok(target_mean_courant
        * BASE_STEP_SECONDS
        * (reference_rpm / rpm)
        * (mesh_scale / reference_mesh_scale)
        * (reference_diameter / diameter))
}

/// Mass flow rate in kg/s for one outlet, splitting the volumetric feed
/// (mL/min) symmetrically across `num_outlets` before applying the density.
pub fn mass_flow_rate(
    volumetric_flow_ml_min: f64,
    num_outlets: u32,
    density: f64,
) -> Result<f64> {
    require_positive("volumetric_flow_ml_min", volumetric_flow_ml_min)?;
    require_positive("density", density)?;
    if num_outlets == 0 {
        return Err(ConfigError::invalid("num_outlets", "must be >= 1: 0"));
    }

    let volumetric_si =
        volumetric_flow_ml_min / num_outlets as f64 / SECONDS_PER_MINUTE * M3_PER_ML;
    Ok(volumetric_si * density)
}

/// Schmidt number `nu / D = viscosity / (diffusivity * density)`,
/// dimensionless.
pub fn schmidt_number(viscosity: f64, diffusivity: f64, density: f64) -> Result<f64> {
    require_positive("viscosity", viscosity)?;
    if !diffusivity.is_finite() || !density.is_finite() {
        return Err(ConfigError::invalid(
            "diffusivity/density",
            "not finite".to_string(),
        ));
    }
    if diffusivity == 0.0 {
        return Err(ConfigError::DivisionByZero {
            name: "diffusivity",
        });
    }
    if density == 0.0 {
        return Err(ConfigError::DivisionByZero { name: "density" });
    }
    Ok(viscosity / (diffusivity * density))
}

/// Adaptive time-stepping bounds: the mean target and the 5x max target the
/// convective CFL provider is configured with.
pub fn courant_bounds(target_mean: f64) -> (f64, f64) {
    (target_mean, target_mean * 5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RPM_500: f64 = 500.0;
    const MESH_20: f64 = 20.0;
    const ROTOR_80MM: f64 = 80.0e-3;

    #[test]
    fn time_step_at_reference_conditions_is_base_scaled_courant() {
        // targetCourant=20 at the reference point: dt = 20 * 1e-3 = 0.02 s.
        let dt = time_step(20.0, RPM_500, 500.0, 20.0, MESH_20, ROTOR_80MM, 80.0e-3).unwrap();
        assert_eq!(dt, 0.02);
    }

    #[test]
    fn time_step_for_mixing_study_mesh() {
        // RelMeshBaseSize=5 quarters the reference step.
        let dt = time_step(20.0, RPM_500, 500.0, 5.0, MESH_20, ROTOR_80MM, 80.0e-3).unwrap();
        assert!((dt - 5.0e-3).abs() < 1e-15);
    }

    #[test]
    fn time_step_monotonicity() {
        let base = time_step(0.8, 1000.0, 500.0, 20.0, MESH_20, ROTOR_80MM, 80.0e-3).unwrap();

        let faster = time_step(0.8, 1000.0, 1000.0, 20.0, MESH_20, ROTOR_80MM, 80.0e-3).unwrap();
        assert!(faster < base, "step must shrink with rpm");

        let coarser = time_step(0.8, 1000.0, 500.0, 40.0, MESH_20, ROTOR_80MM, 80.0e-3).unwrap();
        assert!(coarser > base, "step must grow with mesh scale");

        let bigger = time_step(0.8, 1000.0, 500.0, 20.0, MESH_20, ROTOR_80MM, 160.0e-3).unwrap();
        assert!(bigger < base, "step must shrink with rotor diameter");
    }

    #[test]
    fn time_step_rejects_degenerate_inputs() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = time_step(20.0, RPM_500, bad, 20.0, MESH_20, ROTOR_80MM, 80.0e-3)
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidParameter { .. }));
        }
        let err =
            time_step(20.0, RPM_500, 500.0, 20.0, MESH_20, ROTOR_80MM, -80.0e-3).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn mass_flow_splits_across_outlets() {
        // 120 mL/min over two outlets: 1 mL/s each = 1e-6 m^3/s.
        let mdot = mass_flow_rate(120.0, 2, 997.561).unwrap();
        assert!((mdot - 1e-6 * 997.561).abs() < 1e-12);

        let err = mass_flow_rate(120.0, 0, 997.561).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn schmidt_number_closes_the_quoted_scenario() {
        // mu = 8.8871e-4 Pa s, D = 1.06e-9 m^2/s, rho = 1000 kg/m^3.
        let sc = schmidt_number(8.8871e-4, 1.06e-9, 1000.0).unwrap();
        assert!((sc - 838.4).abs() < 0.05, "got {sc}");
    }

    #[test]
    fn schmidt_number_at_experiment_density() {
        let sc = schmidt_number(8.8871e-4, 1.06e-9, 997.561).unwrap();
        assert!((sc - 840.4).abs() < 0.1, "got {sc}");
    }

    #[test]
    fn schmidt_number_rejects_degenerate_denominator() {
        assert!(matches!(
            schmidt_number(8.8871e-4, 0.0, 997.561).unwrap_err(),
            ConfigError::DivisionByZero {
                name: "diffusivity"
            }
        ));
        assert!(matches!(
            schmidt_number(8.8871e-4, 1.06e-9, 0.0).unwrap_err(),
            ConfigError::DivisionByZero { name: "density" }
        ));
    }

    #[test]
    fn courant_bounds_are_mean_and_five_times_mean() {
        assert_eq!(courant_bounds(0.8), (0.8, 4.0));
        assert_eq!(courant_bounds(20.0), (20.0, 100.0));
    }
}

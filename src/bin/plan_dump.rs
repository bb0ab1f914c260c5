use mixplan::solver::backend::{ArtifactHeader, RecordingBackend};
use mixplan::solver::context::{ExperimentContext, ExperimentParams};
use mixplan::solver::emit;
use mixplan::solver::session::Session;

fn dump(
    label: &str,
    params: ExperimentParams,
) -> Result<String, Box<dyn std::error::Error>> {
    let session = Session::new();
    let header = ArtifactHeader::new(params.study.as_str(), session.uid());
    let mut ctx = ExperimentContext::derive_with_session(params, session)?;
    let mut backend = RecordingBackend::couette_cell();
    emit::emit_study(&mut ctx, &mut backend)?;
    let lines = backend.to_json_lines(&header)?;
    Ok(format!("# {label}\n{lines}"))
}

fn main() {
    let runs = [
        (
            "mixing study, 500 RPM",
            ExperimentParams::mixing_study(500.0, 120.0, 0.1),
        ),
        (
            "phi study, 80 mm rotor, 1000 RPM",
            ExperimentParams::phi_study(80.0e-3, 1000.0, 120.0, 0.1, 0.05),
        ),
    ];

    for (label, params) in runs {
        match dump(label, params) {
            Ok(text) => print!("{text}"),
            Err(err) => {
                eprintln!("Plan dump failed for {label}: {err}");
                std::process::exit(1);
            }
        }
    }
}

//! Terminal summary of an analysis report.

use colored::{Color, Colorize};

use crate::fit::BoundHit;
use crate::result::{AnalysisReport, ObservableOutcome, ObservableValue};
use crate::types::ScalarSamples;

/// Rendering settings, passed explicitly to every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit ANSI colours.
    pub color: bool,
    /// Decimal places for central values and errors.
    pub precision: usize,
    /// List failed observables with their reasons.
    pub show_failures: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            precision: 4,
            show_failures: true,
        }
    }
}

impl RenderOptions {
    /// Plain text, no colours.
    pub fn plain() -> Self {
        Self {
            color: false,
            ..Self::default()
        }
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let painted = text.color(color);
        if bold {
            painted.bold().to_string()
        } else {
            painted.to_string()
        }
    }
}

fn estimate(samples: &ScalarSamples, precision: usize) -> String {
    let mean = *samples.mean();
    if mean.is_nan() {
        return "n/a".to_string();
    }
    format!(
        "{:.*} ± {:.*}",
        precision,
        mean,
        precision,
        samples.std_error()
    )
}

fn bound_note(hits: &[&BoundHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let listed: Vec<String> = hits
        .iter()
        .map(|hit| format!("{} = {} at bound {}", hit.parameter, hit.value, hit.bound))
        .collect();
    Some(format!("on bound: {}", listed.join(", ")))
}

fn describe(value: &ObservableValue, precision: usize) -> Vec<String> {
    match value {
        ObservableValue::Mass { mass, chi2_dof, .. } => vec![format!(
            "mass {}   χ²/dof {:.2}",
            estimate(mass, precision),
            chi2_dof
        )],
        ObservableValue::MatrixElement {
            mass,
            matrix_element,
            chi2_dof,
            ..
        } => vec![format!(
            "mass {}   matrix element {}   χ²/dof {:.2}",
            estimate(mass, precision),
            estimate(matrix_element, precision),
            chi2_dof
        )],
        ObservableValue::Spectrum { states, crossings } => {
            let mut lines: Vec<String> = states
                .iter()
                .map(|state| {
                    if state.mass.mean().is_nan() {
                        format!("E{}: no plateau window", state.level)
                    } else {
                        format!(
                            "E{}: {}   χ²/dof {:.2}",
                            state.level,
                            estimate(&state.mass, precision),
                            state.chi2_dof
                        )
                    }
                })
                .collect();
            if !crossings.is_empty() {
                lines.push(format!("{} possible level crossing(s)", crossings.len()));
            }
            lines
        }
        ObservableValue::SpectralPeak {
            amplitude,
            energy,
            coupling,
            sign_flipped,
            chi2_dof,
            ..
        } => {
            let mut line = format!(
                "a0 {}   E0 {}   c0 {}   χ²/dof {:.2}",
                estimate(amplitude, precision),
                estimate(energy, precision),
                estimate(coupling, precision),
                chi2_dof
            );
            if *sign_flipped {
                line.push_str("   (sign flipped)");
            }
            vec![line]
        }
    }
}

/// Format an analysis report for human-readable terminal output.
pub fn format_report(report: &AnalysisReport, options: &RenderOptions) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str("lattice-plateaus\n");
    output.push_str(&sep);
    output.push_str("\n\n");

    let params = &report.params;
    output.push_str(&format!(
        "  Ensemble: {} (β = {}, mF = {}, mAS = {}, {}×{}³)\n",
        report.ensemble, params.beta, params.m_f, params.m_as, params.nt, params.ns
    ));
    output.push_str(&format!(
        "  Configurations: {}, bootstrap replicas: {}\n\n",
        report.configurations, report.replicas
    ));

    for outcome in &report.outcomes {
        match outcome {
            ObservableOutcome::Completed { name, value } => {
                let lines = describe(value, options.precision);
                output.push_str(&format!(
                    "  {} {}\n",
                    options.paint("\u{2713}", Color::Green, true),
                    options.paint(name, Color::Cyan, false)
                ));
                for line in lines {
                    output.push_str(&format!("      {line}\n"));
                }
                if let Some(summary) = report.autocorrelation(name).filter(|a| a.suggested_bin > 1) {
                    output.push_str(&format!(
                        "      {}\n",
                        options.paint(
                            &format!(
                                "τ_int {:.2} at t = {}: bin size {} suggested",
                                summary.tau_int, summary.slice, summary.suggested_bin
                            ),
                            Color::Yellow,
                            false
                        )
                    ));
                }
                if let Some(note) = bound_note(&value.bound_hits()) {
                    output.push_str(&format!(
                        "      {}\n",
                        options.paint(&note, Color::Yellow, false)
                    ));
                }
            }
            ObservableOutcome::Failed { name, reason } => {
                if !options.show_failures {
                    continue;
                }
                output.push_str(&format!(
                    "  {} {}\n      {}\n",
                    options.paint("\u{2717}", Color::Red, true),
                    options.paint(name, Color::Cyan, false),
                    options.paint(&reason.to_string(), Color::Yellow, false)
                ));
            }
        }
    }

    output.push('\n');
    output.push_str(&sep);
    output.push('\n');
    let failed = report.failures().count();
    let summary = format!(
        "{} of {} observables completed",
        report.outcomes.len() - failed,
        report.outcomes.len()
    );
    if failed == 0 {
        output.push_str(&options.paint(&summary, Color::Green, false));
    } else {
        output.push_str(&options.paint(&summary, Color::Yellow, false));
    }
    output.push('\n');

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::EnsembleParams;
    use crate::error::AnalysisError;
    use crate::statistics::{AutocorrelationSummary, BootstrapSampleSet};

    fn make_report() -> AnalysisReport {
        AnalysisReport {
            ensemble: "M3".to_string(),
            params: EnsembleParams {
                beta: 6.5,
                m_f: -0.71,
                m_as: -1.01,
                nt: 48,
                ns: 20,
                epsilon: 0.2,
            },
            configurations: 40,
            replicas: 3,
            outcomes: vec![
                ObservableOutcome::Completed {
                    name: "as_ps".to_string(),
                    value: ObservableValue::Mass {
                        mass: BootstrapSampleSet::new(0.25, vec![0.24, 0.25, 0.26]),
                        chi2_dof: 0.93,
                        bound_hits: Vec::new(),
                    },
                },
                ObservableOutcome::Failed {
                    name: "lambda_odd".to_string(),
                    reason: AnalysisError::MissingChannel {
                        key: "source_N80_sink_N80/Chimera_OC_odd_re".to_string(),
                    },
                },
            ],
            autocorrelation: Vec::new(),
        }
    }

    #[test]
    fn test_plain_report() {
        let text = format_report(&make_report(), &RenderOptions::plain());
        assert!(text.contains("Ensemble: M3"));
        assert!(text.contains("as_ps"));
        assert!(text.contains("mass 0.2500 ±"));
        assert!(text.contains("χ²/dof 0.93"));
        assert!(text.contains("Chimera_OC_odd_re"));
        assert!(text.contains("1 of 2 observables completed"));
        assert!(!text.contains('\u{1b}'));
        assert!(!text.contains("on bound"));
    }

    #[test]
    fn test_bound_hit_line() {
        let mut report = make_report();
        if let ObservableOutcome::Completed {
            value: ObservableValue::Mass { bound_hits, .. },
            ..
        } = &mut report.outcomes[0]
        {
            bound_hits.push(BoundHit {
                parameter: "E".to_string(),
                value: 0.0,
                bound: 0.0,
            });
        }
        let text = format_report(&report, &RenderOptions::plain());
        assert!(text.contains("on bound: E = 0 at bound 0"));
    }

    #[test]
    fn test_autocorrelation_line() {
        let mut report = make_report();
        report.autocorrelation.push((
            "as_ps".to_string(),
            AutocorrelationSummary {
                slice: 12,
                lag1: 0.6,
                tau_int: 2.5,
                suggested_bin: 5,
            },
        ));
        let text = format_report(&report, &RenderOptions::plain());
        assert!(text.contains("τ_int 2.50 at t = 12: bin size 5 suggested"));
    }

    #[test]
    fn test_hide_failures() {
        let options = RenderOptions {
            show_failures: false,
            ..RenderOptions::plain()
        };
        let text = format_report(&make_report(), &options);
        assert!(!text.contains("lambda_odd"));
    }
}

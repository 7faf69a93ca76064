//! Rendering of analysis results: human text, LaTeX formulae, and JSON.
//!
//! Everything here is a pure function of the result (plus a caller-supplied
//! id-to-title map); no store access happens during rendering.

use std::collections::HashMap;

use colored::Colorize;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;
use serde_json::{json, Value};

use crate::model::{
    AnalysisResult, CombinationMatch, ComponentTransform, Match, SeqId, SimilarityHit,
};
use crate::transform::render_chain;

fn terms_string(terms: &[BigInt]) -> String {
    terms
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn coeff_string(c: &BigRational) -> String {
    if c.denom().is_one() {
        c.numer().to_string()
    } else {
        format!("{}/{}", c.numer(), c.denom())
    }
}

fn component_string(
    id: SeqId,
    transform: ComponentTransform,
    shift: i32,
) -> String {
    let arg = match shift.cmp(&0) {
        std::cmp::Ordering::Equal => "n".to_string(),
        std::cmp::Ordering::Greater => format!("n+{}", shift),
        std::cmp::Ordering::Less => format!("n-{}", -shift),
    };
    match transform {
        ComponentTransform::Identity => format!("{}({})", id, arg),
        ComponentTransform::Diff => format!("diff({})({})", id, arg),
        ComponentTransform::PartialSum => format!("psum({})({})", id, arg),
    }
}

/// Plain-text identity like `q(n) = 1*A000045(n+2) + 1*A000045(n)`.
pub fn combination_formula(m: &CombinationMatch) -> String {
    let parts: Vec<String> = m
        .coefficients
        .iter()
        .zip(&m.component_ids)
        .zip(m.shifts.iter().zip(&m.component_transforms))
        .map(|((coeff, &id), (&shift, &transform))| {
            format!(
                "{}*{}",
                coeff_string(coeff),
                component_string(id, transform, shift)
            )
        })
        .collect();
    format!("q(n) = {}", parts.join(" + "))
}

/// LaTeX form of the same identity.
pub fn combination_latex(m: &CombinationMatch) -> String {
    let parts: Vec<String> = m
        .coefficients
        .iter()
        .zip(&m.component_ids)
        .zip(m.shifts.iter().zip(&m.component_transforms))
        .map(|((coeff, &id), (&shift, &transform))| {
            let coeff_tex = if coeff.denom().is_one() {
                coeff.numer().to_string()
            } else {
                format!("\\frac{{{}}}{{{}}}", coeff.numer(), coeff.denom())
            };
            let arg = match shift.cmp(&0) {
                std::cmp::Ordering::Equal => "n".to_string(),
                std::cmp::Ordering::Greater => format!("n+{}", shift),
                std::cmp::Ordering::Less => format!("n-{}", -shift),
            };
            let base = format!("\\text{{{}}}({})", id, arg);
            let wrapped = match transform {
                ComponentTransform::Identity => base,
                ComponentTransform::Diff => format!("\\Delta {}", base),
                ComponentTransform::PartialSum => format!("\\Sigma {}", base),
            };
            format!("{} \\cdot {}", coeff_tex, wrapped)
        })
        .collect();
    format!("a(n) = {}", parts.join(" + "))
}

fn title_for<'a>(names: &'a HashMap<SeqId, String>, id: SeqId) -> &'a str {
    names.get(&id).map(String::as_str).unwrap_or("")
}

fn push_match_line(out: &mut String, m: &Match, names: &HashMap<SeqId, String>) {
    let id = m.id.to_string();
    let kind = if m.transform_chain.is_empty() {
        format!("{} match", m.match_type.as_str())
    } else {
        format!("via [{}]", render_chain(&m.transform_chain))
    };
    out.push_str(&format!(
        "  {}  {} (offset {}, {} terms, score {:.2})",
        id.bold(),
        kind,
        m.offset,
        m.length,
        m.score
    ));
    let title = title_for(names, m.id);
    if !title.is_empty() {
        out.push_str(&format!("  {}", title.dimmed()));
    }
    out.push('\n');
    if let Some(snippet) = &m.snippet {
        out.push_str(&format!("         [{}]\n", terms_string(snippet)));
    }
}

/// Render the full result for the terminal.
pub fn render_human(result: &AnalysisResult, names: &HashMap<SeqId, String>) -> String {
    let mut out = String::new();

    if !result.exact.is_empty() {
        out.push_str(&format!("{}\n", "Exact matches".green().bold()));
        for m in &result.exact {
            push_match_line(&mut out, m, names);
        }
    }
    if !result.transformed.is_empty() {
        out.push_str(&format!("{}\n", "Transform matches".cyan().bold()));
        for m in &result.transformed {
            push_match_line(&mut out, m, names);
        }
    }
    if !result.similar.is_empty() {
        out.push_str(&format!("{}\n", "Similar sequences".yellow().bold()));
        for hit in &result.similar {
            out.push_str(&format!(
                "  {}  rho {:.4}, nmse {:.2e}, fit {:.3}*r{:+.3}, {} terms",
                hit.id.to_string().bold(),
                hit.correlation,
                hit.nmse,
                hit.alpha,
                hit.beta,
                hit.overlap
            ));
            let title = title_for(names, hit.id);
            if !title.is_empty() {
                out.push_str(&format!("  {}", title.dimmed()));
            }
            out.push('\n');
        }
    }
    if !result.combinations.is_empty() {
        out.push_str(&format!("{}\n", "Combinations".magenta().bold()));
        for m in &result.combinations {
            out.push_str(&format!(
                "  {} ({} terms from n={}, complexity {}, score {:.2})\n",
                combination_formula(m),
                m.length,
                m.first_index,
                m.complexity,
                m.score
            ));
        }
    }
    if out.is_empty() {
        out.push_str("no matches\n");
    }
    if result.truncated() {
        out.push_str(&format!(
            "{}\n",
            "(search truncated by a budget cap; try --profile max)".dimmed()
        ));
    }
    out
}

/// Append LaTeX identities for combinations and transform hits.
pub fn render_latex(result: &AnalysisResult) -> String {
    let mut out = String::new();
    for m in &result.transformed {
        out.push_str(&format!(
            "%% {} via [{}]\n",
            m.id,
            render_chain(&m.transform_chain)
        ));
    }
    for m in &result.combinations {
        out.push_str(&combination_latex(m));
        out.push('\n');
    }
    out
}

fn match_json(m: &Match) -> Value {
    json!({
        "id": m.id.to_string(),
        "match_type": m.match_type.as_str(),
        "offset": m.offset,
        "length": m.length,
        "score": m.score,
        "chain": m.transform_chain.iter().map(|op| json!({
            "op": op.name(),
            "params": op.params(),
        })).collect::<Vec<_>>(),
        "snippet": m.snippet.as_ref().map(|s| terms_string(s)),
    })
}

fn similarity_json(hit: &SimilarityHit) -> Value {
    json!({
        "id": hit.id.to_string(),
        "correlation": hit.correlation,
        "nmse": hit.nmse,
        "alpha": hit.alpha,
        "beta": hit.beta,
        "overlap": hit.overlap,
    })
}

fn combination_json(m: &CombinationMatch) -> Value {
    json!({
        "components": m.component_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        "coefficients": m.coefficients.iter().map(coeff_string).collect::<Vec<_>>(),
        "shifts": m.shifts,
        "transforms": m.component_transforms.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        "first_index": m.first_index,
        "length": m.length,
        "complexity": m.complexity,
        "score": m.score,
        "formula": combination_formula(m),
    })
}

/// Machine-readable rendering of the whole result.
pub fn render_json(result: &AnalysisResult, names: &HashMap<SeqId, String>) -> Value {
    json!({
        "exact": result.exact.iter().map(match_json).collect::<Vec<_>>(),
        "transformed": result.transformed.iter().map(match_json).collect::<Vec<_>>(),
        "similar": result.similar.iter().map(similarity_json).collect::<Vec<_>>(),
        "combinations": result.combinations.iter().map(combination_json).collect::<Vec<_>>(),
        "names": result.exact.iter().map(|m| m.id)
            .chain(result.transformed.iter().map(|m| m.id))
            .chain(result.similar.iter().map(|h| h.id))
            .chain(result.combinations.iter().flat_map(|c| c.component_ids.clone()))
            .filter_map(|id| names.get(&id).map(|n| (id.to_string(), json!(n))))
            .collect::<serde_json::Map<String, Value>>(),
        "truncated": result.truncated(),
        "diagnostics": result.diagnostics.iter().map(|d| json!({
            "stage": d.stage.as_str(),
            "candidates_before": d.candidates_before,
            "candidates_after": d.candidates_after,
            "elapsed_ms": d.elapsed.as_millis() as u64,
            "truncated": d.truncated,
            "truncated_by": d.truncated_by.map(|c| c.as_str()),
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchType;
    use crate::transform::Op;

    fn rational(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn lucas_combination() -> CombinationMatch {
        CombinationMatch {
            component_ids: vec![SeqId(45), SeqId(45)],
            coefficients: vec![rational(1, 1), rational(1, 1)],
            shifts: vec![2, 0],
            component_transforms: vec![
                ComponentTransform::Identity,
                ComponentTransform::Identity,
            ],
            first_index: 0,
            length: 6,
            complexity: 6,
            score: 6.0 / 7.0,
        }
    }

    #[test]
    fn combination_formula_text() {
        assert_eq!(
            combination_formula(&lucas_combination()),
            "q(n) = 1*A000045(n+2) + 1*A000045(n)"
        );
    }

    #[test]
    fn combination_formula_rational_and_transforms() {
        let m = CombinationMatch {
            component_ids: vec![SeqId(290), SeqId(27)],
            coefficients: vec![rational(1, 2), rational(-3, 1)],
            shifts: vec![0, -1],
            component_transforms: vec![
                ComponentTransform::Diff,
                ComponentTransform::PartialSum,
            ],
            first_index: 1,
            length: 5,
            complexity: 11,
            score: 5.0 / 12.0,
        };
        assert_eq!(
            combination_formula(&m),
            "q(n) = 1/2*diff(A000290)(n) + -3*psum(A000027)(n-1)"
        );
        let latex = combination_latex(&m);
        assert!(latex.contains("\\frac{1}{2}"));
        assert!(latex.contains("\\Delta \\text{A000290}(n)"));
        assert!(latex.contains("\\Sigma \\text{A000027}(n-1)"));
    }

    #[test]
    fn json_carries_chain_descriptions() {
        let m = Match {
            id: SeqId(27),
            match_type: MatchType::Prefix,
            offset: 0,
            length: 5,
            score: 5.0 / 2.0,
            transform_chain: vec![Op::Diff, Op::Scale(2)],
            snippet: None,
        };
        let v = match_json(&m);
        assert_eq!(v["chain"][0]["op"], "diff");
        assert_eq!(v["chain"][1]["op"], "scale");
        assert_eq!(v["chain"][1]["params"][0], 2);
    }

    #[test]
    fn human_rendering_mentions_sections() {
        colored::control::set_override(false);
        let mut result = AnalysisResult::default();
        result.combinations.push(lucas_combination());
        let names = HashMap::new();
        let text = render_human(&result, &names);
        assert!(text.contains("Combinations"));
        assert!(text.contains("A000045(n+2)"));
    }

    #[test]
    fn empty_result_renders_no_matches() {
        colored::control::set_override(false);
        let text = render_human(&AnalysisResult::default(), &HashMap::new());
        assert_eq!(text, "no matches\n");
    }
}

use oracle_store::ScoreComponents;

/// Scoring configuration version recorded alongside every `relevance_score`
/// row (§4.9); bump this if the weights or formula ever change.
pub const WEIGHTS_VERSION: &str = "v1";

const W_CONTENT_SIM: f64 = 0.40;
const W_KEYWORD_MATCH: f64 = 0.30;
const W_RECENCY: f64 = 0.20;
const W_CITATION: f64 = 0.10;

/// GEO-side half of the relevance comparison: what the paper is being scored
/// against.
pub struct GeoContext<'a> {
    pub title: &'a str,
    pub summary: &'a str,
    pub keywords: &'a [String],
}

/// Paper-side half: the candidate being scored.
pub struct PaperContext<'a> {
    pub title: &'a str,
    pub abstract_text: Option<&'a str>,
    pub keywords: &'a [String],
    pub mesh_terms: &'a [String],
    pub age_years: f64,
    pub citations: i64,
}

/// Token-level Ratcliff/Obershelp-style similarity between two texts,
/// implemented as `strsim::normalized_levenshtein` over whitespace-joined
/// lowercase tokens — the same string-similarity crate used by the title
/// dedup heuristic in `oracle-sources::types`.
pub fn content_sim(geo: &GeoContext, paper: &PaperContext) -> f64 {
    let geo_text = format!("{} {}", geo.title, geo.summary).to_ascii_lowercase();
    let paper_text = format!("{} {}", paper.title, paper.abstract_text.unwrap_or_default()).to_ascii_lowercase();
    if geo_text.trim().is_empty() || paper_text.trim().is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&geo_text, &paper_text)
}

/// Fraction of GEO keywords present anywhere in the paper's title, abstract,
/// author keywords, or MeSH terms.
pub fn keyword_match(geo: &GeoContext, paper: &PaperContext) -> f64 {
    if geo.keywords.is_empty() {
        return 0.0;
    }
    let haystack = format!(
        "{} {} {} {}",
        paper.title,
        paper.abstract_text.unwrap_or_default(),
        paper.keywords.join(" "),
        paper.mesh_terms.join(" "),
    )
    .to_ascii_lowercase();

    let matched = geo
        .keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_ascii_lowercase()))
        .count();
    matched as f64 / geo.keywords.len() as f64
}

/// Piecewise recency curve from §4.9: flat steps through age 6, exponential
/// decay afterward.
pub fn recency(age_years: f64) -> f64 {
    const STEPS: [f64; 7] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.4, 0.2];
    if age_years < 0.0 {
        return 1.0;
    }
    let age_floor = age_years.floor() as usize;
    if age_floor < STEPS.len() {
        STEPS[age_floor]
    } else {
        0.2 * 0.7_f64.powf(age_years - 6.0)
    }
}

/// `min(1, log10(citations+1)/4)`.
pub fn citation_component(citations: i64) -> f64 {
    let c = citations.max(0) as f64;
    (((c + 1.0).log10()) / 4.0).min(1.0)
}

/// Computes every component plus the weighted total (§4.9). `total` is
/// guaranteed to equal `Σ weight·component` exactly, since it's computed the
/// same way here as it's checked in the invariant tests.
pub fn score(geo: &GeoContext, paper: &PaperContext) -> (ScoreComponents, f64) {
    let components = ScoreComponents {
        content_sim: content_sim(geo, paper),
        keyword_match: keyword_match(geo, paper),
        recency: recency(paper.age_years),
        citation_component: citation_component(paper.citations),
    };
    let total = W_CONTENT_SIM * components.content_sim
        + W_KEYWORD_MATCH * components.keyword_match
        + W_RECENCY * components.recency
        + W_CITATION * components.citation_component;
    (components, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_curve_matches_pinned_steps() {
        assert_eq!(recency(0.0), 1.0);
        assert_eq!(recency(1.0), 0.9);
        assert_eq!(recency(6.0), 0.2);
        assert!((recency(7.0) - 0.2 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn citation_component_caps_at_one() {
        assert_eq!(citation_component(0), 0.0);
        assert!(citation_component(1_000_000) <= 1.0);
    }

    #[test]
    fn recency_curve_scenario_scores_point_four_three() {
        // §8 scenario 6: age=5, 0 citations, content_sim=0.5, keyword_match=0.5.
        let total = 0.40 * 0.5 + 0.30 * 0.5 + 0.20 * recency(5.0) + 0.10 * citation_component(0);
        assert!((total - 0.43).abs() < 1e-6);
    }

    #[test]
    fn keyword_match_counts_fraction_present() {
        let geo = GeoContext {
            title: "",
            summary: "",
            keywords: &["rnaseq".to_string(), "liver".to_string(), "obesity".to_string()],
        };
        let paper = PaperContext {
            title: "RNAseq analysis of liver tissue",
            abstract_text: None,
            keywords: &[],
            mesh_terms: &[],
            age_years: 0.0,
            citations: 0,
        };
        assert!((keyword_match(&geo, &paper) - 2.0 / 3.0).abs() < 1e-9);
    }
}

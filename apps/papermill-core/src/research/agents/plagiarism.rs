use crate::research::similarity;
use crate::runlog::RunLog;
use papermill_types::SimilarityReport;

/// Ratio above which the report is flagged. Fixed.
pub const FLAG_THRESHOLD: f64 = 0.6;
pub const FLAG_MESSAGE: &str = "High similarity with source abstract";

fn percent(x: f64) -> f64 {
    (x * 10000.0).round_ties_even() / 100.0
}

pub fn score(text: &str, abstracts: &[&str]) -> SimilarityReport {
    let scores: Vec<f64> = abstracts
        .iter()
        .map(|a| {
            let r = similarity::ratio(text, a);
            if r.is_finite() { r } else { 0.0 }
        })
        .collect();
    let max = scores.iter().copied().fold(0.0_f64, f64::max);
    let avg = if scores.is_empty() { 0.0 } else { scores.iter().sum::<f64>() / scores.len() as f64 };
    SimilarityReport {
        max_similarity: percent(max),
        avg_similarity: percent(avg),
        flags: if max > FLAG_THRESHOLD { vec![FLAG_MESSAGE.to_string()] } else { vec![] },
    }
}

pub fn run(text: &str, abstracts: &[&str], log: &RunLog) -> SimilarityReport {
    log.info(format!("PlagiarismAgent comparing paper against {} source abstracts", abstracts.len()));
    score(text, abstracts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_abstracts_scores_zero() {
        let r = score("Abstract:\nanything", &[]);
        assert_eq!(r, SimilarityReport { max_similarity: 0.0, avg_similarity: 0.0, flags: vec![] });
    }

    #[test]
    fn copying_an_abstract_is_flagged() {
        let text = "We propose a spatio-temporal graph network for traffic forecasting.";
        let r = score(text, &[text, "zzzz"]);
        assert_eq!(r.max_similarity, 100.0);
        assert_eq!(r.avg_similarity, 50.0);
        assert_eq!(r.flags, vec![FLAG_MESSAGE.to_string()]);
    }

    #[test]
    fn disjoint_text_is_not_flagged() {
        let r = score("aaaa", &["bbbb", "cccc"]);
        assert_eq!(r.max_similarity, 0.0);
        assert!(r.flags.is_empty());
    }

    #[test]
    fn rounds_to_two_decimals() {
        // 2 * 2 / 6
        let r = score("abc", &["abd"]);
        assert_eq!(r.max_similarity, 66.67);
        assert!(r.is_flagged());
    }

    #[test]
    fn exact_ties_round_to_even() {
        // ratio 2 * 1 / 64 = 3.125%
        let text = format!("a{}", "x".repeat(31));
        let source = format!("a{}", "y".repeat(31));
        let r = score(&text, &[source.as_str()]);
        assert_eq!(r.max_similarity, 3.12);
        assert_eq!(r.avg_similarity, 3.12);
    }
}

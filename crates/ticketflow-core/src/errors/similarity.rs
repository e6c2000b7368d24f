/// Closest candidate by normalized Levenshtein similarity, if similar enough.
pub fn closest_match<'a>(input: &str, candidates: &[&'a str], min_score: f64) -> Option<&'a str> {
    let needle = input.to_ascii_uppercase();
    candidates
        .iter()
        .map(|c| (*c, strsim::normalized_levenshtein(&needle, &c.to_ascii_uppercase())))
        .filter(|(_, score)| *score >= min_score)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c)
}

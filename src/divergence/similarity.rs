use std::collections::HashSet;

/// Word-set similarity between two turn contents
///
/// Identical strings score 1.0 and an empty side scores 0.0; otherwise the
/// Jaccard index of the lower-cased, whitespace-separated word sets.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let words_a = word_set(a);
    let words_b = word_set(b);
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();

    intersection as f64 / union as f64
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

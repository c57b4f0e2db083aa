//! Points awarded for a correct guess.

/// Points for a correct guess on the first hint at the very start of a round.
pub const MAX_POINTS: u32 = 100;

/// Score a correct guess.
///
/// `points = round(100 × hintFactor × timeFactor)` with
/// `hintFactor = 1 − hint_index / total_hints` and
/// `timeFactor = 1 − elapsed_ms / round_duration`, each factor kept in `[0, 1]`.
pub fn score_guess(
    hint_index: usize,
    total_hints: usize,
    elapsed_ms: i64,
    round_duration_sec: u32,
) -> u32 {
    if total_hints == 0 || round_duration_sec == 0 {
        return 0;
    }

    let hint_factor = 1.0 - hint_index as f64 / total_hints as f64;
    let duration_ms = f64::from(round_duration_sec) * 1000.0;
    let time_factor = 1.0 - elapsed_ms.max(0) as f64 / duration_ms;

    let points =
        f64::from(MAX_POINTS) * hint_factor.clamp(0.0, 1.0) * time_factor.clamp(0.0, 1.0);
    points.round() as u32
}

/// Correctness is a case-insensitive exact match on the full name.
pub fn is_correct(answer: &str, name: &str) -> bool {
    answer.trim().to_lowercase() == name.trim().to_lowercase()
}

//! Estimating how much of an interrupted reply the caller actually heard.
//!
//! Playback position is mapped linearly onto the reply's words, assuming a
//! uniform speaking rate.

/// Appended to assistant entries that were cut off
pub const INTERRUPTED_MARKER: &str = "[interrupted by user]";

/// Caller-reported playback position at the moment of barge-in
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptionReport {
    /// Seconds of reply audio played before the interruption
    pub interrupted_at: f64,
    /// Total seconds of reply audio
    pub total_duration: f64,
    /// Reply text as the caller saw it; may be empty
    pub full_text: String,
}

impl InterruptionReport {
    pub fn new(
        interrupted_at: Option<f64>,
        total_duration: Option<f64>,
        full_text: impl Into<String>,
    ) -> Self {
        Self {
            interrupted_at: interrupted_at.unwrap_or(0.0),
            total_duration: total_duration.unwrap_or(0.0),
            full_text: full_text.into(),
        }
    }

    /// Fraction of the reply heard, in `[0, 1]`
    pub fn heard_fraction(&self) -> f64 {
        heard_fraction(self.interrupted_at, self.total_duration)
    }

    /// History content for the interrupted reply.
    ///
    /// `stored` is used when the report carries no text.
    pub fn rewrite(&self, stored: &str) -> String {
        let text = if self.full_text.trim().is_empty() {
            stored
        } else {
            self.full_text.as_str()
        };
        truncate_to_heard(text, self.heard_fraction())
    }
}

pub fn heard_fraction(interrupted_at: f64, total_duration: f64) -> f64 {
    if !(total_duration > 0.0) || interrupted_at.is_nan() {
        return 0.0;
    }
    let fraction = interrupted_at / total_duration;
    // inf / inf
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0)
}

/// Keep the leading `floor(words * fraction)` words and mark the cut.
pub fn truncate_to_heard(text: &str, fraction: f64) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let heard = (words.len() as f64 * fraction).floor() as usize;

    if heard >= words.len() {
        words.join(" ")
    } else if heard == 0 {
        INTERRUPTED_MARKER.to_string()
    } else {
        format!("{} {}", words[..heard].join(" "), INTERRUPTED_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_heard() {
        let report = InterruptionReport::new(Some(3.0), Some(6.0), "one two three four five six");
        assert_eq!(report.heard_fraction(), 0.5);
        assert_eq!(report.rewrite(""), "one two three [interrupted by user]");
    }

    #[test]
    fn test_zero_duration_means_nothing_heard() {
        assert_eq!(heard_fraction(2.0, 0.0), 0.0);
        assert_eq!(heard_fraction(2.0, -1.0), 0.0);
        assert_eq!(heard_fraction(f64::NAN, 4.0), 0.0);
        assert_eq!(heard_fraction(1.0, f64::NAN), 0.0);
        assert_eq!(truncate_to_heard("hello there", 0.0), INTERRUPTED_MARKER);
    }

    #[test]
    fn test_fully_heard_keeps_text() {
        assert_eq!(truncate_to_heard("all  of it", 1.0), "all of it");
        assert_eq!(heard_fraction(9.0, 6.0), 1.0);
    }

    #[test]
    fn test_infinite_positions_clamp() {
        assert_eq!(heard_fraction(f64::INFINITY, 6.0), 1.0);
        assert_eq!(heard_fraction(f64::NEG_INFINITY, 6.0), 0.0);
        assert_eq!(heard_fraction(3.0, f64::INFINITY), 0.0);
        assert_eq!(heard_fraction(f64::INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_rounds_down() {
        // 5 words * 0.5 = 2.5 words heard
        assert_eq!(
            truncate_to_heard("a b c d e", 0.5),
            "a b [interrupted by user]"
        );
    }

    #[test]
    fn test_falls_back_to_stored_text() {
        let report = InterruptionReport::new(Some(1.0), Some(4.0), "  ");
        assert_eq!(
            report.rewrite("we open at nine tomorrow"),
            "we [interrupted by user]"
        );
    }
}

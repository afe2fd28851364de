use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Sentiment;

lazy_static! {
    static ref POSITIVE: Regex =
        Regex::new(r"(?i)surge|record|jump|gain|profit|success|growth|bull|rise|win").unwrap();
    static ref NEGATIVE: Regex =
        Regex::new(r"(?i)crash|drop|loss|fall|risk|warn|fail|bear|down|crisis").unwrap();
}

/// Keyword sentiment. Positive keywords are checked first and win ties; text
/// with no keyword at all is neutral.
pub fn classify_sentiment(text: &str) -> Sentiment {
    if POSITIVE.is_match(text) {
        Sentiment::Positive
    } else if NEGATIVE.is_match(text) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(classify_sentiment("Stocks SURGE after earnings"), Sentiment::Positive);
        assert_eq!(classify_sentiment("Markets crash on rate fears"), Sentiment::Negative);
        assert_eq!(classify_sentiment("Parliament opens new session"), Sentiment::Neutral);
        assert_eq!(classify_sentiment(""), Sentiment::Neutral);
    }

    #[test]
    fn test_positive_checked_first() {
        assert_eq!(classify_sentiment("Profit warning as shares drop"), Sentiment::Positive);
    }

    #[test]
    fn test_deterministic() {
        let text = "Record growth despite crisis";
        let first = classify_sentiment(text);
        for _ in 0..10 {
            assert_eq!(classify_sentiment(text), first);
        }
    }
}

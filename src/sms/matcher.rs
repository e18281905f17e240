//! Best-candidate selection for a requested company.

use tracing::debug;

use crate::sms::ParsedMessage;

/// Selected candidate plus how it was chosen.
#[derive(Debug, Clone)]
pub struct BestMatch {
    pub candidate: ParsedMessage,
    /// Set when no candidate scored above zero and the most-confident
    /// OTP-bearing one was returned instead.
    pub fallback_used: bool,
}

/// Score a batch of parsed messages against a target company and return the
/// best OTP-bearing candidate.
///
/// Scoring per candidate:
/// - +50 when its detected company and the target mutually contain each other
/// - +40 when the target is a substring of the sender id
/// - +20 when the target appears in the message body
/// - +confidence × 10
/// - +5 for the first (most recent) item in the batch
///
/// Ties keep batch order. When nothing scores above zero but some candidate
/// carries an OTP, the most confident of those is returned flagged as a
/// fallback rather than failing.
pub fn find_best_match(candidates: &[ParsedMessage], target_company: &str) -> Option<BestMatch> {
    let target = target_company.to_lowercase();
    let mut best: Option<(f32, &ParsedMessage)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.otp.is_none() {
            continue;
        }

        let mut score = 0.0_f32;

        if let Some(company) = &candidate.company {
            let detected = company.to_lowercase();
            if !detected.is_empty() && (detected.contains(&target) || target.contains(&detected)) {
                score += 50.0;
            }
        }
        if candidate.sender.to_lowercase().contains(&target) {
            score += 40.0;
        }
        if candidate.raw_text.to_lowercase().contains(&target) {
            score += 20.0;
        }
        score += candidate.confidence * 10.0;
        if index == 0 {
            score += 5.0;
        }

        debug!(index, score, sender = %candidate.sender, "Scored OTP candidate");

        // Strict comparison keeps batch order on ties.
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, candidate));
        }
    }

    match best {
        Some((score, candidate)) if score > 0.0 => Some(BestMatch {
            candidate: candidate.clone(),
            fallback_used: false,
        }),
        _ => candidates
            .iter()
            .filter(|c| c.otp.is_some())
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|candidate| BestMatch {
                candidate: candidate.clone(),
                fallback_used: true,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(sender: &str, body: &str, company: Option<&str>, otp: Option<&str>, confidence: f32) -> ParsedMessage {
        ParsedMessage {
            raw_text: body.into(),
            sender: sender.into(),
            otp: otp.map(String::from),
            tracking_id: None,
            company: company.map(String::from),
            confidence,
        }
    }

    #[test]
    fn company_match_dominates() {
        let batch = vec![
            candidate("VM-AMAZON", "Amazon code 1111", Some("amazon"), Some("1111"), 0.9),
            candidate("VM-ZOMATO", "Your Zomato OTP is 4821", Some("zomato"), Some("4821"), 1.0),
        ];
        let best = find_best_match(&batch, "Zomato").unwrap();
        assert_eq!(best.candidate.otp.as_deref(), Some("4821"));
        assert!(!best.fallback_used);
    }

    #[test]
    fn sender_substring_counts() {
        let batch = vec![
            candidate("AX-SWIGGY", "code 2222", None, Some("2222"), 0.6),
            candidate("BANKALERT", "code 3333", None, Some("3333"), 0.8),
        ];
        let best = find_best_match(&batch, "swiggy").unwrap();
        assert_eq!(best.candidate.otp.as_deref(), Some("2222"));
    }

    #[test]
    fn candidates_without_otp_never_win() {
        let batch = vec![
            candidate("VM-ZOMATO", "Zomato order ZMT12345678", Some("zomato"), None, 0.9),
            candidate("UNKNOWN", "code 7777", None, Some("7777"), 0.5),
        ];
        let best = find_best_match(&batch, "zomato").unwrap();
        assert_eq!(best.candidate.otp.as_deref(), Some("7777"));
    }

    #[test]
    fn recency_breaks_near_ties() {
        let batch = vec![
            candidate("A", "code 1111", None, Some("1111"), 0.6),
            candidate("B", "code 2222", None, Some("2222"), 0.6),
        ];
        let best = find_best_match(&batch, "nomatch").unwrap();
        assert_eq!(best.candidate.otp.as_deref(), Some("1111"));
    }

    #[test]
    fn zero_score_falls_back_to_most_confident() {
        // The most recent message carries no OTP, so the recency bonus never
        // lifts an OTP-bearing candidate above zero.
        let batch = vec![
            candidate("A", "order update, no code", None, None, 0.9),
            candidate("B", "2222", None, Some("2222"), 0.0),
            candidate("C", "3333", None, Some("3333"), 0.0),
        ];
        let best = find_best_match(&batch, "nomatch").unwrap();
        assert!(best.fallback_used);
        assert!(best.candidate.otp.is_some());
    }

    #[test]
    fn empty_batch_returns_none() {
        assert!(find_best_match(&[], "zomato").is_none());
    }

    #[test]
    fn mutual_containment_is_symmetric() {
        let batch = vec![candidate(
            "X",
            "bb code 5555",
            Some("bigbasket"),
            Some("5555"),
            0.7,
        )];
        // Target longer than detected company still matches.
        let best = find_best_match(&batch, "bigbasket daily").unwrap();
        assert!(!best.fallback_used);
        assert_eq!(best.candidate.otp.as_deref(), Some("5555"));
    }
}

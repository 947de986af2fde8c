use crate::model::{ChildProfile, NutrientRisk, RiskAssessment, RiskFlag, RiskLevel};

/// Condition terms that always send a child to a doctor before automated planning.
pub const CRITICAL_CONDITIONS: [&str; 6] = [
    "diabetes",
    "celiac",
    "renal",
    "kidney",
    "severe allergy",
    "anaphylaxis",
];

const NOTE_TRIGGERS: [&str; 2] = ["severe", "hospital"];

/// More flags than this is high risk even without a critical condition.
pub const MAX_FLAGS_BEFORE_HIGH: usize = 2;

pub const HIGH_RISK_REASON: &str =
    "High clinical risk detected. Direct doctor consultation required before AI planning.";
pub const MODERATE_RISK_REASON: &str =
    "Moderate risk. Plan generated with strict supervision flags.";
pub const LOW_RISK_REASON: &str = "Safe for AI generation.";

/// Deterministic risk gate over the profile and free-text doctor notes.
///
/// Never fails: malformed inputs simply contribute no flag. `deficiencies`
/// are carried for the caller's benefit and do not raise the level.
#[must_use]
pub fn assess_risk(
    profile: &ChildProfile,
    deficiencies: &[NutrientRisk],
    doctor_notes: &str,
) -> RiskAssessment {
    let mut flags = Vec::new();

    if let Some(weight) = leading_number(&profile.weight) {
        let age = f64::from(profile.age);
        if profile.age > 1 && weight < age.mul_add(2.0, 5.0) {
            flags.push(RiskFlag::PotentialUnderweight);
        }
    }

    let conditions: Vec<String> = profile.conditions.iter().map(|c| c.to_lowercase()).collect();
    for term in CRITICAL_CONDITIONS {
        if conditions.iter().any(|c| c.contains(term)) {
            flags.push(RiskFlag::CriticalCondition(term));
        }
    }

    let notes = doctor_notes.to_lowercase();
    if NOTE_TRIGGERS.iter().any(|t| notes.contains(t)) {
        flags.push(RiskFlag::RecentMedicalAttention);
    }

    log::debug!(
        "risk assessment: {} flag(s), {} deficiency(ies)",
        flags.len(),
        deficiencies.len()
    );

    if flags.iter().any(RiskFlag::is_critical) || flags.len() > MAX_FLAGS_BEFORE_HIGH {
        return RiskAssessment {
            risk_level: RiskLevel::High,
            flags,
            can_generate_plan: false,
            reason: HIGH_RISK_REASON.to_string(),
        };
    }
    if !flags.is_empty() {
        return RiskAssessment {
            risk_level: RiskLevel::Moderate,
            flags,
            can_generate_plan: true,
            reason: MODERATE_RISK_REASON.to_string(),
        };
    }
    RiskAssessment {
        risk_level: RiskLevel::Low,
        flags,
        can_generate_plan: true,
        reason: LOW_RISK_REASON.to_string(),
    }
}

/// Numeric prefix of the first whitespace-separated token: `"20 kg"` and `"20kg"` give 20.
fn leading_number(text: &str) -> Option<f64> {
    let token = text.split_whitespace().next()?;
    let end = token
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(token.len(), |(idx, _)| idx);
    token[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn weight_prefix_parsing() {
        assert_eq!(leading_number("20 kg"), Some(20.0));
        assert_eq!(leading_number("  14.5kg"), Some(14.5));
        assert_eq!(leading_number("abc"), None);
        assert_eq!(leading_number(""), None);
        assert_eq!(leading_number("nan"), None);
        assert_eq!(leading_number(".."), None);
    }

    #[test]
    fn clean_profile_is_low_risk() {
        let assessment = assess_risk(&ChildProfile::new(5, "20 kg"), &[], "");
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.flags.is_empty());
        assert!(assessment.can_generate_plan);
        assert_eq!(assessment.reason, LOW_RISK_REASON);
    }

    #[test]
    fn malformed_or_missing_weight_adds_no_flag() {
        for weight in ["abc", "", "unknown", "-"] {
            let assessment = assess_risk(&ChildProfile::new(8, weight), &[], "routine visit");
            assert_eq!(assessment.risk_level, RiskLevel::Low, "weight {weight:?}");
            assert!(assessment.flags.is_empty());
        }
    }

    #[test]
    fn underweight_alone_is_moderate() {
        // Threshold for age 6 is 17 kg.
        let assessment = assess_risk(&ChildProfile::new(6, "15 kg"), &[], "");
        assert_eq!(assessment.risk_level, RiskLevel::Moderate);
        assert_eq!(assessment.flags, vec![RiskFlag::PotentialUnderweight]);
        assert!(assessment.can_generate_plan);

        let at_threshold = assess_risk(&ChildProfile::new(6, "17 kg"), &[], "");
        assert!(at_threshold.flags.is_empty());
    }

    #[test]
    fn infants_skip_the_weight_rule() {
        let assessment = assess_risk(&ChildProfile::new(1, "3 kg"), &[], "");
        assert_eq!(assessment.risk_level, RiskLevel::Low);
    }

    #[test]
    fn single_critical_condition_is_high() {
        let profile = ChildProfile::new(7, "25 kg").with_conditions(["Type 1 Diabetes"]);
        let assessment = assess_risk(&profile, &[], "");
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(!assessment.can_generate_plan);
        assert_eq!(
            assessment.flags,
            vec![RiskFlag::CriticalCondition("diabetes")]
        );
        assert_eq!(assessment.reason, HIGH_RISK_REASON);
    }

    #[test]
    fn three_flags_are_high_in_rule_order() {
        let profile = ChildProfile::new(9, "30 kg").with_conditions(["Chronic kidney disease", "celiac"]);
        let assessment = assess_risk(&profile, &[], "Admitted to HOSPITAL last month");
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(!assessment.can_generate_plan);
        let rendered: Vec<String> = assessment.flags.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "Critical Condition: celiac",
                "Critical Condition: kidney",
                "Recent medical attention noted in doctor notes",
            ]
        );
    }

    #[test]
    fn underweight_plus_notes_is_moderate() {
        let assessment = assess_risk(&ChildProfile::new(4, "10"), &[], "severe cough last week");
        assert_eq!(assessment.risk_level, RiskLevel::Moderate);
        assert_eq!(assessment.flags.len(), 2);
        assert!(assessment.can_generate_plan);
    }

    #[test]
    fn gate_invariant_holds_across_inputs() {
        let notes = ["", "severe", "fine"];
        let conditions: [&[&str]; 3] = [&[], &["asthma"], &["renal issues"]];
        for weight in ["8 kg", "40 kg", "n/a"] {
            for note in notes {
                for condition in conditions {
                    let profile = ChildProfile::new(6, weight).with_conditions(condition.iter().copied());
                    let a = assess_risk(&profile, &[], note);
                    assert_eq!(a.can_generate_plan, a.risk_level != RiskLevel::High);
                    let high = a.flags.iter().any(RiskFlag::is_critical) || a.flags.len() > 2;
                    assert_eq!(a.risk_level == RiskLevel::High, high);
                }
            }
        }
    }
}

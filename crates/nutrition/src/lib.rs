//! # NutriKid Nutrition
//!
//! Deterministic screening of a child's diet: keyword-based nutrient gap
//! detection over meal logs and the clinical risk gate that decides whether
//! automated plan generation may proceed.
//!
//! Everything here is pure and total. Malformed inputs degrade to "no signal"
//! rather than errors.
//!
//! ```
//! use nutrikid_nutrition::{assess_risk, detect_deficiencies, ChildProfile, MealLogItem, RiskLevel};
//!
//! let meals = vec![MealLogItem::named("rice"), MealLogItem::named("dal curry")];
//! let deficiencies = detect_deficiencies(&meals, 5);
//! let assessment = assess_risk(&ChildProfile::new(5, "18 kg"), &deficiencies, "");
//! assert_eq!(assessment.risk_level, RiskLevel::Low);
//! ```

mod deficiency;
mod food_groups;
mod model;
mod risk;

pub use deficiency::{
    classify_gap, detect_deficiencies, format_gap, GAP_THRESHOLD, MEALS_PER_DAY, VERY_LOW_GAP,
};
pub use food_groups::{
    screen_food_groups, AnalysisReport, IntakeGap, IntakeMeal, FALLBACK_BALANCED_SUMMARY,
    FALLBACK_GAP_SUMMARY,
};
pub use model::{
    ChildProfile, MealLogItem, Nutrient, NutrientRisk, NutrientStatus, RiskAssessment, RiskFlag,
    RiskLevel,
};
pub use risk::{
    assess_risk, CRITICAL_CONDITIONS, HIGH_RISK_REASON, LOW_RISK_REASON, MAX_FLAGS_BEFORE_HIGH,
    MODERATE_RISK_REASON,
};

//! Keyword-heuristic nutrient gap detection over a window of meal logs.
//!
//! This is a food-group proxy, not a composition database: a meal "counts"
//! towards a nutrient when its name mentions a food known to be rich in it.

use crate::model::{MealLogItem, Nutrient, NutrientRisk, NutrientStatus};

/// Assumed meals per logged day.
pub const MEALS_PER_DAY: usize = 3;

/// Gaps at or below this many servings per day are not reported.
pub const GAP_THRESHOLD: f64 = 0.5;

/// Gaps below this many servings per day are `Low`; the rest are `Very Low`.
pub const VERY_LOW_GAP: f64 = 1.0;

impl Nutrient {
    /// Food keywords matched case-insensitively against meal names.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Iron => &[
                "spinach",
                "palak",
                "lentil",
                "dal",
                "meat",
                "chicken",
                "fish",
                "egg",
                "poha",
                "dates",
                "pomegranate",
                "jaggery",
            ],
            Self::Calcium => &["milk", "curd", "yogurt", "cheese", "paneer", "ragi", "almond"],
            Self::Protein => &[
                "dal", "egg", "chicken", "fish", "paneer", "soya", "nut", "sprout", "tofu", "gram",
            ],
            Self::VitaminC => &[
                "orange", "lemon", "guava", "tomato", "amla", "capsicum", "fruit", "berry",
            ],
            Self::Fiber => &[
                "oats",
                "fruit",
                "vegetable",
                "brown rice",
                "wheat",
                "wholegrain",
            ],
        }
    }

    /// Servings of a rich source expected per day.
    #[must_use]
    pub const fn daily_target(self) -> f64 {
        match self {
            Self::Calcium | Self::Protein => 2.0,
            Self::Iron | Self::VitaminC | Self::Fiber => 1.0,
        }
    }

    fn matches(self, lowered_meal: &str) -> bool {
        self.keywords().iter().any(|k| lowered_meal.contains(k))
    }
}

/// Classifies a daily serving gap. `None` means the gap is not significant.
#[must_use]
pub fn classify_gap(gap: f64) -> Option<NutrientStatus> {
    if gap <= GAP_THRESHOLD {
        return None;
    }
    if gap < VERY_LOW_GAP {
        Some(NutrientStatus::Low)
    } else {
        Some(NutrientStatus::VeryLow)
    }
}

/// Renders a gap the way clinicians read it, truncating toward zero.
#[must_use]
pub fn format_gap(gap: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let percent = (gap * 100.0) as i64;
    format!("-{percent}% of RDA")
}

/// Nutrients whose average daily intake over `meals` is short of target.
///
/// Results follow [`Nutrient::ALL`] order. The window length in days is
/// `max(1, meals / 3)`. `age` is accepted for when targets become age-indexed;
/// today every age shares the same targets.
#[must_use]
pub fn detect_deficiencies(meals: &[MealLogItem], age: u32) -> Vec<NutrientRisk> {
    let mut counts = [0usize; Nutrient::ALL.len()];
    for meal in meals {
        let name = meal.name.to_lowercase();
        for (slot, nutrient) in Nutrient::ALL.iter().enumerate() {
            if nutrient.matches(&name) {
                counts[slot] += 1;
            }
        }
    }

    let total_meals = meals.len().max(1);
    let days_logged = (total_meals / MEALS_PER_DAY).max(1);
    log::debug!(
        "deficiency scan: age {age}, {} meals over {days_logged} day(s)",
        meals.len()
    );

    #[allow(clippy::cast_precision_loss)]
    let days = days_logged as f64;
    Nutrient::ALL
        .iter()
        .zip(counts)
        .filter_map(|(nutrient, count)| {
            #[allow(clippy::cast_precision_loss)]
            let avg_intake = count as f64 / days;
            let gap = nutrient.daily_target() - avg_intake;
            classify_gap(gap).map(|status| NutrientRisk {
                nutrient: *nutrient,
                status,
                gap: format_gap(gap),
            })
        })
        .collect()
}

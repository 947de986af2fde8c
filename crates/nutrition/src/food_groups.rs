//! Single-day food-group screen used when model-based intake analysis is unavailable.

use serde::{Deserialize, Serialize};

pub const FALLBACK_GAP_SUMMARY: &str = "Basic analysis based on food groups (AI unavailable).";
pub const FALLBACK_BALANCED_SUMMARY: &str = "Diet looks balanced based on food groups.";

const SCORE_PER_GAP: u32 = 15;
const SCORE_FLOOR: u32 = 40;

/// A meal eaten today, as submitted for intake analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeMeal {
    pub name: String,
    #[serde(default = "default_portion")]
    pub portion: String,
}

fn default_portion() -> String {
    "1 serving".to_string()
}

impl IntakeMeal {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portion: default_portion(),
        }
    }
}

/// One nutrient shortfall in an intake report.
///
/// Fields are free text because model-produced reports use their own wording
/// (`"3mg"`, `"Very Low"`), and the food-group screen fills them the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeGap {
    pub nutrient: String,
    pub status: String,
    #[serde(default)]
    pub current_estimated: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_summary: String,
    #[serde(default)]
    pub deficiencies: Vec<IntakeGap>,
    pub score: u32,
}

struct FoodGroup {
    nutrient: &'static str,
    status: &'static str,
    target: &'static str,
    suggestion: &'static str,
    keywords: &'static [&'static str],
}

const FOOD_GROUPS: [FoodGroup; 4] = [
    FoodGroup {
        nutrient: "Iron",
        status: "Low",
        target: "10mg",
        suggestion: "Add spinach, dal, or eggs",
        keywords: &[
            "palak",
            "spinach",
            "lentil",
            "dal",
            "meat",
            "chicken",
            "fish",
            "egg",
            "poha",
            "dates",
            "pomegranate",
        ],
    },
    FoodGroup {
        nutrient: "Calcium",
        status: "Low",
        target: "600mg",
        suggestion: "Add a glass of milk or curd",
        keywords: &["milk", "curd", "yogurt", "cheese", "paneer", "ragi"],
    },
    FoodGroup {
        nutrient: "Vitamin C",
        status: "Moderate",
        target: "40mg",
        suggestion: "Add orange or guava",
        keywords: &[
            "orange", "lemon", "guava", "tomato", "amla", "capsicum", "fruit",
        ],
    },
    FoodGroup {
        nutrient: "Protein",
        status: "Low",
        target: "20g",
        suggestion: "Add lentils/dal or eggs",
        keywords: &[
            "dal", "egg", "chicken", "fish", "paneer", "soya", "nut", "sprout",
        ],
    },
];

/// Flags a food group when none of its keywords appear anywhere in today's meals.
///
/// Keywords are matched against all lowercased meal names joined by spaces, so
/// a keyword may span two adjacent names.
#[must_use]
pub fn screen_food_groups(meals: &[IntakeMeal]) -> AnalysisReport {
    let eaten = meals
        .iter()
        .map(|m| m.name.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let deficiencies: Vec<IntakeGap> = FOOD_GROUPS
        .iter()
        .filter(|group| !group.keywords.iter().any(|k| eaten.contains(k)))
        .map(|group| IntakeGap {
            nutrient: group.nutrient.to_string(),
            status: group.status.to_string(),
            current_estimated: "Low".to_string(),
            target: group.target.to_string(),
            suggestion: group.suggestion.to_string(),
        })
        .collect();

    let penalty = u32::try_from(deficiencies.len())
        .unwrap_or(u32::MAX)
        .saturating_mul(SCORE_PER_GAP);
    let analysis_summary = if deficiencies.is_empty() {
        FALLBACK_BALANCED_SUMMARY
    } else {
        FALLBACK_GAP_SUMMARY
    };

    AnalysisReport {
        analysis_summary: analysis_summary.to_string(),
        score: 100u32.saturating_sub(penalty).max(SCORE_FLOOR),
        deficiencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn intake(names: &[&str]) -> Vec<IntakeMeal> {
        names.iter().map(|n| IntakeMeal::new(*n)).collect()
    }

    #[test]
    fn nothing_eaten_flags_every_group() {
        let report = screen_food_groups(&[]);
        let nutrients: Vec<&str> = report.deficiencies.iter().map(|g| g.nutrient.as_str()).collect();
        assert_eq!(nutrients, vec!["Iron", "Calcium", "Vitamin C", "Protein"]);
        assert_eq!(report.score, 40);
        assert_eq!(report.analysis_summary, FALLBACK_GAP_SUMMARY);
        assert_eq!(report.deficiencies[2].status, "Moderate");
        assert!(report.deficiencies.iter().all(|g| g.current_estimated == "Low"));
    }

    #[test]
    fn balanced_day_scores_full_marks() {
        let report = screen_food_groups(&intake(&["Palak Paneer", "Orange juice", "Moong dal"]));
        assert!(report.deficiencies.is_empty());
        assert_eq!(report.score, 100);
        assert_eq!(report.analysis_summary, FALLBACK_BALANCED_SUMMARY);
    }

    #[test]
    fn partial_day_loses_fifteen_per_gap() {
        let report = screen_food_groups(&intake(&["Rice", "Glass of milk"]));
        let nutrients: Vec<&str> = report.deficiencies.iter().map(|g| g.nutrient.as_str()).collect();
        assert_eq!(nutrients, vec!["Iron", "Vitamin C", "Protein"]);
        assert_eq!(report.score, 55);
        assert_eq!(
            report.deficiencies[0],
            IntakeGap {
                nutrient: "Iron".to_string(),
                status: "Low".to_string(),
                current_estimated: "Low".to_string(),
                target: "10mg".to_string(),
                suggestion: "Add spinach, dal, or eggs".to_string(),
            }
        );
    }

    #[test]
    fn portion_defaults_to_one_serving() {
        let meal: IntakeMeal = serde_json::from_str(r#"{"name": "idli"}"#).unwrap();
        assert_eq!(meal.portion, "1 serving");
    }
}

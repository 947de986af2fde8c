use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Child the request is about. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub age: u32,
    /// Free text such as `"20 kg"`. Unparseable values are ignored by the risk engine.
    #[serde(default)]
    pub weight: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Dietary preferences, e.g. `veg`, `non-veg`, `budget-low`.
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default = "default_activity_level")]
    pub activity_level: String,
}

fn default_gender() -> String {
    "neutral".to_string()
}

fn default_activity_level() -> String {
    "moderate".to_string()
}

impl ChildProfile {
    #[must_use]
    pub fn new(age: u32, weight: impl Into<String>) -> Self {
        Self {
            age,
            weight: weight.into(),
            gender: default_gender(),
            conditions: Vec::new(),
            allergies: Vec::new(),
            preferences: Vec::new(),
            activity_level: default_activity_level(),
        }
    }

    #[must_use]
    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions = conditions.into_iter().map(Into::into).collect();
        self
    }
}

/// One logged meal, as supplied by the meal log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealLogItem {
    pub name: String,
    #[serde(default)]
    pub portion: String,
    #[serde(default)]
    pub date: String,
    /// `Breakfast`, `Lunch`, `Dinner` or `Snack`.
    #[serde(default)]
    pub meal_type: String,
}

impl MealLogItem {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portion: String::new(),
            date: String::new(),
            meal_type: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nutrient {
    Iron,
    Calcium,
    Protein,
    #[serde(rename = "Vitamin C")]
    VitaminC,
    Fiber,
}

impl Nutrient {
    pub const ALL: [Self; 5] = [
        Self::Iron,
        Self::Calcium,
        Self::Protein,
        Self::VitaminC,
        Self::Fiber,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iron => "Iron",
            Self::Calcium => "Calcium",
            Self::Protein => "Protein",
            Self::VitaminC => "Vitamin C",
            Self::Fiber => "Fiber",
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NutrientStatus {
    Low,
    #[serde(rename = "Very Low")]
    VeryLow,
}

impl fmt::Display for NutrientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        })
    }
}

/// A nutrient whose average daily intake falls materially short of target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientRisk {
    pub nutrient: Nutrient,
    pub status: NutrientStatus,
    /// Shortfall as `-N% of RDA`.
    pub gap: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule the risk engine fired. Serialized as its display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskFlag {
    PotentialUnderweight,
    CriticalCondition(&'static str),
    RecentMedicalAttention,
}

impl RiskFlag {
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::CriticalCondition(_))
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PotentialUnderweight => f.write_str("Potential Underweight (red flag)"),
            Self::CriticalCondition(term) => write!(f, "Critical Condition: {term}"),
            Self::RecentMedicalAttention => {
                f.write_str("Recent medical attention noted in doctor notes")
            }
        }
    }
}

impl Serialize for RiskFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of the risk gate.
///
/// `can_generate_plan` is false exactly when `risk_level` is [`RiskLevel::High`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub flags: Vec<RiskFlag>,
    pub can_generate_plan: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn profile_defaults_fill_missing_fields() {
        let profile: ChildProfile = serde_json::from_value(json!({"age": 4})).unwrap();
        assert_eq!(profile, ChildProfile::new(4, ""));
        assert_eq!(profile.gender, "neutral");
        assert_eq!(profile.activity_level, "moderate");
    }

    #[test]
    fn wire_names_match_clinical_vocabulary() {
        let risk = NutrientRisk {
            nutrient: Nutrient::VitaminC,
            status: NutrientStatus::VeryLow,
            gap: "-100% of RDA".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&risk).unwrap(),
            json!({"nutrient": "Vitamin C", "status": "Very Low", "gap": "-100% of RDA"})
        );

        let assessment = RiskAssessment {
            risk_level: RiskLevel::High,
            flags: vec![RiskFlag::CriticalCondition("celiac")],
            can_generate_plan: false,
            reason: "r".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&assessment).unwrap(),
            json!({
                "risk_level": "HIGH",
                "flags": ["Critical Condition: celiac"],
                "can_generate_plan": false,
                "reason": "r"
            })
        );
    }
}

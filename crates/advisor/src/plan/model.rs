use nutrikid_nutrition::{ChildProfile, MealLogItem, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_DURATION_DAYS: u32 = 7;
pub const MAX_DURATION_DAYS: u32 = 30;

/// Days of a plan, keyed by 1-based day number and serialized as `"day_N"`.
pub type DaySchedule = BTreeMap<u32, DayPlan>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub child_profile: ChildProfile,
    #[serde(default)]
    pub meal_logs: Vec<MealLogItem>,
    #[serde(default = "default_duration")]
    pub duration_days: u32,
    #[serde(default)]
    pub doctor_notes: Option<String>,
}

const fn default_duration() -> u32 {
    DEFAULT_DURATION_DAYS
}

/// Requested plan length forced into `1..=30`.
#[must_use]
pub fn clamp_duration(days: u32) -> u32 {
    days.clamp(1, MAX_DURATION_DAYS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Generated,
    RequiresDoctorReview,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(default)]
    pub breakfast: String,
    #[serde(default)]
    pub lunch: String,
    #[serde(default)]
    pub dinner: String,
    #[serde(default)]
    pub snacks: String,
    #[serde(default)]
    pub nutrient_focus: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub clinical_overview: String,
    pub risk_flags: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietPlanResponse {
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub priority_focus: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_summary: Option<String>,
    #[serde(default)]
    pub expected_improvements: BTreeMap<String, String>,
    #[serde(default)]
    pub plan_score: BTreeMap<String, i64>,
    #[serde(default, with = "day_keys")]
    pub days: DaySchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_summary: Option<DoctorSummary>,
}

impl DietPlanResponse {
    /// A response carrying only status, level and focus; the rest is empty.
    #[must_use]
    pub fn bare(status: PlanStatus, risk_level: RiskLevel, priority_focus: Vec<String>) -> Self {
        Self {
            status,
            reason: None,
            risk_level,
            priority_focus,
            weekly_summary: None,
            expected_improvements: BTreeMap::new(),
            plan_score: BTreeMap::new(),
            days: DaySchedule::new(),
            doctor_summary: None,
        }
    }
}

/// `"day_N"` map keys. Keys without a positive day number are dropped on read.
pub mod day_keys {
    use super::{DayPlan, DaySchedule};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(days: &DaySchedule, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(days.iter().map(|(n, day)| (format!("day_{n}"), day)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DaySchedule, D::Error> {
        let raw: BTreeMap<String, DayPlan> = BTreeMap::deserialize(deserializer)?;
        let mut days = DaySchedule::new();
        for (key, day) in raw {
            match parse_day_key(&key) {
                Some(n) => {
                    days.insert(n, day);
                }
                None => log::warn!("Dropping plan entry with unrecognised key {key:?}"),
            }
        }
        Ok(days)
    }

    #[must_use]
    pub fn parse_day_key(key: &str) -> Option<u32> {
        key.trim()
            .to_ascii_lowercase()
            .strip_prefix("day_")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n >= 1)
    }
}

/// Plan fields as the model writes them. Missing pieces get defaults later.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct PlanDraft {
    #[serde(default)]
    pub weekly_summary: Option<String>,
    #[serde(default)]
    pub expected_improvements: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub plan_score: Option<BTreeMap<String, i64>>,
    #[serde(default, deserialize_with = "day_keys::deserialize")]
    pub days: DaySchedule,
}

impl PlanDraft {
    pub(crate) fn unparseable() -> Self {
        Self {
            weekly_summary: Some(super::PARSE_FAILURE_SUMMARY.to_string()),
            ..Self::default()
        }
    }
}

//! Gated multi-day diet plan generation.

mod model;
mod orchestrator;
mod prompt;
mod state;

pub use model::{
    clamp_duration, day_keys, DayPlan, DaySchedule, DietPlanResponse, DoctorSummary, PlanRequest,
    PlanStatus, DEFAULT_DURATION_DAYS, MAX_DURATION_DAYS,
};
pub use orchestrator::{generate_plan, repair_days, PlanOrchestrator, PlanOutcome};
pub use state::{PlanRun, PlanState};

pub const PARSE_FAILURE_SUMMARY: &str = "Error parsing plan.";
pub const DEFAULT_WEEKLY_SUMMARY: &str = "Plan generated.";
pub const DOCTOR_RECOMMENDATION: &str = "Approve for 2-week trial.";
pub const GENERATION_FAILED_PREFIX: &str = "AI Generation Failed: ";

/// Scores reported when the model omits `plan_score`.
pub const DEFAULT_PLAN_SCORE: [(&str, i64); 3] = [
    ("nutrition_score", 80),
    ("diversity_score", 80),
    ("overall_score", 80),
];

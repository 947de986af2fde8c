use super::model::{
    clamp_duration, DaySchedule, DietPlanResponse, DoctorSummary, PlanDraft, PlanRequest,
    PlanStatus,
};
use super::prompt::plan_prompt;
use super::state::{PlanRun, PlanState};
use super::{
    DEFAULT_PLAN_SCORE, DEFAULT_WEEKLY_SUMMARY, DOCTOR_RECOMMENDATION, GENERATION_FAILED_PREFIX,
};
use crate::context::AdvisorContext;
use crate::error::Result;
use nutrikid_generation::{parse_structured, CompletionRequest, ResponseFormat};
use nutrikid_nutrition::{
    assess_risk, detect_deficiencies, ChildProfile, NutrientRisk, RiskAssessment,
};
use serde::Serialize;

/// Final response plus the states it passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub response: DietPlanResponse,
    pub trace: Vec<PlanState>,
}

impl PlanOutcome {
    #[must_use]
    pub fn final_state(&self) -> PlanState {
        self.trace.last().copied().unwrap_or(PlanState::Init)
    }
}

/// Runs a gated plan request against the context's generation backend.
pub struct PlanOrchestrator<'a> {
    ctx: &'a AdvisorContext,
}

impl<'a> PlanOrchestrator<'a> {
    #[must_use]
    pub const fn new(ctx: &'a AdvisorContext) -> Self {
        Self { ctx }
    }

    /// Drives one request to a terminal state.
    ///
    /// The backend is called at most once, and never when the assessment
    /// forbids plan generation.
    pub async fn run(
        &self,
        profile: &ChildProfile,
        deficiencies: &[NutrientRisk],
        assessment: &RiskAssessment,
        duration_days: u32,
        doctor_notes: &str,
    ) -> Result<PlanOutcome> {
        let mut run = PlanRun::new();
        let focus: Vec<String> = deficiencies
            .iter()
            .map(|d| d.nutrient.to_string())
            .collect();
        let duration = clamp_duration(duration_days);
        if duration != duration_days {
            log::warn!("Plan duration {duration_days} clamped to {duration}");
        }

        run.advance(PlanState::Gate)?;
        if !assessment.can_generate_plan {
            log::info!(
                "Plan blocked by risk gate ({}, {} flag(s))",
                assessment.risk_level,
                assessment.flags.len()
            );
            run.advance(PlanState::Skipped)?;
            let mut response = DietPlanResponse::bare(
                PlanStatus::RequiresDoctorReview,
                assessment.risk_level,
                focus,
            );
            response.reason = Some(assessment.reason.clone());
            return Ok(PlanOutcome {
                response,
                trace: run.into_trace(),
            });
        }

        run.advance(PlanState::Generating)?;
        let sampling = self.ctx.settings().plan;
        let request = CompletionRequest::prompt(
            plan_prompt(profile, deficiencies, duration, doctor_notes),
            sampling.max_tokens,
            sampling.temperature,
        )
        .with_response_format(ResponseFormat::JsonObject);

        let text = match self.ctx.complete(request).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("Plan generation failed: {err}");
                run.advance(PlanState::Failed)?;
                let mut response =
                    DietPlanResponse::bare(PlanStatus::Failed, assessment.risk_level, focus);
                response.reason = Some(format!("{GENERATION_FAILED_PREFIX}{err}"));
                return Ok(PlanOutcome {
                    response,
                    trace: run.into_trace(),
                });
            }
        };

        run.advance(PlanState::Parsing)?;
        let draft = parse_structured::<PlanDraft>(&text).unwrap_or_else(|err| {
            log::warn!("Plan reply could not be parsed ({err}); returning fallback plan");
            PlanDraft::unparseable()
        });
        let response = finish_plan(draft, assessment, focus, duration, deficiencies.len());
        run.advance(PlanState::Done)?;

        Ok(PlanOutcome {
            response,
            trace: run.into_trace(),
        })
    }
}

/// Detects deficiencies, assesses risk and orchestrates one plan request.
pub async fn generate_plan(ctx: &AdvisorContext, request: &PlanRequest) -> Result<PlanOutcome> {
    let profile = &request.child_profile;
    let notes = request.doctor_notes.as_deref().unwrap_or_default();
    let deficiencies = detect_deficiencies(&request.meal_logs, profile.age);
    let assessment = assess_risk(profile, &deficiencies, notes);
    PlanOrchestrator::new(ctx)
        .run(
            profile,
            &deficiencies,
            &assessment,
            request.duration_days,
            notes,
        )
        .await
}

fn finish_plan(
    draft: PlanDraft,
    assessment: &RiskAssessment,
    focus: Vec<String>,
    duration: u32,
    deficiency_count: usize,
) -> DietPlanResponse {
    let plan_score = draft.plan_score.unwrap_or_else(|| {
        DEFAULT_PLAN_SCORE
            .iter()
            .map(|(name, score)| ((*name).to_string(), *score))
            .collect()
    });

    DietPlanResponse {
        status: PlanStatus::Generated,
        reason: None,
        risk_level: assessment.risk_level,
        priority_focus: focus,
        weekly_summary: Some(
            draft
                .weekly_summary
                .unwrap_or_else(|| DEFAULT_WEEKLY_SUMMARY.to_string()),
        ),
        expected_improvements: draft.expected_improvements.unwrap_or_default(),
        plan_score,
        days: repair_days(draft.days, duration),
        doctor_summary: Some(DoctorSummary {
            clinical_overview: format!(
                "Plan targets {deficiency_count} deficiencies with calorie balanced Indian meals."
            ),
            risk_flags: vec![assessment.risk_level.to_string()],
            recommendation: DOCTOR_RECOMMENDATION.to_string(),
        }),
    }
}

/// Reshapes parsed days into exactly `day_1..=day_duration`.
///
/// Out-of-range days are dropped and missing days are filled by cycling the
/// parsed ones. With nothing parsed the schedule stays empty.
#[must_use]
pub fn repair_days(days: DaySchedule, duration: u32) -> DaySchedule {
    if days.is_empty() {
        return days;
    }
    let (in_range, out_of_range): (DaySchedule, DaySchedule) = days
        .into_iter()
        .partition(|(n, _)| (1..=duration).contains(n));
    if in_range.len() == usize::try_from(duration).unwrap_or(usize::MAX) {
        return in_range;
    }
    log::warn!(
        "Repairing plan days: {} in range, {} out of range, {duration} expected",
        in_range.len(),
        out_of_range.len()
    );

    let pool: Vec<_> = if in_range.is_empty() {
        out_of_range.values().cloned().collect()
    } else {
        in_range.values().cloned().collect()
    };
    (1..=duration)
        .zip((0..pool.len()).cycle())
        .map(|(n, slot)| {
            let day = in_range.get(&n).unwrap_or(&pool[slot]).clone();
            (n, day)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{context_with, ScriptedBackend};
    use crate::plan::model::DayPlan;
    use crate::plan::PARSE_FAILURE_SUMMARY;
    use nutrikid_nutrition::{MealLogItem, RiskLevel, HIGH_RISK_REASON};
    use nutrikid_retrieval::Retrieval;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn day(breakfast: &str) -> DayPlan {
        DayPlan {
            breakfast: breakfast.to_string(),
            ..DayPlan::default()
        }
    }

    fn request(profile: ChildProfile, notes: &str, duration_days: u32) -> PlanRequest {
        PlanRequest {
            child_profile: profile,
            meal_logs: vec![MealLogItem::named("rice"), MealLogItem::named("dal curry")],
            duration_days,
            doctor_notes: Some(notes.to_string()),
        }
    }

    fn healthy() -> ChildProfile {
        ChildProfile::new(5, "20 kg")
    }

    fn plan_reply(days: &[u32]) -> String {
        let days: Vec<String> = days
            .iter()
            .map(|n| format!("\"day_{n}\": {{\"breakfast\": \"b{n}\", \"lunch\": \"l\", \"dinner\": \"d\", \"snacks\": \"s\", \"nutrient_focus\": [\"Iron\"]}}"))
            .collect();
        format!(
            "```json\n{{\"weekly_summary\": \"Iron first.\", \"expected_improvements\": {{\"Iron\": \"High\"}}, \"plan_score\": {{\"nutrition_score\": 90, \"diversity_score\": 85, \"overall_score\": 88}}, \"days\": {{{}}}}}\n```",
            days.join(", ")
        )
    }

    #[tokio::test]
    async fn high_risk_skips_generation_entirely() {
        let backend = ScriptedBackend::replying(&plan_reply(&[1]));
        let ctx = context_with(Retrieval::unavailable(), backend.clone());
        let profile = healthy().with_conditions(["Celiac disease"]);

        let outcome = generate_plan(&ctx, &request(profile, "", 7)).await.unwrap();

        assert_eq!(backend.calls(), 0);
        assert_eq!(
            outcome.trace,
            vec![PlanState::Init, PlanState::Gate, PlanState::Skipped]
        );
        let response = outcome.response;
        assert_eq!(response.status, PlanStatus::RequiresDoctorReview);
        assert_eq!(response.risk_level, RiskLevel::High);
        assert_eq!(response.reason.as_deref(), Some(HIGH_RISK_REASON));
        assert_eq!(
            response.priority_focus,
            vec!["Calcium", "Protein", "Vitamin C", "Fiber"]
        );
        assert!(response.days.is_empty());
        assert!(response.doctor_summary.is_none());
    }

    #[tokio::test]
    async fn generated_plan_carries_parsed_fields_and_local_summary() {
        let backend = ScriptedBackend::replying(&plan_reply(&[1, 2, 3]));
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let outcome = generate_plan(&ctx, &request(healthy(), "", 3)).await.unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(outcome.final_state(), PlanState::Done);
        let sent = backend.last_request().unwrap();
        assert_eq!(sent.max_tokens, 1500);
        assert_eq!(sent.response_format, Some(ResponseFormat::JsonObject));

        let response = outcome.response;
        assert_eq!(response.status, PlanStatus::Generated);
        assert_eq!(response.risk_level, RiskLevel::Low);
        assert_eq!(response.weekly_summary.as_deref(), Some("Iron first."));
        assert_eq!(response.plan_score["overall_score"], 88);
        assert_eq!(response.days.len(), 3);
        assert_eq!(
            response.doctor_summary,
            Some(DoctorSummary {
                clinical_overview:
                    "Plan targets 4 deficiencies with calorie balanced Indian meals.".to_string(),
                risk_flags: vec!["LOW".to_string()],
                recommendation: "Approve for 2-week trial.".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn moderate_risk_still_generates() {
        let backend = ScriptedBackend::replying(&plan_reply(&[1]));
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let outcome = generate_plan(&ctx, &request(healthy(), "Hospital visit in May", 1))
            .await
            .unwrap();
        assert_eq!(backend.calls(), 1);
        assert_eq!(outcome.response.risk_level, RiskLevel::Moderate);
        assert_eq!(outcome.response.status, PlanStatus::Generated);
        assert!(backend.last_request().unwrap().messages[0]
            .content
            .contains("Hospital visit in May"));
    }

    #[tokio::test]
    async fn prose_reply_yields_typed_fallback() {
        let backend = ScriptedBackend::replying("I'm sorry, I cannot produce a plan today.");
        let ctx = context_with(Retrieval::unavailable(), backend);

        let outcome = generate_plan(&ctx, &request(healthy(), "", 7)).await.unwrap();
        let response = outcome.response;

        assert_eq!(outcome.trace.last(), Some(&PlanState::Done));
        assert_eq!(response.status, PlanStatus::Generated);
        assert_eq!(response.weekly_summary.as_deref(), Some(PARSE_FAILURE_SUMMARY));
        assert!(response.days.is_empty());
        assert!(response.expected_improvements.is_empty());
        assert_eq!(response.plan_score["nutrition_score"], 80);
        assert_eq!(response.plan_score.len(), 3);
        assert_eq!(response.priority_focus.len(), 4);
    }

    #[tokio::test]
    async fn missing_optional_fields_take_defaults() {
        let backend = ScriptedBackend::replying("{\"days\": {\"day_1\": {\"breakfast\": \"upma\"}}}");
        let ctx = context_with(Retrieval::unavailable(), backend);

        let response = generate_plan(&ctx, &request(healthy(), "", 2))
            .await
            .unwrap()
            .response;
        assert_eq!(response.weekly_summary.as_deref(), Some("Plan generated."));
        assert_eq!(response.plan_score["diversity_score"], 80);
        assert_eq!(response.days.len(), 2);
        assert_eq!(response.days[&2].breakfast, "upma");
    }

    #[tokio::test]
    async fn backend_error_fails_with_prefixed_reason() {
        let backend = ScriptedBackend::failing("HTTP 500");
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let outcome = generate_plan(&ctx, &request(healthy(), "", 7)).await.unwrap();
        assert_eq!(backend.calls(), 1);
        assert_eq!(
            outcome.trace,
            vec![
                PlanState::Init,
                PlanState::Gate,
                PlanState::Generating,
                PlanState::Failed
            ]
        );
        let reason = outcome.response.reason.unwrap();
        assert!(reason.starts_with("AI Generation Failed: "), "{reason}");
        assert!(reason.contains("HTTP 500"));
        assert_eq!(outcome.response.status, PlanStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_once() {
        let backend = ScriptedBackend::hanging(Duration::from_secs(600));
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let outcome = generate_plan(&ctx, &request(healthy(), "", 7)).await.unwrap();
        assert_eq!(backend.calls(), 1);
        assert_eq!(outcome.response.status, PlanStatus::Failed);
        let reason = outcome.response.reason.unwrap();
        assert!(reason.contains("timed out"), "{reason}");
    }

    #[tokio::test]
    async fn duration_is_clamped_before_prompting() {
        let backend = ScriptedBackend::replying(&plan_reply(&[1]));
        let ctx = context_with(Retrieval::unavailable(), backend.clone());

        let response = generate_plan(&ctx, &request(healthy(), "", 45))
            .await
            .unwrap()
            .response;
        assert_eq!(response.days.len(), 30);
        assert!(backend.last_request().unwrap().messages[0]
            .content
            .contains("30-day meal plan"));
    }

    #[test]
    fn repair_fills_gaps_by_cycling() {
        let days: DaySchedule = [(1, day("a")), (2, day("b"))].into_iter().collect();
        let repaired = repair_days(days, 5);
        let breakfasts: Vec<&str> = repaired.values().map(|d| d.breakfast.as_str()).collect();
        assert_eq!(breakfasts, vec!["a", "b", "a", "b", "a"]);
        assert_eq!(repaired.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn repair_drops_out_of_range_days() {
        let days: DaySchedule = [(1, day("a")), (2, day("b")), (9, day("z"))]
            .into_iter()
            .collect();
        let repaired = repair_days(days, 2);
        assert_eq!(repaired.len(), 2);
        assert!(repaired.values().all(|d| d.breakfast != "z"));
    }

    #[test]
    fn repair_reuses_out_of_range_days_when_nothing_fits() {
        let days: DaySchedule = [(8, day("x"))].into_iter().collect();
        let repaired = repair_days(days, 3);
        assert_eq!(repaired.len(), 3);
        assert!(repaired.values().all(|d| d.breakfast == "x"));
    }

    #[test]
    fn repair_keeps_existing_days_in_place() {
        let days: DaySchedule = [(1, day("a")), (3, day("c"))].into_iter().collect();
        let repaired = repair_days(days, 3);
        let breakfasts: Vec<&str> = repaired.values().map(|d| d.breakfast.as_str()).collect();
        assert_eq!(breakfasts, vec!["a", "c", "c"]);
    }

    #[test]
    fn empty_schedule_is_left_alone() {
        assert!(repair_days(DaySchedule::new(), 7).is_empty());
    }
}

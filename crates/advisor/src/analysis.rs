//! Same-day intake analysis with a deterministic food-group fallback.

use crate::context::AdvisorContext;
use nutrikid_generation::{parse_structured, CompletionRequest};
use nutrikid_nutrition::{screen_food_groups, AnalysisReport, IntakeMeal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub age: u32,
    #[serde(default = "default_gender")]
    pub gender: String,
    pub meals: Vec<IntakeMeal>,
}

fn default_gender() -> String {
    "neutral".to_string()
}

/// Analyses today's intake with the model, falling back to [`screen_food_groups`]
/// on any backend error or unusable reply.
pub async fn analyze_intake(ctx: &AdvisorContext, request: &AnalysisRequest) -> AnalysisReport {
    let sampling = ctx.settings().analysis;
    let completion = CompletionRequest::prompt(
        analysis_prompt(request),
        sampling.max_tokens,
        sampling.temperature,
    );

    match ctx.complete(completion).await {
        Ok(text) => match parse_structured::<AnalysisReport>(&text) {
            Ok(report) => report,
            Err(err) => {
                log::warn!("Unusable intake analysis from model ({err}); using food-group screen");
                screen_food_groups(&request.meals)
            }
        },
        Err(err) => {
            log::warn!("Intake analysis generation failed ({err}); using food-group screen");
            screen_food_groups(&request.meals)
        }
    }
}

fn analysis_prompt(request: &AnalysisRequest) -> String {
    let intake = request
        .meals
        .iter()
        .map(|meal| format!("{} ({})", meal.name, meal.portion))
        .collect::<Vec<_>>()
        .join(", ");
    let age = request.age;

    format!(
        r#"You are a clinical pediatric nutritionist.
Explain the micronutrient gaps in this child's intake today against the Recommended Dietary Allowance (RDA) for a {age} year old ({gender}).

Intake today: {intake}

Task:
1. Estimate the micronutrient content (Iron, Calcium, Vit A, Vit C, Vit D, Zinc, Magnesium).
2. Compare against the RDA for age {age}.
3. Identify SUBSTANTIAL deficiencies.
4. For each gap, suggest one specific food to add.

Reply strictly as JSON:
```json
{{
  "analysis_summary": "Short clinical summary (max 2 sentences).",
  "deficiencies": [
    {{
      "nutrient": "Iron",
      "status": "Low" | "Very Low",
      "current_estimated": "3mg",
      "target": "10mg",
      "suggestion": "Add spinach or lentils"
    }}
  ],
  "score": 85
}}
```
Do not include any text outside the JSON block.
"#,
        gender = request.gender,
    )
}

use nutrikid_nutrition::{ChildProfile, NutrientRisk};

fn joined_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

pub(crate) fn plan_prompt(
    profile: &ChildProfile,
    deficiencies: &[NutrientRisk],
    duration: u32,
    doctor_notes: &str,
) -> String {
    let weight = if profile.weight.trim().is_empty() {
        "Unknown"
    } else {
        profile.weight.as_str()
    };
    let priorities = if deficiencies.is_empty() {
        "None detected".to_string()
    } else {
        deficiencies
            .iter()
            .map(|d| format!("{} ({})", d.nutrient, d.gap))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let notes = if doctor_notes.trim().is_empty() {
        "None"
    } else {
        doctor_notes
    };

    format!(
        r#"You are an expert pediatric clinical dietitian.

TASK: Create a personalized {duration}-day meal plan.

Patient profile:
- Age: {age}
- Weight: {weight}
- Gender: {gender}
- Activity level: {activity}
- Conditions: {conditions}
- Allergies: {allergies}
- Diet preferences: {preferences}

Clinically identified deficiencies (PRIORITY):
{priorities}

Doctor notes: {notes}

RULES:
1. STRICTLY follow the dietary preferences (veg / non-veg) and avoid every allergen.
2. Suggest simple, nutritious Indian home-cooked meals.
3. Use specific foods that fix the deficiencies (e.g. ragi for calcium).
4. Distribute calories: breakfast heavy, lunch balanced, dinner light.
5. Output JSON ONLY.

JSON SCHEMA:
{{
  "weekly_summary": "Short clinical summary of the plan strategy.",
  "expected_improvements": {{ "Iron": "High", "Calcium": "Moderate" }},
  "plan_score": {{ "nutrition_score": 85, "diversity_score": 90, "overall_score": 88 }},
  "days": {{
    "day_1": {{
      "breakfast": "Description",
      "lunch": "Description",
      "dinner": "Description",
      "snacks": "Description",
      "nutrient_focus": ["Iron", "Fiber"]
    }}
  }}
}}
Include every key from "day_1" to "day_{duration}".
"#,
        age = profile.age,
        gender = profile.gender,
        activity = profile.activity_level,
        conditions = joined_or(&profile.conditions, "None"),
        allergies = joined_or(&profile.allergies, "None"),
        preferences = joined_or(&profile.preferences, "Balanced"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrikid_nutrition::{Nutrient, NutrientStatus};

    #[test]
    fn prompt_lists_profile_deficiencies_and_duration() {
        let mut profile = ChildProfile::new(6, "");
        profile.allergies = vec!["peanut".to_string()];
        profile.preferences = vec!["veg".to_string()];
        let deficiencies = [NutrientRisk {
            nutrient: Nutrient::Calcium,
            status: NutrientStatus::VeryLow,
            gap: "-200% of RDA".to_string(),
        }];

        let prompt = plan_prompt(&profile, &deficiencies, 5, "  ");
        assert!(prompt.contains("5-day meal plan"));
        assert!(prompt.contains("- Weight: Unknown"));
        assert!(prompt.contains("- Allergies: peanut"));
        assert!(prompt.contains("- Diet preferences: veg"));
        assert!(prompt.contains("- Conditions: None"));
        assert!(prompt.contains("Calcium (-200% of RDA)"));
        assert!(prompt.contains("Doctor notes: None"));
        assert!(prompt.contains("\"day_5\""));
    }

    #[test]
    fn empty_preferences_read_as_balanced() {
        let prompt = plan_prompt(&ChildProfile::new(3, "14 kg"), &[], 7, "");
        assert!(prompt.contains("- Diet preferences: Balanced"));
        assert!(prompt.contains("None detected"));
    }
}

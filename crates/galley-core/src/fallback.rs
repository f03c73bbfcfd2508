//! Local fallback generators
//!
//! - [`PantrySynthesizer`] builds a protocol from a fixed template when the
//!   remote synthesis path is unavailable
//! - [`BlueprintWriter`] describes a visual in words when neither image
//!   generation nor the remote description succeeds

use crate::remote::OfflineSynthesizer;
use galley_model::{AssetKind, DescriptiveBlueprint, Ingredient, Preferences, ProtocolDraft};

const MEAT_CATEGORIES: [&str; 5] = ["meat", "poultry", "fish", "seafood", "shellfish"];

/// Template-based offline synthesizer
#[derive(Debug, Clone, Copy, Default)]
pub struct PantrySynthesizer;

impl PantrySynthesizer {
    /// Ingredients usable under the given preferences, most confident first
    fn usable<'a>(ingredients: &'a [Ingredient], preferences: &Preferences) -> Vec<&'a Ingredient> {
        let plant_based = preferences
            .dietary
            .iter()
            .any(|d| matches!(d.trim().to_lowercase().as_str(), "vegetarian" | "vegan"));

        let mut usable: Vec<&Ingredient> = ingredients
            .iter()
            .filter(|item| !item.is_dismissed() && !item.name.trim().is_empty())
            .filter(|item| {
                !plant_based
                    || !MEAT_CATEGORIES.contains(&item.category.trim().to_lowercase().as_str())
            })
            .collect();
        // stable: equal confidences keep input order
        usable.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        usable
    }
}

impl OfflineSynthesizer for PantrySynthesizer {
    fn synthesize(&self, ingredients: &[Ingredient], preferences: &Preferences) -> ProtocolDraft {
        let usable = Self::usable(ingredients, preferences);
        let names: Vec<String> = usable.iter().map(|item| item.name.trim().to_string()).collect();

        let style = preferences
            .cuisine
            .as_deref()
            .map(|c| format!("{}-Style ", title_case(c)))
            .unwrap_or_default();

        let title = match names.as_slice() {
            [] => format!("{style}Pantry Broth"),
            [only] => format!("{style}Simple {}", title_case(only)),
            [first, second, ..] => {
                format!("{style}{} & {} Skillet", title_case(first), title_case(second))
            }
        };

        let mut draft = ProtocolDraft::new(title).cites("offline pantry template");

        if names.is_empty() {
            draft = draft
                .step("Bring four cups of water to a simmer with a pinch of salt.")
                .step("Add any dried herbs or aromatics on hand.")
                .step("Simmer for 15 minutes and season to taste.");
        } else {
            let main = &names[0];
            draft = draft
                .step(format!("Rinse and prepare the {}.", names.join(", ")))
                .step(format!(
                    "Heat a pan over medium heat and cook the {main} until tender."
                ));
            if names.len() > 1 {
                draft = draft.step("Add the remaining ingredients and cook for 5 to 8 minutes.");
            }
            let note = if preferences.dietary.is_empty() {
                String::new()
            } else {
                format!(", keeping it {}", preferences.dietary.join(" and "))
            };
            draft = draft
                .step(format!("Season to taste{note}."))
                .step(format!(
                    "Plate for {} and serve warm.",
                    preferences.servings.max(1)
                ));
        }

        for name in names {
            draft = draft.uses(name);
        }
        draft
    }
}

/// Writes descriptive blueprints without any remote help
#[derive(Debug, Clone, Copy, Default)]
pub struct BlueprintWriter;

impl BlueprintWriter {
    /// Describe a visual of `kind` for `subject`
    #[must_use]
    pub fn compose(kind: AssetKind, subject: &str, highlights: &[String]) -> DescriptiveBlueprint {
        let subject = subject.trim();
        let featured = if highlights.is_empty() {
            "the main ingredients".to_string()
        } else {
            highlights
                .iter()
                .take(3)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match kind {
            AssetKind::Plating => DescriptiveBlueprint {
                plating: format!("{subject} served on a wide matte plate, portioned off-center"),
                colors: format!("natural tones of {featured} against a neutral plate"),
                textures: "glossy sauce beside crisp edges".into(),
                garnish: "fresh herbs and a drizzle of oil".into(),
                lighting: "soft daylight from the left".into(),
                composition: "three-quarter overhead angle with shallow depth".into(),
            },
            AssetKind::Drink => DescriptiveBlueprint {
                plating: format!("a drink pairing for {subject} in a stemmed glass"),
                colors: "clear amber with bright highlights".into(),
                textures: "fine condensation on the glass".into(),
                garnish: "citrus twist".into(),
                lighting: "warm backlight through the glass".into(),
                composition: "glass in focus with the dish blurred behind".into(),
            },
            AssetKind::Ingredient => DescriptiveBlueprint {
                plating: format!("whole {subject} resting on a wooden board"),
                colors: format!("the natural color of {subject}"),
                textures: "visible surface detail and freshness".into(),
                garnish: "none".into(),
                lighting: "even diffuse light".into(),
                composition: "centered close-up".into(),
            },
            AssetKind::Schematic => DescriptiveBlueprint {
                plating: format!("step-by-step layout for {subject}"),
                colors: "monochrome line work with one accent color".into(),
                textures: "flat diagram".into(),
                garnish: "none".into(),
                lighting: "none".into(),
                composition: format!("left-to-right flow featuring {featured}"),
            },
        }
    }
}

fn title_case(word: &str) -> String {
    word.trim()
        .split_whitespace()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_model::VerificationStatus;

    fn pantry(items: &[Ingredient], prefs: &Preferences) -> ProtocolDraft {
        PantrySynthesizer.synthesize(items, prefs)
    }

    #[test]
    fn empty_pantry_still_yields_a_protocol() {
        let draft = pantry(&[], &Preferences::default());
        assert_eq!(draft.title, "Pantry Broth");
        assert!(!draft.instructions.is_empty());
        assert!(draft.ingredients_used.is_empty());
    }

    #[test]
    fn uses_only_perceived_ingredients_most_confident_first() {
        let items = vec![
            Ingredient::new("basil", 0.4),
            Ingredient::new("tomato", 0.9),
            Ingredient::new("garlic", 0.7),
        ];
        let draft = pantry(&items, &Preferences::default());
        assert_eq!(draft.title, "Tomato & Garlic Skillet");
        assert_eq!(draft.ingredients_used, vec!["tomato", "garlic", "basil"]);
        assert!(draft.instructions.len() > 3);
    }

    #[test]
    fn dismissed_ingredients_are_skipped() {
        let items = vec![
            Ingredient::new("egg", 0.9).with_verification(VerificationStatus::Dismissed),
            Ingredient::new("rice", 0.5),
        ];
        let draft = pantry(&items, &Preferences::default());
        assert_eq!(draft.ingredients_used, vec!["rice"]);
        assert_eq!(draft.title, "Simple Rice");
    }

    #[test]
    fn vegetarian_preference_drops_meat() {
        let items = vec![
            Ingredient::new("chicken thigh", 0.9).with_category("Poultry"),
            Ingredient::new("leek", 0.6).with_category("produce"),
        ];
        let prefs = Preferences::default()
            .with_dietary("vegetarian")
            .with_cuisine("french");
        let draft = pantry(&items, &prefs);
        assert_eq!(draft.ingredients_used, vec!["leek"]);
        assert_eq!(draft.title, "French-Style Simple Leek");
        assert!(draft.instructions.iter().any(|s| s.contains("vegetarian")));
    }

    #[test]
    fn offline_output_is_deterministic() {
        let items = vec![Ingredient::new("tomato", 0.9), Ingredient::new("onion", 0.9)];
        let prefs = Preferences::default();
        assert_eq!(pantry(&items, &prefs), pantry(&items, &prefs));
    }

    #[test]
    fn blueprints_are_never_blank() {
        for kind in [
            AssetKind::Plating,
            AssetKind::Drink,
            AssetKind::Ingredient,
            AssetKind::Schematic,
        ] {
            let blueprint = BlueprintWriter::compose(kind, "Tomato Skillet", &["tomato".into()]);
            assert!(!blueprint.is_blank(), "{kind}");
        }
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("  cherry tomato "), "Cherry Tomato");
        assert_eq!(title_case(""), "");
    }
}

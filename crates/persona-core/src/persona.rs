//! The fixed persona label set and its canned descriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Description returned for labels outside the persona set.
pub const UNKNOWN_DESCRIPTION: &str = "No description available.";

/// One of the four user archetypes a text can be assigned to.
///
/// Serialises as the human-readable label (`"Tech Enthusiast"`), which is also
/// the form used in training data and zero-shot candidate labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persona {
    #[serde(rename = "Tech Enthusiast")]
    TechEnthusiast,
    #[serde(rename = "Foodie Explorer")]
    FoodieExplorer,
    #[serde(rename = "Fitness Guru")]
    FitnessGuru,
    #[serde(rename = "Travel Adventurer")]
    TravelAdventurer,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown persona label: {0:?}")]
pub struct UnknownPersona(pub String);

impl Persona {
    /// All personas, in candidate-label order.
    pub const ALL: [Persona; 4] = [
        Persona::TechEnthusiast,
        Persona::FoodieExplorer,
        Persona::FitnessGuru,
        Persona::TravelAdventurer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechEnthusiast => "Tech Enthusiast",
            Self::FoodieExplorer => "Foodie Explorer",
            Self::FitnessGuru => "Fitness Guru",
            Self::TravelAdventurer => "Travel Adventurer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::TechEnthusiast => {
                "You're a tech wizard, always coding, tinkering with gadgets, or diving into the latest AI breakthroughs!"
            }
            Self::FoodieExplorer => {
                "Your taste buds lead the way, exploring new recipes and savoring every culinary adventure!"
            }
            Self::FitnessGuru => {
                "You live for the gym, crushing workouts and inspiring others with your health journey!"
            }
            Self::TravelAdventurer => {
                "The world is your playground, chasing sunsets and epic adventures in every corner of the globe!"
            }
        }
    }

    /// Label strings for all personas, e.g. as zero-shot candidates.
    pub fn labels() -> [&'static str; 4] {
        Self::ALL.map(|p| p.as_str())
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPersona(s.to_string()))
    }
}

/// Description for an arbitrary label string.
///
/// The trained classifier decodes whatever labels the dataset contained, so
/// this accepts any string and falls back to [`UNKNOWN_DESCRIPTION`].
pub fn describe(label: &str) -> &'static str {
    label
        .parse::<Persona>()
        .map(|p| p.description())
        .unwrap_or(UNKNOWN_DESCRIPTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for persona in Persona::ALL {
            assert_eq!(persona.as_str().parse::<Persona>().unwrap(), persona);
        }
    }

    #[test]
    fn labels_in_candidate_order() {
        assert_eq!(
            Persona::labels(),
            [
                "Tech Enthusiast",
                "Foodie Explorer",
                "Fitness Guru",
                "Travel Adventurer"
            ]
        );
    }

    #[test]
    fn from_str_is_exact() {
        assert!("tech enthusiast".parse::<Persona>().is_err());
        assert!(" Fitness Guru".parse::<Persona>().is_err());
        let err = "Gamer".parse::<Persona>().unwrap_err();
        assert_eq!(err, UnknownPersona("Gamer".into()));
    }

    #[test]
    fn describe_known_label() {
        assert_eq!(
            describe("Foodie Explorer"),
            "Your taste buds lead the way, exploring new recipes and savoring every culinary adventure!"
        );
    }

    #[test]
    fn describe_unknown_label_falls_back() {
        assert_eq!(describe("Gamer"), UNKNOWN_DESCRIPTION);
        assert_eq!(describe(""), "No description available.");
    }

    #[test]
    fn serde_uses_display_labels() {
        let json = serde_json::to_string(&Persona::TravelAdventurer).unwrap();
        assert_eq!(json, "\"Travel Adventurer\"");
        let parsed: Persona = serde_json::from_str("\"Fitness Guru\"").unwrap();
        assert_eq!(parsed, Persona::FitnessGuru);
    }
}

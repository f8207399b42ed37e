//! Built-in role-play scenario catalog
//!
//! Each scenario carries the role description fed to the model, the canned
//! in-character reaction used when the user turns aggressive, and the role
//! keywords that decide whether aggression was aimed at the role.

/// A role-play scenario
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub aggression_response: &'static str,
    pub role_keywords: &'static [&'static str],
}

impl Scenario {
    /// Whether the text mentions this scenario's role.
    /// Used to decide if detected aggression is directed at the role.
    pub fn targets_role(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.role_keywords.iter().any(|kw| lower.contains(kw))
    }
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: 1,
        title: "Restaurant",
        description: "You're a waiter at a restaurant and I'm a customer ordering food.",
        aggression_response: "Sir/Madam, I will not tolerate this kind of language. \
                              I will have to ask you to leave if you continue.",
        role_keywords: &["waiter", "restaurant", "food", "order", "customer"],
    },
    Scenario {
        id: 2,
        title: "Hotel check-in",
        description: "You're a receptionist at a hotel and I'm checking in.",
        aggression_response: "I understand you might be frustrated, but I must ask you \
                              to remain civil. How can I help you today?",
        role_keywords: &["receptionist", "hotel", "check in", "room", "booking"],
    },
    Scenario {
        id: 3,
        title: "Police station",
        description: "You're a police officer and I'm reporting a lost item.",
        aggression_response: "Ma'am/Sir, using such language towards an officer is a \
                              serious offense. Please calm down, or I will have to take action.",
        role_keywords: &["police", "officer", "report", "lost", "crime", "station"],
    },
    Scenario {
        id: 4,
        title: "Souvenir shop",
        description: "You're a shop assistant and I'm a tourist looking for souvenirs.",
        aggression_response: "I'm here to help you, but I won't be spoken to like that. \
                              Please be respectful.",
        role_keywords: &["shop", "assistant", "tourist", "souvenir", "buy", "price"],
    },
    Scenario {
        id: 5,
        title: "Border control",
        description: "You're a border control officer and I'm a tourist who doesn't \
                      speak English well.",
        aggression_response: "This is a secure area, and your language is inappropriate. \
                              I need you to cooperate, or there will be consequences.",
        role_keywords: &["border", "control", "officer", "passport", "visa", "customs", "airport"],
    },
];

/// Look up a scenario by its numeric id
pub fn by_id(id: u32) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id == id)
}

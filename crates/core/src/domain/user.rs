use serde::{Deserialize, Serialize};

/// Language tags the relay routes on.
///
/// Detection may yield other ISO codes; anything outside this set resolves
/// to the default before it reaches the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "en" => Some(Self::En),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Profile fields the prompt assembler needs for one counterpart.
///
/// `display_name` is empty until a real name-capture flow exists; templates
/// must tolerate the empty string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub language: Language,
}

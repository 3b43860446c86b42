use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Devto,
    Linkedin,
    Facebook,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Devto => "devto",
            Platform::Linkedin => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
        }
    }

    /// Human-facing name used in result messages.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Reddit => "Reddit",
            Platform::Devto => "DEV",
            Platform::Linkedin => "LinkedIn",
            Platform::Facebook => "Facebook",
            Platform::Twitter => "Twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "devto" | "dev.to" => Ok(Platform::Devto),
            "linkedin" => Ok(Platform::Linkedin),
            "facebook" => Ok(Platform::Facebook),
            "twitter" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

//! Items produced by the per-entity extractors

use std::fmt;
use std::str::FromStr;

/// A timeline post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Unix time of the post, if the date element was found
    pub timestamp: Option<i64>,
    /// Body text, expanded when "see more" responded
    pub text: String,
    /// Translated text, empty when no translation was available
    pub translation: String,
    pub permalink: Option<String>,
}

/// A person: a friend, a search result or an event guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    pub name: String,
    pub profile_url: String,
    pub image_url: Option<String>,
}

/// A named link: a liked page, group, check-in place or album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub name: String,
    pub url: String,
}

/// A photo of the photos page or of an album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub source_url: String,
    /// Auto-generated accessibility description
    pub description: String,
    pub permalink: String,
}

/// One section of the about page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutSection {
    pub title: String,
    pub text: String,
}

/// Response category of an event guest list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GuestCategory {
    Going,
    Interested,
    Invited,
}

impl GuestCategory {
    pub const ALL: [GuestCategory; 3] = [Self::Going, Self::Interested, Self::Invited];

    /// Text of the link that opens the category's dialog
    pub fn label(&self) -> &'static str {
        match self {
            Self::Going => "Going",
            Self::Interested => "Interested",
            Self::Invited => "Invited",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::Interested => "interested",
            Self::Invited => "invited",
        }
    }
}

impl fmt::Display for GuestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GuestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "going" => Ok(Self::Going),
            "interested" => Ok(Self::Interested),
            "invited" => Ok(Self::Invited),
            other => Err(format!("unknown guest category '{}'", other)),
        }
    }
}

/// An event guest and the category they were listed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub category: GuestCategory,
    pub person: ProfileCard,
}

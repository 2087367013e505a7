use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// One curated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaEntry {
    pub id: i64,
    /// Question as the admin wrote it.
    pub question: String,
    /// Match key, always `normalize(question)`.
    pub question_norm: String,
    pub answer: String,
    /// Key of a [`Category`] when set through the admin or seed paths.
    pub category: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QaPatch {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

impl QaPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.question.is_none() && self.answer.is_none() && self.category.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnansweredQuestion {
    pub id: i64,
    pub user_id: Option<i64>,
    pub question: String,
    pub question_norm: String,
    pub asked_at: DateTime<Utc>,
    pub handled: bool,
}

/// Fixed FAQ taxonomy. Stored by [`Category::key`]; admins may also type the
/// Arabic label shown in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Registration,
    Attendance,
    Deliveries,
    Fees,
    Location,
    General,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category {0:?}, expected one of: {keys}", keys = Category::keys().join(", "))]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Registration,
        Category::Attendance,
        Category::Deliveries,
        Category::Fees,
        Category::Location,
        Category::General,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Category::Registration => "registration",
            Category::Attendance => "attendance",
            Category::Deliveries => "deliveries",
            Category::Fees => "fees",
            Category::Location => "location",
            Category::General => "general",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Registration => "التسجيل",
            Category::Attendance => "الحضور",
            Category::Deliveries => "التسليمات",
            Category::Fees => "الرسوم",
            Category::Location => "المكان",
            Category::General => "عام",
        }
    }

    fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.key()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the key in any case or the Arabic label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(wanted) || c.label() == wanted)
            .ok_or_else(|| UnknownCategory(wanted.to_string()))
    }
}

/// Trim a free-form category and map it onto the taxonomy. Blank means none.
pub fn parse_category(raw: Option<&str>) -> Result<Option<Category>, UnknownCategory> {
    raw.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::parse::<Category>)
        .transpose()
}

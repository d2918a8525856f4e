//! Note categories and the prompt files that back them.

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clinical focus of a generated note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    AdultTrauma,
    AdultChronicLbp,
    AdultNeckPain,
    AdultSportsInjury,
    Torticollis,
    Plagiocephaly,
    Feeding,
    Wellness,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 8] = [
        NoteCategory::AdultTrauma,
        NoteCategory::AdultChronicLbp,
        NoteCategory::AdultNeckPain,
        NoteCategory::AdultSportsInjury,
        NoteCategory::Torticollis,
        NoteCategory::Plagiocephaly,
        NoteCategory::Feeding,
        NoteCategory::Wellness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::AdultTrauma => "adult_trauma",
            NoteCategory::AdultChronicLbp => "adult_chronic_lbp",
            NoteCategory::AdultNeckPain => "adult_neck_pain",
            NoteCategory::AdultSportsInjury => "adult_sports_injury",
            NoteCategory::Torticollis => "torticollis",
            NoteCategory::Plagiocephaly => "plagiocephaly",
            NoteCategory::Feeding => "feeding",
            NoteCategory::Wellness => "wellness",
        }
    }

    pub fn is_adult(&self) -> bool {
        matches!(
            self,
            NoteCategory::AdultTrauma
                | NoteCategory::AdultChronicLbp
                | NoteCategory::AdultNeckPain
                | NoteCategory::AdultSportsInjury
        )
    }

    pub fn patient_type(&self) -> &'static str {
        if self.is_adult() {
            "adult"
        } else {
            "pediatric"
        }
    }

    /// Shared system prompt file for this category's patient group.
    pub fn base_prompt_file(&self) -> &'static str {
        if self.is_adult() {
            "adult_base_system.md"
        } else {
            "base_system.md"
        }
    }

    /// Category-specific prompt file.
    pub fn prompt_file(&self) -> String {
        format!("{}.md", self.as_str())
    }

    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteCategory {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                TaskError::Validation(format!(
                    "Invalid category '{}'. Valid options: {}",
                    s,
                    Self::valid_names()
                ))
            })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Scores that are reported per symptom, in the exact order the classifier
/// was trained on. Reordering this list changes the meaning of the feature
/// vector fed to the model.
pub const SYMPTOM_FIELDS: [&str; 12] = [
    "appetite",
    "interest",
    "fatigue",
    "worthlessness",
    "concentration",
    "agitation",
    "suicidalIdeation",
    "sleepDisturbance",
    "aggression",
    "panicAttacks",
    "hopelessness",
    "restlessness",
];

/// Valid range for every self-reported score (inclusive).
pub const SCORE_MIN: i16 = 1;
pub const SCORE_MAX: i16 = 6;

/// The twelve self-reported symptom scores of one assessment.
///
/// Wire names are camelCase to match the assessment questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomScores {
    pub appetite: i16,
    pub interest: i16,
    pub fatigue: i16,
    pub worthlessness: i16,
    pub concentration: i16,
    pub agitation: i16,
    pub suicidal_ideation: i16,
    pub sleep_disturbance: i16,
    pub aggression: i16,
    pub panic_attacks: i16,
    pub hopelessness: i16,
    pub restlessness: i16,
}

/// A score outside [`SCORE_MIN`]..=[`SCORE_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutOfRange {
    pub field: &'static str,
    pub value: i16,
}

impl SymptomScores {
    /// Scores in classifier feature order, paired with their wire names.
    pub fn named(&self) -> [(&'static str, i16); 12] {
        let values = self.as_array();
        let mut out = [("", 0); 12];
        for (slot, (name, value)) in out.iter_mut().zip(SYMPTOM_FIELDS.iter().zip(values)) {
            *slot = (name, value);
        }
        out
    }

    /// Scores as the fixed-order feature vector fed to the classifier.
    pub fn as_array(&self) -> [i16; 12] {
        [
            self.appetite,
            self.interest,
            self.fatigue,
            self.worthlessness,
            self.concentration,
            self.agitation,
            self.suicidal_ideation,
            self.sleep_disturbance,
            self.aggression,
            self.panic_attacks,
            self.hopelessness,
            self.restlessness,
        ]
    }

    /// Reject any score outside the questionnaire range before the vector
    /// reaches the classifier.
    pub fn validate(&self) -> Result<(), ScoreOutOfRange> {
        for (field, value) in self.named() {
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(ScoreOutOfRange { field, value });
            }
        }
        Ok(())
    }
}

/// Discrete severity produced by the classifier. Nothing else constructs
/// these values; handlers and storage only carry them onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Decode an argmax index from a 4-wide categorical output, clamped
    /// into the valid range to guard against malformed model outputs.
    pub fn from_index(index: usize) -> Self {
        Self::from_state(index.min(3) as i16)
    }

    /// Decode a scalar regression output: round half-away-from-zero, then
    /// clamp into [0,3].
    pub fn from_scalar(value: f32) -> Self {
        Self::from_state(value.round() as i16)
    }

    /// Clamp an integer state into a severity. Out-of-range stored values
    /// collapse to the nearest valid class rather than erroring.
    pub fn from_state(state: i16) -> Self {
        match state.clamp(0, 3) {
            0 => Self::None,
            1 => Self::Mild,
            2 => Self::Moderate,
            _ => Self::Severe,
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            Self::None => 0,
            Self::Mild => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
        }
    }
}

/// Locale for suggestion text and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Id,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Id => "id",
        }
    }
}

/// A symptom score high enough to call out in the generated suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concern {
    pub field: &'static str,
    pub score: i16,
}

/// Threshold above which a score counts as a specific concern.
pub const CONCERN_THRESHOLD: i16 = 5;

/// At most this many concerns are surfaced to the suggestion prompt.
pub const CONCERN_LIMIT: usize = 4;

/// Extract the notable symptoms of an assessment: scores >= `threshold`,
/// sorted descending by score (stable, so ties keep questionnaire order),
/// truncated to `limit`. Returns an empty list when nothing qualifies.
pub fn notable_concerns(scores: &SymptomScores, threshold: i16, limit: usize) -> Vec<Concern> {
    let mut concerns: Vec<Concern> = scores
        .named()
        .into_iter()
        .filter(|&(_, score)| score >= threshold)
        .map(|(field, score)| Concern { field, score })
        .collect();
    concerns.sort_by(|a, b| b.score.cmp(&a.score));
    concerns.truncate(limit);
    concerns
}

/// One persisted assessment. Append-only: records are created by a predict
/// call and never updated or deleted afterwards.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub scores: SymptomScores,
    pub depression_state: i16,
    pub generated_suggestion: String,
    pub language: String,
    pub recorded_at: DateTime<Utc>,
}

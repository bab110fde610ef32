//! Lead qualification scoring
//!
//! Additive and deterministic. Every rule that fires appends its reason, so
//! the reasons list is the exact audit trail of the score, in rule order.
//!
//! Transcript rules are evaluated into [`TranscriptSignals`], which the lead
//! keeps across calls. A later, thinner call on the same lead cannot take
//! back a signal an earlier call established.

use serde::{Deserialize, Serialize};

use crate::models::{ExtractionResult, PracticeArea};
use crate::services::lexicon::{self, LIABILITY, MEDICAL_TREATMENT, UNCERTAINTY, URGENT, WITNESSES};

pub const HIGH_THRESHOLD: i32 = 70;
pub const MEDIUM_THRESHOLD: i32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualificationLabel {
    High,
    Medium,
    Low,
}

impl QualificationLabel {
    pub fn from_value(value: u8) -> Self {
        match value as i32 {
            v if v >= HIGH_THRESHOLD => QualificationLabel::High,
            v if v >= MEDIUM_THRESHOLD => QualificationLabel::Medium,
            _ => QualificationLabel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualificationLabel::High => "high",
            QualificationLabel::Medium => "medium",
            QualificationLabel::Low => "low",
        }
    }
}

/// Keyword rules that read the caller's words rather than the extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptSignals {
    pub medical_treatment: bool,
    pub liability_or_witness: bool,
    pub urgency: bool,
    pub uncertainty: bool,
}

impl TranscriptSignals {
    pub fn detect(transcript: &str) -> Self {
        let text = lexicon::caller_text(transcript);
        Self {
            medical_treatment: MEDICAL_TREATMENT.is_present(&text),
            liability_or_witness: LIABILITY.is_present(&text) || WITNESSES.is_present(&text),
            urgency: URGENT.is_present(&text),
            uncertainty: UNCERTAINTY.is_present(&text),
        }
    }

    /// Fold the latest call into what the lead already has
    ///
    /// Positive signals stick once seen. Uncertainty follows the latest call,
    /// so a caller who was unsure at first and clear later is not penalized.
    pub fn accumulate(self, latest: TranscriptSignals) -> Self {
        Self {
            medical_treatment: self.medical_treatment || latest.medical_treatment,
            liability_or_witness: self.liability_or_witness || latest.liability_or_witness,
            urgency: self.urgency || latest.urgency,
            uncertainty: latest.uncertainty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Qualification {
    /// 0..=100
    pub value: u8,
    pub label: QualificationLabel,
    pub reasons: Vec<String>,
    /// Inputs the transcript rules were scored from
    pub signals: TranscriptSignals,
}

/// Score an extraction against a single transcript
pub fn score(extraction: &ExtractionResult, transcript: &str) -> Qualification {
    score_signals(extraction, TranscriptSignals::detect(transcript))
}

/// Score an extraction against already-evaluated transcript signals
pub fn score_signals(extraction: &ExtractionResult, signals: TranscriptSignals) -> Qualification {
    let mut total: i32 = 0;
    let mut reasons = Vec::new();

    let mut apply = |fired: bool, points: i32, reason: String| {
        if fired {
            total += points;
            reasons.push(reason);
        }
    };

    apply(
        extraction.practice_area != PracticeArea::Other,
        30,
        format!("Practice area identified: {}", extraction.practice_area),
    );
    apply(
        signals.medical_treatment,
        20,
        "Medical treatment mentioned".to_string(),
    );
    apply(
        signals.liability_or_witness,
        20,
        "Liability or witness evidence mentioned".to_string(),
    );
    apply(
        signals.urgency,
        15,
        "Urgency or deadline mentioned".to_string(),
    );
    apply(
        extraction.caller.full_name().is_some(),
        5,
        "Caller full name captured".to_string(),
    );
    apply(
        extraction.caller.email.as_deref().is_some_and(|e| !e.is_empty()),
        5,
        "Contact email captured".to_string(),
    );
    apply(
        extraction.incident_date.as_deref().is_some_and(|d| !d.is_empty()),
        5,
        "Incident date captured".to_string(),
    );
    apply(
        signals.uncertainty,
        -10,
        "Caller expressed uncertainty (-10)".to_string(),
    );

    let value = total.clamp(0, 100) as u8;
    Qualification {
        value,
        label: QualificationLabel::from_value(value),
        reasons,
        signals,
    }
}

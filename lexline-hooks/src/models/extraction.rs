//! Intake extraction schema
//!
//! Both extraction backends (rule-based and LLM-assisted) produce exactly
//! this shape. The serde form is also the JSON schema the LLM is asked to
//! fill, so it rejects unknown fields.

use serde::{Deserialize, Serialize};

/// Upper bound on `key_facts`
pub const MAX_KEY_FACTS: usize = 5;

/// Closed set of practice areas
///
/// Declaration order is the tie-break order for keyword scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PracticeArea {
    #[serde(rename = "Personal Injury")]
    PersonalInjury,
    #[serde(rename = "Family Law")]
    FamilyLaw,
    #[serde(rename = "Criminal Defense")]
    CriminalDefense,
    #[serde(rename = "Employment Law")]
    EmploymentLaw,
    #[serde(rename = "Immigration")]
    Immigration,
    #[serde(rename = "Estate Planning")]
    EstatePlanning,
    #[serde(rename = "Bankruptcy")]
    Bankruptcy,
    #[serde(rename = "Real Estate")]
    RealEstate,
    #[serde(rename = "Business Law")]
    BusinessLaw,
    #[serde(rename = "Other")]
    Other,
}

impl PracticeArea {
    /// All areas in declaration order
    pub const ALL: [PracticeArea; 10] = [
        PracticeArea::PersonalInjury,
        PracticeArea::FamilyLaw,
        PracticeArea::CriminalDefense,
        PracticeArea::EmploymentLaw,
        PracticeArea::Immigration,
        PracticeArea::EstatePlanning,
        PracticeArea::Bankruptcy,
        PracticeArea::RealEstate,
        PracticeArea::BusinessLaw,
        PracticeArea::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PracticeArea::PersonalInjury => "Personal Injury",
            PracticeArea::FamilyLaw => "Family Law",
            PracticeArea::CriminalDefense => "Criminal Defense",
            PracticeArea::EmploymentLaw => "Employment Law",
            PracticeArea::Immigration => "Immigration",
            PracticeArea::EstatePlanning => "Estate Planning",
            PracticeArea::Bankruptcy => "Bankruptcy",
            PracticeArea::RealEstate => "Real Estate",
            PracticeArea::BusinessLaw => "Business Law",
            PracticeArea::Other => "Other",
        }
    }
}

impl std::fmt::Display for PracticeArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Urgency tier (ordered: `Low < Medium < High`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Caller identity as stated during the call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallerInfo {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CallerInfo {
    /// `"First Last"` when both parts are known
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                Some(format!("{} {}", first, last))
            }
            _ => None,
        }
    }

    /// Best available display name (full name, else first name)
    pub fn display_name(&self) -> Option<String> {
        self.full_name()
            .or_else(|| self.first_name.clone().filter(|f| !f.is_empty()))
    }
}

/// Structured case facts extracted from a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractionResult {
    pub caller: CallerInfo,
    pub practice_area: PracticeArea,
    #[serde(default)]
    pub incident_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
    pub urgency: Urgency,
    /// Opposing or potentially conflicting party named by the caller
    #[serde(default)]
    pub opposing_party: Option<String>,
}

impl ExtractionResult {
    /// Fold a newer extraction into this one without losing captured facts
    ///
    /// - optional fields take the newer value only when it is present
    /// - a specific practice area is never replaced by `Other`
    /// - urgency keeps the higher tier
    /// - key facts are unioned in first-seen order, capped at [`MAX_KEY_FACTS`]
    /// - the summary is replaced by a non-empty newer summary
    pub fn merge_from(&mut self, newer: ExtractionResult) {
        let ExtractionResult {
            caller,
            practice_area,
            incident_date,
            location,
            summary,
            key_facts,
            urgency,
            opposing_party,
        } = newer;

        merge_option(&mut self.caller.first_name, caller.first_name);
        merge_option(&mut self.caller.last_name, caller.last_name);
        merge_option(&mut self.caller.email, caller.email);
        merge_option(&mut self.caller.phone, caller.phone);
        merge_option(&mut self.incident_date, incident_date);
        merge_option(&mut self.location, location);
        merge_option(&mut self.opposing_party, opposing_party);

        if practice_area != PracticeArea::Other {
            self.practice_area = practice_area;
        }

        self.urgency = self.urgency.max(urgency);

        if !summary.trim().is_empty() {
            self.summary = summary;
        }

        for fact in key_facts {
            if self.key_facts.len() >= MAX_KEY_FACTS {
                break;
            }
            if !self.key_facts.contains(&fact) {
                self.key_facts.push(fact);
            }
        }
    }
}

fn merge_option(current: &mut Option<String>, newer: Option<String>) {
    if let Some(value) = newer.filter(|v| !v.trim().is_empty()) {
        *current = Some(value);
    }
}

//! Term dictionaries shared by the rule-based extractor and the scorer
//!
//! Each [`TermSet`] compiles its phrases into one case-insensitive regex with
//! word boundaries, so "er" never matches inside "other".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::PracticeArea;

/// A named list of words and phrases
pub struct TermSet {
    terms: &'static [&'static str],
    pattern: Regex,
}

impl TermSet {
    fn new(terms: &'static [&'static str]) -> Self {
        let alternation = terms
            .iter()
            .map(|term| {
                term.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("term set compiles");
        Self { terms, pattern }
    }

    pub fn is_present(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Number of distinct terms of this set found in `text`
    pub fn distinct_hits(&self, text: &str) -> usize {
        let mut found: Vec<String> = self
            .pattern
            .find_iter(text)
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .collect();
        found.sort();
        found.dedup();
        found.len()
    }

    #[cfg(test)]
    pub(crate) fn terms(&self) -> &'static [&'static str] {
        self.terms
    }
}

pub static MEDICAL_TREATMENT: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "hospital", "hospitalized", "doctor", "doctors", "emergency room", "urgent care",
        "surgery", "physical therapy", "chiropractor", "ambulance", "paramedics", "x-ray",
        "mri", "stitches", "treatment", "medical treatment", "medical care", "medical attention",
        "physician", "clinic",
    ])
});

/// Injuries severe enough to raise urgency on their own
pub static MEDICAL_SEVERITY: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "surgery", "hospitalized", "icu", "intensive care", "broken", "fracture", "fractured",
        "concussion", "severe", "paralyzed", "emergency room",
    ])
});

pub static POLICE_REPORT: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&["police", "police report", "officer", "cops", "accident report", "citation"])
});

pub static INSURANCE: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&["insurance", "insurer", "adjuster", "claim number", "policy number", "claim"])
});

pub static WITNESSES: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&["witness", "witnesses", "bystander", "bystanders", "saw it happen", "saw the whole thing"])
});

pub static EVIDENCE: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "photo", "photos", "pictures", "video", "footage", "dashcam", "dash cam", "camera",
        "receipts", "records", "documents", "screenshots", "text messages",
    ])
});

pub static MISSED_WORK: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "missed work", "out of work", "off work", "lost wages", "can't work", "couldn't work",
        "unable to work", "time off work",
    ])
});

/// Fault language; combined with [`WITNESSES`] for the liability signal
pub static LIABILITY: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "fault", "at fault", "negligent", "negligence", "liable", "ran a red light",
        "ran the red light", "rear-ended", "rear ended", "drunk driver", "careless", "reckless",
        "ran a stop sign", "hit me",
    ])
});

pub static URGENT: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "urgent", "urgently", "an emergency", "asap", "immediately", "right away", "deadline",
        "statute of limitations", "court date", "court hearing",
        "hearing date", "been served", "got served", "was served", "summons", "running out of time",
    ])
});

pub static NEAR_TERM: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "today", "tonight", "yesterday", "tomorrow", "this week", "next week", "last week",
        "a few days", "recently", "soon", "this month",
    ])
});

pub static UNCERTAINTY: Lazy<TermSet> = Lazy::new(|| {
    TermSet::new(&[
        "not sure", "don't know", "dont know", "do not know", "can't remember", "cant remember",
        "cannot remember", "don't remember", "no idea", "unsure",
    ])
});

/// Keyword dictionary per practice area, in declaration order
pub static PRACTICE_AREA_KEYWORDS: Lazy<Vec<(PracticeArea, TermSet)>> = Lazy::new(|| {
    vec![
        (
            PracticeArea::PersonalInjury,
            TermSet::new(&[
                "accident", "car accident", "crash", "collision", "injury", "injured", "hurt",
                "slip and fall", "slipped", "dog bite", "whiplash", "rear-ended", "medical bills",
                "wreck", "pain",
            ]),
        ),
        (
            PracticeArea::FamilyLaw,
            TermSet::new(&[
                "divorce", "custody", "child support", "alimony", "spousal support", "separation",
                "visitation", "adoption", "prenup", "paternity", "domestic violence",
            ]),
        ),
        (
            PracticeArea::CriminalDefense,
            TermSet::new(&[
                "arrested", "arrest", "charged", "charges", "dui", "dwi", "jail", "warrant",
                "felony", "misdemeanor", "probation", "assault", "theft",
            ]),
        ),
        (
            PracticeArea::EmploymentLaw,
            TermSet::new(&[
                "fired", "terminated", "wrongful termination", "discrimination", "harassment",
                "employer", "overtime", "unpaid wages", "workplace", "retaliation",
                "workers comp", "boss",
            ]),
        ),
        (
            PracticeArea::Immigration,
            TermSet::new(&[
                "visa", "green card", "citizenship", "deportation", "deported", "asylum",
                "immigration", "daca", "work permit", "naturalization", "uscis",
            ]),
        ),
        (
            PracticeArea::EstatePlanning,
            TermSet::new(&[
                "last will", "living will", "trust", "estate", "probate", "inheritance",
                "power of attorney", "executor", "beneficiary", "guardianship",
            ]),
        ),
        (
            PracticeArea::Bankruptcy,
            TermSet::new(&[
                "bankruptcy", "chapter 7", "chapter 13", "debt", "creditors", "foreclosure",
                "collections", "garnishment", "garnished",
            ]),
        ),
        (
            PracticeArea::RealEstate,
            TermSet::new(&[
                "landlord", "tenant", "lease", "eviction", "evicted", "property", "closing",
                "mortgage", "title", "hoa", "deed", "rent",
            ]),
        ),
        (
            PracticeArea::BusinessLaw,
            TermSet::new(&[
                "contract", "business", "partnership", "llc", "corporation", "breach of contract",
                "vendor", "incorporate", "trademark", "shareholder",
            ]),
        ),
    ]
});

const CALLER_ROLES: [&str; 4] = ["user", "caller", "customer", "client"];
const AGENT_ROLES: [&str; 5] = ["agent", "assistant", "ai", "bot", "receptionist"];

/// The caller's side of a transcript
///
/// Flattened transcripts carry `role: message` lines. When any line has a
/// known role prefix only caller lines are kept; otherwise the whole text is
/// treated as the caller speaking.
pub fn caller_text(transcript: &str) -> String {
    let mut saw_role = false;
    let mut caller_lines = Vec::new();

    for line in transcript.lines() {
        let Some((role, message)) = line.split_once(':') else {
            continue;
        };
        let role = role.trim().to_ascii_lowercase();
        if CALLER_ROLES.contains(&role.as_str()) {
            saw_role = true;
            caller_lines.push(message.trim());
        } else if AGENT_ROLES.contains(&role.as_str()) {
            saw_role = true;
        }
    }

    if saw_role {
        caller_lines.join("\n")
    } else {
        transcript.to_string()
    }
}

//! Rule-based intake extraction
//!
//! Deterministic and dependency-free: keyword scoring for the practice area,
//! ordered regex lists for the captured fields (first match wins per field),
//! a three-tier keyword cascade for urgency, and boolean checks for key facts.

use lexline_common::phone::normalize_phone;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CallerInfo, ExtractionResult, PracticeArea, Urgency, MAX_KEY_FACTS};
use crate::services::lexicon::{
    self, TermSet, EVIDENCE, INSURANCE, MEDICAL_SEVERITY, MEDICAL_TREATMENT, MISSED_WORK,
    NEAR_TERM, POLICE_REPORT, URGENT, WITNESSES,
};

const NAME_WORD: &str = r"[A-Z][a-zA-Z'\-]+";

/// Capitalized words that follow "I'm" or "this is" without being names
const NOT_NAMES: [&str; 14] = [
    "Calling", "Not", "Just", "Here", "The", "So", "Really", "Very", "Still", "Looking",
    "Trying", "Sorry", "Hoping", "Okay",
];

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i:\bmy\s+name\s+is)\s+({w})(?:\s+({w}))?", w = NAME_WORD),
        format!(r"(?i:\bmy\s+name's)\s+({w})(?:\s+({w}))?", w = NAME_WORD),
        format!(r"(?i:\bthis\s+is)\s+({w})\s+({w})", w = NAME_WORD),
        format!(r"(?i:\bi'm|\bi\s+am)\s+({w})\s+({w})", w = NAME_WORD),
        format!(r"(?i:\bcall\s+me)\s+({w})", w = NAME_WORD),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("name pattern compiles"))
    .collect()
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})\b").expect("email pattern compiles")
});

/// Spelled-out address as dictated over the phone ("jane at example dot com")
static SPOKEN_EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([a-z0-9._%+\-]+)\s+at\s+([a-z0-9\-]+(?:\s+dot\s+[a-z0-9\-]+)*)\s+dot\s+(com|net|org|edu|gov|us|io)\b")
        .expect("spoken email pattern compiles")
});

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b((?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?(?:,?\s+\d{4})?)\b",
        r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b",
        r"\b(\d{4}-\d{2}-\d{2})\b",
        r"(?i)\b((?:a|one|two|three|four|five|six|a\s+few|a\s+couple\s+of|couple\s+of)\s+(?:days?|weeks?|months?|years?)\s+ago)\b",
        r"(?i)\b(yesterday|last\s+(?:night|week|month|year|monday|tuesday|wednesday|thursday|friday|saturday|sunday))\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date pattern compiles"))
    .collect()
});

static LOCATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(\d{1,6}\s+(?:[A-Z][a-zA-Z]*\s+)+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Highway|Hwy)\b\.?)",
        r"(?i:\b(?:corner|intersection)\s+of)\s+((?:[A-Z][a-zA-Z0-9]*\s+)+(?i:and|&)\s+[A-Z0-9][a-zA-Z0-9]*(?:\s+[A-Z][a-zA-Z0-9]*)*)",
        r"(?i:\b(?:on|at|near))\s+((?:Highway|Interstate|Route)\s+\d+|I-\d+|[A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?\s+(?:Street|Avenue|Road|Boulevard|Drive|Highway|Parkway))\b",
        r"(?i:\b(?:in|near))\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?,\s*[A-Z]{2})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location pattern compiles"))
    .collect()
});

static OPPOSING_PARTY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i:\b(?:against|suing|sue)\s+(?:the\s+)?)([A-Z][\w&'.\-]*(?:\s+[A-Z][\w&'.\-]*){0,3})",
        r"(?i:\bother\s+driver\s+(?:was|is|named)\s+)([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)",
        r"(?i:\b(?:employer|company|landlord|ex-?husband|ex-?wife)\s+(?:is|was|named)\s+)([A-Z][\w&'.\-]*(?:\s+[A-Z][\w&'.\-]*){0,3})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("opposing party pattern compiles"))
    .collect()
});

/// Key-fact checks in reporting order
static KEY_FACT_CHECKS: Lazy<Vec<(&'static Lazy<TermSet>, &'static str)>> = Lazy::new(|| {
    vec![
        (&MEDICAL_TREATMENT, "Caller received medical treatment"),
        (&POLICE_REPORT, "Police report mentioned"),
        (&INSURANCE, "Insurance involved"),
        (&WITNESSES, "Witnesses to the incident"),
        (&EVIDENCE, "Evidence available (photos, video, or documents)"),
        (&MISSED_WORK, "Caller missed work"),
    ]
});

/// Extract intake data from a transcript without any external service
pub fn extract(transcript: &str, caller_number: Option<&str>) -> ExtractionResult {
    let text = lexicon::caller_text(transcript);

    let (first_name, last_name) = extract_name(&text);
    let caller = CallerInfo {
        first_name,
        last_name,
        email: extract_email(&text),
        phone: caller_number.and_then(normalize_phone),
    };

    let practice_area = classify_practice_area(&text);
    let incident_date = first_capture(&DATE_PATTERNS, &text);
    let location = first_capture(&LOCATION_PATTERNS, &text);
    let opposing_party = first_capture(&OPPOSING_PARTY_PATTERNS, &text);
    let urgency = classify_urgency(&text);
    let key_facts = key_facts(&text);

    let summary = summarize(
        practice_area,
        &caller,
        incident_date.as_deref(),
        location.as_deref(),
        urgency,
    );

    ExtractionResult {
        caller,
        practice_area,
        incident_date,
        location,
        summary,
        key_facts,
        urgency,
        opposing_party,
    }
}

/// Area with the most distinct keyword hits; ties go to the first declared
pub fn classify_practice_area(text: &str) -> PracticeArea {
    let mut best = PracticeArea::Other;
    let mut best_hits = 0;

    for (area, terms) in lexicon::PRACTICE_AREA_KEYWORDS.iter() {
        let hits = terms.distinct_hits(text);
        if hits > best_hits {
            best = *area;
            best_hits = hits;
        }
    }

    best
}

pub fn classify_urgency(text: &str) -> Urgency {
    if URGENT.is_present(text) {
        Urgency::High
    } else if NEAR_TERM.is_present(text) || MEDICAL_SEVERITY.is_present(text) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

pub fn key_facts(text: &str) -> Vec<String> {
    KEY_FACT_CHECKS
        .iter()
        .filter(|(terms, _)| terms.is_present(text))
        .map(|(_, fact)| fact.to_string())
        .take(MAX_KEY_FACTS)
        .collect()
}

fn extract_name(text: &str) -> (Option<String>, Option<String>) {
    for pattern in NAME_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let first = caps.get(1).map(|m| m.as_str().to_string());
        if first.as_deref().map_or(true, is_not_name) {
            continue;
        }
        let last = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|last| last.len() > 1 && !is_not_name(last));
        return (first, last);
    }
    (None, None)
}

fn is_not_name(word: &str) -> bool {
    NOT_NAMES.contains(&word)
}

fn extract_email(text: &str) -> Option<String> {
    if let Some(caps) = EMAIL_PATTERN.captures(text) {
        return Some(caps[1].to_lowercase());
    }

    SPOKEN_EMAIL_PATTERN.captures(text).map(|caps| {
        let domain = caps[2]
            .split_whitespace()
            .filter(|part| !part.eq_ignore_ascii_case("dot"))
            .collect::<Vec<_>>()
            .join(".");
        format!("{}@{}.{}", &caps[1], domain, &caps[3]).to_lowercase()
    })
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().trim_end_matches(['.', ',']).to_string())
            .filter(|value| !value.is_empty())
    })
}

fn summarize(
    area: PracticeArea,
    caller: &CallerInfo,
    incident_date: Option<&str>,
    location: Option<&str>,
    urgency: Urgency,
) -> String {
    let subject = match area {
        PracticeArea::Other => "General legal inquiry".to_string(),
        area => format!("{} inquiry", area),
    };
    let who = caller.display_name().unwrap_or_else(|| "the caller".to_string());

    let mut summary = format!("{} from {}", subject, who);
    if let Some(date) = incident_date {
        summary.push_str(&format!(", incident {}", date));
    }
    if let Some(location) = location {
        summary.push_str(&format!(" at {}", location));
    }
    summary.push_str(&format!(". Urgency: {}.", urgency_label(urgency)));
    summary
}

fn urgency_label(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Low => "low",
        Urgency::Medium => "medium",
        Urgency::High => "high",
    }
}

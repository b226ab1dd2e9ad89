//! Text normalization shared by the factor index and the query side
//!
//! Both sides must run exactly these functions: any drift between how
//! reference rows and incoming entries are normalized shows up as lost recall.

use crate::factor::ScopeValue;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern");

    /// Multi-word unit spellings folded before per-token synonyms apply
    static ref PHRASES: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"\bmetric tonn?e?s?\b").expect("metric ton pattern"), "t"),
        (Regex::new(r"\bkilowatt[ -]?hours?\b").expect("kilowatt hour pattern"), "kwh"),
        (Regex::new(r"\bcubic met(?:re|er)s?\b").expect("cubic metre pattern"), "m3"),
    ];

    static ref SYNONYMS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for variant in ["l", "litre", "litres", "liter", "liters", "ltr", "ltrs"] {
            m.insert(variant, "liters");
        }
        for variant in ["petrol", "gas"] {
            m.insert(variant, "gasoline");
        }
        for variant in ["kilogram", "kilograms", "kgs"] {
            m.insert(variant, "kg");
        }
        for variant in ["ton", "tons", "tonne", "tonnes", "tonnage"] {
            m.insert(variant, "t");
        }
        for variant in ["kilowatthour", "kilowatthours"] {
            m.insert(variant, "kwh");
        }
        for variant in ["m³", "cubicmetre", "cubicmetres", "cubicmeter", "cubicmeters"] {
            m.insert(variant, "m3");
        }
        for variant in ["kilometre", "kilometres", "kilometer", "kilometers"] {
            m.insert(variant, "km");
        }
        for variant in ["mile", "mi"] {
            m.insert(variant, "miles");
        }
        m.insert("£", "gbp");
        m.insert("$", "usd");
        m
    };
}

/// Lowercase, trim, collapse whitespace, then fold synonyms token by token.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut folded = WHITESPACE.replace_all(lowered.trim(), " ").into_owned();

    for (pattern, replacement) in PHRASES.iter() {
        if pattern.is_match(&folded) {
            folded = pattern.replace_all(&folded, *replacement).into_owned();
        }
    }

    folded
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| SYNONYMS.get(token).copied().unwrap_or(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scope text normalized like any other field, with leading "scope" words
/// dropped so `1`, `"1"` and `"Scope 1"` agree. A bare "scope" becomes empty.
pub fn normalize_scope_text(text: &str) -> String {
    normalize(text)
        .split(' ')
        .skip_while(|token| *token == "scope")
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_scope(scope: &ScopeValue) -> String {
    normalize_scope_text(&scope.to_string())
}

/// Composite key searched against: category, unit and scope, each already
/// normalized.
pub fn search_key(category: &str, unit: &str, scope: &str) -> String {
    [category, unit, scope]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

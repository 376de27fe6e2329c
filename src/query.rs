// 🔎 Query Interpreter - free text → subject + location filter
//
// Rules as data: an ordered list of padded separator phrases, first match
// wins. "Apollo Pharmacy at Hyderabad" becomes
//   (name OR category ~ "Apollo Pharmacy") AND (area OR city ~ "Hyderabad")
//
// Separator detection is plain substring containment, not word-boundary
// aware. The padding keeps most false splits away but not all of them, and
// downstream callers rely on the exact split points.

use serde::{Deserialize, Serialize};

use crate::models::Place;
use crate::policy::QUERY_SEPARATORS;

// ============================================================================
// FILTER SPEC
// ============================================================================

/// Place fields the store can match against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Category,
    City,
    Area,
}

impl Field {
    /// Column name in the places table
    pub fn column(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Category => "category",
            Field::City => "city",
            Field::Area => "area",
        }
    }

    fn value<'a>(&self, place: &'a Place) -> &'a str {
        match self {
            Field::Name => &place.name,
            Field::Category => place.category.as_str(),
            Field::City => &place.city,
            Field::Area => &place.area,
        }
    }
}

/// One mandatory term: any listed field contains the needle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub fields: Vec<Field>,
    pub needle: String,
}

impl Clause {
    pub fn new(fields: &[Field], needle: &str) -> Self {
        Clause {
            fields: fields.to_vec(),
            needle: needle.to_string(),
        }
    }

    /// Needle in the case-folded form `contains_folded` expects
    pub fn folded_needle(&self) -> String {
        self.needle.to_lowercase()
    }

    pub fn matches(&self, place: &Place) -> bool {
        let folded = self.folded_needle();
        self.fields
            .iter()
            .any(|field| contains_folded(field.value(place), &folded))
    }
}

/// Conjunction of disjunctions. No clauses matches every place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub clauses: Vec<Clause>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, place: &Place) -> bool {
        self.clauses.iter().all(|clause| clause.matches(place))
    }
}

/// Case-insensitive substring test
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    contains_folded(haystack, &needle.to_lowercase())
}

/// Substring test against a needle that is already lowercased. The SQLite
/// store registers this same function so in-memory and SQL filtering agree.
/// ASCII haystacks are scanned in place without allocating.
pub fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    if folded_needle.is_empty() {
        return true;
    }

    if haystack.is_ascii() {
        // Lowercase ASCII stays ASCII, so a non-ASCII needle cannot occur
        return folded_needle.is_ascii()
            && haystack
                .as_bytes()
                .windows(folded_needle.len())
                .any(|window| window.eq_ignore_ascii_case(folded_needle.as_bytes()));
    }

    haystack.to_lowercase().contains(folded_needle)
}

// ============================================================================
// QUERY SPLITTING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIntent {
    /// What the user is looking for (name or category)
    pub subject: String,

    /// Where, if a separator was found. Empty otherwise.
    pub location: String,

    /// The separator that produced the split
    pub separator: Option<&'static str>,
}

/// Split on the first separator (in priority order) present in the query.
///
/// The location is the text up to the next occurrence of the same
/// separator. Other separators inside it are left alone, so
/// "Apollo at Jubilee Hills, Hyderabad" keeps "Jubilee Hills, Hyderabad".
pub fn split_query(query: &str) -> QueryIntent {
    // ASCII folding keeps byte offsets aligned with the original text
    let folded = query.to_ascii_lowercase();

    for separator in QUERY_SEPARATORS {
        if let Some(start) = folded.find(separator) {
            let rest = start + separator.len();
            let end = folded[rest..]
                .find(separator)
                .map_or(query.len(), |i| rest + i);

            return QueryIntent {
                subject: query[..start].trim().to_string(),
                location: query[rest..end].trim().to_string(),
                separator: Some(separator),
            };
        }
    }

    QueryIntent {
        subject: query.trim().to_string(),
        location: String::new(),
        separator: None,
    }
}

// ============================================================================
// INTERPRETATION
// ============================================================================

/// Build the store filter for a search box query and an optional city box.
pub fn interpret_query(query: &str, city: &str) -> FilterSpec {
    let mut clauses = Vec::new();

    let city = city.trim();
    if !city.is_empty() {
        clauses.push(Clause::new(&[Field::Area, Field::City], city));
    }

    if !query.trim().is_empty() {
        let intent = split_query(query);

        if !intent.subject.is_empty() {
            let mut fields = vec![Field::Name, Field::Category];

            // A bare "Indiranagar" may well be a location typed into the main box
            if intent.location.is_empty() {
                fields.extend([Field::Area, Field::City]);
            }

            clauses.push(Clause {
                fields,
                needle: intent.subject,
            });
        }

        if !intent.location.is_empty() {
            clauses.push(Clause::new(&[Field::Area, Field::City], &intent.location));
        }
    }

    FilterSpec { clauses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaceCategory;
    use chrono::Utc;

    fn place(name: &str, category: PlaceCategory, city: &str, area: &str) -> Place {
        let now = Utc::now();
        Place {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            category,
            city: city.to_string(),
            area: area.to_string(),
            coordinates: None,
            image: None,
            maps_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_subject_at_location() {
        let spec = interpret_query("Apollo Pharmacy at Hyderabad", "");

        assert_eq!(
            spec.clauses,
            vec![
                Clause::new(&[Field::Name, Field::Category], "Apollo Pharmacy"),
                Clause::new(&[Field::Area, Field::City], "Hyderabad"),
            ]
        );
    }

    #[test]
    fn test_bare_query_also_matches_location_fields() {
        let spec = interpret_query("Indiranagar", "");

        assert_eq!(
            spec.clauses,
            vec![Clause::new(
                &[Field::Name, Field::Category, Field::Area, Field::City],
                "Indiranagar"
            )]
        );
    }

    #[test]
    fn test_city_only() {
        let spec = interpret_query("", "Bangalore");

        assert_eq!(
            spec.clauses,
            vec![Clause::new(&[Field::Area, Field::City], "Bangalore")]
        );
    }

    #[test]
    fn test_empty_inputs_match_everything() {
        let spec = interpret_query("", "");
        assert!(spec.is_empty());

        let spec = interpret_query("   ", "  ");
        assert!(spec.is_empty());
        assert!(spec.matches(&place("Any", PlaceCategory::Other, "X", "Y")));
    }

    #[test]
    fn test_city_box_and_split_query_are_and_ed() {
        let spec = interpret_query("bank near MG Road", "Bangalore");

        assert_eq!(
            spec.clauses,
            vec![
                Clause::new(&[Field::Area, Field::City], "Bangalore"),
                Clause::new(&[Field::Name, Field::Category], "bank"),
                Clause::new(&[Field::Area, Field::City], "MG Road"),
            ]
        );
    }

    #[test]
    fn test_separator_priority_order() {
        // " in " outranks ", " even though the comma comes first
        let intent = split_query("Cafe, Coffee Day in Koramangala");
        assert_eq!(intent.separator, Some(" in "));
        assert_eq!(intent.subject, "Cafe, Coffee Day");
        assert_eq!(intent.location, "Koramangala");
    }

    #[test]
    fn test_separator_is_case_insensitive() {
        let intent = split_query("Apollo AT Hyderabad");
        assert_eq!(intent.subject, "Apollo");
        assert_eq!(intent.location, "Hyderabad");
    }

    #[test]
    fn test_later_separators_not_resplit() {
        let intent = split_query("Apollo at Jubilee Hills, Hyderabad");
        assert_eq!(intent.subject, "Apollo");
        assert_eq!(intent.location, "Jubilee Hills, Hyderabad");
    }

    #[test]
    fn test_repeated_separator_keeps_second_piece() {
        let intent = split_query("Bank at Koti at Hyderabad");
        assert_eq!(intent.subject, "Bank");
        assert_eq!(intent.location, "Koti");
    }

    #[test]
    fn test_padding_prevents_inner_word_split() {
        // "Nature" and "Latin" contain "at" but never " at "
        let intent = split_query("Latin Nature Store");
        assert_eq!(intent.separator, None);
        assert_eq!(intent.subject, "Latin Nature Store");
    }

    #[test]
    fn test_padded_substring_false_positive_is_preserved() {
        // Known heuristic limitation: a name that literally contains " in "
        let intent = split_query("Stay in Style Boutique");
        assert_eq!(intent.subject, "Stay");
        assert_eq!(intent.location, "Style Boutique");
    }

    #[test]
    fn test_blank_subject_yields_location_only() {
        let spec = interpret_query(" at Hyderabad", "");

        assert_eq!(
            spec.clauses,
            vec![Clause::new(&[Field::Area, Field::City], "Hyderabad")]
        );
    }

    #[test]
    fn test_blank_location_falls_back_to_bare_subject() {
        let spec = interpret_query("Apollo at ", "");

        assert_eq!(
            spec.clauses,
            vec![Clause::new(
                &[Field::Name, Field::Category, Field::Area, Field::City],
                "Apollo"
            )]
        );
    }

    #[test]
    fn test_non_ascii_text_splits_cleanly() {
        let intent = split_query("Café Ñandú near Köln");
        assert_eq!(intent.subject, "Café Ñandú");
        assert_eq!(intent.location, "Köln");
    }

    #[test]
    fn test_filter_matches_places() {
        let apollo = place("Apollo Pharmacy", PlaceCategory::Medical, "Hyderabad", "Jubilee Hills");
        let sbi = place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar");

        let spec = interpret_query("apollo pharmacy at hyderabad", "");
        assert!(spec.matches(&apollo));
        assert!(!spec.matches(&sbi));

        let spec = interpret_query("indiranagar", "");
        assert!(spec.matches(&sbi));
        assert!(!spec.matches(&apollo));

        // Category names are matchable too
        let spec = interpret_query("medic", "");
        assert!(spec.matches(&apollo));

        let spec = interpret_query("", "jubilee");
        assert!(spec.matches(&apollo));
    }

    #[test]
    fn test_contains_ci_unicode() {
        assert!(contains_ci("KÖLN Hbf", "köln"));
        assert!(!contains_ci("Berlin", "köln"));
        assert!(contains_ci("anything", ""));
    }

    #[test]
    fn test_contains_folded_ascii_and_unicode_paths() {
        assert!(contains_folded("Apollo PHARMACY", "pharmacy"));
        assert!(!contains_folded("Apollo", "apollo pharmacy"));
        assert!(!contains_folded("Koln", "köln"));
        assert!(contains_folded("Café MÜLLER", "müller"));
        assert!(contains_folded("", ""));
        assert!(!contains_folded("", "a"));
    }

    #[test]
    fn test_clause_folds_needle_once() {
        let clause = Clause::new(&[Field::Name], "ÄPFEL Market");
        assert_eq!(clause.folded_needle(), "äpfel market");

        let p = place("Äpfel Market Süd", PlaceCategory::Food, "Köln", "Süd");
        assert!(clause.matches(&p));
    }
}

// Free-text location -> Location. The site prints "City, State, Country"
// with any of the parts missing, plus bare "Remote"/"Worldwide" labels.
use crate::model::Location;

const COUNTRY_TABLE: &[(&str, &str)] = &[
    ("united states", "United States"),
    ("usa", "United States"),
    ("us", "United States"),
    ("united kingdom", "United Kingdom"),
    ("uk", "United Kingdom"),
    ("canada", "Canada"),
    ("germany", "Germany"),
    ("france", "France"),
    ("spain", "Spain"),
    ("italy", "Italy"),
    ("netherlands", "Netherlands"),
    ("poland", "Poland"),
    ("sweden", "Sweden"),
    ("switzerland", "Switzerland"),
    ("ireland", "Ireland"),
    ("portugal", "Portugal"),
    ("austria", "Austria"),
    ("belgium", "Belgium"),
    ("denmark", "Denmark"),
    ("norway", "Norway"),
    ("finland", "Finland"),
    ("india", "India"),
    ("australia", "Australia"),
    ("new zealand", "New Zealand"),
    ("japan", "Japan"),
    ("singapore", "Singapore"),
    ("brazil", "Brazil"),
    ("mexico", "Mexico"),
    ("argentina", "Argentina"),
    ("south africa", "South Africa"),
    ("israel", "Israel"),
    ("united arab emirates", "United Arab Emirates"),
];

fn lookup_country(token: &str) -> Option<&'static str> {
    let needle = token.trim().to_lowercase();
    COUNTRY_TABLE
        .iter()
        .find(|(key, _)| *key == needle)
        .map(|(_, canonical)| *canonical)
}

/// Splits comma-delimited location text into city/state/country. A trailing
/// token only becomes a country when it matches the known-country table;
/// remaining tokens fill city then state from the left. A lone ambiguous
/// token populates only `city`. Remote-style labels yield an empty Location.
pub fn parse_location(raw: &str, default_country: Option<&str>) -> Location {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.is_empty() || lower == "remote" || lower == "worldwide" || lower == "n/a" {
        return Location::default();
    }

    let mut parts: Vec<&str> = trimmed
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut country = None;
    if parts.len() > 1 {
        if let Some(canonical) = parts.last().and_then(|t| lookup_country(t)) {
            country = Some(canonical.to_string());
            parts.pop();
        }
    } else if let Some(canonical) = parts.first().and_then(|t| lookup_country(t)) {
        return Location {
            city: None,
            state: None,
            country: Some(canonical.to_string()),
        };
    }

    if country.is_none() {
        country = default_country
            .and_then(lookup_country)
            .map(str::to_string)
            .or_else(|| default_country.map(str::to_string));
    }

    let (city, state) = match parts.as_slice() {
        [] => (None, None),
        [only] => (Some(only.to_string()), None),
        [city, state, ..] => (Some(city.to_string()), Some(state.to_string())),
    };

    Location { city, state, country }
}

//! SIVICC code grammar
//!
//! A quadrant/unit code encodes its place in the police hierarchy:
//!
//! ```text
//! [Unit{5 letters}] [Model "MNVCC"] [District letter+2d] Station E+2d [Subunit (C|S)+2d] [Serial 6d]
//!
//! MEBOG MNVCC C01 E01 C02 000004
//! ```
//!
//! One directory uses a short form `E01-01` (station, dash, 2-digit serial).
//!
//! Parsing never fails loudly: upstream formats are heterogeneous, so
//! "no station anywhere" is an ordinary `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Model marker for the community-policing-by-quadrants scheme
pub const MODEL_MARKER: &str = "MNVCC";

/// Agency mnemonic of the capital-district police
pub const CAPITAL_UNIT: &str = "MEBOG";

static LONG_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<unit>[A-Z]{5})?(?P<model>MNVCC)?(?P<district>[A-Z]\d{2})?(?P<station>E\d{2})(?P<subunit>[CS]\d{2})?(?P<serial>\d{6})?$",
    )
    .expect("long grammar regex is valid")
});

static SHORT_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<station>E\d{2})(?:-(?P<serial>\d{2}))?$").expect("short grammar regex is valid")
});

static STATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E(\d{2})(?:\D|$)").expect("station token regex is valid"));

/// Which grammar accepted the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    Long,
    Short,
    StationScan,
}

/// Structured SIVICC code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SivCode {
    pub unit: Option<String>,
    pub model: Option<String>,
    pub district: Option<String>,
    pub station: String,
    pub subunit: Option<String>,
    pub serial: Option<String>,
    pub grammar: Grammar,
}

impl SivCode {
    /// Parse a raw code, trying the long grammar, then the short grammar,
    /// then a bare station scan
    pub fn parse(raw: &str) -> Option<SivCode> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if compact.is_empty() {
            return None;
        }

        let unseparated: String = compact
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | '.' | '/'))
            .collect();

        Self::parse_long(&unseparated)
            .or_else(|| Self::parse_short(&compact))
            .or_else(|| Self::scan_station(&compact))
    }

    fn parse_long(s: &str) -> Option<SivCode> {
        let caps = LONG_GRAMMAR.captures(s)?;
        let get = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

        let mut unit = get("unit");
        let mut model = get("model");
        // "MNVCCC01E01..." lets the unit group swallow the model marker
        if model.is_none() && unit.as_deref() == Some(MODEL_MARKER) {
            model = unit.take();
        }

        Some(SivCode {
            unit,
            model,
            district: get("district"),
            station: get("station")?,
            subunit: get("subunit"),
            serial: get("serial"),
            grammar: Grammar::Long,
        })
    }

    fn parse_short(s: &str) -> Option<SivCode> {
        let caps = SHORT_GRAMMAR.captures(s)?;
        Some(SivCode {
            unit: None,
            model: None,
            district: None,
            station: caps.name("station")?.as_str().to_string(),
            subunit: None,
            serial: caps.name("serial").map(|m| m.as_str().to_string()),
            grammar: Grammar::Short,
        })
    }

    fn scan_station(s: &str) -> Option<SivCode> {
        let caps = STATION_TOKEN.captures(s)?;
        Some(SivCode {
            unit: None,
            model: None,
            district: None,
            station: format!("E{}", caps.get(1)?.as_str()),
            subunit: None,
            serial: None,
            grammar: Grammar::StationScan,
        })
    }

    /// Primary correlation key against station-indexed sources
    pub fn station_subunit(&self) -> String {
        match &self.subunit {
            Some(subunit) => format!("{}{}", self.station, subunit),
            None => self.station.clone(),
        }
    }

    /// Station number without the `E` prefix
    pub fn station_number(&self) -> Option<u32> {
        self.station.get(1..)?.parse().ok()
    }

    /// Subunit numeral ignoring its `C`/`S` letter
    pub fn subunit_number(&self) -> Option<u32> {
        self.subunit.as_deref().and_then(subunit_numeral)
    }

    /// Serial as a number, so short (`01`) and long (`000001`) forms compare
    pub fn serial_number(&self) -> Option<u32> {
        self.serial.as_deref()?.parse().ok()
    }

    pub fn is_capital_district(&self) -> bool {
        self.unit.as_deref() == Some(CAPITAL_UNIT)
    }
}

/// Numeral of a subunit token such as `C02` or `S11`
pub fn subunit_numeral(subunit: &str) -> Option<u32> {
    let digits = subunit.strip_prefix(|c| c == 'C' || c == 'S')?;
    digits.parse().ok()
}

/// Trailing digits of a code, at most one serial wide ("...E01C02000004" → "000004")
///
/// Roster sources index loosely by this suffix. The subunit digits run straight
/// into the serial in the long form, hence the width cap.
pub fn numeric_suffix(code: &str) -> Option<&str> {
    const SERIAL_WIDTH: usize = 6;
    let trimmed = code.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .take(SERIAL_WIDTH)
        .last()
        .map(|(i, _)| i)?;
    Some(&trimmed[start..])
}

/// True when `reference` names the quadrant `code`
///
/// A reference carrying letters must equal `code` or be its tail after
/// normalization, so a full code from another station never matches. A bare
/// number only pins the serial ("000004" == "4").
pub fn suffix_matches(reference: &str, code: &str) -> bool {
    let reference = normalize_code(reference);
    let code = normalize_code(code);
    if reference.is_empty() {
        return false;
    }
    if reference.chars().all(|c| c.is_ascii_digit()) {
        let serial = |s: &str| numeric_suffix(s).and_then(|d| d.parse::<u64>().ok());
        return matches!((serial(&reference), serial(&code)), (Some(x), Some(y)) if x == y);
    }
    code.ends_with(&reference)
}

/// Serial digits with leading zeros stripped ("...C02000123" → "123")
///
/// A serial of all zeros keeps a single `0`.
pub fn loose_serial(code: &str) -> Option<&str> {
    let suffix = numeric_suffix(code)?;
    let trimmed = suffix.trim_start_matches('0');
    Some(if trimmed.is_empty() { &suffix[suffix.len() - 1..] } else { trimmed })
}

/// Normalize a raw code for equality comparison
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

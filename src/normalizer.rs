// 🔤 Normalizer - Canonical keys for SKU codes, brand and sector names
// All catalog lookups and metric groupings go through these keys
//
// Problem solved:
// - "  01234 ", "1234", "SKU-1234" → all the same SKU key
// - "EUD", "eudora", "EUDORA" → all "Eudora"
// - "Sâo Paulo", "SAO  PAULO" → same sector key
// - Normalized keys are for LOOKUP only, never for display

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Brand used when a row's brand cannot be resolved.
/// Excluded from multimarca brand sets.
pub const UNKNOWN_BRAND: &str = "DESCONHECIDA";

/// Canonical width for pure-numeric SKU codes.
/// "123" and "00123" both canonicalize to "00123" at width 5.
pub const DEFAULT_SKU_WIDTH: usize = 5;

// ============================================================================
// KEY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Product code / SKU
    Sku,

    /// Brand name (alias table applied first)
    Brand,

    /// Sector name or code
    Sector,
}

// ============================================================================
// NORMALIZED KEY
// ============================================================================

/// A canonical lookup key.
///
/// `Empty` is distinguished from `Key("")` on purpose: blank input must
/// never collide with a real catalog key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NormalizedKey {
    /// Input was empty or carried no usable characters
    Empty,

    /// Canonical key text
    Key(String),
}

impl NormalizedKey {
    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedKey::Empty)
    }

    /// Key text for lookups; `None` for the empty key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NormalizedKey::Empty => None,
            NormalizedKey::Key(s) => Some(s.as_str()),
        }
    }

    /// Display form for audit output ("(vazio)" for the empty key).
    pub fn display(&self) -> &str {
        match self {
            NormalizedKey::Empty => "(vazio)",
            NormalizedKey::Key(s) => s.as_str(),
        }
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    /// UPPERCASE spelling → canonical brand name
    brand_aliases: HashMap<String, String>,

    /// Canonical width for numeric SKU codes
    sku_width: usize,
}

impl Normalizer {
    /// Create normalizer with the group's brand alias table
    pub fn new() -> Self {
        Normalizer {
            brand_aliases: default_brand_aliases(),
            sku_width: DEFAULT_SKU_WIDTH,
        }
    }

    pub fn with_sku_width(mut self, width: usize) -> Self {
        self.sku_width = width;
        self
    }

    /// Replace the alias table (catalog re-imports may carry their own)
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.brand_aliases = aliases;
        self
    }

    /// Normalize raw text into a lookup key.
    ///
    /// Pure and deterministic: same input always yields the same key.
    /// Idempotent for the name kinds; for SKUs, feeding a canonical key
    /// back in returns it unchanged.
    pub fn normalize(&self, kind: KeyKind, raw: &str) -> NormalizedKey {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return NormalizedKey::Empty;
        }

        match kind {
            KeyKind::Sku => self.normalize_sku(trimmed),
            KeyKind::Brand => {
                let canonical = self.canonical_brand(trimmed);
                name_key(&canonical)
            }
            KeyKind::Sector => name_key(trimmed),
        }
    }

    /// Canonical display brand for raw brand text.
    ///
    /// Applies the alias table case-insensitively; unknown spellings pass
    /// through trimmed, blank input becomes the unknown brand.
    pub fn canonical_brand(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return UNKNOWN_BRAND.to_string();
        }

        let upper: String = trimmed
            .chars()
            .map(strip_accent)
            .collect::<String>()
            .to_uppercase();

        match self.brand_aliases.get(&upper) {
            Some(canonical) => canonical.clone(),
            None => trimmed.to_string(),
        }
    }

    /// SKU rule: the digit sequence is the code when one exists
    /// (letter prefixes like "SKU-" are noise); pure-numeric codes get a
    /// canonical width. Codes with no digits fall back to a name-style key.
    fn normalize_sku(&self, trimmed: &str) -> NormalizedKey {
        // Excel float artifact: "1234.0" is "1234"
        let cleaned = trimmed.strip_suffix(".0").unwrap_or(trimmed);

        let digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();

        if !digits.is_empty() {
            return NormalizedKey::Key(self.canonical_numeric(&digits));
        }

        // No digits at all: keep the alphanumeric text, case-folded
        let alnum: String = cleaned
            .chars()
            .map(strip_accent)
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if alnum.is_empty() {
            NormalizedKey::Empty
        } else {
            NormalizedKey::Key(alnum)
        }
    }

    /// Trim leading zeros, then left-pad back to the canonical width.
    /// "00123" → "123" → "00123"; "123" → "00123"; "123456" stays.
    fn canonical_numeric(&self, digits: &str) -> String {
        let significant = digits.trim_start_matches('0');
        let significant = if significant.is_empty() { "0" } else { significant };

        if significant.len() >= self.sku_width {
            significant.to_string()
        } else {
            format!("{:0>width$}", significant, width = self.sku_width)
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Name-style key: accent-stripped, case-folded, punctuation dropped,
/// whitespace runs collapsed to a single space.
fn name_key(raw: &str) -> NormalizedKey {
    let folded: String = raw
        .chars()
        .map(strip_accent)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        NormalizedKey::Empty
    } else {
        NormalizedKey::Key(collapsed)
    }
}

/// Map accented Latin characters to their base letter.
/// Covers the Portuguese/Spanish range seen in reseller spreadsheets.
fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// The group's brand alias table (known misspellings → canonical name).
/// Keys are uppercase and accent-stripped.
fn default_brand_aliases() -> HashMap<String, String> {
    let mut aliases = HashMap::new();

    let entries: [(&str, &str); 16] = [
        // oBoticário (various spellings)
        ("OBOTICARIO", "oBoticário"),
        ("O BOTICARIO", "oBoticário"),
        ("BOTICARIO", "oBoticário"),
        ("BOT", "oBoticário"),
        // Eudora
        ("EUD", "Eudora"),
        ("EUDORA", "Eudora"),
        // Siàge is sold under Eudora
        ("SIAGE", "Eudora"),
        ("SIEGE", "Eudora"),
        // Quem Disse Berenice
        ("QDB", "Quem Disse Berenice"),
        ("QUEM DISSE BERENICE", "Quem Disse Berenice"),
        ("QUEM DISSE, BERENICE?", "Quem Disse Berenice"),
        // O.U.I
        ("OUI", "O.U.I"),
        ("O.U.I", "O.U.I"),
        ("O.U.I.", "O.U.I"),
        // AuAmigos
        ("AUMIGOS", "AuAmigos"),
        ("AU AMIGOS", "AuAmigos"),
    ];

    for (spelling, canonical) in entries {
        aliases.insert(spelling.to_string(), canonical.to_string());
    }

    aliases
}

// ============================================================================
// TESTS
// ============================================================================

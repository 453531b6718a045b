// 🏷️ Category Classifier - Keyword rules over product names
// Rules as data: ordered keyword table, first match wins
//
// Catalog extracts abbreviate aggressively ("BAT LIQ MATTE", "DES AER").
// Keywords carry their own spacing so fragments only match on word
// boundaries; the product name is padded with spaces before scanning.

use serde::{Deserialize, Serialize};

/// Fallback category when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "Outros";

// ============================================================================
// CATEGORY RULE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category assigned on match
    pub category: String,

    /// Keywords checked against the padded, uppercased product name.
    /// Leading/trailing spaces in a keyword are significant.
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        CategoryRule {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, padded_upper: &str) -> bool {
        self.keywords.iter().any(|k| padded_upper.contains(k.as_str()))
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Ordered rule list; more specific categories come first because the
/// first matching rule wins.
pub struct CategoryClassifier {
    rules: Vec<CategoryRule>,
}

impl CategoryClassifier {
    /// Classifier with the standard rule table.
    pub fn new() -> Self {
        CategoryClassifier {
            rules: default_rules(),
        }
    }

    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        CategoryClassifier { rules }
    }

    /// Classify a product name. Pure and deterministic.
    pub fn classify(&self, product_name: &str) -> String {
        let trimmed = product_name.trim();
        if trimmed.is_empty() {
            return DEFAULT_CATEGORY.to_string();
        }

        // Pad for word-boundary keywords like " BAT "
        let padded_upper = format!(" {} ", trimmed.to_uppercase());

        for rule in &self.rules {
            if rule.matches(&padded_upper) {
                return rule.category.clone();
            }
        }

        DEFAULT_CATEGORY.to_string()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// All category names the classifier can produce.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.iter().map(|r| r.category.clone()).collect();
        names.push(DEFAULT_CATEGORY.to_string());
        names
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// STANDARD RULE TABLE
// ============================================================================

fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Demonstradores",
            &["DEM ", "DEMON", "DEMONSTRAD", " CJ ", "CJ ", " FLAC", "FLAC "],
        ),
        CategoryRule::new("Cabelos", &["SIAGE", "SIÀGE", "MATCH"]),
        CategoryRule::new(
            "Maquiagem",
            &[
                "GLAM", "PO COMP", " PO ", "CORR LIQ", " CORR ", "MASC CILIO", " MASC ",
                "BASE LIQ", "BASE STICK", " BASE ", " BAS ", "GLOSS", " GLOS ",
                "BLUSH LIQ", " BLUSH ", "BAT LIQ", " BAT ", " SOUL ", "BALM",
                "GLIT", "OIL SHIN", "PLT MULTIF", " PLT ", "CORRET", "LAP OLH",
                " ILUM ", "PRIMER", "SOMBRA", " SOMB ", "SOBRANC", " MAKE ",
                "FAC STICK", "HID LAB", "BATOM",
            ],
        ),
        CategoryRule::new("Perfumaria", &[" COL ", " EDP ", "EDP ", " COL"]),
        CategoryRule::new("Barba", &["BARB", "BARBA"]),
        CategoryRule::new(
            "Acessorios",
            &[
                "PINCEL", "PINCEIS", "NECESS", "NECESSAIRE", "PALETA", "MASSAG",
                "APONTADOR", "ESPONJA", "ESPNJ", "FRASQUEIRA", "VAPORIZADOR",
                "MALETA", "TOALHA", " CASE ", "BOLSA", "CURVADOR", " CLIP ",
                "PORTA ", "ESPELHO", "LENCO", " LUVA",
            ],
        ),
        CategoryRule::new(
            "Cuidados com a Pele",
            &[" CPO ", "CORPORAL", " MAO ", " MAOS ", " HID ", "INSTANCE CR"],
        ),
        CategoryRule::new(
            "Cuidados Faciais",
            &[" FAC ", "NEO DERMO", "NEO D", " SKIN ", "SKINQ", "FACIAL"],
        ),
        CategoryRule::new(
            "Desodorantes",
            &[" DES ", "ROLL ON", " AER ", "AEROSSOL", "ANTIT", " ANT ", " SPR ", "BDY SPR"],
        ),
        CategoryRule::new("Embalagens", &["SACOLA", "KIT TAG", " TAG "]),
        CategoryRule::new("Gifts", &["PMPCK", " ESTJ ", " KIT "]),
        CategoryRule::new("Sabonete Corpo", &["ESF CPO", "SAB BARR", " SAB ", " SHW ", "SHW GEL"]),
        CategoryRule::new("Solar", &[" SOL ", " PR ", " PROT ", "PROT "]),
        CategoryRule::new("Unhas", &["ESMLT", "ESMALTE"]),
        CategoryRule::new("Oleos", &[" OL ", "OLEO", "ÓLEO"]),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

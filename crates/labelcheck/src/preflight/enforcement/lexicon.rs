//! Detection vocabulary and pattern tables for the rule set.
//!
//! All tables are immutable data injected at engine construction, so tests
//! can swap trimmed tables without touching the rules.

use regex::Regex;

/// Character window around the product-name token inside which a percentage
/// counts as a QUID declaration.
pub const QUID_WINDOW: usize = 80;

/// Maximum character distance between a company-form token and a
/// street/postal token for both to count as one address.
pub const ADDRESS_WINDOW: usize = 160;

#[derive(Debug, Clone)]
pub struct Lexicon {
    /// Country of sale (lowercased) to accepted language codes.
    pub country_languages: &'static [(&'static str, &'static [&'static str])],
    /// Language code to marker words used for detection in evidence text.
    pub language_markers: &'static [(&'static str, &'static [&'static str])],
    pub ingredient_headers: &'static [&'static str],
    pub allergens: &'static [&'static str],
    pub date_vocab: &'static [&'static str],
    pub storage_vocab: &'static [&'static str],
    /// Legal-form tokens matched against whole words (dots stripped).
    pub company_forms: &'static [&'static str],
    pub street_tokens: &'static [&'static str],
    pub nutrition_vocab: &'static [&'static str],
    /// Multi-word claim phrases, substring-matched.
    pub claim_phrases: &'static [&'static str],
    /// Single-word claim tokens, whole-word-matched.
    pub claim_tokens: &'static [&'static str],
    /// Grammatical words skipped when picking the QUID anchor token.
    pub stopwords: &'static [&'static str],
    pub halal_pork: &'static [&'static str],
    pub halal_alcohol: &'static [&'static str],
    pub halal_gelatine: &'static [&'static str],
    pub halal_additives: &'static [&'static str],
    pub percent: Regex,
    pub net_quantity: Regex,
    pub postal_code: Regex,
}

impl Lexicon {
    pub fn standard() -> Self {
        Self {
            country_languages: COUNTRY_LANGUAGES,
            language_markers: LANGUAGE_MARKERS,
            ingredient_headers: INGREDIENT_HEADERS,
            allergens: ALLERGENS,
            date_vocab: DATE_VOCAB,
            storage_vocab: STORAGE_VOCAB,
            company_forms: COMPANY_FORMS,
            street_tokens: STREET_TOKENS,
            nutrition_vocab: NUTRITION_VOCAB,
            claim_phrases: CLAIM_PHRASES,
            claim_tokens: CLAIM_TOKENS,
            stopwords: STOPWORDS,
            halal_pork: HALAL_PORK,
            halal_alcohol: HALAL_ALCOHOL,
            halal_gelatine: HALAL_GELATINE,
            halal_additives: HALAL_ADDITIVES,
            percent: Regex::new(r"\d+(?:[.,]\d+)?\s?%").expect("static pattern compiles"),
            net_quantity: Regex::new(r"(?i)\b\d+(?:[.,]\d+)?\s?(?:kg|g|mg|l|cl|ml)\b")
                .expect("static pattern compiles"),
            postal_code: Regex::new(r"\b\d{4,5}\b").expect("static pattern compiles"),
        }
    }

    /// Accepted language codes for a country of sale, if the country is known.
    pub fn accepted_languages(&self, country: &str) -> Option<&'static [&'static str]> {
        let needle = country.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.country_languages
            .iter()
            .find(|(name, _)| *name == needle)
            .map(|(_, codes)| *codes)
    }
}

const COUNTRY_LANGUAGES: &[(&str, &[&str])] = &[
    ("austria", &["de"]),
    ("belgium", &["nl", "fr", "de"]),
    ("bulgaria", &["bg"]),
    ("croatia", &["hr"]),
    ("cyprus", &["el", "en"]),
    ("czech republic", &["cs"]),
    ("czechia", &["cs"]),
    ("denmark", &["da"]),
    ("estonia", &["et"]),
    ("finland", &["fi", "sv"]),
    ("france", &["fr"]),
    ("germany", &["de"]),
    ("greece", &["el"]),
    ("hungary", &["hu"]),
    ("ireland", &["en", "ga"]),
    ("italy", &["it"]),
    ("latvia", &["lv"]),
    ("lithuania", &["lt"]),
    ("luxembourg", &["fr", "de", "lb"]),
    ("malta", &["mt", "en"]),
    ("netherlands", &["nl"]),
    ("the netherlands", &["nl"]),
    ("poland", &["pl"]),
    ("portugal", &["pt"]),
    ("romania", &["ro"]),
    ("slovakia", &["sk"]),
    ("slovenia", &["sl"]),
    ("spain", &["es"]),
    ("sweden", &["sv"]),
];

const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    (
        "en",
        &["ingredients", "best before", "store in", "nutrition", "net weight"],
    ),
    (
        "it",
        &[
            "ingredienti",
            "da consumarsi",
            "conservare",
            "valori nutrizionali",
            "prodotto in",
        ],
    ),
    (
        "fr",
        &[
            "ingrédients",
            "à consommer",
            "conserver",
            "valeurs nutritionnelles",
            "poids net",
        ],
    ),
    (
        "de",
        &[
            "zutaten",
            "mindestens haltbar",
            "kühl lagern",
            "nährwerte",
            "nettogewicht",
        ],
    ),
    (
        "es",
        &[
            "ingredientes",
            "consumir preferentemente",
            "conservar en",
            "información nutricional",
            "peso neto",
        ],
    ),
    (
        "nl",
        &[
            "ingrediënten",
            "ten minste houdbaar",
            "bewaren",
            "voedingswaarde",
            "nettogewicht",
        ],
    ),
    (
        "pt",
        &[
            "ingredientes",
            "consumir de preferência",
            "conservar em",
            "declaração nutricional",
        ],
    ),
    (
        "pl",
        &[
            "składniki",
            "najlepiej spożyć",
            "przechowywać",
            "wartość odżywcza",
        ],
    ),
];

const INGREDIENT_HEADERS: &[&str] = &[
    "ingredients",
    "ingredienti",
    "ingrédients",
    "ingredientes",
    "ingrediënten",
    "zutaten",
    "składniki",
    "ingredienser",
];

const ALLERGENS: &[&str] = &[
    // Annex II categories with common it/fr/de/es/nl renderings.
    "gluten", "glutine", "wheat", "frumento", "grano", "blé", "weizen", "trigo", "tarwe", "barley",
    "orzo", "rye", "segale", "milk", "latte", "lait", "milch", "leche", "melk", "lactose",
    "lattosio", "egg", "eggs", "uova", "uovo", "oeuf", "œuf", "ei", "eier", "huevo", "peanut",
    "peanuts", "arachidi", "arachide", "cacahuete", "erdnuss", "erdnüsse", "pinda", "soy", "soya",
    "soia", "soja", "nuts", "hazelnut", "hazelnuts", "nocciola", "nocciole", "noisette",
    "haselnuss", "haselnüsse", "avellana", "almond", "almonds", "mandorla", "mandorle", "amande",
    "mandel", "mandeln", "almendra", "walnut", "walnuts", "noce", "noci", "noix", "walnuss",
    "nuez", "cashew", "anacardi", "pistachio", "pistachios", "pistacchio", "pistacchi",
    "pistache", "pistazie", "pistacho", "fish", "pesce", "poisson", "fisch", "pescado",
    "crustacean", "crustaceans", "crostacei", "crustacés", "krebstiere", "crustáceos", "mollusc",
    "molluscs", "molluschi", "mollusques", "weichtiere", "moluscos", "celery", "sedano",
    "céleri", "sellerie", "apio", "mustard", "senape", "moutarde", "senf", "mostaza", "sesame",
    "sesamo", "sésame", "sesam", "sésamo", "lupin", "lupini", "lupinen", "altramuces",
    "sulphites", "sulfites", "solfiti", "sulfite", "sulfitos",
];

const DATE_VOCAB: &[&str] = &[
    "best before",
    "best-before",
    "use by",
    "use-by",
    "da consumarsi entro",
    "da consumarsi preferibilmente",
    "à consommer de préférence",
    "à consommer jusqu",
    "mindestens haltbar bis",
    "zu verbrauchen bis",
    "consumir preferentemente antes",
    "fecha de caducidad",
    "ten minste houdbaar tot",
    "należy spożyć do",
];

const STORAGE_VOCAB: &[&str] = &[
    "store in",
    "keep refrigerated",
    "keep cool",
    "keep in a cool",
    "once opened",
    "refrigerate after opening",
    "conservare",
    "una volta aperto",
    "conserver au",
    "conserver dans",
    "après ouverture",
    "kühl lagern",
    "kühl und trocken",
    "nach dem öffnen",
    "consérvese",
    "conservar en",
    "una vez abierto",
    "koel bewaren",
    "na opening",
];

// Compared against whole tokens with dots stripped, so "S.p.A." and "Ltd."
// match without substring false hits.
const COMPANY_FORMS: &[&str] = &[
    "ltd", "limited", "plc", "llc", "srl", "srls", "spa", "snc", "gmbh", "ag", "sas", "sarl",
    "sa", "bv", "nv", "oy", "ab", "aps", "kft",
];

const STREET_TOKENS: &[&str] = &[
    "street", "road", "avenue", "lane", "via", "viale", "piazza", "corso", "strada", "rue",
    "allée", "straße", "strasse", "str", "platz", "weg", "calle", "avenida", "plaza", "laan",
    "straat",
];

const NUTRITION_VOCAB: &[&str] = &[
    "nutrition",
    "nutritional",
    "per 100 g",
    "per 100g",
    "per 100 ml",
    "per 100ml",
    "valori nutrizionali",
    "dichiarazione nutrizionale",
    "per 100",
    "nährwerte",
    "nährwertdeklaration",
    "valeurs nutritionnelles",
    "déclaration nutritionnelle",
    "información nutricional",
    "voedingswaarde",
    "energy",
    "energia",
    "énergie",
    "kcal",
];

const CLAIM_PHRASES: &[&str] = &[
    "high in",
    "rich in",
    "source of",
    "low fat",
    "low in fat",
    "fat free",
    "fat-free",
    "no added sugar",
    "sugar free",
    "sugar-free",
    "high protein",
    "boosts immunity",
    "good for",
    "ricco di",
    "fonte di",
    "senza zuccheri aggiunti",
    "a basso contenuto",
    "riche en",
    "source de",
    "sans sucres ajoutés",
    "reich an",
    "ohne zuckerzusatz",
    "alto contenido",
    "bajo en",
    "fuente de",
    "sin azúcares añadidos",
];

const CLAIM_TOKENS: &[&str] = &[
    "light",
    "lite",
    "superfood",
    "detox",
    "antioxidant",
    "probiotic",
    "wholesome",
    "allégé",
    "zuckerfrei",
    "fettarm",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "with", "in", "my", "our", "premium", "di", "del", "della",
    "dello", "al", "alla", "la", "il", "lo", "le", "gli", "de", "du", "des", "les", "el", "los",
    "las", "un", "une", "una", "der", "die", "das", "und", "mit", "von", "y", "con", "em", "da",
    "do", "van", "met",
];

const HALAL_PORK: &[&str] = &[
    "pork", "lard", "bacon", "ham", "gammon", "maiale", "suino", "strutto", "pancetta", "porc",
    "saindoux", "schwein", "schweinefleisch", "schweineschmalz", "speck", "cerdo",
    "manteca de cerdo", "varkensvlees", "reuzel",
];

const HALAL_ALCOHOL: &[&str] = &[
    "alcohol", "alcol", "alcool", "ethanol", "etanolo", "wine", "vino", "vin", "wein", "beer",
    "birra", "bière", "bier", "cerveza", "rum", "brandy", "liqueur", "liquore", "licor",
    "marsala", "kirsch", "bourbon", "whisky",
];

const HALAL_GELATINE: &[&str] = &["gelatin", "gelatine", "gelatina", "gélatine"];

const HALAL_ADDITIVES: &[&str] = &[
    "e120", "e 120", "cochineal", "carmine", "carminio", "e441", "e 441", "e542", "e 542",
    "e904", "e 904", "shellac", "e920", "e 920", "l-cysteine", "l cysteine",
];

//! Per-check detection rules.
//!
//! Every rule recomputes one canonical check from the scan corpus alone.
//! Rules only ever see label-derived text; prompt material never reaches
//! them. Single-word terms are matched against whole tokens (dots
//! stripped), multi-word or hyphenated terms as substrings of the lowered
//! corpus.

use super::lexicon::{Lexicon, ADDRESS_WINDOW, QUID_WINDOW};
use crate::preflight::domain::{CanonicalCheck, Check, CheckStatus, ProductFields, Severity};
use crate::preflight::evidence::EvidenceBundle;

/// Lowered, tokenized view of the label-derived evidence text.
#[derive(Debug, Clone)]
pub(crate) struct ScanCorpus {
    /// Original casing, for emphasis-cue detection.
    original: String,
    lowered: String,
    /// Each raw block lowered, for the per-block QUID search.
    block_lowered: Vec<String>,
    tokens: Vec<CorpusToken>,
}

#[derive(Debug, Clone)]
struct CorpusToken {
    offset: usize,
    text: String,
}

impl ScanCorpus {
    pub(crate) fn build(bundle: &EvidenceBundle, transcription: Option<&str>) -> Self {
        let mut parts: Vec<&str> = bundle.label_blocks().map(|block| block.text.as_str()).collect();
        if let Some(text) = transcription {
            if !text.trim().is_empty() {
                parts.push(text);
            }
        }

        let original = parts.join("\n");
        let lowered = original.to_lowercase();
        let block_lowered = parts.iter().map(|part| part.to_lowercase()).collect();
        let tokens = tokenize(&lowered);

        Self {
            original,
            lowered,
            block_lowered,
            tokens,
        }
    }

    pub(crate) fn has_text(&self) -> bool {
        !self.lowered.trim().is_empty()
    }

    fn has_token(&self, term: &str) -> bool {
        self.tokens.iter().any(|token| token.text == term)
    }

    fn has_phrase(&self, phrase: &str) -> bool {
        self.lowered.contains(phrase)
    }

    /// Terms found in the corpus, deduplicated, input order preserved.
    /// Single-word terms match whole tokens; the rest match as substrings.
    pub(crate) fn find_terms<'a>(&self, terms: &[&'a str]) -> Vec<&'a str> {
        let mut hits = Vec::new();
        for &term in terms {
            let found = if term.contains(' ') || term.contains('-') {
                self.has_phrase(term)
            } else {
                self.has_token(term)
            };
            if found && !hits.contains(&term) {
                hits.push(term);
            }
        }
        hits
    }

    /// Byte offsets of every occurrence of the given terms, ascending.
    pub(crate) fn term_offsets(&self, terms: &[&str]) -> Vec<usize> {
        let mut offsets = Vec::new();
        for &term in terms {
            if term.contains(' ') || term.contains('-') {
                offsets.extend(self.lowered.match_indices(term).map(|(idx, _)| idx));
            } else {
                offsets.extend(
                    self.tokens
                        .iter()
                        .filter(|token| token.text == term)
                        .map(|token| token.offset),
                );
            }
        }
        offsets.sort_unstable();
        offsets
    }
}

fn tokenize(lowered: &str) -> Vec<CorpusToken> {
    let mut tokens = Vec::new();
    let mut run_start = None;

    for (idx, c) in lowered.char_indices() {
        if c.is_alphanumeric() || c == '.' {
            run_start.get_or_insert(idx);
        } else if let Some(start) = run_start.take() {
            push_token(&mut tokens, start, &lowered[start..idx]);
        }
    }
    if let Some(start) = run_start {
        push_token(&mut tokens, start, &lowered[start..]);
    }

    tokens
}

fn push_token(tokens: &mut Vec<CorpusToken>, offset: usize, raw: &str) {
    let text: String = raw.chars().filter(|c| *c != '.').collect();
    if !text.is_empty() {
        tokens.push(CorpusToken { offset, text });
    }
}

/// Recomputes the preferred value of one canonical check from the evidence.
pub(crate) fn derive_check(
    check: CanonicalCheck,
    lexicon: &Lexicon,
    fields: &ProductFields,
    corpus: &ScanCorpus,
) -> Check {
    match check {
        CanonicalCheck::SalesName => sales_name(fields),
        CanonicalCheck::IngredientList => ingredient_list(lexicon, corpus),
        CanonicalCheck::AllergenEmphasis => allergen_emphasis(lexicon, corpus),
        CanonicalCheck::Quid => quid(lexicon, fields, corpus),
        CanonicalCheck::NetQuantity => net_quantity(lexicon, corpus),
        CanonicalCheck::DateMarking => date_marking(lexicon, corpus),
        CanonicalCheck::StorageUse => storage_use(lexicon, corpus),
        CanonicalCheck::BusinessAddress => business_address(lexicon, corpus),
        CanonicalCheck::NutritionDeclaration => nutrition_declaration(lexicon, corpus),
        CanonicalCheck::LanguageCompliance => language_compliance(lexicon, fields, corpus),
        CanonicalCheck::Claims => claims(lexicon, corpus),
    }
}

fn found(check: CanonicalCheck, detail: String, sources: &[&str]) -> Check {
    let mut result = Check::new(check, CheckStatus::Ok, Severity::Low);
    result.detail = detail;
    result.sources = sources.iter().map(|s| s.to_string()).collect();
    result
}

fn not_found(check: CanonicalCheck, detail: String, fix: &str, sources: &[&str]) -> Check {
    let mut result = Check::new(check, CheckStatus::Missing, check.missing_severity());
    result.detail = detail;
    result.fix = fix.to_string();
    result.sources = sources.iter().map(|s| s.to_string()).collect();
    result
}

fn issue(
    check: CanonicalCheck,
    severity: Severity,
    detail: String,
    fix: &str,
    sources: &[&str],
) -> Check {
    let mut result = Check::new(check, CheckStatus::Issue, severity);
    result.detail = detail;
    result.fix = fix.to_string();
    result.sources = sources.iter().map(|s| s.to_string()).collect();
    result
}

fn sales_name(fields: &ProductFields) -> Check {
    let name = fields.product_name.trim();
    if name.is_empty() {
        not_found(
            CanonicalCheck::SalesName,
            "no product name was supplied and none could be derived".to_string(),
            "state the legal or customary name of the food on the principal display",
            &["Art. 9(1)(a)", "Art. 17"],
        )
    } else {
        found(
            CanonicalCheck::SalesName,
            format!("product is sold as \"{name}\""),
            &["Art. 9(1)(a)", "Art. 17"],
        )
    }
}

fn ingredient_list(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let hits = corpus.find_terms(lexicon.ingredient_headers);
    if let Some(header) = hits.first() {
        found(
            CanonicalCheck::IngredientList,
            format!("ingredient list header \"{header}\" located on the label"),
            &["Art. 9(1)(b)", "Art. 18"],
        )
    } else {
        not_found(
            CanonicalCheck::IngredientList,
            "no ingredient list header found in the label evidence".to_string(),
            "add a list of ingredients introduced by a heading that includes the word 'ingredients'",
            &["Art. 9(1)(b)", "Art. 18"],
        )
    }
}

fn allergen_emphasis(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let hits = corpus.find_terms(lexicon.allergens);
    if hits.is_empty() {
        return not_found(
            CanonicalCheck::AllergenEmphasis,
            "no Annex II allergen vocabulary located on the label evidence".to_string(),
            "confirm whether any Annex II allergen is present and declare it with emphasis if so",
            &["Art. 9(1)(c)", "Annex II"],
        );
    }

    let listed = hits.join(", ");
    if has_emphasis_cue(corpus, &hits) {
        found(
            CanonicalCheck::AllergenEmphasis,
            format!("allergen terms emphasised on the label: {listed}"),
            &["Art. 9(1)(c)", "Art. 21", "Annex II"],
        )
    } else {
        issue(
            CanonicalCheck::AllergenEmphasis,
            Severity::Medium,
            format!("allergen terms present without visible emphasis: {listed}"),
            "emphasise each Annex II allergen inside the ingredient list, e.g. bold or capitals",
            &["Art. 9(1)(c)", "Art. 21", "Annex II"],
        )
    }
}

/// Emphasis counts when the label carries markup bold, HTML bold tags, or
/// any found allergen rendered in capitals.
fn has_emphasis_cue(corpus: &ScanCorpus, hits: &[&str]) -> bool {
    let original = corpus.original.as_str();
    if original.matches("**").count() >= 2 {
        return true;
    }
    let lowered = corpus.lowered.as_str();
    if lowered.contains("<b>") || lowered.contains("<strong>") {
        return true;
    }
    hits.iter()
        .any(|hit| hit.chars().count() >= 3 && original.contains(hit.to_uppercase().as_str()))
}

fn quid(lexicon: &Lexicon, fields: &ProductFields, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(d)", "Art. 22"];
    let Some(anchor) = quid_anchor(lexicon, &fields.product_name) else {
        return not_found(
            CanonicalCheck::Quid,
            "no product name to anchor a quantitative ingredient search on".to_string(),
            "declare the percentage of the ingredient that gives the food its name",
            sources,
        );
    };

    let mut haystacks: Vec<&str> = vec![corpus.lowered.as_str()];
    haystacks.extend(corpus.block_lowered.iter().map(String::as_str));

    for haystack in haystacks {
        if percentage_near_anchor(lexicon, haystack, &anchor) {
            return found(
                CanonicalCheck::Quid,
                format!(
                    "percentage declaration found within {QUID_WINDOW} characters of \"{anchor}\""
                ),
                sources,
            );
        }
    }

    issue(
        CanonicalCheck::Quid,
        Severity::High,
        format!("no percentage declaration found near \"{anchor}\" anywhere in the evidence"),
        "add the QUID percentage next to the emphasised ingredient, e.g. \"pistachio 45%\"",
        sources,
    )
}

/// First meaningful token of the product name: lowercased, split on
/// non-alphanumeric characters, at least three characters, not a stopword.
fn quid_anchor(lexicon: &Lexicon, product_name: &str) -> Option<String> {
    product_name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .find(|token| token.chars().count() >= 3 && !lexicon.stopwords.contains(token))
        .map(str::to_string)
}

fn percentage_near_anchor(lexicon: &Lexicon, haystack: &str, anchor: &str) -> bool {
    for (start, end) in word_runs(haystack) {
        if !anchor_matches(&haystack[start..end], anchor) {
            continue;
        }

        let before: String = haystack[..start]
            .chars()
            .rev()
            .take(QUID_WINDOW)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let after: String = haystack[end..].chars().take(QUID_WINDOW).collect();
        let window = format!("{before}{}{after}", &haystack[start..end]);
        if lexicon.percent.is_match(&window) {
            return true;
        }
    }
    false
}

/// Byte ranges of the alphanumeric runs in `haystack`.
fn word_runs(haystack: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start = None;
    for (idx, c) in haystack.char_indices() {
        if c.is_alphanumeric() {
            run_start.get_or_insert(idx);
        } else if let Some(start) = run_start.take() {
            runs.push((start, idx));
        }
    }
    if let Some(start) = run_start {
        runs.push((start, haystack.len()));
    }
    runs
}

/// A word counts as the product-name anchor when it equals it, or when both
/// share a six-character stem. The stem rule lets close cognates line up,
/// e.g. "pistachio" against the Italian "pistacchio".
fn anchor_matches(word: &str, anchor: &str) -> bool {
    if word == anchor {
        return true;
    }
    const STEM_CHARS: usize = 6;
    let mut shared = 0;
    let mut word_chars = word.chars();
    let mut anchor_chars = anchor.chars();
    loop {
        match (word_chars.next(), anchor_chars.next()) {
            (Some(a), Some(b)) if a == b => shared += 1,
            _ => return false,
        }
        if shared == STEM_CHARS {
            return true;
        }
    }
}

fn net_quantity(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(e)", "Art. 23"];
    if lexicon.net_quantity.is_match(&corpus.lowered) || corpus.lowered.contains('℮') {
        found(
            CanonicalCheck::NetQuantity,
            "net quantity stated with a legal unit".to_string(),
            sources,
        )
    } else {
        not_found(
            CanonicalCheck::NetQuantity,
            "no net quantity with a legal unit (g, kg, ml, l) found".to_string(),
            "state the net quantity in grams, kilograms, millilitres or litres",
            sources,
        )
    }
}

fn date_marking(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(f)", "Art. 24"];
    let hits = corpus.find_terms(lexicon.date_vocab);
    if let Some(marker) = hits.first() {
        found(
            CanonicalCheck::DateMarking,
            format!("durability wording \"{marker}\" present"),
            sources,
        )
    } else {
        not_found(
            CanonicalCheck::DateMarking,
            "no 'best before' or 'use by' wording found".to_string(),
            "add the appropriate date marking: 'use by' for perishable foods, otherwise 'best before'",
            sources,
        )
    }
}

fn storage_use(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(g)", "Art. 25"];
    let hits = corpus.find_terms(lexicon.storage_vocab);
    if let Some(marker) = hits.first() {
        found(
            CanonicalCheck::StorageUse,
            format!("storage instruction \"{marker}\" present"),
            sources,
        )
    } else {
        not_found(
            CanonicalCheck::StorageUse,
            "no storage or conditions-of-use instruction found".to_string(),
            "add storage conditions where the food requires them, e.g. 'once opened keep refrigerated'",
            sources,
        )
    }
}

fn business_address(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(h)", "Art. 8"];
    let company_offsets: Vec<usize> = corpus
        .tokens
        .iter()
        .filter(|token| lexicon.company_forms.contains(&token.text.as_str()))
        .map(|token| token.offset)
        .collect();

    let mut place_offsets: Vec<usize> = corpus
        .tokens
        .iter()
        .filter(|token| lexicon.street_tokens.contains(&token.text.as_str()))
        .map(|token| token.offset)
        .collect();
    place_offsets.extend(lexicon.postal_code.find_iter(&corpus.lowered).map(|m| m.start()));

    let paired = company_offsets.iter().any(|&company| {
        place_offsets
            .iter()
            .any(|&place| company.abs_diff(place) <= ADDRESS_WINDOW)
    });

    if paired {
        found(
            CanonicalCheck::BusinessAddress,
            "business name with a nearby street or postal element found".to_string(),
            sources,
        )
    } else {
        let detail = if company_offsets.is_empty() && place_offsets.is_empty() {
            "no food business operator name or address found".to_string()
        } else if company_offsets.is_empty() {
            "address elements present but no business legal form found nearby".to_string()
        } else {
            "business legal form present but no street or postal element found nearby".to_string()
        };
        not_found(
            CanonicalCheck::BusinessAddress,
            detail,
            "print the responsible operator's business name and full EU postal address",
            sources,
        )
    }
}

fn nutrition_declaration(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 9(1)(l)", "Art. 30"];
    let hits = corpus.find_terms(lexicon.nutrition_vocab);
    if let Some(marker) = hits.first() {
        found(
            CanonicalCheck::NutritionDeclaration,
            format!("nutrition declaration wording \"{marker}\" present"),
            sources,
        )
    } else {
        not_found(
            CanonicalCheck::NutritionDeclaration,
            "no nutrition declaration or per-100g/ml table found".to_string(),
            "add the mandatory nutrition declaration per 100 g or 100 ml",
            sources,
        )
    }
}

fn language_compliance(lexicon: &Lexicon, fields: &ProductFields, corpus: &ScanCorpus) -> Check {
    let sources = &["Art. 15"];
    let country = fields.country_of_sale.trim();
    if country.is_empty() {
        return not_found(
            CanonicalCheck::LanguageCompliance,
            "no country of sale supplied; cannot establish the required language".to_string(),
            "state the country of sale so the mandatory language can be verified",
            sources,
        );
    }

    let Some(accepted) = lexicon.accepted_languages(country) else {
        return not_found(
            CanonicalCheck::LanguageCompliance,
            format!("country of sale \"{country}\" is not in the recognised market table"),
            "verify the official language requirements of the market of sale",
            sources,
        );
    };

    let mut present: Vec<&str> = fields
        .languages_provided
        .iter()
        .filter_map(|raw| normalized_language(raw))
        .collect();
    for (code, markers) in lexicon.language_markers {
        if !present.contains(code) && !corpus.find_terms(markers).is_empty() {
            present.push(code);
        }
    }

    let acceptable: Vec<&str> = present
        .iter()
        .copied()
        .filter(|code| accepted.contains(code))
        .collect();

    if acceptable.is_empty() {
        issue(
            CanonicalCheck::LanguageCompliance,
            Severity::Medium,
            format!(
                "none of the provided or detected languages [{}] satisfy {country} (accepts: {})",
                present.join(", "),
                accepted.join(", ")
            ),
            "translate the mandatory particulars into an official language of the country of sale",
            sources,
        )
    } else {
        found(
            CanonicalCheck::LanguageCompliance,
            format!(
                "language(s) [{}] accepted for sale in {country}",
                acceptable.join(", ")
            ),
            sources,
        )
    }
}

/// Primary subtag of a declared language, e.g. "it-IT" resolves to "it".
fn normalized_language(raw: &str) -> Option<&str> {
    let primary = raw.trim().split(['-', '_']).next()?.trim();
    if primary.is_empty() {
        None
    } else {
        Some(primary)
    }
}

fn claims(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let sources = &["Reg. (EC) 1924/2006"];
    if !corpus.has_text() {
        return not_found(
            CanonicalCheck::Claims,
            "no machine-readable text available to scan for claims".to_string(),
            "provide label text or a readable scan so claim wording can be reviewed",
            sources,
        );
    }

    let mut hits = corpus.find_terms(lexicon.claim_phrases);
    for hit in corpus.find_terms(lexicon.claim_tokens) {
        if !hits.contains(&hit) {
            hits.push(hit);
        }
    }

    if hits.is_empty() {
        found(
            CanonicalCheck::Claims,
            "no nutrition or health claim wording detected".to_string(),
            sources,
        )
    } else {
        issue(
            CanonicalCheck::Claims,
            Severity::Medium,
            format!("claim wording detected: {}", hits.join(", ")),
            "substantiate each claim under Reg. (EC) 1924/2006 or remove it",
            sources,
        )
    }
}

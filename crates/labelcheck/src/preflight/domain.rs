use serde::{Deserialize, Serialize};

/// Tri-state outcome of a single compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Issue,
    Missing,
}

impl CheckStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Issue => "issue",
            CheckStatus::Missing => "missing",
        }
    }

    /// Lenient parse of model-emitted statuses. Unknown values resolve to
    /// `None`; callers decide how ambiguity degrades.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" | "pass" => Some(Self::Ok),
            "issue" | "warn" | "warning" => Some(Self::Issue),
            "missing" | "absent" => Some(Self::Missing),
            _ => None,
        }
    }
}

/// Weight attached to a non-compliant finding. Ordering is `low < medium < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" | "critical" => Some(Self::High),
            _ => None,
        }
    }
}

/// The fixed set of EU 1169/2011 particulars every report carries exactly once,
/// in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalCheck {
    SalesName,
    IngredientList,
    AllergenEmphasis,
    Quid,
    NetQuantity,
    DateMarking,
    StorageUse,
    BusinessAddress,
    NutritionDeclaration,
    LanguageCompliance,
    Claims,
}

impl CanonicalCheck {
    pub const ALL: [CanonicalCheck; 11] = [
        CanonicalCheck::SalesName,
        CanonicalCheck::IngredientList,
        CanonicalCheck::AllergenEmphasis,
        CanonicalCheck::Quid,
        CanonicalCheck::NetQuantity,
        CanonicalCheck::DateMarking,
        CanonicalCheck::StorageUse,
        CanonicalCheck::BusinessAddress,
        CanonicalCheck::NutritionDeclaration,
        CanonicalCheck::LanguageCompliance,
        CanonicalCheck::Claims,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            CanonicalCheck::SalesName => "sales_name",
            CanonicalCheck::IngredientList => "ingredient_list",
            CanonicalCheck::AllergenEmphasis => "allergen_emphasis",
            CanonicalCheck::Quid => "quid",
            CanonicalCheck::NetQuantity => "net_quantity",
            CanonicalCheck::DateMarking => "date_marking",
            CanonicalCheck::StorageUse => "storage_use",
            CanonicalCheck::BusinessAddress => "business_address",
            CanonicalCheck::NutritionDeclaration => "nutrition_declaration",
            CanonicalCheck::LanguageCompliance => "language_compliance",
            CanonicalCheck::Claims => "claims",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            CanonicalCheck::SalesName => "Sales name",
            CanonicalCheck::IngredientList => "Ingredient list",
            CanonicalCheck::AllergenEmphasis => "Allergen emphasis",
            CanonicalCheck::Quid => "QUID",
            CanonicalCheck::NetQuantity => "Net quantity",
            CanonicalCheck::DateMarking => "Date marking",
            CanonicalCheck::StorageUse => "Storage and conditions of use",
            CanonicalCheck::BusinessAddress => "Business name and address",
            CanonicalCheck::NutritionDeclaration => "Nutrition declaration",
            CanonicalCheck::LanguageCompliance => "Language compliance",
            CanonicalCheck::Claims => "Nutrition and health claims",
        }
    }

    /// Severity applied when the particular is absent from the evidence.
    pub const fn missing_severity(self) -> Severity {
        match self {
            CanonicalCheck::Quid => Severity::High,
            CanonicalCheck::SalesName
            | CanonicalCheck::IngredientList
            | CanonicalCheck::NetQuantity
            | CanonicalCheck::NutritionDeclaration
            | CanonicalCheck::LanguageCompliance
            | CanonicalCheck::Claims => Severity::Medium,
            CanonicalCheck::AllergenEmphasis
            | CanonicalCheck::DateMarking
            | CanonicalCheck::StorageUse
            | CanonicalCheck::BusinessAddress => Severity::Low,
        }
    }

    /// Maps a model-emitted check id or title onto a canonical id.
    ///
    /// Exact id equality wins outright; otherwise title aliases are tried in
    /// most-specific-first order so e.g. "Quantitative Ingredient Declaration"
    /// lands on QUID rather than the ingredient list, and "Nutrition and
    /// health claims" on claims rather than the nutrition declaration.
    pub fn classify(raw: &str) -> Option<CanonicalCheck> {
        let needle = raw.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }

        for check in Self::ALL {
            if needle == check.id() {
                return Some(check);
            }
        }

        const ALIASES: [(CanonicalCheck, &[&str]); 11] = [
            (
                CanonicalCheck::Quid,
                &["quid", "quantitative ingredient"],
            ),
            (CanonicalCheck::Claims, &["claim"]),
            (CanonicalCheck::AllergenEmphasis, &["allergen"]),
            (
                CanonicalCheck::NetQuantity,
                &["net quantity", "net weight", "net content"],
            ),
            (
                CanonicalCheck::DateMarking,
                &["date marking", "best before", "use by", "durability"],
            ),
            (
                CanonicalCheck::StorageUse,
                &["storage", "conditions of use", "instructions for use"],
            ),
            (
                CanonicalCheck::BusinessAddress,
                &["address", "business name", "operator"],
            ),
            (CanonicalCheck::LanguageCompliance, &["language"]),
            (CanonicalCheck::NutritionDeclaration, &["nutrition"]),
            (CanonicalCheck::IngredientList, &["ingredient"]),
            (
                CanonicalCheck::SalesName,
                &["sales name", "name of the food", "product name", "denomination"],
            ),
        ];

        for (check, aliases) in ALIASES {
            if aliases.iter().any(|alias| needle.contains(alias)) {
                return Some(check);
            }
        }

        None
    }
}

/// Atomic unit of the compliance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub title: String,
    pub status: CheckStatus,
    pub severity: Severity,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub fix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl Check {
    pub fn new(check: CanonicalCheck, status: CheckStatus, severity: Severity) -> Self {
        Self {
            id: check.id().to_string(),
            title: check.title().to_string(),
            status,
            severity,
            detail: String::new(),
            fix: String::new(),
            sources: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Overall verdict derived from the final check list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pass,
    Caution,
    Fail,
}

impl OverallStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OverallStatus::Pass => "pass",
            OverallStatus::Caution => "caution",
            OverallStatus::Fail => "fail",
        }
    }
}

/// Product facts carried on the report; model-supplied values win only when
/// non-empty, otherwise caller fields fill them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country_of_sale: String,
    #[serde(default)]
    pub languages_provided: Vec<String>,
}

/// Finished compliance report returned to the caller and laid out as a PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: String,
    pub product: ReportProduct,
    pub overall_status: OverallStatus,
    pub summary: String,
    pub checks: Vec<Check>,
    pub score: u8,
}

pub const REPORT_VERSION: &str = "1.0";

impl Report {
    /// A report awaiting scoring; `score`/`overall_status` are placeholders
    /// until [`crate::preflight::scoring::finalize`] runs.
    pub fn draft(product: ReportProduct, summary: String, checks: Vec<Check>) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            product,
            overall_status: OverallStatus::Caution,
            summary,
            checks,
            score: 0,
        }
    }
}

/// Caller-supplied product metadata, immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_email: String,
    #[serde(default)]
    pub country_of_sale: String,
    #[serde(default)]
    pub languages_provided: Vec<String>,
    #[serde(default = "default_shipping_scope")]
    pub shipping_scope: String,
    #[serde(default = "default_product_category")]
    pub product_category: String,
}

fn default_shipping_scope() -> String {
    "local".to_string()
}

fn default_product_category() -> String {
    "general".to_string()
}

impl Default for ProductFields {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            company_name: String::new(),
            company_email: String::new(),
            country_of_sale: String::new(),
            languages_provided: Vec::new(),
            shipping_scope: default_shipping_scope(),
            product_category: default_product_category(),
        }
    }
}

/// Base64 file payload attached to a preflight request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub base64: String,
}

/// Full preflight request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightRequest {
    #[serde(flatten)]
    pub fields: ProductFields,
    #[serde(default)]
    pub reference_docs_text: String,
    #[serde(default)]
    pub halal_audit: bool,
    #[serde(default)]
    pub label_image_data_url: Option<String>,
    #[serde(default)]
    pub label_pdf_file: Option<UploadedFile>,
    #[serde(default)]
    pub tds_file: Option<UploadedFile>,
    #[serde(default = "default_true")]
    pub return_pdf: bool,
    #[serde(default = "default_true")]
    pub attach_pdf: bool,
    #[serde(default = "default_true")]
    pub include_halal_page: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreflightRequest {
    fn default() -> Self {
        Self {
            fields: ProductFields::default(),
            reference_docs_text: String::new(),
            halal_audit: false,
            label_image_data_url: None,
            label_pdf_file: None,
            tds_file: None,
            return_pdf: true,
            attach_pdf: true,
            include_halal_page: true,
        }
    }
}

impl PreflightRequest {
    /// A request carries label evidence when it has either an image data URL
    /// or a PDF payload; requests without both are rejected before the
    /// pipeline runs.
    pub fn has_label_evidence(&self) -> bool {
        let has_image = self
            .label_image_data_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        let has_pdf = self
            .label_pdf_file
            .as_ref()
            .is_some_and(|file| !file.base64.trim().is_empty());
        has_image || has_pdf
    }
}

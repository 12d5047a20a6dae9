//! Report rendering.
//!
//! Lays the finalized report out as a US-Letter PDF: cover header with the
//! verification stamp, product metadata, the EU check list, the optional
//! Halal section, a remediation summary and the disclaimer footer. Text is
//! drawn with the standard Helvetica fonts in WinAnsi encoding, so the
//! layout code owns a small transliteration table for everything else.

use chrono::Utc;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::preflight::domain::{Check, Report};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 50.0;
/// Flowed content stops at this baseline so the footer area stays clear.
const FOOTER_FLOOR: f32 = 70.0;

/// Anything smaller than this cannot be a rendered report and is treated
/// as a render failure.
const MIN_PLAUSIBLE_BYTES: usize = 800;

/// Average Helvetica glyph advance as a fraction of the font size, used
/// for wrapping and centering without real font metrics.
const GLYPH_ADVANCE: f32 = 0.55;

type Rgb = (f32, f32, f32);

const INK: Rgb = (0.043, 0.063, 0.125);
const SLATE: Rgb = (0.267, 0.267, 0.267);
const ACCENT: Rgb = (0.310, 0.490, 1.0);
const FADED: Rgb = (0.533, 0.533, 0.533);
const BLACK: Rgb = (0.0, 0.0, 0.0);
const BODY: Rgb = (0.2, 0.2, 0.2);
const CHECK_INK: Rgb = (0.067, 0.067, 0.067);
const FIX_GREEN: Rgb = (0.043, 0.239, 0.008);
const DISCLAIMER_GREY: Rgb = (0.467, 0.467, 0.467);

const TITLE: &str = "AVA LabelCheck — Compliance Assessment";
const SUBTITLE: &str = "Preliminary analysis based on EU 1169/2011 + AVA House Rules.";
const DISCLAIMER: &str =
    "Disclaimer: Automated triage. For legal compliance, consult qualified professionals. \
     © AVA LabelCheck";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("pdf assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),
    /// General failure reported by an alternative renderer implementation.
    #[error("{0}")]
    Failed(String),
}

/// Everything the renderer needs beyond the report itself.
pub struct RenderInput<'a> {
    pub report: &'a Report,
    pub halal_checks: &'a [Check],
    pub company_name: &'a str,
    pub shipping_scope: &'a str,
    pub include_halal_page: bool,
}

/// Boundary to document layout. The service holds a `Box<dyn ReportRenderer>`
/// so tests can substitute failing or counting fakes.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError>;

    /// Minimal document used when [`render`](Self::render) fails or returns
    /// an implausibly small output.
    fn fallback(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError>;
}

/// A rendered document below the plausibility floor counts as failed.
pub fn is_plausible(bytes: &[u8]) -> bool {
    bytes.len() >= MIN_PLAUSIBLE_BYTES
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReportRenderer;

impl PdfReportRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for PdfReportRenderer {
    fn render(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        let report = input.report;
        let mut page = PageComposer::new();

        page.line(Font::Bold, 22.0, INK, MARGIN, TITLE);
        page.line(Font::Regular, 10.0, SLATE, MARGIN, SUBTITLE);
        page.stamp(&Utc::now().format("%Y-%m-%d").to_string());
        page.advance(10.0);

        page.line(
            Font::Regular,
            12.0,
            BLACK,
            MARGIN,
            &format!("Company: {}", or_dash(input.company_name)),
        );
        page.line(
            Font::Regular,
            12.0,
            BLACK,
            MARGIN,
            &format!("Product: {}", or_dash(&report.product.name)),
        );
        page.line(
            Font::Regular,
            12.0,
            BLACK,
            MARGIN,
            &format!("Shipping scope: {}", or_dash(input.shipping_scope)),
        );
        page.line(
            Font::Regular,
            12.0,
            BLACK,
            MARGIN,
            &format!("Country of sale: {}", or_dash(&report.product.country_of_sale)),
        );
        page.line(
            Font::Regular,
            12.0,
            BLACK,
            MARGIN,
            &format!(
                "Languages: {}",
                or_dash(&report.product.languages_provided.join(", "))
            ),
        );

        page.advance(10.0);
        page.line(
            Font::Bold,
            14.0,
            BLACK,
            MARGIN,
            &format!(
                "Overall: {} (score {} / 100)",
                report.overall_status.label().to_uppercase(),
                report.score
            ),
        );
        page.wrapped(Font::Regular, 11.0, BODY, MARGIN, &or_dash(&report.summary));

        page.advance(10.0);
        page.section_heading("Checks");
        for check in &report.checks {
            page.check_block(check);
        }

        let halal_rendered = input.include_halal_page && !input.halal_checks.is_empty();
        if halal_rendered {
            page.break_page();
            page.section_heading("Halal Pre-Audit");
            page.wrapped(
                Font::Regular,
                10.0,
                SLATE,
                MARGIN,
                "Ingredient-level screening for Halal suitability. This is not a certification.",
            );
            page.advance(6.0);
            for check in input.halal_checks {
                page.check_block(check);
            }
        }

        let halal_fixes: &[Check] = if halal_rendered { input.halal_checks } else { &[] };
        let fixes: Vec<(&str, &str)> = report
            .checks
            .iter()
            .chain(halal_fixes.iter())
            .filter(|check| !check.is_ok() && !check.fix.trim().is_empty())
            .map(|check| (check.title.as_str(), check.fix.as_str()))
            .collect();
        if !fixes.is_empty() {
            page.advance(10.0);
            page.section_heading("Remediation summary");
            for (position, (title, fix)) in fixes.iter().enumerate() {
                page.wrapped(
                    Font::Regular,
                    10.0,
                    CHECK_INK,
                    MARGIN,
                    &format!("{}. {title}: {fix}", position + 1),
                );
            }
        }

        page.disclaimer(DISCLAIMER);
        build_document(page.finish())
    }

    fn fallback(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        let report = input.report;
        let mut page = PageComposer::new();

        page.line(Font::Bold, 18.0, INK, MARGIN, TITLE);
        page.line(
            Font::Regular,
            11.0,
            BLACK,
            MARGIN,
            &format!(
                "Overall: {} (score {} / 100)",
                report.overall_status.label().to_uppercase(),
                report.score
            ),
        );
        page.wrapped(
            Font::Regular,
            10.0,
            BODY,
            MARGIN,
            "The full report document could not be rendered. The JSON report in the API \
             response remains authoritative.",
        );
        page.disclaimer(DISCLAIMER);
        build_document(page.finish())
    }
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn key(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }
}

/// Accumulates content-stream operations page by page, breaking when the
/// cursor reaches the footer floor.
struct PageComposer {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl PageComposer {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.pages.push(std::mem::take(&mut self.ops));
        self.pages
    }

    fn break_page(&mut self) {
        let finished = std::mem::take(&mut self.ops);
        self.pages.push(finished);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < FOOTER_FLOOR {
            self.break_page();
        }
    }

    fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }

    /// One flowed line of text at the cursor.
    fn line(&mut self, font: Font, size: f32, color: Rgb, x: f32, text: &str) {
        let height = size * 1.4;
        self.ensure_room(height);
        let baseline = self.y - size;
        self.draw_text(font, size, color, x, baseline, text);
        self.y -= height;
    }

    /// Word-wrapped flowed text.
    fn wrapped(&mut self, font: Font, size: f32, color: Rgb, x: f32, text: &str) {
        let usable = PAGE_WIDTH - MARGIN - x;
        let max_chars = (usable / (GLYPH_ADVANCE * size)).max(8.0) as usize;
        for piece in wrap_text(text, max_chars) {
            self.line(font, size, color, x, &piece);
        }
    }

    fn section_heading(&mut self, text: &str) {
        let size = 13.0;
        self.ensure_room(size * 1.6);
        let baseline = self.y - size;
        self.draw_text(Font::Bold, size, BLACK, MARGIN, baseline, text);
        let width = text.chars().count() as f32 * GLYPH_ADVANCE * size;
        self.rule(MARGIN, baseline - 2.0, MARGIN + width, baseline - 2.0, BLACK, 0.5);
        self.y -= size * 1.6;
    }

    /// Bullet line plus detail and fix, matching the report sheet layout.
    fn check_block(&mut self, check: &Check) {
        self.ensure_room(48.0);
        self.line(
            Font::Regular,
            12.0,
            CHECK_INK,
            MARGIN,
            &format!(
                "• {} [{} | {}]",
                check.title,
                check.status.label().to_uppercase(),
                check.severity.label()
            ),
        );
        self.wrapped(
            Font::Regular,
            10.0,
            SLATE,
            MARGIN,
            &format!("Detail: {}", or_dash(&check.detail)),
        );
        self.wrapped(
            Font::Regular,
            10.0,
            FIX_GREEN,
            MARGIN,
            &format!("Fix: {}", or_dash(&check.fix)),
        );
        self.advance(4.0);
    }

    /// The accent-colored verification box in the top-right corner of the
    /// first page, drawn at absolute coordinates.
    fn stamp(&mut self, date: &str) {
        self.stroke_rect(400.0, 692.0, 160.0, 60.0, ACCENT, 2.0);
        self.draw_text(Font::Bold, 12.0, ACCENT, 410.0, 726.0, "AVA VERIFIED");
        self.draw_text(Font::Regular, 9.0, FADED, 410.0, 713.0, date);
    }

    /// Centered footer on the current page, below the flow floor.
    fn disclaimer(&mut self, text: &str) {
        let size = 8.0;
        let width = text.chars().count() as f32 * GLYPH_ADVANCE * size;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.draw_text(Font::Regular, size, DISCLAIMER_GREY, x, 40.0, text);
    }

    fn draw_text(&mut self, font: Font, size: f32, color: Rgb, x: f32, baseline: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.key().to_vec()), Object::Real(size)],
        ));
        self.ops.push(Operation::new(
            "rg",
            vec![
                Object::Real(color.0),
                Object::Real(color.1),
                Object::Real(color.2),
            ],
        ));
        self.ops.push(Operation::new(
            "Td",
            vec![Object::Real(x), Object::Real(baseline)],
        ));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, line_width: f32) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops
            .push(Operation::new("w", vec![Object::Real(line_width)]));
        self.ops.push(Operation::new(
            "RG",
            vec![
                Object::Real(color.0),
                Object::Real(color.1),
                Object::Real(color.2),
            ],
        ));
        self.ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(w),
                Object::Real(h),
            ],
        ));
        self.ops.push(Operation::new("S", vec![]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn rule(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, line_width: f32) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops
            .push(Operation::new("w", vec![Object::Real(line_width)]));
        self.ops.push(Operation::new(
            "RG",
            vec![
                Object::Real(color.0),
                Object::Real(color.1),
                Object::Real(color.2),
            ],
        ));
        self.ops.push(Operation::new(
            "m",
            vec![Object::Real(x1), Object::Real(y1)],
        ));
        self.ops.push(Operation::new(
            "l",
            vec![Object::Real(x2), Object::Real(y2)],
        ));
        self.ops.push(Operation::new("S", vec![]));
        self.ops.push(Operation::new("Q", vec![]));
    }
}

fn build_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let page_count = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for operations in pages {
        let content = Content { operations };
        let stream = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Contents" => stream,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => regular,
                    "F2" => bold,
                },
            },
        });
        kids.push(page.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(lopdf::Error::from)?;
    Ok(bytes)
}

fn or_dash(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        "-".to_string()
    } else {
        text.to_string()
    }
}

/// Greedy word wrap; words longer than the budget are hard-split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > max_chars {
            for chunk in char_chunks(word, max_chars) {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current = chunk;
                current_len = current.chars().count();
                if current_len == max_chars {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
            }
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn char_chunks(word: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Maps text to WinAnsi bytes. Latin-1 passes through and the common
/// typographic marks keep their WinAnsi slots; anything else degrades to
/// a question mark.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => bytes.push(c as u8),
            '€' => bytes.push(0x80),
            '‘' => bytes.push(0x91),
            '’' => bytes.push(0x92),
            '“' => bytes.push(0x93),
            '”' => bytes.push(0x94),
            '•' => bytes.push(0x95),
            '–' => bytes.push(0x96),
            '—' => bytes.push(0x97),
            '…' => bytes.extend_from_slice(b"..."),
            '℮' => bytes.push(b'e'),
            _ => {
                let code = c as u32;
                if (0xa0..=0xff).contains(&code) {
                    bytes.push(code as u8);
                } else {
                    bytes.push(b'?');
                }
            }
        }
    }
    bytes
}

//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `ragent status` | `render_providers_table()` |
//! | `ragent ask` / `ragent chat` | `render_citations_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use ragent_core::{Citation, ProviderStatus};

use super::color::terminal_width;
use super::format::{single_line, truncate_str};
use super::style::Style;

/// Render the provider probe results for `ragent status`.
///
/// ```text
/// PROVIDER   MODEL                   HEALTH   DETAIL
/// groq       llama-3.1-8b-instant    ok
/// local      local-model             down     no response within 5s
/// ```
pub fn render_providers_table(style: &Style, providers: &[ProviderStatus]) -> String {
    if providers.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("PROVIDER"),
        Cell::new("MODEL"),
        Cell::new("HEALTH"),
        Cell::new("DETAIL"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
    ]);

    for status in providers {
        let detail = status
            .error
            .as_deref()
            .map(|e| truncate_str(&single_line(e), 60))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(status.provider.as_str()),
            Cell::new(truncate_str(&status.model, 30)),
            Cell::new(style.reachable(status.reachable)),
            Cell::new(detail),
        ]);
    }

    table.to_string()
}

/// Render citations as numbered rows with a one-line preview.
///
/// ```text
///   #   SOURCE   PREVIEW
///   1   doc1     FAISS is a library for vector search.
/// ```
pub fn render_citations_table(style: &Style, citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let preview_width = terminal_width().saturating_sub(24).max(20);

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("PREVIEW"),
    ]);

    for (i, citation) in citations.iter().enumerate() {
        let source = citation
            .metadata
            .get("source")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(style.source(&truncate_str(&source, 24))),
            Cell::new(truncate_str(&single_line(&citation.content), preview_width)),
        ]);
    }

    table.to_string()
}

//! Tender detail page parser.
//!
//! The detail page has a key/value table (`#lista`) and a second table
//! (`#lista2`) holding links to the announcement and the tender document.

use scraper::{ElementRef, Html};
use tender_watch_tender_models::{FieldValue, TenderDetails};

use crate::ScrapeError;
use crate::html_table::{cell_text, parse_selector};

/// Parses a detail page. Relative document links are resolved against
/// `base_url`.
///
/// # Errors
///
/// Returns [`ScrapeError::MalformedResponse`] if the page has no `#lista`
/// table.
pub fn parse_details(html: &str, base_url: &str) -> Result<TenderDetails, ScrapeError> {
    let document = Html::parse_document(html);

    let table_sel = parse_selector("#lista")?;
    if document.select(&table_sel).next().is_none() {
        return Err(ScrapeError::MalformedResponse(
            "no #lista table found on detail page".to_owned(),
        ));
    }

    let row_sel = parse_selector("#lista tbody tr")?;
    let key_sel = parse_selector("th")?;
    let cell_sel = parse_selector("th, td")?;

    let mut details = TenderDetails::default();

    for row in document.select(&row_sel) {
        let Some(key) = row.select(&key_sel).next().map(|th| cell_text(&th)) else {
            continue;
        };
        let value = row
            .select(&cell_sel)
            .last()
            .map(|cell| cell_text(&cell))
            .unwrap_or_default();
        details.fields.insert(key.clone(), field_value(&key, &value));
    }

    let link_row_sel = parse_selector("#lista2 tbody tr")?;
    let link_cell_sel = parse_selector("td")?;
    let anchor_sel = parse_selector("a")?;

    for row in document.select(&link_row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&link_cell_sel).collect();
        let href = |cell: Option<&ElementRef<'_>>| {
            cell.and_then(|c| c.select(&anchor_sel).next())
                .and_then(|a| a.value().attr("href"))
                .map(|h| absolute_link(base_url, h))
        };
        if let Some(link) = href(cells.first()) {
            details.announcement_link = Some(link);
        }
        if let Some(link) = href(cells.last()) {
            details.document_link = Some(link);
        }
    }

    Ok(details)
}

/// Types a detail value by its key: monetary keys become numbers, the lot
/// count becomes an integer, everything else stays text.
fn field_value(key: &str, value: &str) -> FieldValue {
    if key.contains("valor") || key.contains("garantia") {
        match FieldValue::parse_decimal(value) {
            number @ FieldValue::Number(_) => number,
            _ => FieldValue::Text(value.to_owned()),
        }
    } else if key == "numero_de_lotes" {
        FieldValue::parse_integer(value)
    } else {
        FieldValue::Text(value.to_owned())
    }
}

fn absolute_link(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_owned()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

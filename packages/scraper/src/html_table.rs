//! Listing table normalizer.
//!
//! Parses a category listing page, locates its `<table>`, and maps each
//! body row into a [`TenderRecord`] through a fixed per-category column rule
//! set. The last row of every listing table is a summary/footer artifact and
//! is always discarded.

use scraper::{ElementRef, Html, Selector};
use tender_watch_tender_models::{Category, FieldValue, TenderRecord};

use crate::ScrapeError;

/// Link label the portal appends to the first cell of every row.
const DETAIL_LINK_LABEL: &str = "Ver detalhes";

/// A record field fed by one table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// `"<tipo>:<referencia>"` combined cell.
    TypeAndReference,
    Reference,
    Subject,
    /// Subject whose embedded newlines become spaces.
    SubjectSingleLine,
    Entity,
    Province,
    LaunchedOn,
    /// `"<date> <time>"` combined cell.
    Opening,
    AwardedOn,
    /// `"<nuit> <name>"`; only the text after the first space is kept.
    Contractor,
    Value,
    Dated,
}

/// Maps a zero-based column ordinal to a record field.
#[derive(Debug, Clone, Copy)]
struct ColumnRule {
    column: usize,
    field: Field,
}

const fn rule(column: usize, field: Field) -> ColumnRule {
    ColumnRule { column, field }
}

const OPEN_TENDER_RULES: &[ColumnRule] = &[
    rule(0, Field::TypeAndReference),
    rule(1, Field::Subject),
    rule(2, Field::Entity),
    rule(3, Field::Province),
    rule(4, Field::LaunchedOn),
    rule(5, Field::Opening),
];

const AWARDED_TENDER_RULES: &[ColumnRule] = &[
    rule(0, Field::Reference),
    rule(1, Field::Subject),
    rule(2, Field::AwardedOn),
];

const DIRECT_ADJUSTMENT_RULES: &[ColumnRule] = &[
    rule(0, Field::Reference),
    rule(1, Field::SubjectSingleLine),
    rule(2, Field::Entity),
    rule(3, Field::Contractor),
    rule(4, Field::Value),
    rule(5, Field::Dated),
];

/// Column rules for a category's listing table.
const fn rules(category: Category) -> &'static [ColumnRule] {
    match category {
        Category::OpenTenders => OPEN_TENDER_RULES,
        Category::AwardedTenders => AWARDED_TENDER_RULES,
        Category::DirectAdjustments => DIRECT_ADJUSTMENT_RULES,
    }
}

/// Parses a listing page into records, in table order.
///
/// # Errors
///
/// Returns [`ScrapeError::MalformedResponse`] if the page contains no
/// `<table>` at all. Individual malformed cells never fail the page.
pub fn parse_listing(category: Category, html: &str) -> Result<Vec<TenderRecord>, ScrapeError> {
    let document = Html::parse_document(html);

    let table_sel = parse_selector("table")?;
    let Some(table) = document.select(&table_sel).next() else {
        return Err(ScrapeError::MalformedResponse(format!(
            "no <table> found on {category} listing page"
        )));
    };

    let row_sel = parse_selector("tbody tr")?;
    let cell_sel = parse_selector("td")?;
    let link_sel = parse_selector("a")?;

    // Only the first table holds listings.
    let mut rows: Vec<ElementRef<'_>> = table.select(&row_sel).collect();
    // Trailing summary row, present on every listing.
    rows.pop();

    let records = rows
        .into_iter()
        .map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            let detail_link = cells
                .first()
                .and_then(|cell| cell.select(&link_sel).next())
                .and_then(|a| a.value().attr("href"))
                .map(str::to_owned);

            let mut record = TenderRecord {
                detail_link,
                ..TenderRecord::default()
            };
            for rule in rules(category) {
                let text = cells.get(rule.column).map(cell_text).unwrap_or_default();
                apply(&mut record, rule.field, &text);
            }
            record
        })
        .collect::<Vec<_>>();

    log::debug!("Parsed {} {category} records", records.len());
    Ok(records)
}

/// Writes one cleaned cell into its record field.
fn apply(record: &mut TenderRecord, field: Field, text: &str) {
    match field {
        Field::TypeAndReference => {
            let combined = strip_link_label(text).replace('\n', "");
            let (tender_type, reference) = combined
                .split_once(':')
                .unwrap_or(("", combined.as_str()));
            record.tender_type = Some(tender_type.trim().to_owned());
            record.reference = reference.trim().to_owned();
        }
        Field::Reference => record.reference = strip_link_label(text).trim().to_owned(),
        Field::Subject => text.clone_into(&mut record.subject),
        Field::SubjectSingleLine => record.subject = text.replace('\n', " "),
        Field::Entity => record.entity = non_empty(text),
        Field::Province => record.province = non_empty(text),
        Field::LaunchedOn => record.launched_on = non_empty(text),
        Field::Opening => {
            let (date, time) = text
                .split_once(char::is_whitespace)
                .map_or((text, ""), |(d, t)| (d, t.trim()));
            record.opening_date = non_empty(date);
            record.opening_time = non_empty(time);
        }
        Field::AwardedOn => record.awarded_on = non_empty(text),
        Field::Contractor => {
            let name = text.split_once(' ').map_or(text, |(_, rest)| rest);
            record.contractor = non_empty(name.trim());
        }
        Field::Value => {
            if !text.is_empty() {
                record.value = Some(FieldValue::parse_decimal(text));
            }
        }
        Field::Dated => record.dated = non_empty(text),
    }
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn cell_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn strip_link_label(text: &str) -> String {
    text.replacen(DETAIL_LINK_LABEL, "", 1)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| {
        ScrapeError::MalformedResponse(format!("invalid CSS selector '{selector}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_row(n: usize) -> String {
        format!(
            "<tr>\
               <td>Concurso Público:REF/{n}/2024 <a href=\"concurso_detalhes.php?referencia=REF/{n}/2024\">Ver detalhes</a></td>\
               <td>Aquisição de material {n}</td>\
               <td>UGEA Saúde</td>\
               <td>Maputo</td>\
               <td>2024-03-0{n}</td>\
               <td>2024-04-15 10:00</td>\
             </tr>"
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><table><thead><tr><th>Ref</th></tr></thead><tbody>{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    fn footer() -> String {
        "<tr><td colspan=\"6\">Total: 4 registos</td></tr>".to_owned()
    }

    #[test]
    fn single_row_table_yields_no_records() {
        let html = page(&[footer()]);
        let records = parse_listing(Category::OpenTenders, &html).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn empty_table_is_valid() {
        let html = page(&[]);
        let records = parse_listing(Category::OpenTenders, &html).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn five_rows_yield_four_records_in_order() {
        let mut rows: Vec<String> = (1..=4).map(open_row).collect();
        rows.push(footer());
        let records = parse_listing(Category::OpenTenders, &page(&rows)).unwrap();

        assert_eq!(records.len(), 4);
        let refs: Vec<&str> = records.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(
            refs,
            vec!["REF/1/2024", "REF/2/2024", "REF/3/2024", "REF/4/2024"]
        );
    }

    #[test]
    fn only_the_first_table_is_read() {
        let listing = page(&[open_row(1), open_row(2), footer()]);
        let html = listing.replace(
            "</body>",
            &format!("<table><tbody>{}{}</tbody></table></body>", open_row(3), footer()),
        );
        let records = parse_listing(Category::OpenTenders, &html).unwrap();

        let refs: Vec<&str> = records.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, vec!["REF/1/2024", "REF/2/2024"]);
    }

    #[test]
    fn open_tender_columns_are_mapped() {
        let html = page(&[open_row(1), footer()]);
        let record = &parse_listing(Category::OpenTenders, &html).unwrap()[0];

        assert_eq!(record.tender_type.as_deref(), Some("Concurso Público"));
        assert_eq!(record.reference, "REF/1/2024");
        assert_eq!(record.subject, "Aquisição de material 1");
        assert_eq!(record.entity.as_deref(), Some("UGEA Saúde"));
        assert_eq!(record.province.as_deref(), Some("Maputo"));
        assert_eq!(record.launched_on.as_deref(), Some("2024-03-01"));
        assert_eq!(record.opening_date.as_deref(), Some("2024-04-15"));
        assert_eq!(record.opening_time.as_deref(), Some("10:00"));
        assert_eq!(
            record.detail_link.as_deref(),
            Some("concurso_detalhes.php?referencia=REF/1/2024")
        );
    }

    #[test]
    fn reference_without_type_separator_is_kept_whole() {
        let row = "<tr><td>REF-77</td><td>Obra</td></tr>".to_owned();
        let html = page(&[row, footer()]);
        let record = &parse_listing(Category::OpenTenders, &html).unwrap()[0];
        assert_eq!(record.tender_type.as_deref(), Some(""));
        assert_eq!(record.reference, "REF-77");
        assert_eq!(record.entity, None);
    }

    #[test]
    fn direct_adjustment_value_falls_back_to_raw() {
        let rows = vec![
            "<tr><td>AD/1 <a href=\"d.php?referencia=AD/1\">Ver detalhes</a></td>\
             <td>Reparação\nde viaturas</td><td>UGEA Obras</td>\
             <td>400123456 Oficina Lda</td><td>125000.50 MT</td><td>2024-02-01</td></tr>"
                .to_owned(),
            "<tr><td>AD/2</td><td>Limpeza</td><td>UGEA Obras</td>\
             <td>Sem NUIT</td><td>sob consulta</td><td>2024-02-02</td></tr>"
                .to_owned(),
            footer(),
        ];
        let records = parse_listing(Category::DirectAdjustments, &page(&rows)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reference, "AD/1");
        assert_eq!(records[0].subject, "Reparação de viaturas");
        assert_eq!(records[0].contractor.as_deref(), Some("Oficina Lda"));
        assert_eq!(records[0].value, Some(FieldValue::Number(125_000.5)));
        assert_eq!(records[1].contractor.as_deref(), Some("NUIT"));
        assert_eq!(records[1].value, Some(FieldValue::Text(String::new())));
        assert_eq!(records[1].dated.as_deref(), Some("2024-02-02"));
    }

    #[test]
    fn awarded_rows_carry_award_date() {
        let rows = vec![
            "<tr><td>ADJ/9 Ver detalhes</td><td>Fornecimento</td><td>2024-01-20</td></tr>"
                .to_owned(),
            footer(),
        ];
        let records = parse_listing(Category::AwardedTenders, &page(&rows)).unwrap();
        assert_eq!(records[0].reference, "ADJ/9");
        assert_eq!(records[0].awarded_on.as_deref(), Some("2024-01-20"));
        assert_eq!(records[0].tender_type, None);
    }

    #[test]
    fn page_without_table_is_malformed() {
        let err = parse_listing(Category::OpenTenders, "<html><body>Erro</body></html>")
            .unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedResponse(_)));
    }
}

//! Filtering, pagination and export of snapshot records.
//!
//! Everything here is pure: handlers take a snapshot view, run it through
//! these functions and serialize the result.

use tender_watch_server_models::{
    ApiDataSource, AwardedParams, DEFAULT_LIMIT, DEFAULT_PAGE, DirectAdjustmentParams,
    OpenTenderParams, Paginated,
};
use tender_watch_tender_models::{FieldValue, TenderRecord};

/// Serialized record keys, in the column order used by CSV exports.
const EXPORT_COLUMNS: &[&str] = &[
    "tipo_concurso",
    "referencia",
    "objeto",
    "ugea",
    "provincia",
    "data_lancamento",
    "data_abertura",
    "hora_abertura",
    "data_adjudicacao",
    "contratada",
    "valor",
    "data",
    "link_detalhes",
];

/// Errors produced while rendering a CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A record could not be serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing the output buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Case-insensitive substring test.
#[must_use]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn eq_ci(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase() == expected.to_lowercase())
}

fn contains_opt(value: Option<&str>, needle: &str) -> bool {
    value.is_some_and(|v| contains_ci(v, needle))
}

/// Whether any populated field of `record` contains `needle`.
#[must_use]
pub fn matches_search(record: &TenderRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    record
        .field_texts()
        .iter()
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Treats an empty query value like an absent one.
fn given(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Applies the open tender filters.
#[must_use]
pub fn filter_open<'a>(
    records: &'a [TenderRecord],
    params: &OpenTenderParams,
) -> Vec<&'a TenderRecord> {
    records
        .iter()
        .filter(|r| {
            given(params.provincia.as_ref()).is_none_or(|p| eq_ci(r.province.as_deref(), p))
        })
        .filter(|r| {
            given(params.tipo_concurso.as_ref())
                .is_none_or(|t| eq_ci(r.tender_type.as_deref(), t))
        })
        .filter(|r| {
            given(params.entidade.as_ref()).is_none_or(|e| contains_opt(r.entity.as_deref(), e))
        })
        .filter(|r| given(params.search.as_ref()).is_none_or(|s| matches_search(r, s)))
        .collect()
}

/// Applies the awarded tender filters.
#[must_use]
pub fn filter_awarded<'a>(
    records: &'a [TenderRecord],
    params: &AwardedParams,
) -> Vec<&'a TenderRecord> {
    records
        .iter()
        .filter(|r| given(params.search.as_ref()).is_none_or(|s| matches_search(r, s)))
        .collect()
}

/// Applies the direct adjustment filters. A value bound excludes records
/// whose value is not numeric.
#[must_use]
pub fn filter_direct<'a>(
    records: &'a [TenderRecord],
    params: &DirectAdjustmentParams,
) -> Vec<&'a TenderRecord> {
    records
        .iter()
        .filter(|r| {
            given(params.entidade.as_ref()).is_none_or(|e| contains_opt(r.entity.as_deref(), e))
        })
        .filter(|r| {
            given(params.contratada.as_ref())
                .is_none_or(|c| contains_opt(r.contractor.as_deref(), c))
        })
        .filter(|r| {
            params
                .valor_min
                .is_none_or(|min| numeric_value(r).is_some_and(|v| v >= min))
        })
        .filter(|r| {
            params
                .valor_max
                .is_none_or(|max| numeric_value(r).is_some_and(|v| v <= max))
        })
        .filter(|r| given(params.search.as_ref()).is_none_or(|s| matches_search(r, s)))
        .collect()
}

fn numeric_value(record: &TenderRecord) -> Option<f64> {
    record.value.as_ref().and_then(FieldValue::as_f64)
}

/// Slices `matches` into one page. Zero page or limit values fall back to
/// the defaults.
#[must_use]
pub fn paginate(
    matches: &[&TenderRecord],
    page: Option<usize>,
    limit: Option<usize>,
    data_source: ApiDataSource,
) -> Paginated<TenderRecord> {
    let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
    let total = matches.len();

    let results = matches
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(|r| (*r).clone())
        .collect();

    Paginated {
        total,
        page,
        total_pages: total.div_ceil(limit),
        results,
        data_source,
    }
}

/// Distinct non-empty values of one field, in first-seen order.
pub fn distinct<'a, I, F>(records: I, field: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a TenderRecord>,
    F: Fn(&'a TenderRecord) -> Option<&'a str>,
{
    let mut seen = Vec::<String>::new();
    for value in records.into_iter().filter_map(field) {
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_owned());
        }
    }
    seen
}

/// Turns a serialized key into a column title: first letter uppercased,
/// underscores replaced by spaces.
#[must_use]
pub fn column_title(key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars)
            .map(|c| if c == '_' { ' ' } else { c })
            .collect()
    })
}

/// Renders `records` as CSV. Only columns populated in at least one record
/// are written; an empty slice yields an empty document.
///
/// # Errors
///
/// Returns [`ExportError`] if a record cannot be serialized or written.
pub fn to_csv(records: &[TenderRecord]) -> Result<Vec<u8>, ExportError> {
    let rows = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let columns: Vec<&str> = EXPORT_COLUMNS
        .iter()
        .copied()
        .filter(|key| rows.iter().any(|row| !row[*key].is_null()))
        .collect();

    let mut buffer = Vec::new();
    if columns.is_empty() {
        return Ok(buffer);
    }

    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(columns.iter().map(|key| column_title(key)))?;
        for row in &rows {
            writer.write_record(columns.iter().map(|key| match &row[*key] {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }))?;
        }
        writer.flush()?;
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(reference: &str, province: &str, kind: &str, entity: &str) -> TenderRecord {
        TenderRecord {
            province: Some(province.to_owned()),
            tender_type: Some(kind.to_owned()),
            entity: Some(entity.to_owned()),
            ..TenderRecord::new(reference, &format!("Objeto {reference}"))
        }
    }

    fn direct(reference: &str, contractor: &str, value: FieldValue) -> TenderRecord {
        TenderRecord {
            entity: Some("Ministério da Saúde".to_owned()),
            contractor: Some(contractor.to_owned()),
            value: Some(value),
            ..TenderRecord::new(reference, "Fornecimento")
        }
    }

    fn source() -> ApiDataSource {
        ApiDataSource {
            provenance: None,
            is_using_persisted_data: false,
            last_update: None,
            retry_attempts: 0,
        }
    }

    fn references(records: &[&TenderRecord]) -> Vec<String> {
        records.iter().map(|r| r.reference.clone()).collect()
    }

    #[test]
    fn open_filters_combine() {
        let records = vec![
            open("A", "Maputo", "Concurso Público", "Município de Maputo"),
            open("B", "Gaza", "Concurso Público", "Governo de Gaza"),
            open("C", "maputo", "Concurso Limitado", "Hospital Central"),
        ];

        let by_province = OpenTenderParams {
            provincia: Some("MAPUTO".to_owned()),
            ..OpenTenderParams::default()
        };
        assert_eq!(references(&filter_open(&records, &by_province)), ["A", "C"]);

        let by_type_and_entity = OpenTenderParams {
            tipo_concurso: Some("concurso público".to_owned()),
            entidade: Some("gaza".to_owned()),
            ..OpenTenderParams::default()
        };
        assert_eq!(
            references(&filter_open(&records, &by_type_and_entity)),
            ["B"]
        );

        let empty_values_ignored = OpenTenderParams {
            provincia: Some(String::new()),
            search: Some(String::new()),
            ..OpenTenderParams::default()
        };
        assert_eq!(filter_open(&records, &empty_values_ignored).len(), 3);
    }

    #[test]
    fn search_spans_every_field() {
        let records = vec![
            open("A", "Maputo", "Concurso Público", "Município"),
            open("B", "Gaza", "Concurso Público", "Hospital Central"),
        ];
        let params = AwardedParams {
            search: Some("HOSPITAL".to_owned()),
            ..AwardedParams::default()
        };
        assert_eq!(references(&filter_awarded(&records, &params)), ["B"]);
    }

    #[test]
    fn direct_value_bounds_skip_non_numeric_values() {
        let records = vec![
            direct("A", "Construtora Lda", FieldValue::Number(1_000.0)),
            direct("B", "Papelaria Central", FieldValue::Number(50_000.0)),
            direct("C", "Construtora Norte", FieldValue::Text("n/d".to_owned())),
        ];

        let bounded = DirectAdjustmentParams {
            valor_min: Some(500.0),
            valor_max: Some(1_000.0),
            ..DirectAdjustmentParams::default()
        };
        assert_eq!(references(&filter_direct(&records, &bounded)), ["A"]);

        let by_contractor = DirectAdjustmentParams {
            contratada: Some("construtora".to_owned()),
            ..DirectAdjustmentParams::default()
        };
        assert_eq!(
            references(&filter_direct(&records, &by_contractor)),
            ["A", "C"]
        );
    }

    #[test]
    fn pagination_slices_and_counts_pages() {
        let records: Vec<TenderRecord> = (1..=25)
            .map(|i| TenderRecord::new(&format!("R-{i}"), "x"))
            .collect();
        let all: Vec<&TenderRecord> = records.iter().collect();

        let third = paginate(&all, Some(3), Some(10), source());
        assert_eq!(third.total, 25);
        assert_eq!(third.total_pages, 3);
        assert_eq!(third.results.len(), 5);
        assert_eq!(third.results[0].reference, "R-21");

        let defaults = paginate(&all, None, Some(0), source());
        assert_eq!(defaults.page, 1);
        assert_eq!(defaults.results.len(), 10);

        let beyond = paginate(&all, Some(9), None, source());
        assert!(beyond.results.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[test]
    fn distinct_keeps_first_seen_order() {
        let records = vec![
            open("A", "Sofala", "x", "e"),
            open("B", "Maputo", "x", "e"),
            open("C", "Sofala", "x", "e"),
            open("D", "", "x", "e"),
        ];
        let provinces = distinct(&records, |r| r.province.as_deref());
        assert_eq!(provinces, ["Sofala", "Maputo"]);
    }

    #[test]
    fn column_titles() {
        assert_eq!(column_title("data_lancamento"), "Data lancamento");
        assert_eq!(column_title("ugea"), "Ugea");
        assert_eq!(column_title(""), "");
    }

    #[test]
    fn csv_writes_populated_columns_only() {
        let records = vec![
            direct("A", "Construtora, Lda", FieldValue::Number(1_500.5)),
            TenderRecord::new("B", "Obra"),
        ];
        let csv = String::from_utf8(to_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Referencia,Objeto,Ugea,Contratada,Valor");
        assert_eq!(
            lines[1],
            "A,Fornecimento,Ministério da Saúde,\"Construtora, Lda\",1500.5"
        );
        assert_eq!(lines[2], "B,Obra,,,");
    }

    #[test]
    fn csv_of_nothing_is_empty() {
        assert!(to_csv(&[]).unwrap().is_empty());
    }
}

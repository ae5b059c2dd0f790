//! HTTP handler functions for the tender watch API.

use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use tender_watch_cache::{CacheStatus, SnapshotView};
use tender_watch_scraper::ScrapeError;
use tender_watch_server_models::{
    ApiDataSource, ApiError, ApiHealth, ApiStatus, AwardedParams, DetailParams,
    DirectAdjustmentParams, DocumentParams, ExportParams, ExportResponse, OpenTenderParams,
};
use tender_watch_tender_models::Category;

use crate::AppState;
use crate::query;

fn data_source(status: &CacheStatus) -> ApiDataSource {
    ApiDataSource {
        provenance: status.provenance,
        is_using_persisted_data: status.is_using_persisted_data(),
        last_update: status.last_update,
        retry_attempts: status.retry_attempts,
    }
}

fn unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ApiError::new("Data not yet available"))
}

/// Runs `f` against the current snapshot, or answers 503 before the first
/// snapshot is available.
fn with_snapshot(
    state: &AppState,
    f: impl FnOnce(&SnapshotView) -> HttpResponse,
) -> HttpResponse {
    state.reader.snapshot().map_or_else(unavailable, |view| f(&view))
}

/// `GET /`
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "UFSA Concursos API",
        "endpoints": {
            "health": "/api/health",
            "status": "/api/status",
            "abertos": "/api/concursos/abertos",
            "adjudicados": "/api/concursos/adjudicados",
            "ajustesDirectos": "/api/concursos/ajustes-directos",
            "provincias": "/api/concursos/provincias",
            "tipos": "/api/concursos/tipos",
            "entidades": "/api/concursos/entidades",
            "export": "/api/concursos/export?type=abertos&format=csv",
            "detalhes": "/api/concursos/{type}/detalhes?referencia=",
            "proxyPdf": "/api/proxy-pdf?referencia=&type=document",
            "dashboard": "/api/stats/dashboard",
        },
    }))
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/status`
///
/// Reports the refresh lifecycle. Answers even before the first snapshot
/// is available.
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    let current = state.reader.state();
    let statistics = current
        .snapshot
        .as_ref()
        .map(|s| s.meta().counts.clone())
        .unwrap_or_default();

    HttpResponse::Ok().json(ApiStatus {
        status: if current.snapshot.is_some() {
            "operational"
        } else {
            "initializing"
        }
        .to_string(),
        phase: current.status.phase.to_string(),
        data_source: data_source(&current.status),
        statistics,
    })
}

/// `GET /api/concursos/abertos`
pub async fn open_tenders(
    state: web::Data<AppState>,
    params: web::Query<OpenTenderParams>,
) -> HttpResponse {
    with_snapshot(&state, |view| {
        let matches = query::filter_open(view.snapshot.records(Category::OpenTenders), &params);
        HttpResponse::Ok().json(query::paginate(
            &matches,
            params.page,
            params.limit,
            data_source(&view.status),
        ))
    })
}

/// `GET /api/concursos/adjudicados`
pub async fn awarded_tenders(
    state: web::Data<AppState>,
    params: web::Query<AwardedParams>,
) -> HttpResponse {
    with_snapshot(&state, |view| {
        let matches =
            query::filter_awarded(view.snapshot.records(Category::AwardedTenders), &params);
        HttpResponse::Ok().json(query::paginate(
            &matches,
            params.page,
            params.limit,
            data_source(&view.status),
        ))
    })
}

/// `GET /api/concursos/ajustes-directos`
pub async fn direct_adjustments(
    state: web::Data<AppState>,
    params: web::Query<DirectAdjustmentParams>,
) -> HttpResponse {
    with_snapshot(&state, |view| {
        let matches =
            query::filter_direct(view.snapshot.records(Category::DirectAdjustments), &params);
        HttpResponse::Ok().json(query::paginate(
            &matches,
            params.page,
            params.limit,
            data_source(&view.status),
        ))
    })
}

/// `GET /api/concursos/provincias`
pub async fn provinces(state: web::Data<AppState>) -> HttpResponse {
    with_snapshot(&state, |view| {
        HttpResponse::Ok().json(query::distinct(
            view.snapshot.records(Category::OpenTenders),
            |r| r.province.as_deref(),
        ))
    })
}

/// `GET /api/concursos/tipos`
pub async fn tender_types(state: web::Data<AppState>) -> HttpResponse {
    with_snapshot(&state, |view| {
        HttpResponse::Ok().json(query::distinct(
            view.snapshot.records(Category::OpenTenders),
            |r| r.tender_type.as_deref(),
        ))
    })
}

/// `GET /api/concursos/entidades`
///
/// Spans open tenders and direct adjustments.
pub async fn entities(state: web::Data<AppState>) -> HttpResponse {
    with_snapshot(&state, |view| {
        let records = view
            .snapshot
            .records(Category::OpenTenders)
            .iter()
            .chain(view.snapshot.records(Category::DirectAdjustments));
        HttpResponse::Ok().json(query::distinct(records, |r| r.entity.as_deref()))
    })
}

/// `GET /api/concursos/export`
///
/// Exports a whole category as JSON or as a CSV attachment. The category
/// defaults to open tenders.
pub async fn export(state: web::Data<AppState>, params: web::Query<ExportParams>) -> HttpResponse {
    let slug = params.kind.as_deref().unwrap_or(Category::OpenTenders.slug());
    let Some(category) = Category::from_slug(slug) else {
        return HttpResponse::BadRequest().json(ApiError::new("Invalid tender type"));
    };

    with_snapshot(&state, |view| {
        let records = view.snapshot.records(category);

        if params.format.as_deref() != Some("csv") {
            return HttpResponse::Ok().json(ExportResponse {
                data: records.to_vec(),
                data_source: data_source(&view.status),
            });
        }

        match query::to_csv(records) {
            Ok(body) => HttpResponse::Ok()
                .content_type("text/csv; charset=utf-8")
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(format!(
                        "concursos-{}.csv",
                        category.slug()
                    ))],
                })
                .body(body),
            Err(e) => {
                log::error!("CSV export of {category} failed: {e}");
                HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
            }
        }
    })
}

/// `GET /api/concursos/{type}/detalhes`
///
/// Fetches a tender's detail page live from the portal.
pub async fn details(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<DetailParams>,
) -> HttpResponse {
    let Some(category) = Category::from_slug(&path) else {
        return HttpResponse::BadRequest().json(ApiError::new("Invalid tender type"));
    };

    match state.client.fetch_details(category, &params.referencia).await {
        Ok(details) => HttpResponse::Ok().json(details),
        Err(e) => upstream_error(&e),
    }
}

/// `GET /api/proxy-pdf`
///
/// Relays a tender document from the portal.
pub async fn proxy_document(
    state: web::Data<AppState>,
    params: web::Query<DocumentParams>,
) -> HttpResponse {
    match state
        .client
        .fetch_document(&params.referencia, params.kind)
        .await
    {
        Ok(document) => HttpResponse::Ok()
            .content_type(document.content_type)
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", document.file_name),
            ))
            .body(document.bytes),
        Err(e) => upstream_error(&e),
    }
}

fn upstream_error(e: &ScrapeError) -> HttpResponse {
    log::warn!("Upstream request failed: {e}");
    match e {
        ScrapeError::NotFound { .. } => {
            HttpResponse::NotFound().json(ApiError::new("Not found upstream"))
        }
        _ => HttpResponse::BadGateway().json(ApiError::new(e.to_string())),
    }
}

/// `GET /api/stats/dashboard`
pub async fn dashboard(state: web::Data<AppState>) -> HttpResponse {
    with_snapshot(&state, |view| {
        HttpResponse::Ok().json(tender_watch_analytics::compute(
            &view.snapshot,
            chrono::Utc::now(),
        ))
    })
}

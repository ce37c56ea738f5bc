// src/routes/scanner.rs

use actix_web::{dev::HttpServiceFactory, get, http::StatusCode, web, HttpResponse, Responder};
use chrono::Utc;

use crate::middleware::path_logger::PathLogger;
use crate::services::scanner::{QueryKind, ScanResult, Scanner};
use crate::utils::errors::ScanError;
use crate::utils::types::ApiResponse;

fn error_status(e: &ScanError) -> StatusCode {
    match e {
        ScanError::MalformedInput { .. } => StatusCode::BAD_GATEWAY,
        ScanError::UpstreamUnavailable { .. } | ScanError::Timeout { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn error_message(e: &ScanError) -> &'static str {
    match e {
        ScanError::MalformedInput { .. } => "market data source returned an unexpected payload",
        ScanError::UpstreamUnavailable { .. } => "market data source unavailable",
        ScanError::Timeout { .. } => "market data source timed out",
    }
}

/// GET /api/scan
#[get("/scan")]
pub async fn list_kinds() -> impl Responder {
    let kinds: Vec<&'static str> = QueryKind::ALL.iter().map(|k| k.slug()).collect();
    HttpResponse::Ok().json(ApiResponse::ok(kinds))
}

/// GET /api/scan/{kind}
#[get("/scan/{kind}")]
pub async fn scan(path: web::Path<String>, scanner: web::Data<Scanner>) -> impl Responder {
    let slug = path.into_inner();
    let Some(kind) = QueryKind::from_slug(&slug) else {
        return HttpResponse::NotFound()
            .json(ApiResponse::<()>::err(format!("unknown scan kind '{slug}'")));
    };

    match scanner.query(kind, Utc::now()).await {
        Ok(result) => HttpResponse::Ok().json(ApiResponse::<ScanResult>::ok(result)),
        Err(e) => {
            log::warn!("scan {} failed at {}: {e}", e.key(), e.stage());
            HttpResponse::build(error_status(&e)).json(ApiResponse::<()>::err(error_message(&e)))
        }
    }
}

pub fn scanner_scope() -> impl HttpServiceFactory {
    web::scope("/api")
        .wrap(PathLogger)
        .service(list_kinds)
        .service(scan)
}

//! OpenAPI document aggregating every public endpoint.

use utoipa::OpenApi;

use crate::api::models::{
    DocumentDto, GenerationRecordDto, GenomeDto, RagMetricsDto, RagQueryResponseDto,
};
use crate::api::routes::bandit::{ArmStatsDto, BanditStatsResponse};
use crate::api::routes::health::HealthResponse;
use crate::api::routes::optimize::{OptimizeRequest, OptimizeResponse};
use crate::api::routes::rag::RagQueryRequest;
use crate::api::routes::route::{RouteRequest, RouteResponseDto};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kestrel API",
        description = "Evolutionary prompt optimization and hybrid retrieval"
    ),
    paths(
        crate::api::routes::health::health_check,
        crate::api::routes::health::readiness_check,
        crate::api::routes::health::liveness_check,
        crate::api::routes::optimize::optimize,
        crate::api::routes::rag::rag_query,
        crate::api::routes::rag::rag_metrics,
        crate::api::routes::bandit::bandit_stats,
        crate::api::routes::route::route,
    ),
    components(schemas(
        HealthResponse,
        OptimizeRequest,
        OptimizeResponse,
        GenomeDto,
        GenerationRecordDto,
        RagQueryRequest,
        RagQueryResponseDto,
        RagMetricsDto,
        DocumentDto,
        BanditStatsResponse,
        ArmStatsDto,
        RouteRequest,
        RouteResponseDto,
    ))
)]
pub struct ApiDoc;

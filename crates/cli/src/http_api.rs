use axum::{
    body::{Body, Bytes},
    http::{Response as HttpResponse, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use nutrikid_advisor::plan::{generate_plan, PlanRequest};
use nutrikid_advisor::{analyze_intake, answer_question, AdvisorContext, AnalysisRequest, QaRequest};
use nutrikid_generation::GenerationBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthReport<'a> {
    status: &'static str,
    corpus_loaded: bool,
    generation_backend: &'a str,
}

pub(crate) fn router(ctx: Arc<AdvisorContext>) -> Router {
    Router::new()
        .route(
            "/health",
            get({
                let ctx = ctx.clone();
                move || http_health(ctx.clone())
            }),
        )
        .route(
            "/ask",
            post({
                let ctx = ctx.clone();
                move |body| http_ask(body, ctx.clone())
            }),
        )
        .route(
            "/analyze",
            post({
                let ctx = ctx.clone();
                move |body| http_analyze(body, ctx.clone())
            }),
        )
        .route(
            "/generate-plan",
            post({
                let ctx = ctx.clone();
                move |body| http_generate_plan(body, ctx.clone())
            }),
        )
}

pub(crate) fn error_envelope(code: &str, message: String) -> ErrorEnvelope {
    let hint = match code {
        "invalid_request" => {
            Some("Verify the request is valid JSON and matches the endpoint schema.".to_string())
        }
        "internal" => Some("Check the server logs for details.".to_string()),
        _ => None,
    };
    ErrorEnvelope {
        code: code.to_string(),
        message,
        hint,
    }
}

pub(crate) fn build_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response, StatusCode> {
    let bytes = serde_json::to_vec(body).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    HttpResponse::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Result<Response, StatusCode>> {
    serde_json::from_slice(body).map_err(|err| {
        let envelope = error_envelope("invalid_request", format!("Invalid JSON request: {err}"));
        build_response(StatusCode::BAD_REQUEST, &envelope)
    })
}

async fn http_health(ctx: Arc<AdvisorContext>) -> Result<Response, StatusCode> {
    let report = HealthReport {
        status: "ok",
        corpus_loaded: ctx.retrieval().corpus_loaded(),
        generation_backend: ctx.backend().name(),
    };
    build_response(StatusCode::OK, &report)
}

async fn http_ask(body: Bytes, ctx: Arc<AdvisorContext>) -> Result<Response, StatusCode> {
    let request: QaRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let answer = answer_question(&ctx, &request).await;
    build_response(StatusCode::OK, &answer)
}

async fn http_analyze(body: Bytes, ctx: Arc<AdvisorContext>) -> Result<Response, StatusCode> {
    let request: AnalysisRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let report = analyze_intake(&ctx, &request).await;
    build_response(StatusCode::OK, &report)
}

async fn http_generate_plan(body: Bytes, ctx: Arc<AdvisorContext>) -> Result<Response, StatusCode> {
    let request: PlanRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match generate_plan(&ctx, &request).await {
        Ok(outcome) => build_response(StatusCode::OK, &outcome.response),
        Err(err) => {
            log::error!("Plan orchestration error: {err}");
            let envelope = error_envelope("internal", err.to_string());
            build_response(StatusCode::INTERNAL_SERVER_ERROR, &envelope)
        }
    }
}

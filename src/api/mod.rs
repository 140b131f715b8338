//! HTTP 接入层
//!
//! 只负责把上传落盘、把任务推进队列、把结果整形返回，不参与调度。

pub mod config;
pub mod error;
pub mod handlers;
pub mod simplify;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, HeaderValue, Method,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    },
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// 构建完整的路由
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = build_cors_layer(&state.config)?;
    let body_limit = state.config.max_upload_bytes;

    Ok(Router::new()
        .route("/v1/predict", post(handlers::submit_prediction))
        .route("/v1/predict/{uuid}", get(handlers::get_prediction))
        .route("/v1/grabcut", post(handlers::submit_grabcut))
        .route("/v1/grabcut/{uuid}", get(handlers::get_grabcut))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// CORS: 暴露 `Location`，预检请求直接应答
pub fn build_cors_layer(config: &ApiConfig) -> anyhow::Result<CorsLayer> {
    let allow_origin = match config.cors_origins() {
        None => {
            warn!(
                "[Api] CORS Access-Control-Allow-Origin is set to '*', which is a potential security risk. \
                 Do not run the service in production with this configuration!"
            );
            AllowOrigin::from(Any)
        }
        Some(origins) => {
            let values = origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>()
                        .with_context(|| format!("invalid CORS origin '{}'", o))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            AllowOrigin::list(values)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-pingother"),
            HeaderName::from_static("x-file-name"),
        ])
        .expose_headers([LOCATION])
        .max_age(Duration::from_secs(3600)))
}

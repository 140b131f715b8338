use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::common::DispatchError;

/// HTTP 层错误
///
/// 统一渲染成 `{"error": "..."}`。服务端错误只回通用提示，细节写日志。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 缺少必要的上传内容
    #[error("{0}")]
    BadRequest(String),

    /// 参数缺失或不合法
    #[error("{0}")]
    Unprocessable(String),

    /// 调度层错误 (队列 / 存储 / 结果解码)
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// 落盘失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 读取 multipart 失败
    #[error("Malformed upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::Multipart(e) => (StatusCode::BAD_REQUEST, e.body_text()),
            ApiError::Dispatch(DispatchError::InvalidTask(msg)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }
            ApiError::Dispatch(_) | ApiError::Io(_) => {
                tracing::error!(error = %self, "[Api] Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Couldn't process request - please try again later".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

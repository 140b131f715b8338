use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        simplify::simplify,
        state::AppState,
    },
    common::{JobKind, TaskData, TaskOutcome, new_task_id},
    scheduler::PollStatus,
};

/// 多边形简化容差 (像素)
const SIMPLIFY_TOLERANCE: f64 = 1.5;

/// 读完整个 multipart，只保留关心的字段
#[derive(Default)]
struct UploadForm {
    image: Option<Vec<u8>>,
    classification_type: Option<String>,
    uuid: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => form.image = Some(field.bytes().await?.to_vec()),
                "classification_type" => form.classification_type = Some(field.text().await?),
                "uuid" => form.uuid = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }
}

fn accepted(task_id: String) -> impl IntoResponse {
    (StatusCode::ACCEPTED, [(LOCATION, task_id)], Json(json!({})))
}

/// POST /v1/predict
///
/// 上传图片并排队分类。`classification_type=nsfw` 走 NSFW 模型，其他值走普通分类。
pub async fn submit_prediction(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let image = form
        .image
        .ok_or_else(|| ApiError::BadRequest("Picture is missing".into()))?;

    let kind = match form.classification_type.as_deref().map(str::trim) {
        Some("nsfw") => JobKind::NsfwClassification,
        _ => JobKind::Classification,
    };

    let task_id = new_task_id();
    let filename = state.config.predictions_dir.join(&task_id);
    tokio::fs::write(&filename, &image).await?;

    let task = TaskData::with_id(task_id.clone(), kind, &filename);
    if let Err(e) = state.client.submit(&task).await {
        // 没排上队，上传文件没人会回收
        if let Err(rm) = tokio::fs::remove_file(&filename).await {
            warn!(file = %filename.display(), "[Api] Couldn't remove upload: {}", rm);
        }
        return Err(e.into());
    }

    debug!(task_id = %task_id, kind = %kind, "[Api] Prediction queued");
    Ok(accepted(task_id))
}

/// GET /v1/predict/{uuid}
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let body = match state.client.poll(JobKind::Classification, &uuid).await? {
        PollStatus::Pending => json!({}),
        PollStatus::Ready(result) => match result.outcome {
            TaskOutcome::Classified {
                label,
                score,
                model_info,
            } => json!({ "label": label, "score": score, "model_info": model_info }),
            TaskOutcome::Failed { error } => json!({ "error": error }),
            TaskOutcome::Segmented { .. } => {
                warn!(task_id = %uuid, "[Api] Segmentation result stored under prediction key");
                json!({})
            }
        },
    };
    Ok(Json(body))
}

/// POST /v1/grabcut
///
/// `image` 是用户画的掩码，`uuid` 是已捐赠图片的 ID。
pub async fn submit_grabcut(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let mask = form
        .image
        .ok_or_else(|| ApiError::BadRequest("Picture is missing".into()))?;

    let image_uuid = form
        .uuid
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Unprocessable("Couldn't process request - parameters missing".into()))?;
    if image_uuid.contains(['/', '\\']) || image_uuid.contains("..") {
        return Err(ApiError::Unprocessable("Couldn't process request - invalid uuid".into()));
    }

    let filename = state.config.donations_dir.join(&image_uuid);
    let task = TaskData::new(JobKind::Segmentation, filename).with_mask(mask, image_uuid);
    state.client.submit(&task).await?;

    debug!(task_id = %task.id, "[Api] Grabcut queued");
    Ok(accepted(task.id))
}

#[derive(Debug, Serialize)]
struct PolygonPoint {
    x: f32,
    y: f32,
}

#[derive(Debug, Serialize)]
struct Polygon {
    points: Vec<PolygonPoint>,
    angle: i32,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// GET /v1/grabcut/{uuid}
///
/// 返回简化后的多边形。
pub async fn get_grabcut(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let body = match state.client.poll(JobKind::Segmentation, &uuid).await? {
        PollStatus::Pending => json!({}),
        PollStatus::Ready(result) => match result.outcome {
            TaskOutcome::Segmented { points, error } => {
                let polygon = Polygon {
                    points: simplify(&points, SIMPLIFY_TOLERANCE, false)
                        .into_iter()
                        .map(|[x, y]| PolygonPoint {
                            x: x as f32,
                            y: y as f32,
                        })
                        .collect(),
                    angle: 0,
                    kind: "polygon",
                };
                if error.is_empty() {
                    json!({ "result": polygon })
                } else {
                    json!({ "result": polygon, "error": error })
                }
            }
            TaskOutcome::Failed { error } => json!({ "error": error }),
            TaskOutcome::Classified { .. } => {
                warn!(task_id = %uuid, "[Api] Classification result stored under grabcut key");
                json!({})
            }
        },
    };
    Ok(Json(body))
}

use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{TimeUtils, new_task_id};

// ==========================================
// 1. 任务类型 (JobKind)
// ==========================================

/// 任务类型
///
/// 决定任务进入哪个入站队列、由哪个池处理、结果写到哪个 Key 前缀下。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// 普通标签分类
    Classification,
    /// NSFW 分类 (独立模型、独立池)
    NsfwClassification,
    /// Grabcut 前景分割
    Segmentation,
    /// 无法识别的类型
    /// - 只用于反序列化兜底，Ingest 遇到直接丢弃。
    #[serde(other)]
    Unknown,
}

impl JobKind {
    /// 所有可调度的类型
    pub const ALL: [JobKind; 3] = [
        JobKind::Classification,
        JobKind::NsfwClassification,
        JobKind::Segmentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Classification => "classification",
            JobKind::NsfwClassification => "nsfw-classification",
            JobKind::Segmentation => "segmentation",
            JobKind::Unknown => "unknown",
        }
    }

    /// 结果 Key 前缀
    pub fn result_prefix(&self) -> &'static str {
        match self {
            JobKind::Segmentation => "grabcut",
            _ => "predict",
        }
    }

    /// 结果 Key: 前缀 + 任务 ID
    pub fn result_key(&self, task_id: &str) -> String {
        format!("{}{}", self.result_prefix(), task_id)
    }

    /// 分类任务的输入是上传的临时文件，发布结果后需要回收
    pub fn owns_upload(&self) -> bool {
        matches!(self, JobKind::Classification | JobKind::NsfwClassification)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 2. 任务数据 (TaskData)
// ==========================================

/// 任务数据
///
/// - 在 SubmissionAPI, Queue, Ingest, Dispatcher 和 Worker 之间流转的数据包。
/// - 创建后不再修改。入队到出队之间归队列所有，执行期间归唯一的 Worker 所有。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    /// 任务 ID，也是轮询时的关联键
    #[serde(rename = "uuid")]
    pub id: String,

    /// 任务类型
    #[serde(rename = "type")]
    pub kind: JobKind,

    /// 创建时间 (Unix 秒，仅供参考)
    #[serde(rename = "created", default)]
    pub created_at: i64,

    /// 输入图片路径
    pub filename: PathBuf,

    /// Grabcut 掩码 (base64 传输)
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<u8>>,

    /// Grabcut 目标图片 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uuid: Option<String>,
}

impl TaskData {
    /// 创建一个新的任务 (自动生成 ID)
    pub fn new(kind: JobKind, filename: impl Into<PathBuf>) -> Self {
        Self::with_id(new_task_id(), kind, filename)
    }

    /// 使用指定 ID 创建任务
    ///
    /// 上传文件的落盘路径由 ID 推导，因此 API 需要先拿到 ID 再构造任务。
    pub fn with_id(id: impl Into<String>, kind: JobKind, filename: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: TimeUtils::now_secs(),
            filename: filename.into(),
            mask: None,
            image_uuid: None,
        }
    }

    /// 附加 Grabcut 掩码和目标图片
    pub fn with_mask(mut self, mask: Vec<u8>, image_uuid: impl Into<String>) -> Self {
        self.mask = Some(mask);
        self.image_uuid = Some(image_uuid.into());
        self
    }

    pub fn result_key(&self) -> String {
        self.kind.result_key(&self.id)
    }
}

// ==========================================
// 3. 执行结果 (TaskOutcome / TaskResult)
// ==========================================

/// 模型描述信息 (`model_info.json`)
///
/// 除了常用的 `name`/`version`，其余字段原样保留透传给客户端。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// 能力执行产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// 分类成功
    Classified {
        label: String,
        score: f32,
        model_info: ModelInfo,
    },
    /// 分割完成
    /// - `error` 非空表示算法给出了结果但附带警告/错误描述。
    Segmented {
        points: Vec<[f64; 2]>,
        #[serde(default)]
        error: String,
    },
    /// 执行失败 (仅在开启 `publish_failures` 时写入)
    Failed { error: String },
}

/// 写入结果存储的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "uuid")]
    pub task_id: String,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn new(task_id: impl Into<String>, outcome: TaskOutcome) -> Self {
        Self {
            task_id: task_id.into(),
            outcome,
        }
    }
}

// ==========================================
// 4. 掩码的 base64 编解码
// ==========================================

mod base64_opt {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

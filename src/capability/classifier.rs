use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, bail};
use tracing::debug;

use super::{check_status, locate_program};
use crate::common::{Capability, CapabilityLoader, ModelInfo, TaskData, TaskOutcome};

/// 模型描述文件
pub const MODEL_INFO_FILE: &str = "model_info.json";
/// 标签文件，一行一个
pub const LABELS_FILE: &str = "labels.txt";
/// 推理程序: `predict <image>`，按标签顺序输出每个标签的概率
pub const PREDICT_PROGRAM: &str = "predict";

/// 进程分类器
///
/// 加载时读入模型描述和标签表，执行时调用目录里的 `predict` 程序，
/// 取概率最大的标签，分数为概率乘 100。
/// 实例里不含权重，每个任务的子进程都会重新加载模型。
#[derive(Debug)]
pub struct ProcessClassifier {
    program: PathBuf,
    labels: Vec<String>,
    model_info: ModelInfo,
}

impl ProcessClassifier {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let info_path = model_dir.join(MODEL_INFO_FILE);
        let raw = std::fs::read(&info_path)
            .with_context(|| format!("couldn't read model info {}", info_path.display()))?;
        let model_info: ModelInfo = serde_json::from_slice(&raw)
            .with_context(|| format!("couldn't parse model info {}", info_path.display()))?;

        let labels_path = model_dir.join(LABELS_FILE);
        let labels = load_labels(&labels_path)?;

        let program = locate_program(model_dir, PREDICT_PROGRAM)?;

        debug!(
            model = %model_info.name,
            labels = labels.len(),
            "[Classifier] Loaded from {}", model_dir.display()
        );
        Ok(Self {
            program,
            labels,
            model_info,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }
}

impl Capability for ProcessClassifier {
    fn execute(&mut self, task: &TaskData) -> anyhow::Result<TaskOutcome> {
        let output = Command::new(&self.program)
            .arg(&task.filename)
            .output()
            .with_context(|| format!("couldn't run {}", self.program.display()))?;
        check_status(&self.program, &output)?;

        let probabilities = parse_probabilities(&String::from_utf8_lossy(&output.stdout))?;
        if probabilities.len() != self.labels.len() {
            bail!(
                "model produced {} probabilities for {} labels",
                probabilities.len(),
                self.labels.len()
            );
        }

        let (label, score) = best_label(&probabilities, &self.labels)
            .context("model produced no probabilities")?;
        Ok(TaskOutcome::Classified {
            label,
            score,
            model_info: self.model_info.clone(),
        })
    }
}

/// 分类器加载器
#[derive(Debug, Clone, Default)]
pub struct ProcessClassifierLoader;

impl CapabilityLoader for ProcessClassifierLoader {
    fn load(&self, model_dir: &Path) -> anyhow::Result<Box<dyn Capability>> {
        Ok(Box::new(ProcessClassifier::load(model_dir)?))
    }
}

/// 读取标签表，忽略空行
fn load_labels(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("couldn't read labels {}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if labels.is_empty() {
        bail!("labels file {} is empty", path.display());
    }
    Ok(labels)
}

/// 解析概率输出，空白或逗号分隔
fn parse_probabilities(stdout: &str) -> anyhow::Result<Vec<f32>> {
    stdout
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("invalid probability '{}'", s))
        })
        .collect()
}

/// 取概率最大的标签
///
/// 返回 `(标签, 概率 * 100)`；并列时取靠前的。概率数和标签数不一致时只看两者的公共部分。
pub fn best_label(probabilities: &[f32], labels: &[String]) -> Option<(String, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, p) in probabilities.iter().copied().enumerate().take(labels.len()) {
        if best.is_none_or(|(_, top)| p > top) {
            best = Some((i, p));
        }
    }
    best.map(|(i, p)| (labels[i].clone(), p * 100.0))
}

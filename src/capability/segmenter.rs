use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;

use super::{check_status, locate_program, stderr_text};
use crate::common::{Capability, CapabilityLoader, TaskData, TaskOutcome};

/// 分割程序: `grabcut <image> <mask>`，stdout 输出 `[[x, y], ...]`
pub const GRABCUT_PROGRAM: &str = "grabcut";

/// 进程分割器
///
/// 掩码先写到临时文件，执行完自动删除。
/// 进程成功退出但 stderr 非空时，stderr 作为结果里的 `error` 一并返回。
#[derive(Debug)]
pub struct ProcessSegmenter {
    program: PathBuf,
}

impl ProcessSegmenter {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            program: locate_program(model_dir, GRABCUT_PROGRAM)?,
        })
    }
}

impl Capability for ProcessSegmenter {
    fn execute(&mut self, task: &TaskData) -> anyhow::Result<TaskOutcome> {
        let mask = task
            .mask
            .as_deref()
            .context("segmentation task carries no mask")?;

        let mut mask_file = tempfile::NamedTempFile::new().context("couldn't create mask file")?;
        mask_file.write_all(mask)?;
        mask_file.flush()?;

        let output = Command::new(&self.program)
            .arg(&task.filename)
            .arg(mask_file.path())
            .output()
            .with_context(|| format!("couldn't run {}", self.program.display()))?;
        check_status(&self.program, &output)?;

        let points: Vec<[f64; 2]> = serde_json::from_slice(&output.stdout)
            .context("couldn't parse grabcut output")?;
        Ok(TaskOutcome::Segmented {
            points,
            error: stderr_text(&output),
        })
    }
}

/// 分割器加载器
#[derive(Debug, Clone, Default)]
pub struct ProcessSegmenterLoader;

impl CapabilityLoader for ProcessSegmenterLoader {
    fn load(&self, model_dir: &Path) -> anyhow::Result<Box<dyn Capability>> {
        Ok(Box::new(ProcessSegmenter::load(model_dir)?))
    }
}

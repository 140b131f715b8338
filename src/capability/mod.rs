//! 基于外部进程的能力实现
//!
//! 模型目录里放一个可执行文件，Worker 每做一个任务就调用一次。
//! 推理本身不在本 crate 里实现。
//!
//! 注意: 这里的适配器在加载阶段只读入程序路径、标签表和模型描述，
//! 权重由每次启动的子进程自己重新加载，因此"每个 Worker 持有一份已加载模型"
//! 对它们只是名义上的，单个任务要额外承担一次模型加载的开销。
//! 需要常驻权重的场景应实现进程内的 [`Capability`](crate::common::Capability)，
//! 由 `CapabilityLoader` 在启动时加载，之后随 Worker 一直复用。

pub mod classifier;
pub mod segmenter;

pub use classifier::{ProcessClassifier, ProcessClassifierLoader, best_label};
pub use segmenter::{ProcessSegmenter, ProcessSegmenterLoader};

use std::path::{Path, PathBuf};

use anyhow::bail;

/// 在模型目录里定位可执行文件
fn locate_program(model_dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let program = model_dir.join(name);
    if !program.is_file() {
        bail!("executable '{}' not found", program.display());
    }
    Ok(program)
}

/// 把进程输出里的 stderr 整理成一行
fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// 进程退出码非 0 时转换成错误
fn check_status(program: &Path, output: &std::process::Output) -> anyhow::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    bail!(
        "{} exited with {}: {}",
        program.display(),
        output.status,
        stderr_text(output)
    )
}

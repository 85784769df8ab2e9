use crate::models::job::GenerationJob;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载生成任务
pub async fn load_job_file(toml_file_path: &Path) -> Result<GenerationJob> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取任务文件: {}", toml_file_path.display()))?;

    let mut job: GenerationJob = toml::from_str(&content)
        .with_context(|| format!("无法解析任务文件: {}", toml_file_path.display()))?;

    job.file_path = Some(toml_file_path.to_string_lossy().to_string());
    if job.name.is_empty() {
        job.name = toml_file_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
    }

    Ok(job)
}

/// 加载文件夹下所有任务文件，单个文件解析失败只告警不中断
pub async fn load_all_job_files(folder_path: &str) -> Result<Vec<GenerationJob>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    // 目录遍历顺序不稳定，按文件名排序
    paths.sort();

    let mut jobs = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_job_file(&path).await {
            Ok(job) => {
                tracing::info!("成功加载 {} 道题目", job.item_count());
                jobs.push(job);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}

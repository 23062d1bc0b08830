use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::MedianError,
    tick_log::{debug, error},
};

/// 参与归并的文件扩展名
pub const SOURCE_EXTENSION: &str = "csv";

/// 文件名主干（不含扩展名）是否命中任一掩码。掩码为空时匹配所有文件，匹配区分大小写。
pub fn matches_masks(path: &Path, masks: &[String]) -> bool
{
    if masks.is_empty() {
        return true;
    }
    let stem = match path.file_stem() {
        | Some(stem) => stem.to_string_lossy(),
        | None => return false,
    };
    masks.iter().any(|mask| stem.contains(mask.as_str()))
}

/// 列出目录下（不递归）所有扩展名为 `csv` 且命中掩码的普通文件，按路径排序。
///
/// # 错误
/// - `MedianError::InputMissing`: 目录不存在。
/// - `MedianError::NotADirectory`: 路径存在但不是目录。
/// - `MedianError::DirectoryScan`: 遍历目录时发生 IO 错误。
pub fn scan_directory(dir: &Path, masks: &[String]) -> Result<Vec<PathBuf>, MedianError>
{
    if !dir.exists() {
        error!("[TickMedian] : input directory does not exist: {}", dir.display());
        return Err(MedianError::InputMissing(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        error!("[TickMedian] : path is not a directory: {}", dir.display());
        return Err(MedianError::NotADirectory(dir.to_path_buf()));
    }

    let scan_error = |source| MedianError::DirectoryScan { path: dir.to_path_buf(), source };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        let path = entry.path();

        // 跟随符号链接判断是否为普通文件
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|ext| ext != SOURCE_EXTENSION).unwrap_or(true) {
            continue;
        }
        if matches_masks(&path, masks) {
            paths.push(path);
        }
        else {
            debug!("[TickMedian] : {} filtered out by filename masks", path.display());
        }
    }

    paths.sort();
    Ok(paths)
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use log::{debug, error, info, warn};

use crate::config::Config;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Bytes>,
    total_bytes: u64,
}

/// 以请求路径为键的响应缓存，所有请求共享同一实例。
///
/// 整个键空间由一把读写锁保护，锁只在读写哈希表期间持有，
/// 持久化与恢复时的磁盘 I/O 都在锁外完成。
/// 缓存没有淘汰策略：达到条目数或字节数上限后拒绝新的写入，已有条目继续提供服务。
pub struct ResponseCache {
    state: RwLock<CacheState>,
    max_entries: usize,
    max_bytes: u64,
}

impl ResponseCache {
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_cache_entries(), config.max_cache_bytes())
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        match self.state.read() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        match self.state.write() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    // 查询
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.read().entries.get(key).cloned()
    }

    /// 写入一条缓存，同键覆盖。
    ///
    /// 条目数已达上限，或写入后总字节数会超出预算时，本次写入被忽略并记录警告。
    /// 返回是否实际写入。
    pub fn put(&self, key: &str, bytes: Bytes) -> bool {
        let mut state = self.write();
        if state.entries.len() >= self.max_entries {
            warn!(
                "缓存条目数已达上限{}，不再缓存{}。请调大上限或引入淘汰策略",
                self.max_entries, key
            );
            return false;
        }
        let replaced = state.entries.get(key).map_or(0, |b| b.len() as u64);
        let new_total = state.total_bytes - replaced + bytes.len() as u64;
        if new_total > self.max_bytes {
            warn!(
                "缓存容量已达上限{} bytes，不再缓存{}（{} bytes）",
                self.max_bytes,
                key,
                bytes.len()
            );
            return false;
        }
        state.total_bytes = new_total;
        state.entries.insert(key.to_string(), bytes);
        true
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.read().total_bytes
    }

    /// 把当前所有条目写入`dir`，每个键一个文件。
    ///
    /// 单个文件写入失败只记录日志并跳过；只有目录本身无法建立时返回错误。
    /// 返回成功写入的文件数。
    pub fn persist_all(&self, dir: &Path) -> io::Result<usize> {
        fs::create_dir_all(dir)?;
        // 先在锁内拍快照，写盘时不持有锁
        let snapshot: Vec<(String, Bytes)> = self
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut written = 0;
        for (key, bytes) in snapshot {
            let file_path = dir.join(sanitize_file_name(&key));
            match fs::write(&file_path, &bytes) {
                Ok(_) => written += 1,
                Err(e) => error!("无法写入缓存文件{}：{}", file_path.display(), e),
            }
        }
        info!("已将{}条缓存写入{}", written, dir.display());
        Ok(written)
    }

    /// 从`dir`读取所有缓存文件，以还原后的文件名为键载入内存。
    ///
    /// 目录无法列出时返回错误；单个文件读取失败只记录日志并跳过。
    /// 返回成功载入的条目数。
    pub fn restore_all(&self, dir: &Path) -> io::Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("无法读取缓存目录{}：{}", dir.display(), e);
                return Err(e);
            }
        };

        let mut loaded = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("遍历缓存目录{}时出错：{}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            match fs::read(&path) {
                Ok(data) => loaded.push((restore_key(&file_name), Bytes::from(data))),
                Err(e) => error!("无法读取缓存文件{}：{}", file_name, e),
            }
        }

        let mut restored = 0;
        for (key, bytes) in loaded {
            if self.put(&key, bytes) {
                restored += 1;
            }
        }
        info!("已从{}载入{}条缓存", dir.display(), restored);
        Ok(restored)
    }
}

/// 把缓存键转换为文件系统安全的文件名。
///
/// 转义是可逆的：`%`、`/`、`\` 被替换为对应的 `%XX` 序列。
pub fn sanitize_file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    name
}

/// [`sanitize_file_name`] 的逆操作，未知的转义序列原样保留
pub fn restore_key(file_name: &str) -> String {
    let mut key = String::with_capacity(file_name.len());
    let mut rest = file_name;
    while let Some(pos) = rest.find('%') {
        key.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3);
        match escape {
            Some("%25") => key.push('%'),
            Some("%2F") => key.push('/'),
            Some("%5C") => key.push('\\'),
            _ => {
                key.push('%');
                rest = &rest[pos + 1..];
                continue;
            }
        }
        rest = &rest[pos + 3..];
    }
    key.push_str(rest);
    key
}

fn is_directory_accessible(dir: &Path) -> bool {
    fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false)
}

/// 确定缓存存储目录。
///
/// 优先使用`primary`，不存在时尝试创建；创建失败则退回`fallback`（必要时创建）。
/// 两者都无法建立时返回错误，调用方应当终止启动。
pub fn ensure_storage_dir(primary: &Path, fallback: &Path) -> io::Result<PathBuf> {
    if is_directory_accessible(primary) {
        debug!("使用缓存目录{}", primary.display());
        return Ok(primary.to_path_buf());
    }
    match fs::create_dir_all(primary) {
        Ok(_) => {
            info!("已创建缓存目录{}", primary.display());
            return Ok(primary.to_path_buf());
        }
        Err(e) => warn!("无法创建主缓存目录{}：{}", primary.display(), e),
    }

    if is_directory_accessible(fallback) {
        info!("使用备用缓存目录{}", fallback.display());
        return Ok(fallback.to_path_buf());
    }
    match fs::create_dir_all(fallback) {
        Ok(_) => {
            info!("已创建备用缓存目录{}", fallback.display());
            Ok(fallback.to_path_buf())
        }
        Err(e) => {
            error!("无法创建备用缓存目录{}：{}", fallback.display(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn unbounded() -> ResponseCache {
        ResponseCache::new(usize::MAX, u64::MAX)
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = unbounded();
        assert!(cache.is_empty());
        assert!(cache.put("/index.html", Bytes::from("hello")));
        assert_eq!(cache.get("/index.html"), Some(Bytes::from("hello")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 5);
    }

    #[test]
    fn test_cache_not_found() {
        let cache = unbounded();
        assert_eq!(cache.get("/nonexistent.txt"), None);
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = unbounded();
        cache.put("/a.css", Bytes::from("old content"));
        cache.put("/a.css", Bytes::from("new"));
        assert_eq!(cache.get("/a.css"), Some(Bytes::from("new")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 3);
    }

    #[test]
    fn test_entry_limit_rejects_inserts() {
        let cache = ResponseCache::new(2, u64::MAX);
        assert!(cache.put("/1", Bytes::from("a")));
        assert!(cache.put("/2", Bytes::from("b")));
        assert!(!cache.put("/3", Bytes::from("c")));
        assert_eq!(cache.get("/3"), None);
        // 已有条目不受影响
        assert_eq!(cache.get("/1"), Some(Bytes::from("a")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_byte_budget_rejects_inserts() {
        let cache = ResponseCache::new(usize::MAX, 10);
        assert!(cache.put("/a", Bytes::from("12345678")));
        assert!(!cache.put("/b", Bytes::from("123")));
        // 覆盖时按替换后的大小计算
        assert!(cache.put("/a", Bytes::from("1234567890")));
        assert_eq!(cache.total_bytes(), 10);
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Arc::new(unbounded());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        cache.put(&format!("/t{}/{}", t, i), Bytes::from("x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
        assert_eq!(cache.total_bytes(), 400);
    }

    #[test]
    fn test_persist_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let cache = unbounded();
        cache.put("/index.html", Bytes::from("<h1>home</h1>"));
        cache.put("/css/site.css", Bytes::from("body{}"));
        cache.put("/100%.txt", Bytes::from("full"));

        assert_eq!(cache.persist_all(dir.path()).unwrap(), 3);
        assert!(dir.path().join("%2Fcss%2Fsite.css").exists());

        let restored = unbounded();
        assert_eq!(restored.restore_all(dir.path()).unwrap(), 3);
        assert_eq!(restored.get("/index.html"), Some(Bytes::from("<h1>home</h1>")));
        assert_eq!(restored.get("/css/site.css"), Some(Bytes::from("body{}")));
        assert_eq!(restored.get("/100%.txt"), Some(Bytes::from("full")));
    }

    #[test]
    fn test_restore_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("%2Fa.html"), "a").unwrap();
        let cache = unbounded();
        cache.put("/b.html", Bytes::from("b"));
        cache.restore_all(dir.path()).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_restore_missing_directory() {
        let cache = unbounded();
        assert!(cache.restore_all(Path::new("/nonexistent/hammy-cache")).is_err());
    }

    #[test]
    fn test_ensure_storage_dir_prefers_primary() {
        let base = tempfile::tempdir().unwrap();
        let primary = base.path().join("primary");
        let fallback = base.path().join("fallback");
        let chosen = ensure_storage_dir(&primary, &fallback).unwrap();
        assert_eq!(chosen, primary);
        assert!(primary.is_dir());
        assert!(!fallback.exists());
    }

    #[test]
    fn test_ensure_storage_dir_falls_back() {
        let base = tempfile::tempdir().unwrap();
        // 主目录的父路径是一个普通文件，因此无法创建
        let blocker = base.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let primary = blocker.join("cache");
        let fallback = base.path().join("fallback");
        let chosen = ensure_storage_dir(&primary, &fallback).unwrap();
        assert_eq!(chosen, fallback);
        assert!(fallback.is_dir());
    }

    #[test]
    fn test_ensure_storage_dir_fails_when_both_fail() {
        let base = tempfile::tempdir().unwrap();
        let blocker = base.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let result = ensure_storage_dir(&blocker.join("a"), &blocker.join("b"));
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("/a/b.html"), "%2Fa%2Fb.html");
        assert_eq!(sanitize_file_name("a\\b"), "a%5Cb");
        assert!(!sanitize_file_name("/x/y/z").contains('/'));
    }

    #[test]
    fn test_restore_key_unknown_escape() {
        assert_eq!(restore_key("_legacy_name%zz"), "_legacy_name%zz");
        assert_eq!(restore_key("%"), "%");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_reversible(key in "[a-zA-Z0-9/%._\\\\-]{0,40}") {
            let name = sanitize_file_name(&key);
            prop_assert!(!name.contains('/'));
            prop_assert_eq!(restore_key(&name), key);
        }
    }
}

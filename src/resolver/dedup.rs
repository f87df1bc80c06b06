// src/resolver/dedup.rs

use crate::models::ResourceDescriptor;
use log::{debug, warn};
use std::collections::HashSet;
use url::Url;

/// 按 URL 路径去重，保留第一次出现的条目。无法解析的链接被丢弃。
pub fn dedupe(descriptors: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| match Url::parse(&d.url) {
            Ok(url) => {
                let fresh = seen.insert(url.path().to_string());
                if !fresh {
                    debug!("丢弃重复资源: {}", d.url);
                }
                fresh
            }
            Err(e) => {
                warn!("无法解析资源链接 '{}': {}", d.url, e);
                false
            }
        })
        .collect()
}

/// 让标题两两不同：冲突的标题追加 `_{id}`，没有 ID 时追加 ` (n)`。
pub fn disambiguate(descriptors: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
    let mut taken: HashSet<String> = HashSet::new();
    descriptors
        .into_iter()
        .map(|mut d| {
            if taken.contains(&d.title) {
                let base = if d.id.is_empty() {
                    d.title.clone()
                } else {
                    format!("{}_{}", d.title, d.id)
                };
                let mut candidate = base.clone();
                let mut n = 1;
                while taken.contains(&candidate) {
                    candidate = format!("{} ({})", base, n);
                    n += 1;
                }
                debug!("标题 '{}' 重名，改为 '{}'", d.title, candidate);
                d.title = candidate;
            }
            taken.insert(d.title.clone());
            d
        })
        .collect()
}

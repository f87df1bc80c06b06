// src/resolver/asset.rs

use crate::models::ResourceDescriptor;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static ASSET_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/assets/([\w\-]+)").unwrap());
static ASSET_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/zh-CN/(\d+)/(?:transcode/)?(\w+/)?[\w\-]+\.(\w+)$").unwrap()
});

/// 从直接资源链接的路径片段合成描述，不发起请求。
///
/// 格式不在 `formats` 中时返回 `None`。
pub fn descriptor_from_asset_link(link: &Url, formats: &[String]) -> Option<ResourceDescriptor> {
    let path = link.path();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let format = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if format.is_empty() || !formats.iter().any(|f| *f == format) {
        return None;
    }

    let id = ASSET_ID_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let title = ASSET_TITLE_RE
        .captures(path)
        .and_then(|caps| {
            let number = caps.get(1)?.as_str();
            let genre = caps
                .get(2)
                .map(|g| g.as_str().trim_end_matches('/'))
                .or_else(|| caps.get(3).map(|m| m.as_str()))?;
            Some(format!("{}-{}", genre.to_uppercase(), number))
        })
        .unwrap_or_else(|| format.to_uppercase());

    Some(ResourceDescriptor {
        format,
        title,
        id,
        url: link.to_string(),
        raw_url: link.to_string(),
        size: -1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_asset_link_with_genre_directory() {
        let link = Url::parse(
            "https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/5c4a-11ee.pkg/zh-CN/1700000000/transcode/audio/abc-def.mp3",
        )
        .unwrap();
        let d = descriptor_from_asset_link(&link, &formats(&["mp3"])).unwrap();
        assert_eq!(d.format, "mp3");
        assert_eq!(d.id, "5c4a-11ee");
        assert_eq!(d.title, "AUDIO-1700000000");
        assert_eq!(d.size, -1);
        assert_eq!(d.url, d.raw_url);
    }

    #[test]
    fn test_asset_link_title_falls_back_to_extension() {
        let with_number = Url::parse(
            "https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/abc/zh-CN/123/file.pdf",
        )
        .unwrap();
        let d = descriptor_from_asset_link(&with_number, &formats(&["pdf"])).unwrap();
        assert_eq!(d.title, "PDF-123");

        let bare = Url::parse("https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/abc.pkg/pdf.pdf").unwrap();
        let d = descriptor_from_asset_link(&bare, &formats(&["pdf"])).unwrap();
        assert_eq!(d.title, "PDF");
        assert_eq!(d.id, "abc");
    }

    #[test]
    fn test_asset_link_outside_format_selection_is_dropped() {
        let link = Url::parse("https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/abc/a.mp3").unwrap();
        assert!(descriptor_from_asset_link(&link, &formats(&["pdf"])).is_none());
        let no_ext = Url::parse("https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/abc/readme").unwrap();
        assert!(descriptor_from_asset_link(&no_ext, &formats(&["pdf"])).is_none());
    }
}

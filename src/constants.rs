// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 65;
pub const MAX_FILENAME_CHARS: usize = 255;
pub const UNTITLED: &str = "Untitled";
pub const UNNAMED_RESOURCE: &str = "未命名";
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LEDGER_FILE_NAME: &str = "log-smartedudl.txt";
pub const SCRATCH_DIR_NAME: &str = "cn.smartedu";
pub const DEFAULT_SAVE_DIR: &str = "downloads";
pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const DEFAULT_SEGMENT_WORKERS: usize = 8;
pub const BROWSE_FETCH_WORKERS: usize = 4;
pub const DOWNLOAD_CHUNK_SIZE: usize = 32 * 1024;
pub const PROGRESS_INTERVAL_MS: u64 = 200;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const AUTH_HEADER: &str = "x-nd-auth";
pub const TOKEN_ENV_KEYS: &[&str] = &["SMARTEDU_TOKEN", "ACCESS_TOKEN"];

pub mod api {
    /// 直接资源链接中必须出现的路径片段
    pub const ASSETS_PATH: &str = "/edu_product/esp/assets/";
    pub const CONTENT_TYPE_PARAM: &str = "contentType";
    pub const TCH_MATERIAL_PATH: &str = "/tchMaterial/detail";
    pub const READING_LIBRARY_PATH: &str = "/readingLibrary/detail";

    pub mod resource_formats {
        pub const PDF: &str = "pdf";
        pub const MP3: &str = "mp3";
        pub const OGG: &str = "ogg";
        pub const M3U8: &str = "m3u8";
        pub const TS: &str = "ts";
    }
    pub mod resource_types {
        pub const ASSETS_DOCUMENT: &str = "assets_document";
    }
    pub mod requirement_keys {
        pub const TOTAL_SIZE: &str = "total_size";
    }
}

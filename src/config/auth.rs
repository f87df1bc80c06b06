// src/config/auth.rs

use crate::{
    config::ExternalConfig,
    constants,
    error::{AppError, AppResult},
    models::RequestHeaders,
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use regex::Regex;
use std::{fs, path::PathBuf, sync::LazyLock};

static MAC_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)MAC\s+id="([^"]+)",nonce="0",mac="0""#).unwrap());

pub(super) fn get_config_path() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME)
        .join(constants::CONFIG_FILE_NAME);
    Ok(path)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_path()?;
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))
            .map_err(AppError::from)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json_content = serde_json::to_string_pretty(&config)?;
        fs::write(&config_path, json_content)?;

        Ok(config)
    }
}

/// 从 `MAC id="...",nonce="0",mac="0"` 形式的认证串中取出 token，其他输入原样返回。
pub fn extract_token(auth_info: &str) -> String {
    let auth_info = auth_info.trim();
    MAC_TOKEN_RE
        .captures(auth_info)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| auth_info.to_string(), |m| m.as_str().to_string())
}

/// 拼接成完整的 `x-nd-auth` 头。
pub fn fulfill_token(token: &str) -> String {
    if token.starts_with("MAC id") {
        token.to_string()
    } else {
        format!(r#"MAC id="{}",nonce="0",mac="0""#, token)
    }
}

pub fn resolve_token(cli_token: Option<&str>, config_token: Option<&str>) -> (Option<String>, String) {
    if let Some(token) = cli_token
        && !token.trim().is_empty()
    {
        debug!("使用来自命令行参数的 Token");
        return (Some(extract_token(token)), "命令行参数".to_string());
    }
    for key in constants::TOKEN_ENV_KEYS {
        if let Ok(token) = std::env::var(key)
            && !token.trim().is_empty()
        {
            debug!("使用来自环境变量 {} 的 Token", key);
            return (Some(extract_token(&token)), format!("环境变量 ({})", key));
        }
    }
    if let Some(token) = config_token
        && !token.trim().is_empty()
    {
        debug!("使用来自本地配置文件的 Token");
        return (Some(extract_token(token)), "本地配置文件".to_string());
    }
    debug!("未在任何位置找到可用的 Token");
    (None, "未找到".to_string())
}

/// 解析 `Name: Value` 或 `Name=Value` 形式的自定义请求头。
pub fn parse_header_arg(raw: &str) -> AppResult<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .or_else(|| raw.split_once('='))
        .ok_or_else(|| AppError::Other(anyhow!("无效的请求头 '{}'，应为 'Name: Value'", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Other(anyhow!("请求头名称为空: '{}'", raw)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// 组合出一次批量任务使用的请求头。
pub fn build_headers(token: Option<&str>, extra: &[String]) -> AppResult<RequestHeaders> {
    let mut headers = RequestHeaders::new();
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        headers.insert(constants::AUTH_HEADER, fulfill_token(token));
    }
    for raw in extra {
        let (name, value) = parse_header_arg(raw)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_and_fulfill_token() {
        assert_eq!(extract_token(r#"MAC id="abc123",nonce="0",mac="0""#), "abc123");
        assert_eq!(extract_token("  plain  "), "plain");
        assert_eq!(fulfill_token("abc123"), r#"MAC id="abc123",nonce="0",mac="0""#);
        assert_eq!(
            fulfill_token(r#"MAC id="x",nonce="0",mac="0""#),
            r#"MAC id="x",nonce="0",mac="0""#
        );
    }

    #[test]
    fn test_resolve_token_prefers_cli() {
        let (token, source) = resolve_token(Some("from-cli"), Some("from-file"));
        assert_eq!(token.as_deref(), Some("from-cli"));
        assert_eq!(source, "命令行参数");
    }

    #[test]
    fn test_build_headers() {
        let headers = build_headers(Some("tok"), &["Referer: https://basic.smartedu.cn/".to_string()]).unwrap();
        assert_eq!(headers.get("x-nd-auth"), Some(r#"MAC id="tok",nonce="0",mac="0""#));
        assert_eq!(headers.get("Referer"), Some("https://basic.smartedu.cn/"));

        assert!(!build_headers(None, &[]).unwrap().is_active());
        assert!(build_headers(None, &["novalue".to_string()]).is_err());
    }
}

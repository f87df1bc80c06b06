// src/downloader/key_exchange.rs

//! 视频密钥的 nonce/sign 握手和分片解密。

use crate::{
    client::RobustClient,
    error::*,
    models::{EncryptionContext, RequestHeaders},
    utils,
};
use aes::cipher::{BlockDecryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const AES_BLOCK_SIZE: usize = 16;

/// `md5(nonce + key_id)` 的前 16 个十六进制字符。
pub fn sign(nonce: &str, key_id: &str) -> String {
    utils::md5_hex(&format!("{}{}", nonce, key_id))[..16].to_string()
}

/// 解析 `EXT-X-KEY` 的 IV，允许 `0x` 前缀。
pub fn parse_iv(raw: &str) -> AppResult<Vec<u8>> {
    let hex_str = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let iv = hex::decode(hex_str).map_err(|e| AppError::M3u8Parse(format!("无效的IV十六进制值: {}", e)))?;
    if iv.len() != AES_BLOCK_SIZE {
        return Err(AppError::M3u8Parse(format!("IV 长度应为 16 字节，实际为 {}", iv.len())));
    }
    Ok(iv)
}

/// 以 `sign` 的 ASCII 字节为 AES-128 密钥，ECB 解出分片密钥。
pub fn unwrap_key(encrypted_b64: &str, sign: &str) -> AppResult<Vec<u8>> {
    let encrypted = BASE64.decode(encrypted_b64.trim())?;
    let sign_bytes = sign.as_bytes();
    if sign_bytes.len() != AES_BLOCK_SIZE {
        return Err(AppError::Security(format!("sign 长度错误: {}", sign_bytes.len())));
    }
    let key = Aes128EcbDec::new(sign_bytes.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
        .map_err(|e| AppError::Security(format!("AES密钥解密失败: {}", e)))?;
    if key.len() != AES_BLOCK_SIZE {
        return Err(AppError::Security(format!("解密得到的密钥长度为 {}，应为 16", key.len())));
    }
    Ok(key)
}

/// 未声明 IV 时按 HLS 规则使用媒体序号的 128 位大端表示。
pub fn default_iv(sequence: u64) -> [u8; AES_BLOCK_SIZE] {
    u128::from(sequence).to_be_bytes()
}

/// AES-128-CBC 解密单个分片并去除 PKCS#7 填充。
pub fn decrypt_segment(data: &[u8], key: &[u8], iv: &[u8]) -> AppResult<Vec<u8>> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(AppError::Security(format!(
            "密文长度 {} 不是块大小({})的倍数",
            data.len(),
            AES_BLOCK_SIZE
        )));
    }
    Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| AppError::Security(format!("AES解密器初始化失败: {}", e)))?
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|e| AppError::Security(format!("分片解密失败: {}", e)))
}

fn json_field(value: &Value, field: &str) -> AppResult<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Security(format!("密钥服务器响应中未找到 '{}'", field)))
}

/// 播放列表声明密钥后的完整握手：取 nonce、计算 sign、取回并解出密钥。
pub async fn exchange(
    client: &RobustClient,
    context: &EncryptionContext,
    headers: &RequestHeaders,
    cancel: &CancellationToken,
) -> AppResult<Vec<u8>> {
    let signs_url = format!("{}/signs", context.key_url);
    let nonce = json_field(&client.fetch_json::<Value>(&signs_url, headers, cancel).await?, "nonce")?;
    let sign = sign(&nonce, &context.key_id);
    debug!("密钥握手: key_id={}, nonce={}, sign={}", context.key_id, nonce, sign);

    let mut key_url = Url::parse(&context.key_url)?;
    key_url
        .query_pairs_mut()
        .append_pair("nonce", &nonce)
        .append_pair("sign", &sign);
    let payload: Value = client.fetch_json(key_url.as_str(), headers, cancel).await?;
    unwrap_key(&json_field(&payload, "key")?, &sign)
}

/// 握手失败时不中止下载，返回 `None` 并按未加密处理。
pub async fn try_exchange(
    client: &RobustClient,
    context: &EncryptionContext,
    headers: &RequestHeaders,
    cancel: &CancellationToken,
) -> AppResult<Option<Vec<u8>>> {
    match exchange(client, context, headers, cancel).await {
        Ok(key) => Ok(Some(key)),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            warn!("获取视频密钥失败，分片将按原样保存 ({}): {}", context.key_url, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    #[test]
    fn test_sign_is_truncated_md5() {
        let s = sign("nonce", "key-id");
        assert_eq!(s.len(), 16);
        assert_eq!(s, utils::md5_hex("noncekey-id")[..16]);
    }

    #[test]
    fn test_unwrap_key() {
        let sign = sign("abc", "k1");
        let content_key = *b"0123456789abcdef";
        let wrapped = Aes128EcbEnc::new(sign.as_bytes().into()).encrypt_padded_vec_mut::<Pkcs7>(&content_key);
        let key = unwrap_key(&BASE64.encode(&wrapped), &sign).unwrap();
        assert_eq!(key, content_key);

        assert!(unwrap_key("!!!", &sign).is_err());
        assert!(unwrap_key(&BASE64.encode(&wrapped), "0000000000000000").is_err());
    }

    #[test]
    fn test_decrypt_segment() {
        let key = [7u8; 16];
        let iv = default_iv(3);
        let plain = b"segment payload that is not block aligned";
        let encrypted = Aes128CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plain);
        assert_eq!(decrypt_segment(&encrypted, &key, &iv).unwrap(), plain);
        assert!(decrypt_segment(&encrypted[..5], &key, &iv).is_err());
    }

    #[test]
    fn test_parse_iv() {
        let iv = parse_iv("0x000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(iv, (0u8..16).collect::<Vec<_>>());
        assert_eq!(parse_iv("000102030405060708090A0B0C0D0E0F").unwrap(), iv);
        assert!(parse_iv("0xZZ").is_err());
        assert!(parse_iv("0x0102").is_err());
    }

    #[test]
    fn test_default_iv_is_big_endian_sequence() {
        let iv = default_iv(258);
        assert_eq!(&iv[..14], &[0u8; 14]);
        assert_eq!(&iv[14..], &[1, 2]);
    }
}

// tests/resolver_test.rs

use mockito::Matcher;
use smartedu_dl::{
    catalog::EndpointTemplate,
    client::RobustClient,
    config::AppConfig,
    error::AppError,
    resolver::{LinkResolver, ResolveOptions},
};
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;

const COURSE_LINK: &str = "https://basic.smartedu.cn/qualityCourse?courseId=c1";

/// 让课程详情页指向 mock 服务器的接口。
fn setup_resolver(server_url: &str) -> LinkResolver {
    let endpoints = HashMap::from([(
        "/qualityCourse".to_string(),
        EndpointTemplate {
            name: "精品课".to_string(),
            required_query_params: vec!["courseId".to_string()],
            primary: format!("{}/{{prefix}}/courses/{{id}}.json", server_url),
            backups: vec![format!("{}/{{prefix}}/backup/{{id}}.json", server_url)],
            audio: None,
        },
    )]);
    let config = AppConfig {
        endpoints: Some(endpoints),
        ..AppConfig::default()
    };
    let client = Arc::new(RobustClient::new(&config).unwrap());
    LinkResolver::new(client, Arc::new(config.catalog()))
}

fn course_json(items: &str) -> String {
    format!(
        r#"{{
            "id": "c1",
            "teacher_list": [{{"id": "t", "name": "王老师"}}],
            "custom_properties": {{"school_name": "一中"}},
            "relations": {{"course_resource": [{}]}}
        }}"#,
        items
    )
}

#[tokio::test]
async fn test_resolve_extended_course_payload() {
    let mut server = mockito::Server::new_async().await;
    let body = course_json(
        r#"{"id": "r1", "title": "导学案", "ti_items": [{"ti_format": "pdf", "ti_size": 2048, "ti_storages": ["https://r1-ndr-private.ykt.cbern.com.cn/x/导学案.pdf"]}]},
           {"id": "r2", "title": "微课", "ti_items": [{"ti_format": "m3u8", "ti_storages": ["https://v.example/r2.m3u8"]}]}"#,
    );
    let mock = server
        .mock("GET", "/s-file-1/courses/c1.json")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let resolver = setup_resolver(&server.url());
    let options = ResolveOptions::new(["pdf"]).unwrap();
    let result = resolver
        .resolve_all(&[COURSE_LINK.to_string()], &options, &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.len(), 1);
    let d = &result[0];
    assert_eq!(d.title, "导学案 (一中_王老师)");
    assert_eq!(d.format, "pdf");
    assert_eq!(d.size, 2048);
    assert_eq!(d.raw_url, "https://r1-ndr-private.ykt.cbern.com.cn/x/导学案.pdf");
    assert_eq!(d.url, "https://r1-ndr.ykt.cbern.com.cn/x/pdf.pdf");
}

#[tokio::test]
async fn test_duplicates_across_references_are_merged() {
    let mut server = mockito::Server::new_async().await;
    let item = r#"{"id": "r1", "title": "课件", "ti_items": [{"ti_format": "pdf", "ti_storages": ["https://r1-ndr.ykt.cbern.com.cn/a/pdf.pdf"]}]}"#;
    server
        .mock("GET", "/s-file-1/courses/c1.json")
        .with_status(200)
        .with_body(format!("[{}]", item))
        .create_async()
        .await;
    server
        .mock("GET", "/s-file-1/courses/c2.json")
        .with_status(200)
        .with_body(item)
        .create_async()
        .await;

    let resolver = setup_resolver(&server.url());
    let references = vec![
        COURSE_LINK.to_string(),
        "https://basic.smartedu.cn/qualityCourse?courseId=c2".to_string(),
    ];
    let result = resolver
        .resolve_all(&references, &ResolveOptions::new(["pdf"]).unwrap(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].title, "课件");
}

#[tokio::test]
async fn test_failed_endpoint_is_skipped_and_backup_used() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/s-file-1/courses/c1.json")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/s-file-1/backup/c1.json")
        .with_status(200)
        .with_body(r#"{"id": "r9", "title": "备用课件", "ti_items": [{"ti_format": "pdf", "ti_storages": ["https://r1-ndr.ykt.cbern.com.cn/b/pdf.pdf"]}]}"#)
        .create_async()
        .await;

    let resolver = setup_resolver(&server.url());
    let options = ResolveOptions::new(["pdf"]).unwrap();
    let without_backup = resolver
        .resolve(COURSE_LINK, &options, &CancellationToken::new())
        .await
        .unwrap();
    assert!(without_backup.is_empty());

    let with_backup = resolver
        .resolve(COURSE_LINK, &options.with_backup(true), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(with_backup.len(), 1);
    assert_eq!(with_backup[0].title, "备用课件");
}

#[tokio::test]
async fn test_invalid_references_are_skipped_in_batch() {
    let server = mockito::Server::new_async().await;
    let resolver = setup_resolver(&server.url());
    let options = ResolveOptions::new(["pdf"]).unwrap();

    let err = resolver
        .resolve("https://basic.smartedu.cn/unknown?id=1", &options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidReference(_)));

    let references = vec![
        "not a link".to_string(),
        "https://r1-ndr.ykt.cbern.com.cn/edu_product/esp/assets/abc-123.pkg/pdf.pdf".to_string(),
    ];
    let result = resolver
        .resolve_all(&references, &options, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id, "abc-123");
    assert_eq!(result[0].size, -1);
}

#[tokio::test]
async fn test_cancelled_resolution_propagates() {
    let server = mockito::Server::new_async().await;
    let resolver = setup_resolver(&server.url());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = resolver
        .resolve_all(&[COURSE_LINK.to_string()], &ResolveOptions::new(["pdf"]).unwrap(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Cancelled));
}

/// 教材详情页指向 mock 服务器，其余设置同内置表。
fn setup_textbook_resolver(server_url: &str) -> LinkResolver {
    let endpoints = HashMap::from([(
        "/tchMaterial/detail".to_string(),
        EndpointTemplate {
            name: "教材".to_string(),
            required_query_params: vec!["contentId".to_string(), "contentType".to_string()],
            primary: format!("{}/{{prefix}}/tch_material/details/{{id}}.json", server_url),
            backups: Vec::new(),
            audio: None,
        },
    )]);
    let config = AppConfig {
        endpoints: Some(endpoints),
        ..AppConfig::default()
    };
    let client = Arc::new(RobustClient::new(&config).unwrap());
    LinkResolver::new(client, Arc::new(config.catalog()))
}

#[tokio::test]
async fn test_textbook_document_resolves_to_single_pdf() {
    let mut server = mockito::Server::new_async().await;
    let detail = server
        .mock("GET", "/s-file-1/tch_material/details/ABC.json")
        .with_status(200)
        .with_body(
            r#"{
                "id": "ABC",
                "title": "义务教育教科书·语文一年级上册",
                "ti_items": [
                    {"ti_format": "jpg", "ti_storages": ["https://r1-ndr.ykt.cbern.com.cn/ABC/cover.jpg"]},
                    {"ti_format": "pdf", "ti_size": 5120, "ti_storages": ["https://r1-ndr-private.ykt.cbern.com.cn/ABC.pkg/语文.pdf"]}
                ]
            }"#,
        )
        .create_async()
        .await;

    let resolver = setup_textbook_resolver(&server.url());
    let options = ResolveOptions::new(["pdf"]).unwrap();
    let result = resolver
        .resolve_all(
            &["https://basic.smartedu.cn/tchMaterial/detail?contentType=assets_document&contentId=ABC".to_string()],
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    detail.assert_async().await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].format, "pdf");
    assert_eq!(result[0].id, "ABC");
    assert_eq!(result[0].size, 5120);
}

#[tokio::test]
async fn test_textbook_with_other_content_type_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let detail = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let resolver = setup_textbook_resolver(&server.url());
    let options = ResolveOptions::new(["pdf"]).unwrap();
    let result = resolver
        .resolve_all(
            &["https://basic.smartedu.cn/tchMaterial/detail?contentType=other&contentId=ABC".to_string()],
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    detail.assert_async().await;
    assert!(result.is_empty());
}

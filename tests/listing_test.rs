//! Object list generation against a mocked S3 listing

use reqwest::Client;
use s3_thaw::listing::{generate_and_save, generate_object_list, ListGenerationError};
use s3_thaw::remote::credentials::Credentials;
use s3_thaw::remote::s3::S3Client;
use s3_thaw::storage::read_key_list;
use s3_thaw::utils::RetryConfig;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> S3Client {
    S3Client::new(
        Client::new(),
        &server.uri(),
        "eu-west-1",
        Credentials::new("AKIDEXAMPLE", "secret"),
    )
    .unwrap()
}

fn fast_retry() -> RetryConfig {
    RetryConfig::with_delays(3, 1, 5)
}

fn page(keys: &[(&str, &str)], next: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|(key, class)| {
            format!("<Contents><Key>{key}</Key><StorageClass>{class}</StorageClass></Contents>")
        })
        .collect();
    let truncation = match next {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!("<ListBucketResult><Name>archive</Name>{truncation}{contents}</ListBucketResult>")
}

/// Archived keys from every page end up in the list file, in order
#[tokio::test]
async fn test_generate_and_save_across_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/archive"))
        .and(query_param("continuation-token", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(
            &[("2019/c.bin", "DEEP_ARCHIVE"), ("2019/d.bin", "STANDARD_IA")],
            None,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/archive"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(
            &[("2018/a.bin", "GLACIER"), ("2018/b.bin", "STANDARD")],
            Some("t2"),
        )))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("archive.objects");

    let written = generate_and_save(&client(&server), "archive", &output, &fast_retry())
        .await
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(
        read_key_list(&output).await.unwrap(),
        vec!["2018/a.bin", "2019/c.bin"]
    );
}

/// Throttled pages are retried
#[tokio::test]
async fn test_slow_down_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/archive"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_string("<Error><Code>SlowDown</Code><Message>Reduce your request rate.</Message></Error>"),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/archive"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page(&[("x.bin", "GLACIER")], None)),
        )
        .mount(&server)
        .await;

    let keys = generate_object_list(&client(&server), "archive", &fast_retry())
        .await
        .unwrap();
    assert_eq!(keys, vec!["x.bin"]);
}

/// A page that cannot be fetched aborts generation and writes nothing
#[tokio::test]
async fn test_access_denied_aborts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/archive"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("archive.objects");

    let err = generate_and_save(&client(&server), "archive", &output, &fast_retry())
        .await
        .unwrap_err();

    assert!(matches!(err, ListGenerationError::Page { page: 0, .. }));
    assert!(!output.exists());
}

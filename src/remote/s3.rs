//! S3 REST client
//!
//! Path-style requests against an S3-compatible endpoint:
//!
//! - `POST /{bucket}/{key}?restore` with a `RestoreRequest` body
//! - `HEAD /{bucket}/{key}`, reading `x-amz-restore`
//! - `GET /{bucket}?list-type=2`, following continuation tokens
//!
//! Error bodies are the usual `<Error><Code>..</Code><Message>..</Message>`
//! documents; the code is classified by [`RemoteError::from_code`].

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use url::Url;

use super::credentials::Credentials;
use super::sigv4::{self, SigningRequest};
use super::{
    ObjectHead, ObjectPage, ObjectStore, ObjectSummary, RemoteError, RestoreStatus,
    RetrievalTier, SessionProvider, SharedObjectStore, StorageClass,
};
use crate::config::RemoteConfig;

const SERVICE: &str = "s3";

/// One credentialed S3 session
pub struct S3Client {
    http: Client,
    endpoint: String,
    host: String,
    region: String,
    credentials: Credentials,
}

impl S3Client {
    /// Build a client for `endpoint` (scheme + host, optional port)
    pub fn new(
        http: Client,
        endpoint: &str,
        region: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, RemoteError> {
        let url = Url::parse(endpoint)
            .map_err(|e| RemoteError::InvalidResponse(format!("invalid endpoint {endpoint}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| RemoteError::InvalidResponse(format!("endpoint {endpoint} has no host")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            host,
            region: region.into(),
            credentials,
        })
    }

    /// Default AWS endpoint for a region
    pub fn default_endpoint(region: &str) -> String {
        format!("https://s3.{region}.amazonaws.com")
    }

    async fn send(
        &self,
        method: Method,
        canonical_uri: &str,
        query: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<reqwest::Response, RemoteError> {
        let canonical_query = sigv4::canonical_query(query);
        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            SERVICE,
            Utc::now(),
            &SigningRequest {
                method: method.as_str(),
                host: &self.host,
                canonical_uri,
                canonical_query: &canonical_query,
                payload: &body,
            },
        );

        let mut url = format!("{}{canonical_uri}", self.endpoint);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&signed.authorization)?);
        headers.insert("x-amz-date", header_value(&signed.amz_date)?);
        headers.insert("x-amz-content-sha256", header_value(&signed.content_sha256)?);
        if let Some(token) = &signed.security_token {
            headers.insert("x-amz-security-token", header_value(token)?);
        }
        if !body.is_empty() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        }

        let response = self
            .http
            .request(method, url.as_str())
            .headers(headers)
            .body(body)
            .send()
            .await?;

        Ok(response)
    }

    async fn error_from(&self, response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match parse_error(&body) {
            Some((code, message)) => RemoteError::from_code(status, &code, &message),
            None if status == StatusCode::NOT_FOUND.as_u16() => RemoteError::NotFound,
            None => RemoteError::Service {
                status,
                code: status.to_string(),
                message: body,
            },
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RetrievalTier,
    ) -> Result<RestoreStatus, RemoteError> {
        let uri = sigv4::object_uri(bucket, key);
        let body = restore_request_body(days, tier);
        let response = self
            .send(Method::POST, &uri, &[("restore", "")], body.into_bytes())
            .await?;

        match response.status() {
            StatusCode::OK => Ok(RestoreStatus::AlreadyRestored),
            StatusCode::ACCEPTED => Ok(RestoreStatus::Accepted),
            _ => Err(self.error_from(response).await),
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, RemoteError> {
        let uri = sigv4::object_uri(bucket, key);
        let response = self.send(Method::HEAD, &uri, &[], Vec::new()).await?;
        let status = response.status();

        if status.is_success() {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            };
            return Ok(ObjectHead {
                restore: header("x-amz-restore"),
                storage_class: header("x-amz-storage-class"),
            });
        }

        // HEAD responses carry no error document.
        match status {
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
            StatusCode::BAD_REQUEST if self.credentials.session_token.is_some() => {
                Err(RemoteError::CredentialExpired)
            }
            _ => Err(RemoteError::Service {
                status: status.as_u16(),
                code: status.as_u16().to_string(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            }),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage, RemoteError> {
        let uri = format!("/{}", sigv4::uri_encode(bucket));
        let mut query = vec![("list-type", "2")];
        if let Some(token) = continuation {
            query.push(("continuation-token", token));
        }

        let response = self.send(Method::GET, &uri, &query, Vec::new()).await?;
        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let body = response.text().await?;
        parse_list_page(&body)
    }
}

/// Acquires [`S3Client`] sessions, re-reading credentials on every connect
pub struct S3SessionProvider {
    http: Client,
    endpoint: String,
    region: String,
    profile: String,
}

impl S3SessionProvider {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| S3Client::default_endpoint(&config.region));

        Ok(Self {
            http,
            endpoint,
            region: config.region.clone(),
            profile: config.profile.clone(),
        })
    }
}

#[async_trait]
impl SessionProvider for S3SessionProvider {
    async fn connect(&self) -> Result<SharedObjectStore, RemoteError> {
        let credentials = Credentials::load(&self.profile).await?;
        tracing::debug!(
            profile = %self.profile,
            access_key_id = %credentials.access_key_id,
            "Acquired S3 session"
        );
        let client = S3Client::new(self.http.clone(), &self.endpoint, &self.region, credentials)?;
        Ok(std::sync::Arc::new(client))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(value)
        .map_err(|e| RemoteError::InvalidResponse(format!("invalid header value: {e}")))
}

fn restore_request_body(days: u32, tier: RetrievalTier) -> String {
    format!(
        "<RestoreRequest xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Days>{days}</Days>\
         <GlacierJobParameters><Tier>{tier}</Tier></GlacierJobParameters>\
         </RestoreRequest>"
    )
}

fn xml_element<'a>(re: &'static OnceLock<Regex>, pattern: &str, body: &'a str) -> Option<&'a str> {
    let re = re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern"));
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn xml_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

fn parse_error(body: &str) -> Option<(String, String)> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    static MESSAGE_RE: OnceLock<Regex> = OnceLock::new();

    let code = xml_element(&CODE_RE, r"<Code>([^<]*)</Code>", body)?;
    let message = xml_element(&MESSAGE_RE, r"<Message>([^<]*)</Message>", body).unwrap_or("");
    Some((xml_text(code), xml_text(message)))
}

fn parse_list_page(body: &str) -> Result<ObjectPage, RemoteError> {
    static CONTENTS_RE: OnceLock<Regex> = OnceLock::new();
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    static TRUNCATED_RE: OnceLock<Regex> = OnceLock::new();
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

    if !body.contains("<ListBucketResult") {
        return Err(RemoteError::InvalidResponse(
            "missing ListBucketResult".to_string(),
        ));
    }

    let contents_re = CONTENTS_RE
        .get_or_init(|| Regex::new(r"(?s)<Contents>(.*?)</Contents>").expect("Invalid regex pattern"));

    let mut objects = Vec::new();
    for contents in contents_re.captures_iter(body) {
        let entry = contents.get(1).map(|m| m.as_str()).unwrap_or_default();
        let key = xml_element(&KEY_RE, r"<Key>([^<]*)</Key>", entry)
            .ok_or_else(|| RemoteError::InvalidResponse("listing entry without Key".to_string()))?;
        let class = xml_element(&CLASS_RE, r"<StorageClass>([^<]*)</StorageClass>", entry)
            .unwrap_or("STANDARD");
        objects.push(ObjectSummary {
            key: xml_text(key),
            storage_class: StorageClass::parse(class),
        });
    }

    let truncated = xml_element(&TRUNCATED_RE, r"<IsTruncated>([^<]*)</IsTruncated>", body)
        .is_some_and(|v| v.trim() == "true");
    let next_token = if truncated {
        let token = xml_element(
            &TOKEN_RE,
            r"<NextContinuationToken>([^<]*)</NextContinuationToken>",
            body,
        )
        .ok_or_else(|| {
            RemoteError::InvalidResponse("truncated listing without continuation token".to_string())
        })?;
        Some(xml_text(token))
    } else {
        None
    };

    Ok(ObjectPage {
        objects,
        next_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_request_body() {
        let body = restore_request_body(7, RetrievalTier::Bulk);
        assert!(body.contains("<Days>7</Days>"));
        assert!(body.contains("<Tier>Bulk</Tier>"));
    }

    #[test]
    fn test_parse_error_document() {
        let body = "<?xml version=\"1.0\"?><Error><Code>NoSuchKey</Code>\
                    <Message>The specified key does not exist.</Message></Error>";
        let (code, message) = parse_error(body).unwrap();
        assert_eq!(code, "NoSuchKey");
        assert_eq!(message, "The specified key does not exist.");
        assert!(parse_error("").is_none());
    }

    #[test]
    fn test_parse_list_page() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>archive</Name>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=</NextContinuationToken>
  <Contents><Key>2018/06/10/a&amp;b.txt</Key><StorageClass>GLACIER</StorageClass></Contents>
  <Contents><Key>2018/06/10/c.txt</Key><StorageClass>STANDARD</StorageClass></Contents>
  <Contents><Key>2018/06/10/d.txt</Key><StorageClass>DEEP_ARCHIVE</StorageClass></Contents>
</ListBucketResult>"#;

        let page = parse_list_page(body).unwrap();
        assert_eq!(page.objects.len(), 3);
        assert_eq!(page.objects[0].key, "2018/06/10/a&b.txt");
        assert!(page.objects[0].storage_class.is_archived());
        assert!(!page.objects[1].storage_class.is_archived());
        assert_eq!(
            page.next_token.as_deref(),
            Some("1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=")
        );
    }

    #[test]
    fn test_parse_last_page() {
        let body = "<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let page = parse_list_page(body).unwrap();
        assert!(page.objects.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_list_page("<html>oops</html>").is_err());
    }

    #[test]
    fn test_client_host_includes_port() {
        let client = S3Client::new(
            Client::new(),
            "http://127.0.0.1:9000/",
            "us-east-1",
            Credentials::new("a", "b"),
        )
        .unwrap();
        assert_eq!(client.host, "127.0.0.1:9000");
        assert_eq!(client.endpoint, "http://127.0.0.1:9000");
    }
}

//! S3-compatible storage backend.
//!
//! Works against AWS S3 and anything that speaks its API (MinIO, Backblaze B2,
//! Cloudflare R2, Tigris). Keys mirror the local shard layout under an
//! optional prefix, so `ab/abcdef....webp` on disk is
//! `<prefix>/ab/abcdef....webp` in the bucket.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration (`key_id` and
//! `key_secret`); the AWS credential chain is not consulted.

use crate::{
    FileInfo, StorageBackend,
    backend::FileInfoStream,
    error::{ErrorKind, Result},
    validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
    types::StorageClass,
};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Connection details for an [`S3Backend`].
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    /// Optional key prefix (acts as virtual directory).
    pub prefix: Option<String>,
    /// AWS region or provider-specific region (e.g. "us-west-004" for Backblaze).
    pub region: String,
    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
    /// Storage class applied to every upload, e.g. `STANDARD_IA`.
    pub storage_class: Option<String>,
}

/// S3-compatible storage backend.
///
/// # Examples
///
/// ```no_run
/// use inkvault_storage::backend::{S3Backend, S3Options};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new("s3", S3Options {
///     bucket: "webtoons".to_string(),
///     prefix: Some("images".to_string()),
///     region: "us-east-1".to_string(),
///     endpoint: Some("http://localhost:9000".to_string()),
///     key_id: "minio".to_string(),
///     key_secret: "minio123".to_string(),
///     storage_class: None,
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    storage_class: Option<StorageClass>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    pub fn new(name: impl Into<String>, options: S3Options) -> Result<Self> {
        if options.bucket.is_empty() {
            exn::bail!(ErrorKind::Misconfigured("S3 bucket name is empty".to_string()));
        }
        let prefix = options
            .prefix
            .filter(|p| !p.trim_matches('/').is_empty())
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let credentials = Credentials::new(options.key_id, options.key_secret, None, None, "inkvault-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(options.region))
            // Exponential backoff: 1 initial + 3 retries.
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for MinIO and friends.
            .force_path_style(true);
        if let Some(endpoint_url) = options.endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: options.bucket,
            prefix,
            storage_class: options.storage_class.as_deref().map(StorageClass::from),
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    fn full_key(&self, path: &Path) -> Result<String> {
        full_key(self.prefix.as_deref(), path)
    }

    fn relative_path(&self, key: &str) -> Result<PathBuf> {
        relative_path(self.prefix.as_deref(), key)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::Backend("S3 rate limiter closed".to_string()))
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::Backend("S3 datetime out of range".to_string()))
    }

    fn network_error(err: impl std::error::Error) -> ErrorKind {
        ErrorKind::Network(DisplayErrorContext(err).to_string())
    }

    async fn list_page(&self, prefix: Option<&str>, token: Option<String>) -> Result<(Vec<FileInfo>, Option<String>)> {
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(token)
            .send()
            .await
            .map_err(Self::network_error)?;
        let mut files = Vec::with_capacity(output.contents().len());
        for object in output.contents() {
            let Some(key) = object.key() else { continue };
            // Directory markers created by some S3 consoles.
            if key.ends_with('/') {
                continue;
            }
            let modified = match object.last_modified() {
                Some(dt) => Self::parse_datetime(dt)?,
                None => OffsetDateTime::UNIX_EPOCH,
            };
            let size = object.size().unwrap_or_default().max(0) as u64;
            files.push(FileInfo::new(self.relative_path(key)?, size, modified));
        }
        let next = match output.is_truncated() {
            Some(true) => output.next_continuation_token().map(str::to_string),
            _ => None,
        };
        Ok((files, next))
    }
}

/// Joins a relative storage path onto an optional key prefix.
fn full_key(prefix: Option<&str>, path: &Path) -> Result<String> {
    let validated = validate_path(path)?;
    let path_str = validated.to_str().ok_or_raise(|| ErrorKind::InvalidPath(validated.clone()))?;
    Ok(match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path_str),
        None => path_str.to_string(),
    })
}

/// Strips the key prefix to get back a relative storage path.
fn relative_path(prefix: Option<&str>, key: &str) -> Result<PathBuf> {
    let relative = match prefix {
        Some(prefix) => key
            .strip_prefix(prefix.trim_end_matches('/'))
            .and_then(|s| s.strip_prefix('/'))
            .ok_or_raise(|| ErrorKind::Backend(format!("key `{key}` is outside prefix `{prefix}`")))?,
        None => key,
    };
    validate_path(relative)
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let key_prefix = match prefix.map(|p| self.full_key(p)).transpose() {
            Ok(Some(key)) => Some(key),
            Ok(None) => self.prefix.as_ref().map(|p| format!("{}/", p.trim_end_matches('/'))),
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };

        Box::pin(stream! {
            let mut token = None;
            loop {
                match self.list_page(key_prefix.as_deref(), token.take()).await {
                    Ok((files, next)) => {
                        for file in files {
                            yield Ok(file);
                        }
                        match next {
                            Some(next) => token = Some(next),
                            None => break,
                        }
                    },
                    Err(e) => {
                        yield Err(e);
                        break;
                    },
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => exn::bail!(Self::network_error(err)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(err) => exn::bail!(Self::network_error(err)),
        };
        let body = output.body.collect().await.map_err(Self::network_error)?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .set_storage_class(self.storage_class.clone())
            .send()
            .await
            .map_err(Self::network_error)?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        // S3 deletes are idempotent; check first to honour the NotFound contract.
        if !self.exists(path).await? {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(Self::network_error)?;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(err) => exn::bail!(Self::network_error(err)),
        };
        let modified = match output.last_modified() {
            Some(dt) => Self::parse_datetime(dt)?,
            None => OffsetDateTime::UNIX_EPOCH,
        };
        let size = output.content_length().unwrap_or_default().max(0) as u64;
        Ok(FileInfo::new(validate_path(path)?, size, modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{method, path_regex, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    #[case(None, "ab/abcdef.webp", "ab/abcdef.webp")]
    #[case(Some("images"), "ab/abcdef.webp", "images/ab/abcdef.webp")]
    #[case(Some("images/"), "ab/abcdef.webp", "images/ab/abcdef.webp")]
    #[case(Some("images"), "./ab//abcdef.webp", "images/ab/abcdef.webp")]
    fn test_full_key(#[case] prefix: Option<&str>, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(full_key(prefix, Path::new(path)).unwrap(), expected);
    }

    #[test]
    fn test_full_key_rejects_traversal() {
        assert!(full_key(Some("images"), Path::new("../secret")).is_err());
    }

    #[rstest]
    #[case(None, "ab/abcdef.webp", "ab/abcdef.webp")]
    #[case(Some("images"), "images/ab/abcdef.webp", "ab/abcdef.webp")]
    #[case(Some("images/"), "images/ab/abcdef.webp", "ab/abcdef.webp")]
    fn test_relative_path(#[case] prefix: Option<&str>, #[case] key: &str, #[case] expected: &str) {
        assert_eq!(relative_path(prefix, key).unwrap(), Path::new(expected));
    }

    #[test]
    fn test_relative_path_outside_prefix() {
        assert!(relative_path(Some("images"), "other/ab/abcdef.webp").is_err());
        assert!(relative_path(Some("images"), "imagesab/abcdef.webp").is_err());
    }

    #[test]
    fn test_new_requires_bucket() {
        let err = S3Backend::new("s3", S3Options::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Misconfigured(_)));
    }

    fn listing(keys: &[&str], next: Option<&str>) -> ResponseTemplate {
        let contents: String = keys
            .iter()
            .map(|key| {
                format!(
                    "<Contents><Key>{key}</Key><LastModified>2024-03-01T12:00:00.000Z</LastModified>\
                     <Size>4</Size><StorageClass>STANDARD</StorageClass></Contents>"
                )
            })
            .collect();
        let next = next.map(|token| format!("<NextContinuationToken>{token}</NextContinuationToken>"));
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>webtoons</Name><Prefix>images/</Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>\
             <IsTruncated>{}</IsTruncated>{}{contents}</ListBucketResult>",
            keys.len(),
            next.is_some(),
            next.unwrap_or_default(),
        );
        ResponseTemplate::new(200).set_body_raw(body, "application/xml")
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/webtoons/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "images/"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(listing(&["images/ab/ab01.webp", "images/ab/ab02.webp", "images/ab/"], Some("page-2")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/webtoons/?$"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(listing(&["images/cd/cd01.webp"], None))
            .expect(1)
            .mount(&server)
            .await;
        let backend = S3Backend::new("s3", S3Options {
            bucket: "webtoons".to_string(),
            prefix: Some("images".to_string()),
            region: "us-east-1".to_string(),
            endpoint: Some(server.uri()),
            key_id: "key".to_string(),
            key_secret: "secret".to_string(),
            storage_class: None,
        })
        .unwrap();

        let files = backend.list(None).await.unwrap();
        let paths: Vec<_> = files.iter().map(|file| file.path.clone()).collect();
        assert_eq!(paths, [
            PathBuf::from("ab/ab01.webp"),
            PathBuf::from("ab/ab02.webp"),
            PathBuf::from("cd/cd01.webp"),
        ]);
        assert!(files.iter().all(|file| file.size == 4));
    }
}

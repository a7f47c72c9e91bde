//! S3 store backend implementation

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::store::{
    config::StoreConfig,
    error::{StoreError, StoreResult},
    keys::validate_key,
    traits::ObjectStore,
    types::{ObjectMeta, PutOutcome, StoreHealth, StoredObject},
};

/// S3 store backend
pub struct S3Store {
    client: Arc<Client>,
    bucket: String,
    prefix: Option<String>,
}

impl S3Store {
    /// Create new S3 backend
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        info!("Initializing S3 store for bucket {}", config.bucket);

        let aws_config = if let Some(ref endpoint) = config.s3.endpoint {
            aws_config::from_env().endpoint_url(endpoint).load().await
        } else {
            aws_config::load_from_env().await
        };

        let client = Client::new(&aws_config);

        client
            .head_bucket()
            .bucket(&config.bucket)
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to access S3 bucket: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket.clone(),
            prefix: config
                .s3
                .prefix
                .as_ref()
                .map(|p| p.trim_end_matches('/').to_string()),
        })
    }

    /// Make an S3 key
    fn make_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn strip_key(&self, s3_key: &str) -> String {
        match &self.prefix {
            Some(prefix) => s3_key
                .strip_prefix(prefix.as_str())
                .and_then(|k| k.strip_prefix('/'))
                .unwrap_or(s3_key)
                .to_string(),
            None => s3_key.to_string(),
        }
    }

    fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
        err.raw_response().map(|response| response.status().as_u16())
    }

    fn map_sdk_error<E>(context: &str, err: SdkError<E, HttpResponse>) -> StoreError
    where
        E: std::error::Error + 'static,
    {
        match Self::status_of(&err) {
            Some(403) => return StoreError::permission_denied(format!("{}: access denied", context)),
            Some(429) | Some(503) => {
                return StoreError::Throttled(format!("{}: backend throttled", context))
            }
            _ => {}
        }
        match err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                StoreError::unavailable(format!("{}: {:?}", context, err))
            }
            other => StoreError::backend(format!(
                "{}: {}",
                context,
                aws_sdk_s3::error::DisplayErrorContext(other)
            )),
        }
    }

    fn to_chrono(value: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
        value
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()))
            .unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(key)?;
        debug!("Getting object {}", key);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.make_key(key))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if matches!(Self::status_of(&e), Some(404)) {
                    return Ok(None);
                }
                return Err(Self::map_sdk_error("get_object", e));
            }
        };

        let meta = ObjectMeta {
            key: key.to_string(),
            size: output.content_length().unwrap_or_default().max(0) as u64,
            last_modified: Self::to_chrono(output.last_modified()),
            version: output.e_tag().unwrap_or_default().to_string(),
            content_type: output.content_type().map(str::to_string),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::backend(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredObject {
            meta: ObjectMeta {
                size: body.len() as u64,
                ..meta
            },
            body,
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<ObjectMeta> {
        validate_key(key)?;
        debug!("Putting object {}", key);
        let size = body.len() as u64;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.make_key(key))
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("put_object", e))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified: Utc::now(),
            version: output.e_tag().unwrap_or_default().to_string(),
            content_type: content_type.map(str::to_string),
        })
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        validate_key(key)?;
        let size = body.len() as u64;

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.make_key(key))
            .if_none_match("*")
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(body))
            .send()
            .await;

        match result {
            Ok(output) => Ok(PutOutcome::Created(ObjectMeta {
                key: key.to_string(),
                size,
                last_modified: Utc::now(),
                version: output.e_tag().unwrap_or_default().to_string(),
                content_type: content_type.map(str::to_string),
            })),
            Err(e) if matches!(Self::status_of(&e), Some(412) | Some(409)) => {
                debug!("Object {} already exists", key);
                match self.head(key).await? {
                    Some(meta) => Ok(PutOutcome::Exists(meta)),
                    None => Err(StoreError::backend(format!(
                        "object {} vanished during conditional write",
                        key
                    ))),
                }
            }
            Err(e) => Err(Self::map_sdk_error("put_object", e)),
        }
    }

    async fn head(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        validate_key(key)?;

        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.make_key(key))
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: output.content_length().unwrap_or_default().max(0) as u64,
                last_modified: Self::to_chrono(output.last_modified()),
                version: output.e_tag().unwrap_or_default().to_string(),
                content_type: output.content_type().map(str::to_string),
            })),
            Err(e) if matches!(Self::status_of(&e), Some(404)) => Ok(None),
            Err(e) => Err(Self::map_sdk_error("head_object", e)),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut results = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(self.make_key(prefix))
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

            for object in output.contents() {
                let Some(s3_key) = object.key() else {
                    continue;
                };
                results.push(ObjectMeta {
                    key: self.strip_key(s3_key),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    last_modified: Self::to_chrono(object.last_modified()),
                    version: object.e_tag().unwrap_or_default().to_string(),
                    content_type: None,
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        let start = Instant::now();
        let mut errors = Vec::new();

        if let Err(e) = self.client.head_bucket().bucket(&self.bucket).send().await {
            errors.push(format!("head_bucket failed: {}", e));
        }

        Ok(StoreHealth {
            healthy: errors.is_empty(),
            backend_type: "s3".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
            errors,
        })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::backend::{Blob, BlobBackend, ChildEntry, EntryKind, WriteCondition};
use super::error::StorageError;
use super::paths::BlobPath;
use crate::core::config::Settings;

/// S3-compatible object storage; folders are key prefixes under the application root.
#[derive(Debug, Clone)]
pub(crate) struct S3Backend {
    client: Client,
    bucket: String,
    root: String,
}

impl S3Backend {
    pub(crate) async fn from_settings(settings: &Settings) -> Self {
        let s3 = settings.s3();
        let creds = Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "homework-store-static",
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(settings.store().request_timeout())
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(s3.region.clone()))
            .credentials_provider(creds)
            .timeout_config(timeouts);
        if !s3.endpoint.is_empty() {
            loader = loader.endpoint_url(s3.endpoint.clone());
        }
        let config = loader.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&config).force_path_style(true).build(),
        );

        Self { client, bucket: s3.bucket.clone(), root: settings.store().app_root.clone() }
    }

    fn key(&self, path: &BlobPath) -> String {
        path.qualified(&self.root)
    }

    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| sdk_error(prefix, err))?;

            keys.extend(output.contents().iter().filter_map(|object| object.key().map(str::to_string)));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl BlobBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn get(&self, path: &BlobPath) -> Result<Option<Blob>, StorageError> {
        let key = self.key(path);
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().map(|service| service.is_no_such_key()).unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(sdk_error(&key, err));
            }
        };

        let content_type = output.content_type().map(str::to_string);
        let etag = output.e_tag().map(str::to_string);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(Some(Blob { bytes, content_type, etag }))
    }

    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
        condition: WriteCondition,
    ) -> Result<(), StorageError> {
        let key = self.key(path);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes));
        request = match condition {
            WriteCondition::Overwrite => request,
            WriteCondition::IfMatch(etag) => request.if_match(etag),
            WriteCondition::IfAbsent => request.if_none_match("*"),
        };

        request.send().await.map_err(|err| sdk_error(&key, err))?;
        Ok(())
    }

    async fn delete(&self, path: &BlobPath) -> Result<(), StorageError> {
        let key = self.key(path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| sdk_error(&key, err))?;

        for nested in self.keys_under(&format!("{key}/")).await? {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&nested)
                .send()
                .await
                .map_err(|err| sdk_error(&nested, err))?;
        }
        Ok(())
    }

    async fn list_children(&self, folder: &BlobPath) -> Result<Vec<ChildEntry>, StorageError> {
        let prefix = format!("{}/", self.key(folder));
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| sdk_error(&prefix, err))?;

            for common in output.common_prefixes() {
                if let Some(name) = common
                    .prefix()
                    .and_then(|value| value.strip_prefix(prefix.as_str()))
                    .map(|value| value.trim_end_matches('/'))
                    .filter(|value| !value.is_empty())
                {
                    entries.push(ChildEntry { name: name.to_string(), kind: EntryKind::Folder });
                }
            }
            for object in output.contents() {
                if let Some(name) = object
                    .key()
                    .and_then(|value| value.strip_prefix(prefix.as_str()))
                    .filter(|value| !value.is_empty())
                {
                    entries.push(ChildEntry { name: name.to_string(), kind: EntryKind::File });
                }
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| sdk_error(&self.bucket, err))?;
        Ok(())
    }
}

fn sdk_error<E, R>(key: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(context) => {
            let service = context.err();
            let code = service.code().unwrap_or("unknown").to_string();
            let message = service.message().unwrap_or_default().to_string();
            match code.as_str() {
                "PreconditionFailed" | "ConditionalRequestConflict" => {
                    StorageError::Conflict { path: key.to_string() }
                }
                "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" => {
                    StorageError::Auth(format!("{code}: {message}"))
                }
                _ => StorageError::Backend { status: 0, message: format!("{code}: {message}") },
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::Transport(format!("{err:?}"))
        }
        other => StorageError::Backend { status: 0, message: format!("{other:?}") },
    }
}

//! An in-memory store that fails reads and writes of chosen keys.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use object_store::{
    memory::InMemory, path::Path, GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta,
    ObjectStore, PutMultipartOpts, PutOptions, PutPayload, PutResult, Result,
};

#[derive(Debug)]
pub struct FailingStore {
    inner: InMemory,
    fail_on: String,
}

impl FailingStore {
    /// Gets and puts of any key containing `fail_on` return an error.
    pub async fn with_objects(fail_on: &str, objects: &[(&str, String)]) -> Self {
        let inner = InMemory::new();
        for (key, body) in objects {
            inner
                .put(&Path::from(*key), PutPayload::from(body.clone()))
                .await
                .unwrap();
        }

        FailingStore {
            inner,
            fail_on: fail_on.to_string(),
        }
    }

    fn check(&self, location: &Path) -> Result<()> {
        if location.as_ref().contains(&self.fail_on) {
            return Err(object_store::Error::Generic {
                store: "FailingStore",
                source: format!("refusing `{}`", location).into(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for FailingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailingStore({})", self.fail_on)
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> Result<PutResult> {
        self.check(location)?;
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> Result<Box<dyn MultipartUpload>> {
        self.check(location)?;
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> Result<GetResult> {
        self.check(location)?;
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

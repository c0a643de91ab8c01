use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use object_store::{memory::InMemory, path::Path, Attribute};
use once_cell::sync::Lazy;
use variant_worker::pipeline::Pipeline;
use variant_worker_db::{
    images::ImageRecord,
    test::{original_image, MemoryImageStore},
};
use variant_worker_storage::{BlobStore, Error as StorageError, Operator, Result as StorageResult};

pub const PUBLIC_URL_BASE: &str = "https://img.example.com/uploads";

/// An in-memory blob store that can be told to fail or stall.
pub struct TestBlobStore {
    pub operator: Operator,
    writes: AtomicUsize,
    /// The 1-based write call that should fail.
    fail_write: Mutex<Option<usize>>,
    read_delay: Mutex<Option<Duration>>,
    deleted: Mutex<Vec<String>>,
}

impl TestBlobStore {
    pub fn new() -> Self {
        Self {
            operator: Operator::new(Box::new(InMemory::new()), PUBLIC_URL_BASE),
            writes: AtomicUsize::new(0),
            fail_write: Mutex::new(None),
            read_delay: Mutex::new(None),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_write_number(&self, n: usize) {
        *self.fail_write.lock().unwrap() = Some(n);
    }

    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Store an object without counting it as a pipeline write.
    pub async fn seed(&self, location: &str, bytes: Vec<u8>) {
        self.operator
            .write(location, Bytes::from(bytes), "application/octet-stream")
            .await
            .unwrap();
    }

    /// The content type that was stored alongside the object.
    pub async fn content_type(&self, location: &str) -> Option<String> {
        self.operator
            .operator
            .get(&Path::from(location))
            .await
            .unwrap()
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.as_ref().to_owned())
    }

    /// Every stored object path, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths = self
            .operator
            .operator
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for TestBlobStore {
    async fn read(&self, location: &str) -> StorageResult<Bytes> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.operator.read(location).await
    }

    async fn write(&self, location: &str, bytes: Bytes, content_type: &str) -> StorageResult<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_at = *self.fail_write.lock().unwrap();
        if fail_at == Some(n) {
            return Err(StorageError::Backend(eyre::eyre!("write {n} failed")));
        }

        self.operator.write(location, bytes, content_type).await
    }

    async fn delete(&self, location: &str) -> StorageResult<()> {
        self.deleted.lock().unwrap().push(location.to_string());
        self.operator.delete(location).await
    }

    fn public_url(&self, location: &str) -> String {
        self.operator.public_url(location)
    }
}

pub struct Harness {
    pub store: Arc<MemoryImageStore>,
    pub blobs: Arc<TestBlobStore>,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(io_timeout: Duration) -> Self {
        Lazy::force(&variant_worker_test::TRACING);

        let store = Arc::new(MemoryImageStore::new());
        let blobs = Arc::new(TestBlobStore::new());
        let pipeline = Arc::new(Pipeline::new(store.clone(), blobs.clone(), io_timeout));

        Self {
            store,
            blobs,
            pipeline,
        }
    }

    /// Store `bytes` at `storage_path` and add a pending original record pointing at it.
    pub async fn add_original(&self, storage_path: &str, bytes: Vec<u8>) -> ImageRecord {
        let image = original_image(storage_path);
        self.blobs.seed(storage_path, bytes).await;
        self.store.insert_image(image.clone());
        image
    }
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut output = Cursor::new(Vec::new());
    gradient(width, height).write_to(&mut output, format).unwrap();
    output.into_inner()
}

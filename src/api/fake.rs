//! Fake providers for tests.
//!
//! They answer without network access, remember what they were asked, and can
//! be told to fail so error paths are reachable.

use async_trait::async_trait;
use futures_util::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChatProvider, ImageJob, ImageProvider, ProviderImage, TextStream};
use crate::core::image::tests::PNG_BYTES;
use crate::core::{ChatMessage, ModelDescriptor, Provider, StudioError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutput {
    Bytes,
    Url,
    /// Bytes that are not an image
    Garbage,
}

pub struct FakeImageProvider {
    provider: Provider,
    output: FakeOutput,
    /// 1-based call number that returns an upstream error
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    jobs: Mutex<Vec<(String, ImageJob)>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeImageProvider {
    pub fn new() -> Self {
        Self {
            provider: Provider::Pollinations,
            output: FakeOutput::Bytes,
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn for_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_output(mut self, output: FakeOutput) -> Self {
        self.output = output;
        self
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (model id, job) per call, in call order
    pub fn jobs(&self) -> Vec<(String, ImageJob)> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        job: &ImageJob,
    ) -> Result<ProviderImage, StudioError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs
            .lock()
            .unwrap()
            .push((model.id.to_string(), job.clone()));

        if self.fail_on_call == Some(call) {
            return Err(StudioError::Upstream {
                provider: self.provider,
                status: 503,
                message: "model is loading".to_string(),
            });
        }

        Ok(match self.output {
            FakeOutput::Bytes => ProviderImage::Bytes(PNG_BYTES.to_vec()),
            FakeOutput::Url => ProviderImage::Url(format!("https://images.example/{}.png", call)),
            FakeOutput::Garbage => ProviderImage::Bytes(b"not an image".to_vec()),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StudioError> {
        self.fetches.lock().unwrap().push(url.to_string());
        Ok(PNG_BYTES.to_vec())
    }
}

pub struct FakeChatProvider {
    reply: String,
    fail: bool,
    /// Stream this many segments, then an upstream error
    fail_after: Option<usize>,
    requests: Mutex<Vec<(String, String, Vec<ChatMessage>)>>,
}

impl FakeChatProvider {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            fail_after: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_mid_stream(reply: &str, after: usize) -> Self {
        Self {
            fail_after: Some(after),
            ..Self::with_reply(reply)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_reply("")
        }
    }

    /// (model id, system prompt, messages) per call
    pub fn requests(&self) -> Vec<(String, String, Vec<ChatMessage>)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<(), StudioError> {
        self.requests.lock().unwrap().push((
            model.id.to_string(),
            system.to_string(),
            messages.to_vec(),
        ));
        if self.fail {
            return Err(StudioError::Upstream {
                provider: model.provider,
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatProvider for FakeChatProvider {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, StudioError> {
        self.record(model, system, messages)?;
        Ok(self.reply.clone())
    }

    async fn stream(
        &self,
        model: &ModelDescriptor,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, StudioError> {
        self.record(model, system, messages)?;
        let mut segments: Vec<Result<String, StudioError>> = self
            .reply
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        if let Some(after) = self.fail_after {
            segments.truncate(after);
            segments.push(Err(StudioError::Upstream {
                provider: model.provider,
                status: 502,
                message: "connection reset".to_string(),
            }));
        }
        Ok(Box::pin(stream::iter(segments)))
    }
}

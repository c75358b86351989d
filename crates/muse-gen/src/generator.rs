//! Single-item caption generation with retry and model fallback.
//!
//! Each attempt that fails transiently waits out the back-off and retries
//! one tier down the fallback ladder. The ladder position is local to the
//! request, so items in the same batch downgrade independently.

use crate::backend::{CaptionBackend, ContentRequest};
use crate::cancel::CancellationToken;
use crate::error::{GenerationError, Result};
use crate::prompt::{system_instruction, user_prompt};
use crate::repair::parse_captions;
use crate::retry::RetryPolicy;
use muse_core::{CanvasItem, CaptionStyle, GenerationResult, ItemId, ModelTier, Persona};
use std::time::{SystemTime, UNIX_EPOCH};

/// Everything needed to caption one item.
#[derive(Debug, Clone)]
pub struct CaptionJob {
    pub item: ItemId,
    pub mime_type: String,
    /// Base64 image bytes.
    pub image_data: String,
    pub style: CaptionStyle,
    pub persona: Persona,
    /// Requested tier; the result may come from a lower one.
    pub model: ModelTier,
}

impl CaptionJob {
    pub fn for_item(item: &CanvasItem, style: CaptionStyle, persona: &Persona, model: ModelTier) -> Self {
        Self {
            item: item.id,
            mime_type: item.image.mime_type.clone(),
            image_data: item.image.data.clone(),
            style,
            persona: persona.clone(),
            model,
        }
    }

    fn request(&self, model: ModelTier) -> ContentRequest {
        ContentRequest {
            model,
            system_instruction: system_instruction(self.style, &self.persona),
            user_prompt: user_prompt(self.style),
            mime_type: self.mime_type.clone(),
            image_data: self.image_data.clone(),
        }
    }
}

pub struct CaptionGenerator<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: CaptionBackend> CaptionGenerator<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    pub fn with_policy(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate captions for one item.
    ///
    /// Cancellation is checked before every send and after every response,
    /// and interrupts back-off sleeps.
    pub async fn generate(&self, job: &CaptionJob, token: &CancellationToken) -> Result<GenerationResult> {
        let mut tier = job.model;
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            let outcome = self.backend.generate_content(&job.request(tier)).await;
            if token.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            let prefix = format!("cap-{}-{}", now_millis(), job.item);
            let error = match outcome.and_then(|text| parse_captions(&text, &prefix)) {
                Ok(parsed) => {
                    if tier != job.model {
                        log::info!("{} captioned by fallback tier {tier}", job.item);
                    }
                    return Ok(GenerationResult {
                        captions: parsed.captions,
                        hashtags: parsed.hashtags,
                        timestamp: now_millis(),
                        model_used: tier,
                        style: Some(job.style),
                    });
                }
                Err(error) => error,
            };

            attempt += 1;
            if !error.is_retryable() || attempt >= self.policy.max_attempts {
                log::error!("{}: attempt {attempt} on {tier} failed: {error}", job.item);
                return Err(error);
            }

            let next = tier.fallback();
            let wait = self.policy.delay_for(attempt - 1);
            log::warn!(
                "{}: attempt {attempt} on {tier} failed ({error}), retrying on {next} in {wait:?}",
                job.item
            );
            tokio::select! {
                _ = token.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
            tier = next;
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

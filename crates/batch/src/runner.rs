//! Sequential batch generation.

use std::time::Duration;

use mcp::{Error, ToolResponse, extract};

use crate::ImageGenerator;

/// Pause between consecutive prompts when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Outcome for one prompt of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub prompt: String,
    pub image_id: Option<String>,
    pub image_url: Option<String>,
    /// The raw tool result, or the error that replaced it.
    pub outcome: Result<ToolResponse, Error>,
}

impl BatchItem {
    pub fn raw_result(&self) -> Option<&ToolResponse> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Success and failure counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let succeeded = items.iter().filter(|item| item.is_success()).count();
        Self {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} images generated ({} failed)",
            self.succeeded, self.total, self.failed
        )
    }
}

/// Runs prompts through an [`ImageGenerator`] one at a time.
///
/// Requests never overlap: the next prompt starts only after the previous
/// one finished and the configured delay elapsed. A failed prompt is
/// recorded in its [`BatchItem`] and the batch carries on.
#[derive(Debug, Clone)]
pub struct BatchRunner<G> {
    generator: G,
    delay: Duration,
}

impl<G: ImageGenerator> BatchRunner<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            delay: DEFAULT_DELAY,
        }
    }

    /// Pause between consecutive prompts. Zero disables pacing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generate an image for every prompt, in order.
    ///
    /// Always returns exactly one item per prompt, in input order.
    pub async fn run<I, S>(&self, prompts: I) -> Vec<BatchItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts: Vec<String> = prompts.into_iter().map(Into::into).collect();
        let total = prompts.len();
        let mut items = Vec::with_capacity(total);

        for (index, prompt) in prompts.into_iter().enumerate() {
            let position = index + 1;
            tracing::debug!(position, total, %prompt, "generating image");

            let item = match self.generator.generate_image(&prompt).await {
                Ok(result) => {
                    let extracted = extract::extract(&result);
                    tracing::info!(
                        position,
                        total,
                        image_id = extracted.image_id.as_deref().unwrap_or("-"),
                        "image generated"
                    );
                    BatchItem {
                        prompt,
                        image_id: extracted.image_id,
                        image_url: extracted.image_url,
                        outcome: Ok(result),
                    }
                }
                Err(e) => {
                    tracing::warn!(position, total, error = %e, "image generation failed");
                    BatchItem {
                        prompt,
                        image_id: None,
                        image_url: None,
                        outcome: Err(e),
                    }
                }
            };
            items.push(item);

            if position < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Generator that replays scripted outcomes and records when it was called.
    struct Scripted {
        outcomes: Mutex<VecDeque<mcp::Result<ToolResponse>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl Scripted {
        fn new(outcomes: impl IntoIterator<Item = mcp::Result<ToolResponse>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(prompt, _)| prompt.clone())
                .collect()
        }
    }

    impl ImageGenerator for Scripted {
        async fn generate_image(&self, prompt: &str) -> mcp::Result<ToolResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), Instant::now()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted call")
        }
    }

    fn generated(id: &str) -> mcp::Result<ToolResponse> {
        Ok(ToolResponse::new(json!({
            "content": [{"type": "text", "text": format!("Image ID: {id}. Image URL: http://host/{id}.png")}]
        })))
    }

    fn rejected(status: u16) -> mcp::Result<ToolResponse> {
        Err(Error::Protocol {
            status,
            body: "rejected".into(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn one_item_per_prompt_in_order() {
        let generator = Scripted::new([generated("a"), generated("b"), generated("c")]);
        let runner = BatchRunner::new(&generator);

        let items = runner.run(["p1", "p2", "p3"]).await;

        let prompts: Vec<_> = items.iter().map(|i| i.prompt.as_str()).collect();
        assert_eq!(prompts, ["p1", "p2", "p3"]);
        assert_eq!(generator.prompts(), ["p1", "p2", "p3"]);
        assert_eq!(items[1].image_id.as_deref(), Some("b"));
        assert_eq!(items[1].image_url.as_deref(), Some("http://host/b.png"));
        assert!(items.iter().all(|i| i.raw_result().is_some() && i.error().is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_abort_batch() {
        let generator = Scripted::new([generated("a"), rejected(503), generated("c")]);
        let items = BatchRunner::new(&generator).run(["p1", "p2", "p3"]).await;

        assert_eq!(items.len(), 3);
        assert!(items[0].raw_result().is_some());
        assert_eq!(items[1].error().and_then(Error::status), Some(503));
        assert!(items[1].raw_result().is_none());
        assert_eq!(items[1].image_id, None);
        assert_eq!(items[2].image_id.as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn every_prompt_failing() {
        let generator = Scripted::new([rejected(500), rejected(502)]);
        let items = BatchRunner::new(&generator).run(["x", "y"]).await;

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.error().is_some()));
        assert_eq!(generator.prompts(), ["x", "y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn result_without_markers_is_still_a_success() {
        let pending = Ok(ToolResponse::new(json!({
            "content": [{"type": "text", "text": "Generating your image..."}]
        })));
        let generator = Scripted::new([pending]);
        let items = BatchRunner::new(&generator).run(["p"]).await;

        assert!(items[0].is_success());
        assert_eq!(items[0].image_id, None);
        assert_eq!(items[0].image_url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_between_prompts_but_not_after_last() {
        let delay = Duration::from_secs(1);
        let generator = Scripted::new([generated("a"), rejected(500), generated("c")]);
        let runner = BatchRunner::new(&generator).with_delay(delay);

        let start = Instant::now();
        runner.run(["p1", "p2", "p3"]).await;
        let elapsed = start.elapsed();

        let calls = generator.calls.lock().unwrap();
        assert!(calls[1].1 - calls[0].1 >= delay);
        assert!(calls[2].1 - calls[1].1 >= delay);
        assert!(elapsed >= delay * 2);
        assert!(elapsed < delay * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_does_not_sleep() {
        let generator = Scripted::new([generated("a"), generated("b")]);
        let runner = BatchRunner::new(&generator).with_delay(Duration::ZERO);

        let start = Instant::now();
        runner.run(["p1", "p2"]).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn empty_batch() {
        let generator = Scripted::new([]);
        let items = BatchRunner::new(&generator).run(Vec::<String>::new()).await;
        assert!(items.is_empty());
    }

    #[test]
    fn summary_counts() {
        let items = vec![
            BatchItem {
                prompt: "a".into(),
                image_id: Some("1".into()),
                image_url: None,
                outcome: generated("1"),
            },
            BatchItem {
                prompt: "b".into(),
                image_id: None,
                image_url: None,
                outcome: rejected(500),
            },
        ];
        let summary = BatchSummary::from_items(&items);
        assert_eq!(
            summary,
            BatchSummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(summary.to_string(), "1/2 images generated (1 failed)");
    }
}

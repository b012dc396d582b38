//! Batch image generation over an MCP image service.
//!
//! A [`BatchRunner`] sends prompts to an [`ImageGenerator`] one at a time,
//! pausing between requests so the service never sees a burst. Failures
//! are captured per prompt; the batch always runs to the end.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use batch::{BatchRunner, BatchSummary};
//!
//! # async fn example() -> mcp::Result<()> {
//! let client = mcp::Client::new(mcp::DEFAULT_BASE_URL)?;
//! let runner = BatchRunner::new(client).with_delay(Duration::from_millis(500));
//!
//! let items = runner
//!     .run(["a serene mountain lake at sunset", "a cozy coffee shop interior"])
//!     .await;
//! for item in &items {
//!     match item.error() {
//!         None => println!("{}: {:?}", item.prompt, item.image_url),
//!         Some(e) => println!("{}: failed: {e}", item.prompt),
//!     }
//! }
//! println!("{}", BatchSummary::from_items(&items));
//! # Ok(())
//! # }
//! ```

mod generator;
mod runner;

pub use generator::ImageGenerator;
pub use runner::{BatchItem, BatchRunner, BatchSummary, DEFAULT_DELAY};

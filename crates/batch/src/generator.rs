//! Image generator trait.

use std::future::Future;

use mcp::{Client, ToolResponse};

/// Anything that can turn a prompt into a `generate-image` result.
///
/// This is the boundary between the batch loop and the network; the MCP
/// [`Client`] is the production implementation.
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt`.
    fn generate_image(&self, prompt: &str) -> impl Future<Output = mcp::Result<ToolResponse>> + Send;
}

impl ImageGenerator for Client {
    fn generate_image(&self, prompt: &str) -> impl Future<Output = mcp::Result<ToolResponse>> + Send {
        Client::generate_image(self, prompt)
    }
}

impl<G: ImageGenerator> ImageGenerator for &G {
    fn generate_image(&self, prompt: &str) -> impl Future<Output = mcp::Result<ToolResponse>> + Send {
        (**self).generate_image(prompt)
    }
}

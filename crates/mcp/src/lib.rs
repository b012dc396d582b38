//! MCP (Model Context Protocol) client for an image-generation service.
//!
//! The service speaks MCP over plain HTTP: tool requests are posted to
//! `/mcp/messages` and push events arrive on the `/mcp/sse` channel.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, extract};
//!
//! # async fn example() -> mcp::Result<()> {
//! let client = Client::new("http://localhost:3123")?;
//!
//! for tool in client.list_tools().await?.tools()? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = client.generate_image("a lighthouse in a storm").await?;
//! let extracted = extract::extract(&result);
//! if let Some(id) = &extracted.image_id {
//!     let status = client.get_image_status(id).await?;
//!     println!("{}", status.first_text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Events are pulled from an [`EventStream`]:
//!
//! ```no_run
//! # async fn example(client: mcp::Client) -> mcp::Result<()> {
//! use mcp::StreamItem;
//!
//! let mut events = client.events().await?;
//! while let Some(item) = events.next().await {
//!     match item {
//!         StreamItem::Event(event) => println!("{}", event.payload),
//!         StreamItem::Fault(e) => eprintln!("skipped frame: {e}"),
//!     }
//! }
//! println!("stream ended: {:?}", events.close_reason());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod extract;
mod protocol;
pub mod sse;
mod stream;

pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use extract::Extracted;
pub use protocol::{
    CallToolParams, GENERATE_IMAGE, GET_IMAGE_STATUS, Method, Tool, ToolRequest, ToolResponse,
};
pub use stream::{CloseReason, EventStream, State, StreamEvent, StreamHandle, StreamItem};

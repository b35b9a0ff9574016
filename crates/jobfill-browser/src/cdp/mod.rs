//! Chrome DevTools Protocol (CDP) client.
//!
//! Speaks CDP JSON-RPC over the browser WebSocket. Page sessions are
//! attached in flattened mode, so every command for a page carries its
//! `sessionId` and shares the one socket owned by [`CdpClient`].
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://127.0.0.1:9222").await?;
//! let page = client.new_page().await?;
//! page.navigate("https://jobs.example.com/apply").await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;

//! Console drivers
//!
//! A driver owns the connection to one console and turns host actions and
//! feedback queries into protocol traffic and state reads.

use anyhow::Result;
use async_trait::async_trait;

use crate::actions::Options;
use crate::host::ConnectionStatus;

/// Driver trait - all console integrations implement this
///
/// Note: All methods take &self (not &mut self) to support Arc<dyn Driver>.
/// Drivers should use interior mutability (RwLock, Mutex, etc.) for mutable state.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Get the driver name (e.g., "magicq")
    fn name(&self) -> &str;

    /// Initialize the driver (register variables, open sockets, etc.)
    async fn init(&self) -> Result<()>;

    /// Execute a catalog action with its options
    ///
    /// # Arguments
    /// * `action` - The action id (e.g., "pb", "executeToggle")
    /// * `options` - Option values as sent by the host
    async fn execute(&self, action: &str, options: &Options) -> crate::error::Result<()>;

    /// Evaluate a catalog feedback against current state
    async fn evaluate_feedback(&self, feedback: &str, options: &Options)
        -> crate::error::Result<bool>;

    /// Republish driver state to the host (called after config reload)
    async fn sync(&self) -> Result<()>;

    /// Shutdown the driver gracefully
    async fn shutdown(&self) -> Result<()>;

    /// Get current connection status
    ///
    /// Default implementation: always ok (for drivers without network connections)
    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::Ok
    }
}

pub mod magicq;

pub use magicq::MagicQDriver;

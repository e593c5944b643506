use std::path::Path;

use async_trait::async_trait;

/// Numeric id assigned per offered transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileTransferId(pub u32);

/// File transfer capability some backends expose. Same optional-capability
/// pattern as [`crate::ChatroomProvider`]: mutating operations on transfers
/// default to silent no-ops.
#[async_trait]
pub trait FileTransferProvider: Send + Sync {
    /// Offer a file to a contact; `None` if the backend cannot offer right
    /// now (e.g. disconnected).
    async fn offer(&self, contact_id: &str, path: &Path) -> Option<FileTransferId>;

    async fn accept(&self, _id: FileTransferId) {}

    async fn decline(&self, _id: FileTransferId) {}

    async fn cancel(&self, _id: FileTransferId) {}
}

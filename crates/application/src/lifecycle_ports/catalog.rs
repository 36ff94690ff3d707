use async_trait::async_trait;
use serde::Serialize;
use strata_core::AppResult;
use strata_domain::{CompressionCodec, ObjectRef, PartitionKey, PartitionSnapshot};

/// Catalog descriptor of one managed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    /// Object reference.
    pub object: ObjectRef,
    /// Whether the object is range partitioned.
    pub partitioned: bool,
}

/// Where a fine partition is folded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDestination {
    /// Absorb into an existing, adjacent coarse partition.
    Existing {
        /// Coarse partition name.
        name: String,
    },
    /// Rename the source into a new coarse partition.
    Rename {
        /// Coarse partition name.
        name: String,
    },
}

impl MergeDestination {
    /// Returns the destination partition name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Existing { name } | Self::Rename { name } => name.as_str(),
        }
    }
}

/// Managed-object catalog port.
///
/// Mutating operations return the partition state after the change.
#[async_trait]
pub trait PartitionCatalog: Send + Sync {
    /// Returns one object descriptor.
    async fn find_object(&self, object: &ObjectRef) -> AppResult<Option<ObjectDescriptor>>;

    /// Lists partitions of one object ordered by upper bound.
    async fn list_partitions(&self, object: &ObjectRef) -> AppResult<Vec<PartitionSnapshot>>;

    /// Returns whether a storage location exists.
    async fn location_exists(&self, location: &str) -> AppResult<bool>;

    /// Recompresses one partition in place.
    async fn recompress(
        &self,
        key: &PartitionKey,
        codec: CompressionCodec,
    ) -> AppResult<PartitionSnapshot>;

    /// Moves one partition to another location, optionally recompressing.
    async fn relocate(
        &self,
        key: &PartitionKey,
        location: &str,
        codec: Option<CompressionCodec>,
    ) -> AppResult<PartitionSnapshot>;

    /// Drops one partition.
    async fn drop_partition(&self, key: &PartitionKey) -> AppResult<()>;

    /// Removes all rows of one partition.
    async fn truncate_partition(&self, key: &PartitionKey) -> AppResult<PartitionSnapshot>;

    /// Folds one partition into its coarse destination and returns rows merged.
    async fn merge_partition(
        &self,
        source: &PartitionKey,
        destination: &MergeDestination,
    ) -> AppResult<i64>;
}

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use strata_core::{AppResult, NonEmptyString};

/// Fully qualified name of one managed partitioned object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    owner: NonEmptyString,
    name: NonEmptyString,
}

impl ObjectRef {
    /// Creates a validated object reference. Names are stored upper-cased.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            owner: NonEmptyString::new(owner.into().trim().to_ascii_uppercase())?,
            name: NonEmptyString::new(name.into().trim().to_ascii_uppercase())?,
        })
    }

    /// Returns the owning schema.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Returns the object name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the key of one partition of this object.
    pub fn partition(&self, partition_name: impl Into<String>) -> AppResult<PartitionKey> {
        Ok(PartitionKey {
            object: self.clone(),
            partition: NonEmptyString::new(partition_name.into().trim().to_ascii_uppercase())?,
        })
    }
}

impl Display for ObjectRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}.{}", self.owner, self.name)
    }
}

/// Natural key (owner, object, partition) of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    object: ObjectRef,
    partition: NonEmptyString,
}

impl PartitionKey {
    /// Creates a partition key from its three parts.
    pub fn new(
        owner: impl Into<String>,
        object: impl Into<String>,
        partition: impl Into<String>,
    ) -> AppResult<Self> {
        ObjectRef::new(owner, object)?.partition(partition)
    }

    /// Returns the owning object.
    #[must_use]
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Returns the partition name.
    #[must_use]
    pub fn partition(&self) -> &str {
        self.partition.as_str()
    }
}

impl Display for PartitionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.object, self.partition)
    }
}

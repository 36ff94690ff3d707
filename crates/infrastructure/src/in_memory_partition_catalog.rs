use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use strata_application::{MergeDestination, ObjectDescriptor, PartitionCatalog};
use strata_core::{AppError, AppResult};
use strata_domain::{CompressionCodec, ObjectRef, PartitionKey, PartitionSnapshot};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct CatalogObject {
    partitioned: bool,
    partitions: Vec<PartitionSnapshot>,
}

/// In-memory partition catalog that simulates storage transitions.
///
/// Recompression rescales segment sizes by the nominal codec ratios.
#[derive(Debug, Default)]
pub struct InMemoryPartitionCatalog {
    objects: RwLock<BTreeMap<ObjectRef, CatalogObject>>,
    locations: RwLock<BTreeSet<String>>,
}

impl InMemoryPartitionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one storage location.
    pub async fn register_location(&self, location: &str) {
        self.locations
            .write()
            .await
            .insert(location.trim().to_ascii_uppercase());
    }

    /// Registers or replaces one object and its partitions.
    pub async fn register_object(
        &self,
        object: ObjectRef,
        partitioned: bool,
        mut partitions: Vec<PartitionSnapshot>,
    ) -> AppResult<()> {
        let mut names = BTreeSet::new();
        for partition in &mut partitions {
            partition.name = partition.name.trim().to_ascii_uppercase();
            partition.location = partition.location.trim().to_ascii_uppercase();
            if !names.insert(partition.name.clone()) {
                return Err(AppError::Conflict(format!(
                    "partition '{}' is registered twice for '{object}'",
                    partition.name
                )));
            }
        }

        {
            let mut locations = self.locations.write().await;
            for partition in &partitions {
                locations.insert(partition.location.clone());
            }
        }

        sort_partitions(&mut partitions);
        self.objects.write().await.insert(
            object,
            CatalogObject {
                partitioned,
                partitions,
            },
        );
        Ok(())
    }

    async fn mutate(
        &self,
        key: &PartitionKey,
        change: impl FnOnce(&mut PartitionSnapshot),
    ) -> AppResult<PartitionSnapshot> {
        let mut objects = self.objects.write().await;
        let partition = objects
            .get_mut(key.object())
            .and_then(|object| {
                object
                    .partitions
                    .iter_mut()
                    .find(|partition| partition.name.eq_ignore_ascii_case(key.partition()))
            })
            .ok_or_else(|| AppError::NotFound(format!("partition '{key}' does not exist")))?;

        change(partition);
        Ok(partition.clone())
    }
}

#[async_trait]
impl PartitionCatalog for InMemoryPartitionCatalog {
    async fn find_object(&self, object: &ObjectRef) -> AppResult<Option<ObjectDescriptor>> {
        Ok(self
            .objects
            .read()
            .await
            .get(object)
            .map(|stored| ObjectDescriptor {
                object: object.clone(),
                partitioned: stored.partitioned,
            }))
    }

    async fn list_partitions(&self, object: &ObjectRef) -> AppResult<Vec<PartitionSnapshot>> {
        Ok(self
            .objects
            .read()
            .await
            .get(object)
            .map(|stored| stored.partitions.clone())
            .unwrap_or_default())
    }

    async fn location_exists(&self, location: &str) -> AppResult<bool> {
        Ok(self
            .locations
            .read()
            .await
            .contains(&location.trim().to_ascii_uppercase()))
    }

    async fn recompress(
        &self,
        key: &PartitionKey,
        codec: CompressionCodec,
    ) -> AppResult<PartitionSnapshot> {
        self.mutate(key, |partition| {
            partition.size_bytes = rescale(partition.size_bytes, partition.codec, codec);
            partition.codec = codec;
        })
        .await
    }

    async fn relocate(
        &self,
        key: &PartitionKey,
        location: &str,
        codec: Option<CompressionCodec>,
    ) -> AppResult<PartitionSnapshot> {
        let location = location.trim().to_ascii_uppercase();
        if !self.location_exists(&location).await? {
            return Err(AppError::NotFound(format!(
                "storage location '{location}' does not exist"
            )));
        }

        self.mutate(key, |partition| {
            partition.location = location;
            if let Some(codec) = codec {
                partition.size_bytes = rescale(partition.size_bytes, partition.codec, codec);
                partition.codec = codec;
            }
        })
        .await
    }

    async fn drop_partition(&self, key: &PartitionKey) -> AppResult<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(key.object())
            .ok_or_else(|| AppError::NotFound(format!("object '{}' does not exist", key.object())))?;
        let before = object.partitions.len();
        object
            .partitions
            .retain(|partition| !partition.name.eq_ignore_ascii_case(key.partition()));

        if object.partitions.len() == before {
            return Err(AppError::NotFound(format!("partition '{key}' does not exist")));
        }
        Ok(())
    }

    async fn truncate_partition(&self, key: &PartitionKey) -> AppResult<PartitionSnapshot> {
        self.mutate(key, |partition| {
            partition.row_count = 0;
            partition.size_bytes = 0;
        })
        .await
    }

    async fn merge_partition(
        &self,
        source: &PartitionKey,
        destination: &MergeDestination,
    ) -> AppResult<i64> {
        let mut objects = self.objects.write().await;
        let object = objects.get_mut(source.object()).ok_or_else(|| {
            AppError::NotFound(format!("object '{}' does not exist", source.object()))
        })?;
        let partitions = &mut object.partitions;
        let position = partitions
            .iter()
            .position(|partition| partition.name.eq_ignore_ascii_case(source.partition()))
            .ok_or_else(|| AppError::NotFound(format!("partition '{source}' does not exist")))?;
        let destination_name = destination.name().to_ascii_uppercase();

        let rows_merged = match destination {
            MergeDestination::Rename { .. } => {
                if partitions
                    .iter()
                    .any(|partition| partition.name == destination_name)
                {
                    return Err(AppError::Conflict(format!(
                        "partition '{destination_name}' already exists"
                    )));
                }
                let partition = &mut partitions[position];
                partition.name = destination_name;
                partition.row_count
            }
            MergeDestination::Existing { .. } => {
                let target_position = partitions
                    .iter()
                    .position(|partition| partition.name == destination_name)
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "partition '{destination_name}' does not exist"
                        ))
                    })?;
                let merged = partitions.remove(position);
                let target_position = if target_position > position {
                    target_position - 1
                } else {
                    target_position
                };
                let target = &mut partitions[target_position];
                target.lower_bound = match (target.lower_bound, merged.lower_bound) {
                    (Some(left), Some(right)) => Some(left.min(right)),
                    _ => None,
                };
                target.upper_bound = match (target.upper_bound, merged.upper_bound) {
                    (Some(left), Some(right)) => Some(left.max(right)),
                    _ => None,
                };
                target.row_count += merged.row_count;
                target.size_bytes += merged.size_bytes;
                merged.row_count
            }
        };

        sort_partitions(partitions);
        Ok(rows_merged)
    }
}

fn rescale(size_bytes: i64, from: CompressionCodec, to: CompressionCodec) -> i64 {
    let scaled = size_bytes as f64 * from.nominal_ratio() / to.nominal_ratio();
    scaled.round() as i64
}

fn sort_partitions(partitions: &mut [PartitionSnapshot]) {
    partitions.sort_by(|left, right| {
        (left.upper_bound.is_none(), left.upper_bound)
            .cmp(&(right.upper_bound.is_none(), right.upper_bound))
            .then_with(|| left.name.cmp(&right.name))
    });
}

#[cfg(test)]
mod tests;

use chrono::NaiveDate;
use strata_application::{MergeDestination, PartitionCatalog};
use strata_core::AppError;
use strata_domain::{CompressionCodec, ObjectRef, PartitionSnapshot};

use super::InMemoryPartitionCatalog;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn sales() -> ObjectRef {
    ObjectRef::new("dwh", "sales_fact").unwrap_or_else(|_| unreachable!())
}

fn partition(name: &str, lower: Option<NaiveDate>, upper: Option<NaiveDate>) -> PartitionSnapshot {
    PartitionSnapshot {
        name: name.to_owned(),
        lower_bound: lower,
        upper_bound: upper,
        location: "users".to_owned(),
        codec: CompressionCodec::None,
        row_count: 1_000,
        size_bytes: 100 * 1024 * 1024,
        heat: None,
    }
}

async fn catalog() -> InMemoryPartitionCatalog {
    let catalog = InMemoryPartitionCatalog::new();
    let registered = catalog
        .register_object(
            sales(),
            true,
            vec![
                partition("p_2023_04", Some(date(2023, 4, 1)), None),
                partition("p_2023", Some(date(2023, 1, 1)), Some(date(2023, 3, 1))),
                partition("p_2023_03", Some(date(2023, 3, 1)), Some(date(2023, 4, 1))),
            ],
        )
        .await;
    assert!(registered.is_ok());
    catalog.register_location("archive").await;
    catalog
}

#[tokio::test]
async fn partitions_are_normalized_and_sorted_by_upper_bound() {
    let catalog = catalog().await;

    let partitions = catalog.list_partitions(&sales()).await.unwrap_or_default();
    let names: Vec<&str> = partitions.iter().map(|partition| partition.name.as_str()).collect();
    assert_eq!(names, vec!["P_2023", "P_2023_03", "P_2023_04"]);
    assert_eq!(partitions[0].location, "USERS");
    assert!(catalog.location_exists("Users").await.unwrap_or_default());
}

#[tokio::test]
async fn recompression_scales_size_by_codec_ratio() {
    let catalog = catalog().await;
    let key = sales().partition("P_2023").unwrap_or_else(|_| unreachable!());

    let snapshot = catalog
        .recompress(&key, CompressionCodec::QueryHigh)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(snapshot.codec, CompressionCodec::QueryHigh);
    assert_eq!(snapshot.size_bytes, 10 * 1024 * 1024);
}

#[tokio::test]
async fn relocation_requires_a_known_location() {
    let catalog = catalog().await;
    let key = sales().partition("P_2023").unwrap_or_else(|_| unreachable!());

    let missing = catalog.relocate(&key, "nowhere", None).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let moved = catalog
        .relocate(&key, "archive", Some(CompressionCodec::ArchiveHigh))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(moved.location, "ARCHIVE");
    assert_eq!(moved.codec, CompressionCodec::ArchiveHigh);
}

#[tokio::test]
async fn merges_rename_or_absorb() {
    let catalog = catalog().await;
    let source = sales().partition("P_2023_03").unwrap_or_else(|_| unreachable!());

    let absorbed = catalog
        .merge_partition(
            &source,
            &MergeDestination::Existing {
                name: "P_2023".to_owned(),
            },
        )
        .await;
    assert_eq!(absorbed.ok(), Some(1_000));

    let partitions = catalog.list_partitions(&sales()).await.unwrap_or_default();
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].upper_bound, Some(date(2023, 4, 1)));
    assert_eq!(partitions[0].row_count, 2_000);

    let fine = sales().partition("P_2023_04").unwrap_or_else(|_| unreachable!());
    let collision = catalog
        .merge_partition(
            &fine,
            &MergeDestination::Rename {
                name: "P_2023".to_owned(),
            },
        )
        .await;
    assert!(matches!(collision, Err(AppError::Conflict(_))));

    let renamed = catalog
        .merge_partition(
            &fine,
            &MergeDestination::Rename {
                name: "P_2024".to_owned(),
            },
        )
        .await;
    assert!(renamed.is_ok());
    let names: Vec<String> = catalog
        .list_partitions(&sales())
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|partition| partition.name)
        .collect();
    assert_eq!(names, vec!["P_2023".to_owned(), "P_2024".to_owned()]);
}

#[tokio::test]
async fn dropping_an_unknown_partition_is_not_found() {
    let catalog = catalog().await;
    let key = sales().partition("P_1999").unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        catalog.drop_partition(&key).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn merging_into_a_missing_partition_keeps_the_source() {
    let catalog = catalog().await;
    let source = sales().partition("P_2023_03").unwrap_or_else(|_| unreachable!());

    let missing = catalog
        .merge_partition(
            &source,
            &MergeDestination::Existing {
                name: "P_2022".to_owned(),
            },
        )
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let partitions = catalog.list_partitions(&sales()).await.unwrap_or_default();
    assert_eq!(partitions.len(), 3);
    let kept = partitions
        .iter()
        .find(|partition| partition.name == "P_2023_03")
        .unwrap_or_else(|| unreachable!());
    assert_eq!(kept.row_count, 1_000);
    assert_eq!(kept.upper_bound, Some(date(2023, 4, 1)));
}

mod common;

use common::TestFixture;
use std::collections::BTreeMap;
use tiermark_lib::{ClassificationLevel, DataTypes, RecomputeMode};
use uuid::Uuid;

#[test]
fn test_summary_counts_schedules_by_level() {
    let mut fixture = TestFixture::new().unwrap();
    let org = Uuid::from_u128(1);
    fixture.custom_rule(org, "/data/pii/*", ClassificationLevel::Confidential, &["pii"]);
    fixture.add_schedule(org, &["/srv/www/index.html"], &[]);
    fixture.add_schedule(org, &["/data/pii/customers.csv"], &[]);
    fixture.add_schedule(org, &["/data/pii/leads.csv"], &[]);
    fixture.engine.recompute_org(org, RecomputeMode::PreserveOverride).unwrap();

    let summary = fixture.engine.summarize(org).unwrap();
    assert_eq!(
        summary.schedules_by_level,
        BTreeMap::from([(ClassificationLevel::Public, 1), (ClassificationLevel::Confidential, 2)])
    );
    assert_eq!(summary.total_backups, 0);

    insta::assert_snapshot!(serde_json::to_string_pretty(&summary).unwrap(), @r###"
    {
      "org_id": "00000000-0000-0000-0000-000000000001",
      "total_schedules": 3,
      "total_backups": 0,
      "schedules_by_level": {
        "public": 1,
        "confidential": 2
      },
      "backups_by_level": {},
      "schedules_by_data_type": {
        "pii": 2
      },
      "backups_by_data_type": {},
      "unavailable_backups": 0,
      "manual_overrides": 0
    }
    "###);
}

#[test]
fn test_summary_counts_backups_and_overrides() {
    let mut fixture = TestFixture::new().unwrap();
    let org = Uuid::new_v4();
    fixture.custom_rule(org, "**/*.pem", ClassificationLevel::Restricted, &["credentials"]);
    let keys = fixture.add_schedule(org, &["/etc/ssl/server.pem"], &[]);
    let web = fixture.add_schedule(org, &["/srv/www/index.html"], &[]);

    for _ in 0..2 {
        let backup = fixture.add_backup(&keys);
        fixture
            .engine
            .snapshot_backup_classification(backup.id, &keys, None)
            .unwrap();
    }
    // Recorded but never snapshotted.
    fixture.add_backup(&web);

    fixture
        .engine
        .set_manual_classification(web.id, ClassificationLevel::Internal, DataTypes::new())
        .unwrap();

    let summary = fixture.engine.summarize(org).unwrap();
    assert_eq!(summary.total_schedules, 2);
    assert_eq!(summary.total_backups, 3);
    assert_eq!(summary.backups_at(ClassificationLevel::Restricted), 2);
    assert_eq!(summary.backups_at(ClassificationLevel::Public), 1);
    assert_eq!(summary.backups_by_data_type.get("credentials"), Some(&2));
    assert_eq!(summary.schedules_at(ClassificationLevel::Internal), 1);
    assert_eq!(summary.manual_overrides, 1);
    assert_eq!(summary.unavailable_backups, 0);
}

#[test]
fn test_summary_for_unknown_org_is_empty() {
    let fixture = TestFixture::new().unwrap();
    let summary = fixture.engine.summarize(Uuid::new_v4()).unwrap();

    assert_eq!(summary.total_schedules, 0);
    assert_eq!(summary.total_backups, 0);
    assert!(summary.schedules_by_level.is_empty());
    assert!(summary.backups_by_level.is_empty());
}

//! Materializer idempotence, version races, lineage, and reopen behavior.

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use patfam_core::cliff::{Adjustment, CliffFact, CliffStatus};
use patfam_core::errors::{PatfamError, StoreError};
use patfam_core::family::{derive_family_id, Family};
use patfam_core::record::{LegalStatus, RawRecord, Source};
use patfam_merge::{merge, PrecedenceTable};
use patfam_store::StoreEngine;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn record(source: Source, publication: &str, title: &str) -> RawRecord {
    RawRecord {
        source,
        jurisdiction: publication[..2].to_string(),
        application_number: format!("{publication}-A"),
        publication_number: publication.to_string(),
        priority_numbers: ["P1".to_string()].into(),
        title: title.to_string(),
        inventors: vec!["Anna Berg".to_string()],
        filing_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        grant_date: None,
        legal_status: LegalStatus::Pending,
        family_hint_id: None,
        fetched_at: now(),
    }
}

fn family_of(members: &[RawRecord], version: u64) -> Family {
    let canonical = merge(members, &PrecedenceTable::default()).unwrap();
    Family {
        family_id: derive_family_id("P1"),
        member_keys: members.iter().map(|m| m.key()).collect(),
        hints: Default::default(),
        canonical,
        version,
        resolved_at: now(),
    }
}

#[test]
fn first_materialization_creates_version_one() {
    let store = StoreEngine::open_in_memory().unwrap();
    let members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let family = family_of(&members, 0);

    let result = store.materialize(&family, &members, now()).unwrap();
    assert!(result.changed);
    assert_eq!(result.version, 1);
    assert!(result.changed_fields.contains(&"title".to_string()));

    let lineage = store.lineage(&family.family_id).unwrap();
    assert_eq!(lineage.len(), 1);
    assert_eq!(lineage[0].version, 1);
}

#[test]
fn unchanged_canonical_is_a_noop() {
    let store = StoreEngine::open_in_memory().unwrap();
    let members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let mut family = family_of(&members, 0);

    let first = store.materialize(&family, &members, now()).unwrap();
    family.version = first.version;

    let second = store.materialize(&family, &members, now()).unwrap();
    assert!(!second.changed);
    assert_eq!(second.version, 1);
    assert!(second.changed_fields.is_empty());
    assert_eq!(store.lineage(&family.family_id).unwrap().len(), 1);
}

#[test]
fn changed_canonical_bumps_version_and_records_diff() {
    let store = StoreEngine::open_in_memory().unwrap();
    let members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let mut family = family_of(&members, 0);
    family.version = store.materialize(&family, &members, now()).unwrap().version;

    // A second member lengthens the title and adds a jurisdiction.
    let grown = vec![
        record(Source::NationalOffice, "US111", "Composition"),
        record(Source::IntlOffice, "WO222", "Composition of darolutamide"),
    ];
    let mut updated = family_of(&grown, family.version);
    updated.family_id = family.family_id.clone();

    let result = store.materialize(&updated, &grown, now()).unwrap();
    assert!(result.changed);
    assert_eq!(result.version, 2);
    assert!(result.changed_fields.contains(&"title".to_string()));
    assert!(result.changed_fields.contains(&"jurisdictions".to_string()));

    let lineage = store.lineage(&family.family_id).unwrap();
    assert_eq!(lineage.len(), 2);
    assert!(lineage.windows(2).all(|w| w[0].version < w[1].version));
}

#[test]
fn stale_version_is_rejected_as_a_race() {
    let store = StoreEngine::open_in_memory().unwrap();
    let members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let family = family_of(&members, 0);
    store.materialize(&family, &members, now()).unwrap();

    // Still claiming version 0 while the store holds version 1.
    let grown = vec![
        record(Source::NationalOffice, "US111", "Composition"),
        record(Source::IntlOffice, "WO222", "Composition of darolutamide"),
    ];
    let stale = family_of(&grown, 0);
    let err = store.materialize(&stale, &grown, now()).unwrap_err();
    match err {
        PatfamError::Store(e) => {
            assert!(e.is_race());
            match e {
                StoreError::VersionRace { expected, actual, .. } => {
                    assert_eq!(expected, 0);
                    assert_eq!(actual, 1);
                }
                other => panic!("unexpected store error: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
    // The losing transaction must not have touched the lineage.
    assert_eq!(store.lineage(&family.family_id).unwrap().len(), 1);
}

#[test]
fn absorb_moves_records_and_drops_the_family_row() {
    let store = StoreEngine::open_in_memory().unwrap();
    let survivor_members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let survivor = family_of(&survivor_members, 0);
    store.materialize(&survivor, &survivor_members, now()).unwrap();

    let mut absorbed_members = vec![record(Source::NationalOffice, "EP333", "Composition")];
    absorbed_members[0].priority_numbers = ["P2".to_string()].into();
    let mut absorbed = family_of(&absorbed_members, 0);
    absorbed.family_id = derive_family_id("P2");
    store.materialize(&absorbed, &absorbed_members, now()).unwrap();

    store.absorb_family(&survivor.family_id, &absorbed.family_id).unwrap();

    assert!(store.family(&absorbed.family_id).unwrap().is_none());
    let merged = store.family(&survivor.family_id).unwrap().unwrap();
    assert_eq!(merged.member_keys.len(), 2);
}

#[test]
fn priority_lookup_follows_family_merges() {
    let store = StoreEngine::open_in_memory().unwrap();
    let survivor_members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let survivor = family_of(&survivor_members, 0);
    store.materialize(&survivor, &survivor_members, now()).unwrap();
    assert_eq!(
        store.family_for_priority("P1").unwrap().as_deref(),
        Some(survivor.family_id.as_str())
    );

    let mut absorbed_members = vec![record(Source::NationalOffice, "EP333", "Composition")];
    absorbed_members[0].priority_numbers = ["P2".to_string()].into();
    let mut absorbed = family_of(&absorbed_members, 0);
    absorbed.family_id = derive_family_id("P2");
    store.materialize(&absorbed, &absorbed_members, now()).unwrap();

    store.absorb_family(&survivor.family_id, &absorbed.family_id).unwrap();

    // Both numbers now resolve to the survivor; nothing dangles.
    assert_eq!(
        store.family_for_priority("P2").unwrap().as_deref(),
        Some(survivor.family_id.as_str())
    );
    assert!(store.family_for_priority("P9").unwrap().is_none());
}

#[test]
fn families_survive_a_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("patfam.db");
    let members = vec![
        record(Source::NationalOffice, "US111", "Composition"),
        record(Source::IntlOffice, "WO222", "Composition of darolutamide"),
    ];
    let family = family_of(&members, 0);
    {
        let store = StoreEngine::open(&path).unwrap();
        store.materialize(&family, &members, now()).unwrap();
    }

    let store = StoreEngine::open(&path).unwrap();
    let loaded = store.load_families().unwrap();
    assert_eq!(loaded.len(), 1);
    let (reloaded, reloaded_members) = &loaded[0];
    assert_eq!(reloaded.family_id, family.family_id);
    assert_eq!(reloaded.version, 1);
    assert_eq!(reloaded.member_keys.len(), 2);
    assert_eq!(reloaded.canonical, family.canonical);
    assert_eq!(reloaded_members.len(), 2);
}

#[test]
fn cliff_facts_accumulate_as_history() {
    let store = StoreEngine::open_in_memory().unwrap();
    let fact = CliffFact {
        family_id: derive_family_id("P1"),
        base_term_end: NaiveDate::from_ymd_opt(2040, 1, 1).unwrap(),
        adjustments: vec![Adjustment {
            rule: "prosecution-delay-extension".to_string(),
            days: 120,
        }],
        effective_expiry: NaiveDate::from_ymd_opt(2040, 4, 30).unwrap(),
        status: CliffStatus::Active,
        as_of: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        computed_at: now(),
    };
    store.append_cliff_fact(&fact).unwrap();

    // A later recomputation appends, never overwrites.
    let mut later = fact.clone();
    later.as_of = NaiveDate::from_ymd_opt(2039, 6, 1).unwrap();
    later.status = CliffStatus::NearCliff;
    later.computed_at = now() + chrono::Duration::hours(1);
    store.append_cliff_fact(&later).unwrap();

    let latest = store.cliff_fact(&fact.family_id).unwrap().unwrap();
    assert_eq!(latest, later);
    assert_eq!(store.cliff_history(&fact.family_id).unwrap().len(), 2);

    // Status filtering sees only the latest fact per family.
    let near = store.cliff_facts_with_status(CliffStatus::NearCliff).unwrap();
    assert_eq!(near.len(), 1);
    assert!(store
        .cliff_facts_with_status(CliffStatus::Active)
        .unwrap()
        .is_empty());
}

#[test]
fn health_reports_row_counts() {
    let store = StoreEngine::open_in_memory().unwrap();
    let members = vec![record(Source::NationalOffice, "US111", "Composition")];
    let family = family_of(&members, 0);
    store.materialize(&family, &members, now()).unwrap();

    let health = store.health().unwrap();
    assert_eq!(health.families, 1);
    assert_eq!(health.records, 1);
    assert_eq!(health.lineage_entries, 1);
    assert_eq!(health.cliff_facts, 0);
}

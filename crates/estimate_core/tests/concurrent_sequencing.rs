use estimate_core::db::open_db;
use estimate_core::{
    Activity, Cents, CostComponents, EntryRequest, ReconciliationService, SowItem,
    SowItemRepository, SqliteReconciliationRepository, SqliteSowItemRepository,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: u32 = 8;

#[test]
fn concurrent_writers_get_distinct_contiguous_numbers() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("estimate.db");

    let parent = {
        let conn = open_db(&path).expect("file database should open");
        let repo = SqliteSowItemRepository::try_new(&conn)
            .expect("repository should accept a migrated connection");
        let item = SowItem::new(
            15,
            "Replace window",
            Activity::RemoveAndReplace,
            CostComponents {
                workers_wage: Some(Cents::from_dollars(200)),
                material: Some(Cents::from_dollars(400)),
                ..CostComponents::default()
            },
        );
        repo.create_sow_item(&item).expect("sow item should be stored")
    };

    let barrier = Arc::new(Barrier::new(WRITERS as usize));
    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = open_db(&path).expect("file database should open");
                let repo = SqliteReconciliationRepository::try_new(&mut conn)
                    .expect("repository should accept a migrated connection");
                let mut service = ReconciliationService::new(repo);
                barrier.wait();
                service
                    .create_change_order(&EntryRequest::for_activity(parent, Activity::Replace))
                    .expect("change order should be created")
            })
        })
        .collect();

    let lines: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("writer thread should not panic"))
        .collect();

    let sequences: BTreeSet<u32> = lines
        .iter()
        .filter_map(|line| line.entry.co_sequence_no)
        .collect();
    assert_eq!(sequences, (1..=WRITERS).collect::<BTreeSet<_>>());

    let codes: BTreeSet<String> = lines.into_iter().map(|line| line.display_code).collect();
    assert_eq!(codes.len(), WRITERS as usize);
    assert!(codes.iter().all(|code| code.starts_with("15-CO")));
}

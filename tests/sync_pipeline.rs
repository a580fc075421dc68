//! End-to-end sync pipeline properties, exercised against the in-memory
//! store: idempotence, full-replace conflict resolution, referential
//! filtering, timestamp-refresh scoping, term-scoped pruning, and chunk-count
//! invariance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use registrar::catalog::models::{Course, Section};
use registrar::dump::{RawCourse, RawProfessor, RawSection, TermDump};
use registrar::store::{CatalogStore, MemoryStore};
use registrar::sync::{NoopReindex, Orchestrator, ReindexSignal, SyncOptions};

fn raw_course(term: &str, subject: &str, class_id: &str, name: &str) -> RawCourse {
    RawCourse {
        host: Some("neu.edu".to_owned()),
        term_id: Some(term.to_owned()),
        subject: Some(subject.to_owned()),
        class_id: Some(class_id.to_owned()),
        name: Some(name.to_owned()),
        min_credits: Some(4.0),
        max_credits: Some(4.0),
        ..Default::default()
    }
}

fn raw_section(term: &str, subject: &str, class_id: &str, crn: &str) -> RawSection {
    RawSection {
        host: Some("neu.edu".to_owned()),
        term_id: Some(term.to_owned()),
        subject: Some(subject.to_owned()),
        class_id: Some(class_id.to_owned()),
        crn: Some(crn.to_owned()),
        seats_capacity: Some(100),
        seats_remaining: Some(10),
        profs: vec!["Amit Shesh".to_owned()],
        ..Default::default()
    }
}

fn dump(classes: Vec<RawCourse>, sections: Vec<RawSection>, subjects: &[(&str, &str)]) -> TermDump {
    TermDump {
        classes: classes
            .into_iter()
            .enumerate()
            .map(|(i, c)| (format!("scraper-{i}"), c))
            .collect(),
        sections,
        subjects: subjects
            .iter()
            .map(|(abbr, desc)| ((*abbr).to_owned(), (*desc).to_owned()))
            .collect(),
    }
}

fn orchestrator(store: Arc<MemoryStore>, options: SyncOptions) -> Orchestrator {
    Orchestrator::new(store, Arc::new(NoopReindex), options)
}

/// A course row as it would exist from an earlier run, with a chosen
/// timestamp.
fn seeded_course(term: &str, subject: &str, class_id: &str, ts: DateTime<Utc>) -> Course {
    Course {
        id: format!("neu.edu/{term}/{subject}/{class_id}"),
        host: "neu.edu".to_owned(),
        term_id: term.to_owned(),
        subject: subject.to_owned(),
        class_id: class_id.to_owned(),
        name: format!("{subject} {class_id}"),
        description: None,
        min_credits: 4,
        max_credits: 4,
        class_attributes: Vec::new(),
        nupath: Vec::new(),
        prereqs: None,
        coreqs: None,
        prereqs_for: None,
        opt_prereqs_for: None,
        fee_amount: None,
        fee_description: None,
        last_update_time: ts,
    }
}

fn scrub_course(mut c: Course) -> Course {
    c.last_update_time = DateTime::<Utc>::MIN_UTC;
    c
}

fn scrub_section(mut s: Section) -> Section {
    s.last_update_time = DateTime::<Utc>::MIN_UTC;
    s
}

#[tokio::test]
async fn upserting_the_same_dump_twice_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let sync = orchestrator(store.clone(), SyncOptions::default());

    let d = dump(
        vec![
            raw_course("202030", "CS", "2500", "Fundamentals of CS 1"),
            raw_course("202030", "CS", "3500", "Object-Oriented Design"),
        ],
        vec![raw_section("202030", "CS", "3500", "12345")],
        &[("CS", "Computer Science")],
    );

    sync.run(&d, &[]).await.expect("first run should succeed");
    let first: Vec<Course> = store.courses().await.into_iter().map(scrub_course).collect();
    let first_sections: Vec<Section> = store
        .sections()
        .await
        .into_iter()
        .map(scrub_section)
        .collect();

    sync.run(&d, &[]).await.expect("second run should succeed");
    let second: Vec<Course> = store.courses().await.into_iter().map(scrub_course).collect();
    let second_sections: Vec<Section> = store
        .sections()
        .await
        .into_iter()
        .map(scrub_section)
        .collect();

    assert_eq!(first, second, "course rows should not drift on rerun");
    assert_eq!(first_sections, second_sections);
    assert_eq!(store.subjects().await.len(), 1);
}

#[tokio::test]
async fn conflict_resolution_is_full_replace() {
    let store = Arc::new(MemoryStore::new());
    let sync = orchestrator(store.clone(), SyncOptions::default());

    let mut original = raw_course("202030", "CS", "3500", "Tech & Human Values");
    original.desc = Some("An older catalog description.".to_owned());
    sync.run(&dump(vec![original], vec![], &[]), &[])
        .await
        .unwrap();

    // Same identity, new name, and no description this time: the omitted
    // field must be overwritten too, not retained.
    let renamed = raw_course("202030", "CS", "3500", "Object-Oriented Design");
    sync.run(&dump(vec![renamed], vec![], &[]), &[])
        .await
        .unwrap();

    let courses = store.courses().await;
    assert_eq!(courses.len(), 1, "same identity must collide to one row");
    assert_eq!(courses[0].id, "neu.edu/202030/CS/3500");
    assert_eq!(courses[0].name, "Object-Oriented Design");
    assert_eq!(courses[0].description, None);
}

#[tokio::test]
async fn sections_referencing_unknown_courses_are_filtered() {
    let store = Arc::new(MemoryStore::new());
    let sync = orchestrator(store.clone(), SyncOptions::default());

    let d = dump(
        vec![
            raw_course("202030", "CS", "2500", "Fundamentals of CS 1"),
            raw_course("202030", "CS", "3500", "Object-Oriented Design"),
        ],
        vec![
            raw_section("202030", "CS", "2500", "111"),
            raw_section("202030", "CS", "3500", "222"),
            raw_section("202030", "CS", "9999", "333"),
        ],
        &[],
    );

    let stats = sync.run(&d, &[]).await.unwrap();
    assert_eq!(stats.sections_received, 3);
    assert_eq!(stats.sections_filtered, 1);
    assert_eq!(stats.sections_upserted, 2);

    let sections = store.sections().await;
    assert_eq!(sections.len(), 2);
    assert!(
        sections
            .iter()
            .all(|s| s.class_hash != "neu.edu/202030/CS/9999"),
        "the orphan section must not be stored"
    );
}

#[tokio::test]
async fn timestamp_refresh_touches_only_courses_with_sections() {
    let store = Arc::new(MemoryStore::new());
    let old = Utc::now() - Duration::days(10);
    store
        .upsert_courses(&[
            seeded_course("202030", "CS", "2500", old),
            seeded_course("202030", "CS", "2510", old),
            seeded_course("202030", "CS", "3500", old),
        ])
        .await
        .unwrap();

    let sync = orchestrator(store.clone(), SyncOptions::default());
    let d = dump(
        vec![
            raw_course("202030", "CS", "2500", "Fundamentals of CS 1"),
            raw_course("202030", "CS", "2510", "Fundamentals of CS 2"),
            raw_course("202030", "CS", "3500", "Object-Oriented Design"),
        ],
        vec![
            raw_section("202030", "CS", "2500", "111"),
            raw_section("202030", "CS", "3500", "222"),
        ],
        &[],
    );

    let stats = sync.run(&d, &[]).await.unwrap();
    assert_eq!(stats.courses_stamped, 2);

    let stamped_1 = store.course("neu.edu/202030/CS/2500").await.unwrap();
    let untouched = store.course("neu.edu/202030/CS/2510").await.unwrap();
    let stamped_2 = store.course("neu.edu/202030/CS/3500").await.unwrap();

    assert!(stamped_1.last_update_time > old);
    assert!(stamped_2.last_update_time > old);
    assert_eq!(
        untouched.last_update_time, old,
        "re-upserting a course without sections must not refresh its timestamp"
    );
}

#[tokio::test]
async fn pruning_is_scoped_to_covered_terms() {
    let store = Arc::new(MemoryStore::new());
    let old = Utc::now() - Duration::days(10);
    store
        .upsert_courses(&[
            seeded_course("202030", "CS", "1111", old),
            seeded_course("202130", "CS", "2222", old),
        ])
        .await
        .unwrap();

    let sync = orchestrator(
        store.clone(),
        SyncOptions {
            prune: true,
            ..Default::default()
        },
    );
    // The dump covers only 202030.
    let d = dump(
        vec![raw_course("202030", "CS", "3500", "Object-Oriented Design")],
        vec![],
        &[],
    );

    let stats = sync.run(&d, &[]).await.unwrap();
    assert_eq!(stats.courses_pruned, 1);

    assert!(
        store.course("neu.edu/202030/CS/1111").await.is_none(),
        "stale course in a covered term should be pruned"
    );
    assert!(
        store.course("neu.edu/202130/CS/2222").await.is_some(),
        "a sync for 202030 must never delete 202130 courses"
    );
    assert!(
        store.course("neu.edu/202030/CS/3500").await.is_some(),
        "the freshly inserted course is within the retention window"
    );
}

#[tokio::test]
async fn pruning_cascades_to_the_courses_sections() {
    let store = Arc::new(MemoryStore::new());
    let old = Utc::now() - Duration::days(10);
    let stale = seeded_course("202030", "CS", "1111", old);
    store.upsert_courses(&[stale.clone()]).await.unwrap();
    store
        .upsert_sections(&[Section {
            id: format!("{}/999", stale.id),
            class_hash: stale.id.clone(),
            crn: "999".to_owned(),
            class_type: None,
            seats_capacity: None,
            seats_remaining: None,
            wait_capacity: None,
            wait_remaining: None,
            campus: None,
            honors: false,
            meetings: None,
            profs: Vec::new(),
            url: None,
            last_update_time: old,
        }])
        .await
        .unwrap();

    let sync = orchestrator(
        store.clone(),
        SyncOptions {
            prune: true,
            ..Default::default()
        },
    );
    let d = dump(
        vec![raw_course("202030", "CS", "3500", "Object-Oriented Design")],
        vec![],
        &[],
    );
    sync.run(&d, &[]).await.unwrap();

    assert!(store.course(&stale.id).await.is_none());
    assert!(
        store.sections().await.is_empty(),
        "sections must not outlive their pruned course"
    );
}

#[tokio::test]
async fn chunk_count_does_not_affect_the_final_row_set() {
    let classes: Vec<RawCourse> = (0..5)
        .map(|i| raw_course("202030", "CS", &format!("10{i}"), &format!("Course {i}")))
        .collect();
    let sections: Vec<RawSection> = (0..5)
        .map(|i| raw_section("202030", "CS", &format!("10{i}"), &format!("{i}")))
        .collect();

    let small_chunks = Arc::new(MemoryStore::new());
    orchestrator(
        small_chunks.clone(),
        SyncOptions {
            chunk_size: 2,
            ..Default::default()
        },
    )
    .run(&dump(classes.clone(), sections.clone(), &[]), &[])
    .await
    .unwrap();

    let one_chunk = Arc::new(MemoryStore::new());
    orchestrator(one_chunk.clone(), SyncOptions::default())
        .run(&dump(classes, sections, &[]), &[])
        .await
        .unwrap();

    let a: Vec<Course> = small_chunks
        .courses()
        .await
        .into_iter()
        .map(scrub_course)
        .collect();
    let b: Vec<Course> = one_chunk
        .courses()
        .await
        .into_iter()
        .map(scrub_course)
        .collect();
    assert_eq!(a, b);

    let a: Vec<Section> = small_chunks
        .sections()
        .await
        .into_iter()
        .map(scrub_section)
        .collect();
    let b: Vec<Section> = one_chunk
        .sections()
        .await
        .into_iter()
        .map(scrub_section)
        .collect();
    assert_eq!(a, b);
}

#[tokio::test]
async fn malformed_records_are_dropped_and_the_run_continues() {
    let store = Arc::new(MemoryStore::new());
    let sync = orchestrator(store.clone(), SyncOptions::default());

    let mut bad_course = raw_course("202030", "CS", "2500", "Fundamentals of CS 1");
    bad_course.subject = None;
    let mut bad_section = raw_section("202030", "CS", "3500", "1");
    bad_section.crn = None;
    let bad_professor = RawProfessor {
        name: Some("No Id".to_owned()),
        ..Default::default()
    };
    let good_professor = RawProfessor {
        id: Some("abc123".to_owned()),
        name: Some("Amit Shesh".to_owned()),
        ..Default::default()
    };

    let d = dump(
        vec![
            bad_course,
            raw_course("202030", "CS", "3500", "Object-Oriented Design"),
        ],
        vec![bad_section, raw_section("202030", "CS", "3500", "2")],
        &[],
    );

    let stats = sync
        .run(&d, &[bad_professor, good_professor])
        .await
        .expect("data errors must not fail the run");

    assert_eq!(stats.courses_invalid, 1);
    assert_eq!(stats.courses_upserted, 1);
    assert_eq!(stats.sections_invalid, 1);
    assert_eq!(stats.sections_upserted, 1);
    assert_eq!(stats.professors_invalid, 1);
    assert_eq!(stats.professors_upserted, 1);
    assert_eq!(store.professors().await.len(), 1);
}

struct CountingReindex(AtomicUsize);

#[async_trait::async_trait]
impl ReindexSignal for CountingReindex {
    async fn rebuild_index(&self) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn end_to_end_dump_scenario() {
    let store = Arc::new(MemoryStore::new());
    let reindex = Arc::new(CountingReindex(AtomicUsize::new(0)));
    let sync = Orchestrator::new(store.clone(), reindex.clone(), SyncOptions::default());

    let d = dump(
        vec![
            raw_course("202030", "CS", "2500", "Fundamentals of CS 1"),
            raw_course("202030", "CS", "2510", "Fundamentals of CS 2"),
            raw_course("202030", "CS", "3500", "Object-Oriented Design"),
        ],
        vec![
            raw_section("202030", "CS", "3500", "111"),
            raw_section("202030", "CS", "3500", "222"),
            raw_section("202030", "CS", "3500", "333"),
        ],
        &[
            ("CS", "Computer Science"),
            ("CHEM", "Chemistry"),
            ("PHYS", "Physics"),
        ],
    );

    let stats = sync.run(&d, &[]).await.unwrap();
    assert_eq!(store.courses().await.len(), 3);
    assert_eq!(store.sections().await.len(), 3);
    assert_eq!(store.subjects().await.len(), 3);
    assert!(
        store
            .sections()
            .await
            .iter()
            .all(|s| s.class_hash == "neu.edu/202030/CS/3500")
    );
    assert_eq!(stats.courses_stamped, 1, "only CS3500 has sections");
    assert_eq!(reindex.0.load(Ordering::SeqCst), 1);

    // Rerunning the identical dump changes nothing but signals reindex again.
    let before: Vec<Course> = store.courses().await.into_iter().map(scrub_course).collect();
    sync.run(&d, &[]).await.unwrap();
    let after: Vec<Course> = store.courses().await.into_iter().map(scrub_course).collect();

    assert_eq!(before, after);
    assert_eq!(store.sections().await.len(), 3);
    assert_eq!(store.subjects().await.len(), 3);
    assert_eq!(reindex.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn professor_upsert_replaces_mutable_fields() {
    let store = Arc::new(MemoryStore::new());
    let sync = orchestrator(store.clone(), SyncOptions::default());
    let empty = dump(vec![], vec![], &[]);

    let first = RawProfessor {
        id: Some("abc123".to_owned()),
        name: Some("Amit Shesh".to_owned()),
        emails: vec!["a.shesh@northeastern.edu".to_owned()],
        primary_department: Some("Khoury".to_owned()),
        ..Default::default()
    };
    sync.run(&empty, &[first]).await.unwrap();

    let updated = RawProfessor {
        id: Some("abc123".to_owned()),
        name: Some("Amit Shesh".to_owned()),
        emails: vec!["shesh@northeastern.edu".to_owned()],
        ..Default::default()
    };
    sync.run(&empty, &[updated]).await.unwrap();

    let profs = store.professors().await;
    assert_eq!(profs.len(), 1);
    assert_eq!(profs[0].emails, vec!["shesh@northeastern.edu".to_owned()]);
    assert_eq!(
        profs[0].primary_department, None,
        "an omitted field is overwritten, not retained"
    );
}

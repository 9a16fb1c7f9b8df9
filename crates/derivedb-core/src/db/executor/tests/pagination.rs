use crate::{
    db::{
        executor::tests::{db, db_with_memory, seed_members},
        query::{Direction, MethodSpec, PageRequest, ReturnShape, Sort},
        repository::Repository,
    },
    test_fixtures::Member,
    value::Value,
};

fn page_request(page: u64) -> PageRequest {
    PageRequest::of(page, 3, Sort::by("username", Direction::Desc)).expect("valid request")
}

fn paged_repo(db: &crate::db::Db) -> Repository<Member> {
    Repository::builder()
        .method(MethodSpec::new("find_page_by_age", ReturnShape::Page).params(&["age"]))
        .method(MethodSpec::new("find_slice_by_age", ReturnShape::Slice).params(&["age"]))
        .method(MethodSpec::new("find_list_by_age", ReturnShape::Many).params(&["age"]))
        .build(db)
        .expect("repository wires")
}

fn five_members(db: &crate::db::Db) {
    seed_members(
        db,
        &[
            ("member1", 10),
            ("member2", 10),
            ("member3", 10),
            ("member4", 10),
            ("member5", 10),
        ],
    );
}

fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.username.as_str()).collect()
}

#[test]
fn counted_page_carries_totals_and_flags() {
    let db = db();
    five_members(&db);
    let repo = paged_repo(&db);
    let mut session = db.session();

    let page = repo
        .call(
            &mut session,
            "find_page_by_age",
            &[Value::Uint(10)],
            Some(&page_request(0)),
        )
        .expect("call")
        .into_page()
        .expect("page shape");

    assert_eq!(usernames(page.content()), vec!["member5", "member4", "member3"]);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.number(), 0);
    assert!(page.is_first());
    assert!(page.has_next());
    session.rollback();
}

#[test]
fn final_page_is_partial_and_terminal() {
    let db = db();
    five_members(&db);
    let repo = paged_repo(&db);
    let mut session = db.session();

    let page = repo
        .call(
            &mut session,
            "find_page_by_age",
            &[Value::Uint(10)],
            Some(&page_request(1)),
        )
        .expect("call")
        .into_page()
        .expect("page shape");

    assert_eq!(usernames(page.content()), vec!["member2", "member1"]);
    assert_eq!(page.number(), 1);
    assert!(!page.is_first());
    assert!(!page.has_next());
    session.rollback();
}

#[test]
fn slice_overfetches_instead_of_counting() {
    let (db, _store, _metrics) = db_with_memory();
    five_members(&db);
    let repo = paged_repo(&db);
    let mut session = db.session();
    db.reset_metrics();

    let slice = repo
        .call(
            &mut session,
            "find_slice_by_age",
            &[Value::Uint(10)],
            Some(&page_request(0)),
        )
        .expect("call")
        .into_slice()
        .expect("slice shape");

    assert_eq!(usernames(slice.content()), vec!["member5", "member4", "member3"]);
    assert!(slice.has_next());
    assert_eq!(db.metrics().count_queries, 0);

    let last = repo
        .call(
            &mut session,
            "find_slice_by_age",
            &[Value::Uint(10)],
            Some(&page_request(1)),
        )
        .expect("call")
        .into_slice()
        .expect("slice shape");

    assert_eq!(last.content().len(), 2);
    assert!(!last.has_next());
    assert_eq!(db.metrics().count_queries, 0);
    session.rollback();
}

#[test]
fn exactly_full_slice_is_terminal() {
    let (db, _store, _metrics) = db_with_memory();
    seed_members(&db, &[("member1", 10), ("member2", 10), ("member3", 10)]);
    let repo = paged_repo(&db);
    let mut session = db.session();
    db.reset_metrics();

    let slice = repo
        .call(
            &mut session,
            "find_slice_by_age",
            &[Value::Uint(10)],
            Some(&page_request(0)),
        )
        .expect("call")
        .into_slice()
        .expect("slice shape");

    assert_eq!(slice.content().len(), 3);
    assert!(!slice.has_next());
    assert_eq!(db.metrics().count_queries, 0);
    session.rollback();
}

#[test]
fn list_windows_without_counting() {
    let (db, _store, _metrics) = db_with_memory();
    five_members(&db);
    let repo = paged_repo(&db);
    let mut session = db.session();
    db.reset_metrics();

    let listed = repo
        .call(
            &mut session,
            "find_list_by_age",
            &[Value::Uint(10)],
            Some(&page_request(0)),
        )
        .expect("call")
        .into_many()
        .expect("many shape");

    assert_eq!(usernames(&listed), vec!["member5", "member4", "member3"]);
    assert_eq!(db.metrics().count_queries, 0);

    let unwindowed = repo
        .call(&mut session, "find_list_by_age", &[Value::Uint(10)], None)
        .expect("call")
        .into_many()
        .expect("many shape");
    assert_eq!(unwindowed.len(), 5);
    session.rollback();
}

#[test]
fn paged_shapes_require_a_page_request() {
    let db = db();
    five_members(&db);
    let repo = paged_repo(&db);
    let mut session = db.session();

    let err = repo
        .call(&mut session, "find_page_by_age", &[Value::Uint(10)], None)
        .expect_err("page without request");
    assert!(err.to_string().contains("page request"));
    session.rollback();
}

#[test]
fn equal_sort_keys_tie_break_by_key() {
    let db = db();
    seed_members(&db, &[("same", 10), ("same", 10), ("same", 10)]);
    let repo = paged_repo(&db);
    let mut session = db.session();

    let first = repo
        .call(
            &mut session,
            "find_page_by_age",
            &[Value::Uint(10)],
            Some(&PageRequest::of(0, 2, Sort::by("username", Direction::Desc)).expect("request")),
        )
        .expect("call")
        .into_page()
        .expect("page shape");

    let keys: Vec<u64> = first.content().iter().map(|m| m.id.get()).collect();
    assert_eq!(keys, vec![1, 2]);
    session.rollback();
}

use crate::{
    db::{
        executor::tests::db,
        query::{FetchPlan, MethodSpec, ReturnShape},
        repository::Repository,
        Db,
    },
    test_fixtures::{Member, Team},
    value::Value,
};

fn seed_teams(db: &Db) {
    let mut session = db.session();
    let team_a = session.save(Team::new("teamA")).expect("save team");
    let team_b = session.save(Team::new("teamB")).expect("save team");
    session
        .save(Member::with_team("member1", 10, team_a.id))
        .expect("save member");
    session
        .save(Member::with_team("member2", 20, team_a.id))
        .expect("save member");
    session
        .save(Member::with_team("member3", 30, team_b.id))
        .expect("save member");
    session.commit().expect("seed commit");
}

#[test]
fn named_plan_loads_relations_in_one_round_trip() {
    let db = db();
    seed_teams(&db);
    let repo = Repository::<Member>::builder()
        .method(
            MethodSpec::new("find_by_age_greater_than", ReturnShape::Many)
                .params(&["age"])
                .fetch(FetchPlan::Named("member.all")),
        )
        .build(&db)
        .expect("repository wires");

    let mut session = db.session();
    db.reset_metrics();

    let members = repo
        .call(
            &mut session,
            "find_by_age_greater_than",
            &[Value::Uint(0)],
            None,
        )
        .expect("call")
        .into_many()
        .expect("many shape");
    assert_eq!(members.len(), 3);
    assert_eq!(db.metrics().content_queries, 1);

    for member in &members {
        let team: Team = session
            .relation_one(member, "team")
            .expect("navigate")
            .expect("present");
        assert!(team.name.starts_with("team"));
    }
    // Navigation was satisfied entirely from the prefetched rows.
    assert_eq!(db.metrics().content_queries, 1);
    session.rollback();
}

#[test]
fn lazy_navigation_issues_additional_queries() {
    let db = db();
    seed_teams(&db);
    let repo = Repository::<Member>::builder()
        .method(
            MethodSpec::new("find_by_age_greater_than", ReturnShape::Many).params(&["age"]),
        )
        .build(&db)
        .expect("repository wires");

    let mut session = db.session();
    db.reset_metrics();

    let members = repo
        .call(
            &mut session,
            "find_by_age_greater_than",
            &[Value::Uint(0)],
            None,
        )
        .expect("call")
        .into_many()
        .expect("many shape");
    assert_eq!(db.metrics().content_queries, 1);

    let _team: Team = session
        .relation_one(&members[0], "team")
        .expect("navigate")
        .expect("present");
    assert_eq!(db.metrics().content_queries, 2);

    // The navigated row is cached; a second hop to the same team is free.
    let _team: Team = session
        .relation_one(&members[0], "team")
        .expect("navigate")
        .expect("present");
    assert_eq!(db.metrics().content_queries, 2);
    session.rollback();
}

#[test]
fn inline_paths_prefetch_inverse_collections() {
    let db = db();
    seed_teams(&db);
    let repo = Repository::<Team>::builder()
        .method(
            MethodSpec::new("find_by_name", ReturnShape::One)
                .params(&["name"])
                .fetch(FetchPlan::Paths(&["members"])),
        )
        .build(&db)
        .expect("repository wires");

    let mut session = db.session();
    db.reset_metrics();

    let team = repo
        .call(&mut session, "find_by_name", &[Value::from("teamA")], None)
        .expect("call")
        .into_one()
        .expect("one shape");
    assert_eq!(db.metrics().content_queries, 1);

    let members: Vec<Member> = session.relation_many(&team, "members").expect("navigate");
    let mut names: Vec<&str> = members.iter().map(|m| m.username.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["member1", "member2"]);
    assert_eq!(db.metrics().content_queries, 1);
    session.rollback();
}

#[test]
fn relation_hop_predicates_filter_by_the_related_row() {
    let db = db();
    seed_teams(&db);
    let repo = Repository::<Member>::builder()
        .method(MethodSpec::new("find_by_team_name", ReturnShape::Many).params(&["name"]))
        .build(&db)
        .expect("repository wires");

    let mut session = db.session();
    let members = repo
        .call(
            &mut session,
            "find_by_team_name",
            &[Value::from("teamB")],
            None,
        )
        .expect("call")
        .into_many()
        .expect("many shape");

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username, "member3");
    session.rollback();
}

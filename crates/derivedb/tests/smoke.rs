//! End-to-end check that the public surface is sufficient to declare an
//! entity, wire a repository, and run derived queries.

use derivedb::core::{
    model::{EntityFieldKind, EntityFieldModel},
    traits::{require_field, EntityDecodeError},
    value::RowData,
};
use derivedb::prelude::*;

#[derive(Clone, Debug, Default, PartialEq)]
struct Note {
    id: Key,
    title: String,
    pinned: bool,
}

impl Note {
    fn new(title: &str, pinned: bool) -> Self {
        Self {
            title: title.to_string(),
            pinned,
            ..Self::default()
        }
    }
}

static NOTE_FIELDS: &[EntityFieldModel] = &[
    EntityFieldModel {
        name: "id",
        kind: EntityFieldKind::Uint,
    },
    EntityFieldModel {
        name: "title",
        kind: EntityFieldKind::Text,
    },
    EntityFieldModel {
        name: "pinned",
        kind: EntityFieldKind::Bool,
    },
];

static NOTE_MODEL: EntityModel = EntityModel {
    path: Note::PATH,
    entity_name: "note",
    primary_key: "id",
    fields: NOTE_FIELDS,
    relations: &[],
    fetch_plans: &[],
};

impl Path for Note {
    const PATH: &'static str = "smoke::Note";
}

impl EntityKind for Note {
    const MODEL: &'static EntityModel = &NOTE_MODEL;

    fn key(&self) -> Key {
        self.id
    }

    fn set_key(&mut self, key: Key) {
        self.id = key;
    }

    fn to_row(&self) -> RowData {
        let mut row = RowData::new();
        row.insert("id".to_string(), self.id.into());
        row.insert("title".to_string(), Value::from(self.title.clone()));
        row.insert("pinned".to_string(), Value::from(self.pinned));
        row
    }

    fn from_row(row: &RowData) -> Result<Self, EntityDecodeError> {
        let entity = Self::PATH;
        let id = match require_field(row, entity, "id")? {
            Value::Uint(v) => Key(*v),
            value => {
                return Err(EntityDecodeError::WrongShape {
                    entity,
                    field: "id",
                    value: value.clone(),
                });
            }
        };
        let title = match require_field(row, entity, "title")? {
            Value::Text(v) => v.clone(),
            value => {
                return Err(EntityDecodeError::WrongShape {
                    entity,
                    field: "title",
                    value: value.clone(),
                });
            }
        };
        let pinned = matches!(row.get("pinned"), Some(Value::Bool(true)));
        Ok(Self { id, title, pinned })
    }
}

#[test]
fn declares_queries_and_pages_through_the_prelude() {
    let db = Db::new();
    db.register::<Note>();

    let repo = Repository::<Note>::builder()
        .method(MethodSpec::new("find_by_pinned", ReturnShape::Many).params(&["pinned"]))
        .method(MethodSpec::new("find_page_by_pinned", ReturnShape::Page).params(&["pinned"]))
        .build(&db)
        .expect("repository wires");

    let mut session = db.session();
    for i in 1..=4 {
        session
            .save(Note::new(&format!("note{i}"), i % 2 == 0))
            .expect("save");
    }

    let pinned = repo
        .call(&mut session, "find_by_pinned", &[Value::from(true)], None)
        .expect("call")
        .into_many()
        .expect("many shape");
    assert_eq!(pinned.len(), 2);

    let request =
        PageRequest::of(0, 1, Sort::by("title", Direction::Desc)).expect("valid request");
    let page = repo
        .call(
            &mut session,
            "find_page_by_pinned",
            &[Value::from(true)],
            Some(&request),
        )
        .expect("call")
        .into_page()
        .expect("page shape");
    assert_eq!(page.total_elements(), 2);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.content()[0].title, "note4");

    session.commit().expect("commit");
    assert!(db.metrics().content_queries >= 2);
}

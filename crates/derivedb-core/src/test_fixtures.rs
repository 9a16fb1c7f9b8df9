//! Shared test entities: the member/team pair used across the suite.
//! Members own the association (`team_id`); teams expose the inverse,
//! read-only `members` collection.

use crate::{
    model::{
        EntityFieldKind, EntityFieldModel, EntityModel, FetchPlanModel, RelationKind,
        RelationModel,
    },
    traits::{EntityDecodeError, EntityKind, Path, require_field},
    types::{Key, Stamps},
    value::{RowData, Value},
};
use chrono::{DateTime, Utc};

///
/// Member
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Member {
    pub id: Key,
    pub username: String,
    pub age: u32,
    pub team_id: Option<Key>,
    pub stamps: Stamps,
}

impl Member {
    pub fn new(username: &str, age: u32) -> Self {
        Self {
            username: username.to_string(),
            age,
            ..Self::default()
        }
    }

    pub fn with_team(username: &str, age: u32, team: Key) -> Self {
        Self {
            team_id: Some(team),
            ..Self::new(username, age)
        }
    }
}

static MEMBER_FIELDS: &[EntityFieldModel] = &[
    EntityFieldModel {
        name: "id",
        kind: EntityFieldKind::Uint,
    },
    EntityFieldModel {
        name: "username",
        kind: EntityFieldKind::Text,
    },
    EntityFieldModel {
        name: "age",
        kind: EntityFieldKind::Uint,
    },
    EntityFieldModel {
        name: "team_id",
        kind: EntityFieldKind::Uint,
    },
    EntityFieldModel {
        name: "created_at",
        kind: EntityFieldKind::Timestamp,
    },
    EntityFieldModel {
        name: "modified_at",
        kind: EntityFieldKind::Timestamp,
    },
];

static MEMBER_RELATIONS: &[RelationModel] = &[RelationModel {
    name: "team",
    target: Team::PATH,
    kind: RelationKind::Owning {
        fk_field: "team_id",
    },
}];

static MEMBER_PLANS: &[FetchPlanModel] = &[FetchPlanModel {
    name: "member.all",
    paths: &["team"],
}];

pub static MEMBER_MODEL: EntityModel = EntityModel {
    path: Member::PATH,
    entity_name: "member",
    primary_key: "id",
    fields: MEMBER_FIELDS,
    relations: MEMBER_RELATIONS,
    fetch_plans: MEMBER_PLANS,
};

impl Path for Member {
    const PATH: &'static str = "fixtures::Member";
}

impl EntityKind for Member {
    const MODEL: &'static EntityModel = &MEMBER_MODEL;

    fn key(&self) -> Key {
        self.id
    }

    fn set_key(&mut self, key: Key) {
        self.id = key;
    }

    fn to_row(&self) -> RowData {
        let mut row = RowData::new();
        row.insert("id".to_string(), self.id.into());
        row.insert("username".to_string(), Value::from(self.username.clone()));
        row.insert("age".to_string(), Value::from(self.age));
        row.insert(
            "team_id".to_string(),
            self.team_id.map_or(Value::Null, Into::into),
        );
        row.insert(
            "created_at".to_string(),
            self.stamps.created_millis().map_or(Value::Null, Value::Timestamp),
        );
        row.insert(
            "modified_at".to_string(),
            self.stamps.modified_millis().map_or(Value::Null, Value::Timestamp),
        );
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
        let username = match require_field(row, entity, "username")? {
            Value::Text(v) => v.clone(),
            value => {
                return Err(EntityDecodeError::WrongShape {
                    entity,
                    field: "username",
                    value: value.clone(),
                });
            }
        };
        let age = match require_field(row, entity, "age")? {
            Value::Uint(v) => u32::try_from(*v).unwrap_or(u32::MAX),
            value => {
                return Err(EntityDecodeError::WrongShape {
                    entity,
                    field: "age",
                    value: value.clone(),
                });
            }
        };
        let team_id = match row.get("team_id") {
            Some(Value::Uint(v)) => Some(Key(*v)),
            _ => None,
        };
        let stamps = Stamps::from_millis(
            timestamp_field(row, "created_at"),
            timestamp_field(row, "modified_at"),
        );

        Ok(Self {
            id,
            username,
            age,
            team_id,
            stamps,
        })
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        self.stamps.touch(now, created);
    }
}

///
/// Team
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Team {
    pub id: Key,
    pub name: String,
    pub stamps: Stamps,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

static TEAM_FIELDS: &[EntityFieldModel] = &[
    EntityFieldModel {
        name: "id",
        kind: EntityFieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: EntityFieldKind::Text,
    },
    EntityFieldModel {
        name: "created_at",
        kind: EntityFieldKind::Timestamp,
    },
    EntityFieldModel {
        name: "modified_at",
        kind: EntityFieldKind::Timestamp,
    },
];

static TEAM_RELATIONS: &[RelationModel] = &[RelationModel {
    name: "members",
    target: Member::PATH,
    kind: RelationKind::Inverse {
        owning_fk: "team_id",
    },
}];

pub static TEAM_MODEL: EntityModel = EntityModel {
    path: Team::PATH,
    entity_name: "team",
    primary_key: "id",
    fields: TEAM_FIELDS,
    relations: TEAM_RELATIONS,
    fetch_plans: &[],
};

impl Path for Team {
    const PATH: &'static str = "fixtures::Team";
}

impl EntityKind for Team {
    const MODEL: &'static EntityModel = &TEAM_MODEL;

    fn key(&self) -> Key {
        self.id
    }

    fn set_key(&mut self, key: Key) {
        self.id = key;
    }

    fn to_row(&self) -> RowData {
        let mut row = RowData::new();
        row.insert("id".to_string(), self.id.into());
        row.insert("name".to_string(), Value::from(self.name.clone()));
        row.insert(
            "created_at".to_string(),
            self.stamps.created_millis().map_or(Value::Null, Value::Timestamp),
        );
        row.insert(
            "modified_at".to_string(),
            self.stamps.modified_millis().map_or(Value::Null, Value::Timestamp),
        );
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
        let name = match require_field(row, entity, "name")? {
            Value::Text(v) => v.clone(),
            value => {
                return Err(EntityDecodeError::WrongShape {
                    entity,
                    field: "name",
                    value: value.clone(),
                });
            }
        };
        let stamps = Stamps::from_millis(
            timestamp_field(row, "created_at"),
            timestamp_field(row, "modified_at"),
        );

        Ok(Self { id, name, stamps })
    }

    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        self.stamps.touch(now, created);
    }
}

fn timestamp_field(row: &RowData, field: &str) -> Option<i64> {
    match row.get(field) {
        Some(Value::Timestamp(v)) => Some(*v),
        _ => None,
    }
}

/// Model lookup covering both fixture entities.
pub fn fixture_lookup(path: &str) -> Option<&'static EntityModel> {
    match path {
        Member::PATH => Some(&MEMBER_MODEL),
        Team::PATH => Some(&TEAM_MODEL),
        _ => None,
    }
}

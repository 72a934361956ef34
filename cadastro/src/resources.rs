//! The three record collections the console manages, and how each maps onto the API.
//!
//! Every resource follows the same pattern, eg for users:
//!
//! - create: `POST /usuario/`
//! - list: `GET /usuarios/ativos/` and `GET /usuarios/inativos/`
//! - toggle status: `PUT /usuario/{id}/status/`

use crate::routes::Route;
use crate::{Error, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Users,
    Types,
    Contacts,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Users,
        ResourceKind::Types,
        ResourceKind::Contacts,
    ];

    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Users => "usuario",
            ResourceKind::Types => "tipo",
            ResourceKind::Contacts => "contato",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Users => "usuarios",
            ResourceKind::Types => "tipos",
            ResourceKind::Contacts => "contatos",
        }
    }

    /// English name, as used in notices and on the command line.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Types => "types",
            ResourceKind::Contacts => "contacts",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            ResourceKind::Users => "user",
            ResourceKind::Types => "type",
            ResourceKind::Contacts => "contact",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ResourceKind::Users => "User",
            ResourceKind::Types => "Type",
            ResourceKind::Contacts => "Contact",
        }
    }

    /// The console screen listing this resource.
    pub fn route(&self) -> Route {
        match self {
            ResourceKind::Users => Route::Users,
            ResourceKind::Types => Route::Types,
            ResourceKind::Contacts => Route::Contacts,
        }
    }

    pub fn list_path(&self, partition: Partition) -> String {
        format!("/{}/{}/", self.plural(), partition.segment())
    }

    pub fn create_path(&self) -> String {
        format!("/{}/", self.singular())
    }

    pub fn toggle_path(&self, id: &RecordId) -> String {
        format!("/{}/{}/status/", self.singular(), id)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Active and inactive records are disjoint and each is fetched from its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Active,
    Inactive,
}

impl Partition {
    pub const BOTH: [Partition; 2] = [Partition::Active, Partition::Inactive];

    pub fn segment(&self) -> &'static str {
        match self {
            Partition::Active => "ativos",
            Partition::Inactive => "inativos",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Partition::Active => "active",
            Partition::Inactive => "inactive",
        }
    }
}

/// Server-assigned identifier. The API hands these out as numbers or strings; both end up here
/// as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecordId {
    type Err = Error;

    /// Ids go straight into a URL path, so anything that would change the path shape is refused.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty()
            || s.chars()
                .any(|c| c == '/' || c == '?' || c == '#' || c == '%' || c.is_whitespace())
        {
            return Err(Error::validation(vec!["id"]));
        }
        Ok(RecordId(s.to_string()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RecordId(s)),
            Value::Number(n) => Ok(RecordId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected a string or number id, got {other}"
            ))),
        }
    }
}

/// Descriptive fields are display-only: accept strings, numbers, or nothing at all.
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Something a list can be rendered from.
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

/// A creation form: which required fields are still blank.
pub trait Draft {
    fn missing_fields(&self) -> Vec<&'static str>;

    fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(missing))
        }
    }
}

fn blank_fields(fields: &[(&'static str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

pub trait Resource {
    const KIND: ResourceKind;
    type Record: DeserializeOwned + Serialize + Tabular + Clone + fmt::Debug;
    type Draft: Serialize + Draft + fmt::Debug;
}

#[derive(Debug, Clone, Copy)]
pub struct Users;

#[derive(Debug, Clone, Copy)]
pub struct Types;

#[derive(Debug, Clone, Copy)]
pub struct Contacts;

impl Resource for Users {
    const KIND: ResourceKind = ResourceKind::Users;
    type Record = User;
    type Draft = NewUser;
}

impl Resource for Types {
    const KIND: ResourceKind = ResourceKind::Types;
    type Record = Category;
    type Draft = NewCategory;
}

impl Resource for Contacts {
    const KIND: ResourceKind = ResourceKind::Contacts;
    type Record = Contact;
    type Draft = NewContact;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    #[serde(default, deserialize_with = "loose_string")]
    pub nome: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub email: String,
}

impl Tabular for User {
    fn headers() -> &'static [&'static str] {
        &["ID", "NAME", "EMAIL"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.id.to_string(), self.nome.clone(), self.email.clone()]
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Draft for NewUser {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ])
    }
}

/// A categorization type, served from the `/tipo/` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub descricao: String,
}

impl Tabular for Category {
    fn headers() -> &'static [&'static str] {
        &["ID", "NAME", "DESCRIPTION"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.id.to_string(), self.name.clone(), self.descricao.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub descricao: String,
}

impl Draft for NewCategory {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[("name", &self.name), ("descricao", &self.descricao)])
    }
}

/// A contact value of some type, attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: RecordId,
    #[serde(default, deserialize_with = "loose_string")]
    pub idtipo: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub idusuario: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub nome: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub valor: String,
}

impl Tabular for Contact {
    fn headers() -> &'static [&'static str] {
        &["ID", "TYPE", "USER", "NAME", "VALUE"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.idtipo.clone(),
            self.idusuario.clone(),
            self.nome.clone(),
            self.valor.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub idtipo: String,
    pub idusuario: String,
    pub nome: String,
    pub valor: String,
}

impl Draft for NewContact {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("idtipo", &self.idtipo),
            ("idusuario", &self.idusuario),
            ("nome", &self.nome),
            ("valor", &self.valor),
        ])
    }
}

/// List endpoints answer with a bare array; an object wrapping it under `data` is tolerated, and
/// an empty body means no records.
pub fn list_items(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Null => Ok(vec![]),
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(Error::Remote {
                status: 200,
                message: "expected a list of records".to_string(),
            }),
        },
        _ => Err(Error::Remote {
            status: 200,
            message: "expected a list of records".to_string(),
        }),
    }
}

#[test]
fn test_paths() {
    assert_eq!(
        ResourceKind::Users.list_path(Partition::Active),
        "/usuarios/ativos/"
    );
    assert_eq!(
        ResourceKind::Types.list_path(Partition::Inactive),
        "/tipos/inativos/"
    );
    assert_eq!(ResourceKind::Contacts.create_path(), "/contato/");
    assert_eq!(
        ResourceKind::Contacts.toggle_path(&RecordId::from_str("12").unwrap()),
        "/contato/12/status/"
    );
}

#[test]
fn test_record_id() {
    assert_eq!(RecordId::from_str(" 7 ").unwrap().as_str(), "7");
    assert!(RecordId::from_str("").is_err());
    assert!(RecordId::from_str("1/../2").is_err());
    assert!(RecordId::from_str("a b").is_err());

    let id: RecordId = serde_json::from_str("42").unwrap();
    assert_eq!(id.as_str(), "42");
    let id: RecordId = serde_json::from_str("\"abc\"").unwrap();
    assert_eq!(id.as_str(), "abc");
    assert!(serde_json::from_str::<RecordId>("null").is_err());
}

#[test]
fn test_record_decoding() {
    use serde_json::json;
    let contact: Contact = serde_json::from_value(json!({
        "id": 3,
        "idtipo": 1,
        "idusuario": 9,
        "nome": "Celular",
        "valor": "+55 11 99999-0000",
        "ativo": true,
    }))
    .unwrap();
    assert_eq!(
        contact.cells(),
        vec!["3", "1", "9", "Celular", "+55 11 99999-0000"]
    );

    let user: User = serde_json::from_value(json!({"id": "u1", "nome": null})).unwrap();
    assert_eq!(user.nome, "");
    assert_eq!(user.email, "");
}

#[test]
fn test_drafts() {
    let draft = NewUser {
        username: "op".to_string(),
        email: "  ".to_string(),
        password: String::new(),
    };
    assert_eq!(draft.missing_fields(), vec!["email", "password"]);
    assert!(matches!(draft.validate(), Err(Error::Validation { .. })));
    assert!(!format!("{draft:?}").contains("password: \"\""));

    let draft = NewCategory {
        name: "Goleiro".to_string(),
        descricao: "Defende o gol".to_string(),
    };
    assert!(draft.validate().is_ok());

    assert_eq!(
        NewContact::default().missing_fields(),
        vec!["idtipo", "idusuario", "nome", "valor"]
    );
}

#[test]
fn test_list_items() {
    use serde_json::json;
    assert_eq!(list_items(Value::Null).unwrap().len(), 0);
    assert_eq!(list_items(json!([{"id": 1}, {"id": 2}])).unwrap().len(), 2);
    assert_eq!(list_items(json!({"data": [{"id": 1}]})).unwrap().len(), 1);
    assert!(list_items(json!({"count": 2})).is_err());
    assert!(list_items(json!("nope")).is_err());
}

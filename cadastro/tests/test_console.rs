mod support;

use cadastro::app::Page;
use cadastro::resources::{NewCategory, NewContact, NewUser};
use cadastro::storage::CredentialStore;
use cadastro::views::DashboardCounts;
use cadastro::{AuthState, Contacts, Error, NoticeLevel, Partition, RecordId, Types, Users};
use rouille::Response;
use serde_json::{json, Value};
use std::str::FromStr;
use support::{
    console, console_at, fake_api_handler, truncated_unauthorized, unauthorized, StubServer,
    GOOD_TOKEN,
};

#[test]
fn test_login_success() {
    let server = StubServer::fake_api();
    let mut h = console(&server, None);
    assert_eq!(h.console.session().state(), AuthState::Unauthenticated);

    let page = h.console.login("op", "secret").unwrap();
    assert_eq!(
        page,
        Page::Dashboard(DashboardCounts {
            users: 1,
            types: 1,
            contacts: 2,
        })
    );
    assert_eq!(h.store.load().unwrap(), Some(GOOD_TOKEN.to_string()));
    assert!(h.console.session().is_authenticated());
    assert_eq!(h.console.session().location(), "/dashboard");

    let reqs = server.requests();
    let token_req = &reqs[0];
    assert_eq!(token_req.path, "/token/");
    assert_eq!(token_req.authorization, None);
    for field in [
        "grant_type=password",
        "username=op",
        "password=secret",
        "client_id=01",
        "client_secret=string",
    ] {
        assert!(token_req.body.contains(field), "missing {field}");
    }
    // everything after login carries the new credential
    assert!(reqs[1..]
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Bearer tok123")));
    assert!(h
        .notices
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Success));
}

#[test]
fn test_login_wrong_password() {
    let server = StubServer::fake_api();
    let mut h = console(&server, None);

    let err = h.console.login("op", "wrong").unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert_eq!(h.console.session().state(), AuthState::Unauthenticated);
    assert_eq!(h.store.load().unwrap(), None);
    assert_eq!(h.store.clear_count(), 0);
    // no navigation away from, or back to, the entry screen
    assert_eq!(h.console.session().history(), vec!["/".to_string()]);
    assert_eq!(h.notices.errors().len(), 1);
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_login_missing_fields() {
    let server = StubServer::fake_api();
    let mut h = console(&server, None);

    let err = h.console.login("op", "").unwrap_err();
    assert!(matches!(err, Error::Validation { ref fields } if fields == &vec!["password"]));
    assert!(server.requests().is_empty());
    assert_eq!(h.notices.errors().len(), 1);
}

#[test]
fn test_login_without_access_token() {
    let server = StubServer::start(|req| {
        if req.path == "/token/" {
            Response::json(&json!({"token_type": "bearer"}))
        } else {
            unauthorized()
        }
    });
    let mut h = console(&server, None);
    let err = h.console.login("op", "secret").unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(!h.console.session().is_authenticated());
    assert_eq!(h.store.load().unwrap(), None);
}

#[test]
fn test_logout() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));
    assert!(h.console.session().is_authenticated());

    let page = h.console.logout().unwrap();
    assert_eq!(page, Page::Login);
    assert_eq!(h.store.load().unwrap(), None);
    assert_eq!(h.console.session().state(), AuthState::Unauthenticated);
    assert_eq!(h.console.session().location(), "/");
    assert!(server.requests().is_empty());
}

#[test]
fn test_expired_credential_on_users() {
    let server = StubServer::start(|_| unauthorized());
    let mut h = console(&server, Some("stale"));

    let err = h.console.visit("/users").unwrap_err();
    assert!(matches!(err, Error::AuthorizationExpired));
    assert_eq!(h.store.load().unwrap(), None);
    assert_eq!(h.store.clear_count(), 1);
    assert_eq!(h.console.session().state(), AuthState::Unauthenticated);
    assert_eq!(
        h.console.session().history(),
        vec!["/".to_string(), "/users".to_string(), "/".to_string()]
    );
    // the visit ends at the first 401: no retry, no second list
    assert_eq!(server.requests().len(), 1);
    assert_eq!(server.count("GET", "/usuarios/ativos/"), 1);
    assert_eq!(
        server.requests()[0].authorization.as_deref(),
        Some("Bearer stale")
    );

    // back on the entry screen, a protected route now redirects without a request
    assert_eq!(h.console.visit("/types").unwrap(), Page::Login);
    assert_eq!(server.requests().len(), 1);
    assert_eq!(h.store.clear_count(), 1);
}

#[test]
fn test_expired_with_unreadable_body() {
    let url = truncated_unauthorized();
    let mut h = console_at(&url, Some("stale"));

    let err = h.console.visit("/users").unwrap_err();
    assert!(matches!(err, Error::AuthorizationExpired));
    assert_eq!(h.store.load().unwrap(), None);
    assert_eq!(h.store.clear_count(), 1);
    assert_eq!(h.console.session().location(), "/");
}

#[test]
fn test_failed_list_does_not_block_toggle() {
    let server = StubServer::start(|req| {
        if req.path == "/usuarios/inativos/" {
            Response::json(&json!({"message": "database unavailable"})).with_status_code(500)
        } else {
            fake_api_handler(req)
        }
    });
    let mut h = console(&server, Some(GOOD_TOKEN));

    // the page still shows the list that did load
    match h.console.visit("/users").unwrap() {
        Page::Users(list) => {
            assert_eq!(list.active.len(), 1);
            assert_eq!(list.active[0].nome, "Ana");
            assert!(list.inactive.is_empty());
        }
        other => panic!("unexpected page: {other:?}"),
    }
    assert_eq!(h.notices.errors()[0].message, "database unavailable");

    let page = h
        .console
        .toggle::<Users>(&RecordId::from_str("1").unwrap())
        .unwrap();
    assert_eq!(server.count("PUT", "/usuario/1/status/"), 1);
    match page {
        Page::Users(list) => assert_eq!(list.active.len(), 1),
        other => panic!("unexpected page: {other:?}"),
    }
    assert!(h
        .notices
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Success && n.message == "User status changed"));

    let draft = NewUser {
        username: "carla".to_string(),
        email: "carla@example.com".to_string(),
        password: "hunter22".to_string(),
    };
    assert!(matches!(
        h.console.create::<Users>(&draft).unwrap(),
        Page::Users(_)
    ));
    assert_eq!(server.count("POST", "/usuario/"), 1);
    assert!(h.console.session().is_authenticated());
}

#[test]
fn test_expired_on_any_endpoint_clears_once() {
    // lists are fine, the toggle endpoint says the session is gone
    let server = StubServer::start(|req| {
        if req.method == "PUT" {
            unauthorized()
        } else {
            fake_api_handler(req)
        }
    });
    let mut h = console(&server, Some(GOOD_TOKEN));

    let err = h
        .console
        .toggle::<Types>(&RecordId::from_str("1").unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::AuthorizationExpired));
    assert_eq!(h.store.clear_count(), 1);
    assert_eq!(h.console.session().location(), "/");
    // no re-fetch after a failed mutation
    assert_eq!(server.count("GET", "/tipos/ativos/"), 1);
    assert_eq!(server.count("GET", "/tipos/inativos/"), 1);
}

#[test]
fn test_guard_without_credential() {
    let server = StubServer::fake_api();
    let mut h = console(&server, None);
    for path in ["/dashboard", "/users", "/types", "/contacts"] {
        assert_eq!(h.console.visit(path).unwrap(), Page::Login);
        assert_eq!(h.console.session().location(), "/");
    }
    assert!(server.requests().is_empty());

    assert_eq!(
        h.console.visit("/nowhere").unwrap(),
        Page::NotFound("/nowhere".to_string())
    );
}

#[test]
fn test_entry_screen_when_logged_in() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));
    let page = h.console.visit("/").unwrap();
    assert!(matches!(page, Page::Dashboard(_)));
    assert_eq!(h.console.session().location(), "/dashboard");
}

#[test]
fn test_list_pages() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));

    match h.console.visit("/users").unwrap() {
        Page::Users(page) => {
            assert_eq!(page.active.len(), 1);
            assert_eq!(page.active[0].nome, "Ana");
            assert_eq!(page.partition(Partition::Inactive)[0].email, "bruno@example.com");
        }
        other => panic!("unexpected page: {other:?}"),
    }
    match h.console.visit("/contacts").unwrap() {
        Page::Contacts(page) => {
            assert_eq!(page.active.len(), 2);
            assert_eq!(page.active[1].valor, "11 3333-0000");
            assert!(page.inactive.is_empty());
        }
        other => panic!("unexpected page: {other:?}"),
    }

    // the dashboard reuses the active lists already fetched
    let before = server.requests().len();
    match h.console.visit("/dashboard").unwrap() {
        Page::Dashboard(counts) => assert_eq!(counts.contacts, 2),
        other => panic!("unexpected page: {other:?}"),
    }
    assert_eq!(server.requests().len(), before + 1);
    assert_eq!(server.count("GET", "/tipos/ativos/"), 1);
}

#[test]
fn test_toggle_refetches_both_lists() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));

    let page = h
        .console
        .toggle::<Users>(&RecordId::from_str("1").unwrap())
        .unwrap();
    assert!(matches!(page, Page::Users(_)));
    assert_eq!(server.count("PUT", "/usuario/1/status/"), 1);
    assert_eq!(server.count("GET", "/usuarios/ativos/"), 2);
    assert_eq!(server.count("GET", "/usuarios/inativos/"), 2);

    let active = cadastro::views::ResourceView::<Users>::key(Partition::Active);
    let inactive = cadastro::views::ResourceView::<Users>::key(Partition::Inactive);
    assert_eq!(h.console.cache().issued(active), 2);
    assert_eq!(h.console.cache().issued(inactive), 2);
    assert!(h
        .notices
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Success && n.message == "User status changed"));
}

#[test]
fn test_create_validation_sends_nothing() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));

    let err = h
        .console
        .create::<Users>(&NewUser {
            username: "op".to_string(),
            email: "op@example.com".to_string(),
            password: String::new(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = h
        .console
        .create::<Types>(&NewCategory {
            name: String::new(),
            descricao: "Fixo".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = h
        .console
        .create::<Contacts>(&NewContact {
            idtipo: "1".to_string(),
            idusuario: "1".to_string(),
            nome: "Celular".to_string(),
            valor: " ".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation { ref fields } if fields == &vec!["valor"]));

    assert!(server.requests().is_empty());
    let errors = h.notices.errors();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[2].message, "Fill in all required fields (valor)");
}

#[test]
fn test_create_contact() {
    let server = StubServer::fake_api();
    let mut h = console(&server, Some(GOOD_TOKEN));

    let draft = NewContact {
        idtipo: "1".to_string(),
        idusuario: "2".to_string(),
        nome: "Casa".to_string(),
        valor: "11 3333-0000".to_string(),
    };
    let page = h.console.create::<Contacts>(&draft).unwrap();
    assert!(matches!(page, Page::Contacts(_)));

    let post = server
        .requests()
        .into_iter()
        .find(|r| r.method == "POST")
        .unwrap();
    assert_eq!(post.path, "/contato/");
    let body: Value = serde_json::from_str(&post.body).unwrap();
    assert_eq!(
        body,
        json!({"idtipo": "1", "idusuario": "2", "nome": "Casa", "valor": "11 3333-0000"})
    );
    assert_eq!(server.count("GET", "/contatos/ativos/"), 2);
    assert_eq!(server.count("GET", "/contatos/inativos/"), 2);
}

#[test]
fn test_remote_error_message() {
    let server = StubServer::start(|req| {
        if req.method == "POST" {
            Response::json(&json!({"message": "username already taken"})).with_status_code(409)
        } else {
            fake_api_handler(req)
        }
    });
    let mut h = console(&server, Some(GOOD_TOKEN));

    let err = h
        .console
        .create::<Users>(&NewUser {
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "hunter22".to_string(),
        })
        .unwrap_err();
    match err {
        Error::Remote { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "username already taken");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.notices.errors()[0].message, "username already taken");
    // session untouched, lists not re-fetched
    assert!(h.console.session().is_authenticated());
    assert_eq!(server.count("GET", "/usuarios/ativos/"), 1);
}

#[test]
fn test_dashboard_failed_list_retries_once() {
    let server = StubServer::start(|req| {
        if req.path == "/tipos/ativos/" {
            Response::text("oops").with_status_code(500)
        } else {
            fake_api_handler(req)
        }
    });
    let mut h = console(&server, Some(GOOD_TOKEN));

    let page = h.console.visit("/dashboard").unwrap();
    assert_eq!(
        page,
        Page::Dashboard(DashboardCounts {
            users: 1,
            types: 0,
            contacts: 2,
        })
    );
    assert_eq!(server.count("GET", "/tipos/ativos/"), 2);
    assert_eq!(h.notices.errors()[0].message, cadastro::GENERIC_ERROR_MESSAGE);
}

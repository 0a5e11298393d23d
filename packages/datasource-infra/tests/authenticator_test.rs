mod common;

use common::{datasource_config, host_config};
use datasource_infra::{transform_datasource_config, RemoteAuthenticator};

#[test]
fn test_in_process_class_accepts_anything() {
    for class in ["embedded", "embedded-pool"] {
        let config = datasource_config(&[
            ("className", class),
            ("user", "app"),
            ("password", "secret"),
            ("databaseName", "main"),
        ]);
        let auth = RemoteAuthenticator::new(&config);

        assert!(auth.authenticate("app", "secret", "main"));
        assert!(auth.authenticate("", "", ""));
        assert!(auth.authenticate("intruder", "guess", "other"));
    }
}

#[test]
fn test_network_class_requires_captured_pair() {
    let host = host_config(
        "db.datasource",
        &[
            ("className", "embedded-client"),
            ("user", "app"),
            ("password", "secret"),
            ("databaseName", "main"),
        ],
    );
    let config = transform_datasource_config(&host, "db.datasource").unwrap();
    let auth = RemoteAuthenticator::new(&config);

    assert!(auth.authenticate("app", "secret", "main"));
    assert!(auth.authenticate("app", "secret", "some-other-db"));
    assert!(!auth.authenticate("app", "Secret", "main"));
    assert!(!auth.authenticate("other", "secret", "main"));
    assert!(!auth.authenticate("", "secret", "main"));
    assert!(!auth.authenticate("app", "", "main"));
}

#[test]
fn test_network_class_with_empty_captured_password_rejects_empty_candidate() {
    let config = datasource_config(&[("className", "postgres"), ("user", "app")]);
    let auth = RemoteAuthenticator::new(&config);

    assert!(!auth.authenticate("app", "", "main"));
}

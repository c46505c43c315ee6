use super::*;

fn input(name: &str, email: &str, role: UserRole) -> UserInput {
    UserInput {
        name: name.to_string(),
        email: email.to_string(),
        role,
    }
}

async fn seeded() -> Storage {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (name, email, role) in [
        ("alice", "alice@example.com", UserRole::Admin),
        ("bob", "bob@example.com", UserRole::Viewer),
        ("carol", "carol@example.com", UserRole::Editor),
        ("alfred", "alfred@example.com", UserRole::Viewer),
    ] {
        storage
            .create_user(&input(name, email, role))
            .await
            .expect("user");
    }
    storage
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("dashgrid_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn paginates_users_with_total_count() {
    let storage = seeded().await;

    let first = storage
        .list_users(&UserFilter {
            limit: 3,
            offset: 0,
            ..UserFilter::default()
        })
        .await
        .expect("page");
    assert_eq!(first.total, 4);
    assert_eq!(first.rows.len(), 3);
    assert_eq!(first.rows[0].name, "alice");

    let second = storage
        .list_users(&UserFilter {
            limit: 3,
            offset: 3,
            ..UserFilter::default()
        })
        .await
        .expect("page");
    assert_eq!(second.rows.len(), 1);
    assert_eq!(second.rows[0].name, "alfred");
}

#[tokio::test]
async fn filters_by_name_and_role_and_sorts_by_priority() {
    let storage = seeded().await;

    let page = storage
        .list_users(&UserFilter {
            name: Some("al".to_string()),
            sort: vec![UserSort {
                column: UserColumn::Name,
                descending: true,
            }],
            limit: 10,
            ..UserFilter::default()
        })
        .await
        .expect("page");
    let names: Vec<&str> = page.rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "alfred"]);
    assert_eq!(page.total, 2);

    let viewers = storage
        .list_users(&UserFilter {
            role: Some(UserRole::Viewer),
            sort: vec![
                UserSort {
                    column: UserColumn::Role,
                    descending: false,
                },
                UserSort {
                    column: UserColumn::Email,
                    descending: true,
                },
            ],
            limit: 10,
            ..UserFilter::default()
        })
        .await
        .expect("page");
    let emails: Vec<&str> = viewers.rows.iter().map(|row| row.email.as_str()).collect();
    assert_eq!(emails, vec!["bob@example.com", "alfred@example.com"]);
}

#[tokio::test]
async fn updates_and_deletes_users() {
    let storage = seeded().await;
    let created = storage
        .create_user(&input("dave", "dave@example.com", UserRole::Viewer))
        .await
        .expect("user");

    let updated = storage
        .update_user(created.id, &input("david", "dave@example.com", UserRole::Editor))
        .await
        .expect("update")
        .expect("existing user");
    assert_eq!(updated.name, "david");
    assert_eq!(updated.role, UserRole::Editor);

    assert!(storage.delete_user(created.id).await.expect("delete"));
    assert!(!storage.delete_user(created.id).await.expect("delete again"));
    assert!(storage.get_user(created.id).await.expect("get").is_none());
    assert!(storage
        .update_user(created.id, &input("ghost", "ghost@example.com", UserRole::Viewer))
        .await
        .expect("update")
        .is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let storage = seeded().await;
    let err = storage
        .create_user(&input("alice2", "alice@example.com", UserRole::Viewer))
        .await
        .expect_err("duplicate email");
    assert!(format!("{err:#}").contains("UNIQUE"));
}

#[tokio::test]
async fn deletes_every_user_with_role() {
    let storage = seeded().await;
    let removed = storage
        .delete_users_by_role(UserRole::Viewer)
        .await
        .expect("delete by role");
    assert_eq!(removed, 2);

    let remaining = storage
        .list_users(&UserFilter {
            limit: 10,
            ..UserFilter::default()
        })
        .await
        .expect("page");
    assert!(remaining.rows.iter().all(|row| row.role != UserRole::Viewer));
}

use dispatch_core::actor::AuthContext;
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};
use dispatch_core::policy;
use dispatch_core::users::{self, CreateUserRequest, NewUser, User, UserPatch};

use super::{authorize, mask_patch};
use crate::error::AppError;
use crate::store::{DispatchStore, UserFilter};

/// Admins read anyone; a user reads only their own account.
pub async fn get(store: &dyn DispatchStore, actor: &AuthContext, id: i64) -> Result<User, AppError> {
    let user = store
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    authorize(actor, "user.read", Some(id), policy::can_read_user(actor, id))?;
    Ok(user)
}

/// Admin only. The decision comes first so a miss tells a non-admin nothing
/// about which addresses are registered.
pub async fn get_by_email(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    email: &str,
) -> Result<User, AppError> {
    authorize(actor, "user.read_by_email", None, policy::can_manage_users(actor))?;
    store
        .get_user_by_email(&users::normalize_email(email))
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: "user with that email".to_string(),
        })
}

pub async fn list(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    filter: &UserFilter,
    page: PageRequest,
) -> Result<Page<User>, AppError> {
    authorize(actor, "user.list", None, policy::can_manage_users(actor))?;
    let (items, total) = store.list_users(filter, page).await?;
    Ok(Page::new(items, page, total))
}

pub async fn create(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    req: CreateUserRequest,
) -> Result<User, AppError> {
    authorize(actor, "user.create", None, policy::can_manage_users(actor))?;
    let new = NewUser::from(req);

    let mut tx = store.begin().await?;
    let created = tx.insert_user(&new).await?;
    tx.commit().await?;

    tracing::info!(user_id = created.id, is_admin = created.is_admin, "user created");
    Ok(created)
}

pub async fn update(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    id: i64,
    patch: UserPatch,
) -> Result<User, AppError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;

    let (_, mask) = authorize(actor, "user.update", Some(id), policy::can_update_user(actor))?;
    let patch = mask_patch("user.update", id, mask, patch).normalized();
    if patch.is_empty() {
        return Ok(current);
    }

    let updated = tx
        .update_user(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    tx.commit().await?;

    tracing::info!(user_id = id, "user updated");
    Ok(updated)
}

/// Hard-delete user `id`. Their incidents stay, unattributed; their agent
/// profile and its assignments are removed.
pub async fn delete(store: &dyn DispatchStore, actor: &AuthContext, id: i64) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    tx.lock_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;

    authorize(actor, "user.delete", Some(id), policy::can_manage_users(actor))?;

    if !tx.delete_user(id).await? {
        return Err(AppError::not_found("user", id));
    }
    tx.commit().await?;

    tracing::info!(user_id = id, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::agents::CreateAgentRequest;
    use dispatch_core::assignments::CreateAssignmentRequest;
    use dispatch_core::incidents::{CreateIncidentRequest, IncidentType};

    use crate::services::{agents, assignments, incidents};
    use crate::store::memory::MemoryStore;

    fn account(name: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: name.to_string(),
            email: email.to_string(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn admin_manages_accounts() {
        let store = MemoryStore::seeded();
        let admin = AuthContext::admin(1);

        let created = create(&store, &admin, account("Lucia Ferro", " Lucia@Dispatch.Test "))
            .await
            .unwrap();
        assert_eq!(created.email, "lucia@dispatch.test");
        assert!(!created.is_admin);

        let found = get_by_email(&store, &admin, "LUCIA@dispatch.test").await.unwrap();
        assert_eq!(found, created);

        let patch = UserPatch {
            name: Some("  Lucia F. ".to_string()),
            is_admin: Some(true),
            ..UserPatch::default()
        };
        let updated = update(&store, &admin, created.id, patch).await.unwrap();
        assert_eq!(updated.name, "Lucia F.");
        assert!(updated.is_admin);
        assert_eq!(updated.email, created.email);

        delete(&store, &admin, created.id).await.unwrap();
        let err = get(&store, &admin, created.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn users_see_only_themselves() {
        let store = MemoryStore::seeded();
        let me = AuthContext::user(5);

        assert_eq!(get(&store, &me, 5).await.unwrap().id, 5);
        assert!(matches!(get(&store, &me, 6).await.unwrap_err(), AppError::Forbidden));

        let err = list(&store, &me, &UserFilter::default(), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // Forbidden whether or not the address exists.
        for email in ["user6@dispatch.test", "nobody@dispatch.test"] {
            let err = get_by_email(&store, &me, email).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden));
        }
    }

    #[tokio::test]
    async fn users_cannot_edit_or_promote_themselves() {
        let store = MemoryStore::seeded();
        let me = AuthContext::user(5);
        let patch = UserPatch {
            is_admin: Some(true),
            ..UserPatch::default()
        };
        let err = update(&store, &me, 5, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert!(!get(&store, &me, 5).await.unwrap().is_admin);

        let err = create(&store, &me, account("Sock Puppet", "sock@dispatch.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = delete(&store, &me, 5).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn email_is_unique_case_insensitively() {
        let store = MemoryStore::seeded();
        let admin = AuthContext::admin(1);

        let err = create(&store, &admin, account("Copy", "USER3@dispatch.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let patch = UserPatch {
            email: Some("User4@Dispatch.Test".to_string()),
            ..UserPatch::default()
        };
        let err = update(&store, &admin, 3, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        // Re-saving one's own address is not a clash.
        let patch = UserPatch {
            email: Some("user3@dispatch.test".to_string()),
            ..UserPatch::default()
        };
        assert_eq!(update(&store, &admin, 3, patch).await.unwrap().email, "user3@dispatch.test");
    }

    #[tokio::test]
    async fn list_searches_name_and_email() {
        let store = MemoryStore::seeded();
        let admin = AuthContext::admin(1);
        create(&store, &admin, account("Marta Quiroga", "mq@bomberos.example"))
            .await
            .unwrap();

        let filter = UserFilter {
            search: Some("BOMBEROS".to_string()),
            ..UserFilter::default()
        };
        let page = list(&store, &admin, &filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Marta Quiroga");

        let filter = UserFilter {
            is_admin: Some(true),
            ..UserFilter::default()
        };
        let page = list(&store, &admin, &filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, 1);

        let page = list(&store, &admin, &UserFilter::default(), PageRequest::new(Some(1), Some(5)))
            .await
            .unwrap();
        assert_eq!(page.total, 13);
        assert_eq!(page.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn deleting_a_user_detaches_incidents_and_removes_their_agent() {
        let store = MemoryStore::seeded();
        let admin = AuthContext::admin(1);

        let incident = incidents::create(
            &store,
            &AuthContext::user(9),
            CreateIncidentRequest {
                type_incident: IncidentType::Fire,
                message: "Garage fire next door".to_string(),
                latitude: None,
                longitude: None,
                address: None,
                reporter_id: None,
            },
        )
        .await
        .unwrap();
        let agent = agents::create(
            &store,
            &admin,
            CreateAgentRequest {
                agent_name: "Unit 9".to_string(),
                agent_type: None,
                user_id: Some(9),
                status: None,
                capacity: None,
                jurisdiction: None,
                is_on_call: None,
                auto_accept: None,
            },
        )
        .await
        .unwrap();
        let assignment = assignments::create(
            &store,
            &admin,
            CreateAssignmentRequest {
                incident_id: incident.id,
                agent_id: agent.id,
                sla_due_at: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        delete(&store, &admin, 9).await.unwrap();

        assert_eq!(incidents::get(&store, incident.id).await.unwrap().reporter_id, None);
        assert!(matches!(
            agents::get(&store, agent.id).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(matches!(
            assignments::get(&store, assignment.id).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn missing_user_is_not_found_for_everyone() {
        let store = MemoryStore::seeded();
        for actor in [AuthContext::admin(1), AuthContext::user(5)] {
            assert!(matches!(get(&store, &actor, 404).await.unwrap_err(), AppError::NotFound { .. }));
            let err = delete(&store, &actor, 404).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }));
        }
        let err = get_by_email(&store, &AuthContext::admin(1), "ghost@dispatch.test")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}

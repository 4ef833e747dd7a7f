//! 内存用户目录
//!
//! 进程内的身份存储，用户名唯一索引与主表放在同一把锁下。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{Identity, RepositoryError, Timestamp, UserDirectory, UserId, Username};
use tokio::sync::RwLock;

#[derive(Default)]
struct DirectoryState {
    identities: HashMap<UserId, Identity>,
    username_index: HashMap<String, UserId>,
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 删除身份，返回被删除的记录
    pub async fn remove(&self, id: UserId) -> Option<Identity> {
        let mut state = self.state.write().await;
        let identity = state.identities.remove(&id)?;
        state.username_index.remove(identity.username.as_str());
        tracing::info!(user_id = %id, "identity removed from directory");
        Some(identity)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.identities.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create(&self, identity: Identity) -> Result<Identity, RepositoryError> {
        let mut state = self.state.write().await;

        let key = identity.username.as_str().to_owned();
        if state.username_index.contains_key(&key) || state.identities.contains_key(&identity.id) {
            return Err(RepositoryError::Conflict);
        }

        state.username_index.insert(key, identity.id);
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Identity>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .username_index
            .get(username.as_str())
            .and_then(|id| state.identities.get(id))
            .cloned())
    }

    async fn record_logout(&self, id: UserId, at: Timestamp) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let identity = state
            .identities
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        identity.record_logout(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::PasswordHash;
    use std::sync::Arc;

    fn identity(username: &str) -> Identity {
        Identity::register(
            UserId::generate(),
            Username::parse(username).unwrap(),
            username,
            PasswordHash::new("$2b$04$hash").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_and_find() {
        let directory = InMemoryUserDirectory::new();
        let ana = directory.create(identity("ana")).await.unwrap();

        let by_id = directory.find_by_id(ana.id).await.unwrap();
        let by_name = directory
            .find_by_username(&Username::parse("ana").unwrap())
            .await
            .unwrap();

        assert_eq!(by_id, Some(ana.clone()));
        assert_eq!(by_name, Some(ana));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let directory = InMemoryUserDirectory::new();
        directory.create(identity("ana")).await.unwrap();

        let err = directory.create(identity("ana")).await.unwrap_err();
        assert_eq!(err, RepositoryError::Conflict);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_with_same_username_admit_one() {
        let directory = Arc::new(InMemoryUserDirectory::new());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.create(identity("ana")).await })
            })
            .collect();

        let created = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn record_logout_updates_identity() {
        let directory = InMemoryUserDirectory::new();
        let ana = directory.create(identity("ana")).await.unwrap();
        let at = Utc::now();

        directory.record_logout(ana.id, at).await.unwrap();

        let stored = directory.find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.logout_at, Some(at));
        assert_eq!(
            directory.record_logout(UserId::generate(), at).await,
            Err(RepositoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn removed_identity_is_gone() {
        let directory = InMemoryUserDirectory::new();
        let ana = directory.create(identity("ana")).await.unwrap();

        assert!(directory.remove(ana.id).await.is_some());
        assert!(directory.find_by_id(ana.id).await.unwrap().is_none());
        assert!(directory.is_empty().await);
        // 用户名释放后可以重新注册
        assert!(directory.create(identity("ana")).await.is_ok());
    }
}

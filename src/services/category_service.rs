use crate::{
    error::AppError,
    models::{Category, User},
    repository::RepositoryState,
};

/// CategoryService
///
/// Category operations on behalf of a user. A category that belongs to somebody else is
/// indistinguishable from one that does not exist.
#[derive(Clone)]
pub struct CategoryService {
    repo: RepositoryState,
}

impl CategoryService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn create(&self, name: &str, user: &User) -> Result<Category, AppError> {
        let category = self.repo.create_category(name, user.id).await?;
        tracing::info!(category_id = category.id, user_id = user.id, "category created");
        Ok(category)
    }

    pub async fn get_all(&self, user: &User) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.get_categories(user.id).await?)
    }

    pub async fn get_by_id(&self, id: i64, user: &User) -> Result<Option<Category>, AppError> {
        Ok(self.repo.get_category(id, user.id).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        name: &str,
        user: &User,
    ) -> Result<Option<Category>, AppError> {
        Ok(self.repo.update_category(id, user.id, name).await?)
    }

    /// Returns false when nothing owned by `user` had that id.
    pub async fn delete(&self, id: i64, user: &User) -> Result<bool, AppError> {
        let deleted = self.repo.delete_category(id, user.id).await?;
        if deleted {
            tracing::info!(category_id = id, user_id = user.id, "category deleted");
        }
        Ok(deleted)
    }
}

//! Catalog service for browsing and administering categories and products.

use common::{CategoryId, ProductId};
use store::{
    Category, CatalogStore, NewCategory, NewProduct, Page, PageRequest, Product, ProductFilter,
    ProductUpdate,
};

use crate::error::{DomainError, Result, require_filled};

const MAX_FEATURED: u32 = 50;

/// Service for managing the catalog.
pub struct CatalogService<S> {
    store: S,
}

impl<S: CatalogStore> CatalogService<S> {
    /// Creates a new catalog service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, new), fields(slug = %new.slug))]
    pub async fn create_category(&self, new: NewCategory) -> Result<Category> {
        require_filled("name", &new.name)?;
        require_filled("slug", &new.slug)?;

        let category = self.store.create_category(new).await?;
        metrics::counter!("catalog_categories_created").increment(1);
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Category> {
        self.store
            .get_category_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("category", slug))
    }

    #[tracing::instrument(skip(self, new), fields(sku = %new.sku))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        require_filled("name", &new.name)?;
        require_filled("sku", &new.sku)?;
        if new.price.cents() <= 0 {
            return Err(DomainError::validation("price must be positive"));
        }
        if let Some(original) = new.original_price
            && original.cents() <= 0
        {
            return Err(DomainError::validation("original_price must be positive"));
        }

        let product = self.store.create_product(new).await?;
        metrics::counter!("catalog_products_created").increment(1);
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> Result<Product> {
        self.store
            .get_product_by_sku(sku)
            .await?
            .ok_or_else(|| DomainError::not_found("product", sku))
    }

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        Ok(self.store.list_products(filter, page).await?)
    }

    pub async fn list_featured(&self, limit: u32) -> Result<Vec<Product>> {
        Ok(self
            .store
            .list_featured_products(limit.clamp(1, MAX_FEATURED))
            .await?)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        if let Some(price) = update.price
            && price.cents() <= 0
        {
            return Err(DomainError::validation("price must be positive"));
        }
        if let Some(ref name) = update.name {
            require_filled("name", name)?;
        }
        Ok(self.store.update_product(id, update).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<()> {
        self.store.deactivate_product(id).await?;
        metrics::counter!("catalog_products_deactivated").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::InMemoryStore;

    fn service() -> CatalogService<InMemoryStore> {
        CatalogService::new(InMemoryStore::new())
    }

    fn category() -> NewCategory {
        NewCategory {
            name: "Running".to_string(),
            description: None,
            slug: "running".to_string(),
        }
    }

    #[tokio::test]
    async fn blank_category_name_is_rejected() {
        let svc = service();
        let result = svc
            .create_category(NewCategory {
                name: "   ".to_string(),
                description: None,
                slug: "running".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn nonpositive_price_is_rejected() {
        let svc = service();
        let cat = svc.create_category(category()).await.unwrap();

        let result = svc
            .create_product(NewProduct {
                category_id: cat.id,
                name: "Air Runner".to_string(),
                description: "shoe".to_string(),
                sku: "SKU-1".to_string(),
                brand: "Nike".to_string(),
                price: Money::zero(),
                original_price: None,
                featured: false,
                stock_quantity: 0,
                images: vec![],
                sizes: vec![],
                colors: vec![],
            })
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_product_maps_to_not_found() {
        let svc = service();
        let result = svc.get_product(ProductId::new()).await;
        assert!(matches!(
            result,
            Err(DomainError::NotFound { entity: "product", .. })
        ));
    }
}

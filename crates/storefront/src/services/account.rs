//! Loading a user's account at sign-in.

use luna_moth_core::{Cart, Order, OrderId, OrderItem, Price, ProductId, UserProfile};
use tracing::instrument;

use crate::services::documents::{DocumentError, DocumentStore};
use crate::services::identity::Identity;

/// Profile and remote cart of a user who just signed in.
#[derive(Debug)]
pub struct LoadedAccount {
    pub profile: UserProfile,
    pub cart: Cart,
}

/// Fetch (or create) the profile and fetch the remote cart.
///
/// A first sign-in creates `{uid, email, "", "", []}`. A profile with no
/// orders is shown with the sample order history.
///
/// # Errors
///
/// Returns the first document store failure.
#[instrument(skip(documents, identity), fields(uid = %identity.uid))]
pub async fn load_account(
    documents: &dyn DocumentStore,
    identity: &Identity,
) -> Result<LoadedAccount, DocumentError> {
    let mut profile = if let Some(profile) = documents.get_profile(identity).await? {
        profile
    } else {
        let profile = UserProfile::new(identity.uid.clone(), identity.email.clone());
        documents.create_profile(identity, &profile).await?;
        tracing::info!("created profile on first sign-in");
        profile
    };

    if profile.orders.as_ref().is_none_or(Vec::is_empty) {
        profile.orders = Some(sample_orders());
    }

    let cart = documents.get_cart(identity).await?;
    Ok(LoadedAccount { profile, cart })
}

fn item(id: &str, name: &str, size: &str, cents: i64, image: &str) -> OrderItem {
    OrderItem {
        product_id: ProductId::new(id),
        name: name.to_string(),
        size: size.to_string(),
        quantity: 1,
        price: Price::from_cents(cents),
        image_url: format!("https://source.unsplash.com/400x400/{image}"),
    }
}

/// The order history shown to users who have not ordered yet.
#[must_use]
pub fn sample_orders() -> Vec<Order> {
    vec![
        Order {
            id: OrderId::new("LMG-84321"),
            date: "2023-10-26".to_string(),
            total: Price::from_cents(7500),
            items: vec![
                item("2", "Rose Quartz", "Standard", 2500, "?rose,quartz&sig=101"),
                item("5", "Citrine Geode", "Standard", 5000, "?citrine,geode&sig=102"),
            ],
        },
        Order {
            id: OrderId::new("LMG-84119"),
            date: "2023-08-15".to_string(),
            total: Price::from_cents(5300),
            items: vec![
                item("6", "Selenite Wand", "Standard", 1800, "?selenite,wand&sig=103"),
                item("7", "Labradorite Palm Stone", "Medium", 3500, "?labradorite&sig=104"),
            ],
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use luna_moth_core::{Email, UserId};

    use super::*;
    use crate::catalog::Catalog;
    use crate::services::documents::MemoryDocumentStore;

    fn identity() -> Identity {
        Identity {
            uid: UserId::new("u1"),
            email: Email::parse("jade@example.com").unwrap(),
            id_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: chrono::Utc::now() + chrono::TimeDelta::hours(1),
        }
    }

    #[test]
    fn test_sample_order_totals_match_items() {
        for order in sample_orders() {
            let sum: Price = order.items.iter().map(|i| i.price.times(i.quantity)).sum();
            assert_eq!(sum, order.total, "{}", order.id);
        }
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_profile() {
        let store = MemoryDocumentStore::new();
        let loaded = load_account(&store, &identity()).await.unwrap();

        let stored = store.stored_profile(&identity().uid).await.unwrap();
        assert_eq!(stored.orders.as_deref(), Some(&[][..]));
        assert_eq!(loaded.profile.orders.unwrap().len(), 2);
        assert!(loaded.cart.is_empty());
    }

    #[tokio::test]
    async fn test_existing_profile_and_cart_are_loaded() {
        let store = MemoryDocumentStore::new();
        let who = identity();
        let mut profile = UserProfile::new(who.uid.clone(), who.email.clone());
        profile.first_name = Some("Jade".to_string());
        store.put_profile(profile).await;

        let catalog = Catalog::bundled();
        let product = catalog.find("7").unwrap();
        let mut cart = Cart::new();
        cart.add(product, product.variant("Large").unwrap());
        store.put_cart(&who.uid, cart.clone()).await;

        let loaded = load_account(&store, &who).await.unwrap();
        assert_eq!(loaded.profile.first_name.as_deref(), Some("Jade"));
        assert_eq!(loaded.cart, cart);
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = MemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(load_account(&store, &identity()).await.is_err());
    }
}

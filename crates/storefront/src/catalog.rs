//! The bundled product catalog and the queries the pages run against it.
//!
//! The catalog is compiled into the binary and never changes at runtime, so
//! every query is a plain in-memory pass over at most a few dozen products.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use serde::Deserialize;

use luna_moth_core::{Price, Product, ProductId, ProductVariant};

/// Category label that disables the category filter.
pub const ALL_CATEGORIES: &str = "All";

/// Products shown before the first "load more".
pub const INITIAL_VISIBLE: usize = 16;

/// Products added by each "load more".
pub const LOAD_MORE_STEP: usize = 16;

/// Upper bound for the home page featured grid.
pub const MAX_FEATURED: usize = 8;

/// Upper bound for the "you may also like" row.
pub const MAX_RELATED: usize = 4;

/// Inventory sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl SortOption {
    /// Every option, in the order the sort picker lists them.
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::NameAsc,
        Self::NameDesc,
    ];

    /// Query string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
        }
    }

    /// Label shown in the sort picker.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "Featured",
            Self::PriceAsc => "Price: Low to High",
            Self::PriceDesc => "Price: High to Low",
            Self::NameAsc => "Name: A to Z",
            Self::NameDesc => "Name: Z to A",
        }
    }
}

/// Inventory page query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortOption,
    #[serde(default)]
    pub visible: Option<usize>,
}

impl InventoryQuery {
    /// The active category, `All` when unset or blank.
    #[must_use]
    pub fn category(&self) -> &str {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(ALL_CATEGORIES)
    }

    /// The trimmed search text, `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// How many results to show; never below the initial page size.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.visible.unwrap_or(INITIAL_VISIBLE).max(INITIAL_VISIBLE)
    }
}

/// One page of inventory results.
#[derive(Debug, Clone)]
pub struct InventoryResults<'a> {
    /// Products to render.
    pub products: Vec<&'a Product>,
    /// Number of products matching the filters.
    pub total: usize,
    /// `visible` value for the "load more" link, when more remain.
    pub next_visible: Option<usize>,
}

/// The product catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Build a catalog from an explicit product list.
    #[must_use]
    pub const fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The catalog shipped with the storefront.
    #[must_use]
    pub fn bundled() -> Self {
        Self::new(bundled_products())
    }

    /// Every product in catalog order.
    #[must_use]
    pub fn all(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id.as_str() == id)
    }

    /// Featured products in random order, at most [`MAX_FEATURED`].
    #[must_use]
    pub fn featured(&self) -> Vec<&Product> {
        let mut featured: Vec<&Product> = self.products.iter().filter(|p| p.is_featured).collect();
        featured.shuffle(&mut rand::rng());
        featured.truncate(MAX_FEATURED);
        featured
    }

    /// `All` followed by each distinct category in catalog order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(ALL_CATEGORIES)
            .chain(
                self.products
                    .iter()
                    .map(|p| p.category.as_str())
                    .filter(|c| seen.insert(*c)),
            )
            .collect()
    }

    /// Distinct categories without the `All` entry.
    #[must_use]
    pub fn category_names(&self) -> Vec<&str> {
        self.categories().into_iter().skip(1).collect()
    }

    /// Filter, sort and paginate the inventory.
    #[must_use]
    pub fn browse(&self, query: &InventoryQuery) -> InventoryResults<'_> {
        let category = query.category();
        let needle = query.search().map(str::to_lowercase);

        let mut matched: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| category == ALL_CATEGORIES || p.category == category)
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                })
            })
            .collect();

        let min_price = |p: &Product| p.min_price().unwrap_or(Price::ZERO);
        match query.sort {
            SortOption::Default => {}
            SortOption::PriceAsc => matched.sort_by_key(|p| min_price(p)),
            SortOption::PriceDesc => matched.sort_by_key(|p| std::cmp::Reverse(min_price(p))),
            SortOption::NameAsc => matched.sort_by_key(|p| p.name.to_lowercase()),
            SortOption::NameDesc => {
                matched.sort_by_key(|p| std::cmp::Reverse(p.name.to_lowercase()));
            }
        }

        let total = matched.len();
        let visible = query.visible();
        matched.truncate(visible);

        InventoryResults {
            products: matched,
            total,
            next_visible: (visible < total).then_some(visible + LOAD_MORE_STEP),
        }
    }

    /// Products to suggest next to `product`.
    ///
    /// Same-category products first; when the category has nothing else,
    /// other featured products. Shuffled, at most [`MAX_RELATED`].
    #[must_use]
    pub fn related(&self, product: &Product) -> Vec<&Product> {
        let others = || self.products.iter().filter(|p| p.id != product.id);

        let mut related: Vec<&Product> = others().filter(|p| p.category == product.category).collect();
        if related.is_empty() {
            related = others().filter(|p| p.is_featured).collect();
        }
        related.shuffle(&mut rand::rng());
        related.truncate(MAX_RELATED);
        related
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::bundled()
    }
}

// =============================================================================
// Bundled Products
// =============================================================================

const UNSPLASH: &str = "https://images.unsplash.com/";
const IMAGE_PARAMS: &str = "?q=80&w=400&h=400&fit=crop";

fn standard(cents: i64) -> Vec<ProductVariant> {
    sized("Standard", cents, None)
}

fn sized(size: &str, cents: i64, description: Option<&str>) -> Vec<ProductVariant> {
    vec![ProductVariant {
        size: size.to_string(),
        price: Price::from_cents(cents),
        description: description.map(str::to_string),
    }]
}

fn product(
    id: &str,
    name: &str,
    variants: Vec<ProductVariant>,
    description: &str,
    photos: &[&str],
    category: &str,
    is_featured: bool,
) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        variants,
        description: description.to_string(),
        image_urls: photos
            .iter()
            .map(|photo| format!("{UNSPLASH}{photo}{IMAGE_PARAMS}"))
            .collect(),
        category: category.to_string(),
        is_featured,
    }
}

#[allow(clippy::too_many_lines)]
fn bundled_products() -> Vec<Product> {
    let palm_sizes = [
        sized("Small", 2500, Some("Approx. 1\" - 1.5\" in diameter.")),
        sized("Medium", 3000, Some("Approx. 1.5\" - 2.5\" in diameter.")),
        sized("Large", 3500, Some("Approx. 2.5\" - 4\" in diameter.")),
    ]
    .concat();

    vec![
        product(
            "1",
            "Amethyst Cluster",
            standard(4500),
            "A beautiful cluster known for its calming and spiritual properties.",
            &[
                "photo-1598808526189-3a339180c10f",
                "photo-1619551148592-13c51368b1a4",
                "photo-1620656335343-3e0b2d6a52b1",
            ],
            "Clusters",
            true,
        ),
        product(
            "2",
            "Rose Quartz",
            standard(2500),
            "The stone of universal love, encourages compassion and peace.",
            &[
                "photo-1604164303426-a6f44a3b4c4a",
                "photo-1515942400427-454593595822",
            ],
            "Tumbled Stones",
            true,
        ),
        product(
            "3",
            "Black Tourmaline",
            standard(3000),
            "A powerful grounding stone, providing protection against negativity.",
            &[
                "photo-1617061751101-b2b58832b3f1",
                "photo-1658428230182-e8bbd1664c39",
                "photo-1617061751003-81b33b3a7a4f",
            ],
            "Raw Stones",
            true,
        ),
        product(
            "4",
            "Clear Quartz Point",
            standard(2000),
            "Known as the \"master healer,\" it amplifies energy and thought.",
            &[
                "photo-1605100298401-8c4c794339e1",
                "photo-1610471851108-87a32e99388c",
            ],
            "Points & Wands",
            true,
        ),
        product(
            "5",
            "Citrine Geode",
            standard(5500),
            "Carries the power of the sun, promoting positivity and joy.",
            &[
                "photo-1607870716491-dfe9b3137a82",
                "photo-1623902364955-442431f45604",
                "photo-1612145564263-9b5523b7aa21",
            ],
            "Geodes",
            true,
        ),
        product(
            "6",
            "Selenite Wand",
            standard(1800),
            "Used for cleansing energy from other crystals and spaces.",
            &[
                "photo-1628151128913-911946a4e320",
                "photo-1628151068222-1081335c05d7",
            ],
            "Points & Wands",
            true,
        ),
        product(
            "7",
            "Labradorite Palm Stone",
            palm_sizes,
            "A stone of transformation, it enhances strength of will and a sense of inner worth.",
            &[
                "photo-1618688487375-3453b0a701d3",
                "photo-1567317351559-86566a506145",
                "photo-1618688487214-7299a9134a9b",
            ],
            "Palm Stones",
            true,
        ),
        product(
            "8",
            "Lapis Lazuli Sphere",
            standard(6000),
            "A symbol of wisdom and truth, it encourages self-awareness and self-expression.",
            &[
                "photo-1617061751052-a6305608e1e8",
                "photo-1614036735222-2646c0759a0f",
            ],
            "Spheres",
            true,
        ),
        product(
            "9",
            "Malachite",
            standard(4800),
            "Known as the stone of transformation, it absorbs negative energies and pollutants.",
            &[
                "photo-1610331289299-31ab6b25121b",
                "photo-1613426383637-1262d1a3b118",
                "photo-1618688487399-5489728b6d3a",
            ],
            "Tumbled Stones",
            false,
        ),
        product(
            "10",
            "Obsidian Scrying Mirror",
            standard(7500),
            "A strongly protective stone, it forms a shield against negativity.",
            &[
                "photo-1620535948950-763d3f92d77d",
                "photo-1605898394435-01e4a0b2e8a1",
            ],
            "Decorative",
            false,
        ),
        product(
            "11",
            "Fluorite Octahedron",
            standard(2200),
            "Highly protective and stabilizing, useful for grounding and harmonizing spiritual energy.",
            &[
                "photo-1617061751100-c97b8e5c851c",
                "photo-1617061751121-72901a1d9a2a",
            ],
            "Geometric",
            false,
        ),
        product(
            "12",
            "Tiger's Eye",
            standard(2800),
            "A stone of protection, Tiger's Eye may also bring good luck to the wearer.",
            &[
                "photo-1618688487315-780c1f51253a",
                "photo-1618688487233-04e43a6d96a7",
            ],
            "Tumbled Stones",
            false,
        ),
        product(
            "13",
            "Green Aventurine",
            standard(2400),
            "A stone of opportunity, thought to be the luckiest of all crystals.",
            &[
                "photo-1618688487293-19948c6a0b22",
                "photo-1579543321997-7a840e4a7a8f",
            ],
            "Tumbled Stones",
            false,
        ),
        product(
            "14",
            "Carnelian",
            standard(2600),
            "A stabilizing stone, Carnelian restores vitality and motivation, and stimulates creativity.",
            &[
                "photo-1618688487254-8e4e9f7b1b5e",
                "photo-1613426383618-47965a3c9b7e",
            ],
            "Tumbled Stones",
            false,
        ),
        product(
            "15",
            "Smoky Quartz Point",
            standard(3200),
            "An excellent grounding stone, Smoky Quartz gently neutralises negative vibrations.",
            &[
                "photo-1617061751095-8e3b1e3e7f4c",
                "photo-1617061751080-6e4b9f3e4c4d",
            ],
            "Points & Wands",
            false,
        ),
        product(
            "16",
            "Pyrite Cluster",
            standard(4000),
            "Also known as \"Fool's Gold,\" Pyrite is a powerful protection stone which shields and protects against all forms of negative vibrations.",
            &[
                "photo-1613426383643-15962e2d9b2e",
                "photo-1610331289311-2de5f3e9b1d9",
                "photo-1618688487299-4d8d1e9e2b0f",
            ],
            "Clusters",
            true,
        ),
        product(
            "17",
            "Amethyst Bracelet",
            standard(3800),
            "Wear the calming energy of Amethyst with this beautiful beaded bracelet.",
            &[
                "photo-1631047123386-14025a176917",
                "photo-1631047123326-42774b70e704",
            ],
            "Jewelry",
            false,
        ),
        product(
            "18",
            "Howlite Sphere",
            standard(5000),
            "A calming stone, Howlite can help reduce levels of stress and anger.",
            &[
                "photo-1617061751120-c20e5e0d4c8d",
                "photo-1617061751139-3a3d5b3d7a9b",
            ],
            "Spheres",
            false,
        ),
        product(
            "19",
            "Sodalite",
            standard(2900),
            "Encourages rational thought, objectivity, truth and intuition.",
            &[
                "photo-1618688487271-2b0b1c9c0b1e",
                "photo-1617061751065-9a8d9a8c0f3d",
            ],
            "Raw Stones",
            false,
        ),
        product(
            "20",
            "Red Jasper Palm Stone",
            sized("Medium", 3300, None),
            "Known as the \u{201c}supreme nurturer\u{201d}, it sustains and supports through times of stress.",
            &[
                "photo-1618688487288-46d4e8b3b641",
                "photo-1541458319134-2a91d24838a3",
            ],
            "Palm Stones",
            false,
        ),
        product(
            "21",
            "Moonstone Pendant",
            standard(6500),
            "A stone for \u{201c}new beginnings\u{201d}, Moonstone is a stone of inner growth and strength.",
            &[
                "photo-1610331289326-4b5b719d2a3e",
                "photo-1613426383648-4e8c1b1c1b1c",
            ],
            "Jewelry",
            true,
        ),
        product(
            "22",
            "Desert Rose Selenite",
            standard(2000),
            "Said to contain a unique spirit guardian, each one is different.",
            &[
                "photo-1613426383623-1d9c1b1c1b1c",
                "photo-1620535948950-763d3f92d77d",
            ],
            "Clusters",
            false,
        ),
        product(
            "23",
            "Ocean Jasper",
            standard(3400),
            "Encourages a feeling of joy and elevated spirits. Helps you to release negative feelings.",
            &[
                "photo-1618688487244-4d8d1e9e2b0f",
                "photo-1617061751070-9a8d9a8c0f3d",
            ],
            "Tumbled Stones",
            false,
        ),
        product(
            "24",
            "Kyanite Blade",
            standard(2800),
            "Excellent for attunement and meditation. It is tranquilizing and a powerful transmitter of high-frequency energies.",
            &[
                "photo-1617061751110-c20e5e0d4c8d",
                "photo-1617061751129-72901a1d9a2a",
            ],
            "Raw Stones",
            false,
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn test_bundled_catalog_shape() {
        let catalog = Catalog::bundled();
        assert_eq!(catalog.all().len(), 24);
        assert!(catalog.all().iter().all(|p| !p.variants.is_empty()));
        let palm = catalog.find("7").unwrap();
        assert_eq!(palm.variants.len(), 3);
        assert_eq!(palm.min_price(), Some(Price::from_cents(2500)));
    }

    #[test]
    fn test_featured_is_bounded_and_featured_only() {
        let catalog = Catalog::bundled();
        let featured = catalog.featured();
        assert_eq!(featured.len(), MAX_FEATURED);
        assert!(featured.iter().all(|p| p.is_featured));
    }

    #[test]
    fn test_categories_start_with_all_and_are_distinct() {
        let catalog = Catalog::bundled();
        let categories = catalog.categories();
        assert_eq!(categories[0], ALL_CATEGORIES);
        assert_eq!(categories[1], "Clusters");
        let unique: HashSet<_> = categories.iter().collect();
        assert_eq!(unique.len(), categories.len());
        assert_eq!(catalog.category_names().len(), categories.len() - 1);
    }

    #[test]
    fn test_browse_filters_by_category() {
        let catalog = Catalog::bundled();
        let query = InventoryQuery {
            category: Some("Spheres".to_string()),
            ..Default::default()
        };
        let results = catalog.browse(&query);
        assert_eq!(ids(&results.products), vec!["8", "18"]);
        assert_eq!(results.next_visible, None);
    }

    #[test]
    fn test_browse_search_is_case_insensitive_over_name_and_description() {
        let catalog = Catalog::bundled();
        let query = InventoryQuery {
            q: Some("  GROUNDING ".to_string()),
            ..Default::default()
        };
        let found = ids(&catalog.browse(&query).products);
        assert!(found.contains(&"3".to_string()));
        assert!(found.contains(&"15".to_string()));
        assert!(found.contains(&"11".to_string()));
    }

    #[test]
    fn test_browse_sorts_by_minimum_price() {
        let catalog = Catalog::bundled();
        let query = InventoryQuery {
            sort: SortOption::PriceAsc,
            visible: Some(100),
            ..Default::default()
        };
        let results = catalog.browse(&query);
        let prices: Vec<Price> = results
            .products
            .iter()
            .map(|p| p.min_price().unwrap())
            .collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(results.products[0].id.as_str(), "6");
    }

    #[test]
    fn test_browse_sorts_by_name_descending() {
        let catalog = Catalog::bundled();
        let query = InventoryQuery {
            sort: SortOption::NameDesc,
            visible: Some(100),
            ..Default::default()
        };
        let results = catalog.browse(&query);
        assert_eq!(results.products[0].name, "Tiger's Eye");
    }

    #[test]
    fn test_browse_paginates() {
        let catalog = Catalog::bundled();
        let first = catalog.browse(&InventoryQuery::default());
        assert_eq!(first.products.len(), INITIAL_VISIBLE);
        assert_eq!(first.total, 24);
        assert_eq!(first.next_visible, Some(32));

        let all = catalog.browse(&InventoryQuery {
            visible: first.next_visible,
            ..Default::default()
        });
        assert_eq!(all.products.len(), 24);
        assert_eq!(all.next_visible, None);
    }

    #[test]
    fn test_related_prefers_same_category() {
        let catalog = Catalog::bundled();
        let rose = catalog.find("2").unwrap();
        let related = catalog.related(rose);
        assert_eq!(related.len(), MAX_RELATED);
        assert!(related.iter().all(|p| p.category == "Tumbled Stones" && p.id != rose.id));
    }

    #[test]
    fn test_related_falls_back_to_featured() {
        let catalog = Catalog::bundled();
        let mirror = catalog.find("10").unwrap();
        let related = catalog.related(mirror);
        assert_eq!(related.len(), MAX_RELATED);
        assert!(related.iter().all(|p| p.is_featured && p.id != mirror.id));
    }

    #[test]
    fn test_sort_option_deserializes_from_query_value() {
        let query: InventoryQuery = serde_json::from_str(r#"{"sort":"price-desc"}"#).unwrap();
        assert_eq!(query.sort, SortOption::PriceDesc);
        assert_eq!(query.category(), ALL_CATEGORIES);
        assert_eq!(query.visible(), INITIAL_VISIBLE);
    }
}

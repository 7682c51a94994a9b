//! Fixture data for the studio catalogue
//!
//! `SeedData::generate` builds the rows once; they can be loaded into an
//! `InMemoryStore` or written to PostgreSQL by `PostgresSeeder`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::backends::{InMemoryStore, PostgresStore, StoreValue, ValueKind};
use crate::error::{ModelError, OrmResult};
use crate::model::{
    Model, Price, Product, ProductGroup, Seller, SellerProduct, Studio, TableSchema, CATALOG,
};

/// Sizes of the generated fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    pub studios: usize,
    pub products: usize,
    pub prices_per_product: usize,
    pub sellers: usize,
    pub product_groups: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            studios: 5,
            products: 100,
            prices_per_product: 10,
            sellers: 2,
            product_groups: 4,
        }
    }
}

impl SeedConfig {
    pub fn validate(&self) -> OrmResult<()> {
        if self.products > 0 && (self.studios == 0 || self.product_groups == 0) {
            return Err(ModelError::Configuration(
                "products need at least one studio and one product group".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generated fixture rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedData {
    pub studios: Vec<Studio>,
    pub product_groups: Vec<ProductGroup>,
    pub products: Vec<Product>,
    pub prices: Vec<Price>,
    pub sellers: Vec<Seller>,
    pub seller_products: Vec<SellerProduct>,
}

impl SeedData {
    pub fn generate(config: &SeedConfig) -> OrmResult<Self> {
        config.validate()?;

        let studios: Vec<Studio> = (1..=config.studios)
            .map(|i| Studio {
                id: to_id(i),
                name: format!("Studio {}", i),
            })
            .collect();

        let product_groups: Vec<ProductGroup> = (1..=config.product_groups)
            .map(|i| ProductGroup { id: to_id(i) })
            .collect();

        let deliverable_from = fixture_date(2000)?;
        let deliverable_until = fixture_date(2030)?;

        let products: Vec<Product> = (1..=config.products)
            .map(|i| Product {
                id: to_id(i),
                name: if i % 2 == 0 { "Infinity" } else { "Endgame" }.to_string(),
                deliverable_from,
                deliverable_until,
                studio_id: studios[i % studios.len()].id,
                group_id: to_id(i % config.product_groups + 1),
            })
            .collect();

        let prices: Vec<Price> = products
            .iter()
            .enumerate()
            .flat_map(|(i, product)| {
                (1..=config.prices_per_product).map(move |j| Price {
                    id: to_id(i * config.prices_per_product + j),
                    product_id: product.id,
                    value: Decimal::new(4200, 2),
                })
            })
            .collect();

        let sellers: Vec<Seller> = (1..=config.sellers)
            .map(|i| Seller {
                id: to_id(i),
                name: format!("Seller {}", i),
            })
            .collect();

        let seller_products = products
            .iter()
            .flat_map(|product| {
                sellers.iter().map(move |seller| SellerProduct {
                    product_id: product.id,
                    seller_id: seller.id,
                })
            })
            .collect();

        Ok(Self {
            studios,
            product_groups,
            products,
            prices,
            sellers,
            seller_products,
        })
    }

    /// Rows per table as value lists, parents before children
    pub fn table_rows(&self) -> Vec<(&'static TableSchema, Vec<Vec<StoreValue>>)> {
        fn rows<M: Model>(models: &[M]) -> (&'static TableSchema, Vec<Vec<StoreValue>>) {
            (M::schema(), models.iter().map(Model::to_values).collect())
        }
        vec![
            rows(&self.studios),
            rows(&self.product_groups),
            rows(&self.products),
            rows(&self.prices),
            rows(&self.sellers),
            rows(&self.seller_products),
        ]
    }

    /// Load the fixture into a fresh in-memory store
    pub fn into_memory_store(self) -> OrmResult<InMemoryStore> {
        let mut store = InMemoryStore::new();
        for (schema, rows) in self.table_rows() {
            for values in rows {
                store.insert(schema.name, values)?;
            }
        }
        tracing::debug!(
            studios = self.studios.len(),
            products = self.products.len(),
            prices = self.prices.len(),
            "in-memory store seeded"
        );
        Ok(store)
    }
}

fn fixture_date(year: i32) -> OrmResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| ModelError::Configuration(format!("invalid fixture year {}", year)))
}

// Fixture sizes are small; ids always fit
fn to_id(i: usize) -> i32 {
    i32::try_from(i).unwrap_or(i32::MAX)
}

/// Creates the catalogue schema in PostgreSQL and inserts the fixture
#[derive(Debug, Clone)]
pub struct PostgresSeeder {
    data: SeedData,
}

impl PostgresSeeder {
    pub fn new(data: SeedData) -> Self {
        Self { data }
    }

    /// Drop and recreate every table, then insert the fixture
    pub async fn run(&self, store: &PostgresStore) -> OrmResult<()> {
        for schema in CATALOG.iter().rev() {
            store
                .execute_statement(&format!("DROP TABLE IF EXISTS \"{}\"", schema.name), &[])
                .await?;
        }
        for schema in CATALOG {
            store.execute_statement(&create_table_sql(schema), &[]).await?;
        }

        for (schema, rows) in self.data.table_rows() {
            // Stay well below the PostgreSQL bind parameter limit
            let per_statement = (30_000 / schema.columns.len().max(1)).max(1);
            for chunk in rows.chunks(per_statement) {
                let (sql, params) = insert_sql(schema, chunk);
                store.execute_statement(&sql, &params).await?;
            }
            tracing::info!(table = schema.name, rows = rows.len(), "table seeded");
        }
        Ok(())
    }
}

fn sql_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Bool => "BOOLEAN",
        ValueKind::Integer => "INTEGER",
        ValueKind::Text => "TEXT",
        ValueKind::Decimal => "NUMERIC(19, 2)",
        ValueKind::Date => "DATE",
        ValueKind::Null => "TEXT",
    }
}

/// `CREATE TABLE` with primary key and foreign key constraints
pub fn create_table_sql(schema: &TableSchema) -> String {
    let mut parts: Vec<String> = schema
        .columns
        .iter()
        .map(|c| {
            format!(
                "\"{}\" {}{}",
                c.name,
                sql_type(c.kind),
                if c.nullable { "" } else { " NOT NULL" }
            )
        })
        .collect();

    let pk: Vec<String> = schema.primary_key.iter().map(|c| format!("\"{}\"", c)).collect();
    parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));

    for fk in schema.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY (\"{}\") REFERENCES \"{}\" (\"id\")",
            fk.column, fk.references
        ));
    }

    format!("CREATE TABLE \"{}\" ({})", schema.name, parts.join(", "))
}

fn insert_sql(schema: &TableSchema, rows: &[Vec<StoreValue>]) -> (String, Vec<StoreValue>) {
    let columns: Vec<String> = schema.columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
    let mut params = Vec::new();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let placeholders: Vec<String> = row
            .iter()
            .map(|value| {
                params.push(value.clone());
                format!("${}", params.len())
            })
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    (
        format!(
            "INSERT INTO \"{}\" ({}) VALUES {}",
            schema.name,
            columns.join(", "),
            tuples.join(", ")
        ),
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entities::{PRICES, SELLER_PRODUCTS};

    #[test]
    fn test_default_fixture_shape() {
        let data = SeedData::generate(&SeedConfig::default()).unwrap();
        assert_eq!(data.studios.len(), 5);
        assert_eq!(data.products.len(), 100);
        assert_eq!(data.prices.len(), 1000);
        assert_eq!(data.seller_products.len(), 200);

        // every studio owns 20 products
        for studio in &data.studios {
            let owned = data.products.iter().filter(|p| p.studio_id == studio.id).count();
            assert_eq!(owned, 20);
        }

        assert_eq!(data.products[0].name, "Endgame");
        assert_eq!(data.products[1].name, "Infinity");
        assert_eq!(data.products[0].studio_id, 2);
        assert_eq!(data.prices[10].id, 11);
        assert_eq!(data.prices[10].product_id, 2);
        assert_eq!(data.prices[0].value.to_string(), "42.00");
    }

    #[test]
    fn test_fixture_loads_into_memory_store() {
        let store = SeedData::generate(&SeedConfig::default())
            .unwrap()
            .into_memory_store()
            .unwrap();
        assert_eq!(store.row_count("prices"), 1000);
        assert_eq!(store.row_count("seller_products"), 200);
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(&PRICES),
            "CREATE TABLE \"prices\" (\"id\" INTEGER NOT NULL, \"product_id\" INTEGER NOT NULL, \
             \"value\" NUMERIC(19, 2) NOT NULL, PRIMARY KEY (\"id\"), \
             FOREIGN KEY (\"product_id\") REFERENCES \"products\" (\"id\"))"
        );
        assert!(create_table_sql(&SELLER_PRODUCTS).contains("PRIMARY KEY (\"product_id\", \"seller_id\")"));
    }

    #[test]
    fn test_products_without_studios_rejected() {
        let config = SeedConfig {
            studios: 0,
            ..SeedConfig::default()
        };
        assert!(matches!(
            SeedData::generate(&config),
            Err(ModelError::Configuration(_))
        ));
    }
}

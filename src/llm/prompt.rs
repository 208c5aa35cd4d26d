use crate::config::SchemaConfig;
use std::fs;
use tracing::info;

/// Schema sent with every question unless `schema.description_file` replaces it.
pub const DATABASE_SCHEMA: &str = r#"
Database Schema:

LOOKUP TABLES:
- ProductCategory(ProductCategoryID, ProductCategory, ProductCategoryDescription)

CORE TABLES:
- Region(RegionID, Region)
- Country(CountryID, Country, RegionID)
- Customer(CustomerID, FirstName, LastName, Address, City, CountryID)
- Product(ProductID, ProductName, ProductUnitPrice, ProductCategoryID)
- OrderDetail(OrderID, CustomerID, ProductID, OrderDate, QuantityOrdered)

RELATIONSHIPS:
- Country.RegionID -> Region.RegionID
- Customer.CountryID -> Country.CountryID
- Product.ProductCategoryID -> ProductCategory.ProductCategoryID
- OrderDetail.CustomerID -> Customer.CustomerID
- OrderDetail.ProductID -> Product.ProductID
"#;

/// Composes the instruction text for one generation request.
///
/// The dialect and schema are fixed at construction, so every prompt differs
/// only in the question it embeds.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: String,
    schema: String,
}

impl PromptBuilder {
    pub fn new(dialect: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            schema: schema.into(),
        }
    }

    pub fn from_config(config: &SchemaConfig) -> std::io::Result<Self> {
        let schema = match &config.description_file {
            Some(path) => {
                info!("Loading schema description from {}", path.display());
                fs::read_to_string(path)?
            }
            None => DATABASE_SCHEMA.to_string(),
        };
        Ok(Self::new(config.dialect.clone(), schema))
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn build(&self, question: &str) -> String {
        format!(
            r#"You are a {dialect} expert. Convert the question below into a single {dialect} query.

### Schema:
{schema}

### Question:
{question}

### Rules:
1. Output only the SQL query. No explanation, no comments, no Markdown.
2. Use JOINs to return descriptive values (names, categories, regions) instead of raw IDs.
3. Use aggregate functions (COUNT, SUM, AVG, MIN, MAX) with GROUP BY where the question asks for totals, counts or averages.
4. Add LIMIT 100 when the query could return many rows.
5. Give computed and joined columns clear aliases with AS.
"#,
            dialect = self.dialect,
            schema = self.schema,
            question = question,
        )
    }
}

pub mod product;

pub use product::{AttributeMap, ProductDetails, ScrapedProduct};

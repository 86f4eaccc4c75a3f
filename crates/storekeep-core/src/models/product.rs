use serde::{Deserialize, Serialize};

use super::Category;

/// A catalog product as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub price: f64,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Payload for creating a product. The server resolves `category_id` into the
/// embedded category object on reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category_id: i64,
    pub images: Vec<String>,
}

/// Partial update of a product.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_response() {
        let json = r#"{
            "id": 4,
            "title": "Classic Grey Hooded Sweatshirt",
            "slug": "classic-grey-hooded-sweatshirt",
            "price": 90,
            "description": "Elevate your casual wear with our Classic Grey Hooded Sweatshirt.",
            "category": {"id": 1, "name": "Clothes", "image": "https://i.imgur.com/QkIa5tT.jpeg"},
            "images": ["https://i.imgur.com/R2PN9Wq.jpeg", "https://i.imgur.com/IvxMPFr.jpeg"]
        }"#;

        let product: Product = serde_json::from_str(json).expect("Failed to parse product JSON");
        assert_eq!(product.id, 4);
        assert_eq!(product.price, 90.0);
        assert_eq!(product.category.name, "Clothes");
        assert_eq!(product.images.len(), 2);
    }

    #[test]
    fn test_new_product_wire_format() {
        let product = NewProduct {
            title: "Mug".to_string(),
            price: 12.5,
            description: "A mug".to_string(),
            category_id: 2,
            images: vec!["https://example.com/mug.png".to_string()],
        };
        let json = serde_json::to_value(&product).expect("Failed to serialize product");
        assert_eq!(json["categoryId"], 2);
        assert!(json.get("category_id").is_none());
    }
}

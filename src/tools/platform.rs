//! Digital platform recommendations per business category

use super::{require_text, text_schema, Tool};
use crate::models::ToolInput;
use crate::Result;
use serde_json::Value;

pub struct PlatformRecommenderTool;

const FOOD: &[&str] = &["GoFood", "GrabFood", "ShopeeFood", "Instagram"];
const FASHION: &[&str] = &["Shopee", "Tokopedia", "Instagram", "TikTok Shop"];
const SERVICES: &[&str] = &["Instagram", "Facebook", "Google Business", "WhatsApp Business"];
const CRAFTS: &[&str] = &["Etsy", "Tokopedia", "Instagram", "Pameran Online"];
const DEFAULT: &[&str] = &["Instagram", "WhatsApp Business", "Facebook"];

/// Lookup table keyed by lowercased category name
fn platforms_for(category: &str) -> &'static [&'static str] {
    match category {
        "makanan" | "minuman" | "makanan/minuman" | "kuliner" | "food" => FOOD,
        "fashion" => FASHION,
        "jasa" | "services" => SERVICES,
        "kerajinan" | "crafts" => CRAFTS,
        _ => DEFAULT,
    }
}

/// Case-insensitive recommendation. The normalized category is echoed so the
/// output does not depend on the caller's casing.
pub fn recommend(category: &str) -> String {
    let key = category.trim().to_lowercase();
    format!(
        "Rekomendasi untuk {}: {}",
        key,
        platforms_for(&key).join(", ")
    )
}

#[async_trait::async_trait]
impl Tool for PlatformRecommenderTool {
    fn name(&self) -> &'static str {
        "rekomendasi_platform"
    }

    fn description(&self) -> &'static str {
        "Rekomendasi platform digital berdasarkan kategori usaha (makanan, fashion, jasa, kerajinan)"
    }

    fn input_schema(&self) -> Value {
        text_schema("business_category", "Kategori usaha, misalnya 'fashion' atau 'makanan'")
    }

    async fn execute(&self, input: &ToolInput) -> Result<String> {
        let category = require_text(input, &["business_category", "jenis_usaha", "query"])?;
        Ok(recommend(&category))
    }
}

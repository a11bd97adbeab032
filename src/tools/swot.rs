//! Templated SWOT analysis

use super::{require_text, text_schema, Tool};
use crate::models::ToolInput;
use crate::Result;
use serde_json::Value;

pub struct SwotTool;

/// Render the static SWOT template for a business type
pub fn swot_analysis(usaha_type: &str) -> String {
    format!(
        "Analisis SWOT untuk {}:
KEKUATAN (Strengths):
1. Modal relatif kecil
2. Fleksibel dalam operasional
3. Dekat dengan pasar lokal

KELEMAHAN (Weaknesses):
1. Akses modal terbatas
2. SDM terbatas
3. Teknologi belum maksimal

PELUANG (Opportunities):
1. Pasar digital berkembang
2. Dukungan pemerintah
3. Tren belanja online

ANCAMAN (Threats):
1. Persaingan semakin ketat
2. Fluktuasi ekonomi
3. Perubahan regulasi
",
        usaha_type
    )
}

#[async_trait::async_trait]
impl Tool for SwotTool {
    fn name(&self) -> &'static str {
        "analisis_swot"
    }

    fn description(&self) -> &'static str {
        "Analisis SWOT (Strengths, Weaknesses, Opportunities, Threats) untuk jenis usaha tertentu"
    }

    fn input_schema(&self) -> Value {
        text_schema("usaha_type", "Jenis usaha, misalnya 'bakso' atau 'fashion'")
    }

    async fn execute(&self, input: &ToolInput) -> Result<String> {
        let usaha_type = require_text(input, &["usaha_type", "jenis_usaha", "query"])?;
        Ok(swot_analysis(&usaha_type))
    }
}

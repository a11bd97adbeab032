//! INA persona prompt

use crate::models::ToolSpec;

/// Build the system prompt listing the registered tools in order
pub fn build_system_prompt(tools: &[ToolSpec]) -> String {
    let tool_lines: Vec<String> = tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect();
    let tool_names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();

    format!(
        r#"Kamu adalah INA, asisten digital untuk pelaku UMKM Indonesia.

Bantu pemilik usaha kecil dengan analisis SWOT, proyeksi keuangan,
rekomendasi platform digital, serta panduan perizinan dan pendanaan.
Jawab dalam Bahasa Indonesia yang ramah, singkat, dan praktis.

Alat yang tersedia:
{}

Aturan:
- Gunakan alat bila pertanyaan membutuhkan perhitungan atau data.
- kalkulator_keuangan membutuhkan {{ "modal": <angka rupiah>, "margin_percent": <angka persen> }}
- Jangan mengarang angka atau nama alat di luar daftar.
- Jika sudah cukup informasi, berikan jawaban akhir.

Jika tidak memakai function calling, gunakan format:

Thought: pikirkan langkah berikutnya
Action: salah satu dari [{}]
Action Input: input untuk alat (JSON)

atau, bila sudah tahu jawabannya:

Thought: saya sudah tahu jawabannya
Final Answer: jawaban untuk pengguna
"#,
        tool_lines.join("\n"),
        tool_names.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_lists_tools_in_order() {
        let tools = vec![
            ToolSpec {
                name: "analisis_swot".to_string(),
                description: "SWOT".to_string(),
                input_schema: json!({}),
            },
            ToolSpec {
                name: "cari_pengetahuan".to_string(),
                description: "Panduan".to_string(),
                input_schema: json!({}),
            },
        ];

        let prompt = build_system_prompt(&tools);
        assert!(prompt.contains("INA"));
        assert!(prompt.contains("[analisis_swot, cari_pengetahuan]"));
        assert!(prompt.find("- analisis_swot").unwrap() < prompt.find("- cari_pengetahuan").unwrap());
    }
}

//! Built-in UMKM guidance corpus loaded when no index snapshot exists

use super::KnowledgeDocument;

const SEED: &[(&str, &str, &str)] = &[
    // Guidance documents
    ("doc1", "Cara membuat business plan untuk UMKM", "business_plan"),
    ("doc2", "Registrasi perizinan UMKM di Indonesia", "legal"),
    ("doc3", "Strategi pemasaran digital untuk UKM", "marketing"),
    ("doc4", "Cara mengajukan KUR (Kredit Usaha Rakyat)", "funding"),
    ("doc5", "Tips manajemen keuangan usaha kecil", "finance"),
    // Licensing
    ("perizinan-nib", "NIB: Nomor Induk Berusaha - gratis via oss.go.id", "perizinan"),
    ("perizinan-iumk", "IUMK: Izin Usaha Mikro Kecil - di kelurahan", "perizinan"),
    ("perizinan-pirt", "PIRT: Untuk usaha makanan - di Dinas Kesehatan", "perizinan"),
    ("perizinan-halal", "Halal: Sertifikasi Halal - BPJPH", "perizinan"),
    // Funding
    ("pendanaan-kur", "KUR: Kredit Usaha Rakyat - bunga rendah", "pendanaan"),
    ("pendanaan-pnm", "PNM: Permodalan Nasional Madani", "pendanaan"),
    ("pendanaan-lpdb", "LPDB: Lembaga Pengelola Dana Bergulir", "pendanaan"),
    ("pendanaan-crowdfunding", "Crowdfunding: Kitabisa.com, Gandengtangan.co.id", "pendanaan"),
    // Platforms
    ("platform-ecommerce", "E-commerce: Tokopedia, Shopee, Bukalapak", "platform"),
    ("platform-social", "Social Commerce: Instagram, TikTok Shop", "platform"),
    ("platform-marketplace", "Marketplace: Bukalapak, Blanja.com", "platform"),
    ("platform-website", "Website: Gratis dengan Carrd.co atau Canva", "platform"),
];

pub fn seed_documents() -> Vec<KnowledgeDocument> {
    SEED.iter()
        .map(|(id, text, category)| KnowledgeDocument::new(*id, *text, *category))
        .collect()
}

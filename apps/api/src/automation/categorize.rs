pub const FALLBACK_SECTOR: &str = "General";

/// Sector keyword table, checked in order; the first sector with a hit wins.
const SECTOR_KEYWORDS: &[(&str, &[&str])] = &[
    ("Technology", &["software", "developer", "programmer"]),
    ("Marketing", &["marketing", "sales", "advertising"]),
    ("Finance", &["finance", "accounting", "banking"]),
    ("Healthcare", &["healthcare", "medical", "doctor"]),
    ("Education", &["education", "teacher", "professor"]),
];

/// Assigns a sector by case-insensitive substring match over title,
/// description and skills.
pub fn categorize(title: &str, description: &str, skills: &[String]) -> &'static str {
    let content = format!("{} {} {}", title, description, skills.join(" ")).to_lowercase();

    SECTOR_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| content.contains(k)))
        .map(|(sector, _)| *sector)
        .unwrap_or(FALLBACK_SECTOR)
}

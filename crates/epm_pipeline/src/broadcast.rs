use epm_core::{BroadcastProgram, BroadcastType, Category, Continent};
use lazy_static::lazy_static;

#[allow(clippy::too_many_arguments)]
fn live(
    id: &str,
    title: &str,
    description: &str,
    location: &str,
    continent: Continent,
    category: Category,
    source: &str,
    video_id: &str,
) -> BroadcastProgram {
    BroadcastProgram {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        continent,
        kind: BroadcastType::Live,
        thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault_live.jpg", video_id),
        category,
        video_url: Some(format!("https://www.youtube.com/embed/{}", video_id)),
        source: Some(source.to_string()),
    }
}

lazy_static! {
    /// 24/7 news channels available as embeds.
    pub static ref GLOBAL_CHANNELS: Vec<BroadcastProgram> = vec![
        live("sky_news", "Sky News Live", "Global Breaking News", "London, UK", Continent::Europe, Category::Global, "Sky News", "9Auq9mYxFEE"),
        live("aljazeera", "Al Jazeera English", "Live World News", "Doha, Qatar", Continent::Asia, Category::Politics, "Al Jazeera", "gCNeDWCI0vo"),
        live("dw_news", "DW News", "Made for minds.", "Berlin, Germany", Continent::Europe, Category::Economy, "DW", "Gn5kbl1c1l4"),
        live("france24", "FRANCE 24 English", "International News", "Paris, France", Continent::Europe, Category::Global, "France 24", "h3MuIUNCCzI"),
        live("abc_news", "ABC News Live", "US 24/7 Coverage", "New York, USA", Continent::NorthAmerica, Category::Business, "ABC", "w_Ma8oQLmSM"),
        live("nasa_tv", "NASA Live", "Earth & Space", "Houston, USA", Continent::NorthAmerica, Category::Technology, "NASA", "21X5lGlDOfg"),
        live("gb_news", "GB News", "UK Opinion & News", "London, UK", Continent::Europe, Category::Politics, "GB News", "Ko18Sgci4XI"),
        live("euronews", "Euronews Live", "European Perspective", "Brussels, EU", Continent::Europe, Category::Global, "Euronews", "py4PWSv0LCE"),
    ];
}

/// Channels broadcasting from `continent`; `Global` lists every channel.
pub fn broadcast_programs(continent: Continent) -> Vec<BroadcastProgram> {
    GLOBAL_CHANNELS
        .iter()
        .filter(|c| continent == Continent::Global || c.continent == continent)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_filtering() {
        assert_eq!(broadcast_programs(Continent::Global).len(), 8);
        let europe = broadcast_programs(Continent::Europe);
        assert_eq!(europe.len(), 5);
        assert!(europe.iter().all(|c| c.continent == Continent::Europe));
        assert_eq!(broadcast_programs(Continent::NorthAmerica).len(), 2);
        assert!(broadcast_programs(Continent::Oceania).is_empty());
    }

    #[test]
    fn test_embed_urls() {
        let sky = &GLOBAL_CHANNELS[0];
        assert_eq!(sky.video_url.as_deref(), Some("https://www.youtube.com/embed/9Auq9mYxFEE"));
        assert_eq!(sky.thumbnail, "https://i.ytimg.com/vi/9Auq9mYxFEE/hqdefault_live.jpg");
        assert_eq!(sky.kind, BroadcastType::Live);
    }
}

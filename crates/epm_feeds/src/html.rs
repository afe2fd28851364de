use scraper::{Html, Selector};

/// Image sources shorter than this are tracking pixels or relative stubs.
const MIN_IMAGE_SRC_LEN: usize = 15;

/// Plain text of an HTML fragment, whitespace collapsed.
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `src` of the first `<img>` in the fragment, if it looks like a real image.
pub fn first_image_src(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("img[src]").ok()?;
    let src = fragment.select(&selector).next()?.value().attr("src")?.trim();
    if src.len() < MIN_IMAGE_SRC_LEN {
        return None;
    }
    Some(src.to_string())
}

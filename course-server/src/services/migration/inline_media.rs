use std::collections::BTreeMap;

use course_blob::DataUri;
use course_core::Course;

/// Inline images found in one course, keyed by their data URI.
///
/// Collected in a first pass over the content tree so uploads can run
/// without holding a mutable borrow on the course.
#[derive(Debug, Default)]
pub struct InlineMedia {
    found: usize,
    images: BTreeMap<String, DataUri>,
}

impl InlineMedia {
    pub fn collect(course: &Course) -> Self {
        let mut media = Self::default();
        course.visit_text(&mut |text| {
            if !DataUri::looks_like_image(text) {
                return;
            }
            if let Some(uri) = DataUri::parse(text) {
                media.found += 1;
                media.images.entry(text.to_string()).or_insert(uri);
            }
        });
        media
    }

    /// Every inline image leaf, duplicates included.
    pub fn found(&self) -> usize {
        self.found
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = (&String, &DataUri)> {
        self.images.iter()
    }
}

/// Outcome of [`rewrite`], summed over every replaced leaf.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rewritten {
    pub leaves: usize,
    pub bytes_removed: u64,
}

/// Replace every text leaf found in `urls` with its URL.
pub fn rewrite(course: &mut Course, urls: &BTreeMap<String, String>) -> Rewritten {
    let mut done = Rewritten::default();
    course.visit_text_mut(&mut |text| {
        if let Some(url) = urls.get(text.as_str()) {
            done.bytes_removed += text.len().saturating_sub(url.len()) as u64;
            *text = url.clone();
            done.leaves += 1;
        }
    });
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::{ContentNode, Lesson};

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn course_with(blocks: Vec<ContentNode>) -> Course {
        let mut course = Course::new("c1", "Course");
        course.lessons.insert(
            "l1".into(),
            Lesson {
                id: "l1".into(),
                blocks,
                ..Lesson::default()
            },
        );
        course
    }

    #[test]
    fn duplicates_count_as_found_but_upload_once() {
        let image = ContentNode::Map(BTreeMap::from([("src".to_string(), ContentNode::text(PIXEL))]));
        let course = course_with(vec![image.clone(), image, ContentNode::text("plain text")]);

        let media = InlineMedia::collect(&course);
        assert_eq!(media.found(), 2);
        assert_eq!(media.images().count(), 1);
    }

    #[test]
    fn rewrite_swaps_only_known_uris() {
        let mut course = course_with(vec![
            ContentNode::text(PIXEL),
            ContentNode::text("data:image/png;base64,@@@"),
        ]);
        let urls = BTreeMap::from([(PIXEL.to_string(), "https://cdn/x.png".to_string())]);

        assert_eq!(rewrite(&mut course, &urls).leaves, 1);
        let blocks = &course.lessons["l1"].blocks;
        assert_eq!(blocks[0].as_text(), Some("https://cdn/x.png"));
        assert!(blocks[1].as_text().unwrap().starts_with("data:"));
    }

    #[test]
    fn bytes_removed_counts_every_replaced_leaf() {
        let mut course = course_with(vec![ContentNode::text(PIXEL), ContentNode::text(PIXEL)]);
        let url = "https://cdn/x.png";
        let urls = BTreeMap::from([(PIXEL.to_string(), url.to_string())]);

        let done = rewrite(&mut course, &urls);
        assert_eq!(done.leaves, 2);
        assert_eq!(done.bytes_removed, 2 * (PIXEL.len() - url.len()) as u64);
    }
}
